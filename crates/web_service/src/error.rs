use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use chat_pipeline::PipelineError;
use serde::Serialize;
use thiserror::Error;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct JsonError {
    message: String,
    r#type: String,
}

#[derive(Serialize)]
struct JsonErrorWrapper {
    error: JsonError,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::UnknownModel(_) => StatusCode::BAD_REQUEST,
            AppError::Pipeline(PipelineError::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
            AppError::Pipeline(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        // Client-caused errors echo their message; everything else gets a
        // generic body so internals never leak to the end user.
        let message = if status_code == StatusCode::BAD_REQUEST {
            self.to_string()
        } else {
            log::error!("request failed: {self}");
            "The request could not be completed. Please try again.".to_string()
        };
        let error_response = JsonErrorWrapper {
            error: JsonError {
                message,
                r#type: "api_error".to_string(),
            },
        };
        HttpResponse::build(status_code).json(error_response)
    }
}
