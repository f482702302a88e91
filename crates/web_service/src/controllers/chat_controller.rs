//! Chat endpoint: validate, run the pipeline, stream the response.

use std::time::Instant;

use actix_web::{web, HttpRequest, HttpResponse};
use bytes::Bytes;
use chat_pipeline::{default_pipeline, ChatContext, ChatResponse};
use futures_util::StreamExt;
use log::info;
use tokio_util::sync::CancellationToken;

use crate::dto::ChatRequestDto;
use crate::error::AppError;
use crate::middleware::{extract_principal, extract_trace_id};
use crate::server::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/chat", web::post().to(chat));
}

pub async fn chat(
    state: web::Data<AppState>,
    body: web::Json<ChatRequestDto>,
    http_req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let trace_id = extract_trace_id(&http_req);
    let principal = extract_principal(&http_req);
    let start = Instant::now();

    let input = body.into_inner().validate(&state.services.catalog)?;
    info!(
        "[{trace_id}] chat request from {}: model={} stream={} agent_mode={}",
        principal.id, input.model.id, input.stream, input.agent_mode
    );

    // Dropping the response body cancels in-flight stream consumption.
    let cancel = CancellationToken::new();
    let ctx = ChatContext::new(principal, input).with_cancel(cancel.clone());

    let pipeline = default_pipeline(state.services.clone());
    let ctx = pipeline.run(ctx).await.map_err(|e| {
        log::error!(
            "[{trace_id}] pipeline failed after {}ms: {e}",
            start.elapsed().as_millis()
        );
        AppError::Pipeline(e)
    })?;

    info!(
        "[{trace_id}] pipeline completed with {:?} in {}ms ({} recoverable failures)",
        ctx.execution_strategy,
        start.elapsed().as_millis(),
        ctx.errors.len()
    );

    let response = ctx
        .response
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("pipeline produced no response")))?;

    Ok(match response {
        ChatResponse::Stream(stream) => {
            let guard = CancelOnDrop(cancel);
            let body = stream.map(move |chunk| {
                let _keep_alive = &guard;
                chunk.map_err(|e| {
                    log::error!("stream error mid-flight: {e}");
                    std::io::Error::other(e.to_string())
                })
            });
            HttpResponse::Ok()
                .content_type("text/plain; charset=utf-8")
                .insert_header(("x-accel-buffering", "no"))
                .streaming(body)
        }
        ChatResponse::Text { text, metadata } => {
            let mut body = text;
            if let Some(block) = metadata.render() {
                body.push_str(&block);
            }
            HttpResponse::Ok()
                .content_type("text/plain; charset=utf-8")
                .body(Bytes::from(body))
        }
    })
}

/// Signals cancellation to the pipeline stream when the HTTP body is
/// dropped (client disconnect or server shutdown).
struct CancelOnDrop(CancellationToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}
