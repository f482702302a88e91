//! Health and model catalog routes.

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::server::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/models", web::get().to(list_models));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn list_models(state: web::Data<AppState>) -> HttpResponse {
    let models: Vec<_> = state
        .services
        .catalog
        .all()
        .iter()
        .map(|m| {
            json!({
                "id": m.id,
                "supports_vision": m.supports_vision,
                "supports_agent_mode": m.agent_id.is_some(),
                "token_limit": m.token_limit,
            })
        })
        .collect();
    HttpResponse::Ok().json(json!({ "models": models }))
}
