//! Server wiring: app state, route configuration, and startup.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use chat_core::AppConfig;
use chat_pipeline::ServiceContainer;
use log::info;

use crate::controllers::{chat_controller, system_controller};

const DEFAULT_WORKER_COUNT: usize = 8;

/// Shared application state: the explicitly constructed service
/// container, never a hidden global.
pub struct AppState {
    pub services: Arc<ServiceContainer>,
}

pub fn app_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/v1")
            .configure(chat_controller::config)
            .configure(system_controller::config),
    );
}

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let bind = format!("{}:{}", config.bind_addr, config.port);
    let services = Arc::new(ServiceContainer::new(config)?);
    let app_state = web::Data::new(AppState { services });

    info!("starting chat service on http://{bind}");

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(Cors::permissive())
            .configure(app_config)
    })
    .workers(DEFAULT_WORKER_COUNT)
    .bind(&bind)?
    .run()
    .await?;

    Ok(())
}
