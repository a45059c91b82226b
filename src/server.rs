use crate::error::GatewayError;
use crate::gateway_state::{GatewayConfig, GatewayState};
use crate::io_struct::PredictionRequest;
use actix_web::{HttpResponse, HttpServer, get, post, web};
use bytes::Bytes;
use serde_json::json;
use std::io::Write;

#[get("/health")]
pub async fn health(_: web::Data<GatewayState>) -> HttpResponse {
    HttpResponse::Ok().body("Ok")
}

#[get("/categories")]
pub async fn categories(app_state: web::Data<GatewayState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "categories": app_state.tables.categories.names(),
    }))
}

#[get("/labels")]
pub async fn labels(app_state: web::Data<GatewayState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "labels": app_state.tables.labels.as_slice(),
    }))
}

#[post("/predict")]
pub async fn predict(
    body: Bytes,
    app_state: web::Data<GatewayState>,
) -> Result<HttpResponse, GatewayError> {
    let result = match PredictionRequest::from_body(&body) {
        Ok(request) => app_state.predict(request).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(response) => Ok(HttpResponse::Ok().json(response)),
        Err(e) => {
            log_failure(&e);
            Err(e)
        }
    }
}

fn log_failure(err: &GatewayError) {
    if err.is_client_error() {
        log::warn!("Request rejected after stage {}: {}", err.stage(), err);
        return;
    }
    match err {
        GatewayError::BackendError { status, body } => log::error!(
            "Request failed after stage {}: backend returned {}: {}",
            err.stage(),
            status,
            body
        ),
        GatewayError::BackendProtocolError { body } => log::error!(
            "Request failed after stage {}: {} Response: {}",
            err.stage(),
            err,
            body
        ),
        GatewayError::BackendUnavailable { source, .. } => log::error!(
            "Request failed after stage {}: {} ({})",
            err.stage(),
            err,
            source
        ),
        _ => log::error!("Request failed after stage {}: {}", err.stage(), err),
    }
}

/// Register state, body limit and routes. Shared by `startup` and tests.
pub fn configure(
    cfg: &mut web::ServiceConfig,
    app_state: web::Data<GatewayState>,
    max_payload_size: usize,
) {
    cfg.app_data(app_state)
        .app_data(web::PayloadConfig::new(max_payload_size))
        .service(health)
        .service(categories)
        .service(labels)
        .service(predict);
}

pub fn init_logging(level: log::LevelFilter) {
    let _ = env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, level)
        .try_init();
}

pub async fn startup(config: GatewayConfig, gateway_state: GatewayState) -> std::io::Result<()> {
    let app_state = web::Data::new(gateway_state);
    let max_payload_size = config.max_payload_size;

    log::info!("Starting server at {}:{}", config.host, config.port);
    log::info!("Inference backend: {}", config.backend_url);

    HttpServer::new(move || {
        actix_web::App::new()
            .wrap(actix_web::middleware::Logger::default())
            .configure(|cfg| configure(cfg, app_state.clone(), max_payload_size))
    })
    .bind((config.host, config.port))?
    .run()
    .await
}
