//! Liveness endpoint for monitoring.

use actix_web::{get, HttpResponse, Responder};
use serde_json::json;

pub fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(health_check);
}

#[get("/health/")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "message": "Service is running successfully",
    }))
}
