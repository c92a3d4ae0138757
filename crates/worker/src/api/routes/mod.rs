use actix_web::{web, HttpResponse};
use serde_json::json;

pub(crate) mod health;
pub(crate) mod job;
pub(crate) mod status;

pub(crate) fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(job::job_routes())
        .service(status::status_routes())
        .service(health::health_routes());
}

pub(crate) async fn method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed().json(json!({
        "success": false,
        "error": "Method not allowed"
    }))
}
