use super::method_not_allowed;
use actix_web::{web, HttpResponse, Resource};
use serde_json::json;

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "healthy" }))
}

pub(crate) fn health_routes() -> Resource {
    web::resource("/health")
        .route(web::get().to(health))
        .default_service(web::to(method_not_allowed))
}
