use super::method_not_allowed;
use crate::api::server::AppState;
use actix_web::web::{self, Data};
use actix_web::{HttpResponse, Resource};
use shared::models::api::StatusReport;
use std::sync::atomic::Ordering;

async fn get_status(app_state: Data<AppState>) -> HttpResponse {
    let status = app_state.state.get_status();
    HttpResponse::Ok().json(StatusReport {
        running: app_state.running.load(Ordering::Relaxed),
        executor: true,
        agent: app_state.state.ledger_reachable(),
        resource_status: status.to_string(),
        resource_status_code: status.ordinal(),
        current_job: app_state.admission.current_job(),
    })
}

pub(crate) fn status_routes() -> Resource {
    web::resource("/status")
        .route(web::get().to(get_status))
        .default_service(web::to(method_not_allowed))
}
