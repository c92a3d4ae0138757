use super::method_not_allowed;
use crate::api::server::AppState;
use crate::jobs::AdmissionError;
use actix_web::web::{self, Data};
use actix_web::{HttpResponse, Resource};
use log::{error, info, warn};
use serde_json::json;
use shared::models::api::JobAck;
use shared::models::JobSpec;

async fn submit_job(body: web::Bytes, app_state: Data<AppState>) -> HttpResponse {
    let job = match JobSpec::from_json_slice(&body) {
        Ok(job) => job,
        Err(e) => {
            warn!("Rejected job dispatch: {e}");
            return HttpResponse::BadRequest().json(json!({
                "success": false,
                "error": e.to_string()
            }));
        }
    };

    info!(
        "Received job dispatch: job_id={}, image={}, timeout={}s",
        job.job_id, job.workload_ref, job.timeout_secs
    );
    let job_id = job.job_id.clone();

    match app_state.admission.submit(job).await {
        Ok(()) => HttpResponse::Accepted().json(JobAck::accepted(job_id)),
        Err(AdmissionError::AlreadyRunning { running }) => {
            warn!("Rejected job {job_id}: job {running} is still running");
            HttpResponse::Conflict().json(JobAck::rejected(
                job_id,
                format!("Resource is busy with job {running}"),
            ))
        }
        Err(AdmissionError::Status(e)) => {
            error!("Failed to update status for job {job_id}: {e}");
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "job_id": job_id,
                "error": format!("Failed to update status: {e}")
            }))
        }
        Err(e @ AdmissionError::Interrupted(_)) => {
            error!("{e}");
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "job_id": job_id,
                "error": e.to_string()
            }))
        }
    }
}

pub(crate) fn job_routes() -> Resource {
    web::resource("/job")
        .route(web::post().to(submit_job))
        .default_service(web::to(method_not_allowed))
}
