use crate::api::routes;
use crate::jobs::JobAdmission;
use crate::state::StateController;
use actix_web::dev::ServerHandle;
use actix_web::{middleware, web, web::Data, App, HttpResponse, HttpServer};
use log::{error, info};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

#[derive(Debug, thiserror::Error)]
pub(crate) enum GatewayError {
    #[error("gateway is already running")]
    AlreadyRunning,
    #[error("gateway is not running")]
    NotRunning,
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("gateway shut down with error: {0}")]
    Shutdown(String),
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) admission: Arc<JobAdmission>,
    pub(crate) state: Arc<StateController>,
    pub(crate) running: Arc<AtomicBool>,
}

struct RunningServer {
    handle: ServerHandle,
    server: JoinHandle<std::io::Result<()>>,
    outcome_logger: JoinHandle<()>,
}

/// HTTP surface through which the marketplace dispatches jobs and polls
/// the resource.
pub(crate) struct DispatchGateway {
    host: String,
    port: u16,
    app_state: AppState,
    running: Mutex<Option<RunningServer>>,
}

impl DispatchGateway {
    pub(crate) fn new(
        host: &str,
        port: u16,
        admission: Arc<JobAdmission>,
        state: Arc<StateController>,
    ) -> Self {
        Self {
            host: host.to_string(),
            port,
            app_state: AppState {
                admission,
                state,
                running: Arc::new(AtomicBool::new(false)),
            },
            running: Mutex::new(None),
        }
    }

    /// Binds the listener and begins serving in the background. Returns the
    /// bound address.
    pub(crate) fn start(&self) -> Result<SocketAddr, GatewayError> {
        let mut running = self
            .running
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if running.is_some() {
            return Err(GatewayError::AlreadyRunning);
        }

        let app_state = Data::new(self.app_state.clone());
        let bind_addr = format!("{}:{}", self.host, self.port);
        let server = HttpServer::new(move || {
            App::new()
                .app_data(app_state.clone())
                .wrap(middleware::Logger::default())
                .configure(routes::configure)
                .default_service(web::route().to(|| async {
                    HttpResponse::NotFound().json(json!({
                        "success": false,
                        "error": "Resource not found"
                    }))
                }))
        })
        .disable_signals()
        .bind((self.host.as_str(), self.port))
        .map_err(|source| GatewayError::Bind {
            addr: bind_addr.clone(),
            source,
        })?;

        let addr = server
            .addrs()
            .first()
            .copied()
            .ok_or_else(|| GatewayError::Bind {
                addr: bind_addr,
                source: std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no address bound"),
            })?;

        let server = server.run();
        let handle = server.handle();
        self.app_state.running.store(true, Ordering::SeqCst);

        *running = Some(RunningServer {
            handle,
            server: tokio::spawn(server),
            outcome_logger: self.spawn_outcome_logger(),
        });
        info!("Dispatch gateway listening on {addr}");
        Ok(addr)
    }

    /// Stops accepting connections and waits for in-flight requests.
    pub(crate) async fn stop(&self) -> Result<(), GatewayError> {
        let running = self
            .running
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
            .ok_or(GatewayError::NotRunning)?;

        self.app_state.running.store(false, Ordering::SeqCst);
        running.handle.stop(true).await;
        running.outcome_logger.abort();

        match running.server.await {
            Ok(Ok(())) => {
                info!("Dispatch gateway stopped");
                Ok(())
            }
            Ok(Err(e)) => Err(GatewayError::Shutdown(e.to_string())),
            Err(e) => Err(GatewayError::Shutdown(e.to_string())),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        self.app_state.running.load(Ordering::SeqCst)
    }

    fn spawn_outcome_logger(&self) -> JoinHandle<()> {
        let mut outcomes = self.app_state.admission.subscribe();
        tokio::spawn(async move {
            loop {
                match outcomes.recv().await {
                    Ok(outcome) => match outcome.failure_reason() {
                        None => info!("Job completed: {outcome}"),
                        Some(reason) => error!("Job failed ({reason}): {outcome}"),
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        error!("Outcome log skipped {skipped} job outcomes");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
