use crate::api::server::GatewayError;
use crate::api::DispatchGateway;
use crate::checks::hardware::score::CPU_ONLY_MODEL;
use crate::checks::hardware::HardwareProbe;
use crate::checks::issue::{IssueReport, IssueType};
use crate::checks::software::{docker::check_docker_installed, port::check_port_available};
use crate::config::{default_identity_path, AgentConfig, RunnerKind, DEFAULT_HOST, DEFAULT_PORT};
use crate::console::Console;
use crate::identity::HostIdentity;
use crate::jobs::{DockerRunner, JobAdmission, SimulatedRunner, WorkloadRunner};
use crate::ledger::{HttpLedgerClient, LedgerClient, RetryingLedgerClient};
use crate::operations::heartbeat::HeartbeatService;
use crate::state::StateController;
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use log::{error, info, warn};
use shared::models::ResourceStatus;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const APP_VERSION: &str = match option_env!("WORKER_VERSION") {
    Some(version) => version,
    None => env!("CARGO_PKG_VERSION"),
};

const JOB_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(author, version = APP_VERSION, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register the resource and start serving jobs
    Run(RunArgs),

    /// Run hardware and software checks without contacting the ledger
    Check {
        /// Host the dispatch gateway would bind
        #[arg(long, default_value = DEFAULT_HOST)]
        host: String,

        /// Port the dispatch gateway would bind
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Host identity file to validate
        #[arg(long)]
        identity_path: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// On-ledger resource id of this host
    #[arg(long)]
    pub resource_id: Option<u64>,

    /// Address for the dispatch gateway to listen on
    #[arg(long)]
    pub host: Option<String>,

    /// Port for the dispatch gateway to listen on
    #[arg(long)]
    pub port: Option<u16>,

    /// Seconds between status re-assertions
    #[arg(long)]
    pub heartbeat_interval_secs: Option<u64>,

    /// Ledger gateway URL (or LEDGER_URL)
    #[arg(long)]
    pub ledger_url: Option<String>,

    /// Ledger API key (not recommended, use environment variable LEDGER_API_KEY instead)
    #[arg(long)]
    pub ledger_api_key: Option<String>,

    /// Host identity keypair file
    #[arg(long)]
    pub identity_path: Option<PathBuf>,

    /// Optional TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Workload runner
    #[arg(long, value_enum)]
    pub runner: Option<RunnerKind>,

    /// Fixed hourly price, replacing the rating-based price
    #[arg(long)]
    pub price_per_hour: Option<u64>,

    /// Ledger request timeout in seconds
    #[arg(long)]
    pub ledger_timeout_secs: Option<u64>,

    /// Retries for transient ledger failures
    #[arg(long)]
    pub ledger_max_retries: Option<u32>,

    /// Log level
    #[arg(long)]
    pub log_level: Option<String>,

    /// Loki URL
    #[arg(long)]
    pub loki_url: Option<String>,

    /// Skip the startup registration call
    #[arg(long, default_value = "false")]
    pub skip_registration: bool,
}

pub async fn execute_command(
    command: &Commands,
    cancellation_token: CancellationToken,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    match command {
        Commands::Run(args) => run(args, cancellation_token).await.map_err(Into::into),
        Commands::Check {
            host,
            port,
            identity_path,
        } => {
            check(host, *port, identity_path.clone()).await;
            Ok(())
        }
    }
}

async fn run(args: &RunArgs, cancellation_token: CancellationToken) -> anyhow::Result<()> {
    Console::section("FLUX WORKER INITIALIZATION");
    Console::info("Version", APP_VERSION);

    if args.ledger_api_key.is_some() {
        Console::warning("Using the ledger API key from the command line is not recommended. Consider using the LEDGER_API_KEY environment variable instead.");
    }
    let config = AgentConfig::load(args).context("invalid configuration")?;
    Console::info("Resource ID", &config.resource_id.to_string());
    Console::info("Ledger", config.ledger_url.as_str());

    let identity = HostIdentity::load(&config.identity_path)
        .context("failed to load host identity")?;
    let host_key = identity.public_key_hex();
    Console::info("Host key", &host_key);

    let capability = HardwareProbe::default().probe(config.resource_id, config.price_per_hour);

    let http_ledger = HttpLedgerClient::new(
        &config.ledger_url,
        &config.ledger_api_key,
        &host_key,
        config.ledger_timeout,
    )
    .context("failed to build ledger client")?;
    let ledger: Arc<dyn LedgerClient> =
        Arc::new(RetryingLedgerClient::new(http_ledger, config.ledger_max_retries));
    let state = Arc::new(StateController::new(config.resource_id, ledger));

    if args.skip_registration {
        Console::warning("Skipping resource registration");
    } else {
        Console::progress("Registering resource with ledger");
        match state.register_once(&capability).await {
            Ok(()) => Console::success("Resource registered"),
            Err(e) => {
                warn!("Resource registration failed, continuing: {e}");
                Console::warning("Registration failed, continuing with existing ledger record");
            }
        }
    }

    let runner: Arc<dyn WorkloadRunner> = match config.runner {
        RunnerKind::Docker => {
            Arc::new(DockerRunner::new().context("failed to connect to Docker daemon")?)
        }
        RunnerKind::Simulated => Arc::new(SimulatedRunner::default()),
    };
    Console::info("Runner", runner.name());

    let admission = Arc::new(JobAdmission::new(
        state.clone(),
        runner,
        cancellation_token.clone(),
    ));
    let gateway = DispatchGateway::new(&config.host, config.port, admission.clone(), state.clone());

    if let Err(e) = state.set_status(ResourceStatus::Idle).await {
        warn!("Initial Idle status not synced: {e}");
    }
    let addr = start_gateway(&gateway, &state)
        .await
        .context("failed to start dispatch gateway")?;
    Console::success(&format!("Dispatch gateway listening on {addr}"));

    let heartbeat_token = CancellationToken::new();
    let heartbeat = HeartbeatService::new(state.clone(), config.heartbeat_interval)
        .start(heartbeat_token.clone())
        .context("failed to start heartbeat")?;

    cancellation_token.cancelled().await;
    info!("Shutting down");

    if let Err(e) = gateway.stop().await {
        error!("Failed to stop dispatch gateway cleanly: {e}");
    }
    if let Some(job_id) = admission.current_job() {
        info!("Waiting for job {job_id} to finish");
        if !admission.wait_idle(JOB_DRAIN_TIMEOUT).await {
            warn!("Job {job_id} did not finish within {}s", JOB_DRAIN_TIMEOUT.as_secs());
        }
    }

    heartbeat_token.cancel();
    if let Err(e) = heartbeat.await {
        error!("Heartbeat task failed: {e}");
    }
    Ok(())
}

/// Starts the gateway. If it cannot bind, the resource is reported Offline
/// so the ledger does not list a host that will never serve jobs.
async fn start_gateway(
    gateway: &DispatchGateway,
    state: &StateController,
) -> Result<SocketAddr, GatewayError> {
    match gateway.start() {
        Ok(addr) => Ok(addr),
        Err(e) => {
            if let Err(sync) = state.shutdown().await {
                warn!("Failed to report Offline after gateway start failure: {sync}");
            }
            Err(e)
        }
    }
}

async fn check(host: &str, port: u16, identity_path: Option<PathBuf>) {
    Console::section("System Checks");
    let issues = IssueReport::new();

    let capability = HardwareProbe::default().probe(0, None);
    if capability.gpu_model == CPU_ONLY_MODEL {
        issues.add_issue(IssueType::NoGpu, "No GPU detected, resource will be rated CPU-only");
    }

    Console::title("Docker");
    check_docker_installed(&issues).await;

    Console::title("Port");
    check_port_available(&issues, host, port);

    Console::title("Identity");
    let identity_path = identity_path.unwrap_or_else(default_identity_path);
    match HostIdentity::load(&identity_path) {
        Ok(identity) => Console::info("Host key", &identity.public_key_hex()),
        Err(e) => issues.add_issue(IssueType::IdentityUnreadable, e.to_string()),
    }

    issues.print_issues();
    if issues.has_critical_issues() {
        Console::user_error("Resource is not ready to serve jobs");
    } else {
        Console::success("Resource is ready to serve jobs");
    }
}
