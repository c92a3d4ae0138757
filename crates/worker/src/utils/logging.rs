use log::{debug, LevelFilter};
use tracing_subscriber::filter::EnvFilter as TracingEnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use url::Url;

use crate::cli::command::Commands;
use crate::cli::Cli;
use std::time::{SystemTime, UNIX_EPOCH};
use time::macros::format_description;
use tracing_subscriber::fmt::time::FormatTime;

struct SimpleTimeFormatter;

impl FormatTime for SimpleTimeFormatter {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let datetime = i64::try_from(timestamp)
            .ok()
            .and_then(|ts| time::OffsetDateTime::from_unix_timestamp(ts).ok())
            .unwrap_or(time::OffsetDateTime::UNIX_EPOCH);

        // Format as hh:mm:ss
        let format = format_description!("[hour]:[minute]:[second]");
        let formatted = datetime
            .format(format)
            .unwrap_or_else(|_| String::from("??:??:??"));

        write!(w, "{formatted}")
    }
}

pub fn setup_logging(cli: Option<&Cli>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut log_level = LevelFilter::Info;
    let mut loki_url: Option<String> = None;
    let mut resource_id = None;
    let mut port = None;

    if let Some(cli) = cli {
        if let Commands::Run(args) = &cli.command {
            resource_id = args.resource_id;
            port = args.port;
            loki_url = args.loki_url.clone();
            if let Some(level) = &args.log_level {
                log_level = level.parse()?;
            }
        }
    }

    let env_filter = TracingEnvFilter::from_default_env()
        .add_directive(format!("{log_level}").parse()?)
        .add_directive("reqwest=warn".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("hyper_util=warn".parse()?)
        .add_directive("bollard=warn".parse()?)
        .add_directive("actix_server=warn".parse()?)
        .add_directive("tracing::span=warn".parse()?);

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_timer(SimpleTimeFormatter)
        .compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    // Route `log` records into the tracing subscriber.
    tracing_log::LogTracer::init()?;

    if let Some(loki_url_str) = loki_url {
        let loki_url_parsed = Url::parse(&loki_url_str)?;

        let (loki_layer, task) = tracing_loki::builder()
            .label("app", "flux-worker")?
            .label("version", env!("CARGO_PKG_VERSION"))?
            .label("resource_id", resource_id.unwrap_or_default().to_string())?
            .label("port", port.unwrap_or(crate::config::DEFAULT_PORT).to_string())?
            .build_url(loki_url_parsed)?;

        tokio::spawn(task);
        tracing::subscriber::set_global_default(registry.with(loki_layer))?;
        debug!("Logging to console and Loki at {loki_url_str}");
    } else {
        tracing::subscriber::set_global_default(registry)?;
    }

    Ok(())
}
