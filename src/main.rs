use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

use smtp_auth_honeypot::capture::{CaptureLog, EventSink, SINK_CAPACITY};
use smtp_auth_honeypot::{daemon, DenyAll, Opt, SmtpConfig, SmtpHoneypot};

fn main() -> Result<()> {
    let opt = Opt::from_args();

    let default_level = if opt.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = SmtpConfig::from(&opt);
    config.validate()?;

    if let Some(log_path) = &config.log_file {
        if let Some(parent) = log_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory: {:?}", parent))?;
                tracing::info!(?parent, "created log directory");
            }
        }
    }

    // Fork before the runtime exists; tokio does not survive a fork.
    if opt.daemon {
        tracing::info!("starting daemon mode");
        daemon::daemonize()?;
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    runtime.block_on(run(config))
}

async fn run(config: SmtpConfig) -> Result<()> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = std::process::id(),
        ports = ?config.ports,
        hostname = %config.hostname,
        "SMTP auth honeypot starting"
    );

    let capture = CaptureLog::new(config.log_file.clone(), config.raw_display)
        .context("Failed to open capture log")?;
    let (sink, rx) = EventSink::channel(SINK_CAPACITY);
    let capture_task = capture.spawn(rx);

    let honeypot = Arc::new(SmtpHoneypot::new(config, Arc::new(DenyAll), sink)?);

    tokio::select! {
        res = honeypot.clone().run() => res?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, shutting down");
        }
    }

    // Live sessions still hold sink clones; give queued attempts a moment to land.
    drop(honeypot);
    let _ = tokio::time::timeout(Duration::from_secs(1), capture_task).await;
    Ok(())
}
