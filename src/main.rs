//! mailsink - email notifications for structured event records.

use std::io::IsTerminal;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use mailsink::cli::{Cli, LogFormat};
use mailsink::config::{Config, RuntimeConfig, TlsMode};
use mailsink::{MailSink, MetricsServer};

/// Initialize the tracing subscriber with the specified log format.
///
/// Logs go to stderr; stdin carries the event stream.
fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    match format {
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal())
                .with_env_filter(filter)
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .flatten_event(true)
                .with_env_filter(filter)
                .init();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.log_format);

    info!(config_path = %cli.config.display(), "Loading configuration");

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, path = %cli.config.display(), "Failed to load configuration");
            std::process::exit(1);
        }
    };

    info!("Validating configuration");
    if let Err(errors) = config.validate() {
        for e in &errors {
            error!(error = %e, "Configuration validation error");
        }
        error!(
            error_count = errors.len(),
            "Configuration validation failed"
        );
        std::process::exit(1);
    }

    let runtime_config = config.compile()?;

    if cli.validate {
        print_summary(&cli, &runtime_config);
        return Ok(());
    }

    info!(config_path = %cli.config.display(), "mailsink starting");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(run(runtime_config));
    // A stdin read may still be parked on a blocking thread after Ctrl-C.
    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}

fn print_summary(cli: &Cli, config: &RuntimeConfig) {
    let tls = match config.smtp.tls {
        TlsMode::None => "none",
        TlsMode::StarttlsAuto => "starttls (opportunistic)",
        TlsMode::Tls => "implicit tls",
    };
    let destination = &config.destination;
    let recipients = |static_value: &str, key: &Option<String>| match key {
        Some(key) => format!("record field '{}', else '{}'", key, static_value),
        None => format!("'{}'", static_value),
    };

    println!("Configuration is valid: {}", cli.config.display());
    println!(
        "  SMTP: {}:{} (tls: {}, auth: {})",
        config.smtp.host,
        config.smtp.port,
        tls,
        if config.smtp.credentials.is_some() {
            "plain"
        } else {
            "none"
        }
    );
    println!("  From: {}", config.from);
    println!(
        "  To: {}",
        recipients(&destination.to.static_value, &destination.to.record_key)
    );
    println!(
        "  Cc: {}",
        recipients(&destination.cc.static_value, &destination.cc.record_key)
    );
    println!(
        "  Bcc: {}",
        recipients(&destination.bcc.static_value, &destination.bcc.record_key)
    );
    println!("  Subject: {}", config.render.subject.source());
    println!(
        "  Metrics: {} (port {})",
        if config.metrics.enabled {
            "enabled"
        } else {
            "disabled"
        },
        config.metrics.port
    );
}

/// Main async entry point: dispatch stdin events until EOF or Ctrl-C.
async fn run(runtime_config: RuntimeConfig) -> Result<()> {
    let cancel = CancellationToken::new();

    let metrics_handle = if runtime_config.metrics.enabled {
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();
        let server = MetricsServer::with_ready_signal(runtime_config.metrics.port, ready_tx);
        let cancel_metrics = cancel.clone();
        info!(port = runtime_config.metrics.port, "Starting metrics server");
        let handle = tokio::spawn(async move {
            if let Err(e) = server.run(cancel_metrics).await {
                error!(error = %e, "Metrics server error");
            }
        });
        // Counters emitted before the recorder is installed are lost.
        let _ = tokio::time::timeout(Duration::from_secs(2), ready_rx).await;
        Some(handle)
    } else {
        info!("Metrics server disabled");
        None
    };

    let sink = MailSink::from_config(&runtime_config)?;

    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c signal");
            return;
        }
        info!("Received shutdown signal, flushing pending records");
        cancel_clone.cancel();
    });

    let stdin = BufReader::new(tokio::io::stdin());
    let result = mailsink::input::run(stdin, &sink, &runtime_config.input, cancel.clone()).await;

    cancel.cancel();
    if let Some(handle) = metrics_handle {
        let _ = tokio::time::timeout(Duration::from_secs(2), handle).await;
    }

    match result {
        Ok(stats) => {
            info!(
                sent = stats.sent,
                failed = stats.failed,
                "mailsink shutdown complete"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Input error");
            Err(anyhow::anyhow!("Input error: {}", e))
        }
    }
}
