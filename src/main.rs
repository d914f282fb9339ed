mod commands;
mod config;
mod dump;

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use logpane_convert::WireFormat;
use logpane_net::{Receiver, ReceiverConfig};
use logpane_types::ArcRecord;
use logpane_view::{Coordinator, SearchCriteria, ViewHandle, ViewSettings, view_channel};

use crate::commands::{COMMANDS, Input};
use crate::config::Config;
use crate::dump::Dump;

/// Logpane - a live, filtered view of log4j/Chainsaw and Logcat records
/// received over UDP
#[derive(Parser, Debug)]
#[command(name = "logpane")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to logpane.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Wire format to listen for (chainsaw or logcat)
    #[arg(long)]
    format: Option<WireFormat>,

    /// UDP port (defaults to the configured port of the format)
    #[arg(long)]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    bind: IpAddr,

    /// Initial minimum level (TRACE, DEBUG, INFO, WARN, ERROR, FATAL)
    #[arg(long)]
    threshold: Option<String>,

    /// Records kept per level and application
    #[arg(long)]
    max_per_level: Option<usize>,

    /// Accept Chainsaw events without the log4j namespace
    #[arg(long)]
    allow_anonymous: Option<bool>,

    /// Only show records containing this text
    #[arg(long)]
    search: Option<String>,

    /// Show records that do not contain the search text instead
    #[arg(long, requires = "search")]
    invert_search: bool,

    /// Print visible records as multi-line text instead of JSON
    #[arg(long)]
    text: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = run(args).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

/// Merge the config file with command-line overrides
fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if let Some(format) = args.format {
        config.log_type = format;
    }
    if let Some(port) = args.port {
        config.set_port(port);
    }
    if let Some(threshold) = &args.threshold {
        config.initial_threshold = threshold.clone();
    }
    if let Some(max) = args.max_per_level {
        config.max_logs_per_level = max;
    }
    if let Some(allow) = args.allow_anonymous {
        config.allow_anonymous_logs = allow;
    }

    config.validate()?;
    Ok(config)
}

async fn run(args: Args) -> Result<()> {
    let config = load_config(&args).context("failed to load configuration")?;
    debug!(?config, "configuration loaded");

    let settings = ViewSettings {
        threshold: config.threshold()?,
        max_per_level: config.max_logs_per_level,
        search: SearchCriteria {
            text: args.search.clone(),
            inverted: args.invert_search,
        },
    };
    let coordinator = Arc::new(Coordinator::new(settings).with_timing_trace(config.timing_trace));
    let mut changes = coordinator.subscribe();
    let mut dump = Dump::new(std::io::stdout(), args.text);

    let cancel = CancellationToken::new();
    let (handle, view_loop) = view_channel(
        Arc::clone(&coordinator),
        Duration::from_millis(config.tick_interval_ms),
    );
    let view_task = tokio::spawn(view_loop.run(cancel.clone()));

    let sink = {
        let coordinator = Arc::clone(&coordinator);
        move |record: ArcRecord| coordinator.enqueue(record)
    };
    let mut receiver = Receiver::new(sink);
    let receiver_config = ReceiverConfig {
        format: config.log_type,
        bind_address: args.bind,
        port: config.port(),
        options: config.convert_options(),
        message_trace: config.message_trace,
    };
    let addr = receiver
        .start(receiver_config)
        .await
        .with_context(|| format!("cannot receive {} logs", config.log_type))?;
    info!(%addr, format = %config.log_type, "waiting for logs, type 'help' for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }

            Some(change) = changes.recv() => {
                dump.apply(change, &coordinator)?;
            }

            line = lines.next_line(), if stdin_open => {
                match line? {
                    Some(line) => handle_line(&line, &handle, &coordinator),
                    None => stdin_open = false,
                }
            }
        }
    }

    receiver.stop();
    cancel.cancel();
    view_task.await?;
    Ok(())
}

fn handle_line(line: &str, handle: &ViewHandle, coordinator: &Coordinator) {
    match commands::parse(line) {
        Ok(None) => {}
        Ok(Some(Input::View(command))) => {
            if let Err(e) = handle.send(command) {
                warn!(error = %e, "command dropped");
            }
        }
        Ok(Some(Input::ListApplications)) => {
            for app in coordinator.applications() {
                eprintln!(
                    "{} [{}] threshold={} buffered={}",
                    app.name,
                    if app.active { "on" } else { "off" },
                    app.threshold,
                    app.buffered
                );
            }
        }
        Ok(Some(Input::Help)) => {
            for command in COMMANDS {
                eprintln!("{:<36} {}", command.usage, command.description);
            }
        }
        Err(e) => eprintln!("{e}"),
    }
}
