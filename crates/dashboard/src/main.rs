//! Trading Monitor - live dashboard for the trading bot
//!
//! Main entry point

use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use crossterm::event::{Event, EventStream, KeyCode, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use monitor_core::{LogEntry, MonitorConfig};
use monitor_dashboard::{project, Tui};
use monitor_feed::LiveMonitor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config_path = env::var("MONITOR_CONFIG").ok().map(PathBuf::from);
    let config = MonitorConfig::load(config_path.as_deref())?;

    init_tracing(&config)?;
    info!("Starting Trading Monitor v{}", env!("CARGO_PKG_VERSION"));

    let mut monitor = LiveMonitor::new(config.clone());
    monitor.start()?;

    let result = if config.ui.headless {
        run_headless(&monitor).await
    } else {
        run_tui(&monitor).await
    };

    monitor.stop().await;

    if let Err(e) = &result {
        error!("Dashboard error: {}", e);
    }
    info!("Monitor shutdown complete");
    result
}

fn init_tracing(config: &MonitorConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if config.ui.headless {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        // stdout belongs to the terminal UI
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.ui.log_file)?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        }
        _ = terminate => {
            info!("Received termination signal");
        }
    }
}

/// Mirror new log entries to tracing until a shutdown signal
async fn run_headless(monitor: &LiveMonitor) -> anyhow::Result<()> {
    let state = monitor.state();
    let mut changes = monitor.changes();
    let mut last_id = 0u64;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    info!("Running headless, press Ctrl+C to stop");

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }

                let mut fresh: Vec<LogEntry> = state
                    .logs()
                    .into_iter()
                    .take_while(|entry| entry.id() > last_id)
                    .collect();
                fresh.reverse();

                for entry in fresh {
                    last_id = entry.id();
                    info!(target: "monitor::log", "{}", entry);
                }
            }
        }
    }

    Ok(())
}

/// Redraw on every state revision; quit on q, Esc or Ctrl+C
async fn run_tui(monitor: &LiveMonitor) -> anyhow::Result<()> {
    let state = monitor.state();
    let mut changes = monitor.changes();
    let mut keys = EventStream::new();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut tui = Tui::enter()?;
    tui.draw(&project(&state.snapshot()))?;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                tui.draw(&project(&state.snapshot()))?;
            }
            Some(Ok(event)) = keys.next() => {
                match event {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        let ctrl_c = key.code == KeyCode::Char('c')
                            && key.modifiers.contains(KeyModifiers::CONTROL);
                        if ctrl_c || matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                            break;
                        }
                    }
                    Event::Resize(_, _) => tui.draw(&project(&state.snapshot()))?,
                    _ => {}
                }
            }
        }
    }

    tui.exit()?;
    Ok(())
}
