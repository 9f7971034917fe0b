use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use decisify::cli::{self, Cli, Commands, RawModeGuard};
use decisify::config::{AppConfig, LoggingConfig};
use decisify::error::{DecisifyError, Result};
use decisify::persistence::{DecisionStore, JsonFileStore, MemoryStore};
use decisify::polling::HttpSnapshotSource;
use decisify::runtime::DashboardRuntime;
use decisify::services::StatusServer;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config)?;
    if let Err(errors) = config.validate() {
        return Err(DecisifyError::InvalidConfig(errors.join("; ")));
    }

    match cli.command {
        Some(Commands::Snapshot { pretty, seed }) => {
            init_logging_simple();
            println!("{}", cli::render_snapshot(pretty, seed)?);
        }
        Some(Commands::Serve { port }) => {
            init_logging(&config.logging);
            run_server(config, port).await?;
        }
        Some(Commands::Run {
            demo,
            store,
            no_keys,
        }) => {
            init_logging(&config.logging);
            run_dashboard(config, demo, store, !no_keys).await?;
        }
        None => {
            init_logging(&config.logging);
            run_dashboard(config, false, None, true).await?;
        }
    }

    Ok(())
}

async fn run_dashboard(
    config: AppConfig,
    demo: bool,
    store_path: Option<PathBuf>,
    keyboard: bool,
) -> Result<()> {
    let source = Arc::new(HttpSnapshotSource::new(&config.poller)?);
    let store: Box<dyn DecisionStore> = match store_path.or_else(|| config.storage.path.clone()) {
        Some(path) => {
            info!("Persisting decisions to {}", path.display());
            Box::new(JsonFileStore::open(path)?)
        }
        None => Box::new(MemoryStore::new()),
    };

    let mut runtime = DashboardRuntime::new(config, source, store).with_keyboard(keyboard);
    if demo {
        runtime = runtime.start_in_demo();
    }

    let _raw_mode = if keyboard {
        Some(RawModeGuard::enable()?)
    } else {
        None
    };

    let handle = runtime.spawn();
    let mut views = handle.subscribe();
    let mut last_line = String::new();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            changed = views.changed() => {
                if changed.is_err() {
                    // Runtime stopped on its own (quit key)
                    break;
                }
                let view = views.borrow_and_update().clone();
                let line = cli::status_line(&view);
                if line != last_line {
                    cli::print_view(&view)?;
                    last_line = line;
                }
            }
        }
    }

    handle.shutdown().await
}

async fn run_server(config: AppConfig, port: Option<u16>) -> Result<()> {
    let mut server_config = config.server;
    if let Some(port) = port {
        server_config.port = port;
    }
    StatusServer::new(server_config).run(shutdown_signal()).await
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},decisify=debug", config.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if config.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn init_logging_simple() {
    // Minimal logging for one-shot commands
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::WARN)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
