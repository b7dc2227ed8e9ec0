use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::process;

use clap::Parser;

use lifecycle_server::config::{load_config, LogFormat};
use lifecycle_server::database::TcpProbeConnector;
use lifecycle_server::lifecycle::{
    fatal, ExitStatus, LifecycleController, LifecycleSettings, OsSignals, Shutdown,
};
use lifecycle_server::observability::{logging, metrics};
use lifecycle_server::HttpApp;

#[derive(Parser)]
#[command(name = "lifecycle-server")]
#[command(about = "HTTP server with ordered startup and graceful shutdown", long_about = None)]
struct Cli {
    /// Optional TOML config file; environment variables override it.
    #[arg(short, long, env = "CONFIG_PATH")]
    config: Option<PathBuf>,
}

fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("failed to build runtime: {e}");
            process::exit(1);
        }
    };

    // The panic hook has already logged anything that unwinds this far
    let status = panic::catch_unwind(AssertUnwindSafe(|| runtime.block_on(run(cli))))
        .unwrap_or(ExitStatus::Failure);

    // Exit without dropping the runtime: a timed out close is abandoned, not awaited
    process::exit(status.code());
}

async fn run(cli: Cli) -> ExitStatus {
    let loaded = match load_config(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            logging::init_logging(LogFormat::default());
            tracing::error!(error = %e, "Failed to load configuration");
            return ExitStatus::Failure;
        }
    };
    let config = loaded.config;

    logging::init_logging(config.observability.log_format);
    for warning in &loaded.warnings {
        tracing::warn!("{warning}");
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "lifecycle-server starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let settings = match LifecycleSettings::try_from(&config.server) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!(host = %config.server.host, error = %e, "Failed to start server");
            return ExitStatus::Failure;
        }
    };

    let database = match TcpProbeConnector::from_settings(&config.database) {
        Ok(database) => database,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start server");
            return ExitStatus::Failure;
        }
    };

    let signals = match OsSignals::install() {
        Ok(signals) => signals,
        Err(e) => {
            tracing::error!(error = %e, "Failed to install signal handlers");
            return ExitStatus::Failure;
        }
    };

    tracing::info!(
        port = settings.port,
        database = database.address(),
        shutdown_timeout = ?settings.shutdown_timeout,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    let (reporter, fatal_errors) = fatal::channel();
    let app = HttpApp::new(&config.server, shutdown.subscribe())
        .with_fatal_reporter(reporter.clone());

    let controller = LifecycleController::new(settings, database, app, signals)
        .with_shutdown(shutdown)
        .with_fatal_channel(reporter, fatal_errors);
    controller.fatal_reporter().install_panic_hook();

    let status = controller.run().await;
    tracing::info!(exit_code = status.code(), "Shutdown complete");
    status
}
