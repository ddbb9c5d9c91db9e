use clap::Parser;
use qr2key::config::ConfigLoader;
use qr2key::{logging, shared, ConnectionManager, LineSink, PortCatalog, StdoutSink};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

/// How often a dropped connection is retried with `--reconnect`.
const RECONNECT_INTERVAL: Duration = Duration::from_secs(2);

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Types what a serial QR/barcode scanner reads.",
    long_about = "Connects to a serial-attached QR/barcode scanner, splits its output into scans (on line feed, or after the line goes quiet) and writes each decoded scan to stdout."
)]
struct Args {
    /// List available serial ports and exit.
    #[arg(short, long)]
    list: bool,

    /// Print the port list as JSON.
    #[arg(long, requires = "list")]
    json: bool,

    /// Serial device to open. Defaults to the first listed port.
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate, overriding the configuration file.
    #[arg(short, long)]
    baud: Option<u32>,

    /// Configuration file to use instead of the standard locations.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Keep retrying while the scanner is unavailable or unplugged.
    #[arg(short, long)]
    reconnect: bool,

    /// Emit each line separately followed by an Enter key press.
    #[arg(long)]
    lines: bool,
}

fn load_config(path: Option<&std::path::Path>) -> ConfigLoader {
    let loaded = match path {
        Some(path) => ConfigLoader::load_from(path),
        None => ConfigLoader::load(),
    };
    loaded.unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config, using defaults: {}", e);
        ConfigLoader::with_defaults()
    })
}

fn list_ports(json: bool) -> ExitCode {
    let ports = match PortCatalog::system().try_list() {
        Ok(ports) => ports,
        Err(e) => {
            eprintln!("Failed to list serial ports: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if json {
        match serde_json::to_string_pretty(&ports) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                eprintln!("Failed to serialize port list: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else if ports.is_empty() {
        println!("No serial ports detected");
    } else {
        for port in &ports {
            println!("{:<24} {}", port.device, port.description);
        }
    }
    ExitCode::SUCCESS
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let loader = load_config(args.config.as_deref());

    if let Err(e) = logging::init(&loader.config().logging) {
        eprintln!("Warning: logging disabled: {}", e);
    }
    for warning in &loader.warnings {
        warn!(error = %warning, "Ignoring environment override");
    }
    let config = loader.into_config();

    if args.list {
        return list_ports(args.json);
    }

    let mut engine = config.serial.engine_config();
    if let Some(baud) = args.baud {
        engine.baud_rate = baud;
    }

    let sink = if args.lines {
        shared(LineSink::new(StdoutSink))
    } else {
        shared(StdoutSink)
    };
    let mut manager = ConnectionManager::system(engine, sink);
    info!(baud_rate = engine.baud_rate, encoding = engine.encoding.name(), "qr2key started");

    if let Err(e) = manager.connect(args.port.as_deref()) {
        if !args.reconnect {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
        warn!(error = %e, "Scanner unavailable, retrying");
    }

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(RECONNECT_INTERVAL);
    let mut status = ExitCode::SUCCESS;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                if manager.is_connected() {
                    continue;
                }
                if let Some(e) = manager.last_error() {
                    warn!(error = %e, "Connection lost");
                }
                if !args.reconnect {
                    status = ExitCode::FAILURE;
                    break;
                }
                if let Err(e) = manager.connect(args.port.as_deref()) {
                    warn!(error = %e, "Reconnect failed");
                }
            }
        }
    }

    manager.disconnect();
    info!("qr2key stopped");
    status
}

// --- Graceful Shutdown Handler ---
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Signal received, shutting down");
}
