//! Demo echo server built on the corbel framework.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use clap::Parser;
use corbel_server::{Server, ServerConfig, logging, signal};
use crossbeam_channel::RecvTimeoutError;

#[derive(Parser)]
#[command(name = "corbel-echod")]
#[command(about = "Echo server speaking the corbel wire protocol")]
struct Args {
    /// Path to a TOML server configuration
    config: Option<PathBuf>,

    /// Print an example configuration and exit
    #[arg(long)]
    print_config: bool,
}

const EXAMPLE_CONFIG: &str = r#"addr = "127.0.0.1:60606"
timeout = 0
buffer = 32
msglvl = "all"
reqlen = 0
framing = "length-prefixed"
"#;

fn main() {
    let args = Args::parse();

    if args.print_config {
        print!("{EXAMPLE_CONFIG}");
        return;
    }

    let config = match &args.config {
        Some(path) => match ServerConfig::load(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("failed to load config: {err}");
                std::process::exit(1);
            }
        },
        None => ServerConfig::new("127.0.0.1:60606"),
    };

    if let Err(err) = run(config) {
        eprintln!("server error: {err}");
        std::process::exit(1);
    }
}

fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    logging::init("info");
    let shutdown = signal::install_signal_handler();

    let mut server = Server::bind_tcp(config)?;
    server.register("echo", "blob", |args| Ok(args[0].clone()))?;
    tracing::info!(addr = server.addr(), "serving");

    while !shutdown.load(Ordering::Relaxed) {
        match server.events().recv_timeout(Duration::from_millis(250)) {
            Ok(event) => tracing::info!("{event}"),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    server.quit();
    for event in server.events().try_iter() {
        tracing::info!("{event}");
    }
    Ok(())
}
