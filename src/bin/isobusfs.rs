//! ISOBUS FS command-line front end.
//!
//! Runs the interactive client (or a one-shot selftest) against a file
//! server built from a TOML volume configuration. Client and server talk
//! over the in-process datagram link; a kernel J1939/SocketCAN backend plugs
//! in behind the same `transport::Endpoint` seam.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing::error;
use tracing_subscriber::EnvFilter;

use isobusfs::client::{self, Engine};
use isobusfs::config::ServerConfig;
use isobusfs::server::Server;
use isobusfs::transport::mem::Hub;

fn parse_hex_addr(value: &str) -> Result<u8, String> {
    let trimmed = value.trim_start_matches("0x").trim_start_matches("0X");
    u8::from_str_radix(trimmed, 16).map_err(|e| format!("not a hex address: {e}"))
}

fn parse_hex_name(value: &str) -> Result<u64, String> {
    let trimmed = value.trim_start_matches("0x").trim_start_matches("0X");
    u64::from_str_radix(trimmed, 16).map_err(|e| format!("not a hex NAME: {e}"))
}

#[derive(Parser, Debug)]
#[command(name = "isobusfs", about = "ISO 11783-13 file-server client")]
struct Options {
    /// Run the interactive command loop instead of a one-shot selftest.
    #[arg(short = 'I', long)]
    interactive: bool,

    /// CAN interface name. Only the in-process link is built in; the flag is
    /// accepted for a pluggable J1939 backend.
    #[arg(short = 'i', long)]
    interface: Option<String>,

    /// Local (client) source address, hex.
    #[arg(short = 'a', long, value_parser = parse_hex_addr, default_value = "90",
          conflicts_with = "local_name")]
    local_address: u8,

    /// Local NAME for dynamic address claiming, hex.
    #[arg(short = 'n', long, value_parser = parse_hex_name)]
    local_name: Option<u64>,

    /// Remote (server) source address, hex.
    #[arg(short = 'r', long, value_parser = parse_hex_addr, default_value = "28",
          conflicts_with = "remote_name")]
    remote_address: u8,

    /// Remote NAME, hex.
    #[arg(short = 'm', long, value_parser = parse_hex_name)]
    remote_name: Option<u64>,

    /// Log level 0..4 (error, warn, info, debug, trace).
    #[arg(short = 'l', long, default_value_t = 2)]
    log_level: u8,

    /// Server volume configuration.
    #[arg(short = 'c', long)]
    config: PathBuf,
}

fn log_filter(level: u8) -> &'static str {
    match level {
        0 => "error",
        1 => "warn",
        2 => "info",
        3 => "debug",
        _ => "trace",
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let options = Options::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_filter(options.log_level))),
        )
        .init();

    if options.interface.is_some() || options.local_name.is_some() || options.remote_name.is_some()
    {
        tracing::warn!(
            "interface and NAME options take effect with an external J1939 backend"
        );
    }

    let config = match ServerConfig::load(&options.config) {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let hub = Hub::new();
    let server_endpoint = hub.endpoint(options.remote_address);
    let client_endpoint = hub.endpoint(options.local_address);

    let server = Server::new(&config, Instant::now());
    tokio::spawn(async move {
        if let Err(err) = server.run(server_endpoint).await {
            error!("server stopped: {err:?}");
        }
    });

    let (line_tx, line_rx) = mpsc::unbounded_channel();
    // In selftest mode the sender stays alive so the command channel does
    // not close before the run completes.
    let mut _line_keepalive = None;
    if options.interactive {
        tokio::spawn(async move {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let mut lines = stdin.lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line_tx.send(line).is_err() {
                    break;
                }
            }
        });
    } else {
        if line_tx.send("selftest".to_owned()).is_err() {
            return ExitCode::FAILURE;
        }
        _line_keepalive = Some(line_tx);
    }

    let engine = Engine::new(options.remote_address, Instant::now());
    match client::run(engine, client_endpoint, line_rx, options.interactive).await {
        Ok(0) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            error!("client stopped: {err:?}");
            ExitCode::FAILURE
        }
    }
}
