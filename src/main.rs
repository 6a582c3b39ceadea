//! hvbench: round trip latency benchmark for stream sockets
//!
//! One process runs as the echo server, the other as the client that
//! drives the benchmark over two connections:
//! - a long-lived control connection carrying 32-bit command words
//! - a fresh data connection per run carrying the timed payload
//!
//! Benchmarks:
//! - Message round trip time over a sweep of message sizes
//! - Connection setup/teardown round trip time
//!
//! Transports: TCP everywhere, vsock on Linux.

mod bench;
mod buffer;
mod client;
mod config;
mod control;
mod data;
mod error;
mod protocol;
mod report;
mod server;
#[cfg(test)]
mod test_util;
mod transport;
mod wire;

use client::{Client, Plan};
use config::{Config, Role, TransportKind};
use server::Server;
use transport::{TcpTransport, Transport};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        role = ?config.role,
        transport = ?config.transport,
        benchmark = ?config.benchmark,
        max_message_size = config.max_message_size,
        "Starting hvbench"
    );

    match config.transport {
        TransportKind::Tcp => run_tcp(&config),
        TransportKind::Vsock => run_vsock(&config),
    }
}

fn run_tcp(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let host = match &config.role {
        Role::Server => config.listen.clone(),
        Role::Client { target } => target.clone(),
    };
    let transport =
        TcpTransport::new(host, config.control_port, config.data_port).with_timeout(config.timeout);
    run(config, transport)
}

/// Run over vsock (Linux only)
#[cfg(target_os = "linux")]
fn run_vsock(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use transport::{vsock::CID_ANY, VsockTransport};

    let cid = match &config.role {
        Role::Server => CID_ANY,
        Role::Client { target } => target.parse()?,
    };
    run(config, VsockTransport::new(cid).with_timeout(config.timeout))
}

#[cfg(not(target_os = "linux"))]
fn run_vsock(_config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    Err("vsock transport is only supported on Linux".into())
}

fn run<T: Transport>(config: &Config, transport: T) -> Result<(), Box<dyn std::error::Error>> {
    match config.role {
        Role::Server => {
            let summary = Server::new(transport, config.max_message_size).run()?;
            info!(
                runs_completed = summary.runs_completed,
                runs_aborted = summary.runs_aborted,
                close_reason = ?summary.close_reason,
                "Server finished"
            );
            Ok(())
        }
        Role::Client { .. } => {
            let name = transport.name();
            let report =
                Client::new(transport, Plan::from_config(config), config.max_message_size).run()?;

            if let Some(path) = &config.output {
                report::write_json(&report, name, path)?;
                info!(path = %path.display(), "Wrote report");
            }

            info!(
                runs = report.completed.len(),
                complete = report.is_complete(),
                "Sweep finished"
            );
            match report.aborted {
                Some(aborted) => Err(Box::new(aborted.error)),
                None => Ok(()),
            }
        }
    }
}
