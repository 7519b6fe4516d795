//! Entry point for `motor-link`.
//!
//! Parses CLI arguments and runs either the **controller** or the **motors**
//! node.  Protocol work lives in the library; `main.rs` owns process setup
//! (logging, signal handling, argument parsing, socket binding).

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use motor_link::config::{ConfigError, ControllerConfig, MotorsConfig, RetryPolicy};
use motor_link::controller::Controller;
use motor_link::input::StdinButtons;
use motor_link::motor::LogMotor;
use motor_link::receiver::CommandReceiver;
use motor_link::socket::UdpTransport;

/// Stop-and-wait motor commands over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Read button input (lines on stdin) and send commands to the motors node.
    Controller {
        /// Local IP to bind (port 5020).
        #[arg(short = 'c', long = "client")]
        client: String,
        /// IP of the motors node.
        #[arg(short = 'o', long = "other")]
        other: String,
        /// Port of the motors node.
        #[arg(short = 'p', long = "port")]
        port: Option<u16>,
        /// Time to wait for each ACK.
        #[arg(long, default_value_t = 5000)]
        ack_timeout_ms: u64,
        /// Transmissions per command before giving up.
        #[arg(long, default_value_t = 10)]
        max_attempts: u32,
        /// Delay between input polls.
        #[arg(long, default_value_t = 10)]
        poll_interval_ms: u64,
        /// Consecutive identical polls before a command is sent.
        #[arg(long, default_value_t = 3)]
        debounce: u32,
    },
    /// Receive commands and drive the motors.
    Motors {
        /// Local IP to listen on.
        #[arg(short = 'i', long = "ip")]
        ip: String,
        /// Local port to listen on.
        #[arg(short = 'p', long = "port")]
        port: Option<u16>,
        /// Receive window between shutdown checks while idle.
        #[arg(long, default_value_t = 10_000)]
        idle_timeout_ms: u64,
        /// How long each movement is held.
        #[arg(long, default_value_t = 10)]
        actuation_ms: u64,
        /// Copy command payloads into ACKs.
        #[arg(long)]
        echo_payload: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let cancel = CancellationToken::new();
    spawn_ctrl_c(cancel.clone());

    match cli.mode {
        Mode::Controller {
            client,
            other,
            port,
            ack_timeout_ms,
            max_attempts,
            poll_interval_ms,
            debounce,
        } => {
            let retry = RetryPolicy::new(Duration::from_millis(ack_timeout_ms), max_attempts)?;
            let config = ControllerConfig::from_cli(&client, &other, port)?
                .with_retry(retry)
                .with_polling(Duration::from_millis(poll_interval_ms), debounce)?;

            let transport = bind(config.bind).await?;
            log::info!("Controller ready; type cw / ccw / stop and press enter");
            let mut controller = Controller::from_config(transport, StdinButtons::spawn(), &config);
            let stats = controller.run(&cancel).await;
            log::info!("Delivered {} command(s), {} failed", stats.delivered, stats.failed);
        }
        Mode::Motors {
            ip,
            port,
            idle_timeout_ms,
            actuation_ms,
            echo_payload,
        } => {
            let mut config = MotorsConfig::from_cli(&ip, port)?
                .with_idle_timeout(Duration::from_millis(idle_timeout_ms))?;
            config.actuation = Duration::from_millis(actuation_ms);
            config.echo_payload = echo_payload;

            let transport = bind(config.bind).await?;
            let mut receiver = CommandReceiver::new(transport, LogMotor::new(config.actuation))
                .with_idle_timeout(config.idle_timeout)
                .with_echo_payload(config.echo_payload);
            let stats = receiver.run(&cancel).await;
            log::info!(
                "Applied {} command(s), {} duplicate(s), {} rejected, {} malformed, {} failed",
                stats.applied,
                stats.duplicates,
                stats.rejected,
                stats.malformed,
                stats.motor_failures
            );
        }
    }
    Ok(())
}

async fn bind(addr: SocketAddr) -> anyhow::Result<UdpTransport> {
    UdpTransport::bind(addr)
        .await
        .map_err(|source| ConfigError::Bind { addr, source })
        .context("could not open UDP socket")
}

fn spawn_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::info!("Interrupted; shutting down");
                cancel.cancel();
            }
            Err(e) => log::error!("Could not listen for ctrl-c: {e}"),
        }
    });
}
