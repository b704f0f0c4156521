//! # TKB CLI
//!
//! Bench tool for the Thruster Kill Board.
//!
//! ```bash
//! # Decode a payload seen on the bus
//! tkb-cli decode 4b52484100
//!
//! # Build frames in candump notation
//! tkb-cli encode kill hard-unkill
//! tkb-cli encode thrust FHL 0.5
//!
//! # Pulse widths for the default PWM clock
//! tkb-cli pulse --steps 4
//!
//! # Talk to a real board (Linux)
//! tkb-cli send --interface can0 kill soft-kill
//! tkb-cli monitor --interface can0
//!
//! # Scripted run against simulated hardware
//! tkb-cli simulate --step "kill hard-unkill" --step "thrust FHL 1.0" --step "magnet on-off off"
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod utils;

use commands::{
    ConfigCommand, DecodeCommand, EncodeCommand, MonitorCommand, PulseCommand, SendCommand,
    SimulateCommand,
};

/// TKB CLI - Thruster Kill Board bench tool
#[derive(Parser, Debug)]
#[command(name = "tkb-cli")]
#[command(about = "Bench tool for the Thruster Kill Board", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode a frame payload given as hex
    Decode {
        #[command(flatten)]
        args: DecodeCommand,
    },

    /// Encode a status or command frame
    #[command(subcommand)]
    Encode(EncodeCommand),

    /// Print the speed → pulse width table
    Pulse {
        #[command(flatten)]
        args: PulseCommand,
    },

    /// Send a command frame over SocketCAN
    Send {
        #[command(flatten)]
        args: SendCommand,
    },

    /// Print status frames from the bus
    Monitor {
        #[command(flatten)]
        args: MonitorCommand,
    },

    /// Run a scripted scenario against a simulated board
    Simulate {
        #[command(flatten)]
        args: SimulateCommand,
    },

    /// Board configuration files
    #[command(subcommand)]
    Config(ConfigCommand),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tkb_cli=info,tkb_driver=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Decode { args } => args.execute(),
        Commands::Encode(cmd) => cmd.execute(),
        Commands::Pulse { args } => args.execute(),
        Commands::Send { args } => args.execute(),
        Commands::Monitor { args } => args.execute(),
        Commands::Simulate { args } => args.execute(),
        Commands::Config(cmd) => cmd.execute(),
    }
}
