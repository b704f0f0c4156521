//! Board configuration commands

use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::{Path, PathBuf};
use tkb_driver::BoardConfig;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the default configuration as TOML
    Show,

    /// Load and validate a configuration file
    Check {
        /// Path to a TOML file
        path: PathBuf,
    },
}

impl ConfigCommand {
    pub fn execute(&self) -> Result<()> {
        match self {
            ConfigCommand::Show => {
                print!("{}", BoardConfig::default().to_toml_string()?);
            },
            ConfigCommand::Check { path } => {
                let config = check(path)?;
                println!("{}: ok", path.display());
                println!(
                    "  status id 0x{:03X}, commands 0x{:03X}/0x{:03X}",
                    config.can.status_id, config.can.command_filter_id, config.can.command_filter_mask
                );
                println!(
                    "  watchdog {} ms / timeout {} ms, hard kill delay {} ms",
                    config.timing.watchdog_period_ms,
                    config.timing.watchdog_timeout_ms,
                    config.timing.hard_kill_delay_ms
                );
            },
        }
        Ok(())
    }
}

fn check(path: &Path) -> Result<BoardConfig> {
    BoardConfig::load(path).with_context(|| format!("loading {}", path.display()))
}
