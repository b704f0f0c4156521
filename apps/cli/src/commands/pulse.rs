//! Speed → pulse width table

use crate::utils::parse_thruster;
use anyhow::{Result, bail};
use clap::Args;
use std::path::PathBuf;
use tkb_driver::{BoardConfig, THRUSTER_CHANNELS, ThrustMapper, ThrusterChannel};
use tkb_protocol::ThrusterId;

#[derive(Args, Debug)]
pub struct PulseCommand {
    /// Board configuration file (defaults apply otherwise)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the PWM clock
    #[arg(long)]
    pub clock_hz: Option<u32>,

    /// Rows between neutral and each end
    #[arg(short, long, default_value_t = 4)]
    pub steps: u32,

    /// Only this thruster
    #[arg(short, long, value_parser = parse_thruster)]
    pub thruster: Option<ThrusterId>,
}

impl PulseCommand {
    pub fn execute(&self) -> Result<()> {
        let mut config = match &self.config {
            Some(path) => BoardConfig::load(path)?,
            None => BoardConfig::default(),
        };
        if let Some(clock_hz) = self.clock_hz {
            config.pwm.clock_hz = clock_hz;
            config.validate()?;
        }
        if self.steps == 0 {
            bail!("--steps must be at least 1");
        }

        let mapper = config.thrust_mapper();
        let channels: Vec<ThrusterChannel> = match self.thruster {
            Some(id) => vec![ThrusterChannel::of(id)],
            None => THRUSTER_CHANNELS.to_vec(),
        };

        println!(
            "PWM clock {} Hz, period {} us ({} ticks)",
            config.pwm.clock_hz,
            config.pwm.period_us,
            mapper.period_ticks(channels[0].generator)
        );
        for line in render_table(&mapper, &channels, self.steps) {
            println!("{}", line);
        }
        Ok(())
    }
}

fn speeds(steps: u32) -> Vec<f32> {
    let steps = steps as i32;
    (-steps..=steps).map(|i| i as f32 / steps as f32).collect()
}

pub fn render_table(mapper: &ThrustMapper, channels: &[ThrusterChannel], steps: u32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut header = format!("{:>7}", "speed");
    for channel in channels {
        header.push_str(&format!(" {:>14}", channel.to_string()));
    }
    lines.push(header);

    for speed in speeds(steps) {
        let mut row = format!("{:>+7.3}", speed);
        for channel in channels {
            row.push_str(&format!(" {:>14}", mapper.pulse_ticks(speed, *channel)));
        }
        lines.push(row);
    }
    lines
}
