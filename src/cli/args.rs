//! CLI argument definitions using clap derive
//!
//! Defines all command-line arguments and subcommands.

use crate::config::ActuatorKind;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// NVIDIA GPU fan controller
///
/// Drives the GPU fans from the core temperature and, on GDDR6 boards, the
/// memory-junction temperature read straight from the GPU registers.
#[derive(Parser, Debug)]
#[command(name = "autofan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "AUTOFAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Target GPU by index (0-based)
    #[arg(long, global = true)]
    pub gpu: Option<u32>,

    /// Dry run mode - don't actually touch the fans
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the fan control loop
    Run(RunArgs),

    /// Show one telemetry sample
    Status(ProbeArgs),

    /// Show memory-junction probe details and a raw reading
    Memtemp(ProbeArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Overrides for locating the memory-junction sensor
#[derive(Parser, Debug, Default)]
pub struct ProbeArgs {
    /// Skip the memory-junction temperature
    #[arg(long)]
    pub no_memtemp: bool,

    /// GPU architecture (ga102, ga104, ga106, ad102, ad103, ad104)
    #[arg(long)]
    pub arch: Option<String>,

    /// Physical address of BAR0 (hex with 0x prefix, or decimal)
    #[arg(long, value_parser = parse_address)]
    pub bar0: Option<u64>,
}

/// Arguments for the control loop command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Control loop interval in seconds
    #[arg(short, long)]
    pub interval: Option<f64>,

    /// Temperature at or below which the fans run at the minimum duty
    #[arg(long, value_name = "CELSIUS")]
    pub fan_temp_threshold: Option<f32>,

    /// Temperature at or above which the fans run at 100%
    #[arg(long, value_name = "CELSIUS")]
    pub fan_temp_max: Option<f32>,

    /// Lowest fan duty ever commanded (0-100)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub min_duty: Option<u8>,

    /// Fan backend
    #[arg(long, value_enum)]
    pub actuator: Option<ActuatorKind>,

    /// Do not send sd_notify messages
    #[arg(long)]
    pub no_watchdog: bool,

    /// Run a single tick and exit
    #[arg(long, conflicts_with = "ticks")]
    pub once: bool,

    /// Exit after this many ticks
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub ticks: Option<u64>,

    #[command(flatten)]
    pub probe: ProbeArgs,
}

impl RunArgs {
    /// Tick limit implied by `--once` or `--ticks`
    pub fn max_ticks(&self) -> Option<u64> {
        if self.once {
            Some(1)
        } else {
            self.ticks
        }
    }
}

/// Output format
#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format for machine parsing
    Json,
    /// Compact single-line format
    Compact,
}

fn parse_address(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => s.parse::<u64>(),
    };
    parsed.map_err(|e| format!("invalid address '{}': {}", s, e))
}

/// Generate shell completions and print to stdout
pub fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_status() {
        let args = Cli::try_parse_from(["autofan", "status"]).unwrap();
        assert!(matches!(args.command, Commands::Status(_)));
    }

    #[test]
    fn test_cli_parse_global_flags() {
        let args =
            Cli::try_parse_from(["autofan", "-v", "--gpu", "1", "--dry-run", "status"]).unwrap();
        assert!(args.verbose);
        assert!(args.dry_run);
        assert_eq!(args.gpu, Some(1));
    }

    #[test]
    fn test_cli_parse_run_args() {
        let args = Cli::try_parse_from([
            "autofan",
            "run",
            "--interval",
            "0.5",
            "--fan-temp-threshold",
            "65",
            "--fan-temp-max",
            "88",
            "--min-duty",
            "20",
            "--actuator",
            "nvidia-settings",
            "--ticks",
            "3",
            "--arch",
            "ga104",
            "--bar0",
            "0xfb000000",
        ])
        .unwrap();

        if let Commands::Run(run) = args.command {
            assert_eq!(run.interval, Some(0.5));
            assert_eq!(run.fan_temp_threshold, Some(65.0));
            assert_eq!(run.fan_temp_max, Some(88.0));
            assert_eq!(run.min_duty, Some(20));
            assert_eq!(run.actuator, Some(ActuatorKind::NvidiaSettings));
            assert_eq!(run.max_ticks(), Some(3));
            assert_eq!(run.probe.arch.as_deref(), Some("ga104"));
            assert_eq!(run.probe.bar0, Some(0xfb00_0000));
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_cli_once_means_one_tick() {
        let args = Cli::try_parse_from(["autofan", "run", "--once"]).unwrap();
        if let Commands::Run(run) = args.command {
            assert_eq!(run.max_ticks(), Some(1));
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_cli_once_conflicts_with_ticks() {
        let result = Cli::try_parse_from(["autofan", "run", "--once", "--ticks", "2"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_min_duty_validation() {
        let result = Cli::try_parse_from(["autofan", "run", "--min-duty", "150"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_zero_ticks_rejected() {
        let result = Cli::try_parse_from(["autofan", "run", "--ticks", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0xfb000000"), Ok(0xfb00_0000));
        assert_eq!(parse_address("0XFB00_0000"), Ok(0xfb00_0000));
        assert_eq!(parse_address("4211081216"), Ok(0xfb00_0000));
        assert!(parse_address("0xzz").is_err());
    }
}
