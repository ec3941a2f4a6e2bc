//! Command-line parsing for the `neros` LCM fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{KernelKind, SPEED_OF_LIGHT_KMS, TableFormat};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "neros",
    version,
    about = "Luminous convolution model (LCM) rotation-curve fitter"
)]
pub struct Cli {
    /// Log filter used when RUST_LOG is not set (e.g. `info`, `neros_lcm=debug`).
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit one galaxy against a reference curve and print diagnostics.
    Fit(FitArgs),
    /// Fit every galaxy table in a directory against one reference curve.
    Batch(BatchArgs),
    /// Fit a seeded synthetic galaxy against the built-in reference curve.
    Demo(DemoArgs),
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Two-column (radius, velocity) reference curve table.
    #[arg(long, value_name = "FILE")]
    pub reference: PathBuf,

    /// Rotation-curve table (Rad, Vobs, errV, Vgas, Vdisk, Vbul).
    #[arg(long, value_name = "FILE")]
    pub galaxy: PathBuf,

    #[command(flatten)]
    pub model: ModelArgs,
}

#[derive(Debug, Args, Clone)]
pub struct BatchArgs {
    #[arg(long, value_name = "FILE")]
    pub reference: PathBuf,

    /// Directory of rotation-curve tables.
    #[arg(long, value_name = "DIR")]
    pub galaxies: PathBuf,

    #[command(flatten)]
    pub model: ModelArgs,
}

#[derive(Debug, Args, Clone)]
pub struct DemoArgs {
    /// Seed for the synthetic observation noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Noise standard deviation (km/s) added to the synthetic observations.
    #[arg(long, default_value_t = 2.0)]
    pub noise: f64,

    /// Number of synthetic galaxy points.
    #[arg(long, default_value_t = 24)]
    pub points: usize,

    #[command(flatten)]
    pub model: ModelArgs,
}

/// Options shared by every fitting command.
#[derive(Debug, Args, Clone)]
pub struct ModelArgs {
    /// Kernel formulation.
    #[arg(long, value_enum, default_value_t = KernelKind::Stable)]
    pub kernel: KernelKind,

    /// Speed of light in the data's velocity unit.
    #[arg(long = "c", default_value_t = SPEED_OF_LIGHT_KMS)]
    pub speed_of_light: f64,

    /// Optimizer evaluation budget per start.
    #[arg(long, default_value_t = 10_000)]
    pub max_evals: usize,

    /// Smallest physical alpha of the multi-start grid.
    #[arg(long, default_value_t = 0.1)]
    pub alpha_min: f64,

    /// Largest physical alpha of the multi-start grid.
    #[arg(long, default_value_t = 10.0)]
    pub alpha_max: f64,

    /// Multi-start grid size; 1 starts only from alpha = disk = bulge = 1.
    #[arg(long, default_value_t = 1)]
    pub alpha_steps: usize,

    /// Header convention of the reference table.
    #[arg(long, value_enum, default_value_t = TableFormat::Skip3)]
    pub reference_format: TableFormat,

    /// Header convention of galaxy tables.
    #[arg(long, value_enum, default_value_t = TableFormat::Hash)]
    pub galaxy_format: TableFormat,

    /// Number of worst-fitting points to list.
    #[arg(long, default_value_t = 5)]
    pub top: usize,

    /// Write per-galaxy results to CSV.
    #[arg(long, value_name = "CSV")]
    pub export_csv: Option<PathBuf>,

    /// Write the full run record to JSON.
    #[arg(long, value_name = "JSON")]
    pub export_json: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_command_parses_shared_flags() {
        let cli = Cli::parse_from([
            "neros",
            "fit",
            "--reference",
            "MW.dat",
            "--galaxy",
            "NGC0024_rotmod.dat",
            "--kernel",
            "naive",
            "--alpha-steps",
            "5",
            "--galaxy-format",
            "skip3",
        ]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.reference, PathBuf::from("MW.dat"));
        assert_eq!(args.model.kernel, KernelKind::Naive);
        assert_eq!(args.model.alpha_steps, 5);
        assert_eq!(args.model.galaxy_format, TableFormat::Skip3);
        assert_eq!(args.model.max_evals, 10_000);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn demo_defaults() {
        let cli = Cli::parse_from(["neros", "demo", "--log-level", "debug"]);
        let Command::Demo(args) = cli.command else {
            panic!("expected demo");
        };
        assert_eq!(args.seed, 42);
        assert_eq!(args.model.speed_of_light, SPEED_OF_LIGHT_KMS);
        assert_eq!(cli.log_level, "debug");
    }
}
