//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and installs logging
//! - parses CLI arguments
//! - runs the fit pipeline for the chosen command
//! - prints reports

use std::path::PathBuf;

use clap::Parser;

use crate::cli::{BatchArgs, Cli, Command, DemoArgs, FitArgs, ModelArgs};
use crate::data::synthetic::GalaxySpec;
use crate::domain::{ModelConfig, RunConfig};
use crate::error::Result;
use crate::report::{format_batch_summary, format_fit_summary, format_residual_table};

pub mod pipeline;

/// Entry point for the `neros` binary.
pub fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    crate::logging::init_logging(&cli.log_level);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Batch(args) => handle_batch(args),
        Command::Demo(args) => handle_demo(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<()> {
    let config = run_config_from_args(Some(args.reference.clone()), &args.model);
    let run = pipeline::run_single(&config, &args.galaxy)?;
    print_galaxy_run(&config, &run);
    Ok(())
}

fn handle_batch(args: BatchArgs) -> Result<()> {
    let config = run_config_from_args(Some(args.reference.clone()), &args.model);
    let run = pipeline::run_batch(&config, &args.galaxies)?;
    println!("{}", format_batch_summary(&run.records, &run.failures));
    Ok(())
}

fn handle_demo(args: DemoArgs) -> Result<()> {
    let config = run_config_from_args(None, &args.model);
    let spec = GalaxySpec {
        n_points: args.points,
        noise_sigma: args.noise,
        seed: args.seed,
        ..GalaxySpec::default()
    };
    let (galaxy, run) = pipeline::run_demo(&config, &spec)?;
    println!(
        "Synthetic truth: alpha={:.4} disk_scale={:.4} bulge_scale={:.4} (seed {}, noise {} km/s)\n",
        galaxy.truth.alpha * galaxy.truth.alpha,
        galaxy.truth.disk_scale.abs(),
        galaxy.truth.bulge_scale.abs(),
        args.seed,
        args.noise
    );
    print_galaxy_run(&config, &run);
    Ok(())
}

fn print_galaxy_run(config: &RunConfig, run: &pipeline::GalaxyRun) {
    println!(
        "{}",
        format_fit_summary(
            &run.galaxy,
            &config.model,
            &run.report,
            &run.result,
            run.points_used,
            run.points_total,
        )
    );
    if !run.worst.is_empty() {
        println!("Worst-fitting points:");
        println!("{}", format_residual_table(&run.worst));
    }
}

pub fn run_config_from_args(reference_path: Option<PathBuf>, args: &ModelArgs) -> RunConfig {
    RunConfig {
        reference_path,
        reference_format: args.reference_format,
        galaxy_format: args.galaxy_format,
        model: ModelConfig {
            speed_of_light: args.speed_of_light,
            kernel: args.kernel,
        },
        max_evaluations: args.max_evals,
        alpha_min: args.alpha_min,
        alpha_max: args.alpha_max,
        alpha_steps: args.alpha_steps,
        top_n: args.top,
        export_csv: args.export_csv.clone(),
        export_json: args.export_json.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::KernelKind;

    #[test]
    fn run_config_carries_model_flags() {
        let cli = Cli::parse_from([
            "neros", "demo", "--kernel", "naive", "--c", "299792.458", "--max-evals", "500",
        ]);
        let Command::Demo(args) = cli.command else {
            panic!("expected demo");
        };
        let config = run_config_from_args(None, &args.model);
        assert_eq!(config.model.kernel, KernelKind::Naive);
        assert_eq!(config.model.speed_of_light, 299_792.458);
        assert_eq!(config.max_evaluations, 500);
        assert!(config.reference_path.is_none());
    }
}
