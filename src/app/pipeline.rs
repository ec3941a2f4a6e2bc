//! Shared fit pipeline used by every CLI command.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! reference load -> table ingest -> fit -> residuals -> exports
//!
//! The CLI handlers can then focus on presentation.

use std::path::Path;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::data::synthetic::{self, GalaxySpec, SyntheticGalaxy};
use crate::domain::{
    FailedGalaxy, FitInput, FitReport, FitResult, GalaxyFitRecord, RunConfig,
};
use crate::error::{NerosError, Result};
use crate::fit::{FitOptions, NerosFitter, start_grid};
use crate::io::{HeaderStyle, build_report_file, list_tables, read_table, write_report_json, write_results_csv};
use crate::models::ReferenceModel;
use crate::report::{PointResidual, compute_residuals, worst_points};

/// Outputs of one galaxy fit.
#[derive(Debug, Clone)]
pub struct GalaxyRun {
    pub galaxy: String,
    pub report: FitReport,
    pub result: FitResult,
    /// Worst-fitting points, worst first.
    pub worst: Vec<PointResidual>,
    pub points_total: usize,
    pub points_used: usize,
}

impl GalaxyRun {
    pub fn record(&self) -> GalaxyFitRecord {
        GalaxyFitRecord::new(&self.galaxy, &self.report, self.points_used)
    }
}

/// Outputs of a batch run. A failing galaxy never aborts the batch.
#[derive(Debug, Clone)]
pub struct BatchRun {
    pub records: Vec<GalaxyFitRecord>,
    pub failures: Vec<FailedGalaxy>,
}

/// Load the configured reference curve (or the built-in synthetic one).
pub fn load_reference(config: &RunConfig) -> Result<ReferenceModel> {
    match &config.reference_path {
        Some(path) => {
            let table = read_table(path, HeaderStyle::from(config.reference_format))?;
            let reference = ReferenceModel::new(table.to_curve()?, config.model)?;
            info!(
                path = %path.display(),
                points = reference.curve().len(),
                r_max = reference.max_radius(),
                "loaded reference curve"
            );
            Ok(reference)
        }
        None => synthetic::reference_model(config.model),
    }
}

/// Optimizer options from the run configuration.
pub fn fit_options(config: &RunConfig) -> Result<FitOptions> {
    let initial_guesses = if config.alpha_steps <= 1 {
        FitOptions::default().initial_guesses
    } else {
        start_grid(config.alpha_min, config.alpha_max, config.alpha_steps)?
    };
    let options = FitOptions {
        max_evaluations: config.max_evaluations,
        initial_guesses,
        ..FitOptions::default()
    };
    options.validate()?;
    Ok(options)
}

/// Fit one galaxy that is already in memory.
pub fn fit_galaxy(
    reference: &ReferenceModel,
    options: &FitOptions,
    galaxy: &str,
    input: &FitInput,
    top_n: usize,
) -> Result<GalaxyRun> {
    let mut fitter = NerosFitter::with_options(reference, options.clone());
    let result = fitter.fit(input)?.clone();
    let report = fitter.get_fit_results(&input.radius)?;
    let residuals = compute_residuals(&fitter)?;

    Ok(GalaxyRun {
        galaxy: galaxy.to_string(),
        report,
        result,
        worst: worst_points(&residuals, top_n),
        points_total: input.len(),
        points_used: residuals.len(),
    })
}

/// `neros fit`: one galaxy table.
pub fn run_single(config: &RunConfig, galaxy_path: &Path) -> Result<GalaxyRun> {
    let reference = load_reference(config)?;
    let options = fit_options(config)?;
    let table = read_table(galaxy_path, HeaderStyle::from(config.galaxy_format))?;
    let input = table.to_fit_input()?;
    let run = fit_galaxy(&reference, &options, &table.name, &input, config.top_n)?;
    write_exports(config, std::slice::from_ref(&run.record()), &[])?;
    Ok(run)
}

/// `neros batch`: every table in `dir`, in parallel against one shared reference.
pub fn run_batch(config: &RunConfig, dir: &Path) -> Result<BatchRun> {
    let reference = load_reference(config)?;
    let options = fit_options(config)?;
    let paths = list_tables(dir)?;
    if paths.is_empty() {
        return Err(NerosError::InsufficientData(format!(
            "no galaxy tables in '{}'",
            dir.display()
        )));
    }
    info!(galaxies = paths.len(), "starting batch fit");

    let style = HeaderStyle::from(config.galaxy_format);
    let outcomes: Vec<std::result::Result<GalaxyFitRecord, FailedGalaxy>> = paths
        .par_iter()
        .map(|path| {
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            read_table(path, style)
                .and_then(|table| table.to_fit_input())
                .and_then(|input| fit_galaxy(&reference, &options, &name, &input, 0))
                .map(|run| run.record())
                .map_err(|e| {
                    warn!(galaxy = %name, error = %e, "galaxy fit failed");
                    FailedGalaxy {
                        galaxy: name,
                        error: e.to_string(),
                        exit_code: e.exit_code(),
                    }
                })
        })
        .collect();

    let mut records = Vec::new();
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(r) => records.push(r),
            Err(f) => failures.push(f),
        }
    }
    info!(fitted = records.len(), failed = failures.len(), "batch fit finished");

    write_exports(config, &records, &failures)?;
    Ok(BatchRun { records, failures })
}

/// `neros demo`: a synthetic galaxy against the configured (or built-in) reference.
pub fn run_demo(config: &RunConfig, spec: &GalaxySpec) -> Result<(SyntheticGalaxy, GalaxyRun)> {
    let reference = load_reference(config)?;
    let options = fit_options(config)?;
    let galaxy = synthetic::synthetic_galaxy(&reference, spec)?;
    let run = fit_galaxy(&reference, &options, &galaxy.name, &galaxy.input, config.top_n)?;
    write_exports(config, std::slice::from_ref(&run.record()), &[])?;
    Ok((galaxy, run))
}

fn write_exports(config: &RunConfig, records: &[GalaxyFitRecord], failures: &[FailedGalaxy]) -> Result<()> {
    if let Some(path) = &config.export_csv {
        write_results_csv(path, records)?;
        info!(path = %path.display(), "wrote results CSV");
    }
    if let Some(path) = &config.export_json {
        let reference = config
            .reference_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "synthetic".to_string());
        let report = build_report_file(&reference, config.model, records.to_vec(), failures.to_vec());
        write_report_json(path, &report)?;
        info!(path = %path.display(), "wrote report JSON");
    }
    Ok(())
}
