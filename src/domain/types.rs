//! Shared domain types.
//!
//! This module defines:
//!
//! - model configuration (`ModelConfig`, `KernelKind`, the speed of light)
//! - typed numeric inputs (`Curve`, `FitInput`) validated once at ingestion
//! - fit outputs (`FitParams`, `FitResult`, `FitReport`, `GalaxyFitRecord`)
//! - the run configuration assembled from CLI flags (`RunConfig`)

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use crate::error::{NerosError, Result};

/// Speed of light in km/s, the velocity unit of every rotation curve.
pub const SPEED_OF_LIGHT_KMS: f64 = 3.0e5;

/// Which formulation of the `eTsi - 1` terms the kernel uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum KernelKind {
    /// Minus-one forms computed directly (no cancellation near β→0, Φ→0).
    #[default]
    Stable,
    /// `sqrt(...) - 1`, kept for comparison with older fits.
    Naive,
}

impl KernelKind {
    pub fn display_name(self) -> &'static str {
        match self {
            KernelKind::Stable => "stable",
            KernelKind::Naive => "naive",
        }
    }
}

/// Physical constants and kernel choice shared by the reference model and the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Speed of light in the velocity unit of the data (km/s).
    pub speed_of_light: f64,
    pub kernel: KernelKind,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            speed_of_light: SPEED_OF_LIGHT_KMS,
            kernel: KernelKind::Stable,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.speed_of_light.is_finite() && self.speed_of_light > 0.0) {
            return Err(NerosError::validation(format!(
                "speed of light must be finite and > 0, got {}",
                self.speed_of_light
            )));
        }
        Ok(())
    }
}

/// An ordered `(radius, velocity)` curve with unique, ascending radii.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    radius: Vec<f64>,
    velocity: Vec<f64>,
}

impl Curve {
    /// Build a curve from parallel columns.
    pub fn from_columns(radius: Vec<f64>, velocity: Vec<f64>) -> Result<Self> {
        if radius.len() != velocity.len() {
            return Err(NerosError::validation(format!(
                "curve columns differ in length: {} radii vs {} velocities",
                radius.len(),
                velocity.len()
            )));
        }
        if radius.len() < 2 {
            return Err(NerosError::validation(format!(
                "a curve needs at least 2 points, got {}",
                radius.len()
            )));
        }
        if radius.iter().chain(velocity.iter()).any(|v| !v.is_finite()) {
            return Err(NerosError::validation("curve contains non-finite values"));
        }
        if radius[0] < 0.0 {
            return Err(NerosError::validation(format!(
                "curve radii must be >= 0, got {}",
                radius[0]
            )));
        }
        if let Some(i) = radius.windows(2).position(|w| w[1] <= w[0]) {
            return Err(NerosError::validation(format!(
                "curve radii must be strictly increasing (row {}: {} follows {})",
                i + 1,
                radius[i + 1],
                radius[i]
            )));
        }
        Ok(Self { radius, velocity })
    }

    /// Build a curve from a row-major table that must have exactly two columns.
    ///
    /// Column names (if the caller had any) are irrelevant; only order matters:
    /// radius first, velocity second.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
        if rows.len() < 2 {
            return Err(NerosError::validation(format!(
                "reference data needs at least 2 rows, got {}",
                rows.len()
            )));
        }
        let mut radius = Vec::with_capacity(rows.len());
        let mut velocity = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != 2 {
                return Err(NerosError::validation(format!(
                    "reference data must have exactly two columns (row {i} has {})",
                    row.len()
                )));
            }
            radius.push(row[0]);
            velocity.push(row[1]);
        }
        Self::from_columns(radius, velocity)
    }

    pub fn radius(&self) -> &[f64] {
        &self.radius
    }

    pub fn velocity(&self) -> &[f64] {
        &self.velocity
    }

    pub fn len(&self) -> usize {
        self.radius.len()
    }

    pub fn is_empty(&self) -> bool {
        self.radius.is_empty()
    }

    pub fn min_radius(&self) -> f64 {
        self.radius[0]
    }

    pub fn max_radius(&self) -> f64 {
        self.radius[self.radius.len() - 1]
    }
}

/// Per-galaxy arrays consumed by a fit. All columns have the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct FitInput {
    pub radius: Vec<f64>,
    pub v_gas: Vec<f64>,
    pub v_disk: Vec<f64>,
    pub v_bulge: Vec<f64>,
    pub v_obs: Vec<f64>,
    pub v_obs_error: Vec<f64>,
}

impl FitInput {
    pub fn new(
        radius: Vec<f64>,
        v_gas: Vec<f64>,
        v_disk: Vec<f64>,
        v_bulge: Vec<f64>,
        v_obs: Vec<f64>,
        v_obs_error: Vec<f64>,
    ) -> Result<Self> {
        let input = Self {
            radius,
            v_gas,
            v_disk,
            v_bulge,
            v_obs,
            v_obs_error,
        };
        input.validate()?;
        Ok(input)
    }

    /// Map positional rotation-curve columns `Rad, Vobs, errV, Vgas, Vdisk, Vbul, ...`.
    pub fn from_rotmod_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
        let mut cols: [Vec<f64>; 6] = Default::default();
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() < 6 {
                return Err(NerosError::validation(format!(
                    "rotation curve row {i} has {} columns, expected at least 6",
                    row.len()
                )));
            }
            for (col, value) in cols.iter_mut().zip(row.iter()) {
                col.push(*value);
            }
        }
        let [radius, v_obs, v_obs_error, v_gas, v_disk, v_bulge] = cols;
        Self::new(radius, v_gas, v_disk, v_bulge, v_obs, v_obs_error)
    }

    fn columns(&self) -> [(&'static str, &[f64]); 6] {
        [
            ("radius", self.radius.as_slice()),
            ("v_gas", self.v_gas.as_slice()),
            ("v_disk", self.v_disk.as_slice()),
            ("v_bulge", self.v_bulge.as_slice()),
            ("v_obs", self.v_obs.as_slice()),
            ("v_obs_error", self.v_obs_error.as_slice()),
        ]
    }

    pub fn validate(&self) -> Result<()> {
        let n = self.radius.len();
        for (name, col) in self.columns() {
            if col.len() != n {
                return Err(NerosError::validation(format!(
                    "fit input column {name} has length {}, expected {n}",
                    col.len()
                )));
            }
            if col.iter().any(|v| !v.is_finite()) {
                return Err(NerosError::validation(format!(
                    "fit input column {name} contains non-finite values"
                )));
            }
        }
        if n == 0 {
            return Err(NerosError::validation("fit input is empty"));
        }
        if let Some(e) = self.v_obs_error.iter().find(|e| **e <= 0.0) {
            return Err(NerosError::validation(format!(
                "observation errors must be > 0, got {e}"
            )));
        }
        // Galaxy potentials divide by Φ_mw(r), which is 0 at the origin.
        if let Some(r) = self.radius.iter().find(|r| **r <= 0.0) {
            return Err(NerosError::validation(format!(
                "galaxy radii must be > 0, got {r}"
            )));
        }
        if let Some(i) = self.radius.windows(2).position(|w| w[1] <= w[0]) {
            return Err(NerosError::validation(format!(
                "galaxy radii must be strictly increasing (row {}: {} follows {})",
                i + 1,
                self.radius[i + 1],
                self.radius[i]
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.radius.len()
    }

    pub fn is_empty(&self) -> bool {
        self.radius.is_empty()
    }

    /// Keep only the points with `radius <= max_radius`, in their original order.
    pub fn clipped(&self, max_radius: f64) -> Self {
        let keep: Vec<bool> = self.radius.iter().map(|r| *r <= max_radius).collect();
        let pick = |col: &[f64]| -> Vec<f64> {
            col.iter()
                .zip(keep.iter())
                .filter(|(_, k)| **k)
                .map(|(v, _)| *v)
                .collect()
        };
        Self {
            radius: pick(&self.radius),
            v_gas: pick(&self.v_gas),
            v_disk: pick(&self.v_disk),
            v_bulge: pick(&self.v_bulge),
            v_obs: pick(&self.v_obs),
            v_obs_error: pick(&self.v_obs_error),
        }
    }
}

/// Internal fit parameters.
///
/// `alpha` is the square root of the physical amplitude; the scales enter the
/// model squared, so their sign carries no meaning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitParams {
    pub alpha: f64,
    pub disk_scale: f64,
    pub bulge_scale: f64,
}

impl FitParams {
    pub const LEN: usize = 3;

    pub fn from_slice(p: &[f64]) -> Self {
        Self {
            alpha: p[0],
            disk_scale: p[1],
            bulge_scale: p[2],
        }
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.alpha, self.disk_scale, self.bulge_scale]
    }
}

impl Default for FitParams {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            disk_scale: 1.0,
            bulge_scale: 1.0,
        }
    }
}

/// Output of one successful fit. Never mutated; refitting builds a new one.
#[derive(Debug, Clone)]
pub struct FitResult {
    /// Best-fit parameters in the internal convention.
    pub params: FitParams,
    /// Parameter covariance (internal convention), row/column order alpha, disk, bulge.
    pub covariance: Matrix3<f64>,
    /// Mean chi-squared of the best fit over the clipped points.
    pub chi_squared: f64,
    /// Reference potential at the largest clipped galaxy radius.
    pub phi_zero: f64,
    /// Optimizer iterations used by the winning start.
    pub iterations: usize,
    /// Model evaluations used by the winning start.
    pub evaluations: usize,
    /// Index of the winning initial guess.
    pub start_index: usize,
}

/// How `get_fit_results` reports parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterConvention {
    /// `alpha` squared, scales as absolute values.
    #[default]
    Physical,
    /// Raw optimizer parameters.
    Internal,
}

/// The numbers a caller usually wants from a fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub alpha: f64,
    pub disk_scale: f64,
    pub bulge_scale: f64,
    pub chi_squared: f64,
    pub phi_zero: f64,
}

/// One galaxy's row in batch outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalaxyFitRecord {
    #[serde(rename = "Galaxy")]
    pub galaxy: String,
    pub alpha: f64,
    pub disk_scale: f64,
    pub bulge_scale: f64,
    pub chi_squared: f64,
    pub phi_zero: f64,
    pub points_used: usize,
}

impl GalaxyFitRecord {
    pub fn new(galaxy: impl Into<String>, report: &FitReport, points_used: usize) -> Self {
        Self {
            galaxy: galaxy.into(),
            alpha: report.alpha,
            disk_scale: report.disk_scale,
            bulge_scale: report.bulge_scale,
            chi_squared: report.chi_squared,
            phi_zero: report.phi_zero,
            points_used,
        }
    }
}

/// A galaxy the batch could not fit, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedGalaxy {
    pub galaxy: String,
    pub error: String,
    pub exit_code: u8,
}

/// Portable JSON record of a fitting run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitReportFile {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub reference: String,
    pub model: ModelConfig,
    pub fits: Vec<GalaxyFitRecord>,
    #[serde(default)]
    pub failures: Vec<FailedGalaxy>,
}

/// Header convention of a tab-delimited input table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    /// The first three lines are comments/headers.
    Skip3,
    /// `#` lines are comments, except a `#` line mentioning "rad" which names the columns.
    Hash,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Reference curve table; `None` uses the built-in synthetic curve.
    pub reference_path: Option<PathBuf>,
    pub reference_format: TableFormat,
    pub galaxy_format: TableFormat,
    pub model: ModelConfig,

    pub max_evaluations: usize,
    /// Physical alpha range for the initial-guess grid.
    pub alpha_min: f64,
    pub alpha_max: f64,
    /// Grid steps; 1 means the single default guess.
    pub alpha_steps: usize,

    /// Worst-fitting points listed in single-galaxy output.
    pub top_n: usize,

    pub export_csv: Option<PathBuf>,
    pub export_json: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_rejects_unsorted_radii() {
        let err = Curve::from_columns(vec![1.0, 3.0, 2.0], vec![1.0, 1.0, 1.0]).unwrap_err();
        assert!(matches!(err, NerosError::Validation(_)));
    }

    #[test]
    fn curve_from_rows_requires_two_columns() {
        let rows = vec![vec![1.0, 2.0, 3.0], vec![2.0, 3.0, 4.0]];
        assert!(matches!(Curve::from_rows(&rows), Err(NerosError::Validation(_))));

        let rows = [[1.0, 200.0]];
        assert!(matches!(Curve::from_rows(&rows), Err(NerosError::Validation(_))));

        let rows = [[1.0, 200.0], [2.0, 210.0]];
        let curve = Curve::from_rows(&rows).unwrap();
        assert_eq!(curve.len(), 2);
        assert_eq!(curve.max_radius(), 2.0);
    }

    #[test]
    fn fit_input_rejects_mismatched_lengths() {
        let err = FitInput::new(
            vec![1.0, 2.0],
            vec![0.0, 0.0],
            vec![0.0],
            vec![0.0, 0.0],
            vec![1.0, 1.0],
            vec![1.0, 1.0],
        )
        .unwrap_err();
        assert!(matches!(err, NerosError::Validation(_)));
    }

    #[test]
    fn fit_input_rejects_zero_errors() {
        let err = FitInput::new(vec![1.0], vec![0.0], vec![0.0], vec![0.0], vec![1.0], vec![0.0]).unwrap_err();
        assert!(matches!(err, NerosError::Validation(_)));
    }

    #[test]
    fn fit_input_rejects_bad_radii() {
        let columns = |radius: Vec<f64>| {
            let n = radius.len();
            FitInput::new(radius, vec![0.0; n], vec![10.0; n], vec![0.0; n], vec![50.0; n], vec![1.0; n])
        };
        assert!(columns(vec![0.5, 1.0, 2.0]).is_ok());
        for radius in [vec![0.0, 1.0, 2.0], vec![-1.0, 1.0, 2.0], vec![1.0, 1.0, 2.0], vec![1.0, 3.0, 2.0]] {
            assert!(
                matches!(columns(radius.clone()), Err(NerosError::Validation(_))),
                "{radius:?}"
            );
        }
    }

    #[test]
    fn clipping_drops_points_beyond_max_radius() {
        let input = FitInput::new(
            vec![1.0, 2.0, 3.0, 4.0],
            vec![1.0, 2.0, 3.0, 4.0],
            vec![0.0; 4],
            vec![0.0; 4],
            vec![10.0; 4],
            vec![1.0; 4],
        )
        .unwrap();
        let clipped = input.clipped(2.5);
        assert_eq!(clipped.radius, vec![1.0, 2.0]);
        assert_eq!(clipped.v_gas, vec![1.0, 2.0]);
        assert_eq!(clipped.v_obs_error.len(), 2);
    }

    #[test]
    fn rotmod_rows_map_positional_columns() {
        let rows = vec![
            vec![0.5, 40.0, 3.0, 10.0, 20.0, 0.0, 1.0, 0.0],
            vec![1.0, 60.0, 2.0, 15.0, 30.0, 0.0, 1.0, 0.0],
        ];
        let input = FitInput::from_rotmod_rows(&rows).unwrap();
        assert_eq!(input.radius, vec![0.5, 1.0]);
        assert_eq!(input.v_obs, vec![40.0, 60.0]);
        assert_eq!(input.v_obs_error, vec![3.0, 2.0]);
        assert_eq!(input.v_gas, vec![10.0, 15.0]);
        assert_eq!(input.v_disk, vec![20.0, 30.0]);
        assert_eq!(input.v_bulge, vec![0.0, 0.0]);
    }
}
