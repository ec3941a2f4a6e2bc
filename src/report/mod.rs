//! Reporting utilities: per-point residuals and outlier rankings.

pub mod format;

pub use format::*;

use crate::error::Result;
use crate::fit::NerosFitter;

/// One clipped galaxy point against the best fit.
#[derive(Debug, Clone, PartialEq)]
pub struct PointResidual {
    pub radius: f64,
    pub v_obs: f64,
    pub v_fit: f64,
    pub v_lum: f64,
    /// `v_obs - v_fit`.
    pub residual: f64,
    /// Residual in units of the observation error.
    pub pull: f64,
}

/// Fitted values and residuals for every point of the stored fit.
pub fn compute_residuals(fitter: &NerosFitter<'_>) -> Result<Vec<PointResidual>> {
    let radius = fitter.rad()?;
    let v_obs = fitter.v_obs()?;
    let v_err = fitter.v_obs_error()?;
    let v_fit = fitter.v_neros()?;
    let v_lum = fitter.v_lum_scaled()?;

    Ok((0..radius.len())
        .map(|i| {
            let residual = v_obs[i] - v_fit[i];
            PointResidual {
                radius: radius[i],
                v_obs: v_obs[i],
                v_fit: v_fit[i],
                v_lum: v_lum[i],
                residual,
                pull: residual / v_err[i],
            }
        })
        .collect())
}

/// The `top_n` points with the largest `|pull|`, worst first.
pub fn worst_points(residuals: &[PointResidual], top_n: usize) -> Vec<PointResidual> {
    let mut sorted = residuals.to_vec();
    sorted.sort_by(|a, b| {
        b.pull
            .abs()
            .partial_cmp(&a.pull.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    sorted.truncate(top_n);
    sorted
}
