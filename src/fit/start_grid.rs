//! Initial-guess grid for multi-start fitting.
//!
//! The LCM objective can have more than one basin in alpha, so the driver
//! may start the optimizer from several log-spaced amplitudes. The grid is
//! deterministic given the same range and step count.

use crate::domain::FitParams;
use crate::error::{NerosError, Result};

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > min) {
        return Err(NerosError::validation(format!(
            "invalid range: min={min}, max={max} (must be finite, >0, and max>min)"
        )));
    }
    if steps < 2 {
        return Err(NerosError::validation("grid steps must be >= 2"));
    }

    let ln_min = min.ln();
    let step = (max.ln() - ln_min) / (steps as f64 - 1.0);
    Ok((0..steps).map(|i| (ln_min + step * i as f64).exp()).collect())
}

/// Starting points over the physical alpha range `[alpha_min, alpha_max]`.
///
/// Alpha is converted to the internal (square-root) convention; both scales
/// start at 1.
pub fn start_grid(alpha_min: f64, alpha_max: f64, steps: usize) -> Result<Vec<FitParams>> {
    Ok(log_space(alpha_min, alpha_max, steps)?
        .into_iter()
        .map(|alpha| FitParams {
            alpha: alpha.sqrt(),
            ..FitParams::default()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_space_includes_endpoints() {
        let v = log_space(0.1, 10.0, 5).unwrap();
        assert!((v[0] - 0.1).abs() < 1e-12);
        assert!((v[2] - 1.0).abs() < 1e-12);
        assert!((v[v.len() - 1] - 10.0).abs() < 1e-12);
    }

    #[test]
    fn log_space_rejects_bad_ranges() {
        assert!(log_space(0.0, 1.0, 4).is_err());
        assert!(log_space(2.0, 1.0, 4).is_err());
        assert!(log_space(1.0, 2.0, 1).is_err());
    }

    #[test]
    fn start_grid_uses_internal_alpha() {
        let grid = start_grid(0.25, 4.0, 3).unwrap();
        assert_eq!(grid.len(), 3);
        assert!((grid[0].alpha - 0.5).abs() < 1e-12);
        assert!((grid[1].alpha - 1.0).abs() < 1e-12);
        assert!((grid[2].alpha - 2.0).abs() < 1e-12);
        assert!(grid.iter().all(|g| g.disk_scale == 1.0 && g.bulge_scale == 1.0));
    }
}
