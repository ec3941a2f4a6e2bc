//! Reference (Milky Way) rotation curve.
//!
//! A `ReferenceModel` owns the baseline curve every galaxy is compared to and
//! the state derived from it:
//!
//! - a cubic spline over velocity (`velocity_at`)
//! - the cumulative potential of the raw curve
//! - a linear interpolant over that potential (`potential_at`), anchored at the
//!   integrator's implicit `(0, 0)` sample so its domain is `[0, r_max]`; a
//!   curve that already starts at `r = 0` supplies that knot itself
//!
//! The model is read-only once built. `reload` swaps in a fully built
//! replacement or leaves `self` untouched on error.

use tracing::debug;

use crate::domain::{Curve, ModelConfig};
use crate::error::Result;
use crate::math::{CubicSpline, LinearInterp, phi};

#[derive(Debug, Clone)]
pub struct ReferenceModel {
    config: ModelConfig,
    curve: Curve,
    velocity: CubicSpline,
    potential: Vec<f64>,
    potential_interp: LinearInterp,
}

impl ReferenceModel {
    /// Build from a `(radius, velocity)` curve.
    pub fn new(curve: Curve, config: ModelConfig) -> Result<Self> {
        config.validate()?;
        let velocity = CubicSpline::new(curve.radius().to_vec(), curve.velocity().to_vec())?;
        let potential = phi(curve.radius(), curve.velocity(), config.speed_of_light)?;

        let mut knots_r = Vec::with_capacity(curve.len() + 1);
        let mut knots_phi = Vec::with_capacity(curve.len() + 1);
        if curve.min_radius() > 0.0 {
            knots_r.push(0.0);
            knots_phi.push(0.0);
        }
        knots_r.extend_from_slice(curve.radius());
        knots_phi.extend_from_slice(&potential);
        let potential_interp = LinearInterp::new(knots_r, knots_phi)?;

        debug!(
            points = curve.len(),
            r_max = curve.max_radius(),
            phi_max = potential[potential.len() - 1],
            "built reference model"
        );

        Ok(Self {
            config,
            curve,
            velocity,
            potential,
            potential_interp,
        })
    }

    /// Build from a row-major two-column table (radius, velocity).
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R], config: ModelConfig) -> Result<Self> {
        Self::new(Curve::from_rows(rows)?, config)
    }

    /// Replace the reference curve. On error the current state is kept.
    pub fn reload<R: AsRef<[f64]>>(&mut self, rows: &[R]) -> Result<()> {
        let next = Self::from_rows(rows, self.config)?;
        *self = next;
        Ok(())
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn curve(&self) -> &Curve {
        &self.curve
    }

    pub fn max_radius(&self) -> f64 {
        self.curve.max_radius()
    }

    /// Cumulative potential at the raw reference radii.
    pub fn potential(&self) -> &[f64] {
        &self.potential
    }

    /// Cubic-interpolated reference velocity; defined on `[r_min, r_max]`.
    pub fn velocity_at(&self, r: f64) -> Result<f64> {
        self.velocity.eval(r)
    }

    /// Linearly interpolated reference potential; defined on `[0, r_max]`.
    pub fn potential_at(&self, r: f64) -> Result<f64> {
        self.potential_interp.eval(r)
    }

    pub fn potential_at_many(&self, r: &[f64]) -> Result<Vec<f64>> {
        self.potential_interp.eval_many(r)
    }
}
