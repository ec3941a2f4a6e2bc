//! LCM model evaluation for a target galaxy.
//!
//! The fitter relies on a handful of primitive operations:
//!
//! - `v_lum_squared`: combine gas / disk / bulge components
//! - `LcmModel::v_lcm`: the LCM velocity-squared contribution
//! - `LcmModel::v_neros_squared` / `v_neros`: the predicted observed velocity
//!
//! Every galaxy array is first clipped to the reference curve's radius range;
//! points beyond it are dropped, never extrapolated.

use crate::error::{NerosError, Result, ensure_same_len};
use crate::models::kernel::KernelStrategy;
use crate::models::reference::ReferenceModel;

/// `vGas² + (disk_scale·vDisk)² + (bulge_scale·vBulge)²`, pointwise.
pub fn v_lum_squared(
    v_gas: &[f64],
    v_disk: &[f64],
    v_bulge: &[f64],
    disk_scale: f64,
    bulge_scale: f64,
) -> Result<Vec<f64>> {
    ensure_same_len("vLumSquared disk", v_gas.len(), v_disk.len())?;
    ensure_same_len("vLumSquared bulge", v_gas.len(), v_bulge.len())?;
    Ok(v_gas
        .iter()
        .zip(v_disk.iter())
        .zip(v_bulge.iter())
        .map(|((&g, &d), &b)| {
            let d = disk_scale * d;
            let b = bulge_scale * b;
            g * g + d * d + b * b
        })
        .collect())
}

/// Evaluator binding a shared reference model to a kernel strategy.
#[derive(Debug, Clone, Copy)]
pub struct LcmModel<'a> {
    reference: &'a ReferenceModel,
    kernel: &'static dyn KernelStrategy,
}

impl<'a> LcmModel<'a> {
    /// Evaluator using the kernel named in the reference model's config.
    pub fn new(reference: &'a ReferenceModel) -> Self {
        Self {
            reference,
            kernel: reference.config().kernel.strategy(),
        }
    }

    pub fn with_kernel(reference: &'a ReferenceModel, kernel: &'static dyn KernelStrategy) -> Self {
        Self { reference, kernel }
    }

    pub fn reference(&self) -> &'a ReferenceModel {
        self.reference
    }

    pub fn kernel(&self) -> &'static dyn KernelStrategy {
        self.kernel
    }

    pub fn speed_of_light(&self) -> f64 {
        self.reference.config().speed_of_light
    }

    fn in_domain(&self, radius: &[f64]) -> Vec<bool> {
        let r_max = self.reference.max_radius();
        radius.iter().map(|r| *r <= r_max).collect()
    }

    /// Radii (and a matching column) restricted to the reference domain.
    pub fn clip(&self, radius: &[f64], values: &[f64]) -> Result<(Vec<f64>, Vec<f64>)> {
        ensure_same_len("clip", radius.len(), values.len())?;
        let keep = self.in_domain(radius);
        let mut r_out = Vec::with_capacity(radius.len());
        let mut v_out = Vec::with_capacity(radius.len());
        for ((&r, &v), k) in radius.iter().zip(values.iter()).zip(keep) {
            if k {
                r_out.push(r);
                v_out.push(v);
            }
        }
        Ok((r_out, v_out))
    }

    /// Reference potential at the largest galaxy radius inside the reference domain.
    pub fn phi_zero(&self, radius: &[f64]) -> Result<f64> {
        let r_max = self.reference.max_radius();
        let last = radius
            .iter()
            .copied()
            .filter(|r| *r <= r_max)
            .fold(f64::NEG_INFINITY, f64::max);
        if !last.is_finite() {
            return Err(NerosError::validation(format!(
                "no galaxy radius lies within the reference domain (r_max = {r_max})"
            )));
        }
        self.reference.potential_at(last)
    }

    /// LCM velocity-squared contribution `c² κ² v1 v2` at the clipped radii.
    ///
    /// The output has one value per galaxy point with `radius <= r_max`.
    pub fn v_lcm(&self, radius: &[f64], v_lum: &[f64]) -> Result<Vec<f64>> {
        let (r, v) = self.clip(radius, v_lum)?;
        if r.is_empty() {
            return Err(NerosError::validation(
                "no galaxy radius lies within the reference domain",
            ));
        }
        let c = self.speed_of_light();
        let phi_ref = self.reference.potential_at_many(&r)?;
        let phi_other = crate::math::phi(&r, &v, c)?;
        self.kernel.lcm_velocity_squared(&phi_ref, &phi_other, &v, c)
    }

    /// `vLum² + alpha²·vLCM` at the clipped radii. May be negative.
    pub fn v_neros_squared(&self, radius: &[f64], v_lum: &[f64], alpha: f64) -> Result<Vec<f64>> {
        let lcm = self.v_lcm(radius, v_lum)?;
        let (_, v) = self.clip(radius, v_lum)?;
        let a2 = alpha * alpha;
        Ok(v.iter().zip(lcm.iter()).map(|(&vl, &l)| vl * vl + a2 * l).collect())
    }

    /// `sqrt(v_neros_squared)`; a negative element is a `NumericDomain` error.
    pub fn v_neros(&self, radius: &[f64], v_lum: &[f64], alpha: f64) -> Result<Vec<f64>> {
        self.v_neros_squared(radius, v_lum, alpha)?
            .into_iter()
            .enumerate()
            .map(|(i, v2)| {
                if v2 < 0.0 || !v2.is_finite() {
                    return Err(NerosError::numeric_domain(format!(
                        "vNeros² = {v2} at index {i} (alpha = {alpha})"
                    )));
                }
                Ok(v2.sqrt())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{KernelKind, ModelConfig};

    fn reference() -> ReferenceModel {
        let rows: Vec<[f64; 2]> = (1..=50)
            .map(|i| {
                let r = i as f64;
                [r, 220.0 - 20.0 * 0.5_f64.powf(r - 1.0)]
            })
            .collect();
        ReferenceModel::from_rows(&rows, ModelConfig::default()).unwrap()
    }

    #[test]
    fn v_lum_squared_applies_scales() {
        let out = v_lum_squared(&[1.0, 2.0], &[3.0, 4.0], &[5.0, 6.0], 2.0, 0.5).unwrap();
        assert_eq!(out, vec![1.0 + 36.0 + 6.25, 4.0 + 64.0 + 9.0]);
        assert!(matches!(
            v_lum_squared(&[1.0], &[1.0, 2.0], &[1.0], 1.0, 1.0),
            Err(NerosError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn v_lcm_drops_points_beyond_reference() {
        let reference = reference();
        let model = LcmModel::new(&reference);
        let r = [5.0, 10.0, 20.0, 60.0, 80.0];
        let v = [50.0, 70.0, 80.0, 85.0, 85.0];
        let out = model.v_lcm(&r, &v).unwrap();
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn no_luminous_matter_gives_zero_prediction() {
        let reference = reference();
        let model = LcmModel::new(&reference);
        let r = [2.0, 4.0, 8.0];
        let v = [0.0; 3];
        let pred = model.v_neros(&r, &v, 3.0).unwrap();
        assert_eq!(pred, vec![0.0; 3]);
    }

    #[test]
    fn v_neros_matches_sqrt_of_squared() {
        let reference = reference();
        let model = LcmModel::new(&reference);
        let r = [1.5, 3.0, 6.0, 12.0];
        let v = [40.0, 60.0, 70.0, 72.0];
        let sq = model.v_neros_squared(&r, &v, 1.7).unwrap();
        let lin = model.v_neros(&r, &v, 1.7).unwrap();
        for (a, b) in sq.iter().zip(lin.iter()) {
            assert!((a.sqrt() - b).abs() < 1e-12);
        }
    }

    #[test]
    fn naive_and_stable_kernels_agree_on_galactic_values() {
        let reference = reference();
        let stable = LcmModel::with_kernel(&reference, KernelKind::Stable.strategy());
        let naive = LcmModel::with_kernel(&reference, KernelKind::Naive.strategy());
        let r = [1.5, 3.0, 6.0, 12.0];
        let v = [40.0, 60.0, 70.0, 72.0];
        let a = stable.v_lcm(&r, &v).unwrap();
        let b = naive.v_lcm(&r, &v).unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            // The naive form loses digits to cancellation; agreement is loose.
            assert!((x - y).abs() <= 1e-3 * x.abs().max(1.0), "{x} vs {y}");
        }
    }

    #[test]
    fn phi_zero_uses_last_clipped_radius() {
        let reference = reference();
        let model = LcmModel::new(&reference);
        let p = model.phi_zero(&[2.0, 7.5, 49.0, 70.0]).unwrap();
        assert_eq!(p, reference.potential_at(49.0).unwrap());
        assert!(matches!(model.phi_zero(&[60.0]), Err(NerosError::Validation(_))));
    }
}
