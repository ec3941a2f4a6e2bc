//! Dimensionless LCM kernel.
//!
//! The LCM velocity-squared contribution at each radius is
//!
//! ```text
//! vLCM² = c² · κ² · v1(eTsiCurve - 1) · v2(eTsiFlat - 1, eTsiCurve - 1)
//! ```
//!
//! with `κ = Φ_other / Φ_ref` and
//!
//! - `eTsiFlat  = sqrt((1 + β) / (1 - β))`, `β = v_lum / c`
//! - `eTsiCurve = sqrt((1 - 2Φ_other) / (1 - 2Φ_ref))`
//!
//! Both `eTsi` terms sit very close to 1 for galactic velocities and
//! potentials, so `sqrt(..) - 1` cancels catastrophically. The stable strategy
//! rewrites `sqrt(q) - 1` as `(q - 1) / (sqrt(q) + 1)` with `q - 1` formed
//! analytically. `v1` and `v2` are likewise written in terms of the minus-one
//! values so no intermediate subtracts two numbers near 1.
//!
//! Any undefined intermediate (negative square-root argument, division by
//! zero at `Φ_ref = 0.5`) is reported as `NumericDomain` instead of a NaN.

use std::fmt::Debug;

use crate::domain::KernelKind;
use crate::error::{NerosError, Result, ensure_same_len};

/// Interchangeable formulations of the `eTsi - 1` terms.
pub trait KernelStrategy: Debug + Send + Sync {
    fn kind(&self) -> KernelKind;

    /// `eTsiFlat - 1` for a luminous velocity `v` (same unit as `c`).
    fn e_tsi_flat_m1(&self, v: f64, c: f64) -> Result<f64>;

    /// `eTsiCurve - 1` for reference potential `phi_ref` and target potential `phi_other`.
    fn e_tsi_curve_m1(&self, phi_ref: f64, phi_other: f64) -> Result<f64>;

    fn e_tsi_flat_m1_all(&self, v: &[f64], c: f64) -> Result<Vec<f64>> {
        v.iter().map(|&vi| self.e_tsi_flat_m1(vi, c)).collect()
    }

    fn e_tsi_curve_m1_all(&self, phi_ref: &[f64], phi_other: &[f64]) -> Result<Vec<f64>> {
        ensure_same_len("eTsiCurve", phi_ref.len(), phi_other.len())?;
        phi_ref
            .iter()
            .zip(phi_other.iter())
            .map(|(&a, &b)| self.e_tsi_curve_m1(a, b))
            .collect()
    }

    /// Pointwise `c² κ² v1 v2`.
    fn lcm_velocity_squared(
        &self,
        phi_ref: &[f64],
        phi_other: &[f64],
        v_lum: &[f64],
        c: f64,
    ) -> Result<Vec<f64>> {
        let n = phi_ref.len();
        ensure_same_len("vLCM potentials", n, phi_other.len())?;
        ensure_same_len("vLCM velocities", n, v_lum.len())?;

        let k = kappa(phi_ref, phi_other)?;
        let et_curve = self.e_tsi_curve_m1_all(phi_ref, phi_other)?;
        let et_flat = self.e_tsi_flat_m1_all(v_lum, c)?;
        let a = v1(&et_curve)?;
        let b = v2(&et_flat, &et_curve)?;

        let c2 = c * c;
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            let value = c2 * k[i] * k[i] * a[i] * b[i];
            if !value.is_finite() {
                return Err(NerosError::numeric_domain(format!(
                    "non-finite vLCM at index {i} (kappa={}, v1={}, v2={})",
                    k[i], a[i], b[i]
                )));
            }
            out.push(value);
        }
        Ok(out)
    }
}

/// Minus-one forms computed directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct StableKernel;

/// `sqrt(...) - 1`; loses precision as β → 0 or Φ → 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaiveKernel;

static STABLE: StableKernel = StableKernel;
static NAIVE: NaiveKernel = NaiveKernel;

impl KernelKind {
    pub fn strategy(self) -> &'static dyn KernelStrategy {
        match self {
            KernelKind::Stable => &STABLE,
            KernelKind::Naive => &NAIVE,
        }
    }
}

fn flat_ratio(v: f64, c: f64) -> Result<(f64, f64)> {
    let beta = v / c;
    let one_minus = 1.0 - beta;
    let ratio = (1.0 + beta) / one_minus;
    if !(one_minus > 0.0 && ratio >= 0.0) {
        return Err(NerosError::numeric_domain(format!(
            "eTsiFlat undefined for beta={beta}"
        )));
    }
    Ok((beta, ratio))
}

fn curve_ratio(phi_ref: f64, phi_other: f64) -> Result<(f64, f64)> {
    let ref_gap = 1.0 - 2.0 * phi_ref;
    let ratio = (1.0 - 2.0 * phi_other) / ref_gap;
    if !(ref_gap > 0.0 && ratio >= 0.0) {
        return Err(NerosError::numeric_domain(format!(
            "eTsiCurve undefined for phi_ref={phi_ref}, phi_other={phi_other}"
        )));
    }
    Ok((ref_gap, ratio))
}

impl KernelStrategy for StableKernel {
    fn kind(&self) -> KernelKind {
        KernelKind::Stable
    }

    fn e_tsi_flat_m1(&self, v: f64, c: f64) -> Result<f64> {
        let (beta, ratio) = flat_ratio(v, c)?;
        Ok((2.0 * beta) / (1.0 - beta) / (ratio.sqrt() + 1.0))
    }

    fn e_tsi_curve_m1(&self, phi_ref: f64, phi_other: f64) -> Result<f64> {
        let (ref_gap, ratio) = curve_ratio(phi_ref, phi_other)?;
        Ok((2.0 * phi_ref - 2.0 * phi_other) / ref_gap / (ratio.sqrt() + 1.0))
    }
}

impl KernelStrategy for NaiveKernel {
    fn kind(&self) -> KernelKind {
        KernelKind::Naive
    }

    fn e_tsi_flat_m1(&self, v: f64, c: f64) -> Result<f64> {
        let (_, ratio) = flat_ratio(v, c)?;
        Ok(ratio.sqrt() - 1.0)
    }

    fn e_tsi_curve_m1(&self, phi_ref: f64, phi_other: f64) -> Result<f64> {
        let (_, ratio) = curve_ratio(phi_ref, phi_other)?;
        Ok(ratio.sqrt() - 1.0)
    }
}

/// `κ = Φ_other / Φ_ref`, pointwise.
pub fn kappa(phi_ref: &[f64], phi_other: &[f64]) -> Result<Vec<f64>> {
    ensure_same_len("kappa", phi_ref.len(), phi_other.len())?;
    phi_ref
        .iter()
        .zip(phi_other.iter())
        .enumerate()
        .map(|(i, (&r, &o))| {
            if r == 0.0 {
                return Err(NerosError::numeric_domain(format!(
                    "kappa undefined: reference potential is zero at index {i}"
                )));
            }
            Ok(o / r)
        })
        .collect()
}

/// `((etc+1)² - 1) / (2 (1+etc))`, i.e. `sinh` of the curve rapidity.
pub fn v1(et_curve_m1: &[f64]) -> Result<Vec<f64>> {
    et_curve_m1
        .iter()
        .enumerate()
        .map(|(i, &etc)| {
            let e = etc + 1.0;
            if e <= 0.0 {
                return Err(NerosError::numeric_domain(format!(
                    "v1 undefined: eTsiCurve = {e} at index {i}"
                )));
            }
            // (etc+1)² - 1 == etc·(etc+2), without the cancellation.
            Ok(etc * (etc + 2.0) / (2.0 * e))
        })
        .collect()
}

/// `((etF+1)(etC+1) + 1) / (2 sqrt((etF+1)(etC+1)))`, i.e. `cosh` of the summed rapidities.
pub fn v2(et_flat_m1: &[f64], et_curve_m1: &[f64]) -> Result<Vec<f64>> {
    ensure_same_len("v2", et_flat_m1.len(), et_curve_m1.len())?;
    et_flat_m1
        .iter()
        .zip(et_curve_m1.iter())
        .enumerate()
        .map(|(i, (&f, &c))| {
            let product = (f + 1.0) * (c + 1.0);
            if product <= 0.0 {
                return Err(NerosError::numeric_domain(format!(
                    "v2 undefined: (etFlat+1)(etCurve+1) = {product} at index {i}"
                )));
            }
            Ok((product + 1.0) / (2.0 * product.sqrt()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const C: f64 = 3.0e5;

    fn rel_close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol * a.abs().max(b.abs())
    }

    #[test]
    fn stable_flat_matches_naive_when_well_conditioned() {
        for v in [500.0, 3_000.0, 30_000.0, 150_000.0] {
            let s = StableKernel.e_tsi_flat_m1(v, C).unwrap();
            let n = NaiveKernel.e_tsi_flat_m1(v, C).unwrap();
            assert!(rel_close(s, n, 1e-9), "v={v}: {s} vs {n}");
        }
    }

    #[test]
    fn stable_curve_matches_naive_when_well_conditioned() {
        for (a, b) in [(1e-3, 4e-4), (0.05, 0.02), (0.2, 0.31), (0.1, 0.0)] {
            let s = StableKernel.e_tsi_curve_m1(a, b).unwrap();
            let n = NaiveKernel.e_tsi_curve_m1(a, b).unwrap();
            assert!(rel_close(s, n, 1e-9), "phi=({a},{b}): {s} vs {n}");
        }
    }

    #[test]
    fn stable_forms_keep_precision_for_tiny_arguments() {
        // eTsiFlat - 1 ≈ β for small β; the naive form rounds to 0 here.
        let v = 1e-9;
        let s = StableKernel.e_tsi_flat_m1(v, C).unwrap();
        assert!(rel_close(s, v / C, 1e-6));

        // eTsiCurve - 1 ≈ Φ_ref - Φ_other for tiny potentials.
        let s = StableKernel.e_tsi_curve_m1(3e-12, 1e-12).unwrap();
        assert!(rel_close(s, 2e-12, 1e-6));
    }

    #[test]
    fn reference_potential_at_half_is_a_domain_error() {
        let err = StableKernel.e_tsi_curve_m1(0.5, 0.1).unwrap_err();
        assert!(err.is_numeric_domain());
        let err = NaiveKernel.e_tsi_curve_m1(0.6, 0.1).unwrap_err();
        assert!(err.is_numeric_domain());
    }

    #[test]
    fn v1_and_v2_match_their_naive_definitions() {
        let et_c = 1.0001_f64;
        let et_f = 1.0003_f64;
        let naive_v1 = (et_c * et_c - 1.0) / (2.0 * et_c);
        let naive_v2 = (et_f * et_c + 1.0) / (2.0 * (et_f * et_c).sqrt());
        let got_v1 = v1(&[et_c - 1.0]).unwrap()[0];
        let got_v2 = v2(&[et_f - 1.0], &[et_c - 1.0]).unwrap()[0];
        assert!(rel_close(got_v1, naive_v1, 1e-9));
        assert!(rel_close(got_v2, naive_v2, 1e-12));
    }

    #[test]
    fn kappa_is_pointwise_ratio() {
        let k = kappa(&[2.0, 4.0], &[1.0, 1.0]).unwrap();
        assert_eq!(k, vec![0.5, 0.25]);
        assert!(kappa(&[0.0], &[1.0]).unwrap_err().is_numeric_domain());
        assert!(matches!(
            kappa(&[1.0, 2.0], &[1.0]),
            Err(NerosError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn zero_target_potential_gives_zero_lcm() {
        let out = StableKernel
            .lcm_velocity_squared(&[1e-7, 2e-7], &[0.0, 0.0], &[0.0, 0.0], C)
            .unwrap();
        assert_eq!(out, vec![0.0, 0.0]);
    }

    #[test]
    fn kernel_kind_selects_strategy() {
        assert_eq!(KernelKind::Stable.strategy().kind(), KernelKind::Stable);
        assert_eq!(KernelKind::Naive.strategy().kind(), KernelKind::Naive);
    }
}
