//! Cumulative potential integral.
//!
//! ```text
//! Φ(r_i) = ∫₀^{r_i} v(s)² / (s·c²) ds
//! ```
//!
//! evaluated with the composite trapezoidal rule on the samples `(r_i, v_i²/(r_i c²))`.
//! The integrand is never evaluated at `r = 0`: an artificial `(0, 0)` sample is
//! prepended so the first trapezoid spans `[0, r_0]`, and that sample is dropped
//! from the output. The result therefore has the same length and order as the input.
//!
//! An input sample at exactly `r = 0` coincides with that origin sample: its
//! integrand is taken as 0 and its trapezoid has zero width, so `Φ(0) = 0`.

use crate::error::{NerosError, Result, ensure_same_len};

/// Compute the cumulative potential `Φ` at every input radius.
///
/// Radii must be finite, non-negative and strictly increasing.
pub fn phi(radius: &[f64], velocity: &[f64], c: f64) -> Result<Vec<f64>> {
    ensure_same_len("phi", radius.len(), velocity.len())?;
    // With the prepended origin sample this is the "fewer than 2 samples" case.
    if radius.is_empty() {
        return Err(NerosError::validation("phi needs at least one radius"));
    }
    if !(c.is_finite() && c > 0.0) {
        return Err(NerosError::validation(format!("invalid speed of light {c}")));
    }
    if let Some(r) = radius.iter().find(|r| !(r.is_finite() && **r >= 0.0)) {
        return Err(NerosError::validation(format!(
            "phi radii must be finite and >= 0, got {r}"
        )));
    }
    if velocity.iter().any(|v| !v.is_finite()) {
        return Err(NerosError::validation("phi velocities must be finite"));
    }
    if radius.windows(2).any(|w| w[1] <= w[0]) {
        return Err(NerosError::validation("phi radii must be strictly increasing"));
    }

    let c2 = c * c;
    let mut out = Vec::with_capacity(radius.len());
    let (mut r_prev, mut y_prev, mut acc) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (&r, &v) in radius.iter().zip(velocity.iter()) {
        let y = if r == 0.0 { 0.0 } else { v * v / (r * c2) };
        acc += 0.5 * (r - r_prev) * (y_prev + y);
        out.push(acc);
        r_prev = r;
        y_prev = y;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const C: f64 = 3.0e5;

    #[test]
    fn single_point_is_first_trapezoid() {
        let out = phi(&[2.0], &[150.0], C).unwrap();
        let expected = 0.5 * 2.0 * (150.0 * 150.0 / (2.0 * C * C));
        assert_eq!(out.len(), 1);
        assert!((out[0] - expected).abs() < 1e-20);
    }

    #[test]
    fn flat_curve_matches_trapezoid_sum() {
        // v constant => integrand v²/(r c²); check against a hand-rolled sum.
        let r = [1.0, 2.0, 4.0];
        let v = [100.0, 100.0, 100.0];
        let out = phi(&r, &v, C).unwrap();
        let k = 100.0 * 100.0 / (C * C);
        let e0 = 0.5 * 1.0 * k;
        let e1 = e0 + 0.5 * 1.0 * (k + k / 2.0);
        let e2 = e1 + 0.5 * 2.0 * (k / 2.0 + k / 4.0);
        for (a, b) in out.iter().zip([e0, e1, e2]) {
            assert!((a - b).abs() < 1e-18);
        }
    }

    #[test]
    fn non_negative_velocity_gives_non_decreasing_phi() {
        let r: Vec<f64> = (1..=40).map(|i| i as f64 * 0.37).collect();
        let v: Vec<f64> = r.iter().map(|x| (x * 3.1).sin().abs() * 180.0).collect();
        let out = phi(&r, &v, C).unwrap();
        assert!(out.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn degenerate_inputs_are_rejected() {
        assert!(matches!(phi(&[], &[], C), Err(NerosError::Validation(_))));
        assert!(matches!(
            phi(&[1.0, 2.0], &[1.0], C),
            Err(NerosError::DimensionMismatch { .. })
        ));
        assert!(matches!(phi(&[-1.0, 1.0], &[1.0, 1.0], C), Err(NerosError::Validation(_))));
        assert!(matches!(phi(&[2.0, 1.0], &[1.0, 1.0], C), Err(NerosError::Validation(_))));
        assert!(matches!(phi(&[0.0, 0.0], &[1.0, 1.0], C), Err(NerosError::Validation(_))));
    }

    #[test]
    fn sample_at_origin_contributes_nothing() {
        let with_origin = phi(&[0.0, 1.0, 2.0], &[0.0, 200.0, 210.0], C).unwrap();
        let without = phi(&[1.0, 2.0], &[200.0, 210.0], C).unwrap();
        assert_eq!(with_origin[0], 0.0);
        assert_eq!(&with_origin[1..], without.as_slice());

        // The velocity recorded at r = 0 does not matter either.
        let odd_origin = phi(&[0.0, 1.0, 2.0], &[50.0, 200.0, 210.0], C).unwrap();
        assert_eq!(odd_origin, with_origin);
    }
}
