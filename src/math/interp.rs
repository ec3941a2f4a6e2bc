//! One-dimensional interpolants over strictly increasing knots.
//!
//! - `LinearInterp`: piecewise linear.
//! - `CubicSpline`: interpolating cubic spline with not-a-knot end conditions
//!   (third derivative continuous across the second and second-to-last knots).
//!   Three knots degrade to the interpolating parabola, two to a straight line.
//!
//! Both reject queries outside `[x_min, x_max]`; nothing is extrapolated.

use crate::error::{NerosError, Result};

fn validate_knots(x: &[f64], y: &[f64]) -> Result<()> {
    if x.len() != y.len() {
        return Err(NerosError::validation(format!(
            "interpolant knots differ in length: {} x vs {} y",
            x.len(),
            y.len()
        )));
    }
    if x.len() < 2 {
        return Err(NerosError::validation("interpolant needs at least 2 knots"));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(NerosError::validation("interpolant knots must be finite"));
    }
    if x.windows(2).any(|w| w[1] <= w[0]) {
        return Err(NerosError::validation("interpolant knots must be strictly increasing"));
    }
    Ok(())
}

/// Index `k` of the interval `[x_k, x_{k+1}]` holding `t`, or an `OutOfDomain` error.
fn locate(x: &[f64], t: f64) -> Result<usize> {
    let (min, max) = (x[0], x[x.len() - 1]);
    if !(t >= min && t <= max) {
        return Err(NerosError::OutOfDomain { value: t, min, max });
    }
    Ok(x.partition_point(|&v| v <= t).saturating_sub(1).min(x.len() - 2))
}

#[derive(Debug, Clone)]
pub struct LinearInterp {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl LinearInterp {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self> {
        validate_knots(&x, &y)?;
        Ok(Self { x, y })
    }

    pub fn domain(&self) -> (f64, f64) {
        (self.x[0], self.x[self.x.len() - 1])
    }

    pub fn eval(&self, t: f64) -> Result<f64> {
        let k = locate(&self.x, t)?;
        let (x0, x1) = (self.x[k], self.x[k + 1]);
        let w = (t - x0) / (x1 - x0);
        Ok(self.y[k] + w * (self.y[k + 1] - self.y[k]))
    }

    pub fn eval_many(&self, t: &[f64]) -> Result<Vec<f64>> {
        t.iter().map(|&v| self.eval(v)).collect()
    }
}

#[derive(Debug, Clone)]
pub struct CubicSpline {
    x: Vec<f64>,
    y: Vec<f64>,
    /// Second derivative at each knot.
    m: Vec<f64>,
}

impl CubicSpline {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self> {
        validate_knots(&x, &y)?;
        let m = match x.len() {
            2 => vec![0.0; 2],
            3 => {
                let (h0, h1) = (x[1] - x[0], x[2] - x[1]);
                let curvature = 2.0 * ((y[2] - y[1]) / h1 - (y[1] - y[0]) / h0) / (h0 + h1);
                vec![curvature; 3]
            }
            _ => not_a_knot_second_derivatives(&x, &y)?,
        };
        Ok(Self { x, y, m })
    }

    pub fn domain(&self) -> (f64, f64) {
        (self.x[0], self.x[self.x.len() - 1])
    }

    pub fn eval(&self, t: f64) -> Result<f64> {
        let k = locate(&self.x, t)?;
        let (x0, x1) = (self.x[k], self.x[k + 1]);
        let h = x1 - x0;
        let (a, b) = (x1 - t, t - x0);
        let (m0, m1) = (self.m[k], self.m[k + 1]);
        Ok(m0 * a.powi(3) / (6.0 * h)
            + m1 * b.powi(3) / (6.0 * h)
            + (self.y[k] / h - m0 * h / 6.0) * a
            + (self.y[k + 1] / h - m1 * h / 6.0) * b)
    }

    pub fn eval_many(&self, t: &[f64]) -> Result<Vec<f64>> {
        t.iter().map(|&v| self.eval(v)).collect()
    }
}

/// Solve for knot second derivatives under not-a-knot end conditions (n >= 4).
///
/// The two end conditions are eliminated into the first and last interior
/// equations, leaving a tridiagonal system in `M_1..M_{n-2}`.
fn not_a_knot_second_derivatives(x: &[f64], y: &[f64]) -> Result<Vec<f64>> {
    let n = x.len();
    let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let slope: Vec<f64> = (0..n - 1).map(|i| (y[i + 1] - y[i]) / h[i]).collect();

    let m = n - 2;
    let mut sub = vec![0.0; m];
    let mut diag = vec![0.0; m];
    let mut sup = vec![0.0; m];
    let mut rhs = vec![0.0; m];

    for j in 0..m {
        let i = j + 1;
        sub[j] = h[i - 1];
        diag[j] = 2.0 * (h[i - 1] + h[i]);
        sup[j] = h[i];
        rhs[j] = 6.0 * (slope[i] - slope[i - 1]);
    }

    let (h0, h1) = (h[0], h[1]);
    diag[0] = (h0 + h1) * (h0 + 2.0 * h1) / h1;
    sup[0] = (h1 * h1 - h0 * h0) / h1;

    let (a, b) = (h[n - 3], h[n - 2]);
    sub[m - 1] = (a * a - b * b) / a;
    diag[m - 1] = (a + b) * (2.0 * a + b) / a;

    let inner = solve_tridiagonal(&sub, &diag, &sup, &rhs)?;

    let mut out = Vec::with_capacity(n);
    out.push(((h0 + h1) * inner[0] - h0 * inner[1]) / h1);
    out.extend_from_slice(&inner);
    out.push(((a + b) * inner[m - 1] - b * inner[m - 2]) / a);
    Ok(out)
}

/// Thomas algorithm. `sub[0]` and `sup[n-1]` are ignored.
fn solve_tridiagonal(sub: &[f64], diag: &[f64], sup: &[f64], rhs: &[f64]) -> Result<Vec<f64>> {
    let n = diag.len();
    let mut c = vec![0.0; n];
    let mut d = vec![0.0; n];

    let mut pivot = diag[0];
    for i in 0..n {
        if i > 0 {
            pivot = diag[i] - sub[i] * c[i - 1];
        }
        if pivot.abs() < f64::EPSILON * diag[i].abs().max(1.0) {
            return Err(NerosError::numeric_domain("singular spline system"));
        }
        c[i] = if i + 1 < n { sup[i] / pivot } else { 0.0 };
        d[i] = if i == 0 {
            rhs[0] / pivot
        } else {
            (rhs[i] - sub[i] * d[i - 1]) / pivot
        };
    }

    let mut out = d;
    for i in (0..n - 1).rev() {
        out[i] -= c[i] * out[i + 1];
    }
    Ok(out)
}
