//! Levenberg–Marquardt for small, σ-weighted least-squares problems.
//!
//! The caller supplies a residual function `x -> r(x)` (already divided by the
//! observation errors). Each iteration:
//!
//! - builds a forward-difference Jacobian
//! - solves the damped step `[J; √λ D] δ = [-r; 0]` (see `math::damped_step`)
//! - accepts the trial if the cost `‖r‖²` decreases, otherwise raises λ
//!
//! A trial that fails with `NumericDomain` (an undefined intermediate at that
//! parameter vector) is rejected like an uphill step. Every residual
//! evaluation counts against `max_evaluations`; running out is a
//! `Convergence` error, never a hang.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, trace};

use crate::domain::FitParams;
use crate::error::{NerosError, Result};
use crate::math::damped_step;

/// Optimizer limits and the initial guesses to start from.
#[derive(Debug, Clone)]
pub struct FitOptions {
    /// Budget of residual evaluations per start (Jacobian columns included).
    pub max_evaluations: usize,
    pub max_iterations: usize,
    /// Stop when an accepted step reduces the cost by less than this fraction.
    pub ftol: f64,
    /// Stop when the step is smaller than `xtol · (xtol + ‖x‖)`.
    pub xtol: f64,
    /// Stop when `max |Jᵀr| <= gtol`.
    pub gtol: f64,
    pub lambda_init: f64,
    pub lambda_up: f64,
    pub lambda_down: f64,
    /// Damping beyond this means no descent direction exists.
    pub lambda_max: f64,
    /// Relative forward-difference step.
    pub fd_step: f64,
    /// Internal-convention starting points; each one is an independent start.
    pub initial_guesses: Vec<FitParams>,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_evaluations: 10_000,
            max_iterations: 2_000,
            ftol: 1.49012e-8,
            xtol: 1.49012e-8,
            gtol: 0.0,
            lambda_init: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
            lambda_max: 1e16,
            fd_step: f64::EPSILON.sqrt(),
            initial_guesses: vec![FitParams::default()],
        }
    }
}

impl FitOptions {
    pub fn validate(&self) -> Result<()> {
        if self.max_evaluations == 0 || self.max_iterations == 0 {
            return Err(NerosError::validation(
                "max evaluations and max iterations must be >= 1",
            ));
        }
        for (name, v) in [("ftol", self.ftol), ("xtol", self.xtol), ("gtol", self.gtol)] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(NerosError::validation(format!("{name} must be finite and >= 0, got {v}")));
            }
        }
        if !(self.lambda_init > 0.0
            && self.lambda_up > 1.0
            && self.lambda_down > 0.0
            && self.lambda_down < 1.0
            && self.lambda_max > self.lambda_init)
        {
            return Err(NerosError::validation(
                "damping schedule needs lambda_init > 0, lambda_up > 1, 0 < lambda_down < 1, lambda_max > lambda_init",
            ));
        }
        if !(self.fd_step.is_finite() && self.fd_step > 0.0) {
            return Err(NerosError::validation(format!(
                "fd_step must be finite and > 0, got {}",
                self.fd_step
            )));
        }
        if self.initial_guesses.is_empty() {
            return Err(NerosError::validation("at least one initial guess is required"));
        }
        if let Some(g) = self
            .initial_guesses
            .iter()
            .find(|g| g.to_array().iter().any(|v| !v.is_finite()))
        {
            return Err(NerosError::validation(format!("initial guess {g:?} is not finite")));
        }
        Ok(())
    }
}

/// Why the optimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    ZeroCost,
    SmallReduction,
    SmallStep,
    ZeroGradient,
}

/// Converged optimizer state.
#[derive(Debug, Clone)]
pub struct LmOutcome {
    pub x: Vec<f64>,
    /// `‖r‖²` at `x`.
    pub cost: f64,
    pub residuals: DVector<f64>,
    /// Jacobian of the weighted residuals at `x`.
    pub jacobian: DMatrix<f64>,
    pub iterations: usize,
    pub evaluations: usize,
    pub termination: Termination,
}

struct Counted<'f, F> {
    f: &'f F,
    evaluations: usize,
    budget: usize,
}

impl<F> Counted<'_, F>
where
    F: Fn(&[f64]) -> Result<DVector<f64>>,
{
    fn eval(&mut self, x: &DVector<f64>) -> Result<DVector<f64>> {
        if self.evaluations >= self.budget {
            return Err(NerosError::convergence(format!(
                "maximum number of evaluations ({}) exceeded",
                self.budget
            )));
        }
        self.evaluations += 1;
        let r = (self.f)(x.as_slice())?;
        if r.iter().any(|v| !v.is_finite()) {
            return Err(NerosError::numeric_domain("non-finite residual"));
        }
        Ok(r)
    }

    /// Forward differences; a column whose forward probe is infeasible falls
    /// back to a backward probe, and to zero if both are.
    fn jacobian(&mut self, x: &DVector<f64>, r: &DVector<f64>, fd_step: f64) -> Result<DMatrix<f64>> {
        let mut jac = DMatrix::<f64>::zeros(r.len(), x.len());
        for j in 0..x.len() {
            let h = fd_step * (1.0 + x[j].abs());
            let mut probe = x.clone();
            probe[j] += h;
            let column = match self.eval(&probe) {
                Ok(rp) => Some((rp - r) / h),
                Err(e) if e.is_numeric_domain() => {
                    probe[j] = x[j] - h;
                    match self.eval(&probe) {
                        Ok(rm) => Some((r - rm) / h),
                        Err(e) if e.is_numeric_domain() => None,
                        Err(e) => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            };
            match column {
                Some(c) => jac.set_column(j, &c),
                None => debug!(param = j, "jacobian column infeasible both ways; using zero"),
            }
        }
        Ok(jac)
    }
}

/// Minimize `‖f(x)‖²` from `x0`.
pub fn levenberg_marquardt<F>(f: &F, x0: &[f64], opts: &FitOptions) -> Result<LmOutcome>
where
    F: Fn(&[f64]) -> Result<DVector<f64>>,
{
    let mut problem = Counted {
        f,
        evaluations: 0,
        budget: opts.max_evaluations,
    };

    let mut x = DVector::from_column_slice(x0);
    let mut r = match problem.eval(&x) {
        Ok(r) => r,
        Err(e) if e.is_numeric_domain() => {
            return Err(NerosError::convergence(format!(
                "initial guess {x0:?} is infeasible: {e}"
            )));
        }
        Err(e) => return Err(e),
    };
    let mut cost = r.norm_squared();
    let mut lambda = opts.lambda_init;
    let mut scale = DVector::<f64>::zeros(x.len());

    for iteration in 1..=opts.max_iterations {
        if cost == 0.0 {
            return finish(&mut problem, x, r, cost, iteration - 1, Termination::ZeroCost, opts);
        }

        let jac = problem.jacobian(&x, &r, opts.fd_step)?;
        let gradient = jac.tr_mul(&r);
        if gradient.amax() <= opts.gtol {
            return finish(&mut problem, x, r, cost, iteration - 1, Termination::ZeroGradient, opts);
        }

        // Marquardt scaling: running max of the Jacobian column norms.
        for j in 0..x.len() {
            let norm = jac.column(j).norm();
            scale[j] = scale[j].max(norm);
        }
        let damping: DVector<f64> = scale.map(|s| if s > 0.0 { s } else { 1.0 });

        loop {
            let step_limit = opts.xtol * (opts.xtol + x.norm());
            let Some(step) = damped_step(&jac, &r, lambda, &damping) else {
                lambda *= opts.lambda_up;
                if lambda > opts.lambda_max {
                    return Err(NerosError::convergence("damped step could not be solved"));
                }
                continue;
            };

            let trial = &x + &step;
            let outcome = match problem.eval(&trial) {
                Ok(rt) => {
                    let trial_cost = rt.norm_squared();
                    (trial_cost < cost).then_some((rt, trial_cost))
                }
                Err(e) if e.is_numeric_domain() => {
                    trace!(iteration, lambda, error = %e, "rejected infeasible trial");
                    None
                }
                Err(e) => return Err(e),
            };

            match outcome {
                Some((rt, trial_cost)) => {
                    let reduction = (cost - trial_cost) / cost;
                    let small_step = step.norm() <= step_limit;
                    x = trial;
                    r = rt;
                    cost = trial_cost;
                    lambda = (lambda * opts.lambda_down).max(f64::MIN_POSITIVE);
                    debug!(iteration, cost, lambda, reduction, "accepted step");

                    if reduction <= opts.ftol {
                        return finish(&mut problem, x, r, cost, iteration, Termination::SmallReduction, opts);
                    }
                    if small_step {
                        return finish(&mut problem, x, r, cost, iteration, Termination::SmallStep, opts);
                    }
                    break;
                }
                None => {
                    if step.norm() <= step_limit {
                        return finish(&mut problem, x, r, cost, iteration, Termination::SmallStep, opts);
                    }
                    lambda *= opts.lambda_up;
                    if lambda > opts.lambda_max {
                        return Err(NerosError::convergence(format!(
                            "no descent direction from cost {cost} (lambda {lambda:e})"
                        )));
                    }
                }
            }
        }
    }

    Err(NerosError::convergence(format!(
        "maximum number of iterations ({}) reached",
        opts.max_iterations
    )))
}

fn finish<F>(
    problem: &mut Counted<'_, F>,
    x: DVector<f64>,
    residuals: DVector<f64>,
    cost: f64,
    iterations: usize,
    termination: Termination,
    opts: &FitOptions,
) -> Result<LmOutcome>
where
    F: Fn(&[f64]) -> Result<DVector<f64>>,
{
    // The covariance Jacobian is not charged to the search budget.
    problem.budget = usize::MAX;
    let jacobian = problem.jacobian(&x, &residuals, opts.fd_step)?;
    debug!(?termination, iterations, evaluations = problem.evaluations, cost, "optimizer stopped");
    Ok(LmOutcome {
        x: x.iter().copied().collect(),
        cost,
        residuals,
        jacobian,
        iterations,
        evaluations: problem.evaluations,
        termination,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Residuals of `y = a · exp(b · t)` against exact data.
    fn exponential(a: f64, b: f64) -> impl Fn(&[f64]) -> Result<DVector<f64>> {
        let t: Vec<f64> = (0..12).map(|i| i as f64 * 0.25).collect();
        let y: Vec<f64> = t.iter().map(|t| a * (b * t).exp()).collect();
        move |p: &[f64]| {
            Ok(DVector::from_iterator(
                t.len(),
                t.iter().zip(y.iter()).map(|(t, y)| p[0] * (p[1] * t).exp() - y),
            ))
        }
    }

    #[test]
    fn recovers_exponential_parameters() {
        let f = exponential(2.5, -0.7);
        let out = levenberg_marquardt(&f, &[1.0, 0.0], &FitOptions::default()).unwrap();
        assert!((out.x[0] - 2.5).abs() < 1e-6, "{:?}", out.x);
        assert!((out.x[1] + 0.7).abs() < 1e-6, "{:?}", out.x);
        assert!(out.cost < 1e-12);
        assert_eq!(out.jacobian.shape(), (12, 2));
    }

    #[test]
    fn flat_objective_stops_on_zero_gradient() {
        let f = |_: &[f64]| -> Result<DVector<f64>> { Ok(DVector::from_element(4, 3.0)) };
        let out = levenberg_marquardt(&f, &[1.0, 1.0], &FitOptions::default()).unwrap();
        assert_eq!(out.termination, Termination::ZeroGradient);
        assert_eq!(out.x, vec![1.0, 1.0]);
        assert!((out.cost - 36.0).abs() < 1e-12);
    }

    #[test]
    fn infeasible_region_is_rejected_not_fatal() {
        // Full Gauss-Newton steps from here overshoot into p0 < 0.
        let f = |p: &[f64]| -> Result<DVector<f64>> {
            if p[0] < 0.0 {
                return Err(NerosError::numeric_domain("negative"));
            }
            Ok(DVector::from_element(3, p[0].sqrt() + p[1] - 1.0))
        };
        let out = levenberg_marquardt(&f, &[4.0, 0.0], &FitOptions::default()).unwrap();
        assert!(out.cost < 1e-10, "cost {}", out.cost);
    }

    #[test]
    fn infeasible_start_is_a_convergence_error() {
        let f = |_: &[f64]| -> Result<DVector<f64>> { Err(NerosError::numeric_domain("always")) };
        let err = levenberg_marquardt(&f, &[1.0], &FitOptions::default()).unwrap_err();
        assert!(matches!(err, NerosError::Convergence(_)));
    }

    #[test]
    fn evaluation_budget_is_enforced() {
        let f = exponential(2.5, -0.7);
        let opts = FitOptions {
            max_evaluations: 2,
            ..FitOptions::default()
        };
        let err = levenberg_marquardt(&f, &[1.0, 0.0], &opts).unwrap_err();
        assert!(matches!(err, NerosError::Convergence(_)));
    }

    #[test]
    fn other_errors_propagate_unchanged() {
        let f = |_: &[f64]| -> Result<DVector<f64>> { Err(NerosError::validation("bad")) };
        let err = levenberg_marquardt(&f, &[1.0], &FitOptions::default()).unwrap_err();
        assert!(matches!(err, NerosError::Validation(_)));
    }

    #[test]
    fn options_validation() {
        assert!(FitOptions::default().validate().is_ok());
        let bad = FitOptions {
            initial_guesses: Vec::new(),
            ..FitOptions::default()
        };
        assert!(matches!(bad.validate(), Err(NerosError::Validation(_))));
        let bad = FitOptions {
            lambda_up: 0.5,
            ..FitOptions::default()
        };
        assert!(bad.validate().is_err());
    }
}
