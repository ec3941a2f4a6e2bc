//! Fit driver for a single galaxy.
//!
//! Given a shared `ReferenceModel` and a galaxy's six columns
//! (radius, gas / disk / bulge velocities, observed velocity and its error),
//! `NerosFitter::fit`:
//!
//! - validates and clips the input to the reference radius domain
//! - pulls each initial guess back into the feasible region by halving alpha
//!   (`alpha = 0` leaves `vNeros² = vLum² >= 0`, so that always succeeds)
//! - runs Levenberg–Marquardt from every initial guess (parallel)
//! - keeps the lowest-cost start, ties broken by start index
//! - stores parameters, covariance, mean chi-squared and `phi_zero`
//!
//! The driver is `Unfit` until a fit succeeds. `fit` takes `&mut self`, so the
//! transient fitting phase is never observable; a failed fit leaves the
//! previous state as it was.

use nalgebra::{DVector, Matrix3};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::domain::{FitInput, FitParams, FitReport, FitResult, ParameterConvention};
use crate::error::{NerosError, Result, ensure_same_len};
use crate::fit::lm::{FitOptions, LmOutcome, levenberg_marquardt};
use crate::math::jtj_pseudo_inverse;
use crate::models::{LcmModel, ReferenceModel, v_lum_squared};

/// Parameters estimated by every fit.
const N_PARAMS: usize = FitParams::LEN;

/// Halvings of an infeasible start's alpha before falling back to `alpha = 0`.
const MAX_ALPHA_HALVINGS: usize = 30;

/// Mean reduced chi-squared `(1/N) Σ ((model - observed) / error)²`.
pub fn chi_squared(model: &[f64], observed: &[f64], error: &[f64]) -> Result<f64> {
    ensure_same_len("chiSquared observed", model.len(), observed.len())?;
    ensure_same_len("chiSquared error", model.len(), error.len())?;
    if model.is_empty() {
        return Err(NerosError::validation("chi-squared of an empty sample"));
    }
    let mut sum = 0.0;
    for (i, ((m, o), e)) in model.iter().zip(observed).zip(error).enumerate() {
        if *e == 0.0 {
            return Err(NerosError::numeric_domain(format!(
                "zero observation error at index {i}"
            )));
        }
        let z = (m - o) / e;
        sum += z * z;
    }
    Ok(sum / model.len() as f64)
}

/// `sqrt(vLumSquared)` at the given scales.
pub fn v_lum(input: &FitInput, params: &FitParams) -> Result<Vec<f64>> {
    Ok(v_lum_squared(
        &input.v_gas,
        &input.v_disk,
        &input.v_bulge,
        params.disk_scale,
        params.bulge_scale,
    )?
    .into_iter()
    .map(f64::sqrt)
    .collect())
}

/// Predicted observed velocity at the clipped radii of `input`.
pub fn predict(model: &LcmModel<'_>, input: &FitInput, params: &FitParams) -> Result<Vec<f64>> {
    let v_lum = v_lum(input, params)?;
    model.v_neros(&input.radius, &v_lum, params.alpha)
}

/// Lifecycle of a `NerosFitter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitPhase {
    Unfit,
    Fitted,
}

#[derive(Debug, Clone)]
struct Fitted {
    /// Input restricted to the reference domain.
    input: FitInput,
    result: FitResult,
}

#[derive(Debug, Clone)]
enum FitState {
    Unfit,
    Fitted(Box<Fitted>),
}

#[derive(Debug, Clone)]
struct Start {
    idx: usize,
    outcome: LmOutcome,
}

/// Stateful fitter bound to one reference model.
#[derive(Debug, Clone)]
pub struct NerosFitter<'a> {
    model: LcmModel<'a>,
    options: FitOptions,
    state: FitState,
}

impl<'a> NerosFitter<'a> {
    pub fn new(reference: &'a ReferenceModel) -> Self {
        Self::with_options(reference, FitOptions::default())
    }

    pub fn with_options(reference: &'a ReferenceModel, options: FitOptions) -> Self {
        Self::with_model(LcmModel::new(reference), options)
    }

    pub fn with_model(model: LcmModel<'a>, options: FitOptions) -> Self {
        Self {
            model,
            options,
            state: FitState::Unfit,
        }
    }

    pub fn model(&self) -> &LcmModel<'a> {
        &self.model
    }

    pub fn options(&self) -> &FitOptions {
        &self.options
    }

    pub fn phase(&self) -> FitPhase {
        match self.state {
            FitState::Unfit => FitPhase::Unfit,
            FitState::Fitted(_) => FitPhase::Fitted,
        }
    }

    /// The model function handed to the optimizer: `vNeros` at `params`.
    pub fn curve_fit_fn(&self, input: &FitInput, params: &FitParams) -> Result<Vec<f64>> {
        predict(&self.model, input, params)
    }

    /// Fit `(alpha, disk_scale, bulge_scale)` to one galaxy.
    pub fn fit(&mut self, input: &FitInput) -> Result<&FitResult> {
        input.validate()?;
        self.options.validate()?;

        let r_max = self.model.reference().max_radius();
        let clipped = input.clipped(r_max);
        if clipped.len() < N_PARAMS {
            return Err(NerosError::InsufficientData(format!(
                "{} of {} points lie within the reference radius {r_max}; need at least {N_PARAMS}",
                clipped.len(),
                input.len()
            )));
        }
        if clipped.len() < input.len() {
            debug!(
                dropped = input.len() - clipped.len(),
                r_max, "clipped galaxy points beyond the reference curve"
            );
        }

        let best = self.best_start(&clipped)?;
        let params = FitParams::from_slice(&best.outcome.x);

        // Infeasible at the optimum is fatal, unlike during the search.
        let predicted = predict(&self.model, &clipped, &params)?;
        let chi2 = chi_squared(&predicted, &clipped.v_obs, &clipped.v_obs_error)?;
        let phi_zero = self.model.phi_zero(&clipped.radius)?;
        let covariance = covariance(&best.outcome, clipped.len());

        info!(
            start = best.idx,
            iterations = best.outcome.iterations,
            evaluations = best.outcome.evaluations,
            alpha = params.alpha,
            disk_scale = params.disk_scale,
            bulge_scale = params.bulge_scale,
            chi_squared = chi2,
            "fit converged"
        );

        let result = FitResult {
            params,
            covariance,
            chi_squared: chi2,
            phi_zero,
            iterations: best.outcome.iterations,
            evaluations: best.outcome.evaluations,
            start_index: best.idx,
        };
        self.state = FitState::Fitted(Box::new(Fitted {
            input: clipped,
            result,
        }));
        self.result()
    }

    fn best_start(&self, clipped: &FitInput) -> Result<Start> {
        let model = self.model;
        let residuals = |p: &[f64]| -> Result<DVector<f64>> {
            let predicted = predict(&model, clipped, &FitParams::from_slice(p))?;
            Ok(DVector::from_iterator(
                predicted.len(),
                predicted
                    .iter()
                    .zip(&clipped.v_obs)
                    .zip(&clipped.v_obs_error)
                    .map(|((m, o), e)| (m - o) / e),
            ))
        };

        // Every start is independent; evaluate them in parallel.
        let runs: Vec<(usize, Result<LmOutcome>)> = self
            .options
            .initial_guesses
            .par_iter()
            .enumerate()
            .map(|(idx, guess)| {
                let start = feasible_start(&residuals, *guess);
                (idx, levenberg_marquardt(&residuals, &start.to_array(), &self.options))
            })
            .collect();

        let mut best: Option<Start> = None;
        let mut first_error: Option<NerosError> = None;
        for (idx, run) in runs {
            match run {
                Ok(outcome) => {
                    let better = match &best {
                        None => true,
                        Some(b) => {
                            outcome.cost < b.outcome.cost
                                || (outcome.cost == b.outcome.cost && idx < b.idx)
                        }
                    };
                    if better {
                        best = Some(Start { idx, outcome });
                    }
                }
                Err(e) => {
                    debug!(start = idx, error = %e, "start failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        match (best, first_error) {
            (Some(b), _) => Ok(b),
            (None, Some(e)) => Err(e),
            (None, None) => Err(NerosError::convergence("no initial guesses")),
        }
    }

    fn fitted(&self) -> Result<&Fitted> {
        match &self.state {
            FitState::Fitted(f) => Ok(f),
            FitState::Unfit => Err(NerosError::NotFitted),
        }
    }

    pub fn result(&self) -> Result<&FitResult> {
        Ok(&self.fitted()?.result)
    }

    /// `{alpha, disk_scale, bulge_scale, chi_squared, phi_zero}` in the physical convention.
    pub fn get_fit_results(&self, radius: &[f64]) -> Result<FitReport> {
        self.get_fit_results_with(radius, ParameterConvention::Physical)
    }

    /// Fit summary with `phi_zero` taken at the largest `radius` inside the reference domain.
    pub fn get_fit_results_with(
        &self,
        radius: &[f64],
        convention: ParameterConvention,
    ) -> Result<FitReport> {
        let fitted = self.fitted()?;
        let p = fitted.result.params;
        let (alpha, disk_scale, bulge_scale) = match convention {
            ParameterConvention::Physical => (p.alpha * p.alpha, p.disk_scale.abs(), p.bulge_scale.abs()),
            ParameterConvention::Internal => (p.alpha, p.disk_scale, p.bulge_scale),
        };
        Ok(FitReport {
            alpha,
            disk_scale,
            bulge_scale,
            chi_squared: fitted.result.chi_squared,
            phi_zero: self.model.phi_zero(radius)?,
        })
    }

    /// Clipped radii used by the stored fit.
    pub fn rad(&self) -> Result<&[f64]> {
        Ok(&self.fitted()?.input.radius)
    }

    pub fn v_obs(&self) -> Result<&[f64]> {
        Ok(&self.fitted()?.input.v_obs)
    }

    pub fn v_obs_error(&self) -> Result<&[f64]> {
        Ok(&self.fitted()?.input.v_obs_error)
    }

    /// Luminous velocity at the best-fit scales.
    pub fn v_lum_scaled(&self) -> Result<Vec<f64>> {
        let f = self.fitted()?;
        v_lum(&f.input, &f.result.params)
    }

    /// Model prediction at the best fit.
    pub fn v_neros(&self) -> Result<Vec<f64>> {
        let f = self.fitted()?;
        predict(&self.model, &f.input, &f.result.params)
    }

    pub fn chi_squared(&self) -> Result<f64> {
        Ok(self.fitted()?.result.chi_squared)
    }
}

/// `guess` with its alpha halved until the residuals are defined there.
///
/// A galaxy whose potential exceeds the reference's has `vLCM < 0`, which can
/// make `vNeros²` negative at the default start. Any error other than
/// `NumericDomain` is left for the optimizer to report.
fn feasible_start<F>(residuals: &F, guess: FitParams) -> FitParams
where
    F: Fn(&[f64]) -> Result<DVector<f64>>,
{
    let mut start = guess;
    for _ in 0..MAX_ALPHA_HALVINGS {
        match residuals(&start.to_array()) {
            Err(e) if e.is_numeric_domain() => start.alpha *= 0.5,
            _ => {
                if start.alpha != guess.alpha {
                    debug!(from = guess.alpha, to = start.alpha, "shrank alpha of infeasible start");
                }
                return start;
            }
        }
    }
    debug!(from = guess.alpha, "start infeasible at every alpha tried; using alpha = 0");
    FitParams { alpha: 0.0, ..guess }
}

/// `pinv(JᵀJ) · cost / (N - p)`; infinite when there are no spare degrees of freedom.
fn covariance(outcome: &LmOutcome, n: usize) -> Matrix3<f64> {
    if n <= N_PARAMS {
        warn!(points = n, "no residual degrees of freedom; covariance is infinite");
        return Matrix3::from_element(f64::INFINITY);
    }
    let pinv = jtj_pseudo_inverse(&outcome.jacobian);
    let s = outcome.cost / (n - N_PARAMS) as f64;
    Matrix3::from_fn(|i, j| pinv[(i, j)] * s)
}
