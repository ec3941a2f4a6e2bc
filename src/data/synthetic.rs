//! Synthetic reference curve and galaxies.
//!
//! The reference curve rises from 200 km/s at r = 1 to a 220 km/s plateau:
//! `v(r) = 220 - 20 · 2^{-(r-1)}` for `r = 1..=50`.
//!
//! A synthetic galaxy has smooth gas / disk / bulge profiles and an observed
//! velocity equal to the LCM prediction at chosen parameters plus Gaussian
//! noise from a seeded RNG, so demos and tests are reproducible.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{FitInput, FitParams, ModelConfig};
use crate::error::{NerosError, Result};
use crate::fit::predict;
use crate::models::{LcmModel, ReferenceModel};

/// Largest radius of the synthetic reference curve.
pub const REFERENCE_MAX_RADIUS: usize = 50;

pub fn reference_rows() -> Vec<[f64; 2]> {
    (1..=REFERENCE_MAX_RADIUS)
        .map(|i| {
            let r = i as f64;
            [r, 220.0 - 20.0 * 0.5_f64.powf(r - 1.0)]
        })
        .collect()
}

pub fn reference_model(config: ModelConfig) -> Result<ReferenceModel> {
    ReferenceModel::from_rows(&reference_rows(), config)
}

/// Shape and truth of a synthetic galaxy.
#[derive(Debug, Clone)]
pub struct GalaxySpec {
    pub name: String,
    pub n_points: usize,
    pub r_min: f64,
    pub r_max: f64,
    /// Internal-convention parameters used to generate `v_obs`.
    pub truth: FitParams,
    /// Standard deviation of the noise added to `v_obs` (km/s).
    pub noise_sigma: f64,
    /// Reported observation error; never below this value.
    pub error_floor: f64,
    pub seed: u64,
}

impl Default for GalaxySpec {
    fn default() -> Self {
        Self {
            name: "SYN-001".to_string(),
            n_points: 24,
            r_min: 0.5,
            r_max: 30.0,
            truth: FitParams {
                alpha: 1.2,
                disk_scale: 0.8,
                bulge_scale: 1.1,
            },
            noise_sigma: 2.0,
            error_floor: 5.0,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticGalaxy {
    pub name: String,
    pub truth: FitParams,
    pub input: FitInput,
}

fn gas_profile(r: f64) -> f64 {
    40.0 * (1.0 - (-r / 5.0).exp())
}

fn disk_profile(r: f64) -> f64 {
    let x = r / 3.0;
    140.0 * x * (1.0 - x).exp()
}

fn bulge_profile(r: f64) -> f64 {
    90.0 * (-r / 1.5).exp()
}

/// Generate a galaxy whose radii all lie inside `reference`'s domain.
pub fn synthetic_galaxy(reference: &ReferenceModel, spec: &GalaxySpec) -> Result<SyntheticGalaxy> {
    if spec.n_points < 2 {
        return Err(NerosError::validation("a synthetic galaxy needs at least 2 points"));
    }
    if !(spec.r_min > 0.0 && spec.r_max > spec.r_min && spec.r_max <= reference.max_radius()) {
        return Err(NerosError::validation(format!(
            "synthetic radius range [{}, {}] must lie in (0, {}]",
            spec.r_min,
            spec.r_max,
            reference.max_radius()
        )));
    }
    if !(spec.noise_sigma.is_finite() && spec.noise_sigma >= 0.0 && spec.error_floor > 0.0) {
        return Err(NerosError::validation(
            "noise sigma must be >= 0 and the error floor > 0",
        ));
    }

    let step = (spec.r_max - spec.r_min) / (spec.n_points as f64 - 1.0);
    let radius: Vec<f64> = (0..spec.n_points)
        .map(|i| spec.r_min + step * i as f64)
        .collect();
    let n = radius.len();

    let mut input = FitInput::new(
        radius.clone(),
        radius.iter().map(|&r| gas_profile(r)).collect(),
        radius.iter().map(|&r| disk_profile(r)).collect(),
        radius.iter().map(|&r| bulge_profile(r)).collect(),
        vec![0.0; n],
        vec![spec.error_floor.max(spec.noise_sigma); n],
    )?;

    let model = LcmModel::new(reference);
    let clean = predict(&model, &input, &spec.truth)?;

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let normal = Normal::new(0.0, spec.noise_sigma)
        .map_err(|e| NerosError::validation(format!("noise distribution error: {e}")))?;
    input.v_obs = clean
        .into_iter()
        .map(|v| (v + normal.sample(&mut rng)).max(0.0))
        .collect();

    Ok(SyntheticGalaxy {
        name: spec.name.clone(),
        truth: spec.truth,
        input,
    })
}
