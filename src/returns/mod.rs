//! Return-target estimation across many horizons.
//!
//! - `n_step`: n-step / Monte-Carlo / TD calculators (the shared kernel)
//! - `lambda`: λ-geometric mixture of n-step returns (exact and sampled)
//! - `exponential`: exponentially spaced n-step lengths, averaged
//! - `adaptive`: horizon-dependent n-step lengths
//!
//! Every estimator produces a [`ReturnEstimate`]: a fresh `[N, A, K]` tensor
//! of return targets (plus an optional second-moment tensor) for the
//! caller's required horizons. Estimator selection is a closed enum
//! dispatched exhaustively, not string mode names.

pub mod adaptive;
pub mod exponential;
pub mod lambda;
pub mod n_step;


use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::{Rollout, ValueTable};

pub use adaptive::compute_adaptive_returns;
pub use exponential::{compute_exponential_returns, ExponentialCombineMode};
pub use lambda::{compute_lambda_returns, LambdaMode};
pub use n_step::{compute_mc_returns, compute_n_step_returns, compute_td_returns};

/// Return targets for one rollout window.
///
/// Flat `[N, A, K]` layout with the horizon axis contiguous, matching
/// [`ValueTable`]. Outputs are always freshly allocated; the engine holds no
/// rolling buffers.
#[derive(Debug, Clone)]
pub struct ReturnEstimate {
    data: Vec<f32>,
    m2: Option<Vec<f32>>,
    horizons: Vec<usize>,
    n_steps: usize,
    n_agents: usize,
}

impl ReturnEstimate {
    pub(crate) fn new(
        data: Vec<f32>,
        m2: Option<Vec<f32>>,
        horizons: Vec<usize>,
        n_steps: usize,
        n_agents: usize,
    ) -> Self {
        assert_eq!(data.len(), n_steps * n_agents * horizons.len());
        if let Some(m2) = &m2 {
            assert_eq!(m2.len(), data.len());
        }
        Self { data, m2, horizons, n_steps, n_agents }
    }

    /// Return target at `(t, a, horizon index k)`.
    #[inline]
    pub fn value(&self, t: usize, a: usize, k: usize) -> f32 {
        self.data[(t * self.n_agents + a) * self.horizons.len() + k]
    }

    /// Flat `[N, A, K]` buffer of first-moment targets.
    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Flat `[N, A, K]` second-moment targets, when produced.
    #[inline]
    pub fn second_moment(&self) -> Option<&[f32]> {
        self.m2.as_deref()
    }

    /// Horizons the targets were produced for.
    #[inline]
    pub fn horizons(&self) -> &[usize] {
        &self.horizons
    }

    #[inline]
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    #[inline]
    pub fn n_agents(&self) -> usize {
        self.n_agents
    }

    /// Replace the raw second moment with `sqrt(max(m2, 0))`.
    ///
    /// The value model is trained against the sqrt of the second moment, so
    /// the engine applies this once targets are final.
    pub fn sqrt_second_moment_in_place(&mut self) {
        if let Some(m2) = self.m2.as_mut() {
            for v in m2.iter_mut() {
                *v = v.max(0.0).sqrt();
            }
        }
    }
}

/// Copy a column-block estimate (a contiguous horizon subrange) into a full
/// `[N, A, K]` output at the given horizon offset.
pub(crate) fn paste_columns(
    src: &ReturnEstimate,
    dst: &mut [f32],
    dst_m2: Option<&mut Vec<f32>>,
    total_k: usize,
    offset: usize,
) {
    let k = src.horizons.len();
    let rows = src.n_steps * src.n_agents;
    for row in 0..rows {
        let s = row * k;
        let d = row * total_k + offset;
        dst[d..d + k].copy_from_slice(&src.data[s..s + k]);
    }
    if let Some(dst_m2) = dst_m2 {
        let src_m2 = src.m2.as_ref().expect("column block missing second moment");
        for row in 0..rows {
            let s = row * k;
            let d = row * total_k + offset;
            dst_m2[d..d + k].copy_from_slice(&src_m2[s..s + k]);
        }
    }
}

/// Which return estimator generates training targets.
///
/// Closed set; adding a variant forces every dispatch site to handle it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorMode {
    /// Fixed n-step lookahead.
    NStep { n: usize },
    /// Full-window Monte Carlo (n = N).
    MonteCarlo,
    /// λ-geometric mixture of n-step returns.
    Lambda { lambda: f32, mode: LambdaMode },
    /// Exponentially spaced n-step lengths, averaged.
    Exponential { base: f32, mode: ExponentialCombineMode },
    /// Horizon-dependent n-step: n(h) = max(1, round(c · n_base · h / H_max)).
    Adaptive { coef: f32, base_n: usize },
}

/// Compute return targets under the selected estimator.
///
/// `values` (and the optional `values_m2`) must cover `N + 1` rows of the
/// rollout; `required_horizons` must be sorted ascending but need not be a
/// subset of the value table's sampled horizons; missing points are
/// interpolated (`log_interpolation` selects `log(1+h)` space).
pub fn get_return_estimate(
    mode: EstimatorMode,
    rollout: &Rollout,
    values: &ValueTable,
    values_m2: Option<&ValueTable>,
    required_horizons: &[usize],
    gamma: f32,
    log_interpolation: bool,
    rng: &mut impl Rng,
) -> ReturnEstimate {
    match mode {
        EstimatorMode::NStep { n } => compute_n_step_returns(
            rollout, values, values_m2, required_horizons, gamma, n, log_interpolation,
        ),
        EstimatorMode::MonteCarlo => compute_mc_returns(
            rollout, values, values_m2, required_horizons, gamma, log_interpolation,
        ),
        EstimatorMode::Lambda { lambda, mode } => compute_lambda_returns(
            rollout, values, values_m2, required_horizons, gamma, lambda, mode,
            log_interpolation, rng,
        ),
        EstimatorMode::Exponential { base, mode } => compute_exponential_returns(
            rollout, values, values_m2, required_horizons, gamma, base, mode,
            log_interpolation,
        ),
        EstimatorMode::Adaptive { coef, base_n } => compute_adaptive_returns(
            rollout, values, values_m2, required_horizons, gamma, coef, base_n,
            log_interpolation,
        ),
    }
}
