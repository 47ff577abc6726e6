//! Adaptive n-step: lookahead length scales with the target horizon.
//!
//! Short horizons need little lookahead (their bootstrap residual is small
//! and mostly bias-free), while long horizons benefit from long lookaheads.
//! The length rule is
//!
//! n(h) = clamp(round(c · n_base · h / H_max), 1, N)
//!
//! with `H_max` the run's maximum horizon. Horizons sharing an `n(h)` are
//! batched into one kernel pass, so the cost scales with the number of
//! distinct lengths rather than the number of horizons.

use crate::core::{Rollout, ValueTable};
use crate::returns::n_step::compute_weighted_n_step_returns;
use crate::returns::{paste_columns, ReturnEstimate};

/// Lookahead length for one target horizon.
#[inline]
fn adaptive_n(h: usize, coef: f32, base_n: usize, max_horizon: usize, n_max: usize) -> usize {
    let scaled = (coef * base_n as f32 * h as f32 / max_horizon as f32).round() as usize;
    scaled.clamp(1, n_max)
}

/// Adaptive n-step return estimate for every required horizon.
///
/// The maximum horizon is taken from the value table's horizon axis (its
/// final entry, which the sampler pins to `H_max`).
pub fn compute_adaptive_returns(
    rollout: &Rollout,
    values: &ValueTable,
    values_m2: Option<&ValueTable>,
    required_horizons: &[usize],
    gamma: f32,
    coef: f32,
    base_n: usize,
    log_interpolation: bool,
) -> ReturnEstimate {
    assert!(coef > 0.0, "Adaptive coefficient must be positive, got {}", coef);
    assert!(base_n >= 1, "Adaptive base n-step must be >= 1");

    let n = rollout.n_steps();
    let a = rollout.n_agents();
    let total_k = required_horizons.len();
    let max_horizon = *values.horizons().last().unwrap();
    assert!(max_horizon >= 1, "Value table must cover a nonzero horizon");

    let mut out = vec![0.0f32; n * a * total_k];
    let mut out_m2 = values_m2.map(|_| vec![0.0f32; n * a * total_k]);

    // n(h) is non-decreasing in h, so equal-length horizons form contiguous
    // groups
    let mut start = 0;
    while start < total_k {
        let len = adaptive_n(required_horizons[start], coef, base_n, max_horizon, n);
        let mut end = start + 1;
        while end < total_k
            && adaptive_n(required_horizons[end], coef, base_n, max_horizon, n) == len
        {
            end += 1;
        }

        let block = compute_weighted_n_step_returns(
            rollout, values, values_m2, &required_horizons[start..end], &[(len, 1.0)],
            gamma, log_interpolation,
        );
        paste_columns(&block, &mut out, out_m2.as_mut(), total_k, start);
        start = end;
    }

    ReturnEstimate::new(out, out_m2, required_horizons.to_vec(), n, a)
}
