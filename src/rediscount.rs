//! Gamma rediscounting: converting value estimates between discount factors.
//!
//! A value curve sampled at increasing horizons encodes the expected
//! per-step rewards: consecutive differences are the (discounted) marginal
//! reward at each horizon step. Undiscounting those and re-discounting under
//! a new gamma converts the curve without re-querying the model:
//!
//! reward_h = (V[h] − V[h−1]) / old_gamma^h
//! result   = Σ_h reward_h · new_gamma^h
//!
//! The reconstruction is only as good as the horizon sampling; the dynamic
//! schedule keeps the error near 1% while capping sample count.

use serde::{Deserialize, Serialize};

use crate::core::ValueTable;

/// Dynamic-schedule constants: effective-horizon scale and sample budget.
/// Together they keep reconstruction error under about 1%.
const EFFECTIVE_HORIZON_SCALE: f32 = 7.0;
const SAMPLE_BUDGET: usize = 400;

/// How the rediscounting horizon set is chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RediscountMode {
    /// A small static horizon set (debug horizons).
    Fixed { horizons: Vec<usize> },
    /// Horizon count and spacing adapt to the target gamma.
    Dynamic,
}

/// Rediscount a batch of value curves to a new gamma.
///
/// * `values` - flat `[B, K]` curves, horizon axis contiguous
/// * `horizons` - the `K` horizons the curves are sampled at, sorted
///
/// Returns `[B]` values at the final horizon under `new_gamma`. When the
/// gammas match this is exactly `values[:, -1]`, so no reconstruction error
/// is introduced.
pub fn rediscount_values(
    values: &[f32],
    horizons: &[usize],
    old_gamma: f32,
    new_gamma: f32,
) -> Vec<f32> {
    assert!(!horizons.is_empty(), "Rediscounting requires at least one horizon");
    assert!(
        horizons.windows(2).all(|w| w[0] < w[1]),
        "Rediscounting horizons must be strictly increasing, got {:?}",
        horizons
    );
    let k = horizons.len();
    assert_eq!(values.len() % k, 0, "values must be flat [B, K]");
    let b = values.len() / k;

    if (old_gamma - new_gamma).abs() < 1e-8 {
        return (0..b).map(|row| values[row * k + k - 1]).collect();
    }

    let mut out = vec![0.0f32; b];
    for (row, sum) in out.iter_mut().enumerate() {
        let curve = &values[row * k..(row + 1) * k];
        let mut prev = 0.0f32;
        for (i, &h) in horizons.iter().enumerate() {
            // marginal reward over (prev_h, h], undiscounted then re-discounted
            let reward = (curve[i] - prev) / old_gamma.powi(h as i32);
            prev = curve[i];
            *sum += reward * new_gamma.powi(h as i32);
        }
    }
    out
}

/// Rediscount every `(t, a)` curve of a value table.
///
/// Returns a flat `[T, A]` buffer of single-horizon estimates under
/// `new_gamma`.
pub fn rediscount_value_table(table: &ValueTable, old_gamma: f32, new_gamma: f32) -> Vec<f32> {
    rediscount_values(table.data(), table.horizons(), old_gamma, new_gamma)
}

/// Horizon schedule for dynamic rediscounting.
///
/// The effective horizon is `min(7 / (1 − new_gamma), max_horizon)` and the
/// step skip keeps the total sample count near the fixed budget. Horizons
/// are generated backwards from the effective horizon so the final horizon
/// is always included, then reversed into ascending order. Horizon 0 is
/// never included (its marginal reward is zero by definition).
pub fn dynamic_rediscount_horizons(new_gamma: f32, max_horizon: usize) -> Vec<usize> {
    assert!(max_horizon >= 1, "max_horizon must be at least 1");

    let effective = if new_gamma >= 1.0 {
        max_horizon
    } else {
        (((EFFECTIVE_HORIZON_SCALE / (1.0 - new_gamma)).round()) as usize).min(max_horizon)
    }
    .max(1);

    let skip = (effective + SAMPLE_BUDGET - 1) / SAMPLE_BUDGET;

    let mut horizons: Vec<usize> = (1..=effective)
        .rev()
        .step_by(skip)
        .collect();
    horizons.reverse();
    horizons
}
