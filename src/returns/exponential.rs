//! Exponentially indexed n-step combination.
//!
//! Rather than weighting every lookahead like TD(λ), this estimator
//! evaluates n-step returns only at an exponential progression of lengths
//! `n_i = round(base^i)` (deduplicated, capped at the window length) and
//! averages them. A handful of lookaheads covers the whole window at
//! logarithmic cost.
//!
//! Three combine modes:
//! - `Default`: plain average over all lengths; the reference behavior.
//! - `Masked`: for each target horizon, lengths longer than the horizon are
//!   dropped from the average (less bias at short horizons, fewer effective
//!   samples).
//! - `Transformed`: average in squashed value space then invert
//!   (h(x) = sign(x)(√(|x|+1) − 1) + εx). Experimental; keeps large returns
//!   from dominating the mixture.

use serde::{Deserialize, Serialize};

use crate::core::{Rollout, ValueTable};
use crate::returns::n_step::compute_weighted_n_step_returns;
use crate::returns::{paste_columns, ReturnEstimate};

const TRANSFORM_EPS: f32 = 1e-3;

/// How exponential n-step estimates are averaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExponentialCombineMode {
    /// Unconditional average over every generated length. Reference mode.
    Default,
    /// Exclude lengths exceeding the target horizon from that horizon's
    /// average.
    Masked,
    /// Average in transformed value space, then invert.
    Transformed,
}

impl Default for ExponentialCombineMode {
    fn default() -> Self {
        ExponentialCombineMode::Default
    }
}

/// Squashing used by the `Transformed` combine mode (Pohlen et al. 2018).
#[inline]
fn transform(x: f32) -> f32 {
    x.signum() * ((x.abs() + 1.0).sqrt() - 1.0) + TRANSFORM_EPS * x
}

#[inline]
fn inverse_transform(y: f32) -> f32 {
    let e = TRANSFORM_EPS;
    let inner = (1.0 + 4.0 * e * (y.abs() + 1.0 + e)).sqrt() - 1.0;
    y.signum() * ((inner / (2.0 * e)).powi(2) - 1.0)
}

/// The exponential length progression: `round(base^i)`, deduplicated and
/// capped at `n_max` (which is always included once reached).
pub(crate) fn exponential_lengths(base: f32, n_max: usize) -> Vec<usize> {
    assert!(base > 1.0, "Exponential base must be > 1, got {}", base);
    assert!(n_max >= 1);
    let mut out = Vec::new();
    let mut x = 1.0f32;
    loop {
        let n = (x.round() as usize).min(n_max);
        if out.last() != Some(&n) {
            out.push(n);
        }
        if n == n_max {
            break;
        }
        x *= base;
    }
    out
}

/// Exponential-progression return estimate for every required horizon.
pub fn compute_exponential_returns(
    rollout: &Rollout,
    values: &ValueTable,
    values_m2: Option<&ValueTable>,
    required_horizons: &[usize],
    gamma: f32,
    base: f32,
    mode: ExponentialCombineMode,
    log_interpolation: bool,
) -> ReturnEstimate {
    let lengths = exponential_lengths(base, rollout.n_steps());

    match mode {
        ExponentialCombineMode::Default => {
            let w = 1.0 / lengths.len() as f32;
            let weights: Vec<(usize, f32)> = lengths.iter().map(|&n| (n, w)).collect();
            compute_weighted_n_step_returns(
                rollout, values, values_m2, required_horizons, &weights, gamma,
                log_interpolation,
            )
        }
        ExponentialCombineMode::Masked => compute_masked(
            rollout, values, values_m2, required_horizons, gamma, &lengths,
            log_interpolation,
        ),
        ExponentialCombineMode::Transformed => compute_transformed(
            rollout, values, values_m2, required_horizons, gamma, &lengths,
            log_interpolation,
        ),
    }
}

/// Masked mode: horizon `h` averages only the lengths with `n <= h`.
///
/// Required horizons are sorted, so the admitted-length count is
/// non-decreasing and horizons fall into contiguous groups sharing one
/// weight set; each group costs one kernel pass.
fn compute_masked(
    rollout: &Rollout,
    values: &ValueTable,
    values_m2: Option<&ValueTable>,
    required_horizons: &[usize],
    gamma: f32,
    lengths: &[usize],
    log_interpolation: bool,
) -> ReturnEstimate {
    let n = rollout.n_steps();
    let a = rollout.n_agents();
    let total_k = required_horizons.len();

    let mut out = vec![0.0f32; n * a * total_k];
    let mut out_m2 = values_m2.map(|_| vec![0.0f32; n * a * total_k]);

    let mut start = 0;
    while start < total_k {
        // admitted lengths for this horizon (h = 0 admits none; fall back to
        // the shortest length, whose return is 0 at horizon 0 regardless)
        let admitted = lengths
            .partition_point(|&len| len <= required_horizons[start])
            .max(1);
        let mut end = start + 1;
        while end < total_k
            && lengths.partition_point(|&len| len <= required_horizons[end]).max(1) == admitted
        {
            end += 1;
        }

        let w = 1.0 / admitted as f32;
        let weights: Vec<(usize, f32)> = lengths[..admitted].iter().map(|&len| (len, w)).collect();
        let block = compute_weighted_n_step_returns(
            rollout, values, values_m2, &required_horizons[start..end], &weights, gamma,
            log_interpolation,
        );
        paste_columns(&block, &mut out, out_m2.as_mut(), total_k, start);
        start = end;
    }

    ReturnEstimate::new(out, out_m2, required_horizons.to_vec(), n, a)
}

/// Transformed mode: squash each per-length estimate, average, invert.
///
/// The second moment (when requested) is combined untransformed; squashing
/// has no meaningful second-moment analogue.
fn compute_transformed(
    rollout: &Rollout,
    values: &ValueTable,
    values_m2: Option<&ValueTable>,
    required_horizons: &[usize],
    gamma: f32,
    lengths: &[usize],
    log_interpolation: bool,
) -> ReturnEstimate {
    let n = rollout.n_steps();
    let a = rollout.n_agents();
    let total = n * a * required_horizons.len();
    let w = 1.0 / lengths.len() as f32;

    let mut acc = vec![0.0f32; total];
    let mut acc_m2 = values_m2.map(|_| vec![0.0f32; total]);

    for &len in lengths {
        let est = compute_weighted_n_step_returns(
            rollout, values, values_m2, required_horizons, &[(len, 1.0)], gamma,
            log_interpolation,
        );
        for (dst, &g) in acc.iter_mut().zip(est.data()) {
            *dst += w * transform(g);
        }
        if let Some(acc_m2) = acc_m2.as_mut() {
            for (dst, &m2) in acc_m2.iter_mut().zip(est.second_moment().unwrap()) {
                *dst += w * m2;
            }
        }
    }

    for v in acc.iter_mut() {
        *v = inverse_transform(*v);
    }

    // horizon 0 is definitionally zero; the squash round trip leaves float
    // noise there, so pin the column instead of inverting it
    let k = required_horizons.len();
    for (ki, _) in required_horizons.iter().enumerate().filter(|&(_, &h)| h == 0) {
        for row in 0..n * a {
            acc[row * k + ki] = 0.0;
        }
    }

    ReturnEstimate::new(acc, acc_m2, required_horizons.to_vec(), n, a)
}
