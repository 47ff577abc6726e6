//! λ-weighted combination of n-step returns.
//!
//! TD(λ)-style geometric mixture over lookahead lengths `n = 1..N`:
//!
//! G^λ = Σ_{n<N} (1-λ) λ^{n-1} G^(n)  +  λ^{N-1} G^(N)
//!
//! The window truncates the mixture, so the final n-step absorbs all the
//! remaining weight, so the weights sum to exactly 1 regardless of `N`. This
//! assumes G^(n > N) ≈ G^(N); for that to hold, 1/(1-λ) should be
//! comfortably smaller than the window length.
//!
//! Exact mode evaluates every lookahead, which costs O(N) kernel lengths and
//! is the slow-but-reference path. Sampled mode draws a bounded number of
//! lookaheads from the weight distribution with replacement and averages,
//! trading a little variance for a fixed budget.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::{Rollout, ValueTable};
use crate::returns::n_step::compute_weighted_n_step_returns;
use crate::returns::ReturnEstimate;

/// How the λ mixture is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LambdaMode {
    /// Evaluate every n-step length with its exact weight.
    Exact,
    /// Draw lookahead lengths from the weight distribution with replacement.
    Sampled { samples: usize },
}

/// Exact truncated-geometric weights over `n = 1..=n_max`.
fn exact_weights(lambda: f32, n_max: usize) -> Vec<(usize, f32)> {
    debug_assert!(n_max >= 1);
    if lambda <= 0.0 {
        return vec![(1, 1.0)];
    }
    if lambda >= 1.0 {
        return vec![(n_max, 1.0)];
    }
    let mut out = Vec::with_capacity(n_max);
    let mut weight = 1.0 - lambda;
    for n in 1..n_max {
        out.push((n, weight));
        weight *= lambda;
    }
    // remaining mass lands on the final (longest) estimate
    out.push((n_max, lambda.powi(n_max as i32 - 1)));
    out
}

/// Draw one lookahead length from the truncated geometric distribution.
fn sample_length(rng: &mut impl Rng, lambda: f32, n_max: usize) -> usize {
    if lambda <= 0.0 {
        return 1;
    }
    if lambda >= 1.0 {
        return n_max;
    }
    let u: f32 = rng.gen_range(0.0..1.0);
    // inverse CDF of the geometric distribution on {1, 2, ...}
    let n = 1 + ((1.0 - u).ln() / lambda.ln()) as usize;
    n.min(n_max)
}

/// λ-weighted return estimate for every required horizon.
///
/// λ = 0 reduces to the 1-step TD calculator and λ = 1 to Monte Carlo,
/// exactly, in both modes.
pub fn compute_lambda_returns(
    rollout: &Rollout,
    values: &ValueTable,
    values_m2: Option<&ValueTable>,
    required_horizons: &[usize],
    gamma: f32,
    lambda: f32,
    mode: LambdaMode,
    log_interpolation: bool,
    rng: &mut impl Rng,
) -> ReturnEstimate {
    assert!(
        (0.0..=1.0).contains(&lambda),
        "lambda must be in [0, 1], got {}",
        lambda
    );
    let n_max = rollout.n_steps();

    let weights = match mode {
        LambdaMode::Exact => exact_weights(lambda, n_max),
        LambdaMode::Sampled { samples } => {
            assert!(samples > 0, "Sampled lambda mode needs a positive sample budget");
            // tally draws so the kernel sees each distinct length once
            let mut counts = vec![0usize; n_max + 1];
            for _ in 0..samples {
                counts[sample_length(rng, lambda, n_max)] += 1;
            }
            counts
                .iter()
                .enumerate()
                .filter(|&(_, &c)| c > 0)
                .map(|(n, &c)| (n, c as f32 / samples as f32))
                .collect()
        }
    };

    compute_weighted_n_step_returns(
        rollout,
        values,
        values_m2,
        required_horizons,
        &weights,
        gamma,
        log_interpolation,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_exact_weights_sum_to_one() {
        for lambda in [0.0, 0.5, 0.9, 0.95, 0.99, 1.0] {
            for n_max in [1, 4, 16, 128] {
                let sum: f32 = exact_weights(lambda, n_max).iter().map(|&(_, w)| w).sum();
                assert!(
                    (sum - 1.0).abs() < 1e-5,
                    "weights for lambda={} n_max={} sum to {}",
                    lambda, n_max, sum
                );
            }
        }
    }

    #[test]
    fn test_exact_weights_tail_mass() {
        // n_max = 4, lambda = 0.5: weights 0.5, 0.25, 0.125, tail 0.125
        let w = exact_weights(0.5, 4);
        assert_eq!(w.len(), 4);
        assert!((w[0].1 - 0.5).abs() < 1e-6);
        assert!((w[3].1 - 0.125).abs() < 1e-6, "tail absorbs remaining mass");
    }

    #[test]
    fn test_sample_length_extremes() {
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..32 {
            assert_eq!(sample_length(&mut rng, 0.0, 16), 1);
            assert_eq!(sample_length(&mut rng, 1.0, 16), 16);
        }
    }

    #[test]
    fn test_sampled_lengths_bounded_by_window() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let n = sample_length(&mut rng, 0.99, 8);
            assert!((1..=8).contains(&n));
        }
    }

    #[test]
    #[should_panic(expected = "lambda must be in [0, 1]")]
    fn test_invalid_lambda_panics() {
        let rewards = vec![1.0];
        let terminals = vec![false];
        let time = vec![0.0; 2];
        let rollout = Rollout::new(&rewards, &terminals, &time, 1, 1);
        let values = ValueTable::new(vec![0.0; 4], vec![0, 2], 2, 1);
        let mut rng = StdRng::seed_from_u64(0);
        compute_lambda_returns(
            &rollout, &values, None, &[2], 0.9, 1.5, LambdaMode::Exact, false, &mut rng,
        );
    }
}
