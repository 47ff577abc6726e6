//! N-step, Monte-Carlo and TD return calculators.
//!
//! The n-step return at timestep `t` for horizon `h` accumulates discounted
//! observed rewards for `steps = min(n, h, N - t)` steps, then bootstraps the
//! remaining `h - steps` horizon from the value table at the *residual*
//! horizon:
//!
//! G^(n)(t, h) = Σ_{i<steps} d_i r_{t+i}  +  d_steps · V(s_{t+steps}, h - steps)
//!
//! where `d_i` is the running discount, zeroed past an episode boundary so no
//! bootstrap leaks across episodes. Monte Carlo is the `n = N` special case
//! and TD is `n = 1`.
//!
//! All combinators in this crate funnel through one kernel that evaluates a
//! weighted set of n-step lengths in a single pass. Per agent the cost is
//! O(N·(n_max + |ns|·K·log K)): the per-timestep reward/discount prefixes
//! are shared across every n and horizon, avoiding the naive O(N²·K) blowup.

use crate::core::{Rollout, ValueTable};
use crate::returns::ReturnEstimate;

fn is_sorted(xs: &[usize]) -> bool {
    xs.windows(2).all(|w| w[0] <= w[1])
}

/// Evaluate a weighted mixture of n-step returns in one pass.
///
/// `n_weights` lists `(n, weight)` pairs; the output at each `(t, a, h)` is
/// `Σ w · G^(n)(t, h)`. Callers that want a single plain n-step return pass
/// one pair with weight 1. When `values_m2` is provided a second-moment
/// estimate is produced alongside, using
/// `M²(t,h) = R² + 2·R·d·V(h') + d²·V²(h')` per n-step and the same mixture
/// weights (a documented approximation for the combinators).
///
/// # Panics
///
/// Panics on unsorted `required_horizons`, shape mismatches, or a value
/// table that does not cover the `N + 1` bootstrap row.
pub(crate) fn compute_weighted_n_step_returns(
    rollout: &Rollout,
    values: &ValueTable,
    values_m2: Option<&ValueTable>,
    required_horizons: &[usize],
    n_weights: &[(usize, f32)],
    gamma: f32,
    log_interpolation: bool,
) -> ReturnEstimate {
    let n = rollout.n_steps();
    let a = rollout.n_agents();
    let k = required_horizons.len();

    assert!(
        is_sorted(required_horizons),
        "Required horizons must be sorted, got {:?}",
        required_horizons
    );
    assert_eq!(values.n_rows(), n + 1, "Value table must cover N+1 states");
    assert_eq!(values.n_agents(), a, "Value table agent axis mismatch");
    if let Some(m2) = values_m2 {
        assert_eq!(m2.n_rows(), n + 1, "Second-moment table must cover N+1 states");
        assert_eq!(m2.n_agents(), a, "Second-moment table agent axis mismatch");
    }
    assert!(!n_weights.is_empty(), "At least one n-step length required");
    for &(len, _) in n_weights {
        assert!(len >= 1, "n-step length must be >= 1");
    }

    let max_n = n_weights.iter().map(|&(len, _)| len).max().unwrap().min(n);

    let mut out = vec![0.0f32; n * a * k];
    let mut out_m2 = values_m2.map(|_| vec![0.0f32; n * a * k]);

    // reward/discount prefixes for one (t, agent): cum_reward[s] is the
    // discounted reward sum over the first s steps, cum_discount[s] the
    // discount applied to a bootstrap after s steps (0 past a terminal).
    let mut cum_reward = vec![0.0f32; max_n + 1];
    let mut cum_discount = vec![0.0f32; max_n + 1];

    for agent in 0..a {
        for t in 0..n {
            let span = max_n.min(n - t);
            cum_reward[0] = 0.0;
            cum_discount[0] = 1.0;
            for s in 0..span {
                cum_reward[s + 1] = cum_reward[s] + cum_discount[s] * rollout.reward(t + s, agent);
                let not_done = if rollout.terminal(t + s, agent) { 0.0 } else { 1.0 };
                cum_discount[s + 1] = cum_discount[s] * gamma * not_done;
            }

            for &(len, weight) in n_weights {
                if weight == 0.0 {
                    continue;
                }
                let reach = len.min(n - t);
                for (ki, &h) in required_horizons.iter().enumerate() {
                    let steps = reach.min(h);
                    let residual = h - steps;
                    let r_sum = cum_reward[steps];
                    let discount = cum_discount[steps];

                    let (g, v1) = if residual > 0 && discount != 0.0 {
                        let v = values.value_at_horizon(
                            t + steps, agent, residual as f32, log_interpolation,
                        );
                        (r_sum + discount * v, v)
                    } else {
                        (r_sum, 0.0)
                    };

                    let idx = (t * a + agent) * k + ki;
                    out[idx] += weight * g;

                    if let Some(dst) = out_m2.as_mut() {
                        let m2_table = values_m2.unwrap();
                        let v2 = if residual > 0 && discount != 0.0 {
                            m2_table.value_at_horizon(
                                t + steps, agent, residual as f32, log_interpolation,
                            )
                        } else {
                            0.0
                        };
                        let m2 = r_sum * r_sum
                            + 2.0 * r_sum * discount * v1
                            + discount * discount * v2;
                        dst[idx] += weight * m2;
                    }
                }
            }
        }
    }

    ReturnEstimate::new(out, out_m2, required_horizons.to_vec(), n, a)
}

/// Plain n-step return estimate for every required horizon.
pub fn compute_n_step_returns(
    rollout: &Rollout,
    values: &ValueTable,
    values_m2: Option<&ValueTable>,
    required_horizons: &[usize],
    gamma: f32,
    n_step: usize,
    log_interpolation: bool,
) -> ReturnEstimate {
    compute_weighted_n_step_returns(
        rollout,
        values,
        values_m2,
        required_horizons,
        &[(n_step, 1.0)],
        gamma,
        log_interpolation,
    )
}

/// Monte-Carlo returns: the longest n-step the window supports (`n = N`).
///
/// The bootstrap point is always the final state, so when every episode ends
/// inside the window this is the exact discounted reward sum.
pub fn compute_mc_returns(
    rollout: &Rollout,
    values: &ValueTable,
    values_m2: Option<&ValueTable>,
    required_horizons: &[usize],
    gamma: f32,
    log_interpolation: bool,
) -> ReturnEstimate {
    compute_n_step_returns(
        rollout,
        values,
        values_m2,
        required_horizons,
        gamma,
        rollout.n_steps(),
        log_interpolation,
    )
}

/// One-step TD returns: immediate reward plus a one-step bootstrap at the
/// residual horizon `h - 1`.
pub fn compute_td_returns(
    rollout: &Rollout,
    values: &ValueTable,
    values_m2: Option<&ValueTable>,
    required_horizons: &[usize],
    gamma: f32,
    log_interpolation: bool,
) -> ReturnEstimate {
    compute_n_step_returns(
        rollout,
        values,
        values_m2,
        required_horizons,
        gamma,
        1,
        log_interpolation,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Dense ground-truth value table: V(t, h) = future discounted reward sum
    /// of a known reward sequence (single agent).
    fn exact_table(rewards: &[f32], terminals: &[bool], gamma: f32, max_h: usize) -> ValueTable {
        let n = rewards.len();
        let horizons: Vec<usize> = (0..=max_h).collect();
        let mut data = vec![0.0f32; (n + 1) * horizons.len()];
        for t in 0..=n {
            for (ki, &h) in horizons.iter().enumerate() {
                let mut sum = 0.0;
                let mut discount = 1.0f32;
                for i in 0..h {
                    if t + i >= n {
                        break;
                    }
                    sum += discount * rewards[t + i];
                    if terminals[t + i] {
                        discount = 0.0;
                    } else {
                        discount *= gamma;
                    }
                }
                data[t * horizons.len() + ki] = sum;
            }
        }
        ValueTable::new(data, horizons, n + 1, 1)
    }

    #[test]
    fn test_td_return_formula() {
        // return[t, h] = r_t + gamma * V(t+1, h-1)
        let rewards = vec![1.0, 2.0];
        let terminals = vec![false, false];
        let time = vec![0.0; 3];
        let rollout = Rollout::new(&rewards, &terminals, &time, 2, 1);

        // hand-built table: V(t, h) over horizons [0, 1, 2]
        let data = vec![
            0.0, 10.0, 11.0, // t=0
            0.0, 20.0, 21.0, // t=1
            0.0, 30.0, 31.0, // t=2 (bootstrap row)
        ];
        let values = ValueTable::new(data, vec![0, 1, 2], 3, 1);

        let est = compute_td_returns(&rollout, &values, None, &[0, 1, 2], 0.9, false);

        assert_eq!(est.value(0, 0, 0), 0.0, "horizon 0 is always 0");
        assert!((est.value(0, 0, 1) - 1.0).abs() < 1e-6, "h=1 is just the reward");
        assert!((est.value(0, 0, 2) - (1.0 + 0.9 * 20.0)).abs() < 1e-5);
        assert!((est.value(1, 0, 2) - (2.0 + 0.9 * 30.0)).abs() < 1e-5);
    }

    #[test]
    fn test_mc_scenario_bootstrap_five() {
        // N=4, rewards all 1, gamma 0.9, final bootstrap value 5 at all horizons:
        // MC at t=0, full horizon: 1 + 0.9 + 0.81 + 0.729 + 0.9^4 * 5 = 6.7146
        let rewards = vec![1.0; 4];
        let terminals = vec![false; 4];
        let time = vec![0.0; 5];
        let rollout = Rollout::new(&rewards, &terminals, &time, 4, 1);

        // the bootstrap lands at residual horizon 96, so the curve must be
        // flat at 5 across the bootstrap range, not just at the endpoints
        let horizons = vec![0, 4, 100];
        let mut data = vec![5.0f32; 5 * 3];
        for t in 0..5 {
            data[t * 3] = 0.0;
        }
        let values = ValueTable::new(data, horizons, 5, 1);

        let est = compute_mc_returns(&rollout, &values, None, &[100], 0.9, false);
        assert!(
            (est.value(0, 0, 0) - 6.7146).abs() < 1e-5,
            "Expected 6.7146, got {}",
            est.value(0, 0, 0)
        );
    }

    #[test]
    fn test_terminal_cuts_bootstrap() {
        // episode ends with step 1; nothing after it may leak in
        let rewards = vec![1.0, 1.0, 100.0];
        let terminals = vec![false, true, false];
        let time = vec![0.0; 4];
        let rollout = Rollout::new(&rewards, &terminals, &time, 3, 1);

        let horizons = vec![0, 50];
        let mut data = vec![99.0f32; 4 * 2];
        for t in 0..4 {
            data[t * 2] = 0.0;
        }
        let values = ValueTable::new(data, horizons, 4, 1);

        let est = compute_mc_returns(&rollout, &values, None, &[50], 0.9, false);
        let expected = 1.0 + 0.9 * 1.0;
        assert!(
            (est.value(0, 0, 0) - expected).abs() < 1e-5,
            "Expected exact in-episode sum {}, got {}",
            expected,
            est.value(0, 0, 0)
        );
    }

    #[test]
    fn test_n_step_matches_mc_when_n_covers_window() {
        let rewards = vec![0.5, -1.0, 2.0, 0.0];
        let terminals = vec![false, false, false, true];
        let time = vec![0.0; 5];
        let rollout = Rollout::new(&rewards, &terminals, &time, 4, 1);
        let values = exact_table(&rewards, &terminals, 0.95, 8);

        let hs = vec![0, 1, 4, 8];
        let a = compute_n_step_returns(&rollout, &values, None, &hs, 0.95, 4, false);
        let b = compute_mc_returns(&rollout, &values, None, &hs, 0.95, false);
        for t in 0..4 {
            for ki in 0..hs.len() {
                assert!(
                    (a.value(t, 0, ki) - b.value(t, 0, ki)).abs() < 1e-6,
                    "n=N must equal MC at t={} k={}",
                    t, ki
                );
            }
        }
    }

    #[test]
    fn test_exact_oracle_gives_exact_returns_for_short_n() {
        // with a ground-truth oracle, any n-step length reproduces the true
        // discounted sum
        let rewards = vec![1.0, 2.0, 3.0, 4.0];
        let terminals = vec![false, false, false, true];
        let gamma = 0.9;
        let time = vec![0.0; 5];
        let rollout = Rollout::new(&rewards, &terminals, &time, 4, 1);
        let values = exact_table(&rewards, &terminals, gamma, 10);

        for n in 1..=4 {
            let est = compute_n_step_returns(&rollout, &values, None, &[10], gamma, n, false);
            let expected = 1.0 + 0.9 * 2.0 + 0.81 * 3.0 + 0.729 * 4.0;
            assert!(
                (est.value(0, 0, 0) - expected).abs() < 1e-4,
                "n={} expected {}, got {}",
                n, expected, est.value(0, 0, 0)
            );
        }
    }

    #[test]
    fn test_second_moment_deterministic_tail() {
        // fully observed episode: M2 must equal the squared return
        let rewards = vec![1.0, 2.0, 0.0];
        let terminals = vec![false, true, false];
        let gamma = 0.9;
        let time = vec![0.0; 4];
        let rollout = Rollout::new(&rewards, &terminals, &time, 3, 1);
        let values = exact_table(&rewards, &terminals, gamma, 6);
        // exact second moment of a deterministic return is its square
        let m2_data: Vec<f32> = values.data().iter().map(|v| v * v).collect();
        let m2 = ValueTable::new(m2_data, values.horizons().to_vec(), 4, 1);

        let est = compute_mc_returns(&rollout, &values, Some(&m2), &[6], gamma, false);
        let g = est.value(0, 0, 0);
        let m2_est = est.second_moment().unwrap()[0];
        assert!(
            (m2_est - g * g).abs() < 1e-4,
            "Deterministic M2 {} should equal G^2 {}",
            m2_est,
            g * g
        );
    }

    #[test]
    #[should_panic(expected = "must be sorted")]
    fn test_unsorted_required_horizons_panic() {
        let rewards = vec![1.0];
        let terminals = vec![false];
        let time = vec![0.0; 2];
        let rollout = Rollout::new(&rewards, &terminals, &time, 1, 1);
        let values = ValueTable::new(vec![0.0; 4], vec![0, 5], 2, 1);
        compute_n_step_returns(&rollout, &values, None, &[5, 0], 0.9, 1, false);
    }
}
