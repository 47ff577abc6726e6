//! End-to-end target generation for one rollout window.
//!
//! The engine ties the stages together: sample horizon sets, query the value
//! oracle once per table, rediscount single-horizon estimates when the
//! advantage gamma differs from the curve gamma, then produce advantages,
//! value targets and multi-horizon return targets. Everything is pure: the
//! engine holds only its config, and every output is freshly allocated.

use log::warn;
use rand::Rng;

use crate::advantage::{compute_gae, compute_gae_tvf, compute_sampled_value_targets};
use crate::config::{ConfigError, ReturnEngineConfig};
use crate::core::Rollout;
use crate::horizons::generate_horizon_sample;
use crate::oracle::{query_value_m2_table, query_value_table, ValueOracle};
use crate::rediscount::{dynamic_rediscount_horizons, rediscount_values, RediscountMode};
use crate::returns::{get_return_estimate, ReturnEstimate};

/// Everything the trainer needs from one rollout window.
#[derive(Debug, Clone)]
pub struct RolloutTargets {
    /// Horizons the value model should be trained at this round.
    pub value_horizons: Vec<usize>,
    /// Advantages `[N, A]` at the advantage gamma (not normalized).
    pub advantages: Vec<f32>,
    /// Single-horizon value estimates `[N + 1, A]` at the advantage gamma.
    pub value_estimates: Vec<f32>,
    /// Scalar value targets `[N, A]` for the single-horizon head.
    pub value_targets: Vec<f32>,
    /// Multi-horizon return targets (horizons recorded inside).
    pub returns: ReturnEstimate,
}

/// Multi-horizon return-estimation engine.
///
/// Construct once from a validated config; `compute_targets` may then be
/// called per rollout from any thread (the engine is immutable).
#[derive(Debug, Clone)]
pub struct ReturnEngine {
    config: ReturnEngineConfig,
}

impl ReturnEngine {
    /// Build an engine from a config, validating it first.
    pub fn new(config: ReturnEngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ReturnEngineConfig {
        &self.config
    }

    /// Sample the horizon set the value model trains against this round.
    pub fn sample_value_horizons(&self, rng: &mut impl Rng, window_len: usize) -> Vec<usize> {
        generate_horizon_sample(
            rng,
            window_len.min(self.config.max_horizon),
            self.config.max_horizon,
            self.config.value_samples,
            self.config.value_distribution,
            self.config.force_first_and_last,
        )
    }

    /// Sample the horizon set return targets are generated for.
    pub fn sample_return_horizons(&self, rng: &mut impl Rng, window_len: usize) -> Vec<usize> {
        generate_horizon_sample(
            rng,
            window_len.min(self.config.max_horizon),
            self.config.max_horizon,
            self.config.return_samples,
            self.config.return_distribution,
            self.config.force_first_and_last,
        )
    }

    /// Generate all training targets for one rollout window.
    ///
    /// `obs` and `time` are flat `[(N + 1) * A]` state batches covering every
    /// step plus the bootstrap state, in the rollout's time-major layout.
    ///
    /// # Panics
    ///
    /// Panics on shape mismatches between the rollout and the state batch.
    pub fn compute_targets<O>(
        &self,
        rollout: &Rollout,
        obs: &[O],
        oracle: &impl ValueOracle<O>,
        rng: &mut impl Rng,
    ) -> RolloutTargets {
        let n = rollout.n_steps();
        let a = rollout.n_agents();
        let time = rollout.time_buffer();
        assert_eq!(obs.len(), (n + 1) * a, "obs must be flat [(N + 1) * A]");

        let value_horizons = self.sample_value_horizons(rng, n);
        let return_horizons = self.sample_return_horizons(rng, n);

        let values = query_value_table(oracle, obs, time, &value_horizons, n + 1, a);
        let values_m2 = if self.config.second_moment {
            query_value_m2_table(oracle, obs, time, &value_horizons, n + 1, a)
        } else {
            None
        };
        if self.config.second_moment && values_m2.is_none() {
            warn!("second_moment enabled but the oracle has no second-moment head");
        }

        let value_estimates = self.single_horizon_estimates(oracle, obs, time, n, a, &values);

        let (step_values, final_values) = value_estimates.split_at(n * a);
        let advantages = if self.config.tvf_gae {
            let gamma = self.config.gamma;
            let dense_horizons: Vec<usize> = (0..=self.config.max_horizon).collect();
            let dense = query_value_table(oracle, obs, time, &dense_horizons, n + 1, a);
            compute_gae_tvf(
                rollout,
                &dense,
                self.config.tvf_gamma,
                |dt| gamma.powi(dt as i32),
                self.config.lambda_policy,
            )
        } else {
            compute_gae(
                rollout.rewards(),
                rollout.terminals(),
                step_values,
                final_values,
                a,
                self.config.gamma,
                self.config.lambda_policy,
            )
        };

        let value_targets = if self.config.jittered_value_targets {
            compute_sampled_value_targets(
                rollout.rewards(),
                rollout.terminals(),
                step_values,
                final_values,
                a,
                self.config.gamma,
                self.config.lambda_value,
                rng,
            )
        } else {
            let adv = compute_gae(
                rollout.rewards(),
                rollout.terminals(),
                step_values,
                final_values,
                a,
                self.config.gamma,
                self.config.lambda_value,
            );
            adv.iter().zip(step_values).map(|(g, v)| g + v).collect()
        };

        let mut returns = get_return_estimate(
            self.config.estimator,
            rollout,
            &values,
            values_m2.as_ref(),
            &return_horizons,
            self.config.tvf_gamma,
            self.config.log_interpolation,
            rng,
        );
        returns.sqrt_second_moment_in_place();

        RolloutTargets {
            value_horizons,
            advantages,
            value_estimates,
            value_targets,
            returns,
        }
    }

    /// Single-horizon value estimates `[(N + 1) * A]` at the advantage gamma.
    ///
    /// When the curve gamma matches, the longest sampled horizon of the
    /// already-queried table is reused; otherwise the oracle is queried at
    /// the rediscounting horizons and the curve is reconstructed.
    fn single_horizon_estimates<O>(
        &self,
        oracle: &impl ValueOracle<O>,
        obs: &[O],
        time: &[f32],
        n: usize,
        a: usize,
        values: &crate::core::ValueTable,
    ) -> Vec<f32> {
        if !self.config.needs_rediscount() {
            let h = self.config.max_horizon as f32;
            return (0..(n + 1) * a)
                .map(|i| values.value_at_horizon(i / a, i % a, h, self.config.log_interpolation))
                .collect();
        }

        let horizons = match &self.config.rediscount {
            RediscountMode::Fixed { horizons } => horizons.clone(),
            RediscountMode::Dynamic => {
                dynamic_rediscount_horizons(self.config.gamma, self.config.max_horizon)
            }
        };
        let curve = query_value_table(oracle, obs, time, &horizons, n + 1, a);
        rediscount_values(
            curve.data(),
            curve.horizons(),
            self.config.tvf_gamma,
            self.config.gamma,
        )
    }
}

/// Discounted episodic returns with a final-state bootstrap.
///
/// The classic single-horizon target: `G_t = r_t + γ (1 - d_t) G_{t+1}`,
/// seeded with `final_values` past the window edge. Buffers are time-major
/// `[N, A]`; returns a fresh `[N, A]` buffer.
pub fn compute_bootstrapped_returns(
    rewards: &[f32],
    terminals: &[bool],
    final_values: &[f32],
    n_agents: usize,
    gamma: f32,
) -> Vec<f32> {
    let a = n_agents;
    assert!(a > 0, "n_agents must be positive");
    assert_eq!(rewards.len() % a, 0, "rewards must be [N, A]");
    let n = rewards.len() / a;
    assert_eq!(terminals.len(), n * a, "terminals must be [N, A]");
    assert_eq!(final_values.len(), a, "final_values must be [A]");

    let mut out = vec![0.0f32; n * a];
    let mut carry = final_values.to_vec();
    for t in (0..n).rev() {
        for agent in 0..a {
            let idx = t * a + agent;
            let not_done = if terminals[idx] { 0.0 } else { 1.0 };
            carry[agent] = rewards[idx] + gamma * not_done * carry[agent];
            out[idx] = carry[agent];
        }
    }
    out
}

/// [`compute_bootstrapped_returns`] with a per-element discount.
///
/// `gammas` is `[N, A]`, the discount applied *at* each step (time-varying
/// discounts arise from rediscounting schedules and episodic time limits).
pub fn compute_bootstrapped_returns_per_step(
    rewards: &[f32],
    terminals: &[bool],
    final_values: &[f32],
    n_agents: usize,
    gammas: &[f32],
) -> Vec<f32> {
    let a = n_agents;
    assert!(a > 0, "n_agents must be positive");
    assert_eq!(rewards.len() % a, 0, "rewards must be [N, A]");
    let n = rewards.len() / a;
    assert_eq!(terminals.len(), n * a, "terminals must be [N, A]");
    assert_eq!(gammas.len(), n * a, "gammas must be [N, A]");
    assert_eq!(final_values.len(), a, "final_values must be [A]");

    let mut out = vec![0.0f32; n * a];
    let mut carry = final_values.to_vec();
    for t in (0..n).rev() {
        for agent in 0..a {
            let idx = t * a + agent;
            let not_done = if terminals[idx] { 0.0 } else { 1.0 };
            carry[agent] = rewards[idx] + gammas[idx] * not_done * carry[agent];
            out[idx] = carry[agent];
        }
    }
    out
}
