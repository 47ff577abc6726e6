//! Generalized Advantage Estimation over vectorized rollouts.
//!
//! GAE provides a family of policy gradient estimators parameterized by λ:
//! - λ = 0: one-step TD (low variance, high bias)
//! - λ = 1: Monte Carlo (high variance, low bias)
//! - λ ∈ (0, 1): interpolation
//!
//! ## Formula
//!
//! A_t = Σ_{l=0}^{∞} (γλ)^l δ_{t+l}
//! where δ_t = r_t + γ V(s_{t+1}) - V(s_t)
//!
//! Buffers are time-major `[N, A]`; the backward recursion runs once over
//! time with every agent updated per step. Agents are independent.
//!
//! ## References
//!
//! - Schulman et al., "High-Dimensional Continuous Control Using
//!   Generalized Advantage Estimation" (2016)

use rand::Rng;

/// Compute GAE advantages for a vectorized rollout.
///
/// # Arguments
///
/// * `rewards` - rewards `[N, A]`
/// * `terminals` - episode-boundary flags `[N, A]` (true cuts the bootstrap
///   for that step)
/// * `values` - value estimates `[N, A]` at the advantage gamma
/// * `final_values` - bootstrap values `[A]` for the state after the window
/// * `gamma` - discount factor
/// * `lambda` - GAE λ parameter
///
/// # Returns
///
/// Advantages `[N, A]`, freshly allocated.
pub fn compute_gae(
    rewards: &[f32],
    terminals: &[bool],
    values: &[f32],
    final_values: &[f32],
    n_agents: usize,
    gamma: f32,
    lambda: f32,
) -> Vec<f32> {
    let a = n_agents;
    assert!(a > 0, "n_agents must be positive");
    assert_eq!(rewards.len() % a, 0, "rewards must be [N, A]");
    let n = rewards.len() / a;
    assert_eq!(terminals.len(), n * a, "terminals must be [N, A]");
    assert_eq!(values.len(), n * a, "values must be [N, A]");
    assert_eq!(final_values.len(), a, "final_values must be [A]");

    let mut advantages = vec![0.0f32; n * a];
    let mut prev_adv = vec![0.0f32; a];

    for t in (0..n).rev() {
        for agent in 0..a {
            let idx = t * a + agent;
            let not_done = if terminals[idx] { 0.0 } else { 1.0 };
            let next_value = if t == n - 1 {
                final_values[agent]
            } else {
                values[idx + a]
            };

            // δ_t = r_t + γ V(s_{t+1}) - V(s_t), cut at episode boundaries
            let delta = rewards[idx] + gamma * next_value * not_done - values[idx];
            prev_adv[agent] = delta + gamma * lambda * not_done * prev_adv[agent];
            advantages[idx] = prev_adv[agent];
        }
    }

    advantages
}

/// Normalize advantages to zero mean and unit variance, in place.
///
/// # Edge Cases
///
/// - Empty slice: no-op
/// - Single element: sets to 0.0 (no meaningful variance)
/// - All equal values: sets all to 0.0 (epsilon prevents NaN)
pub fn normalize_advantages(advantages: &mut [f32]) {
    if advantages.is_empty() {
        return;
    }
    if advantages.len() == 1 {
        advantages[0] = 0.0;
        return;
    }

    let n = advantages.len() as f32;
    let mean = advantages.iter().sum::<f32>() / n;
    let variance = advantages.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / n;
    let std = (variance + 1e-8).sqrt();

    for x in advantages.iter_mut() {
        *x = (*x - mean) / std;
    }
}

/// Normalize advantages within each agent's trajectory separately.
pub fn normalize_advantages_per_agent(advantages: &mut [f32], n_agents: usize) {
    if advantages.is_empty() || n_agents == 0 {
        return;
    }
    let n = advantages.len() / n_agents;

    for agent in 0..n_agents {
        let mean = (0..n).map(|t| advantages[t * n_agents + agent]).sum::<f32>() / n as f32;
        let variance = (0..n)
            .map(|t| (advantages[t * n_agents + agent] - mean).powi(2))
            .sum::<f32>()
            / n as f32;
        let std = (variance + 1e-8).sqrt();
        for t in 0..n {
            let idx = t * n_agents + agent;
            advantages[idx] = (advantages[idx] - mean) / std;
        }
    }
}

/// Number of λ-jitter draws for sampled value targets.
const TARGET_SAMPLES: usize = 10;

/// Sampled GAE value targets for PPO/DNA training.
///
/// Runs GAE at `TARGET_SAMPLES` λ values whose effective horizons span
/// `0.25x..4x` the configured one (`λ_i = 1 - 1/(f_i · h_eff)` with `f_i`
/// geometrically spaced), then draws one of the resulting targets per
/// element. The jitter keeps value targets from committing to a single
/// λ's bias profile.
pub fn compute_sampled_value_targets(
    rewards: &[f32],
    terminals: &[bool],
    values: &[f32],
    final_values: &[f32],
    n_agents: usize,
    gamma: f32,
    lambda: f32,
    rng: &mut impl Rng,
) -> Vec<f32> {
    assert!(
        lambda < 1.0 && lambda >= 0.0,
        "Sampled value targets need lambda in [0, 1), got {}",
        lambda
    );
    let h_eff = 1.0 / (1.0 - lambda);

    // geomspace(0.25, 4.0, TARGET_SAMPLES)
    let ratio = (4.0f32 / 0.25).powf(1.0 / (TARGET_SAMPLES - 1) as f32);
    let mut factor = 0.25f32;

    let mut candidates: Vec<Vec<f32>> = Vec::with_capacity(TARGET_SAMPLES);
    for _ in 0..TARGET_SAMPLES {
        let l = (1.0 - 1.0 / (factor * h_eff)).clamp(0.0, 1.0);
        let adv = compute_gae(rewards, terminals, values, final_values, n_agents, gamma, l);
        candidates.push(adv);
        factor *= ratio;
    }

    let mut targets = vec![0.0f32; rewards.len()];
    for (i, target) in targets.iter_mut().enumerate() {
        let pick = rng.gen_range(0..TARGET_SAMPLES);
        *target = candidates[pick][i] + values[i];
    }
    targets
}
