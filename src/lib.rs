//! # Multi-horizon return estimation for truncated value functions
//!
//! Training targets for value models that predict *value at horizon*:
//! `V(s, h)` is the expected discounted reward over exactly the next `h`
//! steps. Given a rollout window and a black-box value oracle, this crate
//! produces everything the trainer needs (multi-horizon return targets,
//! GAE advantages and single-horizon value targets) without owning any
//! model or environment code.
//!
//! ## Data Flow
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────────┐
//! │ Rollout  │   │ HorizonSample│   │   ValueOracle    │
//! │ [N, A]   │   │  (value +    │──▶│  (micro-batched  │
//! │ rewards, │   │   return)    │   │   curve queries) │
//! │ terminals│   └──────────────┘   └────────┬─────────┘
//! └────┬─────┘                               ▼
//!      │                            ┌──────────────────┐
//!      │                            │    ValueTable    │
//!      │                            │   [N+1, A, K]    │
//!      │                            └────────┬─────────┘
//!      │          ┌─────────────────────┬────┴─────────────┐
//!      ▼          ▼                     ▼                  ▼
//! ┌─────────────────────┐   ┌───────────────────┐   ┌─────────────┐
//! │  Return estimators  │   │   Rediscounting   │   │  GAE / TVF  │
//! │  n-step · λ · exp · │   │  (curve → single  │   │  advantages │
//! │  adaptive  [N,A,K]  │   │   horizon at γ)   │   │    [N, A]   │
//! └─────────────────────┘   └───────────────────┘   └─────────────┘
//! ```
//!
//! Everything is pure and synchronous: callers own the buffers, every output
//! is freshly allocated, and randomness comes from a caller-supplied RNG so
//! runs are reproducible.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tvf_returns::{ReturnEngine, ReturnEngineConfig, Rollout};
//!
//! let config = ReturnEngineConfig::new()
//!     .with_gamma(0.997)
//!     .with_tvf_gamma(1.0)
//!     .with_max_horizon(30_000)
//!     .build()?;
//!
//! let engine = ReturnEngine::new(config)?;
//! let rollout = Rollout::new(&rewards, &terminals, &time, n_steps, n_agents);
//! let targets = engine.compute_targets(&rollout, &obs, &oracle, &mut rng);
//! ```

pub mod advantage;
pub mod config;
pub mod core;
pub mod engine;
pub mod horizons;
pub mod metrics;
pub mod oracle;
pub mod rediscount;
pub mod returns;

// Re-export the main surface
pub use config::{ConfigError, ReturnEngineConfig};
pub use core::{interpolate, interpolate_log, Rollout, ValueTable};
pub use engine::{
    compute_bootstrapped_returns, compute_bootstrapped_returns_per_step, ReturnEngine,
    RolloutTargets,
};
pub use horizons::{generate_horizon_sample, HorizonDistribution};
pub use oracle::{query_value_at, query_value_m2_table, query_value_table, ValueOracle};
pub use rediscount::{
    dynamic_rediscount_horizons, rediscount_value_table, rediscount_values, RediscountMode,
};

pub use returns::{
    compute_adaptive_returns, compute_exponential_returns, compute_lambda_returns,
    compute_mc_returns, compute_n_step_returns, compute_td_returns, get_return_estimate,
    EstimatorMode, ExponentialCombineMode, LambdaMode, ReturnEstimate,
};

pub use advantage::{
    compute_gae, compute_gae_tvf, compute_sampled_value_targets, normalize_advantages,
    normalize_advantages_per_agent,
};

pub use metrics::{explained_variance, per_horizon_explained_variance, value_curve_mse};
