//! Configuration for the return-estimation engine.
//!
//! One immutable config drives every stage: horizon sampling, return
//! estimation, rediscounting and advantage computation. Build it with the
//! `with_*` methods and finalize with [`ReturnEngineConfig::build`], which
//! validates cross-field consistency.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::horizons::HorizonDistribution;
use crate::rediscount::RediscountMode;
use crate::returns::{EstimatorMode, ExponentialCombineMode};

/// Configuration validation error.
///
/// Returned when configuration parameters are invalid or inconsistent.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A count parameter (max_horizon, sample budgets, etc.) must be positive.
    InvalidCount {
        field: &'static str,
        value: usize,
    },
    /// A parameter is outside its valid range.
    OutOfRange {
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
    /// Two settings that cannot be used together.
    Incompatible {
        field: &'static str,
        reason: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidCount { field, value } => {
                write!(f, "{} must be > 0, got {}", field, value)
            }
            ConfigError::OutOfRange { field, value, min, max } => {
                write!(f, "{} must be in [{}, {}], got {}", field, min, max, value)
            }
            ConfigError::Incompatible { field, reason } => {
                write!(f, "{}: {}", field, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Configuration for multi-horizon return estimation.
///
/// `gamma` is the discount used for advantages and return targets;
/// `tvf_gamma` is the discount the value model is trained under. When they
/// differ, single-horizon value estimates are reconstructed by rediscounting
/// the value curve rather than re-querying the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnEngineConfig {
    // Discounting
    /// Discount factor for advantages and return targets.
    pub gamma: f32,
    /// Discount factor the value model's horizon curve is trained under.
    pub tvf_gamma: f32,
    /// Longest horizon the value model predicts.
    pub max_horizon: usize,

    // Horizon sampling
    /// Distribution of horizons the value model is trained at.
    pub value_distribution: HorizonDistribution,
    /// Horizon sample budget for value training (None = exhaustive).
    pub value_samples: Option<usize>,
    /// Distribution of horizons return targets are generated for.
    pub return_distribution: HorizonDistribution,
    /// Horizon sample budget for return targets (None = exhaustive).
    pub return_samples: Option<usize>,
    /// Always include horizon 0 and the max horizon in sampled sets.
    pub force_first_and_last: bool,

    // Return estimation
    /// Which estimator generates return targets.
    pub estimator: EstimatorMode,
    /// Interpolate value curves in log(1 + h) space.
    pub log_interpolation: bool,
    /// Produce second-moment targets alongside first-moment targets.
    pub second_moment: bool,

    // Advantages
    /// GAE lambda for the policy gradient.
    pub lambda_policy: f32,
    /// Lambda for value-target return estimation.
    pub lambda_value: f32,
    /// Use the finite-difference TVF advantage estimator instead of
    /// standard GAE. Requires tvf_gamma = 1.
    pub tvf_gae: bool,
    /// Per-element lambda jitter on GAE value targets.
    pub jittered_value_targets: bool,

    // Rediscounting
    /// How rediscounting horizons are chosen when gamma != tvf_gamma.
    pub rediscount: RediscountMode,
}

impl Default for ReturnEngineConfig {
    fn default() -> Self {
        Self {
            gamma: 0.999,
            tvf_gamma: 1.0,
            max_horizon: 1000,

            value_distribution: HorizonDistribution::FixedGeometric,
            value_samples: Some(128),
            return_distribution: HorizonDistribution::FixedGeometric,
            return_samples: Some(32),
            force_first_and_last: true,

            estimator: EstimatorMode::Exponential {
                base: 2.0,
                mode: ExponentialCombineMode::Default,
            },
            log_interpolation: false,
            second_moment: false,

            lambda_policy: 0.95,
            lambda_value: 0.95,
            tvf_gae: false,
            jittered_value_targets: false,

            rediscount: RediscountMode::Dynamic,
        }
    }
}

impl ReturnEngineConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate all configuration parameters.
    ///
    /// # Validation Rules
    /// - gamma and tvf_gamma must be in (0.0, 1.0]
    /// - lambda_policy must be in [0.0, 1.0), lambda_value in [0.0, 1.0]
    /// - max_horizon and sample budgets must be > 0
    /// - estimator parameters must be in range (λ in [0, 1], base > 1,
    ///   positive n-step lengths)
    /// - tvf_gae requires tvf_gamma = 1
    /// - jittered value targets require lambda_value < 1
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_horizon == 0 {
            return Err(ConfigError::InvalidCount { field: "max_horizon", value: 0 });
        }
        if self.value_samples == Some(0) {
            return Err(ConfigError::InvalidCount { field: "value_samples", value: 0 });
        }
        if self.return_samples == Some(0) {
            return Err(ConfigError::InvalidCount { field: "return_samples", value: 0 });
        }

        if self.gamma <= 0.0 || self.gamma > 1.0 {
            return Err(ConfigError::OutOfRange {
                field: "gamma",
                value: self.gamma,
                min: 0.0,
                max: 1.0,
            });
        }
        if self.tvf_gamma <= 0.0 || self.tvf_gamma > 1.0 {
            return Err(ConfigError::OutOfRange {
                field: "tvf_gamma",
                value: self.tvf_gamma,
                min: 0.0,
                max: 1.0,
            });
        }
        if self.lambda_policy < 0.0 || self.lambda_policy >= 1.0 {
            return Err(ConfigError::OutOfRange {
                field: "lambda_policy",
                value: self.lambda_policy,
                min: 0.0,
                max: 1.0,
            });
        }
        if self.lambda_value < 0.0 || self.lambda_value > 1.0 {
            return Err(ConfigError::OutOfRange {
                field: "lambda_value",
                value: self.lambda_value,
                min: 0.0,
                max: 1.0,
            });
        }

        match self.estimator {
            EstimatorMode::NStep { n } => {
                if n == 0 {
                    return Err(ConfigError::InvalidCount { field: "n_step", value: 0 });
                }
            }
            EstimatorMode::MonteCarlo => {}
            EstimatorMode::Lambda { lambda, mode } => {
                if !(0.0..=1.0).contains(&lambda) {
                    return Err(ConfigError::OutOfRange {
                        field: "estimator lambda",
                        value: lambda,
                        min: 0.0,
                        max: 1.0,
                    });
                }
                if let crate::returns::LambdaMode::Sampled { samples } = mode {
                    if samples == 0 {
                        return Err(ConfigError::InvalidCount {
                            field: "lambda samples",
                            value: 0,
                        });
                    }
                }
            }
            EstimatorMode::Exponential { base, .. } => {
                if base <= 1.0 {
                    return Err(ConfigError::OutOfRange {
                        field: "exponential base",
                        value: base,
                        min: 1.0,
                        max: f32::INFINITY,
                    });
                }
            }
            EstimatorMode::Adaptive { coef, base_n } => {
                if coef <= 0.0 {
                    return Err(ConfigError::OutOfRange {
                        field: "adaptive coef",
                        value: coef,
                        min: 0.0,
                        max: f32::INFINITY,
                    });
                }
                if base_n == 0 {
                    return Err(ConfigError::InvalidCount { field: "adaptive base_n", value: 0 });
                }
            }
        }

        if self.jittered_value_targets && self.lambda_value >= 1.0 {
            return Err(ConfigError::Incompatible {
                field: "jittered_value_targets",
                reason: "lambda jitter requires lambda_value < 1",
            });
        }
        if self.tvf_gae && self.tvf_gamma != 1.0 {
            return Err(ConfigError::Incompatible {
                field: "tvf_gae",
                reason: "requires undiscounted value estimates (tvf_gamma = 1)",
            });
        }
        if let RediscountMode::Fixed { horizons } = &self.rediscount {
            if horizons.is_empty() {
                return Err(ConfigError::InvalidCount {
                    field: "rediscount horizons",
                    value: 0,
                });
            }
        }

        Ok(())
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<Self, ConfigError> {
        self.validate()?;
        Ok(self)
    }

    /// Whether single-horizon value estimates need rediscounting.
    pub fn needs_rediscount(&self) -> bool {
        (self.gamma - self.tvf_gamma).abs() >= 1e-8
    }

    // Builder methods for discounting

    /// Set the advantage/return discount factor.
    pub fn with_gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }

    /// Set the value-curve discount factor.
    pub fn with_tvf_gamma(mut self, tvf_gamma: f32) -> Self {
        self.tvf_gamma = tvf_gamma;
        self
    }

    /// Set the longest predicted horizon.
    pub fn with_max_horizon(mut self, max_horizon: usize) -> Self {
        self.max_horizon = max_horizon;
        self
    }

    // Builder methods for horizon sampling

    /// Set the value-training horizon distribution and sample budget.
    pub fn with_value_horizons(
        mut self,
        distribution: HorizonDistribution,
        samples: Option<usize>,
    ) -> Self {
        self.value_distribution = distribution;
        self.value_samples = samples;
        self
    }

    /// Set the return-target horizon distribution and sample budget.
    pub fn with_return_horizons(
        mut self,
        distribution: HorizonDistribution,
        samples: Option<usize>,
    ) -> Self {
        self.return_distribution = distribution;
        self.return_samples = samples;
        self
    }

    /// Set whether sampled horizon sets pin the first and last horizon.
    pub fn with_force_first_and_last(mut self, force: bool) -> Self {
        self.force_first_and_last = force;
        self
    }

    // Builder methods for return estimation

    /// Set the return estimator.
    pub fn with_estimator(mut self, estimator: EstimatorMode) -> Self {
        self.estimator = estimator;
        self
    }

    /// Interpolate value curves in log(1 + h) space.
    pub fn with_log_interpolation(mut self, enabled: bool) -> Self {
        self.log_interpolation = enabled;
        self
    }

    /// Produce second-moment targets alongside return targets.
    pub fn with_second_moment(mut self, enabled: bool) -> Self {
        self.second_moment = enabled;
        self
    }

    // Builder methods for advantages

    /// Set the policy-gradient GAE lambda.
    pub fn with_lambda_policy(mut self, lambda: f32) -> Self {
        self.lambda_policy = lambda;
        self
    }

    /// Set the value-target lambda.
    pub fn with_lambda_value(mut self, lambda: f32) -> Self {
        self.lambda_value = lambda;
        self
    }

    /// Use the finite-difference TVF advantage estimator.
    pub fn with_tvf_gae(mut self, enabled: bool) -> Self {
        self.tvf_gae = enabled;
        self
    }

    /// Enable per-element lambda jitter on GAE value targets.
    pub fn with_jittered_value_targets(mut self, enabled: bool) -> Self {
        self.jittered_value_targets = enabled;
        self
    }

    /// Set the rediscounting horizon mode.
    pub fn with_rediscount(mut self, mode: RediscountMode) -> Self {
        self.rediscount = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::returns::LambdaMode;

    #[test]
    fn test_default_config_is_valid() {
        let config = ReturnEngineConfig::new();
        assert!(config.validate().is_ok());
        assert!(!config.needs_rediscount() || config.gamma != config.tvf_gamma);
    }

    #[test]
    fn test_builder_pattern() {
        let config = ReturnEngineConfig::new()
            .with_gamma(0.99)
            .with_tvf_gamma(0.99)
            .with_max_horizon(3000)
            .with_lambda_policy(0.9)
            .with_estimator(EstimatorMode::NStep { n: 40 });

        assert_eq!(config.gamma, 0.99);
        assert_eq!(config.max_horizon, 3000);
        assert_eq!(config.lambda_policy, 0.9);
        assert_eq!(config.estimator, EstimatorMode::NStep { n: 40 });
        assert!(!config.needs_rediscount());
    }

    #[test]
    fn test_validation_max_horizon_zero() {
        let config = ReturnEngineConfig::new().with_max_horizon(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCount { field: "max_horizon", .. })
        ));
    }

    #[test]
    fn test_validation_gamma_out_of_range() {
        let config = ReturnEngineConfig::new().with_gamma(1.5);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "gamma", .. })
        ));
        let config = ReturnEngineConfig::new().with_gamma(0.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_lambda_policy_one_rejected() {
        // λ = 1 never decays the recursion; disallowed for the policy path
        let config = ReturnEngineConfig::new().with_lambda_policy(1.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "lambda_policy", .. })
        ));
        // but λ = 1 (Monte Carlo) is fine for value targets
        let config = ReturnEngineConfig::new().with_lambda_value(1.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_estimator_params() {
        let config = ReturnEngineConfig::new().with_estimator(EstimatorMode::NStep { n: 0 });
        assert!(config.validate().is_err());

        let config = ReturnEngineConfig::new().with_estimator(EstimatorMode::Exponential {
            base: 1.0,
            mode: Default::default(),
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "exponential base", .. })
        ));

        let config = ReturnEngineConfig::new().with_estimator(EstimatorMode::Lambda {
            lambda: 0.95,
            mode: LambdaMode::Sampled { samples: 0 },
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tvf_gae_requires_undiscounted_curve() {
        let config = ReturnEngineConfig::new().with_tvf_gamma(0.99).with_tvf_gae(true);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Incompatible { field: "tvf_gae", .. })
        ));

        let config = ReturnEngineConfig::new().with_tvf_gamma(1.0).with_tvf_gae(true);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_jitter_requires_decaying_lambda() {
        // the jitter draws lambdas geometrically around lambda_value, which
        // is undefined at λ = 1
        let config = ReturnEngineConfig::new()
            .with_jittered_value_targets(true)
            .with_lambda_value(1.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Incompatible { field: "jittered_value_targets", .. })
        ));

        let config = ReturnEngineConfig::new()
            .with_jittered_value_targets(true)
            .with_lambda_value(0.95);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_needs_rediscount() {
        let config = ReturnEngineConfig::new().with_gamma(0.997).with_tvf_gamma(1.0);
        assert!(config.needs_rediscount());
        let config = ReturnEngineConfig::new().with_gamma(0.997).with_tvf_gamma(0.997);
        assert!(!config.needs_rediscount());
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidCount { field: "max_horizon", value: 0 };
        assert_eq!(err.to_string(), "max_horizon must be > 0, got 0");

        let err = ConfigError::OutOfRange { field: "gamma", value: 1.5, min: 0.0, max: 1.0 };
        assert_eq!(err.to_string(), "gamma must be in [0, 1], got 1.5");
    }

    #[test]
    fn test_config_serde_round_trip() {
        let config = ReturnEngineConfig::new()
            .with_estimator(EstimatorMode::Lambda {
                lambda: 0.9,
                mode: LambdaMode::Sampled { samples: 16 },
            })
            .with_max_horizon(500);
        let json = serde_json::to_string(&config).unwrap();
        let back: ReturnEngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
