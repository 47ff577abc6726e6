//! Training diagnostics for value-estimation quality.

pub mod value_quality;

pub use value_quality::{explained_variance, per_horizon_explained_variance, value_curve_mse};
