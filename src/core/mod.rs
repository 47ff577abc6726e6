//! Core data model for the return-estimation engine.
//!
//! - `rollout`: borrowed `[N, A]` view over one training iteration's data
//! - `value_table`: `[T, A, K]` value-at-horizon estimates
//! - `interpolation`: value-curve interpolation over sparse horizons

pub mod interpolation;
pub mod rollout;
pub mod value_table;

pub use interpolation::{interpolate, interpolate_log};
pub use rollout::Rollout;
pub use value_table::ValueTable;
