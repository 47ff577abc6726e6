//! Advantage estimation.
//!
//! - `gae`: standard GAE backward recursion plus normalization helpers
//! - `gae_tvf`: GAE under arbitrary discount functions via the value curve

pub mod gae;
pub mod gae_tvf;

pub use gae::{
    compute_gae, compute_sampled_value_targets, normalize_advantages,
    normalize_advantages_per_agent,
};
pub use gae_tvf::compute_gae_tvf;
