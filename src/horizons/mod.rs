//! Horizon-set generation for value sampling and return targets.

pub mod sampler;

pub use sampler::{generate_horizon_sample, HorizonDistribution};
