//! Horizon sampling distributions.
//!
//! The value function is trained at a subset of the `0..=H` horizon range,
//! both for the points where the oracle is queried (value samples) and for
//! the points where return targets are produced (required horizons). This
//! module generates those subsets under a handful of distributions.
//!
//! Short horizons matter most for bias (they anchor the bootstrap residuals),
//! so the geometric family oversamples them by drawing uniformly in
//! `log(1 + h)` space; the saturated variants additionally spend half the
//! budget inside `[0, min(N, H)]` where the rollout window can actually
//! resolve the return.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Horizon sampling distribution.
///
/// `Fixed*` variants are deterministic; the rest draw fresh samples per call
/// from a caller-supplied RNG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HorizonDistribution {
    /// Evenly spaced over `[0, H]`, endpoints included.
    FixedLinear,
    /// Geometrically spaced over `[0, H]` (via `geomspace(1, 1+H) - 1`).
    FixedGeometric,
    /// Uniform sample without replacement from `1..H`.
    Linear,
    /// Uniform in `log(1 + h)` space over `[0, H]`.
    Geometric,
    /// Half the budget uniform-log over `[0, min(N, H)]`, half over `[0, H]`.
    SaturatedGeometric,
    /// Deterministic counterpart of `SaturatedGeometric`.
    SaturatedFixedGeometric,
}

impl fmt::Display for HorizonDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HorizonDistribution::FixedLinear => "fixed_linear",
            HorizonDistribution::FixedGeometric => "fixed_geometric",
            HorizonDistribution::Linear => "linear",
            HorizonDistribution::Geometric => "geometric",
            HorizonDistribution::SaturatedGeometric => "saturated_geometric",
            HorizonDistribution::SaturatedFixedGeometric => "saturated_fixed_geometric",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for HorizonDistribution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed_linear" => Ok(HorizonDistribution::FixedLinear),
            "fixed_geometric" => Ok(HorizonDistribution::FixedGeometric),
            "linear" => Ok(HorizonDistribution::Linear),
            "geometric" => Ok(HorizonDistribution::Geometric),
            "saturated_geometric" => Ok(HorizonDistribution::SaturatedGeometric),
            "saturated_fixed_geometric" => Ok(HorizonDistribution::SaturatedFixedGeometric),
            other => Err(format!("Invalid distribution {}", other)),
        }
    }
}

/// Evenly spaced values over `[start, stop]`, endpoints included.
fn linspace(start: f32, stop: f32, num: usize) -> Vec<f32> {
    assert!(num >= 2, "linspace requires at least two points");
    let step = (stop - start) / (num - 1) as f32;
    (0..num).map(|i| start + step * i as f32).collect()
}

/// Geometrically spaced values over `[start, stop]`.
///
/// `endpoint` controls whether `stop` itself is included (matching the two
/// geomspace call styles the saturated-fixed distribution needs).
fn geomspace(start: f32, stop: f32, num: usize, endpoint: bool) -> Vec<f32> {
    assert!(start > 0.0 && stop > 0.0, "geomspace requires positive bounds");
    assert!(num >= 1);
    let divisor = if endpoint { (num - 1).max(1) } else { num };
    let ratio = (stop / start).powf(1.0 / divisor as f32);
    let mut out = Vec::with_capacity(num);
    let mut x = start;
    for _ in 0..num {
        out.push(x);
        x *= ratio;
    }
    if endpoint && num >= 2 {
        out[num - 1] = stop; // kill accumulated rounding drift
    }
    out
}

/// Generate a sorted horizon sample over `0..=max_value`.
///
/// * `effective_n` - rollout window length `N`, used by the saturated
///   distributions to decide what counts as a "short" horizon.
/// * `max_value` - maximum horizon `H` (inclusive).
/// * `samples` - sample budget `K`; `None` (or any budget covering the full
///   range) returns every integer horizon `0..=H` exactly.
/// * `force_first_and_last` - overwrite the first and last sorted entries
///   with `0` and `H`. This can duplicate a nearby sample; that is accepted.
///
/// Output is rounded to integers and sorted ascending. The saturated
/// variants spend their budget as two halves, so an odd budget yields one
/// fewer sample.
pub fn generate_horizon_sample(
    rng: &mut impl Rng,
    effective_n: usize,
    max_value: usize,
    samples: Option<usize>,
    distribution: HorizonDistribution,
    force_first_and_last: bool,
) -> Vec<usize> {
    let budget = match samples {
        Some(k) => k,
        None => return (0..=max_value).collect(),
    };
    if budget >= max_value + 1 {
        return (0..=max_value).collect();
    }
    assert!(budget >= 2, "Horizon sample budget must be at least 2, got {}", budget);

    let h = max_value as f32;
    let short = effective_n.min(max_value) as f32;

    let mut raw: Vec<f32> = match distribution {
        HorizonDistribution::FixedLinear => linspace(0.0, h, budget),
        HorizonDistribution::FixedGeometric => geomspace(1.0, 1.0 + h, budget, true)
            .into_iter()
            .map(|x| x - 1.0)
            .collect(),
        HorizonDistribution::Linear => {
            // without replacement from 1..H, so interior samples never repeat
            rand::seq::index::sample(rng, max_value.saturating_sub(1), budget.min(max_value.saturating_sub(1)))
                .into_iter()
                .map(|i| (i + 1) as f32)
                .collect()
        }
        HorizonDistribution::Geometric => (0..budget)
            .map(|_| rng.gen_range(0.0..(1.0f32 + h).ln()).exp() - 1.0)
            .collect(),
        HorizonDistribution::SaturatedGeometric => {
            let half = budget / 2;
            let mut out: Vec<f32> = (0..half)
                .map(|_| rng.gen_range(0.0..(1.0f32 + short).ln()).exp() - 1.0)
                .collect();
            out.extend((0..half).map(|_| rng.gen_range(0.0..(1.0f32 + h).ln()).exp() - 1.0));
            out
        }
        HorizonDistribution::SaturatedFixedGeometric => {
            let half = budget / 2;
            let mut out: Vec<f32> = geomspace(1.0, short + 1.0, half, false)
                .into_iter()
                .map(|x| x - 1.0)
                .collect();
            out.extend(geomspace(1.0, 1.0 + h, half, true).into_iter().map(|x| x - 1.0));
            out
        }
    };

    raw.sort_by(|a, b| a.total_cmp(b));
    if force_first_and_last {
        let last = raw.len() - 1;
        raw[0] = 0.0;
        raw[last] = h;
    }

    raw.into_iter().map(|x| x.round() as usize).collect()
}
