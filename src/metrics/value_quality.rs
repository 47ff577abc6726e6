//! Explained variance and curve-error diagnostics.
//!
//! Explained variance is the standard check on a value function:
//!
//! EV = 1 − Var(target − prediction) / Var(target)
//!
//! 1 means the predictions capture the targets perfectly, 0 means they do no
//! better than predicting the mean, negative means they are actively worse.
//! For a multi-horizon value model the per-horizon breakdown shows *where*
//! along the curve the model is weak (typically the long tail).

use log::warn;

use crate::core::ValueTable;
use crate::returns::ReturnEstimate;

/// Explained variance of predictions against targets.
///
/// Degenerate inputs are reported as 0: empty slices, zero target variance,
/// or non-finite inputs (the latter logs a warning since it usually means a
/// diverging value head). Output is clipped to `[-1, 1]` so one bad rollout
/// cannot blow up an averaged dashboard series.
pub fn explained_variance(predictions: &[f32], targets: &[f32]) -> f32 {
    assert_eq!(predictions.len(), targets.len(), "prediction/target length mismatch");
    if targets.is_empty() {
        return 0.0;
    }

    let n = targets.len() as f32;
    let target_mean = targets.iter().sum::<f32>() / n;
    let target_var = targets.iter().map(|t| (t - target_mean).powi(2)).sum::<f32>() / n;
    if target_var < 1e-12 {
        return 0.0;
    }

    let residual_mean = predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| t - p)
        .sum::<f32>()
        / n;
    let residual_var = predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| (t - p - residual_mean).powi(2))
        .sum::<f32>()
        / n;

    let ev = 1.0 - residual_var / target_var;
    if !ev.is_finite() {
        warn!("explained variance is not finite (diverging value predictions?)");
        return 0.0;
    }
    ev.clamp(-1.0, 1.0)
}

/// Per-horizon explained variance of a value table against return targets.
///
/// Both must share the horizon axis; returns `(horizon, ev)` pairs. The
/// table may have an extra bootstrap row, which is ignored.
pub fn per_horizon_explained_variance(
    values: &ValueTable,
    targets: &ReturnEstimate,
) -> Vec<(usize, f32)> {
    assert_eq!(
        values.horizons(),
        targets.horizons(),
        "value table and targets must share a horizon axis"
    );
    assert_eq!(values.n_agents(), targets.n_agents(), "agent axis mismatch");
    assert!(values.n_rows() >= targets.n_steps(), "value table too short");

    let n = targets.n_steps();
    let a = targets.n_agents();
    let mut out = Vec::with_capacity(values.horizons().len());
    let mut preds = vec![0.0f32; n * a];
    let mut targs = vec![0.0f32; n * a];

    for (ki, &h) in values.horizons().iter().enumerate() {
        for t in 0..n {
            for agent in 0..a {
                preds[t * a + agent] = values.value(t, agent, ki);
                targs[t * a + agent] = targets.value(t, agent, ki);
            }
        }
        out.push((h, explained_variance(&preds, &targs)));
    }
    out
}

/// Mean squared error between a value table and return targets, over all
/// horizons. The table's bootstrap row (if present) is ignored.
pub fn value_curve_mse(values: &ValueTable, targets: &ReturnEstimate) -> f32 {
    assert_eq!(
        values.horizons(),
        targets.horizons(),
        "value table and targets must share a horizon axis"
    );
    let n = targets.n_steps();
    let a = targets.n_agents();
    let k = values.horizons().len();
    if n * a * k == 0 {
        return 0.0;
    }

    let mut sum = 0.0f64;
    for t in 0..n {
        for agent in 0..a {
            for ki in 0..k {
                let d = values.value(t, agent, ki) - targets.value(t, agent, ki);
                sum += (d * d) as f64;
            }
        }
    }
    (sum / (n * a * k) as f64) as f32
}
