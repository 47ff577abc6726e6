//! Value oracle boundary.
//!
//! The neural network that predicts value-at-horizon lives outside this
//! crate. The engine sees it only through the [`ValueOracle`] trait: a pure
//! function from a batch of (observation, time, horizon) triples to value
//! estimates. Everything model-specific (tensor types, device transfer,
//! value transforms) belongs behind this trait, not in the engine.
//!
//! Oracles backed by an accelerator usually have a maximum batch size; the
//! query helpers here micro-batch transparently, preserving output order.

use crate::core::ValueTable;

/// Black-box predictor of value at a given horizon.
///
/// `O` is the opaque observation type; the engine never inspects it.
pub trait ValueOracle<O> {
    /// Value estimates for a batch of states at each requested horizon.
    ///
    /// Returns a flat `[B, K]` buffer (`B = obs.len()`, `K = horizons.len()`),
    /// row-major with the horizon axis contiguous.
    fn value_at(&self, obs: &[O], time: &[f32], horizons: &[usize]) -> Vec<f32>;

    /// Second-moment estimates, if the model carries a second-moment head.
    ///
    /// The model is expected to predict the *sqrt* of the second moment (the
    /// query helper squares it). Default: no second-moment head.
    fn sqrt_value_m2_at(&self, obs: &[O], time: &[f32], horizons: &[usize]) -> Option<Vec<f32>> {
        let _ = (obs, time, horizons);
        None
    }

    /// Maximum states per forward pass, `None` for unbounded.
    fn max_batch(&self) -> Option<usize> {
        None
    }
}

/// Query the oracle over a `[T, A]` grid of states, producing a `ValueTable`.
///
/// Observations and times are flat `[T * A]` (time-major, same layout as the
/// rollout buffers). The query is chunked to the oracle's `max_batch` and the
/// horizon-0 column is forced to zero.
///
/// # Panics
///
/// Panics if input lengths disagree or the oracle returns a wrongly sized
/// batch.
pub fn query_value_table<O>(
    oracle: &impl ValueOracle<O>,
    obs: &[O],
    time: &[f32],
    horizons: &[usize],
    n_rows: usize,
    n_agents: usize,
) -> ValueTable {
    let data = query_flat(obs, time, horizons, n_rows, n_agents, |o, t| {
        oracle.value_at(o, t, horizons)
    }, oracle.max_batch());

    let mut table = ValueTable::new(data, horizons.to_vec(), n_rows, n_agents);
    table.enforce_zero_horizon();
    table
}

/// Query the oracle's second-moment head over a `[T, A]` grid.
///
/// Returns `None` when the oracle has no second-moment head. The model's
/// sqrt-second-moment output is clamped at zero and squared.
pub fn query_value_m2_table<O>(
    oracle: &impl ValueOracle<O>,
    obs: &[O],
    time: &[f32],
    horizons: &[usize],
    n_rows: usize,
    n_agents: usize,
) -> Option<ValueTable> {
    // probe a single state first so an oracle without the head costs nothing
    oracle.sqrt_value_m2_at(&obs[..1], &time[..1], horizons)?;

    let mut data = query_flat(obs, time, horizons, n_rows, n_agents, |o, t| {
        oracle
            .sqrt_value_m2_at(o, t, horizons)
            .expect("Oracle second-moment head disappeared mid-query")
    }, oracle.max_batch());

    for v in data.iter_mut() {
        let clamped = v.max(0.0);
        *v = clamped * clamped;
    }

    let mut table = ValueTable::new(data, horizons.to_vec(), n_rows, n_agents);
    table.enforce_zero_horizon();
    Some(table)
}

/// Single-horizon shortcut: `[B]` values at one scalar horizon.
pub fn query_value_at<O>(
    oracle: &impl ValueOracle<O>,
    obs: &[O],
    time: &[f32],
    horizon: usize,
) -> Vec<f32> {
    assert_eq!(obs.len(), time.len(), "obs and time batches must match");
    let horizons = [horizon];
    let mut out = Vec::with_capacity(obs.len());
    let chunk = oracle.max_batch().unwrap_or(usize::MAX).max(1);
    let mut start = 0;
    while start < obs.len() {
        let end = (start + chunk).min(obs.len());
        let vals = oracle.value_at(&obs[start..end], &time[start..end], &horizons);
        assert_eq!(vals.len(), end - start, "Oracle returned wrong batch size");
        out.extend_from_slice(&vals);
        start = end;
    }
    out
}

fn query_flat<O>(
    obs: &[O],
    time: &[f32],
    horizons: &[usize],
    n_rows: usize,
    n_agents: usize,
    mut forward: impl FnMut(&[O], &[f32]) -> Vec<f32>,
    max_batch: Option<usize>,
) -> Vec<f32> {
    let batch = n_rows * n_agents;
    assert_eq!(obs.len(), batch, "obs must be flat [T * A]");
    assert_eq!(time.len(), batch, "time must be flat [T * A]");
    assert!(!horizons.is_empty(), "at least one horizon required");

    let k = horizons.len();
    let chunk = max_batch.unwrap_or(batch).max(1);
    let mut data = Vec::with_capacity(batch * k);
    let mut start = 0;
    while start < batch {
        let end = (start + chunk).min(batch);
        let vals = forward(&obs[start..end], &time[start..end]);
        assert_eq!(
            vals.len(),
            (end - start) * k,
            "Oracle returned wrong batch size: expected {} got {}",
            (end - start) * k,
            vals.len()
        );
        data.extend_from_slice(&vals);
        start = end;
    }
    data
}
