//! Per-horizon value estimates for a rollout window.
//!
//! A `ValueTable` holds the oracle's output for every (timestep, agent,
//! sampled horizon) triple: shape `[T, A, K]` where `T` is usually `N + 1`
//! (the window plus the bootstrap state) and `K` is the number of sampled
//! horizons. Horizons are stored alongside the data so a value at any
//! *unsampled* horizon can be reconstructed by interpolation.

use crate::core::interpolation::{interpolate, interpolate_log};

/// Dense `[T, A, K]` table of value-at-horizon estimates.
///
/// The horizon axis is contiguous (stride 1), so the per-state value curve
/// `curve(t, a)` is a plain slice.
#[derive(Debug, Clone)]
pub struct ValueTable {
    data: Vec<f32>,
    horizons: Vec<usize>,
    n_rows: usize,
    n_agents: usize,
}

impl ValueTable {
    /// Build a table from a flat `[T, A, K]` buffer and its horizon axis.
    ///
    /// # Panics
    ///
    /// Panics if the buffer length does not match `T * A * K` or if the
    /// horizons are not sorted ascending.
    pub fn new(data: Vec<f32>, horizons: Vec<usize>, n_rows: usize, n_agents: usize) -> Self {
        assert!(!horizons.is_empty(), "ValueTable requires at least one horizon");
        assert!(
            horizons.windows(2).all(|w| w[0] <= w[1]),
            "ValueTable horizons must be sorted ascending, got {:?}",
            horizons
        );
        assert_eq!(
            data.len(),
            n_rows * n_agents * horizons.len(),
            "ValueTable buffer must be [T, A, K] = [{}, {}, {}]",
            n_rows, n_agents, horizons.len()
        );

        Self { data, horizons, n_rows, n_agents }
    }

    /// Zero out the horizon-0 column.
    ///
    /// The value at horizon 0 is definitionally zero (no future reward); the
    /// oracle adapter calls this rather than trusting the model's output at
    /// h = 0. No-op when horizon 0 was not sampled.
    pub fn enforce_zero_horizon(&mut self) {
        let k = self.horizons.len();
        for (i, &h) in self.horizons.iter().enumerate() {
            if h != 0 {
                continue;
            }
            let mut idx = i;
            while idx < self.data.len() {
                self.data[idx] = 0.0;
                idx += k;
            }
        }
    }

    /// Number of rows `T` (timesteps covered, typically `N + 1`).
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of agents `A`.
    #[inline]
    pub fn n_agents(&self) -> usize {
        self.n_agents
    }

    /// Sampled horizon axis.
    #[inline]
    pub fn horizons(&self) -> &[usize] {
        &self.horizons
    }

    /// Value at sampled-horizon index `k` for state `(t, a)`.
    #[inline]
    pub fn value(&self, t: usize, a: usize, k: usize) -> f32 {
        self.data[(t * self.n_agents + a) * self.horizons.len() + k]
    }

    /// The full value curve for state `(t, a)` as a `[K]` slice.
    #[inline]
    pub fn curve(&self, t: usize, a: usize) -> &[f32] {
        let k = self.horizons.len();
        let start = (t * self.n_agents + a) * k;
        &self.data[start..start + k]
    }

    /// Value at an arbitrary (possibly unsampled) horizon for state `(t, a)`.
    ///
    /// Missing horizons are linearly interpolated; `log_space` switches to
    /// `log(1 + h)` interpolation.
    pub fn value_at_horizon(&self, t: usize, a: usize, horizon: f32, log_space: bool) -> f32 {
        let curve = self.curve(t, a);
        if log_space {
            interpolate_log(&self.horizons, curve, horizon)
        } else {
            interpolate(&self.horizons, curve, horizon)
        }
    }

    /// Raw flat buffer (time-major, horizon stride 1).
    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }
}
