//! Rollout window data model.
//!
//! A rollout is a fixed window of `N` timesteps across `A` parallel agents,
//! produced once per training iteration by environment stepping. The engine
//! borrows it read-only and never retains it past a single call.
//!
//! Storage is time-major and flat: element `(t, a)` of an `[N, A]` buffer
//! lives at index `t * A + a`. This matches how every kernel in the crate
//! iterates (outer loop over time, inner vectorized over agents).

/// Read-only view of one rollout window.
///
/// `terminals[t, a]` is true when agent `a`'s episode ends with step `t`:
/// the reward at `t` is the episode's last, and nothing after it (rewards or
/// bootstraps) may contribute to returns that include step `t`. `time`
/// carries the fraction of episode elapsed and has `N + 1` rows because it
/// covers the final (bootstrap) state as well.
#[derive(Debug, Clone)]
pub struct Rollout<'a> {
    rewards: &'a [f32],
    terminals: &'a [bool],
    time: &'a [f32],
    n_steps: usize,
    n_agents: usize,
}

impl<'a> Rollout<'a> {
    /// Create a rollout view over caller-owned buffers.
    ///
    /// # Panics
    ///
    /// Panics if buffer lengths are inconsistent with `[N, A]` / `[N+1, A]`
    /// shapes.
    pub fn new(
        rewards: &'a [f32],
        terminals: &'a [bool],
        time: &'a [f32],
        n_steps: usize,
        n_agents: usize,
    ) -> Self {
        assert!(n_steps > 0, "Rollout must contain at least one step");
        assert!(n_agents > 0, "Rollout must contain at least one agent");
        assert_eq!(rewards.len(), n_steps * n_agents, "rewards must be [N, A]");
        assert_eq!(terminals.len(), n_steps * n_agents, "terminals must be [N, A]");
        assert_eq!(time.len(), (n_steps + 1) * n_agents, "time must be [N+1, A]");

        Self { rewards, terminals, time, n_steps, n_agents }
    }

    /// Number of timesteps `N` in the window.
    #[inline]
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Number of parallel agents `A`.
    #[inline]
    pub fn n_agents(&self) -> usize {
        self.n_agents
    }

    /// Reward received at step `t` by agent `a`.
    #[inline]
    pub fn reward(&self, t: usize, a: usize) -> f32 {
        self.rewards[t * self.n_agents + a]
    }

    /// Whether agent `a`'s episode ends with step `t`.
    #[inline]
    pub fn terminal(&self, t: usize, a: usize) -> bool {
        self.terminals[t * self.n_agents + a]
    }

    /// Episode-time fraction at step `t` (valid for `t <= N`).
    #[inline]
    pub fn time(&self, t: usize, a: usize) -> f32 {
        self.time[t * self.n_agents + a]
    }

    /// Raw `[N, A]` reward buffer.
    #[inline]
    pub fn rewards(&self) -> &'a [f32] {
        self.rewards
    }

    /// Raw `[N, A]` terminal buffer.
    #[inline]
    pub fn terminals(&self) -> &'a [bool] {
        self.terminals
    }

    /// Raw `[N+1, A]` time buffer.
    #[inline]
    pub fn time_buffer(&self) -> &'a [f32] {
        self.time
    }
}
