use crate::base::OscillationDetection;

/// Relative gap below which two residual norms count as "the same value"
/// when looking for a period-2 ping-pong
const PING_PONG_TOL: f64 = 1e-3;

/// Tracks the residual norm history of one Newton solve
///
/// The tracker owns the convergence decision (relative to the first norm,
/// with an absolute floor) and the oscillation diagnosis used by the load
/// cut-back logic.
pub struct ConvergenceTracker {
    /// Residual norms in iteration order (index 0 is the reference norm)
    norms: Vec<f64>,
}

impl ConvergenceTracker {
    /// Allocates a new instance
    pub fn new() -> Self {
        ConvergenceTracker { norms: Vec::new() }
    }

    /// Clears the history (call at the start of every solve)
    pub fn reset(&mut self) {
        self.norms.clear();
    }

    /// Records the residual norm of one iteration
    pub fn record(&mut self, norm: f64) {
        self.norms.push(norm);
    }

    /// Returns the number of recorded norms
    pub fn n_recorded(&self) -> usize {
        self.norms.len()
    }

    /// Returns the reference (first) norm, or zero if nothing was recorded
    pub fn first_norm(&self) -> f64 {
        *self.norms.first().unwrap_or(&0.0)
    }

    /// Returns the most recent norm, or zero if nothing was recorded
    pub fn last_norm(&self) -> f64 {
        *self.norms.last().unwrap_or(&0.0)
    }

    /// Returns the recorded norms in iteration order
    pub fn history(&self) -> &[f64] {
        &self.norms
    }

    /// Checks convergence of the most recent norm
    ///
    /// Accepts when the norm falls below the absolute floor `zero_tol` or
    /// below `solver_eps` times the reference norm.
    pub fn converged(&self, solver_eps: f64, zero_tol: f64) -> bool {
        match self.norms.last() {
            Some(&last) => last <= zero_tol || last <= solver_eps * self.first_norm(),
            None => false,
        }
    }

    /// Diagnoses an oscillating iteration history
    pub fn oscillating(&self, mode: OscillationDetection) -> bool {
        match mode {
            OscillationDetection::None => false,
            OscillationDetection::IterationOnly => self.ping_pong(),
            OscillationDetection::PrevNorm => self.growing(),
            OscillationDetection::IterationPrevNorm => self.ping_pong() || self.growing(),
        }
    }

    /// Detects two consecutive increases of the residual norm
    fn growing(&self) -> bool {
        let n = self.norms.len();
        if n < 3 {
            return false;
        }
        self.norms[n - 1] > self.norms[n - 2] && self.norms[n - 2] > self.norms[n - 3]
    }

    /// Detects a period-2 ping-pong: the last two norms each repeat the
    /// value seen two iterations earlier, while consecutive norms differ
    fn ping_pong(&self) -> bool {
        let n = self.norms.len();
        if n < 4 {
            return false;
        }
        let same = |a: f64, b: f64| {
            let scale = f64::max(a, b);
            scale > 0.0 && f64::abs(a - b) <= PING_PONG_TOL * scale
        };
        same(self.norms[n - 1], self.norms[n - 3])
            && same(self.norms[n - 2], self.norms[n - 4])
            && !same(self.norms[n - 1], self.norms[n - 2])
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
