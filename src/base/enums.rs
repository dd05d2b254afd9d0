use serde::{Deserialize, Serialize};

/// Specifies how the nonlinear solver detects an oscillating iteration history
///
/// An oscillating Newton sequence never satisfies the residual tolerance but
/// also never trips the divergence check on a single iteration; detecting it
/// early lets the load cut-back logic act before `max_itrs` is exhausted.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum OscillationDetection {
    /// No oscillation detection (rely on the iteration budget only)
    None,

    /// Flags a period-2 ping-pong of the residual norm
    IterationOnly,

    /// Flags consecutive growth of the residual norm
    PrevNorm,

    /// Flags either the ping-pong or the growth pattern
    IterationPrevNorm,
}

/// Specifies the time profile used to ramp the boundary displacement
/// in the explicit (dynamic relaxation) RVE solver
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Amplitude {
    /// Linear ramp from 0 to 1 over the load time
    Linear,

    /// Smooth-step ramp (zero velocity at both ends of the load time)
    SmoothStep,
}

impl Amplitude {
    /// Evaluates the amplitude at time t given the total load time
    ///
    /// Returns 1.0 for `t ≥ load_time`
    pub fn value(&self, t: f64, load_time: f64) -> f64 {
        if t >= load_time {
            return 1.0;
        }
        let s = t / load_time;
        match self {
            Amplitude::Linear => s,
            Amplitude::SmoothStep => s * s * (3.0 - 2.0 * s),
        }
    }
}

/// Specifies the structural model of an individual fiber
///
/// Only truss fibers (axial force, ndim displacement DOFs per node) are
/// implemented; the beam variant (6 DOFs per node) is part of the data
/// model but rejected at network construction.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum FiberMember {
    /// Axial-force-only member: ndim displacement DOFs per node
    Truss,

    /// Bending-capable member: 6 DOFs per node (not implemented)
    Beam,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
