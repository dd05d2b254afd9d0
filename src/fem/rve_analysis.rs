use super::{ConvergenceTracker, LinearStructsHandle, TrussIntegrator, ZERO_LENGTH_ERROR};
use crate::base::{DeformationGradient, SolverConfig};
use crate::network::{FiberNetwork, Rve};
use crate::StrError;
use russell_lab::{vec_norm, Matrix, Norm, Vector};

/// Smallest load increment the cut-back schedule may produce
const MIN_LOAD_INCREMENT: f64 = 1e-6;

/// Outcome of one Newton solve at a fixed boundary displacement
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NewtonOutcome {
    /// Converged within the iteration budget (holds the iteration count)
    Converged(usize),

    /// Exhausted the iteration budget without converging
    MaxIterations,

    /// The residual norm history oscillated
    Oscillating,

    /// A fiber collapsed to zero length during assembly
    Collapsed,
}

/// Implements the implicit (Newton) equilibrium analysis of one fiber RVE
///
/// The analysis owns a network instance and drives its boundary nodes with
/// an affine displacement `u = s (F − I) x` derived from the macroscale
/// deformation gradient. Interior nodes are relaxed to equilibrium by a
/// full Newton iteration on the internal force residual; the applied load
/// fraction `s` is stepped from the previously converged state to 1 with a
/// bounded cut-back schedule when an attempt diverges, oscillates, or
/// crushes a fiber to zero length.
///
/// Linear-algebra buffers are borrowed from a shared [`super::BufferArena`];
/// equations beyond the network's DOF count up to the buffer capacity are
/// padded with identity rows so that one factorization size serves every
/// resident RVE.
pub struct FiberRveAnalysis {
    /// The fiber network being solved (displacements live here)
    pub network: FiberNetwork,

    /// The geometric RVE cube defining the boundary
    pub rve: Rve,

    /// Solver tunables
    pub config: SolverConfig,

    /// Total Newton iterations spent by the last `run`
    pub iterations: usize,

    /// Load cut-backs spent by the last `run`
    pub cut_backs: usize,

    /// Shared linear-algebra buffers
    buffers: LinearStructsHandle,

    /// Per-element assembly scratch
    integ: TrussIntegrator,

    /// Residual norm history of the current Newton solve
    tracker: ConvergenceTracker,

    /// Prescribed (boundary) DOF flags
    prescribed: Vec<bool>,

    /// Ids of the nodes on the RVE boundary
    boundary: Vec<usize>,

    /// Cached solve-phase sensitivity dx_fn/dx_rve (invalidated on motion)
    dx_fn_dx_rve: Option<Matrix>,
}

impl FiberRveAnalysis {
    /// Allocates a new instance
    ///
    /// Fails if the network does not fit the shared buffers or if the
    /// configuration is invalid.
    pub fn new(
        network: FiberNetwork,
        rve: Rve,
        config: SolverConfig,
        buffers: LinearStructsHandle,
    ) -> Result<Self, StrError> {
        if let Some(msg) = config.validate() {
            log::error!("invalid solver configuration: {}", msg);
            return Err("cannot allocate analysis because of an invalid solver configuration");
        }
        if network.ndim != rve.ndim {
            return Err("network and RVE dimensions must match");
        }
        let n_dof = network.n_dof();
        {
            let handle = buffers
                .try_borrow()
                .map_err(|_| "the linear buffers support at most one active solve per handle")?;
            if n_dof > handle.neq_cap {
                return Err("network DOF count exceeds the arena capacity fixed at startup");
            }
        }
        let boundary = rve.all_boundary_nodes(&network);
        if boundary.is_empty() {
            return Err("the network has no nodes on the RVE boundary");
        }
        let ndim = network.ndim;
        Ok(FiberRveAnalysis {
            network,
            rve,
            config,
            iterations: 0,
            cut_backs: 0,
            buffers,
            integ: TrussIntegrator::new(ndim),
            tracker: ConvergenceTracker::new(),
            prescribed: vec![false; n_dof],
            boundary,
            dx_fn_dx_rve: None,
        })
    }

    /// Returns the prescribed-DOF flags (true for boundary equations)
    pub fn prescribed(&self) -> &[bool] {
        &self.prescribed
    }

    /// Returns the ids of the boundary nodes
    pub fn boundary_nodes(&self) -> &[usize] {
        &self.boundary
    }

    /// Returns the cached boundary-to-interior sensitivity, if still valid
    pub fn cached_dx_fn_dx_rve(&self) -> Option<&Matrix> {
        self.dx_fn_dx_rve.as_ref()
    }

    /// Stores the boundary-to-interior sensitivity computed at the current state
    pub fn store_dx_fn_dx_rve(&mut self, jacobian: Matrix) {
        self.dx_fn_dx_rve = Some(jacobian);
    }

    /// Prescribes the affine boundary displacement `u = s (F − I) x`
    ///
    /// Marks every boundary DOF as prescribed and writes its displacement;
    /// interior DOFs keep their current values.
    pub fn apply_rve_bc(&mut self, dg: &DeformationGradient, scale: f64) -> Result<(), StrError> {
        let ndim = self.network.ndim;
        if dg.ndim() != ndim {
            return Err("deformation gradient dimension must match the network");
        }
        let mut ub = [0.0; 3];
        for &node in &self.boundary {
            let coords = self.network.nodes[node].coords;
            dg.displacement(scale, &coords[..ndim], &mut ub[..ndim]);
            for k in 0..ndim {
                let eq = self.network.eq(node, k);
                self.prescribed[eq] = true;
                self.network.u[eq] = ub[k];
            }
        }
        self.dx_fn_dx_rve = None;
        Ok(())
    }

    /// Releases the boundary constraints (all DOFs become free again)
    pub fn free_rve_bc(&mut self) {
        self.prescribed.fill(false);
        self.dx_fn_dx_rve = None;
    }

    /// Runs the full load-stepped Newton analysis up to the given F
    ///
    /// Starts from the current displacement state (zero for a fresh network,
    /// or the converged state of the previous macro step) and advances the
    /// applied load fraction to one. Fatal errors are an exhausted cut-back
    /// budget, an underflowing load increment, or a linear solver failure.
    pub fn run(&mut self, dg: &DeformationGradient) -> Result<(), StrError> {
        self.iterations = 0;
        self.cut_backs = 0;
        let mut lambda = 0.0;
        let mut dstep = 1.0;
        let mut backup = self.network.u.clone();
        while lambda < 1.0 - 1e-12 {
            let trial = f64::min(1.0, lambda + dstep);
            self.apply_rve_bc(dg, trial)?;
            match self.newton()? {
                NewtonOutcome::Converged(itrs) => {
                    self.iterations += itrs;
                    lambda = trial;
                    backup = self.network.u.clone();
                    log::debug!("load fraction {:.6} converged in {} iterations", lambda, itrs);
                }
                outcome => {
                    self.cut_backs += 1;
                    if self.cut_backs > self.config.max_cut_attempt {
                        log::warn!(
                            "giving up at load fraction {:.6} after {} cut-backs (last outcome: {:?}, F = {:?})",
                            lambda,
                            self.cut_backs - 1,
                            outcome,
                            dg.to_flat(),
                        );
                        return Err("fiber network solve failed after exhausting the load cut-back budget");
                    }
                    self.network.u = backup.clone();
                    if outcome == NewtonOutcome::Oscillating {
                        dstep *= self.config.prev_itr_factor;
                    } else {
                        dstep /= self.config.attempt_cut_factor;
                    }
                    if dstep < MIN_LOAD_INCREMENT {
                        return Err("load increment became too small during cut-backs");
                    }
                    log::debug!(
                        "attempt at load fraction {:.6} failed ({:?}); retrying with increment {:.3e}",
                        trial,
                        outcome,
                        dstep
                    );
                }
            }
        }
        Ok(())
    }

    /// Performs one Newton solve at the currently prescribed boundary state
    ///
    /// Returns `Err` only for fatal conditions (solver failure, capacity
    /// misuse); non-convergence is reported through the outcome.
    pub fn newton(&mut self) -> Result<NewtonOutcome, StrError> {
        let n_dof = self.network.n_dof();
        let mut ls = self
            .buffers
            .try_borrow_mut()
            .map_err(|_| "the linear buffers support at most one active solve per handle")?;
        self.tracker.reset();
        for it in 0..self.config.max_itrs {
            ls.rr.fill(0.0);
            match self.integ.assemble_f_int(&mut ls.rr, &self.network, &self.prescribed) {
                Ok(()) => (),
                Err(msg) if msg == ZERO_LENGTH_ERROR => return Ok(NewtonOutcome::Collapsed),
                Err(msg) => return Err(msg),
            }
            let norm = vec_norm(&ls.rr, Norm::Euc);
            self.tracker.record(norm);
            if self.config.verbose {
                println!("iteration {:>3}: ‖R‖ = {:>13.6e}", it, norm);
            }
            if self.tracker.converged(self.config.solver_eps, self.config.zero_tol) {
                return Ok(NewtonOutcome::Converged(it));
            }
            if self.tracker.oscillating(self.config.detect_osc_type) {
                return Ok(NewtonOutcome::Oscillating);
            }
            let neq_cap = ls.neq_cap;
            let coo = ls.kk.get_coo_mut()?;
            coo.reset();
            match self.integ.assemble_kke(coo, &self.network, &self.prescribed) {
                Ok(()) => (),
                Err(msg) if msg == ZERO_LENGTH_ERROR => return Ok(NewtonOutcome::Collapsed),
                Err(msg) => return Err(msg),
            }
            for eq in 0..n_dof {
                if self.prescribed[eq] {
                    coo.put(eq, eq, 1.0)?;
                }
            }
            for eq in n_dof..neq_cap {
                coo.put(eq, eq, 1.0)?;
            }
            ls.factorize_and_solve()?;
            for eq in 0..n_dof {
                if !self.prescribed[eq] {
                    self.network.u[eq] -= ls.mdu[eq];
                }
            }
            self.dx_fn_dx_rve = None;
        }
        Ok(NewtonOutcome::MaxIterations)
    }

    /// Assembles and factorizes the tangent at the current state
    ///
    /// Prescribed rows become identity rows, as do the padding equations.
    /// Used by the coupling derivatives, which solve multiple right-hand
    /// sides against the equilibrium tangent.
    pub fn assemble_and_factorize(&mut self) -> Result<(), StrError> {
        let n_dof = self.network.n_dof();
        let mut ls = self
            .buffers
            .try_borrow_mut()
            .map_err(|_| "the linear buffers support at most one active solve per handle")?;
        let neq_cap = ls.neq_cap;
        let coo = ls.kk.get_coo_mut()?;
        coo.reset();
        self.integ.assemble_kke(coo, &self.network, &self.prescribed)?;
        for eq in 0..n_dof {
            if self.prescribed[eq] {
                coo.put(eq, eq, 1.0)?;
            }
        }
        for eq in n_dof..neq_cap {
            coo.put(eq, eq, 1.0)?;
        }
        ls.factorize()
    }

    /// Solves one right-hand side against the last factorized tangent
    ///
    /// `x` and `rhs` must have the buffer capacity length.
    pub fn solve_with_current_factors(&mut self, x: &mut Vector, rhs: &Vector) -> Result<(), StrError> {
        let mut ls = self
            .buffers
            .try_borrow_mut()
            .map_err(|_| "the linear buffers support at most one active solve per handle")?;
        ls.solve_with_factorized(x, rhs)
    }

    /// Returns the equation capacity of the shared buffers
    pub fn buffer_capacity(&self) -> Result<usize, StrError> {
        let ls = self
            .buffers
            .try_borrow()
            .map_err(|_| "the linear buffers support at most one active solve per handle")?;
        Ok(ls.neq_cap)
    }

    /// Returns the residual norm of the last Newton iteration
    pub fn last_residual_norm(&self) -> f64 {
        self.tracker.last_norm()
    }

    /// Returns the residual norm history of the last Newton solve
    pub fn residual_history(&self) -> &[f64] {
        self.tracker.history()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
