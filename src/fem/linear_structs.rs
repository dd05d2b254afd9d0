use crate::StrError;
use russell_lab::Vector;
use russell_sparse::{Genie, LinSolver, SparseMatrix, Sym};
use std::cell::RefCell;
use std::rc::Rc;

/// Shared handle to a [`LinearStructs`] buffer
///
/// Handles are reference-counted; the checked borrow at solve time enforces
/// at most one active solve per handle.
pub type LinearStructsHandle = Rc<RefCell<LinearStructs>>;

/// Holds the sparse stiffness matrix, work vectors, and the linear solver
/// of an RVE equilibrium solve
///
/// A buffer is sized once to a capacity DOF count and never resized; RVE
/// analyses whose network is smaller use the leading block and pad the
/// remaining equations with identity rows. One buffer is shared across all
/// RVE clones resident on a rank (they are never solved concurrently), so
/// allocation is bounded by the largest network template.
pub struct LinearStructs {
    /// Capacity: number of equations the buffers can hold
    pub neq_cap: usize,

    /// Capacity: number of nonzero entries the matrix can hold
    ///
    /// Must account for the element blocks plus one diagonal entry per
    /// prescribed or padded equation.
    pub nnz_cap: usize,

    /// Global tangent matrix K
    pub kk: SparseMatrix,

    /// Global residual vector R
    pub rr: Vector,

    /// Minus delta U vector (the solution of the linear system)
    pub mdu: Vector,

    /// Linear solver handle (reused across factorizations)
    pub solver: LinSolver<'static>,
}

impl LinearStructs {
    /// Allocates buffers for up to `neq_cap` equations and `nnz_cap` nonzeros
    pub fn new(neq_cap: usize, nnz_cap: usize) -> Result<Self, StrError> {
        if neq_cap < 1 {
            return Err("neq_cap must be ≥ 1");
        }
        Ok(LinearStructs {
            neq_cap,
            nnz_cap,
            kk: SparseMatrix::new_coo(neq_cap, neq_cap, nnz_cap, Sym::No)?,
            rr: Vector::new(neq_cap),
            mdu: Vector::new(neq_cap),
            solver: LinSolver::new(Genie::Umfpack)?,
        })
    }

    /// Factorizes the current matrix
    pub fn factorize(&mut self) -> Result<(), StrError> {
        self.solver.actual.factorize(&mut self.kk, None)
    }

    /// Factorizes the current matrix and solves `K mdu = rr`
    pub fn factorize_and_solve(&mut self) -> Result<(), StrError> {
        self.factorize()?;
        self.solver.actual.solve(&mut self.mdu, &self.kk, &self.rr, false)
    }

    /// Solves `K x = rhs` reusing the last factorization
    pub fn solve_with_factorized(&mut self, x: &mut Vector, rhs: &Vector) -> Result<(), StrError> {
        self.solver.actual.solve(x, &self.kk, rhs, false)
    }
}

/// Owns the linear-algebra buffers shared by the RVE analyses of one rank
///
/// The arena is sized once at startup from the largest network template and
/// hands out reference-counted handles; instantiating an RVE whose DOF count
/// exceeds the capacity is an initialization-time error.
pub struct BufferArena {
    /// Capacity: number of equations
    neq_cap: usize,

    /// The buffer shared by all resident analyses
    shared: LinearStructsHandle,
}

impl BufferArena {
    /// Allocates the arena with the given equation and nonzero capacities
    pub fn new(neq_cap: usize, nnz_cap: usize) -> Result<Self, StrError> {
        let shared = Rc::new(RefCell::new(LinearStructs::new(neq_cap, nnz_cap)?));
        Ok(BufferArena { neq_cap, shared })
    }

    /// Returns the equation capacity
    pub fn neq_cap(&self) -> usize {
        self.neq_cap
    }

    /// Checks that a network with `n_dof` equations fits the buffers
    pub fn require(&self, n_dof: usize) -> Result<(), StrError> {
        if n_dof > self.neq_cap {
            return Err("network DOF count exceeds the arena capacity fixed at startup");
        }
        Ok(())
    }

    /// Hands out a shared handle to the buffers
    pub fn checkout(&self) -> LinearStructsHandle {
        Rc::clone(&self.shared)
    }
}

/// Returns the worst-case nonzero count of a truss network's tangent matrix
///
/// Counts the full local blocks of `n_elements` two-node elements plus one
/// diagonal entry per equation (prescribed identity rows and capacity
/// padding).
pub fn nnz_sup_truss(n_elements: usize, ndim: usize, neq_cap: usize) -> usize {
    n_elements * (2 * ndim) * (2 * ndim) + neq_cap
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
