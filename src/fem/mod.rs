//! Implements the RVE equilibrium solvers: truss assembly, shared linear
//! buffers, Newton iteration with load cut-backs, and dynamic relaxation

mod analysis;
mod convergence;
mod explicit;
mod linear_structs;
mod rve_analysis;
mod truss_integrator;
pub use crate::fem::analysis::*;
pub use crate::fem::convergence::*;
pub use crate::fem::explicit::*;
pub use crate::fem::linear_structs::*;
pub use crate::fem::rve_analysis::*;
pub use crate::fem::truss_integrator::*;
