//! Implements the fiber-network data model: nodes, truss elements, fiber
//! material laws, periodic boundary relations, the RVE cube geometry, and
//! template (de)serialization

mod fiber_reaction;
mod io;
mod network;
mod pbc;
mod rve;
pub use crate::network::fiber_reaction::*;
pub use crate::network::io::*;
pub use crate::network::network::*;
pub use crate::network::pbc::*;
pub use crate::network::rve::*;
