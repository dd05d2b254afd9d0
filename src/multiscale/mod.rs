//! Implements the distributed macro-micro lifecycle: the rank transport
//! abstraction, the coupling context and communication patterns, the wire
//! payloads, the startup template library, and the per-rank RVE manager

mod analysis;
mod context;
mod library;
mod pattern;
mod payloads;
mod transport;
pub use crate::multiscale::analysis::*;
pub use crate::multiscale::context::*;
pub use crate::multiscale::library::*;
pub use crate::multiscale::pattern::*;
pub use crate::multiscale::payloads::*;
pub use crate::multiscale::transport::*;
