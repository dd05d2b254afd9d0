//! Implements the micro-to-macro coupling quantities: volume-averaged stress
//! recovery and the analytic sensitivity chain from node positions through
//! the RVE corners to the macroscale element DOFs

mod derivatives;
mod macro_info;
mod stress;
pub use crate::coupling::derivatives::*;
pub use crate::coupling::macro_info::*;
pub use crate::coupling::stress::*;
