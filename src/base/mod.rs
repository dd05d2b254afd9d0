//! Implements configuration, shared enums, the deformation-gradient payload
//! type, and sample networks for tests

mod config;
mod deformation_gradient;
mod enums;
mod sample_networks;
pub use crate::base::config::*;
pub use crate::base::deformation_gradient::*;
pub use crate::base::enums::*;
pub use crate::base::sample_networks::*;
