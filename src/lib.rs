//! ftsim: multiscale mechanical simulation of fibrous biological tissue
//!
//! A macroscale finite-element analysis exchanges deformation and
//! stress/tangent data with many microscale fiber-network models, one per
//! macroscale integration point (the Representative Volume Elements, RVEs).
//! This crate implements the microscale side and the macro-micro coupling:
//!
//! * [`network`]: fiber-network topology, nonlinear fiber material laws,
//!   periodic boundary relations, and the RVE cube geometry
//! * [`fem`]: the per-element truss integrator and the implicit/explicit
//!   RVE equilibrium solvers with load cut-back control
//! * [`coupling`]: homogenized stress and the analytic sensitivity chain
//!   producing the macroscale consistent tangent
//! * [`multiscale`]: the distributed lifecycle: RVE-type catalogs,
//!   communication patterns, and the per-macro-iteration solve loop
//! * [`base`]: configuration, shared enums, and sample networks for tests

/// Defines a type alias for the error type as a static string
pub type StrError = &'static str;

pub mod base;
pub mod coupling;
pub mod fem;
pub mod multiscale;
pub mod network;
