use crate::base::{ExplicitConfig, SolverConfig};
use crate::coupling::N_STRESS_COMP;
use serde::{Deserialize, Serialize};

/// Tag of the RVE-type catalog messages (micro → macro handshake)
pub const TAG_CATALOG: &str = "catalog";

/// Tag of the communication-pattern messages (macro → micro handshake)
pub const TAG_PATTERN: &str = "pattern";

/// Tag of the lifecycle control commands (macro → micro)
pub const TAG_CONTROL: &str = "control";

/// Tag of the coupling-update messages (macro → micro, once per macro step)
pub const TAG_UPDATE: &str = "coupling_update";

/// Returns the tag of the per-integration-point deformation payload
pub fn data_tag(ip_id: usize) -> String {
    format!("data:{}", ip_id)
}

/// Returns the tag of the per-integration-point result payload
pub fn result_tag(ip_id: usize) -> String {
    format!("result:{}", ip_id)
}

/// Identifies one RVE assignment on the wire
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MicroHeader {
    /// RVE type name (must exist in every rank's library)
    pub rve_type: String,

    /// Space dimension of the macro problem at this point
    pub ndim: usize,

    /// Macro integration point id
    pub ip_id: usize,
}

/// Carries the solver parameter block of one assignment
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MicroParams {
    /// Implicit solver tunables for this RVE
    pub solver: SolverConfig,

    /// Selects the explicit (dynamic relaxation) solver when present
    pub explicit: Option<ExplicitConfig>,
}

/// Carries the macro element data of one assignment
///
/// Shipped once per assignment; the macro mesh topology does not change
/// between coupling updates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MicroInit {
    /// Macro shape functions at the integration point
    pub shape: Vec<f64>,

    /// Macro shape gradients at the integration point (nnd × ndim, row-major)
    pub grad: Vec<f64>,

    /// Integration point coordinates
    pub gauss_coord: [f64; 3],

    /// RVE-to-macro length scale ratio
    pub scale: f64,
}

/// Carries the per-iteration deformation gradient (row-major, 4 or 9 values)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MicroData {
    /// Macro integration point id
    pub ip_id: usize,

    /// Flattened row-major deformation gradient
    pub dg: Vec<f64>,
}

/// Carries the homogenized result of one converged RVE solve
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MicroResult {
    /// Macro integration point id
    pub ip_id: usize,

    /// Engineering-ordered stress components (xx, yy, zz, xy, yz, zx)
    pub stress: [f64; N_STRESS_COMP],

    /// Flattened (6 × n_corner_dof) stress sensitivity to corner motion
    ///
    /// The macro side composes this with its own `calc_drve_dfe` map to
    /// obtain the consistent tangent contribution.
    pub dstress_drve: Vec<f64>,

    /// Newton iterations spent (efficiency accounting)
    pub iterations: usize,
}

/// Describes the RVE types a rank can instantiate (handshake payload)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RveCatalog {
    /// (type name, number of loaded templates) per type
    pub types: Vec<(String, usize)>,
}

/// Bundles the assignment data of one new integration point
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RveAssignment {
    /// Identity of the assignment
    pub header: MicroHeader,

    /// Solver parameter block
    pub params: MicroParams,

    /// Macro element data
    pub init: MicroInit,
}

/// Carries the migration deltas of one macro step (macro → micro)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CouplingUpdate {
    /// Integration points this rank no longer owns
    pub remove: Vec<usize>,

    /// Newly assigned integration points
    pub add: Vec<RveAssignment>,
}

/// Lifecycle commands driving the micro ranks (macro → micro)
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum MacroCommand {
    /// Receive a coupling update and apply the migration deltas
    UpdateCoupling,

    /// Run one data-exchange/solve/result iteration
    Iterate,

    /// The macro step converged; advance the step counter
    StepComplete,

    /// The whole simulation finished; shut down cleanly
    SimComplete,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
