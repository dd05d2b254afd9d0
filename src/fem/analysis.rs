use super::{ExplicitRveAnalysis, FiberRveAnalysis};
use crate::base::DeformationGradient;
use crate::network::{FiberNetwork, Rve};
use crate::StrError;

/// Holds the effort counters of one completed RVE solve
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RveStats {
    /// Newton iterations (implicit solver only)
    pub iterations: usize,

    /// Load cut-backs (implicit solver only)
    pub cut_backs: usize,

    /// Time steps (explicit solver only)
    pub steps: usize,
}

/// Unifies the implicit and explicit RVE solvers behind one interface
///
/// The multiscale layer picks the variant per RVE type and then treats all
/// resident analyses uniformly: apply a deformation gradient, solve, read
/// the relaxed network back.
pub enum RveAnalysis {
    /// Newton iteration with load cut-backs
    Implicit(FiberRveAnalysis),

    /// Dynamic relaxation
    Explicit(ExplicitRveAnalysis),
}

impl RveAnalysis {
    /// Solves the RVE under the given deformation gradient
    pub fn run(&mut self, dg: &DeformationGradient) -> Result<RveStats, StrError> {
        match self {
            RveAnalysis::Implicit(a) => {
                a.run(dg)?;
                Ok(RveStats {
                    iterations: a.iterations,
                    cut_backs: a.cut_backs,
                    steps: 0,
                })
            }
            RveAnalysis::Explicit(a) => {
                a.run(dg)?;
                Ok(RveStats {
                    iterations: 0,
                    cut_backs: 0,
                    steps: a.steps,
                })
            }
        }
    }

    /// Returns the fiber network
    pub fn network(&self) -> &FiberNetwork {
        match self {
            RveAnalysis::Implicit(a) => &a.network,
            RveAnalysis::Explicit(a) => &a.network,
        }
    }

    /// Returns the fiber network, mutably
    pub fn network_mut(&mut self) -> &mut FiberNetwork {
        match self {
            RveAnalysis::Implicit(a) => &mut a.network,
            RveAnalysis::Explicit(a) => &mut a.network,
        }
    }

    /// Returns the RVE cube
    pub fn rve(&self) -> &Rve {
        match self {
            RveAnalysis::Implicit(a) => &a.rve,
            RveAnalysis::Explicit(a) => &a.rve,
        }
    }

    /// Returns the implicit analysis, or an error for the explicit variant
    ///
    /// The coupling derivatives need the equilibrium tangent, which only the
    /// implicit solver assembles.
    pub fn implicit_mut(&mut self) -> Result<&mut FiberRveAnalysis, StrError> {
        match self {
            RveAnalysis::Implicit(a) => Ok(a),
            RveAnalysis::Explicit(_) => Err("coupling derivatives require the implicit solver"),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{RveAnalysis, RveStats};
    use crate::base::{DeformationGradient, ExplicitConfig, SampleNetworks, SolverConfig};
    use crate::fem::{nnz_sup_truss, BufferArena, ExplicitRveAnalysis, FiberRveAnalysis};
    use crate::network::Rve;

    #[test]
    fn dispatch_works() {
        let fnet = SampleNetworks::asymmetric_2d();
        let arena = BufferArena::new(fnet.n_dof(), nnz_sup_truss(fnet.n_elements(), 2, fnet.n_dof())).unwrap();
        let implicit = FiberRveAnalysis::new(fnet, Rve::new(2), SolverConfig::new(), arena.checkout()).unwrap();
        let mut analysis = RveAnalysis::Implicit(implicit);
        let dg = DeformationGradient::from_flat(&[1.02, 0.0, 0.0, 1.0]).unwrap();
        let stats = analysis.run(&dg).unwrap();
        assert!(stats.iterations >= 1);
        assert_eq!(stats.steps, 0);
        assert_eq!(analysis.network().ndim, 2);
        assert_eq!(analysis.rve().ndim, 2);
        analysis.implicit_mut().unwrap();

        let explicit =
            ExplicitRveAnalysis::new(SampleNetworks::single_fiber_x(), Rve::new(3), ExplicitConfig::new()).unwrap();
        let mut analysis = RveAnalysis::Explicit(explicit);
        let dg = DeformationGradient::identity(3).unwrap();
        let stats = analysis.run(&dg).unwrap();
        assert!(stats.steps > 0);
        assert_eq!(stats.iterations, 0);
        assert_eq!(
            analysis.implicit_mut().err(),
            Some("coupling derivatives require the implicit solver")
        );
        assert_eq!(RveStats::default().cut_backs, 0);
    }
}
