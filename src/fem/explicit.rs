use super::TrussIntegrator;
use crate::base::{DeformationGradient, ExplicitConfig};
use crate::network::{FiberNetwork, Rve};
use crate::StrError;
use russell_lab::Vector;

/// Implements the explicit (dynamic relaxation) analysis of one fiber RVE
///
/// Instead of iterating Newton, the network is time-marched with lumped
/// nodal masses and mass-proportional viscous damping while the boundary
/// displacement is ramped in by the configured amplitude profile. The state
/// counts as relaxed when, after the ramp, the kinetic energy has decayed
/// below a fraction of its running peak. This variant trades speed for
/// robustness on networks whose tangent is prone to instability (buckled
/// fibers, long compressive chains).
pub struct ExplicitRveAnalysis {
    /// The fiber network being relaxed (displacements live here)
    pub network: FiberNetwork,

    /// The geometric RVE cube defining the boundary
    pub rve: Rve,

    /// Solver tunables
    pub config: ExplicitConfig,

    /// Time steps spent by the last `run`
    pub steps: usize,

    /// Lumped mass per DOF
    mass: Vector,

    /// Nodal velocities
    velocity: Vector,

    /// Internal force scratch
    f_int: Vector,

    /// Prescribed (boundary) DOF flags
    prescribed: Vec<bool>,

    /// Ids of the nodes on the RVE boundary
    boundary: Vec<usize>,

    /// Per-element assembly scratch
    integ: TrussIntegrator,
}

impl ExplicitRveAnalysis {
    /// Allocates a new instance and lumps the nodal masses
    ///
    /// Each fiber contributes half of its mass `ρ A l0` to each endpoint;
    /// every free (interior) node must end up with a strictly positive mass.
    pub fn new(network: FiberNetwork, rve: Rve, config: ExplicitConfig) -> Result<Self, StrError> {
        if let Some(msg) = config.validate() {
            log::error!("invalid explicit configuration: {}", msg);
            return Err("cannot allocate analysis because of an invalid explicit configuration");
        }
        if network.ndim != rve.ndim {
            return Err("network and RVE dimensions must match");
        }
        let boundary = rve.all_boundary_nodes(&network);
        if boundary.is_empty() {
            return Err("the network has no nodes on the RVE boundary");
        }
        let ndim = network.ndim;
        let n_dof = network.n_dof();
        let mut prescribed = vec![false; n_dof];
        for &node in &boundary {
            for k in 0..ndim {
                prescribed[network.eq(node, k)] = true;
            }
        }
        let mut mass = Vector::new(n_dof);
        for element in &network.elements {
            let area = network.reactions[element.reaction].area();
            let half = 0.5 * config.fiber_density * area * element.length0;
            for &node in &element.nodes {
                for k in 0..ndim {
                    mass[network.eq(node, k)] += half;
                }
            }
        }
        for eq in 0..n_dof {
            if !prescribed[eq] && mass[eq] <= 0.0 {
                return Err("every interior node must be connected to at least one fiber");
            }
        }
        Ok(ExplicitRveAnalysis {
            network,
            rve,
            config,
            steps: 0,
            mass,
            velocity: Vector::new(n_dof),
            f_int: Vector::new(n_dof),
            prescribed,
            boundary,
            integ: TrussIntegrator::new(ndim),
        })
    }

    /// Estimates the stable time step from the stiffest fiber
    ///
    /// Uses `dt = min √(m/k)` over the elements with the rest-state axial
    /// stiffness, scaled by the configured safety factor.
    pub fn critical_time_step(&self) -> f64 {
        let ndim = self.network.ndim;
        let mut dt = f64::MAX;
        for element in &self.network.elements {
            let reaction = &self.network.reactions[element.reaction];
            let (_, stiffness) = reaction.force(element.length0, element.length0);
            let m = self.mass[self.network.eq(element.nodes[0], 0)];
            let m = f64::min(m, self.mass[self.network.eq(element.nodes[1], ndim - 1)]);
            if stiffness > 0.0 {
                dt = f64::min(dt, f64::sqrt(m / stiffness));
            }
        }
        self.config.crit_time_scale_factor * dt
    }

    /// Returns the kinetic energy of the free DOFs
    pub fn kinetic_energy(&self) -> f64 {
        let mut ke = 0.0;
        for eq in 0..self.network.n_dof() {
            if !self.prescribed[eq] {
                ke += 0.5 * self.mass[eq] * self.velocity[eq] * self.velocity[eq];
            }
        }
        ke
    }

    /// Time-marches the network under the ramped boundary displacement
    ///
    /// Fails if a fiber collapses during marching or if the kinetic energy
    /// has not decayed below the configured fraction of its running peak by
    /// the end of the total time.
    pub fn run(&mut self, dg: &DeformationGradient) -> Result<(), StrError> {
        let ndim = self.network.ndim;
        if dg.ndim() != ndim {
            return Err("deformation gradient dimension must match the network");
        }
        let dt = self.critical_time_step();
        let alpha = self.config.visc_damp_coeff;
        let mut ub = [0.0; 3];
        let mut t = 0.0;
        let mut ke_peak = 0.0;
        self.steps = 0;
        self.velocity.fill(0.0);
        while t < self.config.total_time {
            t += dt;
            self.steps += 1;

            // drive the boundary with the amplitude ramp
            let scale = self.config.amplitude.value(t, self.config.load_time);
            for &node in &self.boundary {
                let coords = self.network.nodes[node].coords;
                dg.displacement(scale, &coords[..ndim], &mut ub[..ndim]);
                for k in 0..ndim {
                    let eq = self.network.eq(node, k);
                    self.network.u[eq] = ub[k];
                }
            }

            // damped semi-implicit update of the interior nodes
            self.f_int.fill(0.0);
            self.integ.assemble_f_int(&mut self.f_int, &self.network, &self.prescribed)?;
            for eq in 0..self.network.n_dof() {
                if !self.prescribed[eq] {
                    let accel = -self.f_int[eq] / self.mass[eq];
                    self.velocity[eq] = (self.velocity[eq] + dt * accel) / (1.0 + alpha * dt);
                    self.network.u[eq] += dt * self.velocity[eq];
                }
            }

            let ke = self.kinetic_energy();
            ke_peak = f64::max(ke_peak, ke);
            if self.config.print_history_frequency > 0 && self.steps % self.config.print_history_frequency == 0 {
                log::debug!("t = {:>10.4}: scale = {:.4}, kinetic energy = {:.6e}", t, scale, ke);
            }
            if t >= self.config.load_time && (ke_peak == 0.0 || ke <= self.config.energy_check_eps * ke_peak) {
                log::debug!("relaxed after {} steps (kinetic energy = {:.6e})", self.steps, ke);
                return Ok(());
            }
        }
        Err("explicit relaxation did not dissipate the kinetic energy in time")
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::ExplicitRveAnalysis;
    use crate::base::{DeformationGradient, ExplicitConfig, SampleNetworks};
    use crate::network::Rve;
    use russell_lab::{approx_eq, vec_norm, Norm, Vector};

    #[test]
    fn new_captures_errors() {
        let fnet = SampleNetworks::planar_cross_2d();
        let mut bad = ExplicitConfig::new();
        bad.fiber_density = 0.0;
        assert_eq!(
            ExplicitRveAnalysis::new(fnet.clone_network(), Rve::new(2), bad).err(),
            Some("cannot allocate analysis because of an invalid explicit configuration")
        );
        assert_eq!(
            ExplicitRveAnalysis::new(fnet, Rve::new(3), ExplicitConfig::new()).err(),
            Some("network and RVE dimensions must match")
        );
    }

    #[test]
    fn critical_time_step_is_positive() {
        let fnet = SampleNetworks::asymmetric_2d();
        let analysis = ExplicitRveAnalysis::new(fnet, Rve::new(2), ExplicitConfig::new()).unwrap();
        let dt = analysis.critical_time_step();
        assert!(dt > 0.0 && dt < 1.0);
    }

    #[test]
    fn fully_prescribed_network_relaxes_immediately_after_the_ramp() {
        // both nodes of the single fiber lie on the boundary, so the kinetic
        // energy stays zero and the run ends right after the load time
        let fnet = SampleNetworks::single_fiber_x();
        let mut analysis = ExplicitRveAnalysis::new(fnet, Rve::new(3), ExplicitConfig::new()).unwrap();
        let dg = DeformationGradient::from_flat(&[1.1, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]).unwrap();
        analysis.run(&dg).unwrap();
        // full affine displacement on the boundary
        approx_eq(analysis.network.u[analysis.network.eq(1, 0)], 0.05, 1e-14);
        approx_eq(analysis.network.u[analysis.network.eq(0, 0)], -0.05, 1e-14);
    }

    #[test]
    fn interior_node_relaxes_to_equilibrium() {
        let fnet = SampleNetworks::asymmetric_2d();
        let mut config = ExplicitConfig::new();
        config.total_time = 60.0;
        config.load_time = 5.0;
        config.visc_damp_coeff = 2.0;
        let mut analysis = ExplicitRveAnalysis::new(fnet, Rve::new(2), config).unwrap();
        let dg = DeformationGradient::from_flat(&[1.05, 0.0, 0.0, 1.0]).unwrap();
        analysis.run(&dg).unwrap();
        assert!(analysis.steps > 10);
        // the interior node ends close to static equilibrium
        let mut residual = Vector::new(analysis.network.n_dof());
        let prescribed: Vec<bool> = (0..analysis.network.n_dof())
            .map(|eq| eq >= 2) // node 0 is the only interior node
            .collect();
        let mut integ = crate::fem::TrussIntegrator::new(2);
        integ.assemble_f_int(&mut residual, &analysis.network, &prescribed).unwrap();
        assert!(vec_norm(&residual, Norm::Euc) < 5e-3);
    }
}
