use super::{
    data_tag, result_tag, CommPattern, CouplingContext, CouplingUpdate, MacroCommand, MicroResult, Rank,
    RveAssignment, RveLibrary, TAG_CATALOG, TAG_CONTROL, TAG_PATTERN, TAG_UPDATE,
};
use super::MicroData;
use crate::base::{DeformationGradient, SolverConfig};
use crate::coupling::{
    calc_dstress_dx_fn, calc_dstress_dx_rve, calc_dx_fn_dx_rve, calc_stress, stress_engineering, MacroInfo,
};
use crate::fem::{BufferArena, ExplicitRveAnalysis, FiberRveAnalysis, RveAnalysis};
use crate::network::Rve;
use crate::StrError;
use russell_lab::Matrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;

/// Holds one resident RVE: the analysis plus its macro attachment
pub struct RveInstance {
    /// Macro integration point id
    pub ip_id: usize,

    /// Rank sending this point's deformation data
    pub macro_rank: Rank,

    /// Macro element data at the host integration point
    pub macro_info: MacroInfo,

    /// The RVE equilibrium analysis (implicit or explicit)
    pub analysis: RveAnalysis,
}

/// Computes the (6 × n_corner_dof) stress sensitivity at the current state
fn tangent_block(analysis: &mut FiberRveAnalysis) -> Result<Matrix, StrError> {
    let dstress_dx_fn = calc_dstress_dx_fn(&analysis.network, &analysis.rve)?;
    let dx_fn_dx_rve = calc_dx_fn_dx_rve(analysis)?;
    calc_dstress_dx_rve(&dstress_dx_fn, &dx_fn_dx_rve)
}

/// Owns one micro rank's resident RVE analyses and runs the coupled lifecycle
///
/// The protocol per macro step: receive the migration deltas
/// (`update_coupling`), then repeat the data-exchange/solve/result iteration
/// until the macroscale signals step completion; the outer loop ends when
/// the macroscale signals simulation completion. Any resident RVE failure
/// aborts the whole job with logged context, because the macroscale tangent
/// assembly has no substitute for a missing result.
pub struct MultiscaleRveAnalysis {
    /// This rank's view of the distributed run
    pub context: CouplingContext,

    /// The template library loaded at startup
    pub library: RveLibrary,

    /// The reconciled address map of the data exchange
    pub pattern: CommPattern,

    /// Resident RVE instances in assignment order
    pub instances: Vec<RveInstance>,

    /// Iterations completed within the current macro step
    pub macro_iter: usize,

    /// Completed macro steps
    pub macro_step: usize,

    /// Shared linear-algebra buffers (sized once from the library)
    arena: BufferArena,

    /// Seeded generator for the template selection
    rng: StdRng,
}

impl MultiscaleRveAnalysis {
    /// Allocates a new instance and sizes the shared buffers
    ///
    /// The seed makes the random template selection reproducible across
    /// re-runs of the same job.
    pub fn new(context: CouplingContext, library: RveLibrary, seed: u64) -> Result<Self, StrError> {
        if context.is_macro() {
            return Err("the multiscale RVE analysis runs on micro ranks only");
        }
        let arena = library.build_arena()?;
        Ok(MultiscaleRveAnalysis {
            context,
            library,
            pattern: CommPattern::new("rve_exchange"),
            instances: Vec::new(),
            macro_iter: 0,
            macro_step: 0,
            arena,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Performs the catalog handshake
    ///
    /// Sends this rank's type catalog to every macro rank, then polls for
    /// each macro rank's pattern shard (arrival order across peers is
    /// non-deterministic) and merges them into the exchange pattern.
    pub fn init(&mut self) -> Result<(), StrError> {
        let catalog = self.library.catalog();
        for &mac in &self.context.macro_ranks {
            self.context.send(mac, TAG_CATALOG, &catalog)?;
        }
        for idx in 0..self.context.macro_ranks.len() {
            let mac = self.context.macro_ranks[idx];
            let shard: CommPattern = self.context.poll_recv(mac, TAG_PATTERN)?;
            self.pattern.merge(&shard)?;
        }
        log::debug!(
            "rank {}: handshake complete ({} pre-routed points)",
            self.context.rank,
            self.pattern.len()
        );
        Ok(())
    }

    /// Receives and applies the migration deltas of one macro step
    pub fn update_coupling(&mut self) -> Result<(), StrError> {
        for idx in 0..self.context.macro_ranks.len() {
            let mac = self.context.macro_ranks[idx];
            let update: CouplingUpdate = self.context.recv(mac, TAG_UPDATE)?;
            if !update.remove.is_empty() {
                self.pattern.remove_data(&update.remove)?;
                self.instances.retain(|inst| !update.remove.contains(&inst.ip_id));
            }
            for assignment in update.add {
                self.add_instance(mac, assignment)?;
            }
        }
        log::info!(
            target: "rve_weights",
            "rank {} step {}: {} resident rves",
            self.context.rank,
            self.macro_step,
            self.instances.len()
        );
        Ok(())
    }

    /// Instantiates one newly assigned RVE
    ///
    /// Clones a randomly selected template of the requested type; using the
    /// seeded generator keeps the selection uncorrelated between neighboring
    /// integration points yet reproducible across runs.
    fn add_instance(&mut self, macro_rank: Rank, assignment: RveAssignment) -> Result<(), StrError> {
        let type_index = self.library.type_index(&assignment.header.rve_type)?;
        let pick = self.rng.gen_range(0..self.library.n_templates(type_index));
        let network = self.library.template(type_index, pick).to_network()?;
        if network.ndim != assignment.header.ndim {
            log::error!(
                "rank {}: type {:?} is {}D but integration point {} expects {}D",
                self.context.rank,
                assignment.header.rve_type,
                network.ndim,
                assignment.header.ip_id,
                assignment.header.ndim
            );
            return Err("the RVE template dimension does not match the assignment");
        }
        let ndim = network.ndim;
        let rve = Rve::new(ndim);
        let analysis = match assignment.params.explicit {
            Some(config) => RveAnalysis::Explicit(ExplicitRveAnalysis::new(network, rve, config)?),
            None => RveAnalysis::Implicit(FiberRveAnalysis::new(
                network,
                rve,
                assignment.params.solver,
                self.arena.checkout(),
            )?),
        };
        let macro_info = MacroInfo::new(
            assignment.header.ip_id,
            ndim,
            assignment.init.shape,
            assignment.init.grad,
            assignment.init.gauss_coord,
            assignment.init.scale,
        )?;
        self.pattern.add_data(assignment.header.ip_id, macro_rank, self.context.rank)?;
        log::debug!(
            "rank {}: integration point {} gets template {} of type {:?}",
            self.context.rank,
            assignment.header.ip_id,
            pick,
            assignment.header.rve_type
        );
        self.instances.push(RveInstance {
            ip_id: assignment.header.ip_id,
            macro_rank,
            macro_info,
            analysis,
        });
        Ok(())
    }

    /// Runs one data-exchange/solve/result iteration
    ///
    /// Receives one deformation gradient per resident RVE, solves them all,
    /// and only then sends the results back along the inverted pattern.
    pub fn step_iteration(&mut self) -> Result<(), StrError> {
        let timer = Instant::now();
        let mut results: Vec<(Rank, MicroResult)> = Vec::with_capacity(self.instances.len());
        let mut total_iterations = 0;
        for i in 0..self.instances.len() {
            let (macro_rank, ip_id) = (self.instances[i].macro_rank, self.instances[i].ip_id);
            let data: MicroData = self.context.recv(macro_rank, &data_tag(ip_id))?;
            let dg = DeformationGradient::from_flat(&data.dg)?;
            let arena_handle = self.arena.checkout();
            let inst = &mut self.instances[i];
            let stats = match inst.analysis.run(&dg) {
                Ok(stats) => stats,
                Err(msg) => {
                    log::error!(
                        "rank {}: rve at integration point {} failed: {} (F = {:?})",
                        self.context.rank,
                        ip_id,
                        msg,
                        data.dg
                    );
                    return Err(msg);
                }
            };
            total_iterations += stats.iterations;
            let stress = calc_stress(inst.analysis.network(), inst.analysis.rve())?;
            let dstress_drve = match &mut inst.analysis {
                RveAnalysis::Implicit(analysis) => tangent_block(analysis)?,
                RveAnalysis::Explicit(analysis) => {
                    // the relaxed state carries no tangent of its own; assemble
                    // the equilibrium tangent there with the implicit machinery
                    let mut tangent = FiberRveAnalysis::new(
                        analysis.network.clone_network(),
                        analysis.rve,
                        SolverConfig::new(),
                        arena_handle,
                    )?;
                    tangent.apply_rve_bc(&dg, 1.0)?;
                    tangent_block(&mut tangent)?
                }
            };
            let mut flat = Vec::with_capacity(dstress_drve.nrow() * dstress_drve.ncol());
            for r in 0..dstress_drve.nrow() {
                for c in 0..dstress_drve.ncol() {
                    flat.push(dstress_drve.get(r, c));
                }
            }
            results.push((
                macro_rank,
                MicroResult {
                    ip_id,
                    stress: stress_engineering(&stress),
                    dstress_drve: flat,
                    iterations: stats.iterations,
                },
            ));
        }
        // every resident RVE has run; now the results may go out
        for (macro_rank, result) in &results {
            self.context.send(*macro_rank, &result_tag(result.ip_id), result)?;
        }
        self.macro_iter += 1;
        log::info!(
            target: "rve_efficiency",
            "rank {} iter {}: {} rves, {} newton iterations",
            self.context.rank,
            self.macro_iter,
            self.instances.len(),
            total_iterations
        );
        log::info!(
            target: "rve_timing",
            "rank {} iter {}: {} rves solved in {:?}",
            self.context.rank,
            self.macro_iter,
            self.instances.len(),
            timer.elapsed()
        );
        Ok(())
    }

    /// Runs the full lifecycle until the macroscale signals completion
    pub fn run(&mut self) -> Result<(), StrError> {
        self.init()?;
        let mac0 = self.context.macro_ranks[0];
        loop {
            let command: MacroCommand = self.context.recv(mac0, TAG_CONTROL)?;
            match command {
                MacroCommand::UpdateCoupling => self.update_coupling()?,
                MacroCommand::Iterate => self.step_iteration()?,
                MacroCommand::StepComplete => {
                    self.macro_step += 1;
                    self.macro_iter = 0;
                    log::info!(
                        target: "rve_timing",
                        "rank {}: macro step {} complete",
                        self.context.rank,
                        self.macro_step
                    );
                }
                MacroCommand::SimComplete => {
                    log::debug!("rank {}: simulation complete after {} macro steps", self.context.rank, self.macro_step);
                    return Ok(());
                }
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::MultiscaleRveAnalysis;
    use crate::base::{ExplicitConfig, SampleNetworks, SolverConfig};
    use crate::multiscale::{
        data_tag, result_tag, CommPattern, CouplingContext, CouplingUpdate, LocalExchange, MacroCommand, MicroData,
        MicroHeader, MicroInit, MicroParams, MicroResult, RveAssignment, RveCatalog, RveLibrary, TAG_CATALOG,
        TAG_CONTROL, TAG_PATTERN, TAG_UPDATE,
    };
    use crate::network::NetworkTemplate;
    use std::sync::Arc;

    fn sample_library() -> RveLibrary {
        let mut library = RveLibrary::new();
        library
            .register(
                "cross",
                vec![
                    NetworkTemplate::from_network(&SampleNetworks::asymmetric_2d()),
                    NetworkTemplate::from_network(&SampleNetworks::planar_cross_2d()),
                ],
            )
            .unwrap();
        library
    }

    fn sample_assignment(ip_id: usize) -> RveAssignment {
        RveAssignment {
            header: MicroHeader {
                rve_type: "cross".to_string(),
                ndim: 2,
                ip_id,
            },
            params: MicroParams {
                solver: SolverConfig::new(),
                explicit: None,
            },
            init: MicroInit {
                shape: vec![0.25; 4],
                grad: vec![-0.5, -0.5, 0.5, -0.5, 0.5, 0.5, -0.5, 0.5],
                gauss_coord: [0.0; 3],
                scale: 0.01,
            },
        }
    }

    #[test]
    fn new_rejects_macro_ranks() {
        let world = Arc::new(LocalExchange::new(2).unwrap());
        let context = CouplingContext::new(0, vec![0], vec![1], world).unwrap();
        assert_eq!(
            MultiscaleRveAnalysis::new(context, sample_library(), 1).err(),
            Some("the multiscale RVE analysis runs on micro ranks only")
        );
    }

    #[test]
    fn two_rank_protocol_loop_works() {
        let world = Arc::new(LocalExchange::new(2).unwrap());
        let macro_side = CouplingContext::new(0, vec![0], vec![1], world.clone()).unwrap();
        let micro_context = CouplingContext::new(1, vec![0], vec![1], world).unwrap();

        // the macro rank scripts the whole run up front (the in-memory world
        // is cooperative, so all messages are delivered before `run` starts)
        macro_side.send(1, TAG_PATTERN, &CommPattern::new("rve_exchange")).unwrap();
        macro_side
            .send(
                1,
                TAG_CONTROL,
                &MacroCommand::UpdateCoupling,
            )
            .unwrap();
        macro_side
            .send(
                1,
                TAG_UPDATE,
                &CouplingUpdate {
                    remove: vec![],
                    add: vec![sample_assignment(7), sample_assignment(8)],
                },
            )
            .unwrap();
        macro_side.send(1, TAG_CONTROL, &MacroCommand::Iterate).unwrap();
        let stretch = MicroData {
            ip_id: 7,
            dg: vec![1.02, 0.0, 0.0, 1.0],
        };
        macro_side.send(1, &data_tag(7), &stretch).unwrap();
        let stretch = MicroData {
            ip_id: 8,
            dg: vec![1.0, 0.01, 0.0, 1.0],
        };
        macro_side.send(1, &data_tag(8), &stretch).unwrap();
        macro_side.send(1, TAG_CONTROL, &MacroCommand::StepComplete).unwrap();
        // second macro step: integration point 8 migrates away
        macro_side.send(1, TAG_CONTROL, &MacroCommand::UpdateCoupling).unwrap();
        macro_side
            .send(
                1,
                TAG_UPDATE,
                &CouplingUpdate {
                    remove: vec![8],
                    add: vec![],
                },
            )
            .unwrap();
        macro_side.send(1, TAG_CONTROL, &MacroCommand::SimComplete).unwrap();

        let mut micro = MultiscaleRveAnalysis::new(micro_context, sample_library(), 1234).unwrap();
        micro.run().unwrap();

        // the handshake delivered the catalog
        let catalog: RveCatalog = macro_side.recv(1, TAG_CATALOG).unwrap();
        assert_eq!(catalog.types, vec![("cross".to_string(), 2)]);

        // one result per resident instance, sent after all solves
        let result: MicroResult = macro_side.recv(1, &result_tag(7)).unwrap();
        assert_eq!(result.ip_id, 7);
        assert!(result.stress[0] > 0.0); // xx tension under x stretch
        assert_eq!(result.dstress_drve.len(), 6 * 8); // 6 components × 4 corners × 2
        let result: MicroResult = macro_side.recv(1, &result_tag(8)).unwrap();
        assert_eq!(result.ip_id, 8);

        // lifecycle bookkeeping
        assert_eq!(micro.macro_step, 1);
        assert_eq!(micro.macro_iter, 0);
        assert_eq!(micro.instances.len(), 1);
        assert_eq!(micro.instances[0].ip_id, 7);
        assert_eq!(micro.pattern.reconcile(1), vec![(7, 0)]);
    }

    #[test]
    fn explicit_assignment_solves_through_the_lifecycle() {
        let world = Arc::new(LocalExchange::new(2).unwrap());
        let macro_side = CouplingContext::new(0, vec![0], vec![1], world.clone()).unwrap();
        let micro_context = CouplingContext::new(1, vec![0], vec![1], world).unwrap();

        // a single-template library keeps the solve deterministic
        let mut library = RveLibrary::new();
        library
            .register(
                "soft",
                vec![NetworkTemplate::from_network(&SampleNetworks::asymmetric_2d())],
            )
            .unwrap();

        let mut assignment = sample_assignment(3);
        assignment.header.rve_type = "soft".to_string();
        let mut explicit = ExplicitConfig::new();
        explicit.total_time = 60.0;
        explicit.load_time = 5.0;
        explicit.visc_damp_coeff = 2.0;
        assignment.params.explicit = Some(explicit);

        macro_side
            .send(
                1,
                TAG_UPDATE,
                &CouplingUpdate {
                    remove: vec![],
                    add: vec![assignment],
                },
            )
            .unwrap();
        let stretch = MicroData {
            ip_id: 3,
            dg: vec![1.05, 0.0, 0.0, 1.0],
        };
        macro_side.send(1, &data_tag(3), &stretch).unwrap();

        let mut micro = MultiscaleRveAnalysis::new(micro_context, library, 7).unwrap();
        micro.update_coupling().unwrap();
        micro.step_iteration().unwrap();

        // the relaxed RVE still reports stress and a full tangent block
        let result: MicroResult = macro_side.recv(1, &result_tag(3)).unwrap();
        assert_eq!(result.ip_id, 3);
        assert!(result.stress[0] > 0.0);
        assert_eq!(result.dstress_drve.len(), 6 * 8);
        assert_eq!(result.iterations, 0); // dynamic relaxation spends no Newton iterations
    }

    #[test]
    fn unknown_type_aborts() {
        let world = Arc::new(LocalExchange::new(2).unwrap());
        let macro_side = CouplingContext::new(0, vec![0], vec![1], world.clone()).unwrap();
        let micro_context = CouplingContext::new(1, vec![0], vec![1], world).unwrap();
        let mut assignment = sample_assignment(1);
        assignment.header.rve_type = "nope".to_string();
        macro_side
            .send(
                1,
                TAG_UPDATE,
                &CouplingUpdate {
                    remove: vec![],
                    add: vec![assignment],
                },
            )
            .unwrap();
        let mut micro = MultiscaleRveAnalysis::new(micro_context, sample_library(), 9).unwrap();
        assert_eq!(micro.update_coupling().err(), Some("unknown RVE type"));
    }

    #[test]
    fn template_selection_is_reproducible() {
        // the periodic-pair count distinguishes the two sample templates
        let picks_of_run = || {
            let world = Arc::new(LocalExchange::new(2).unwrap());
            let macro_side = CouplingContext::new(0, vec![0], vec![1], world.clone()).unwrap();
            let micro_context = CouplingContext::new(1, vec![0], vec![1], world).unwrap();
            macro_side
                .send(
                    1,
                    TAG_UPDATE,
                    &CouplingUpdate {
                        remove: vec![],
                        add: (0..6).map(sample_assignment).collect(),
                    },
                )
                .unwrap();
            let mut micro = MultiscaleRveAnalysis::new(micro_context, sample_library(), 42).unwrap();
            micro.update_coupling().unwrap();
            let picks: Vec<usize> = micro.instances.iter().map(|i| i.analysis.network().pbc.len()).collect();
            picks
        };
        let first = picks_of_run();
        let second = picks_of_run();
        assert_eq!(first.len(), 6);
        assert_eq!(first, second);
    }
}
