use ftsim::base::{SampleNetworks, SolverConfig};
use ftsim::multiscale::{
    data_tag, result_tag, CommPattern, CouplingContext, CouplingUpdate, LocalExchange, MacroCommand, MicroData,
    MicroHeader, MicroInit, MicroParams, MicroResult, MultiscaleRveAnalysis, RveAssignment, RveCatalog, RveLibrary,
    TAG_CATALOG, TAG_CONTROL, TAG_PATTERN, TAG_UPDATE,
};
use ftsim::network::NetworkTemplate;
use ftsim::StrError;
use std::sync::Arc;

fn library() -> Result<RveLibrary, StrError> {
    let mut library = RveLibrary::new();
    library.register(
        "cross",
        vec![
            NetworkTemplate::from_network(&SampleNetworks::asymmetric_2d()),
            NetworkTemplate::from_network(&SampleNetworks::planar_cross_2d()),
        ],
    )?;
    Ok(library)
}

fn assignment(ip_id: usize) -> RveAssignment {
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

// One macro rank drives two micro ranks through a full simulation: handshake,
// one coupled step with one data-exchange iteration, shutdown. The in-memory
// world is cooperative, so the macro side scripts all its messages first and
// the micro lifecycles consume them one rank at a time.
#[test]
fn test_two_micro_ranks_complete_a_simulation() -> Result<(), StrError> {
    let _ = env_logger::builder().is_test(true).try_init();
    let world = Arc::new(LocalExchange::new(3)?);
    let macro_ranks = vec![0];
    let micro_ranks = vec![1, 2];
    let macro_side = CouplingContext::new(0, macro_ranks.clone(), micro_ranks.clone(), world.clone())?;

    // script the run for both micro ranks
    for &micro in &micro_ranks {
        macro_side.send(micro, TAG_PATTERN, &CommPattern::new("rve_exchange"))?;
        macro_side.send(micro, TAG_CONTROL, &MacroCommand::UpdateCoupling)?;
    }
    // points 3 and 4 live on rank 1, point 5 on rank 2
    macro_side.send(
        1,
        TAG_UPDATE,
        &CouplingUpdate {
            remove: vec![],
            add: vec![assignment(3), assignment(4)],
        },
    )?;
    macro_side.send(
        2,
        TAG_UPDATE,
        &CouplingUpdate {
            remove: vec![],
            add: vec![assignment(5)],
        },
    )?;
    for &micro in &micro_ranks {
        macro_side.send(micro, TAG_CONTROL, &MacroCommand::Iterate)?;
    }
    macro_side.send(1, &data_tag(3), &MicroData { ip_id: 3, dg: vec![1.03, 0.0, 0.0, 1.0] })?;
    macro_side.send(1, &data_tag(4), &MicroData { ip_id: 4, dg: vec![1.0, 0.0, 0.0, 1.0] })?;
    macro_side.send(2, &data_tag(5), &MicroData { ip_id: 5, dg: vec![1.0, 0.02, 0.0, 1.0] })?;
    for &micro in &micro_ranks {
        macro_side.send(micro, TAG_CONTROL, &MacroCommand::StepComplete)?;
        macro_side.send(micro, TAG_CONTROL, &MacroCommand::SimComplete)?;
    }

    // run both micro lifecycles to completion
    let mut residents = Vec::new();
    for &micro in &micro_ranks {
        let context = CouplingContext::new(micro, macro_ranks.clone(), micro_ranks.clone(), world.clone())?;
        let mut analysis = MultiscaleRveAnalysis::new(context, library()?, 1234)?;
        analysis.run()?;
        assert_eq!(analysis.macro_step, 1);
        residents.push(analysis);
    }

    // both catalogs arrived during the handshake
    for &micro in &micro_ranks {
        let catalog: RveCatalog = macro_side.recv(micro, TAG_CATALOG)?;
        assert_eq!(catalog.types, vec![("cross".to_string(), 2)]);
    }

    // the stretched point carries xx tension, the undeformed one no stress,
    // and the sheared one a shear component
    let result: MicroResult = macro_side.recv(1, &result_tag(3))?;
    assert!(result.stress[0] > 0.0);
    assert_eq!(result.dstress_drve.len(), 6 * 8);
    let result: MicroResult = macro_side.recv(1, &result_tag(4))?;
    assert_eq!(result.iterations, 0);
    for comp in result.stress {
        assert!(f64::abs(comp) < 1e-12);
    }
    let result: MicroResult = macro_side.recv(2, &result_tag(5))?;
    assert!(f64::abs(result.stress[3]) > 0.0);

    // each rank routes only its own resident points
    assert_eq!(residents[0].pattern.reconcile(1), vec![(3, 0), (4, 0)]);
    assert_eq!(residents[1].pattern.reconcile(2), vec![(5, 0)]);
    Ok(())
}
