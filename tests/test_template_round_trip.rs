use ftsim::base::{DeformationGradient, SampleNetworks, SolverConfig};
use ftsim::coupling::{calc_stress, stress_engineering};
use ftsim::fem::{nnz_sup_truss, BufferArena, FiberRveAnalysis};
use ftsim::network::{NetworkTemplate, Rve};
use ftsim::StrError;
use russell_lab::approx_eq;

fn solve_stress(network: ftsim::network::FiberNetwork) -> Result<[f64; 6], StrError> {
    let ndim = network.ndim;
    let arena = BufferArena::new(
        network.n_dof(),
        nnz_sup_truss(network.n_elements(), ndim, network.n_dof()),
    )?;
    let mut analysis = FiberRveAnalysis::new(network, Rve::new(ndim), SolverConfig::new(), arena.checkout())?;
    #[rustfmt::skip]
    let dg = DeformationGradient::from_flat(&[
        1.05, 0.02,
        0.00, 0.96,
    ])?;
    analysis.run(&dg)?;
    Ok(stress_engineering(&calc_stress(&analysis.network, &analysis.rve)?))
}

// A network written to disk and read back must be mechanically identical:
// the same deformation produces the same homogenized stress.
#[test]
fn test_template_round_trip_preserves_mechanics() -> Result<(), StrError> {
    let original = SampleNetworks::asymmetric_2d();
    let template = NetworkTemplate::from_network(&original);

    let path = "/tmp/ftsim/integ_template_round_trip.json";
    template.write_json(path)?;
    let read_back = NetworkTemplate::read_json(path)?;
    assert_eq!(read_back, template);

    let stress_a = solve_stress(original)?;
    let stress_b = solve_stress(read_back.to_network()?)?;
    for i in 0..6 {
        approx_eq(stress_a[i], stress_b[i], 1e-12);
    }
    Ok(())
}
