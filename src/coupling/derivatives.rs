use crate::fem::{FiberRveAnalysis, TrussIntegrator};
use crate::network::{FiberNetwork, Rve};
use crate::StrError;
use russell_lab::{Matrix, Vector};

/// Computes the sensitivity of the free-node residual to the corner motion
///
/// Returns a (n_dof × n_corner_dof) matrix whose column `c·ndim + j` holds
/// `∂R/∂x_rve` for a unit displacement of corner `c` in direction `j`. A
/// corner displacement moves every boundary node by its multilinear corner
/// weight; the residual responds through the tangent columns of the boundary
/// DOFs. Prescribed rows are zero.
pub fn calc_dr_dx_rve(network: &FiberNetwork, rve: &Rve, prescribed: &[bool]) -> Result<Matrix, StrError> {
    let ndim = network.ndim;
    let n_corners = rve.n_corners();
    let mut integ = TrussIntegrator::new(ndim);
    let mut weights = vec![0.0; n_corners];
    let mut result = Matrix::new(network.n_dof(), rve.n_corner_dof());
    for index in 0..network.n_elements() {
        let element = network.elements[index];
        integ.element_system(network, &element)?;
        let ke = integ.local_tangent();
        for jj in 0..2 {
            let col_node = element.nodes[jj];
            // only boundary (prescribed) endpoints transmit corner motion
            if !prescribed[network.eq(col_node, 0)] {
                continue;
            }
            rve.corner_weights(&network.nodes[col_node].coords[..ndim], &mut weights);
            for ii in 0..2 {
                for k in 0..ndim {
                    let row = network.eq(element.nodes[ii], k);
                    if prescribed[row] {
                        continue;
                    }
                    for j in 0..ndim {
                        let kke = ke.get(ii * ndim + k, jj * ndim + j);
                        for (c, &w) in weights.iter().enumerate() {
                            let col = c * ndim + j;
                            result.set(row, col, result.get(row, col) + kke * w);
                        }
                    }
                }
            }
        }
    }
    Ok(result)
}

/// Computes (and caches) the solve-phase sensitivity dx_fn/dx_rve
///
/// Returns a (n_dof × n_corner_dof) matrix: how every node position moves
/// when one RVE corner is displaced while the interior stays in equilibrium.
/// Boundary rows carry the corner weights directly; interior rows come from
/// one linear solve per corner DOF against the factorized equilibrium
/// tangent (identity rows at the boundary). The result is cached on the
/// analysis and invalidated whenever the network moves.
pub fn calc_dx_fn_dx_rve(analysis: &mut FiberRveAnalysis) -> Result<Matrix, StrError> {
    if let Some(cached) = analysis.cached_dx_fn_dx_rve() {
        return Ok(cached.clone());
    }
    let ndim = analysis.network.ndim;
    let n_dof = analysis.network.n_dof();
    let rve = analysis.rve;
    let n_corners = rve.n_corners();
    let neq_cap = analysis.buffer_capacity()?;
    let boundary = analysis.boundary_nodes().to_vec();

    analysis.assemble_and_factorize()?;

    let mut rhs = Vector::new(neq_cap);
    let mut x = Vector::new(neq_cap);
    let mut weights = vec![0.0; n_corners];
    let mut result = Matrix::new(n_dof, rve.n_corner_dof());
    for c in 0..n_corners {
        for j in 0..ndim {
            rhs.fill(0.0);
            for &node in &boundary {
                rve.corner_weights(&analysis.network.nodes[node].coords[..ndim], &mut weights);
                rhs[analysis.network.eq(node, j)] = weights[c];
            }
            analysis.solve_with_current_factors(&mut x, &rhs)?;
            let col = c * ndim + j;
            for eq in 0..n_dof {
                result.set(eq, col, x[eq]);
            }
        }
    }
    analysis.store_dx_fn_dx_rve(result.clone());
    Ok(result)
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{calc_dr_dx_rve, calc_dx_fn_dx_rve};
    use crate::base::{DeformationGradient, SampleNetworks, SolverConfig};
    use crate::fem::{nnz_sup_truss, BufferArena, FiberRveAnalysis, NewtonOutcome};
    use crate::network::Rve;
    use russell_lab::approx_eq;

    fn solved_analysis() -> FiberRveAnalysis {
        let fnet = SampleNetworks::asymmetric_2d();
        let arena = BufferArena::new(fnet.n_dof(), nnz_sup_truss(fnet.n_elements(), 2, fnet.n_dof())).unwrap();
        let mut analysis = FiberRveAnalysis::new(fnet, Rve::new(2), SolverConfig::new(), arena.checkout()).unwrap();
        let dg = DeformationGradient::from_flat(&[1.03, 0.01, 0.0, 0.98]).unwrap();
        analysis.run(&dg).unwrap();
        analysis
    }

    #[test]
    fn dx_fn_dx_rve_boundary_rows_are_corner_weights() {
        let mut analysis = solved_analysis();
        let dd = calc_dx_fn_dx_rve(&mut analysis).unwrap();
        let rve = analysis.rve;
        let mut w = vec![0.0; 4];
        for &node in &[1_usize, 2, 3, 4] {
            rve.corner_weights(&analysis.network.nodes[node].coords[..2], &mut w);
            for c in 0..4 {
                for j in 0..2 {
                    let eq = analysis.network.eq(node, j);
                    // component j of the node follows component j of the corner
                    approx_eq(dd.get(eq, c * 2 + j), w[c], 1e-10);
                    approx_eq(dd.get(eq, c * 2 + 1 - j), 0.0, 1e-10);
                }
            }
        }
        // second call hits the cache
        let again = calc_dx_fn_dx_rve(&mut analysis).unwrap();
        approx_eq(again.get(0, 0), dd.get(0, 0), 1e-15);
    }

    #[test]
    fn cache_is_invalidated_when_the_boundary_moves() {
        let mut analysis = solved_analysis();
        let first = calc_dx_fn_dx_rve(&mut analysis).unwrap();
        assert!(analysis.cached_dx_fn_dx_rve().is_some());

        // a new deformation gradient moves the boundary and drops the cache
        let dg = DeformationGradient::from_flat(&[1.10, 0.0, 0.0, 0.94]).unwrap();
        analysis.run(&dg).unwrap();
        assert!(analysis.cached_dx_fn_dx_rve().is_none());

        // the recomputed sensitivity reflects the new equilibrium state
        let second = calc_dx_fn_dx_rve(&mut analysis).unwrap();
        let mut diff = 0.0;
        for i in 0..first.nrow() {
            for j in 0..first.ncol() {
                diff += f64::abs(first.get(i, j) - second.get(i, j));
            }
        }
        assert!(diff > 1e-6, "sensitivity did not change with the state: {}", diff);

        // releasing the constraints also drops the cache
        analysis.free_rve_bc();
        assert!(analysis.cached_dx_fn_dx_rve().is_none());
    }

    #[test]
    fn dx_fn_dx_rve_matches_finite_differences() {
        let mut analysis = solved_analysis();
        let dd = calc_dx_fn_dx_rve(&mut analysis).unwrap();
        let rve = analysis.rve;
        let h = 1e-6;
        let mut w = vec![0.0; 4];
        let boundary = analysis.boundary_nodes().to_vec();
        let u_base = analysis.network.u.clone();
        // displace one corner at a time and re-equilibrate the interior
        for c in 0..4 {
            for j in 0..2 {
                analysis.network.u = u_base.clone();
                for &node in &boundary {
                    rve.corner_weights(&analysis.network.nodes[node].coords[..2], &mut w);
                    let eq = analysis.network.eq(node, j);
                    analysis.network.u[eq] += h * w[c];
                }
                match analysis.newton().unwrap() {
                    NewtonOutcome::Converged(_) => (),
                    outcome => panic!("perturbed solve failed: {:?}", outcome),
                }
                for eq in 0..analysis.network.n_dof() {
                    let fd = (analysis.network.u[eq] - u_base[eq]) / h;
                    assert!(
                        f64::abs(dd.get(eq, c * 2 + j) - fd) < 1e-4,
                        "dx_fn[{}] / dx_rve[{}] = {} vs fd = {}",
                        eq,
                        c * 2 + j,
                        dd.get(eq, c * 2 + j),
                        fd
                    );
                }
            }
        }
    }

    #[test]
    fn dr_dx_rve_is_consistent_with_the_solve_phase() {
        // at equilibrium, K · dx_fn/dx_rve must cancel dR/dx_rve on free rows
        let mut analysis = solved_analysis();
        let dxfn = calc_dx_fn_dx_rve(&mut analysis).unwrap();
        let prescribed = analysis.prescribed().to_vec();
        let drdx = calc_dr_dx_rve(&analysis.network, &analysis.rve, &prescribed).unwrap();
        let n_dof = analysis.network.n_dof();

        // dense free-row tangent via the integrator
        let mut integ = crate::fem::TrussIntegrator::new(2);
        let nnz = analysis.network.n_elements() * 16 + n_dof;
        let mut kk = russell_sparse::CooMatrix::new(n_dof, n_dof, nnz, russell_sparse::Sym::No).unwrap();
        integ.assemble_kke(&mut kk, &analysis.network, &prescribed).unwrap();
        let kk_dense = kk.as_dense();

        for eq in 0..n_dof {
            if prescribed[eq] {
                continue;
            }
            for col in 0..analysis.rve.n_corner_dof() {
                // K_ff · dx_f + dR/dx_rve = 0 on every free row
                let mut sum = drdx.get(eq, col);
                for other in 0..n_dof {
                    if !prescribed[other] {
                        sum += kk_dense.get(eq, other) * dxfn.get(other, col);
                    }
                }
                assert!(f64::abs(sum) < 1e-9, "row {} col {}: {}", eq, col, sum);
            }
        }
    }
}
