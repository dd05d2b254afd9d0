use crate::network::{FiberNetwork, Rve};
use crate::StrError;
use russell_lab::{mat_mat_mul, Matrix};
use russell_tensor::{Mandel, Tensor2};

/// Number of engineering stress components on the wire (xx, yy, zz, xy, yz, zx)
pub const N_STRESS_COMP: usize = 6;

/// Computes the volume-averaged (virial) Cauchy stress of the network
///
/// Sums the per-fiber dyad `f l n ⊗ n` over the deformed configuration and
/// divides by the RVE volume. For a network in interior equilibrium this
/// equals the boundary-traction average. 2D networks embed into the 3D
/// symmetric tensor with zero out-of-plane components.
pub fn calc_stress(network: &FiberNetwork, rve: &Rve) -> Result<Tensor2, StrError> {
    let ndim = network.ndim;
    let vol = rve.volume();
    if vol <= 0.0 {
        return Err("the RVE volume must be strictly positive");
    }
    let mut sig = [[0.0; 3]; 3];
    for element in &network.elements {
        let mut d = [0.0; 3];
        let mut ll = 0.0;
        for k in 0..ndim {
            d[k] = network.deformed_coord(element.nodes[1], k) - network.deformed_coord(element.nodes[0], k);
            ll += d[k] * d[k];
        }
        let ll = f64::sqrt(ll);
        if ll <= 0.0 {
            return Err("fiber length collapsed to zero during stress recovery");
        }
        let (f, _) = network.reactions[element.reaction].force(ll, element.length0);
        for i in 0..ndim {
            for j in 0..ndim {
                sig[i][j] += f * d[i] * d[j] / ll;
            }
        }
    }
    let mut stress = Tensor2::new(Mandel::Symmetric);
    for i in 0..3 {
        for j in i..3 {
            stress.sym_set(i, j, 0.5 * (sig[i][j] + sig[j][i]) / vol);
        }
    }
    Ok(stress)
}

/// Extracts the engineering-ordered stress components (xx, yy, zz, xy, yz, zx)
pub fn stress_engineering(stress: &Tensor2) -> [f64; N_STRESS_COMP] {
    [
        stress.get(0, 0),
        stress.get(1, 1),
        stress.get(2, 2),
        stress.get(0, 1),
        stress.get(1, 2),
        stress.get(0, 2),
    ]
}

/// Computes the analytic sensitivity of the stress to every node position
///
/// Returns a (6 × n_dof) matrix in engineering row order. For one fiber with
/// endpoint positions x1, x2, direction `d = x2 − x1`, length `l`, and unit
/// orientation `n = d/l`:
///
/// ```text
/// ∂σ_ij/∂x2_k = (1/V) [ df/dl n_k d_i d_j / l
///                     + f (δ_ik d_j + d_i δ_jk) / l
///                     − f d_i d_j n_k / l² ]
/// ```
///
/// and the derivative with respect to x1 is the negative.
pub fn calc_dstress_dx_fn(network: &FiberNetwork, rve: &Rve) -> Result<Matrix, StrError> {
    let ndim = network.ndim;
    let vol = rve.volume();
    if vol <= 0.0 {
        return Err("the RVE volume must be strictly positive");
    }
    let mut dd = Matrix::new(N_STRESS_COMP, network.n_dof());
    let rows: [(usize, usize); N_STRESS_COMP] = [(0, 0), (1, 1), (2, 2), (0, 1), (1, 2), (0, 2)];
    for element in &network.elements {
        let mut d = [0.0; 3];
        let mut ll = 0.0;
        for k in 0..ndim {
            d[k] = network.deformed_coord(element.nodes[1], k) - network.deformed_coord(element.nodes[0], k);
            ll += d[k] * d[k];
        }
        let ll = f64::sqrt(ll);
        if ll <= 0.0 {
            return Err("fiber length collapsed to zero during stress recovery");
        }
        let mut n = [0.0; 3];
        for k in 0..ndim {
            n[k] = d[k] / ll;
        }
        let (f, dfdl) = network.reactions[element.reaction].force(ll, element.length0);
        for (row, &(i, j)) in rows.iter().enumerate() {
            if i >= ndim || j >= ndim {
                continue;
            }
            // symmetrization is implicit: d_i d_j is already symmetric in (i, j)
            for k in 0..ndim {
                let mut val = dfdl * n[k] * d[i] * d[j] / ll - f * d[i] * d[j] * n[k] / (ll * ll);
                if i == k {
                    val += f * d[j] / ll;
                }
                if j == k {
                    val += f * d[i] / ll;
                }
                val /= vol;
                let col2 = network.eq(element.nodes[1], k);
                let col1 = network.eq(element.nodes[0], k);
                dd.set(row, col2, dd.get(row, col2) + val);
                dd.set(row, col1, dd.get(row, col1) - val);
            }
        }
    }
    Ok(dd)
}

/// Chains the stress sensitivity through the solve phase
///
/// `dstress_dx_fn` is (6 × n_dof) and `dx_fn_dx_rve` is (n_dof × n_corner_dof);
/// the result (6 × n_corner_dof) is the total derivative of the stress with
/// respect to the RVE corner displacements, accounting for the motion of the
/// interior nodes at equilibrium.
pub fn calc_dstress_dx_rve(dstress_dx_fn: &Matrix, dx_fn_dx_rve: &Matrix) -> Result<Matrix, StrError> {
    let mut result = Matrix::new(dstress_dx_fn.nrow(), dx_fn_dx_rve.ncol());
    mat_mat_mul(&mut result, 1.0, dstress_dx_fn, dx_fn_dx_rve, 0.0)?;
    Ok(result)
}

/// Maps the corner-displacement stress sensitivity to the deformation gradient
///
/// A corner displacement induced by `δF` is `δu_c = δF x_c` with `x_c` the
/// corner reference position, so
///
/// ```text
/// ∂σ_s/∂F_jk = Σ_c ∂σ_s/∂x_rve[c·ndim + j] · x_c[k]
/// ```
///
/// Returns a (6 × ndim²) matrix with row-major F columns.
pub fn calc_dstress_dfg(dstress_dx_rve: &Matrix, rve: &Rve) -> Matrix {
    let ndim = rve.ndim;
    let mut result = Matrix::new(N_STRESS_COMP, ndim * ndim);
    for s in 0..N_STRESS_COMP {
        for c in 0..rve.n_corners() {
            let x = rve.corner_coord(c);
            for j in 0..ndim {
                for k in 0..ndim {
                    let val = result.get(s, j * ndim + k) + dstress_dx_rve.get(s, c * ndim + j) * x[k];
                    result.set(s, j * ndim + k, val);
                }
            }
        }
    }
    result
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
