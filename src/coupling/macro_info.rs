use crate::network::Rve;
use crate::StrError;
use russell_lab::Matrix;
use serde::{Deserialize, Serialize};

/// Holds the macroscale element data attached to one integration point
///
/// Shipped once per coupling epoch (the macro mesh topology does not change
/// between migrations): the shape functions and their spatial gradients
/// evaluated at the integration point, the point's coordinates, and the
/// micro-to-macro length scale ratio.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MacroInfo {
    /// Integration (Gauss) point id within the macro analysis
    pub gauss_id: usize,

    /// Number of nodes of the macro element
    pub nnd: usize,

    /// Shape functions evaluated at the integration point (length nnd)
    pub shape: Vec<f64>,

    /// Shape function gradients at the integration point (nnd × ndim, row-major)
    pub grad: Vec<f64>,

    /// Coordinates of the integration point
    pub gauss_coord: [f64; 3],

    /// Ratio of the RVE edge length to the macro length unit
    pub scale: f64,
}

impl MacroInfo {
    /// Allocates a new instance and checks the array lengths
    pub fn new(
        gauss_id: usize,
        ndim: usize,
        shape: Vec<f64>,
        grad: Vec<f64>,
        gauss_coord: [f64; 3],
        scale: f64,
    ) -> Result<Self, StrError> {
        if shape.is_empty() {
            return Err("the macro element must have at least one node");
        }
        if grad.len() != shape.len() * ndim {
            return Err("the gradient array length must equal nnd times ndim");
        }
        Ok(MacroInfo {
            gauss_id,
            nnd: shape.len(),
            shape,
            grad,
            gauss_coord,
            scale,
        })
    }

    /// Computes the sensitivity of the RVE corners to the macro element DOFs
    ///
    /// A macro nodal displacement moves the RVE corners through the local
    /// displacement value plus the scaled displacement gradient times the
    /// corner offset:
    ///
    /// ```text
    /// ∂x_rve[c·ndim + i] / ∂d[a·ndim + j] = δ_ij (N_a + s ∇N_a · x_c)
    /// ```
    ///
    /// Returns a (n_corner_dof × nnd·ndim) matrix.
    pub fn calc_drve_dfe(&self, rve: &Rve) -> Matrix {
        let ndim = rve.ndim;
        let mut result = Matrix::new(rve.n_corner_dof(), self.nnd * ndim);
        for c in 0..rve.n_corners() {
            let x = rve.corner_coord(c);
            for a in 0..self.nnd {
                let mut val = self.shape[a];
                for k in 0..ndim {
                    val += self.scale * self.grad[a * ndim + k] * x[k];
                }
                for i in 0..ndim {
                    result.set(c * ndim + i, a * ndim + i, val);
                }
            }
        }
        result
    }
}

/// Chains the corner-displacement stress sensitivity to the macro element DOFs
///
/// `dstress_dx_rve` is (6 × n_corner_dof) and `drve_dfe` is
/// (n_corner_dof × nnd·ndim); the product is the term the macroscale assembly
/// adds to its tangent for this integration point.
pub fn calc_dstress_dfe(dstress_dx_rve: &Matrix, drve_dfe: &Matrix) -> Result<Matrix, StrError> {
    let mut result = Matrix::new(dstress_dx_rve.nrow(), drve_dfe.ncol());
    russell_lab::mat_mat_mul(&mut result, 1.0, dstress_dx_rve, drve_dfe, 0.0)?;
    Ok(result)
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
