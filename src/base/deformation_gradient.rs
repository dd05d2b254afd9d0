use crate::StrError;
use russell_lab::Matrix;
use serde::{Deserialize, Serialize};

/// Holds the macroscale deformation gradient applied to an RVE boundary
///
/// The matrix is (ndim × ndim) with ndim = 2 or 3. Boundary nodes of the
/// fiber network are driven toward `u = (F − I) x` where `x` is the node's
/// reference position.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeformationGradient {
    /// The F matrix (ndim × ndim)
    pub mat: Matrix,
}

impl DeformationGradient {
    /// Returns the identity deformation gradient (zero strain)
    pub fn identity(ndim: usize) -> Result<Self, StrError> {
        if ndim != 2 && ndim != 3 {
            return Err("ndim must be 2 or 3");
        }
        let mut mat = Matrix::new(ndim, ndim);
        for i in 0..ndim {
            mat.set(i, i, 1.0);
        }
        Ok(DeformationGradient { mat })
    }

    /// Creates a new instance from a flattened row-major 2×2 or 3×3 array
    ///
    /// This is the wire format of the macro→micro per-step payload.
    pub fn from_flat(data: &[f64]) -> Result<Self, StrError> {
        let ndim = match data.len() {
            4 => 2,
            9 => 3,
            _ => return Err("deformation gradient data must have 4 or 9 components"),
        };
        let mut mat = Matrix::new(ndim, ndim);
        for i in 0..ndim {
            for j in 0..ndim {
                mat.set(i, j, data[i * ndim + j]);
            }
        }
        Ok(DeformationGradient { mat })
    }

    /// Returns the flattened row-major representation (wire format)
    pub fn to_flat(&self) -> Vec<f64> {
        let ndim = self.ndim();
        let mut data = vec![0.0; ndim * ndim];
        for i in 0..ndim {
            for j in 0..ndim {
                data[i * ndim + j] = self.mat.get(i, j);
            }
        }
        data
    }

    /// Returns the space dimension
    pub fn ndim(&self) -> usize {
        self.mat.nrow()
    }

    /// Computes the displacement `u = s (F − I) x` of a point
    ///
    /// The scale `s` is the currently applied fraction of the load (1.0 for
    /// the full deformation gradient); `u` must have length ndim.
    pub fn displacement(&self, scale: f64, x: &[f64], u: &mut [f64]) {
        let ndim = self.ndim();
        for i in 0..ndim {
            let mut val = 0.0;
            for j in 0..ndim {
                let fmi = self.mat.get(i, j) - if i == j { 1.0 } else { 0.0 };
                val += fmi * x[j];
            }
            u[i] = scale * val;
        }
    }

    /// Checks whether F equals the identity within a tolerance
    pub fn is_identity(&self, tol: f64) -> bool {
        let ndim = self.ndim();
        for i in 0..ndim {
            for j in 0..ndim {
                let target = if i == j { 1.0 } else { 0.0 };
                if f64::abs(self.mat.get(i, j) - target) > tol {
                    return false;
                }
            }
        }
        true
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
