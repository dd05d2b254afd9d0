use crate::network::{Element, FiberNetwork};
use crate::StrError;
use russell_lab::{Matrix, Vector};
use russell_sparse::CooMatrix;

/// Error raised when a fiber's current length vanishes during assembly
///
/// The implicit solver treats this as a recoverable attempt failure (the
/// load increment gets cut back), not a fatal error.
pub const ZERO_LENGTH_ERROR: StrError = "fiber length collapsed to zero during assembly";

/// Implements the per-element assembly of the nonlinear truss residual and
/// tangent stiffness
///
/// For one fiber with current length `l`, rest length `l0`, unit orientation
/// `n`, and reaction `(f, df/dl)`, the internal force at the endpoints is
/// `∓f·n` and the tangent block is
///
/// ```text
/// rctn = n ⊗ n (df/dl − f/l) + I (f/l)
/// ```
///
/// expanded into the 2-node block structure with alternating sign (the
/// `I f/l` term is the geometric/rotational stiffness required for
/// large-displacement stability). Local systems are assembled directly into
/// the caller-supplied global matrix/vector, skipping prescribed rows.
pub struct TrussIntegrator {
    ndim: usize,

    /// Local internal force vector (2·ndim)
    fe: Vector,

    /// Local tangent matrix (2·ndim × 2·ndim)
    ke: Matrix,
}

impl TrussIntegrator {
    /// Allocates a new instance with scratch space for one element
    pub fn new(ndim: usize) -> Self {
        TrussIntegrator {
            ndim,
            fe: Vector::new(2 * ndim),
            ke: Matrix::new(2 * ndim, 2 * ndim),
        }
    }

    /// Computes the local force vector and tangent matrix of one element
    ///
    /// Fails if the current fiber length has collapsed to zero (non-physical
    /// state; the RVE solver treats this as a failed load attempt).
    pub fn element_system(&mut self, network: &FiberNetwork, element: &Element) -> Result<(), StrError> {
        let ndim = self.ndim;
        let (na, nb) = (element.nodes[0], element.nodes[1]);
        let mut dir = [0.0; 3];
        let mut ll = 0.0;
        for k in 0..ndim {
            dir[k] = network.deformed_coord(nb, k) - network.deformed_coord(na, k);
            ll += dir[k] * dir[k];
        }
        let ll = f64::sqrt(ll);
        if ll <= 1e-12 * element.length0 {
            return Err(ZERO_LENGTH_ERROR);
        }
        for k in 0..ndim {
            dir[k] /= ll;
        }
        let reaction = &network.reactions[element.reaction];
        let (f, dfdl) = reaction.force(ll, element.length0);
        let fl = f / ll;
        let dfdl_fl = dfdl - fl;
        for k in 0..ndim {
            let frc = f * dir[k];
            self.fe[k] = -frc;
            self.fe[ndim + k] = frc;
        }
        for k in 0..ndim {
            for m in 0..ndim {
                let mut rctn = dir[k] * dir[m] * dfdl_fl;
                if k == m {
                    rctn += fl;
                }
                for ii in 0..2 {
                    for jj in 0..2 {
                        let sign = if ii == jj { 1.0 } else { -1.0 };
                        self.ke.set(ii * ndim + k, jj * ndim + m, sign * rctn);
                    }
                }
            }
        }
        Ok(())
    }

    /// Returns the last computed local tangent matrix
    pub fn local_tangent(&self) -> &Matrix {
        &self.ke
    }

    /// Assembles the internal force vector of all elements
    ///
    /// Prescribed (boundary) rows are skipped and stay zero in `ff_int`.
    /// Must be called once per element per Newton iteration.
    pub fn assemble_f_int(
        &mut self,
        ff_int: &mut Vector,
        network: &FiberNetwork,
        prescribed: &[bool],
    ) -> Result<(), StrError> {
        if ff_int.dim() < network.n_dof() {
            return Err("global force vector is too small for the network");
        }
        let ndim = self.ndim;
        for index in 0..network.n_elements() {
            let element = network.elements[index];
            self.element_system(network, &element)?;
            for ii in 0..2 {
                for k in 0..ndim {
                    let eq = network.eq(element.nodes[ii], k);
                    if !prescribed[eq] {
                        ff_int[eq] += self.fe[ii * ndim + k];
                    }
                }
            }
        }
        Ok(())
    }

    /// Assembles the tangent stiffness of all elements into the global matrix
    ///
    /// Prescribed rows are skipped (the caller puts ones on their diagonal);
    /// prescribed columns are kept and are annihilated by the zero boundary
    /// increments of the identity rows.
    pub fn assemble_kke(
        &mut self,
        kk: &mut CooMatrix,
        network: &FiberNetwork,
        prescribed: &[bool],
    ) -> Result<(), StrError> {
        let ndim = self.ndim;
        for index in 0..network.n_elements() {
            let element = network.elements[index];
            self.element_system(network, &element)?;
            for ii in 0..2 {
                for k in 0..ndim {
                    let row = network.eq(element.nodes[ii], k);
                    if prescribed[row] {
                        continue;
                    }
                    for jj in 0..2 {
                        for m in 0..ndim {
                            let col = network.eq(element.nodes[jj], m);
                            kk.put(row, col, self.ke.get(ii * ndim + k, jj * ndim + m))?;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::TrussIntegrator;
    use crate::base::SampleNetworks;
    use russell_lab::{mat_approx_eq, vec_approx_eq, Matrix, Vector};
    use russell_sparse::{CooMatrix, Sym};

    #[test]
    fn element_system_works() {
        let mut fnet = SampleNetworks::single_fiber_x();
        let mut integ = TrussIntegrator::new(3);

        // at rest: zero force, tangent = E A / l0 on the xx entries
        integ.element_system(&fnet, &fnet.elements[0].clone()).unwrap();
        vec_approx_eq(&integ.fe, &[0.0; 6], 1e-15);
        let (_, dfdl0) = fnet.reactions[0].force(1.0, 1.0);
        assert!(integ.local_tangent().get(0, 0) > 0.0);
        approx_block(integ.local_tangent(), dfdl0);

        // stretch by 10% along x: tension pulls the endpoints together
        let eq = fnet.eq(1, 0);
        fnet.u[eq] = 0.1;
        integ.element_system(&fnet, &fnet.elements[0].clone()).unwrap();
        let (f, _) = fnet.reactions[0].force(1.1, 1.0);
        assert!(f > 0.0);
        vec_approx_eq(&integ.fe, &[-f, 0.0, 0.0, f, 0.0, 0.0], 1e-14);
    }

    fn approx_block(ke: &Matrix, k0: f64) {
        // xx structure with alternating signs; yy/zz zero at rest (f = 0)
        #[rustfmt::skip]
        let correct = Matrix::from(&[
            [ k0, 0.0, 0.0, -k0, 0.0, 0.0],
            [0.0, 0.0, 0.0,  0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0,  0.0, 0.0, 0.0],
            [-k0, 0.0, 0.0,  k0, 0.0, 0.0],
            [0.0, 0.0, 0.0,  0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0,  0.0, 0.0, 0.0],
        ]);
        mat_approx_eq(ke, &correct, 1e-14);
    }

    #[test]
    fn tangent_matches_force_difference() {
        // df/du via central difference of the assembled force vector
        let mut fnet = SampleNetworks::asymmetric_2d();
        let n_dof = fnet.n_dof();
        let mut integ = TrussIntegrator::new(2);
        let prescribed = vec![false; n_dof];
        let h = 1e-7;

        let nnz = fnet.n_elements() * 16;
        let mut kk = CooMatrix::new(n_dof, n_dof, nnz, Sym::No).unwrap();
        integ.assemble_kke(&mut kk, &fnet, &prescribed).unwrap();
        let kk_dense = kk.as_dense();

        for j in 0..n_dof {
            let mut ff_plus = Vector::new(n_dof);
            let mut ff_minus = Vector::new(n_dof);
            fnet.u[j] += h;
            integ.assemble_f_int(&mut ff_plus, &fnet, &prescribed).unwrap();
            fnet.u[j] -= 2.0 * h;
            integ.assemble_f_int(&mut ff_minus, &fnet, &prescribed).unwrap();
            fnet.u[j] += h;
            for i in 0..n_dof {
                let fd = (ff_plus[i] - ff_minus[i]) / (2.0 * h);
                assert!(
                    f64::abs(kk_dense.get(i, j) - fd) < 1e-6,
                    "K({},{}) = {} vs fd = {}",
                    i,
                    j,
                    kk_dense.get(i, j),
                    fd
                );
            }
        }
    }

    #[test]
    fn zero_length_is_caught() {
        let mut fnet = SampleNetworks::single_fiber_x();
        // collapse node 1 onto node 0
        let eq10 = fnet.eq(1, 0);
        fnet.u[eq10] = -1.0;
        let mut integ = TrussIntegrator::new(3);
        assert_eq!(
            integ.element_system(&fnet, &fnet.elements[0].clone()).err(),
            Some("fiber length collapsed to zero during assembly")
        );
    }
}
