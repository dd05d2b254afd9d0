use serde::{Deserialize, Serialize};

/// Default fiber radius (collagen fibril scale, in meters)
pub const DEFAULT_FIBER_RADIUS: f64 = 3.49911271e-8;

/// Returns the cross-sectional area of a fiber with the given radius
pub fn fiber_area(radius: f64) -> f64 {
    std::f64::consts::PI * radius * radius
}

/// Defines the constitutive reaction of a single fiber
///
/// A reaction maps the current and reference fiber lengths to an axial force
/// and its derivative with respect to length. Reactions are immutable after
/// construction and shared by all elements of the same fiber type; elements
/// store an index into the network's shared reaction list.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum FiberReaction {
    /// Exponential force law in the Green strain with a linear continuation
    /// past the limiting length ratio `lexp`
    ///
    /// For `λ = l/l0 < lexp`:
    ///
    /// ```text
    /// εg = (l² − l0²) / (2 l0²)
    /// f  = (E A / B) (exp(B εg) − 1)
    /// df/dl = E A exp(B εg) l / l0²
    /// ```
    Nonlinear {
        /// Cross-sectional area A
        fiber_area: f64,

        /// Nonlinearity exponent B
        b: f64,

        /// Elastic modulus E
        e: f64,

        /// Limiting length ratio λ beyond which the law continues linearly
        lexp: f64,
    },

    /// Linear-elastic axial law `f = E A (l − l0) / l0`
    Linear {
        /// Cross-sectional area A
        fiber_area: f64,

        /// Elastic modulus E
        e: f64,
    },
}

impl FiberReaction {
    /// Returns the default nonlinear collagen-fiber reaction
    ///
    /// Constants follow the original tissue model: B = 1.2, E = 43.2 MPa,
    /// lexp = 1.4, area from the default fiber radius.
    pub fn sample_nonlinear() -> Self {
        FiberReaction::Nonlinear {
            fiber_area: fiber_area(DEFAULT_FIBER_RADIUS),
            b: 1.2,
            e: 43.2e6,
            lexp: 1.4,
        }
    }

    /// Returns the cross-sectional area of this fiber type
    pub fn area(&self) -> f64 {
        match self {
            FiberReaction::Nonlinear { fiber_area, .. } => *fiber_area,
            FiberReaction::Linear { fiber_area, .. } => *fiber_area,
        }
    }

    /// Computes the axial force and its length derivative `(f, df/dl)`
    ///
    /// `l` is the current length and `l0` the reference length; both must be
    /// strictly positive (checked by the caller during assembly).
    pub fn force(&self, l: f64, l0: f64) -> (f64, f64) {
        match self {
            FiberReaction::Nonlinear { fiber_area, b, e, lexp } => {
                let ea = e * fiber_area;
                let lambda = l / l0;
                if lambda < *lexp {
                    let green = (l * l - l0 * l0) / (2.0 * l0 * l0);
                    let f = ea / b * (f64::exp(b * green) - 1.0);
                    let dfdl = ea * f64::exp(b * green) * l / (l0 * l0);
                    (f, dfdl)
                } else {
                    // linear continuation with the slope at the limit ratio
                    let ll = lexp * l0;
                    let green = (ll * ll - l0 * l0) / (2.0 * l0 * l0);
                    let f_lim = ea / b * (f64::exp(b * green) - 1.0);
                    let slope = ea * f64::exp(b * green) * ll / (l0 * l0);
                    (f_lim + slope * (l - ll), slope)
                }
            }
            FiberReaction::Linear { fiber_area, e } => {
                let ea = e * fiber_area;
                (ea * (l - l0) / l0, ea / l0)
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
