use super::FiberNetwork;
use serde::{Deserialize, Serialize};

/// Default relative tolerance for boundary-node detection
pub const BOUNDARY_TOL: f64 = 1e-8;

/// Names one face of the RVE cube
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Side {
    Top,
    Bottom,
    Left,
    Right,
    Front,
    Back,
}

impl Side {
    /// Returns the coordinate axis normal to this face (x = 0, y = 1, z = 2)
    pub fn axis(&self) -> usize {
        match self {
            Side::Left | Side::Right => 0,
            Side::Top | Side::Bottom => 1,
            Side::Front | Side::Back => 2,
        }
    }

    /// Returns the faces of a 2D or 3D RVE
    pub fn all(ndim: usize) -> &'static [Side] {
        if ndim == 2 {
            &[Side::Top, Side::Bottom, Side::Left, Side::Right]
        } else {
            &[Side::Top, Side::Bottom, Side::Left, Side::Right, Side::Front, Side::Back]
        }
    }

    /// Returns the position of this face in the sides array
    pub fn index(&self) -> usize {
        match self {
            Side::Top => 0,
            Side::Bottom => 1,
            Side::Left => 2,
            Side::Right => 3,
            Side::Front => 4,
            Side::Back => 5,
        }
    }
}

/// Holds the geometric RVE cube with six named faces
///
/// The cube owns nothing but its face coordinates; boundary node sets are
/// computed against a [`FiberNetwork`] by coordinate comparison within a
/// tolerance. Corner ordering is binary: bit k of the corner index selects
/// the max (1) or min (0) face along axis k.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rve {
    /// Space dimension (2 or 3)
    pub ndim: usize,

    /// Face coordinates in order [top, bottom, left, right, front, back]
    pub sides: [f64; 6],
}

impl Rve {
    /// Returns the unit cube centered at the origin
    pub fn new(ndim: usize) -> Self {
        Rve::new_scaled(ndim, 0.5)
    }

    /// Returns a cube of the given half-width centered at the origin
    pub fn new_scaled(ndim: usize, half: f64) -> Self {
        Rve {
            ndim,
            sides: [half, -half, -half, half, half, -half],
        }
    }

    /// Returns the boundary coordinate of a face
    pub fn side_coord(&self, side: Side) -> f64 {
        self.sides[side.index()]
    }

    /// Returns the (min, max) coordinates along an axis
    pub fn range(&self, axis: usize) -> (f64, f64) {
        match axis {
            0 => (self.sides[2], self.sides[3]),
            1 => (self.sides[1], self.sides[0]),
            _ => (self.sides[5], self.sides[4]),
        }
    }

    /// Returns the extent along an axis
    pub fn extent(&self, axis: usize) -> f64 {
        let (min, max) = self.range(axis);
        max - min
    }

    /// Returns the cube volume (area in 2D, unit thickness)
    pub fn volume(&self) -> f64 {
        let mut vol = 1.0;
        for axis in 0..self.ndim {
            vol *= self.extent(axis);
        }
        vol
    }

    /// Returns the number of corners (4 in 2D, 8 in 3D)
    pub fn n_corners(&self) -> usize {
        1 << self.ndim
    }

    /// Returns the number of corner displacement DOFs
    pub fn n_corner_dof(&self) -> usize {
        self.n_corners() * self.ndim
    }

    /// Returns the reference coordinates of corner c
    pub fn corner_coord(&self, c: usize) -> [f64; 3] {
        let mut x = [0.0; 3];
        for axis in 0..self.ndim {
            let (min, max) = self.range(axis);
            x[axis] = if (c >> axis) & 1 == 1 { max } else { min };
        }
        x
    }

    /// Computes the multilinear corner weights of a point inside the cube
    ///
    /// `w` must have length `n_corners()`; the weights sum to one and
    /// interpolate corner displacements to the point.
    pub fn corner_weights(&self, x: &[f64], w: &mut [f64]) {
        for c in 0..self.n_corners() {
            let mut weight = 1.0;
            for axis in 0..self.ndim {
                let (min, max) = self.range(axis);
                let ext = max - min;
                weight *= if (c >> axis) & 1 == 1 {
                    (x[axis] - min) / ext
                } else {
                    (max - x[axis]) / ext
                };
            }
            w[c] = weight;
        }
    }

    /// Checks whether a point lies on a given face (within tolerance)
    pub fn on_side(&self, x: &[f64], side: Side, tol: f64) -> bool {
        f64::abs(x[side.axis()] - self.side_coord(side)) <= tol * self.extent(side.axis())
    }

    /// Checks whether a point lies on any face
    pub fn on_boundary(&self, x: &[f64], tol: f64) -> bool {
        Side::all(self.ndim).iter().any(|&s| self.on_side(x, s, tol))
    }

    /// Collects the ids of the network nodes lying on one face
    pub fn boundary_nodes(&self, network: &FiberNetwork, side: Side) -> Vec<usize> {
        network
            .nodes
            .iter()
            .filter(|n| self.on_side(&n.coords, side, BOUNDARY_TOL))
            .map(|n| n.id)
            .collect()
    }

    /// Collects the ids of all boundary nodes (sorted, without duplicates)
    pub fn all_boundary_nodes(&self, network: &FiberNetwork) -> Vec<usize> {
        let mut ids: Vec<usize> = network
            .nodes
            .iter()
            .filter(|n| self.on_boundary(&n.coords, BOUNDARY_TOL))
            .map(|n| n.id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
