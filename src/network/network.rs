use super::{collect_periodic_connection_info, FiberReaction, PbcRelation};
use crate::base::FiberMember;
use crate::StrError;
use russell_lab::Vector;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Holds one node of a fiber network
///
/// Coordinates are reference (undeformed) positions; the third component is
/// zero for 2D networks.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Node id (index into the network's node list)
    pub id: usize,

    /// Reference coordinates
    pub coords: [f64; 3],
}

/// Holds one truss element (a fiber segment between two nodes)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Element id (index into the network's element list)
    pub id: usize,

    /// The two endpoint node ids
    pub nodes: [usize; 2],

    /// Reference (rest) length; strictly positive
    pub length0: f64,

    /// Index of the fiber reaction assigned to this element
    pub reaction: usize,
}

/// Holds the in-memory representation of a fiber-network mesh
///
/// Owns nodes, truss elements, periodic boundary relations, and the
/// displacement solution field with a flat degree-of-freedom numbering
/// `eq = node · ndim + component`. The per-fiber material laws are shared
/// (immutable, reference-counted) across clones of the network.
#[derive(Clone, Debug)]
pub struct FiberNetwork {
    /// Space dimension (2 or 3)
    pub ndim: usize,

    /// Structural model of the fibers
    pub member: FiberMember,

    /// All nodes
    pub nodes: Vec<Node>,

    /// All truss elements
    pub elements: Vec<Element>,

    /// Shared immutable fiber material laws
    pub reactions: Arc<Vec<FiberReaction>>,

    /// Periodic boundary relations
    pub pbc: Vec<PbcRelation>,

    /// Displacement DOFs (n_nodes × ndim)
    pub u: Vector,
}

impl FiberNetwork {
    /// Allocates a new instance and validates the topology
    ///
    /// `elements` holds `(node1, node2, reaction_index)` triples; rest
    /// lengths are computed from the reference coordinates and must be
    /// strictly positive.
    pub fn new(
        ndim: usize,
        member: FiberMember,
        nodes: Vec<Node>,
        elements: &[(usize, usize, usize)],
        reactions: Arc<Vec<FiberReaction>>,
        pbc_pairs: &[(usize, usize)],
    ) -> Result<Self, StrError> {
        if ndim != 2 && ndim != 3 {
            return Err("ndim must be 2 or 3");
        }
        if member == FiberMember::Beam {
            return Err("beam fibers are not implemented; use truss fibers");
        }
        if nodes.is_empty() {
            return Err("the network must have at least one node");
        }
        for (i, node) in nodes.iter().enumerate() {
            if node.id != i {
                return Err("node ids must match their position in the node list");
            }
        }
        let mut elems = Vec::with_capacity(elements.len());
        for (id, &(n1, n2, reaction)) in elements.iter().enumerate() {
            if n1 >= nodes.len() || n2 >= nodes.len() {
                return Err("element references an out-of-bounds node id");
            }
            if n1 == n2 {
                return Err("element endpoints must be distinct nodes");
            }
            if reaction >= reactions.len() {
                return Err("element references an out-of-bounds fiber reaction");
            }
            let mut sum = 0.0;
            for k in 0..ndim {
                let d = nodes[n2].coords[k] - nodes[n1].coords[k];
                sum += d * d;
            }
            let length0 = f64::sqrt(sum);
            if length0 <= 0.0 {
                return Err("element rest length must be strictly positive");
            }
            elems.push(Element {
                id,
                nodes: [n1, n2],
                length0,
                reaction,
            });
        }
        let mut pbc: Vec<_> = pbc_pairs.iter().map(|&(a, b)| PbcRelation::new(a, b)).collect();
        collect_periodic_connection_info(&nodes, &elems, &mut pbc)?;
        let n_dof = nodes.len() * ndim;
        Ok(FiberNetwork {
            ndim,
            member,
            nodes,
            elements: elems,
            reactions,
            pbc,
            u: Vector::new(n_dof),
        })
    }

    /// Returns the number of nodes
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of elements
    pub fn n_elements(&self) -> usize {
        self.elements.len()
    }

    /// Returns the number of displacement DOFs
    pub fn n_dof(&self) -> usize {
        self.nodes.len() * self.ndim
    }

    /// Returns the equation (DOF) number of a node's displacement component
    pub fn eq(&self, node: usize, component: usize) -> usize {
        node * self.ndim + component
    }

    /// Returns the deformed coordinate of a node's component
    pub fn deformed_coord(&self, node: usize, component: usize) -> f64 {
        self.nodes[node].coords[component] + self.u[self.eq(node, component)]
    }

    /// Sets all current (deformed) coordinates from a flat ordered buffer
    ///
    /// The buffer must follow the DOF numbering; the displacement field is
    /// updated to `buf − reference`.
    pub fn set_all_coordinates(&mut self, coords: &[f64]) -> Result<(), StrError> {
        if coords.len() != self.n_dof() {
            return Err("coordinates buffer length must equal the DOF count");
        }
        for node in 0..self.n_nodes() {
            for k in 0..self.ndim {
                let eq = self.eq(node, k);
                self.u[eq] = coords[eq] - self.nodes[node].coords[k];
            }
        }
        Ok(())
    }

    /// Returns all current (deformed) coordinates as a flat ordered buffer
    pub fn get_all_coordinates(&self) -> Vec<f64> {
        let mut coords = vec![0.0; self.n_dof()];
        for node in 0..self.n_nodes() {
            for k in 0..self.ndim {
                let eq = self.eq(node, k);
                coords[eq] = self.nodes[node].coords[k] + self.u[eq];
            }
        }
        coords
    }

    /// Performs a deep copy of nodes, elements, relations, and solution field
    ///
    /// The immutable fiber reactions stay shared (reference-counted), so
    /// clones of the same template never duplicate material-law storage.
    pub fn clone_network(&self) -> FiberNetwork {
        FiberNetwork {
            ndim: self.ndim,
            member: self.member,
            nodes: self.nodes.clone(),
            elements: self.elements.clone(),
            reactions: Arc::clone(&self.reactions),
            pbc: self.pbc.clone(),
            u: self.u.clone(),
        }
    }

    /// Re-resolves the periodic relations against the current topology
    pub fn collect_periodic_connection_info(&mut self) -> Result<(), StrError> {
        collect_periodic_connection_info(&self.nodes, &self.elements, &mut self.pbc)
    }

    /// Computes the current length of an element
    pub fn element_length(&self, e: &Element) -> f64 {
        let mut sum = 0.0;
        for k in 0..self.ndim {
            let d = self.deformed_coord(e.nodes[1], k) - self.deformed_coord(e.nodes[0], k);
            sum += d * d;
        }
        f64::sqrt(sum)
    }
}

/// Computes the current length of every fiber
pub fn calc_fiber_lengths(network: &FiberNetwork) -> Vec<f64> {
    network.elements.iter().map(|e| network.element_length(e)).collect()
}

/// Computes the direction vector of one fiber, sign-normalized on x
///
/// The direction is `n2 − n1` per axis (reference coordinates), flipped so
/// that the x component is non-negative.
pub fn calc_fiber_direction(n1: &Node, n2: &Node, result: &mut [f64; 3]) {
    result[0] = n2.coords[0] - n1.coords[0];
    result[1] = n2.coords[1] - n1.coords[1];
    result[2] = n2.coords[2] - n1.coords[2];
    if result[0] < 0.0 {
        result[0] *= -1.0;
        result[1] *= -1.0;
        result[2] *= -1.0;
    }
}

/// Computes the average fiber direction over the whole network
pub fn calc_avg_fiber_direction(network: &FiberNetwork, result: &mut [f64; 3]) {
    let mut dir = [0.0; 3];
    result.fill(0.0);
    for e in &network.elements {
        calc_fiber_direction(&network.nodes[e.nodes[0]], &network.nodes[e.nodes[1]], &mut dir);
        result[0] += dir[0];
        result[1] += dir[1];
        result[2] += dir[2];
    }
    let n = network.n_elements() as f64;
    result[0] /= n;
    result[1] /= n;
    result[2] /= n;
}

/// Computes the scalar orientation measure of the network
///
/// Averages the squared projection of the unit fiber orientation onto the
/// x axis and maps it to `(3⟨cos²θ⟩ − 1)/2`: 1 for perfect x alignment,
/// 0 for a 3D isotropic network, −1/2 for fibers orthogonal to x.
pub fn calc_network_orientation(network: &FiberNetwork) -> f64 {
    let mut sum = 0.0;
    for e in &network.elements {
        let n1 = &network.nodes[e.nodes[0]];
        let n2 = &network.nodes[e.nodes[1]];
        let mut dir = [0.0; 3];
        calc_fiber_direction(n1, n2, &mut dir);
        let len = f64::sqrt(dir[0] * dir[0] + dir[1] * dir[1] + dir[2] * dir[2]);
        sum += (dir[0] / len) * (dir[0] / len);
    }
    let avg = sum / (network.n_elements() as f64);
    (3.0 * avg - 1.0) / 2.0
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
