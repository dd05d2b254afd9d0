use crate::base::FiberMember;
use crate::network::{FiberNetwork, FiberReaction, Node};
use std::sync::Arc;

/// Holds small deterministic fiber networks for tests and examples
///
/// All networks live inside the unit RVE cube centered at the origin; nodes
/// placed on a face coordinate (±0.5) are boundary nodes.
pub struct SampleNetworks {}

impl SampleNetworks {
    /// Returns the unit-stiffness nonlinear reaction used by the samples
    pub fn sample_reactions() -> Arc<Vec<FiberReaction>> {
        Arc::new(vec![FiberReaction::Nonlinear {
            fiber_area: 1.0,
            b: 1.2,
            e: 1.0,
            lexp: 1.4,
        }])
    }

    /// Single fiber along the x axis (both nodes on boundary faces)
    ///
    /// ```text
    /// 0-----------1   y = z = 0
    /// x=-0.5    x=0.5
    /// ```
    pub fn single_fiber_x() -> FiberNetwork {
        let nodes = vec![
            Node { id: 0, coords: [-0.5, 0.0, 0.0] },
            Node { id: 1, coords: [0.5, 0.0, 0.0] },
        ];
        FiberNetwork::new(
            3,
            FiberMember::Truss,
            nodes,
            &[(0, 1, 0)],
            Self::sample_reactions(),
            &[],
        )
        .unwrap()
    }

    /// Symmetric planar cross: center node plus one tip on each 2D face
    ///
    /// ```text
    ///           3 (0,0.5)
    ///           |
    /// 2 --------0-------- 1
    /// (-0.5,0)  |       (0.5,0)
    ///           4 (0,-0.5)
    /// ```
    pub fn planar_cross_2d() -> FiberNetwork {
        let nodes = vec![
            Node { id: 0, coords: [0.0, 0.0, 0.0] },
            Node { id: 1, coords: [0.5, 0.0, 0.0] },
            Node { id: 2, coords: [-0.5, 0.0, 0.0] },
            Node { id: 3, coords: [0.0, 0.5, 0.0] },
            Node { id: 4, coords: [0.0, -0.5, 0.0] },
        ];
        FiberNetwork::new(
            2,
            FiberMember::Truss,
            nodes,
            &[(0, 1, 0), (0, 2, 0), (0, 3, 0), (0, 4, 0)],
            Self::sample_reactions(),
            &[(1, 2), (3, 4)],
        )
        .unwrap()
    }

    /// Symmetric 3D cross: center node plus one arm tip on each face
    ///
    /// Node ids: 0 center, 1 right, 2 left, 3 top, 4 bottom, 5 front, 6 back.
    pub fn axis_cross_3d() -> FiberNetwork {
        let nodes = vec![
            Node { id: 0, coords: [0.0, 0.0, 0.0] },
            Node { id: 1, coords: [0.5, 0.0, 0.0] },
            Node { id: 2, coords: [-0.5, 0.0, 0.0] },
            Node { id: 3, coords: [0.0, 0.5, 0.0] },
            Node { id: 4, coords: [0.0, -0.5, 0.0] },
            Node { id: 5, coords: [0.0, 0.0, 0.5] },
            Node { id: 6, coords: [0.0, 0.0, -0.5] },
        ];
        FiberNetwork::new(
            3,
            FiberMember::Truss,
            nodes,
            &[(0, 1, 0), (0, 2, 0), (0, 3, 0), (0, 4, 0), (0, 5, 0), (0, 6, 0)],
            Self::sample_reactions(),
            &[(1, 2), (3, 4), (5, 6)],
        )
        .unwrap()
    }

    /// Star of body-diagonal fibers: center node connected to all 8 corners
    ///
    /// Every corner lies on three faces, so all fibers see a generic (non
    /// axis-aligned) orientation; useful for objectivity checks.
    pub fn diagonal_star_3d() -> FiberNetwork {
        let mut nodes = vec![Node { id: 0, coords: [0.0, 0.0, 0.0] }];
        let mut elements = Vec::new();
        for c in 0..8_usize {
            let x = if c & 1 == 1 { 0.5 } else { -0.5 };
            let y = if (c >> 1) & 1 == 1 { 0.5 } else { -0.5 };
            let z = if (c >> 2) & 1 == 1 { 0.5 } else { -0.5 };
            nodes.push(Node { id: c + 1, coords: [x, y, z] });
            elements.push((0, c + 1, 0));
        }
        FiberNetwork::new(3, FiberMember::Truss, nodes, &elements, Self::sample_reactions(), &[]).unwrap()
    }

    /// Asymmetric 2D network: one off-center interior node and four tips
    ///
    /// The interior node is in a non-trivial equilibrium for any applied
    /// deformation, so Newton needs genuine iterations.
    pub fn asymmetric_2d() -> FiberNetwork {
        let nodes = vec![
            Node { id: 0, coords: [0.1, -0.1, 0.0] },
            Node { id: 1, coords: [0.5, 0.2, 0.0] },
            Node { id: 2, coords: [-0.5, -0.1, 0.0] },
            Node { id: 3, coords: [-0.2, 0.5, 0.0] },
            Node { id: 4, coords: [0.3, -0.5, 0.0] },
        ];
        FiberNetwork::new(
            2,
            FiberMember::Truss,
            nodes,
            &[(0, 1, 0), (0, 2, 0), (0, 3, 0), (0, 4, 0)],
            Self::sample_reactions(),
            &[],
        )
        .unwrap()
    }

    /// Asymmetric 3D network: two interior nodes and six boundary tips
    ///
    /// ```text
    /// interior: 0 (0.1,-0.05,0.08), 7 (-0.2,0.15,-0.12)
    /// tips:     1 right, 2 left, 3 top, 4 bottom, 5 front, 6 back
    /// fibers:   0-1, 0-3, 0-5, 0-7, 7-2, 7-4, 7-6
    /// ```
    pub fn asymmetric_3d() -> FiberNetwork {
        let nodes = vec![
            Node { id: 0, coords: [0.1, -0.05, 0.08] },
            Node { id: 1, coords: [0.5, 0.2, 0.1] },
            Node { id: 2, coords: [-0.5, -0.3, 0.0] },
            Node { id: 3, coords: [0.2, 0.5, -0.1] },
            Node { id: 4, coords: [-0.1, -0.5, 0.3] },
            Node { id: 5, coords: [0.0, 0.1, 0.5] },
            Node { id: 6, coords: [0.15, -0.2, -0.5] },
            Node { id: 7, coords: [-0.2, 0.15, -0.12] },
        ];
        FiberNetwork::new(
            3,
            FiberMember::Truss,
            nodes,
            &[
                (0, 1, 0),
                (0, 3, 0),
                (0, 5, 0),
                (0, 7, 0),
                (7, 2, 0),
                (7, 4, 0),
                (7, 6, 0),
            ],
            Self::sample_reactions(),
            &[],
        )
        .unwrap()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::SampleNetworks;
    use crate::network::Rve;

    #[test]
    fn samples_are_well_formed() {
        let rve2 = Rve::new(2);
        let rve3 = Rve::new(3);

        let fnet = SampleNetworks::single_fiber_x();
        assert_eq!(rve3.all_boundary_nodes(&fnet), &[0, 1]);

        let fnet = SampleNetworks::planar_cross_2d();
        assert_eq!(fnet.ndim, 2);
        assert_eq!(rve2.all_boundary_nodes(&fnet), &[1, 2, 3, 4]);
        assert!(fnet.pbc.iter().all(|r| r.resolved()));

        let fnet = SampleNetworks::axis_cross_3d();
        assert_eq!(rve3.all_boundary_nodes(&fnet), &[1, 2, 3, 4, 5, 6]);

        let fnet = SampleNetworks::diagonal_star_3d();
        assert_eq!(fnet.n_elements(), 8);
        assert_eq!(rve3.all_boundary_nodes(&fnet).len(), 8);

        let fnet = SampleNetworks::asymmetric_2d();
        assert_eq!(rve2.all_boundary_nodes(&fnet), &[1, 2, 3, 4]);

        let fnet = SampleNetworks::asymmetric_3d();
        assert_eq!(rve3.all_boundary_nodes(&fnet), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(fnet.n_elements(), 7);
    }
}
