use super::{Element, Node};
use crate::StrError;
use serde::{Deserialize, Serialize};

/// Identifies a pair of elements whose endpoint nodes are periodic images
/// across an RVE face
///
/// A relation starts as a node pair read from the template; the element
/// endpoints are resolved once, after the topology is finalized and before
/// any periodic-BC assembly, by [`collect_periodic_connection_info`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PbcRelation {
    /// First periodic node id
    pub node1: usize,

    /// Second periodic node id (image of node1 across the face)
    pub node2: usize,

    /// Element touching node1 (resolved)
    pub elem1: usize,

    /// Whether node1 is the first endpoint of elem1
    pub elem1_first: bool,

    /// Element touching node2 (resolved)
    pub elem2: usize,

    /// Whether node2 is the first endpoint of elem2
    pub elem2_first: bool,
}

impl PbcRelation {
    /// Creates an unresolved relation from a periodic node pair
    pub fn new(node1: usize, node2: usize) -> Self {
        PbcRelation {
            node1,
            node2,
            elem1: usize::MAX,
            elem1_first: false,
            elem2: usize::MAX,
            elem2_first: false,
        }
    }

    /// Returns whether the element endpoints have been resolved
    pub fn resolved(&self) -> bool {
        self.elem1 != usize::MAX && self.elem2 != usize::MAX
    }
}

/// Resolves the element endpoints of each periodic relation by linear scan
///
/// Matches each relation's node ids against element endpoints, O(elements ×
/// relations). Each periodic node must belong to at least one element; the
/// first match is taken on each side.
pub fn collect_periodic_connection_info(
    nodes: &[Node],
    elements: &[Element],
    relations: &mut [PbcRelation],
) -> Result<(), StrError> {
    for rel in relations.iter_mut() {
        if rel.node1 >= nodes.len() || rel.node2 >= nodes.len() {
            return Err("periodic relation references an out-of-bounds node id");
        }
        let mut found1 = false;
        for (jj, e) in elements.iter().enumerate() {
            if e.nodes[0] == rel.node1 {
                rel.elem1 = jj;
                rel.elem1_first = true;
                found1 = true;
                break;
            } else if e.nodes[1] == rel.node1 {
                rel.elem1 = jj;
                rel.elem1_first = false;
                found1 = true;
                break;
            }
        }
        if !found1 {
            return Err("periodic relation node1 matches no element endpoint");
        }
        let mut found2 = false;
        for (jj, e) in elements.iter().enumerate() {
            if e.nodes[0] == rel.node2 {
                rel.elem2 = jj;
                rel.elem2_first = true;
                found2 = true;
                break;
            } else if e.nodes[1] == rel.node2 {
                rel.elem2 = jj;
                rel.elem2_first = false;
                found2 = true;
                break;
            }
        }
        if !found2 {
            return Err("periodic relation node2 matches no element endpoint");
        }
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
