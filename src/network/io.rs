use super::{FiberNetwork, FiberReaction, Node};
use crate::base::FiberMember;
use crate::StrError;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

/// Holds the file-backed description of a fiber-network template
///
/// A template is the plain-data form of a [`FiberNetwork`]: nodes, element
/// connectivity with per-element fiber-reaction assignments, the reaction
/// parameter sets, and the periodic node pairs. Templates are loaded once
/// per RVE type at startup and instantiated (cloned) on assignment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkTemplate {
    /// Space dimension (2 or 3)
    pub ndim: usize,

    /// Structural model of the fibers
    pub member: FiberMember,

    /// Node reference coordinates
    pub nodes: Vec<Node>,

    /// Element connectivity: (node1, node2, reaction index)
    pub elements: Vec<(usize, usize, usize)>,

    /// Fiber reaction parameter sets
    pub reactions: Vec<FiberReaction>,

    /// Periodic node pairs
    pub pbc_pairs: Vec<(usize, usize)>,
}

impl NetworkTemplate {
    /// Extracts the template of an existing network
    pub fn from_network(network: &FiberNetwork) -> Self {
        NetworkTemplate {
            ndim: network.ndim,
            member: network.member,
            nodes: network.nodes.clone(),
            elements: network
                .elements
                .iter()
                .map(|e| (e.nodes[0], e.nodes[1], e.reaction))
                .collect(),
            reactions: network.reactions.as_ref().clone(),
            pbc_pairs: network.pbc.iter().map(|r| (r.node1, r.node2)).collect(),
        }
    }

    /// Instantiates a network from this template
    ///
    /// Validates the topology, recomputes rest lengths, and resolves the
    /// periodic relations.
    pub fn to_network(&self) -> Result<FiberNetwork, StrError> {
        FiberNetwork::new(
            self.ndim,
            self.member,
            self.nodes.clone(),
            &self.elements,
            std::sync::Arc::new(self.reactions.clone()),
            &self.pbc_pairs,
        )
    }

    /// Reads a template from a JSON file
    pub fn read_json<P>(full_path: &P) -> Result<Self, StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let path = Path::new(full_path).to_path_buf();
        let file = File::open(&path).map_err(|_| "cannot open network template file")?;
        let reader = BufReader::new(file);
        let template = serde_json::from_reader(reader).map_err(|_| "cannot parse network template file")?;
        Ok(template)
    }

    /// Writes this template to a JSON file
    pub fn write_json<P>(&self, full_path: &P) -> Result<(), StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let path = Path::new(full_path).to_path_buf();
        if let Some(p) = path.parent() {
            fs::create_dir_all(p).map_err(|_| "cannot create directory for network template")?;
        }
        let mut file = File::create(&path).map_err(|_| "cannot create network template file")?;
        serde_json::to_writer_pretty(&mut file, &self).map_err(|_| "cannot write network template file")?;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
