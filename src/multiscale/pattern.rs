use super::Rank;
use crate::StrError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Holds a named, reconciled address map between the scales
///
/// Each routed integration point knows its macro owner (the rank sending
/// deformation data) and its micro owner (the rank solving the RVE). The
/// macroscale builds the pattern, ships it during the handshake, and both
/// sides re-reconcile after every assignment change; the inverse pattern for
/// the return path is derived, never maintained by hand.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CommPattern {
    /// Pattern name (for logs and handshake tags)
    pub name: String,

    /// Integration point id → (macro owner, micro owner)
    pub routes: BTreeMap<usize, (Rank, Rank)>,
}

impl CommPattern {
    /// Allocates an empty pattern
    pub fn new(name: &str) -> Self {
        CommPattern {
            name: name.to_string(),
            routes: BTreeMap::new(),
        }
    }

    /// Returns the number of routed integration points
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Checks whether the pattern routes anything
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Routes one integration point (migration delta: addition)
    pub fn add_data(&mut self, ip_id: usize, macro_rank: Rank, micro_rank: Rank) -> Result<(), StrError> {
        if self.routes.contains_key(&ip_id) {
            return Err("the integration point is already routed");
        }
        self.routes.insert(ip_id, (macro_rank, micro_rank));
        Ok(())
    }

    /// Drops routed integration points (migration delta: removal)
    pub fn remove_data(&mut self, ip_ids: &[usize]) -> Result<(), StrError> {
        for ip_id in ip_ids {
            if self.routes.remove(ip_id).is_none() {
                return Err("cannot remove an unrouted integration point");
            }
        }
        Ok(())
    }

    /// Returns the inbound set of one micro rank: (ip id, macro owner) pairs
    ///
    /// This is the reconciliation step: a micro rank learns which messages
    /// to expect and from whom, in deterministic (sorted) order.
    pub fn reconcile(&self, micro_rank: Rank) -> Vec<(usize, Rank)> {
        self.routes
            .iter()
            .filter(|(_, &(_, micro))| micro == micro_rank)
            .map(|(&ip_id, &(mac, _))| (ip_id, mac))
            .collect()
    }

    /// Returns the per-micro-rank resident counts
    pub fn assemble(&self) -> BTreeMap<Rank, usize> {
        let mut counts = BTreeMap::new();
        for &(_, micro) in self.routes.values() {
            *counts.entry(micro).or_insert(0) += 1;
        }
        counts
    }

    /// Derives the return-path pattern (owners swapped)
    pub fn invert(&self) -> CommPattern {
        CommPattern {
            name: format!("{}_inv", self.name),
            routes: self
                .routes
                .iter()
                .map(|(&ip_id, &(mac, micro))| (ip_id, (micro, mac)))
                .collect(),
        }
    }

    /// Absorbs the routes of another pattern (multi-macro-rank handshake)
    pub fn merge(&mut self, other: &CommPattern) -> Result<(), StrError> {
        for (&ip_id, &(mac, micro)) in &other.routes {
            self.add_data(ip_id, mac, micro)?;
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
