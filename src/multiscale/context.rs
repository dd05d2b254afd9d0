use super::{Rank, ScaleComm};
use crate::StrError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Number of probes before a polling receive gives up
pub const MAX_POLLS: usize = 1_000_000;

/// Holds one rank's view of the distributed run
///
/// The context owns the transport handle and the macro/micro rank lists and
/// provides typed (JSON) send/receive helpers on top of the byte transport.
/// It is constructed explicitly at startup and passed to every component
/// that exchanges cross-rank data; its lifetime is the distributed run.
pub struct CouplingContext {
    /// This rank
    pub rank: Rank,

    /// Ranks running the macroscale analysis
    pub macro_ranks: Vec<Rank>,

    /// Ranks running RVE analyses
    pub micro_ranks: Vec<Rank>,

    /// The byte transport shared by all ranks of this process (in-memory
    /// worlds) or wrapping the real interconnect
    transport: Arc<dyn ScaleComm>,
}

impl CouplingContext {
    /// Allocates a new instance
    pub fn new(
        rank: Rank,
        macro_ranks: Vec<Rank>,
        micro_ranks: Vec<Rank>,
        transport: Arc<dyn ScaleComm>,
    ) -> Result<Self, StrError> {
        if macro_ranks.is_empty() || micro_ranks.is_empty() {
            return Err("both scales need at least one rank");
        }
        if macro_ranks.iter().any(|r| micro_ranks.contains(r)) {
            return Err("a rank cannot belong to both scales");
        }
        if !macro_ranks.contains(&rank) && !micro_ranks.contains(&rank) {
            return Err("the context rank must belong to one of the scales");
        }
        Ok(CouplingContext {
            rank,
            macro_ranks,
            micro_ranks,
            transport,
        })
    }

    /// Checks whether this rank runs the macroscale
    pub fn is_macro(&self) -> bool {
        self.macro_ranks.contains(&self.rank)
    }

    /// Serializes and sends a value to another rank
    pub fn send<T: Serialize>(&self, to: Rank, tag: &str, value: &T) -> Result<(), StrError> {
        let bytes = serde_json::to_vec(value).map_err(|_| "cannot serialize outbound payload")?;
        self.transport.send(self.rank, to, tag, bytes)
    }

    /// Receives and deserializes a value (blocking)
    pub fn recv<T: DeserializeOwned>(&self, from: Rank, tag: &str) -> Result<T, StrError> {
        let bytes = self.transport.recv(self.rank, from, tag)?;
        serde_json::from_slice(&bytes).map_err(|_| "cannot deserialize inbound payload")
    }

    /// Probes for a value without blocking
    pub fn try_recv<T: DeserializeOwned>(&self, from: Rank, tag: &str) -> Result<Option<T>, StrError> {
        match self.transport.try_recv(self.rank, from, tag)? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes).map_err(|_| "cannot deserialize inbound payload")?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Polls for a value, yielding between probes
    ///
    /// Used during the catalog handshake, where peer messages arrive in a
    /// non-deterministic order.
    pub fn poll_recv<T: DeserializeOwned>(&self, from: Rank, tag: &str) -> Result<T, StrError> {
        for _ in 0..MAX_POLLS {
            if let Some(value) = self.try_recv(from, tag)? {
                return Ok(value);
            }
            std::thread::yield_now();
        }
        Err("timed out while polling for a message")
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
