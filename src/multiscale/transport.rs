use crate::StrError;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Identifies one participant process of the distributed run
pub type Rank = usize;

/// Defines the point-to-point byte transport between ranks
///
/// All cross-rank state moves through this layer; there is no shared memory
/// across ranks. `recv` is the blocking receive (the message must be
/// deliverable); `try_recv` is the non-blocking probe used while polling for
/// messages whose arrival order is non-deterministic.
pub trait ScaleComm {
    /// Returns the number of participating ranks
    fn n_ranks(&self) -> usize;

    /// Delivers a message from one rank to another under a tag
    fn send(&self, from: Rank, to: Rank, tag: &str, bytes: Vec<u8>) -> Result<(), StrError>;

    /// Takes the oldest pending message with the given origin and tag
    fn recv(&self, at: Rank, from: Rank, tag: &str) -> Result<Vec<u8>, StrError>;

    /// Probes for a pending message without blocking
    fn try_recv(&self, at: Rank, from: Rank, tag: &str) -> Result<Option<Vec<u8>>, StrError>;
}

/// Implements an in-memory mailbox world
///
/// Messages are queued per (sender, receiver, tag) triple in FIFO order. The
/// world is cooperative: ranks run as ordinary code sharing this object, so
/// a blocking receive finding an empty queue is a protocol error (the peer
/// was expected to have sent already), not something to wait on.
pub struct LocalExchange {
    n_ranks: usize,
    queues: Mutex<HashMap<(Rank, Rank, String), VecDeque<Vec<u8>>>>,
}

impl LocalExchange {
    /// Allocates a new world with the given number of ranks
    pub fn new(n_ranks: usize) -> Result<Self, StrError> {
        if n_ranks < 2 {
            return Err("the exchange world needs at least two ranks");
        }
        Ok(LocalExchange {
            n_ranks,
            queues: Mutex::new(HashMap::new()),
        })
    }

    fn check(&self, rank: Rank) -> Result<(), StrError> {
        if rank >= self.n_ranks {
            return Err("rank is out of range for this exchange world");
        }
        Ok(())
    }
}

impl ScaleComm for LocalExchange {
    fn n_ranks(&self) -> usize {
        self.n_ranks
    }

    fn send(&self, from: Rank, to: Rank, tag: &str, bytes: Vec<u8>) -> Result<(), StrError> {
        self.check(from)?;
        self.check(to)?;
        let mut queues = self.queues.lock().map_err(|_| "the exchange world mutex is poisoned")?;
        queues.entry((from, to, tag.to_string())).or_default().push_back(bytes);
        Ok(())
    }

    fn recv(&self, at: Rank, from: Rank, tag: &str) -> Result<Vec<u8>, StrError> {
        match self.try_recv(at, from, tag)? {
            Some(bytes) => Ok(bytes),
            None => Err("blocking receive found an empty queue"),
        }
    }

    fn try_recv(&self, at: Rank, from: Rank, tag: &str) -> Result<Option<Vec<u8>>, StrError> {
        self.check(at)?;
        self.check(from)?;
        let mut queues = self.queues.lock().map_err(|_| "the exchange world mutex is poisoned")?;
        match queues.get_mut(&(from, at, tag.to_string())) {
            Some(queue) => Ok(queue.pop_front()),
            None => Ok(None),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{LocalExchange, ScaleComm};

    #[test]
    fn new_captures_errors() {
        assert_eq!(LocalExchange::new(1).err(), Some("the exchange world needs at least two ranks"));
    }

    #[test]
    fn messages_are_delivered_in_order() {
        let world = LocalExchange::new(2).unwrap();
        assert_eq!(world.n_ranks(), 2);
        world.send(0, 1, "data", vec![1]).unwrap();
        world.send(0, 1, "data", vec![2]).unwrap();
        world.send(0, 1, "other", vec![9]).unwrap();
        assert_eq!(world.recv(1, 0, "data").unwrap(), vec![1]);
        assert_eq!(world.try_recv(1, 0, "data").unwrap(), Some(vec![2]));
        assert_eq!(world.try_recv(1, 0, "data").unwrap(), None);
        assert_eq!(world.recv(1, 0, "other").unwrap(), vec![9]);
        assert_eq!(world.recv(1, 0, "data").err(), Some("blocking receive found an empty queue"));
    }

    #[test]
    fn ranks_are_validated() {
        let world = LocalExchange::new(2).unwrap();
        assert_eq!(
            world.send(0, 7, "data", vec![]).err(),
            Some("rank is out of range for this exchange world")
        );
        assert_eq!(
            world.try_recv(7, 0, "data").err(),
            Some("rank is out of range for this exchange world")
        );
    }
}
