//! Thin façade over intra-process (threads) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* addressed by `(peer, tag)`. Both
//! `send` and `recv` are blocking; a receive returns the oldest pending
//! message from that peer with that tag, so messages with the same tag are
//! delivered in FIFO order.

use std::collections::VecDeque;
use std::sync::{Arc, Barrier};

use bytes::Bytes;
use hashbrown::HashMap;
use parking_lot::{Condvar, Mutex};

use crate::amr_error::AmrError;

/// Blocking point-to-point communication interface.
pub trait Communicator {
    /// This process's rank; rank 0 is the master.
    fn rank(&self) -> usize;
    /// Total number of ranks, master included.
    fn size(&self) -> usize;
    fn send(&self, peer: usize, tag: u16, buf: &[u8]) -> Result<(), AmrError>;
    fn recv(&self, peer: usize, tag: u16) -> Result<Bytes, AmrError>;
    fn barrier(&self) -> Result<(), AmrError>;
}

// --- LocalComm: intra-process / one thread per rank ---
type Key = (usize, usize, u16); // (src, dst, tag)

#[derive(Debug)]
struct MailboxState {
    queues: HashMap<Key, VecDeque<Bytes>>,
    alive: Vec<bool>,
}

#[derive(Debug)]
struct Mailbox {
    state: Mutex<MailboxState>,
    arrived: Condvar,
    barrier: Barrier,
}

/// In-process endpoint of a simulated world; each endpoint is moved into the
/// thread playing that rank. Dropping an endpoint marks its rank as gone, and
/// peers blocked on it get [`AmrError::Disconnected`] instead of hanging.
#[derive(Debug)]
pub struct LocalComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
}

impl LocalComm {
    /// Create the `size` endpoints of one world, indexed by rank.
    pub fn world(size: usize) -> Vec<LocalComm> {
        let mailbox = Arc::new(Mailbox {
            state: Mutex::new(MailboxState {
                queues: HashMap::new(),
                alive: vec![true; size],
            }),
            arrived: Condvar::new(),
            barrier: Barrier::new(size),
        });
        (0..size)
            .map(|rank| LocalComm {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
            })
            .collect()
    }

    fn check_peer(&self, peer: usize) -> Result<(), AmrError> {
        if peer >= self.size {
            return Err(AmrError::Communication(format!(
                "rank {peer} out of range for world of size {}",
                self.size
            )));
        }
        Ok(())
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send(&self, peer: usize, tag: u16, buf: &[u8]) -> Result<(), AmrError> {
        self.check_peer(peer)?;
        let mut state = self.mailbox.state.lock();
        if !state.alive[peer] {
            return Err(AmrError::Disconnected { peer });
        }
        state
            .queues
            .entry((self.rank, peer, tag))
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
        drop(state);
        self.mailbox.arrived.notify_all();
        Ok(())
    }

    fn recv(&self, peer: usize, tag: u16) -> Result<Bytes, AmrError> {
        self.check_peer(peer)?;
        let key = (peer, self.rank, tag);
        let mut state = self.mailbox.state.lock();
        loop {
            if let Some(msg) = state.queues.get_mut(&key).and_then(VecDeque::pop_front) {
                return Ok(msg);
            }
            if !state.alive[peer] {
                return Err(AmrError::Disconnected { peer });
            }
            self.mailbox.arrived.wait(&mut state);
        }
    }

    fn barrier(&self) -> Result<(), AmrError> {
        self.mailbox.barrier.wait();
        Ok(())
    }
}

impl Drop for LocalComm {
    fn drop(&mut self) {
        self.mailbox.state.lock().alive[self.rank] = false;
        self.mailbox.arrived.notify_all();
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::environment::Universe;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::{Communicator as _, Destination, Source};

    /// `MPI_COMM_WORLD` endpoint. Owns the MPI universe, so MPI is finalized
    /// when this value is dropped.
    pub struct MpiComm {
        _universe: Universe,
        pub world: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        pub fn new() -> Result<Self, AmrError> {
            let universe = mpi::initialize()
                .ok_or_else(|| AmrError::Communication("MPI already initialized".into()))?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Ok(Self {
                _universe: universe,
                world,
                rank,
                size,
            })
        }
    }

    impl Communicator for MpiComm {
        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn send(&self, peer: usize, tag: u16, buf: &[u8]) -> Result<(), AmrError> {
            self.world
                .process_at_rank(peer as i32)
                .send_with_tag(buf, i32::from(tag));
            Ok(())
        }

        fn recv(&self, peer: usize, tag: u16) -> Result<Bytes, AmrError> {
            let (data, _status) = self
                .world
                .process_at_rank(peer as i32)
                .receive_vec_with_tag::<u8>(i32::from(tag));
            Ok(Bytes::from(data))
        }

        fn barrier(&self) -> Result<(), AmrError> {
            self.world.barrier();
            Ok(())
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

static_assertions::assert_impl_all!(LocalComm: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_roundtrip_two_ranks() {
        let mut world = LocalComm::world(2);
        let c1 = world.pop().unwrap();
        let c0 = world.pop().unwrap();

        let h = std::thread::spawn(move || c1.recv(0, 7).map(|b| b.to_vec()));
        c0.send(1, 7, &[1, 2, 3, 4]).unwrap();
        assert_eq!(h.join().unwrap().unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn fifo_per_tag_and_tag_isolation() {
        let world = LocalComm::world(2);
        for i in 0..5u8 {
            world[0].send(1, 1, &[i]).unwrap();
        }
        world[0].send(1, 2, &[99]).unwrap();
        assert_eq!(&world[1].recv(0, 2).unwrap()[..], &[99]);
        let got: Vec<u8> = (0..5).map(|_| world[1].recv(0, 1).unwrap()[0]).collect();
        assert_eq!(got, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn dropped_peer_is_reported() {
        let mut world = LocalComm::world(2);
        let c1 = world.pop().unwrap();
        let c0 = world.pop().unwrap();
        drop(c1);
        assert_eq!(c0.recv(1, 3), Err(AmrError::Disconnected { peer: 1 }));
        assert_eq!(c0.send(1, 3, &[0]), Err(AmrError::Disconnected { peer: 1 }));
    }

    #[test]
    fn out_of_range_peer_rejected() {
        let world = LocalComm::world(1);
        assert!(matches!(
            world[0].send(4, 0, &[]),
            Err(AmrError::Communication(_))
        ));
    }
}
