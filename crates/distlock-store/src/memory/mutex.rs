// In-memory coordination-service mutex
// One node per path; participants park on a condvar until the holder releases

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};

use distlock_common::StoreError;

use crate::mutex::{DistributedMutex, MutexService};

struct Holder {
    participant: u64,
    data: Vec<u8>,
}

#[derive(Default)]
struct MutexNode {
    holder: Mutex<Option<Holder>>,
    released: Condvar,
}

#[derive(Clone, Default)]
pub struct MemoryMutexService {
    nodes: Arc<DashMap<String, Arc<MutexNode>>>,
    next_participant: Arc<AtomicU64>,
}

impl MemoryMutexService {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&self, path: &str) -> Arc<MutexNode> {
        self.nodes
            .entry(path.to_string())
            .or_insert_with(|| Arc::new(MutexNode::default()))
            .clone()
    }

    pub fn is_locked(&self, path: &str) -> bool {
        self.nodes
            .get(path)
            .is_some_and(|node| node.holder.lock().is_some())
    }

    /// Data attached by the current holder of `path`
    pub fn holder_data(&self, path: &str) -> Option<Vec<u8>> {
        let node = self.nodes.get(path)?.clone();
        let holder = node.holder.lock();
        holder.as_ref().map(|h| h.data.clone())
    }
}

impl MutexService for MemoryMutexService {
    fn mutex(&self, path: &str) -> Arc<dyn DistributedMutex> {
        Arc::new(MemoryMutex {
            node: self.node(path),
            participant: self.next_participant.fetch_add(1, Ordering::SeqCst),
        })
    }
}

struct MemoryMutex {
    node: Arc<MutexNode>,
    participant: u64,
}

impl DistributedMutex for MemoryMutex {
    fn lock_with_data(&self, data: &[u8]) -> Result<(), StoreError> {
        let mut holder = self.node.holder.lock();
        loop {
            let held_by = holder.as_ref().map(|h| h.participant);
            match held_by {
                None => break,
                Some(p) if p == self.participant => return Err(StoreError::Deadlock),
                Some(_) => self.node.released.wait(&mut holder),
            }
        }
        *holder = Some(Holder {
            participant: self.participant,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn unlock(&self) -> Result<(), StoreError> {
        let mut holder = self.node.holder.lock();
        match holder.as_ref() {
            Some(h) if h.participant == self.participant => {
                *holder = None;
                drop(holder);
                self.node.released.notify_one();
                Ok(())
            }
            _ => Err(StoreError::NotLocked),
        }
    }
}
