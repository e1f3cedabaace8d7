// In-memory revision store
// Single ordered map behind one mutex, so a transaction over several keys applies atomically

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use tokio::time::{Instant, interval};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use distlock_common::StoreError;

use crate::revision::{
    KeyValue, LeaseId, NO_LEASE, Op, OpResponse, RangeScope, Revision, Txn, TxnClient,
    TxnResponse,
};

struct LeaseEntry {
    ttl: Duration,
    deadline: Instant,
    /// Keys currently bound to this lease
    keys: BTreeSet<String>,
}

struct StoreState {
    kvs: BTreeMap<String, KeyValue>,
    revision: Revision,
    leases: HashMap<LeaseId, LeaseEntry>,
}

impl StoreState {
    fn new() -> Self {
        Self {
            kvs: BTreeMap::new(),
            revision: 1,
            leases: HashMap::new(),
        }
    }

    /// Revoke every lease whose deadline has passed
    fn expire_leases(&mut self, now: Instant) {
        let expired: Vec<LeaseId> = self
            .leases
            .iter()
            .filter(|(_, lease)| lease.deadline <= now)
            .map(|(id, _)| *id)
            .collect();

        for id in expired {
            if let Some(removed) = self.revoke(id) {
                debug!(lease = %format!("{:x}", id), removed, "Lease expired");
            }
        }
    }

    /// Drop a lease and the keys bound to it. Counts as one write.
    fn revoke(&mut self, id: LeaseId) -> Option<usize> {
        let lease = self.leases.remove(&id)?;
        let removed = lease
            .keys
            .iter()
            .filter(|key| self.kvs.remove(key.as_str()).is_some())
            .count();
        if removed > 0 {
            self.revision += 1;
        }
        Some(removed)
    }

    fn first_created(&self, prefix: &str) -> Option<&KeyValue> {
        self.kvs
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(_, kv)| kv)
            .min_by_key(|kv| kv.create_revision)
    }

    fn detach(&mut self, lease: LeaseId, key: &str) {
        if lease != NO_LEASE
            && let Some(entry) = self.leases.get_mut(&lease)
        {
            entry.keys.remove(key);
        }
    }

    fn put_at(
        &mut self,
        key: String,
        value: String,
        lease: LeaseId,
        revision: Revision,
    ) -> Option<KeyValue> {
        let prev = self.kvs.get(&key).cloned();
        if let Some(ref prev) = prev
            && prev.lease != lease
        {
            self.detach(prev.lease, &key);
        }
        if lease != NO_LEASE
            && let Some(entry) = self.leases.get_mut(&lease)
        {
            entry.keys.insert(key.clone());
        }

        let kv = match prev {
            Some(ref prev) => KeyValue {
                key: key.clone(),
                value,
                create_revision: prev.create_revision,
                mod_revision: revision,
                version: prev.version + 1,
                lease,
            },
            None => KeyValue {
                key: key.clone(),
                value,
                create_revision: revision,
                mod_revision: revision,
                version: 1,
                lease,
            },
        };
        self.kvs.insert(key, kv);
        prev
    }

    fn delete_key(&mut self, key: &str) -> bool {
        match self.kvs.remove(key) {
            Some(kv) => {
                self.detach(kv.lease, key);
                true
            }
            None => false,
        }
    }

    /// Execute a transaction with two-phase validation
    fn apply(&mut self, txn: Txn) -> Result<TxnResponse, StoreError> {
        let succeeded = txn
            .compares
            .iter()
            .all(|cmp| cmp.evaluate(self.kvs.get(&cmp.key)));
        let ops = if succeeded { txn.success } else { txn.failure };

        // Phase 1: reject the whole branch before touching anything
        for op in &ops {
            if let Op::Put {
                lease: Some(lease), ..
            } = op
                && *lease != NO_LEASE
                && !self.leases.contains_key(lease)
            {
                return Err(StoreError::LeaseNotFound(*lease));
            }
        }

        // Phase 2: every write of the branch shares the next revision
        let next = self.revision + 1;
        let mut written = false;
        let mut responses = Vec::with_capacity(ops.len());

        for op in ops {
            let response = match op {
                Op::Get {
                    key,
                    scope: RangeScope::Key,
                } => OpResponse::Range {
                    kvs: self.kvs.get(&key).cloned().into_iter().collect(),
                },
                Op::Get {
                    key,
                    scope: RangeScope::FirstCreated,
                } => OpResponse::Range {
                    kvs: self.first_created(&key).cloned().into_iter().collect(),
                },
                Op::Put { key, value, lease } => {
                    written = true;
                    OpResponse::Put {
                        prev: self.put_at(key, value, lease.unwrap_or(NO_LEASE), next),
                    }
                }
                Op::Delete { key } => {
                    let deleted = self.delete_key(&key);
                    written |= deleted;
                    OpResponse::Delete {
                        deleted: deleted as i64,
                    }
                }
            };
            responses.push(response);
        }

        if written {
            self.revision = next;
        }

        Ok(TxnResponse {
            succeeded,
            revision: self.revision,
            responses,
        })
    }
}

/// In-memory transactional store with a global revision counter and leases.
///
/// Expired leases are revoked lazily at the start of every call; an optional
/// background task does the same on an interval.
#[derive(Clone)]
pub struct MemoryTxnStore {
    state: Arc<Mutex<StoreState>>,
    /// Simulated round-trip time added to every transaction
    latency: Option<Duration>,
}

impl Default for MemoryTxnStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTxnStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::new())),
            latency: None,
        }
    }

    /// Delay every transaction by `latency`. Clones share data, not latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Current store revision
    pub fn revision(&self) -> Revision {
        self.state.lock().revision
    }

    /// Grant a lease that expires `ttl` after its last keep-alive
    pub fn grant_lease(&self, ttl: Duration) -> LeaseId {
        let mut state = self.state.lock();
        let mut rng = rand::rng();
        let id = loop {
            let candidate = rng.random_range(1..i64::MAX);
            if !state.leases.contains_key(&candidate) {
                break candidate;
            }
        };
        state.leases.insert(
            id,
            LeaseEntry {
                ttl,
                deadline: Instant::now() + ttl,
                keys: BTreeSet::new(),
            },
        );
        id
    }

    /// Push the lease deadline one TTL into the future
    pub fn keep_alive_lease(&self, id: LeaseId) -> Result<Duration, StoreError> {
        let mut state = self.state.lock();
        let now = Instant::now();
        state.expire_leases(now);
        let lease = state
            .leases
            .get_mut(&id)
            .ok_or(StoreError::LeaseNotFound(id))?;
        lease.deadline = now + lease.ttl;
        Ok(lease.ttl)
    }

    /// Revoke a lease, returning the number of keys deleted with it
    pub fn revoke_lease(&self, id: LeaseId) -> Result<usize, StoreError> {
        self.state
            .lock()
            .revoke(id)
            .ok_or(StoreError::LeaseNotFound(id))
    }

    pub fn lease_exists(&self, id: LeaseId) -> bool {
        let mut state = self.state.lock();
        state.expire_leases(Instant::now());
        state.leases.contains_key(&id)
    }

    /// Read a single key
    pub fn get(&self, key: &str) -> Option<KeyValue> {
        let mut state = self.state.lock();
        state.expire_leases(Instant::now());
        state.kvs.get(key).cloned()
    }

    /// Read every key under a prefix, in key order
    pub fn get_prefix(&self, prefix: &str) -> Vec<KeyValue> {
        let mut state = self.state.lock();
        state.expire_leases(Instant::now());
        state
            .kvs
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(_, kv)| kv.clone())
            .collect()
    }

    /// Unconditional write outside of any lease
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) -> KeyValue {
        let key = key.into();
        let mut state = self.state.lock();
        let next = state.revision + 1;
        state.put_at(key.clone(), value.into(), NO_LEASE, next);
        state.revision = next;
        state.kvs[&key].clone()
    }

    /// Start a background task revoking expired leases until `cancel` fires
    pub fn start_expiry_task(
        &self,
        period: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let state = self.state.clone();
        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => state.lock().expire_leases(Instant::now()),
                    _ = cancel.cancelled() => break,
                }
            }
        })
    }
}

#[async_trait]
impl TxnClient for MemoryTxnStore {
    async fn txn(&self, txn: Txn) -> Result<TxnResponse, StoreError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock();
        state.expire_leases(Instant::now());
        state.apply(txn)
    }
}
