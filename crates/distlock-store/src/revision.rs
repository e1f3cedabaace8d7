//! Transactional revision store interface
//!
//! Models a strongly-consistent key-value store whose writes are stamped with a
//! store-wide, strictly increasing revision. A transaction evaluates a list of
//! compares atomically and runs either its success or its failure operations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use distlock_common::StoreError;

/// Store-wide write counter. `0` means "never written".
pub type Revision = i64;

/// Backend-issued lease identifier.
pub type LeaseId = i64;

/// Lease id carried by keys that are not bound to a lease
pub const NO_LEASE: LeaseId = 0;

/// A stored key with its revision metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
    /// Revision of the write that created the key
    pub create_revision: Revision,
    /// Revision of the last write to the key
    pub mod_revision: Revision,
    /// Number of writes since creation
    pub version: i64,
    pub lease: LeaseId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Greater,
    Less,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompareTarget {
    CreateRevision(Revision),
    ModRevision(Revision),
    Value(String),
}

/// One guard of a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compare {
    pub key: String,
    pub op: CompareOp,
    pub target: CompareTarget,
}

impl Compare {
    pub fn create_revision(key: impl Into<String>, op: CompareOp, revision: Revision) -> Self {
        Self {
            key: key.into(),
            op,
            target: CompareTarget::CreateRevision(revision),
        }
    }

    pub fn mod_revision(key: impl Into<String>, op: CompareOp, revision: Revision) -> Self {
        Self {
            key: key.into(),
            op,
            target: CompareTarget::ModRevision(revision),
        }
    }

    pub fn value(key: impl Into<String>, op: CompareOp, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            op,
            target: CompareTarget::Value(value.into()),
        }
    }

    /// Evaluate the guard against the current state of its key.
    ///
    /// A missing key has create and mod revision `0`. A value compare against
    /// a missing key never holds.
    pub fn evaluate(&self, current: Option<&KeyValue>) -> bool {
        let ordering = match (&self.target, current) {
            (CompareTarget::CreateRevision(rev), kv) => {
                kv.map_or(0, |kv| kv.create_revision).cmp(rev)
            }
            (CompareTarget::ModRevision(rev), kv) => kv.map_or(0, |kv| kv.mod_revision).cmp(rev),
            (CompareTarget::Value(_), None) => return false,
            (CompareTarget::Value(value), Some(kv)) => kv.value.as_str().cmp(value.as_str()),
        };

        match self.op {
            CompareOp::Equal => ordering.is_eq(),
            CompareOp::NotEqual => ordering.is_ne(),
            CompareOp::Greater => ordering.is_gt(),
            CompareOp::Less => ordering.is_lt(),
        }
    }
}

/// How a `Get` resolves its key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeScope {
    /// Exactly the given key
    Key,
    /// Every key under the given prefix, ordered by create revision ascending,
    /// limited to the first entry
    FirstCreated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Put {
        key: String,
        value: String,
        lease: Option<LeaseId>,
    },
    Get {
        key: String,
        scope: RangeScope,
    },
    Delete {
        key: String,
    },
}

impl Op {
    pub fn put(key: impl Into<String>, value: impl Into<String>) -> Self {
        Op::Put {
            key: key.into(),
            value: value.into(),
            lease: None,
        }
    }

    /// Put bound to a lease; the key is deleted when the lease ends
    pub fn put_with_lease(key: impl Into<String>, value: impl Into<String>, lease: LeaseId) -> Self {
        Op::Put {
            key: key.into(),
            value: value.into(),
            lease: Some(lease),
        }
    }

    pub fn get(key: impl Into<String>) -> Self {
        Op::Get {
            key: key.into(),
            scope: RangeScope::Key,
        }
    }

    /// Get the earliest-created key under a prefix
    pub fn get_first_created(prefix: impl Into<String>) -> Self {
        Op::Get {
            key: prefix.into(),
            scope: RangeScope::FirstCreated,
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Op::Delete { key: key.into() }
    }

    pub fn is_write(&self) -> bool {
        !matches!(self, Op::Get { .. })
    }
}

/// Result of one transaction operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpResponse {
    Range { kvs: Vec<KeyValue> },
    Put { prev: Option<KeyValue> },
    Delete { deleted: i64 },
}

impl OpResponse {
    /// Keys returned by a `Get`, `None` for other operations
    pub fn range(&self) -> Option<&[KeyValue]> {
        match self {
            OpResponse::Range { kvs } => Some(kvs),
            _ => None,
        }
    }
}

/// An atomic compare / then / else request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Txn {
    pub compares: Vec<Compare>,
    pub success: Vec<Op>,
    pub failure: Vec<Op>,
}

impl Txn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn when(mut self, compares: impl IntoIterator<Item = Compare>) -> Self {
        self.compares.extend(compares);
        self
    }

    pub fn and_then(mut self, ops: impl IntoIterator<Item = Op>) -> Self {
        self.success.extend(ops);
        self
    }

    pub fn or_else(mut self, ops: impl IntoIterator<Item = Op>) -> Self {
        self.failure.extend(ops);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxnResponse {
    /// Whether every compare held and the success branch ran
    pub succeeded: bool,
    /// Store revision after the transaction; the revision of its writes, if any
    pub revision: Revision,
    /// One entry per operation of the branch that ran
    pub responses: Vec<OpResponse>,
}

/// Client of a transactional revision store.
///
/// Implementors must apply a transaction atomically and assign revisions from a
/// single total order shared by every key of the store.
#[async_trait]
pub trait TxnClient: Send + Sync {
    async fn txn(&self, txn: Txn) -> Result<TxnResponse, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kv(value: &str, create_revision: Revision) -> KeyValue {
        KeyValue {
            key: "k".to_string(),
            value: value.to_string(),
            create_revision,
            mod_revision: create_revision,
            version: 1,
            lease: NO_LEASE,
        }
    }

    #[test]
    fn test_missing_key_has_zero_revision() {
        let cmp = Compare::create_revision("k", CompareOp::Equal, 0);
        assert!(cmp.evaluate(None));
        assert!(!cmp.evaluate(Some(&kv("v", 7))));
    }

    #[test]
    fn test_value_compare_on_missing_key_fails() {
        assert!(!Compare::value("k", CompareOp::Equal, "v").evaluate(None));
        assert!(!Compare::value("k", CompareOp::NotEqual, "v").evaluate(None));
        assert!(Compare::value("k", CompareOp::Equal, "v").evaluate(Some(&kv("v", 3))));
    }

    #[test]
    fn test_revision_ordering() {
        let current = kv("v", 5);
        assert!(Compare::mod_revision("k", CompareOp::Greater, 4).evaluate(Some(&current)));
        assert!(Compare::mod_revision("k", CompareOp::Less, 6).evaluate(Some(&current)));
        assert!(!Compare::create_revision("k", CompareOp::NotEqual, 5).evaluate(Some(&current)));
    }

    #[test]
    fn test_txn_builder() {
        let txn = Txn::new()
            .when([Compare::create_revision("a", CompareOp::Equal, 0)])
            .and_then([Op::put("a", "1"), Op::get_first_created("a")])
            .or_else([Op::get("a")]);
        assert_eq!(txn.compares.len(), 1);
        assert_eq!(txn.success.len(), 2);
        assert!(txn.success[0].is_write());
        assert!(!txn.failure[0].is_write());
    }
}
