// Acquisition transaction and ownership decision

use tracing::{debug, warn};

use distlock_common::{LockError, Result, StoreError};
use distlock_store::{
    Compare, CompareOp, LeaseId, LeaseSession, Op, OpResponse, Revision, Txn, TxnClient,
    TxnResponse,
};

use super::RevisionLockOptions;
use crate::key::LockKeys;

/// What one acquisition transaction observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    /// Create revision of this session's claim
    pub revision: Revision,
    /// Earliest claim under the logical key
    pub owner_key: Option<String>,
    /// Create revision of `owner_key`
    pub owner_revision: Option<Revision>,
    /// This transaction wrote the claim; false when it already existed
    pub created: bool,
}

impl Claim {
    pub fn is_owner(&self) -> bool {
        self.owner_revision
            .is_none_or(|owner| owner == self.revision)
    }
}

/// Write the session claim if it is absent, then read back the claim and the
/// earliest-created key under the logical name, all in one transaction.
pub fn acquisition_txn(keys: &LockKeys, secret: &str, lease: LeaseId) -> Txn {
    Txn::new()
        .when([Compare::create_revision(&keys.session, CompareOp::Equal, 0)])
        .and_then([
            Op::put_with_lease(&keys.session, secret, lease),
            Op::get_first_created(&keys.logical),
        ])
        .or_else([
            Op::get(&keys.session),
            Op::get_first_created(&keys.logical),
        ])
}

/// Interpret a response to [`acquisition_txn`]
pub fn resolve_claim(resp: &TxnResponse) -> std::result::Result<Claim, StoreError> {
    let revision = if resp.succeeded {
        resp.revision
    } else {
        resp.responses
            .first()
            .and_then(OpResponse::range)
            .and_then(|kvs| kvs.first())
            .map(|kv| kv.create_revision)
            .ok_or_else(|| {
                StoreError::Internal("session claim missing from acquisition response".to_string())
            })?
    };

    let owner = resp
        .responses
        .get(1)
        .and_then(OpResponse::range)
        .ok_or_else(|| {
            StoreError::Internal("owner lookup missing from acquisition response".to_string())
        })?
        .first();

    Ok(Claim {
        revision,
        owner_key: owner.map(|kv| kv.key.clone()),
        owner_revision: owner.map(|kv| kv.create_revision),
        created: resp.succeeded,
    })
}

pub(super) async fn acquire(
    session: &dyn LeaseSession,
    options: &RevisionLockOptions,
    key: &str,
    secret: &str,
) -> Result<()> {
    let lease = session.lease();
    let keys = LockKeys::derive(key, lease);
    let client = session.client();

    let resp = client.txn(acquisition_txn(&keys, secret, lease)).await?;
    let claim = resolve_claim(&resp)?;

    if claim.is_owner() {
        debug!(
            key = %key,
            revision = claim.revision,
            created = claim.created,
            "Claim is the earliest under key"
        );
        return Ok(());
    }

    debug!(
        key = %key,
        revision = claim.revision,
        owner_revision = ?claim.owner_revision,
        "Claim lost to an earlier one"
    );
    if !options.retain_losing_claims
        && let Some(txn) = withdrawal_txn(&keys, &claim)
    {
        withdraw_claim(client.as_ref(), &keys, txn).await;
    }
    Err(LockError::Locked)
}

/// Delete a losing claim while the claim that beat it is still in place.
///
/// Both create revisions must be unchanged. Once the owner is gone this claim
/// may be the earliest, and another call on the same session may already hold
/// the lock through it. `None` when `claim` has no owner to lose to.
pub fn withdrawal_txn(keys: &LockKeys, claim: &Claim) -> Option<Txn> {
    let owner_key = claim.owner_key.as_ref()?;
    let owner_revision = claim.owner_revision?;

    Some(
        Txn::new()
            .when([
                Compare::create_revision(&keys.session, CompareOp::Equal, claim.revision),
                Compare::create_revision(owner_key, CompareOp::Equal, owner_revision),
            ])
            .and_then([Op::delete(&keys.session)]),
    )
}

async fn withdraw_claim(client: &dyn TxnClient, keys: &LockKeys, txn: Txn) {
    match client.txn(txn).await {
        Ok(resp) if !resp.succeeded => {
            debug!(key = %keys.logical, "Losing claim kept, owner changed meanwhile");
        }
        Ok(_) => {}
        Err(e) => warn!("Failed to withdraw losing claim '{}': {}", keys.session, e),
    }
}

#[cfg(test)]
mod tests {
    use distlock_store::{KeyValue, NO_LEASE, RangeScope};
    use proptest::prelude::*;

    use super::*;

    fn kv(key: &str, create_revision: Revision) -> KeyValue {
        KeyValue {
            key: key.to_string(),
            value: "v".to_string(),
            create_revision,
            mod_revision: create_revision,
            version: 1,
            lease: NO_LEASE,
        }
    }

    #[test]
    fn test_txn_shape() {
        let keys = LockKeys::derive("job:42", 0xab);
        let txn = acquisition_txn(&keys, "alpha", 0xab);

        assert_eq!(txn.compares.len(), 1);
        assert!(txn.compares[0].evaluate(None));
        assert_eq!(
            txn.success,
            vec![
                Op::put_with_lease("job:42ab", "alpha", 0xab),
                Op::get_first_created("job:42"),
            ]
        );
        assert_eq!(
            txn.failure[1],
            Op::Get {
                key: "job:42".to_string(),
                scope: RangeScope::FirstCreated
            }
        );
        assert!(!txn.failure.iter().any(Op::is_write));
    }

    #[test]
    fn test_fresh_claim_on_free_key_wins() {
        let resp = TxnResponse {
            succeeded: true,
            revision: 7,
            responses: vec![
                OpResponse::Put { prev: None },
                OpResponse::Range { kvs: vec![kv("job:42ab", 7)] },
            ],
        };
        let claim = resolve_claim(&resp).unwrap();
        assert_eq!(
            claim,
            Claim {
                revision: 7,
                owner_key: Some("job:42ab".to_string()),
                owner_revision: Some(7),
                created: true
            }
        );
        assert!(claim.is_owner());
    }

    #[test]
    fn test_existing_claim_uses_its_create_revision() {
        let resp = TxnResponse {
            succeeded: false,
            revision: 30,
            responses: vec![
                OpResponse::Range { kvs: vec![kv("job:42ab", 12)] },
                OpResponse::Range { kvs: vec![kv("job:42ab", 12)] },
            ],
        };
        let claim = resolve_claim(&resp).unwrap();
        assert_eq!(claim.revision, 12);
        assert!(!claim.created);
        assert!(claim.is_owner());
    }

    #[test]
    fn test_earlier_claim_owns_key() {
        let resp = TxnResponse {
            succeeded: true,
            revision: 9,
            responses: vec![
                OpResponse::Put { prev: None },
                OpResponse::Range { kvs: vec![kv("job:42cd", 4)] },
            ],
        };
        let claim = resolve_claim(&resp).unwrap();
        assert_eq!(claim.owner_revision, Some(4));
        assert_eq!(claim.owner_key.as_deref(), Some("job:42cd"));
        assert!(!claim.is_owner());
    }

    #[test]
    fn test_empty_owner_lookup_wins() {
        let claim = Claim {
            revision: 3,
            owner_key: None,
            owner_revision: None,
            created: true,
        };
        assert!(claim.is_owner());
        assert!(withdrawal_txn(&LockKeys::derive("job:42", 0xab), &claim).is_none());
    }

    #[test]
    fn test_withdrawal_requires_owner_in_place() {
        let keys = LockKeys::derive("job:42", 0xab);
        let claim = Claim {
            revision: 9,
            owner_key: Some("job:42cd".to_string()),
            owner_revision: Some(4),
            created: true,
        };
        let txn = withdrawal_txn(&keys, &claim).unwrap();

        let ours = kv("job:42ab", 9);
        let owner = kv("job:42cd", 4);
        let holds = |session: Option<&KeyValue>, owner: Option<&KeyValue>| {
            txn.compares[0].evaluate(session) && txn.compares[1].evaluate(owner)
        };

        assert!(holds(Some(&ours), Some(&owner)));
        // Owner released: this claim may now be the earliest and must stay
        assert!(!holds(Some(&ours), None));
        // Owner re-acquired under a newer claim
        assert!(!holds(Some(&ours), Some(&kv("job:42cd", 15))));
        // Our claim was recreated since
        assert!(!holds(Some(&kv("job:42ab", 11)), Some(&owner)));
        assert_eq!(txn.success, vec![Op::delete("job:42ab")]);
        assert!(txn.failure.is_empty());
    }

    #[test]
    fn test_malformed_response_is_internal_error() {
        let resp = TxnResponse {
            succeeded: false,
            revision: 5,
            responses: vec![OpResponse::Range { kvs: vec![] }],
        };
        assert!(matches!(resolve_claim(&resp), Err(StoreError::Internal(_))));

        let resp = TxnResponse {
            succeeded: true,
            revision: 5,
            responses: vec![OpResponse::Put { prev: None }],
        };
        assert!(matches!(resolve_claim(&resp), Err(StoreError::Internal(_))));
    }

    proptest! {
        #[test]
        fn only_the_earliest_claim_owns(
            owner in 1i64..1_000,
            offset in 0i64..1_000,
            succeeded in any::<bool>(),
        ) {
            let revision = owner + offset;
            let first = if succeeded {
                OpResponse::Put { prev: None }
            } else {
                OpResponse::Range { kvs: vec![kv("k1", revision)] }
            };
            let resp = TxnResponse {
                succeeded,
                revision,
                responses: vec![first, OpResponse::Range { kvs: vec![kv("k0", owner)] }],
            };

            let claim = resolve_claim(&resp).unwrap();
            prop_assert_eq!(claim.revision, revision);
            prop_assert_eq!(claim.created, succeeded);
            prop_assert_eq!(claim.is_owner(), offset == 0);
        }
    }
}
