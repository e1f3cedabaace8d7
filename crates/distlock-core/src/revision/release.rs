// Release transaction: delete the session claim only if it still holds our secret

use distlock_common::{LockError, Result};
use distlock_store::{Compare, CompareOp, LeaseSession, Op, Txn};

use crate::key::LockKeys;

pub fn release_txn(keys: &LockKeys, secret: &str) -> Txn {
    Txn::new()
        .when([Compare::value(&keys.session, CompareOp::Equal, secret)])
        .and_then([Op::delete(&keys.session)])
}

pub(super) async fn release(session: &dyn LeaseSession, key: &str, secret: &str) -> Result<()> {
    let keys = LockKeys::derive(key, session.lease());
    let resp = session.client().txn(release_txn(&keys, secret)).await?;

    if !resp.succeeded {
        return Err(LockError::NotOwned);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use distlock_store::{KeyValue, NO_LEASE};

    use super::*;

    #[test]
    fn test_release_compares_value() {
        let keys = LockKeys::derive("job:42", 1);
        let txn = release_txn(&keys, "alpha");

        let held = KeyValue {
            key: "job:421".to_string(),
            value: "alpha".to_string(),
            create_revision: 2,
            mod_revision: 2,
            version: 1,
            lease: NO_LEASE,
        };
        let other = KeyValue {
            value: "beta".to_string(),
            ..held.clone()
        };

        assert!(txn.compares[0].evaluate(Some(&held)));
        assert!(!txn.compares[0].evaluate(Some(&other)));
        assert!(!txn.compares[0].evaluate(None));
        assert_eq!(txn.success, vec![Op::delete("job:421")]);
        assert!(txn.failure.is_empty());
    }
}
