//! Lock key scheme
//!
//! A logical lock name is never written directly. Each contending session
//! writes its claim to `name ++ hex(lease)`, and the current owner is found by
//! looking up the earliest-created key under `name`.
//!
//! The lookup is a prefix range, so a name that is a prefix of another name
//! (`job:4`, `job:42`) sees the longer name's claims. Terminate names with a
//! delimiter when that matters.

use distlock_store::LeaseId;

/// Keys derived from one logical lock name for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockKeys {
    /// Caller-visible name; prefix of every session claim on it
    pub logical: String,
    /// This session's claim slot
    pub session: String,
}

impl LockKeys {
    pub fn derive(key: &str, lease: LeaseId) -> Self {
        Self {
            logical: key.to_string(),
            session: session_key(key, lease),
        }
    }
}

/// Claim slot of `lease` on `key`: the key followed by the lowercase hex lease id
pub fn session_key(key: &str, lease: LeaseId) -> String {
    format!("{}{:x}", key, lease)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_session_key_format() {
        assert_eq!(session_key("job:42", 0x694d7b1c2e5a), "job:42694d7b1c2e5a");
        assert_eq!(session_key("", 255), "ff");
    }

    #[test]
    fn test_derive() {
        let keys = LockKeys::derive("job:42", 10);
        assert_eq!(keys.logical, "job:42");
        assert_eq!(keys.session, "job:42a");
    }

    proptest! {
        #[test]
        fn session_key_stays_under_logical_key(key in ".{0,32}", lease in 1i64..i64::MAX) {
            let keys = LockKeys::derive(&key, lease);
            prop_assert!(keys.session.starts_with(&keys.logical));
            prop_assert!(keys.session.len() > keys.logical.len());
        }

        #[test]
        fn distinct_leases_get_distinct_slots(
            key in "[a-z:/]{1,16}",
            a in 1i64..i64::MAX,
            b in 1i64..i64::MAX,
        ) {
            prop_assume!(a != b);
            prop_assert_ne!(session_key(&key, a), session_key(&key, b));
        }
    }
}
