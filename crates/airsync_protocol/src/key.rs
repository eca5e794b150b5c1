//! Sync keys.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Version token for one replica state of a collection or of the hierarchy.
///
/// Server-issued keys have the form `{uuid}counter`; the uuid names the
/// key chain and the counter advances by one per issued key. `"0"` is
/// the initial key. Keys the client makes up are carried verbatim and
/// simply fail to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SyncKey(String);

impl SyncKey {
    /// The initial key, meaning "no prior state".
    pub const INITIAL: &'static str = "0";

    /// Wraps a key as presented by the client.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the initial key.
    pub fn initial() -> Self {
        Self(Self::INITIAL.to_string())
    }

    /// Returns true for the initial key.
    pub fn is_initial(&self) -> bool {
        self.0 == Self::INITIAL
    }

    /// Returns the key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits a server-issued key into its chain id and counter.
    pub fn components(&self) -> Option<(Uuid, u32)> {
        let rest = self.0.strip_prefix('{')?;
        let (uuid, counter) = rest.split_once('}')?;
        let uuid = Uuid::parse_str(uuid).ok()?;
        let counter = counter.parse().ok()?;
        Some((uuid, counter))
    }

    /// Returns the key that follows this one.
    ///
    /// The initial key, and any key that was not issued by the server,
    /// starts a fresh chain at counter 1.
    pub fn next(&self) -> Self {
        match self.components() {
            Some((uuid, counter)) => Self::from_parts(uuid, counter.saturating_add(1)),
            None => Self::from_parts(Uuid::new_v4(), 1),
        }
    }

    fn from_parts(uuid: Uuid, counter: u32) -> Self {
        Self(format!("{{{uuid}}}{counter}"))
    }
}

impl fmt::Display for SyncKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SyncKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for SyncKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_key_starts_chain() {
        let key = SyncKey::initial();
        assert!(key.is_initial());
        let next = key.next();
        assert!(!next.is_initial());
        assert_eq!(next.components().unwrap().1, 1);
    }

    #[test]
    fn next_keeps_chain_and_advances() {
        let first = SyncKey::initial().next();
        let second = first.next();
        let (a, one) = first.components().unwrap();
        let (b, two) = second.components().unwrap();
        assert_eq!(a, b);
        assert_eq!(one + 1, two);
        assert_ne!(first, second);
    }

    #[test]
    fn foreign_key_has_no_components() {
        assert!(SyncKey::new("12345").components().is_none());
        assert!(SyncKey::new("{not-a-uuid}3").components().is_none());
    }

    #[test]
    fn display_is_raw_text() {
        let key = SyncKey::new("{00000000-0000-0000-0000-000000000000}7");
        assert_eq!(key.to_string(), "{00000000-0000-0000-0000-000000000000}7");
        assert_eq!(key.components().unwrap().1, 7);
    }

    proptest::proptest! {
        #[test]
        fn issued_keys_parse_back(counter in 0u32..u32::MAX) {
            let uuid = Uuid::new_v4();
            let key = SyncKey::from_parts(uuid, counter);
            proptest::prop_assert_eq!(key.components(), Some((uuid, counter)));
            let next = key.next();
            proptest::prop_assert_eq!(next.components(), Some((uuid, counter + 1)));
        }
    }
}
