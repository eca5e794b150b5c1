//! Conflict policy.

use serde::{Deserialize, Serialize};

/// Which side wins when the client and the server changed the same item
/// in the same round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictPolicy {
    /// The client change overwrites the server change.
    ClientWins,
    /// The server change is kept and the client change is dropped.
    #[default]
    ServerWins,
}

impl ConflictPolicy {
    /// Converts to the wire code.
    pub fn to_code(&self) -> u8 {
        match self {
            ConflictPolicy::ClientWins => 0,
            ConflictPolicy::ServerWins => 1,
        }
    }

    /// Converts from the wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ConflictPolicy::ClientWins),
            1 => Some(ConflictPolicy::ServerWins),
            _ => None,
        }
    }

    /// Returns true if the server version is kept on conflict.
    pub fn server_wins(&self) -> bool {
        matches!(self, ConflictPolicy::ServerWins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes() {
        assert_eq!(ConflictPolicy::ClientWins.to_code(), 0);
        assert_eq!(ConflictPolicy::from_code(1), Some(ConflictPolicy::ServerWins));
        assert_eq!(ConflictPolicy::from_code(2), None);
    }

    #[test]
    fn default_is_server_wins() {
        assert!(ConflictPolicy::default().server_wins());
    }
}
