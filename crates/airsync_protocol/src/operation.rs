//! Change operations.

/// Type of change operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    /// A new item.
    Add,
    /// A changed item.
    Modify,
    /// A removed item.
    Remove,
    /// A request for the full content of an item.
    Fetch,
}

impl OperationType {
    /// Converts to a numeric code.
    pub fn to_code(&self) -> u8 {
        match self {
            OperationType::Add => 1,
            OperationType::Modify => 2,
            OperationType::Remove => 3,
            OperationType::Fetch => 4,
        }
    }

    /// Converts from a numeric code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(OperationType::Add),
            2 => Some(OperationType::Modify),
            3 => Some(OperationType::Remove),
            4 => Some(OperationType::Fetch),
            _ => None,
        }
    }
}

/// One change travelling through the change channel, in either direction.
///
/// `T` is the payload: a [`SyncItem`](crate::SyncItem) for collections, a
/// [`FolderEntry`](crate::FolderEntry) for the hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeOperation<T> {
    /// A new item. Client-originated adds carry the client id; server
    /// adds carry the server id.
    Add {
        /// Temporary id chosen by the client.
        client_id: Option<String>,
        /// Id assigned by the server.
        server_id: Option<String>,
        /// Item content.
        payload: T,
    },
    /// A changed item.
    Modify {
        /// Server id of the item.
        server_id: String,
        /// New content.
        payload: T,
    },
    /// A removed item.
    Remove {
        /// Server id of the item.
        server_id: String,
    },
    /// A request for the full content of an item.
    Fetch {
        /// Server id of the item.
        server_id: String,
    },
}

impl<T> ChangeOperation<T> {
    /// Returns the type of this operation.
    pub fn op_type(&self) -> OperationType {
        match self {
            ChangeOperation::Add { .. } => OperationType::Add,
            ChangeOperation::Modify { .. } => OperationType::Modify,
            ChangeOperation::Remove { .. } => OperationType::Remove,
            ChangeOperation::Fetch { .. } => OperationType::Fetch,
        }
    }

    /// Returns the server id, if one is known.
    pub fn server_id(&self) -> Option<&str> {
        match self {
            ChangeOperation::Add { server_id, .. } => server_id.as_deref(),
            ChangeOperation::Modify { server_id, .. }
            | ChangeOperation::Remove { server_id }
            | ChangeOperation::Fetch { server_id } => Some(server_id),
        }
    }

    /// Returns the payload of adds and modifies.
    pub fn payload(&self) -> Option<&T> {
        match self {
            ChangeOperation::Add { payload, .. } | ChangeOperation::Modify { payload, .. } => {
                Some(payload)
            }
            _ => None,
        }
    }

    /// Returns true for operations that change state.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, ChangeOperation::Fetch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_type_codes() {
        assert_eq!(OperationType::Add.to_code(), 1);
        assert_eq!(OperationType::from_code(3), Some(OperationType::Remove));
        assert_eq!(OperationType::from_code(0), None);
    }

    #[test]
    fn accessors() {
        let add: ChangeOperation<u32> = ChangeOperation::Add {
            client_id: Some("c1".into()),
            server_id: None,
            payload: 7,
        };
        assert_eq!(add.op_type(), OperationType::Add);
        assert_eq!(add.server_id(), None);
        assert_eq!(add.payload(), Some(&7));

        let fetch: ChangeOperation<u32> = ChangeOperation::Fetch {
            server_id: "s1".into(),
        };
        assert_eq!(fetch.server_id(), Some("s1"));
        assert!(!fetch.is_mutation());
        assert_eq!(fetch.payload(), None);
    }
}
