//! Per-command status namespaces.
//!
//! Every reply starts with a status drawn from the namespace of its
//! command. The same numeric value means different things in different
//! namespaces, so each command gets its own enum.

macro_rules! status_namespace {
    ($(#[$doc:meta])* $name:ident { $($(#[$vdoc:meta])* $variant:ident = $code:literal),* $(,)? }) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum $name {
            $($(#[$vdoc])* $variant = $code),*
        }

        impl $name {
            /// Returns the numeric wire code.
            pub fn code(self) -> u16 {
                self as u16
            }

            /// Converts from a numeric wire code.
            pub fn from_code(code: u16) -> Option<Self> {
                match code {
                    $($code => Some(Self::$variant),)*
                    _ => None,
                }
            }
        }

        impl From<$name> for u16 {
            fn from(status: $name) -> u16 {
                status.code()
            }
        }
    };
}

status_namespace! {
    /// Status codes of the Sync command (collection and item level).
    SyncStatus {
        /// Success.
        Success = 1,
        /// The presented sync key is unknown or stale.
        InvalidSyncKey = 3,
        /// Malformed request.
        ProtocolError = 4,
        /// Server-side failure.
        ServerError = 5,
        /// The item could not be converted between client and server.
        ClientServerConversionError = 6,
        /// Both sides changed the item.
        Conflict = 7,
        /// The item does not exist.
        ObjectNotFound = 8,
        /// The sync cannot be completed.
        SyncCannotBeCompleted = 9,
        /// The folder hierarchy changed; the client must run FolderSync.
        FolderHierarchyChanged = 12,
        /// The request was incomplete.
        SyncRequestIncomplete = 13,
        /// Wait or heartbeat value out of range.
        InvalidWaitOrHeartbeat = 14,
        /// Invalid request.
        SyncRequestInvalid = 15,
        /// Retry later.
        Retry = 16,
    }
}

status_namespace! {
    /// Status codes of FolderSync, FolderCreate, FolderUpdate and FolderDelete.
    FolderStatus {
        /// Success.
        Success = 1,
        /// A folder with that name already exists.
        FolderExists = 2,
        /// System folders cannot be changed.
        SystemFolder = 3,
        /// The folder does not exist.
        FolderDoesNotExist = 4,
        /// The parent folder does not exist.
        ParentDoesNotExist = 5,
        /// Server-side failure.
        ServerError = 6,
        /// Request timed out.
        Timeout = 8,
        /// The presented sync key is unknown or stale.
        SyncKeyError = 9,
        /// Malformed request.
        FormatError = 10,
        /// Unknown failure.
        UnknownError = 11,
    }
}

status_namespace! {
    /// Status codes of MoveItems.
    MoveItemsStatus {
        /// The source folder or item is invalid.
        InvalidSourceId = 1,
        /// The destination folder is invalid.
        InvalidDestinationId = 2,
        /// Success.
        Success = 3,
        /// Source and destination are the same folder.
        SameSourceAndDestination = 4,
        /// The item cannot be moved.
        CannotMove = 5,
        /// The item is locked.
        ItemLocked = 7,
    }
}

status_namespace! {
    /// Status codes of GetItemEstimate.
    EstimateStatus {
        /// Success.
        Success = 1,
        /// The collection is invalid.
        CollectionInvalid = 2,
        /// The collection has not been synchronized yet.
        SyncStateNotPrimed = 3,
        /// The presented sync key is unknown or stale.
        SyncKeyInvalid = 4,
    }
}

status_namespace! {
    /// Status codes of Ping.
    PingStatus {
        /// The lifetime expired without changes.
        HeartbeatExpired = 1,
        /// At least one watched folder has changes.
        Changes = 2,
        /// The request lacks parameters and no previous session exists.
        FailingParams = 3,
        /// Malformed request.
        ProtocolError = 4,
        /// The requested lifetime is out of range.
        HeartbeatOutOfRange = 5,
        /// Too many folders watched.
        TooManyFolders = 6,
        /// The client must run FolderSync.
        FolderHierarchySyncRequired = 7,
        /// Server-side failure.
        ServerError = 8,
    }
}

status_namespace! {
    /// Status codes of Provision (overall and per policy).
    ProvisionStatus {
        /// Success.
        Success = 1,
        /// Malformed request, or no policy for the client.
        ProtocolError = 2,
        /// Server-side failure, or unknown policy type.
        ServerError = 3,
        /// Policy data is corrupt.
        CorruptData = 4,
        /// The acknowledged policy key does not match the one offered.
        PolicyKeyMismatch = 5,
    }
}

status_namespace! {
    /// Status codes of MeetingResponse.
    MeetingResponseStatus {
        /// Success.
        Success = 1,
        /// The request is invalid.
        InvalidRequest = 2,
        /// Mailbox failure.
        MailboxError = 3,
        /// Server-side failure.
        ServerError = 4,
    }
}

status_namespace! {
    /// Status codes of Search.
    SearchStatus {
        /// Success.
        Success = 1,
        /// Server-side failure or unsupported store.
        ServerError = 3,
    }
}

status_namespace! {
    /// Status codes of the Search store element.
    SearchStoreStatus {
        /// Success.
        Success = 1,
        /// Malformed request.
        InvalidRequest = 2,
        /// Server-side failure.
        ServerError = 3,
        /// Bad link.
        BadLink = 4,
        /// Access denied.
        AccessDenied = 5,
        /// Not found.
        NotFound = 6,
        /// Connection failed.
        ConnectionFailed = 7,
        /// Query too complex.
        TooComplex = 8,
        /// Timed out.
        TimedOut = 10,
        /// Folder sync required.
        FolderSyncRequired = 11,
        /// End of retrievable range.
        EndOfRange = 12,
        /// Access blocked.
        AccessBlocked = 13,
        /// Credentials required.
        CredentialsRequired = 14,
    }
}

status_namespace! {
    /// Status codes of Settings.
    SettingsStatus {
        /// Success.
        Success = 1,
        /// Malformed request.
        ProtocolError = 2,
        /// Access denied.
        AccessDenied = 3,
        /// Server unavailable.
        ServerUnavailable = 4,
        /// Invalid arguments.
        InvalidArguments = 5,
        /// Conflicting arguments.
        ConflictingArguments = 6,
        /// Denied by policy.
        DeniedByPolicy = 7,
    }
}

status_namespace! {
    /// Status codes of ItemOperations.
    ItemOperationsStatus {
        /// Success.
        Success = 1,
        /// Malformed request.
        ProtocolError = 2,
        /// Server-side failure.
        ServerError = 3,
        /// The document library location is bad.
        DocumentLibraryBadLink = 4,
        /// Access denied.
        DocumentLibraryAccessDenied = 5,
        /// The object was not found or access was denied.
        ObjectNotFound = 6,
        /// Connection failed.
        DocumentLibraryConnectionFailed = 7,
        /// The byte range is invalid.
        InvalidByteRange = 8,
        /// Unknown store.
        UnknownStore = 9,
        /// The file is empty.
        FileEmpty = 10,
        /// The data is too large.
        DataTooLarge = 11,
        /// Download failed.
        IoFailure = 12,
        /// Conversion failed.
        ConversionFailed = 14,
        /// Invalid attachment.
        InvalidAttachment = 15,
        /// Resource access denied.
        ResourceAccessDenied = 16,
    }
}

status_namespace! {
    /// Status codes shared by the mail composition commands.
    CommonStatus {
        /// Success.
        Success = 1,
        /// The request content is invalid.
        InvalidContent = 101,
        /// The MIME message is invalid.
        InvalidMime = 107,
        /// Server-side failure.
        ServerError = 110,
        /// Sending failed.
        MailSubmissionFailed = 120,
        /// The referenced item was not found.
        ItemNotFound = 150,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_lookup() {
        assert_eq!(SyncStatus::InvalidSyncKey.code(), 3);
        assert_eq!(SyncStatus::from_code(12), Some(SyncStatus::FolderHierarchyChanged));
        assert_eq!(SyncStatus::from_code(2), None);
    }

    #[test]
    fn namespaces_overlap_numerically() {
        assert_eq!(MoveItemsStatus::Success.code(), 3);
        assert_eq!(ProvisionStatus::ServerError.code(), 3);
        assert_eq!(PingStatus::FailingParams.code(), 3);
    }

    #[test]
    fn into_u16() {
        let code: u16 = FolderStatus::SyncKeyError.into();
        assert_eq!(code, 9);
    }
}
