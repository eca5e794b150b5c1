//! Command identifiers.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! commands {
    ($($(#[$doc:meta])* $variant:ident = $name:literal, $code:expr;)*) => {
        /// A protocol command.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum Command {
            $($(#[$doc])* $variant),*
        }

        impl Command {
            /// Every command, in code order.
            pub const ALL: &'static [Command] = &[$(Command::$variant),*];

            /// Name of the command as sent in the `Cmd` query parameter.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Command::$variant => $name),*
                }
            }

            /// Numeric code used by base64-encoded query strings.
            pub fn code(&self) -> Option<u8> {
                match self {
                    $(Command::$variant => $code),*
                }
            }

            /// Looks a command up by name (case-insensitive).
            pub fn from_name(name: &str) -> Option<Self> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|cmd| cmd.as_str().eq_ignore_ascii_case(name))
            }

            /// Looks a command up by numeric code.
            pub fn from_code(code: u8) -> Option<Self> {
                Self::ALL.iter().copied().find(|cmd| cmd.code() == Some(code))
            }
        }
    };
}

commands! {
    /// Synchronize collections.
    Sync = "Sync", Some(0);
    /// Send a new message.
    SendMail = "SendMail", Some(1);
    /// Forward a message.
    SmartForward = "SmartForward", Some(2);
    /// Reply to a message.
    SmartReply = "SmartReply", Some(3);
    /// Download an attachment.
    GetAttachment = "GetAttachment", Some(4);
    /// List every folder.
    GetHierarchy = "GetHierarchy", Some(5);
    /// Legacy folder creation.
    CreateCollection = "CreateCollection", Some(6);
    /// Legacy folder deletion.
    DeleteCollection = "DeleteCollection", Some(7);
    /// Legacy folder move.
    MoveCollection = "MoveCollection", Some(8);
    /// Synchronize the folder hierarchy.
    FolderSync = "FolderSync", Some(9);
    /// Create a folder.
    FolderCreate = "FolderCreate", Some(10);
    /// Delete a folder.
    FolderDelete = "FolderDelete", Some(11);
    /// Rename or move a folder.
    FolderUpdate = "FolderUpdate", Some(12);
    /// Move items between folders.
    MoveItems = "MoveItems", Some(13);
    /// Count pending changes.
    GetItemEstimate = "GetItemEstimate", Some(14);
    /// Answer a meeting request.
    MeetingResponse = "MeetingResponse", Some(15);
    /// Search a store.
    Search = "Search", Some(16);
    /// Read or change settings.
    Settings = "Settings", Some(17);
    /// Long-poll for changes.
    Ping = "Ping", Some(18);
    /// Fetch items and attachments.
    ItemOperations = "ItemOperations", Some(19);
    /// Device policy handshake.
    Provision = "Provision", Some(20);
    /// Resolve recipient addresses.
    ResolveRecipients = "ResolveRecipients", Some(21);
    /// Validate a certificate.
    ValidateCert = "ValidateCert", Some(22);
    /// Legacy SMS-based notification registration.
    Notify = "Notify", None;
}

impl Command {
    /// Returns true if the command body is plain bytes rather than a tag
    /// stream when the client sends it without an encoded body.
    pub fn accepts_plain_input(&self) -> bool {
        matches!(
            self,
            Command::SendMail | Command::SmartForward | Command::SmartReply
        )
    }

    /// Returns true if the command reads no body at all.
    pub fn needs_no_input(&self) -> bool {
        matches!(self, Command::GetAttachment)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = ProtocolError;

    fn from_str(s: &str) -> ProtocolResult<Self> {
        Self::from_name(s).ok_or_else(|| ProtocolError::UnknownCommand(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_and_codes() {
        assert_eq!("ping".parse::<Command>().unwrap(), Command::Ping);
        assert_eq!(Command::from_code(9), Some(Command::FolderSync));
        assert_eq!(Command::Notify.code(), None);
        assert!("Bogus".parse::<Command>().is_err());
    }

    #[test]
    fn every_name_round_trips() {
        for cmd in Command::ALL {
            assert_eq!(Command::from_name(cmd.as_str()), Some(*cmd));
        }
    }

    #[test]
    fn input_modes() {
        assert!(Command::SendMail.accepts_plain_input());
        assert!(!Command::Sync.accepts_plain_input());
        assert!(Command::GetAttachment.needs_no_input());
    }
}
