//! # AirSync Engine
//!
//! Server-side protocol engine that keeps a mobile client and a mailbox
//! backend in sync.
//!
//! This crate provides:
//! - Command dispatch through a registration table ([`Dispatcher`])
//! - Sync-key versioned state management ([`StateStore`], [`DeviceStates`])
//! - The change channel between engine and backend ([`Exporter`],
//!   [`Importer`], [`HierarchyImporter`], [`MemoryRelay`])
//! - The per-collection Sync state machine with idempotent retries and
//!   windowed pagination
//! - The Ping long-poll loop with newer-request preemption
//! - The provisioning gate and remote wipe
//! - An in-memory reference [`MemoryBackend`]
//!
//! # Architecture
//!
//! [`SyncServer::process`] takes one transport-level [`Request`]. It
//! authenticates, checks the provisioning gate, builds a
//! [`RequestContext`] and runs the command handler. Handlers read the
//! request tree from the context decoder and write exactly one reply tree
//! to its encoder.
//!
//! Conditions a client is expected to recover from (a stale sync key, a
//! vanished folder, a backend status) become status codes inside the
//! reply. Everything else aborts the request and maps to an HTTP status
//! through [`EngineError::http_status`].
//!
//! # Retries
//!
//! A client that never got a reply retries with the same sync key. The
//! store keeps the previous key of every chain, and a Sync round with
//! failures records a [`FailState`] under the presented key, so a retry
//! replays the recorded outcome instead of applying the changes twice.

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod backend;
mod collection;
mod commands;
mod config;
mod context;
mod dispatcher;
mod error;
mod exchange;
mod ping;
mod progress;
pub mod provisioning;
mod relay;
mod request;
mod server;
mod state;

pub use backend::{
    Attachment, Backend, ComposeKind, DeviceInformation, GalEntry, GalResults, MeetingReply,
    MemoryBackend, OofAudience, OofMessage, OofSettings, OutgoingMail, ParentItem, SettingsReply,
    SettingsRequest,
};
pub use collection::{effective_window, more_available, Collection};
pub use config::EngineConfig;
pub use context::RequestContext;
pub use dispatcher::{CommandHandler, Dispatcher};
pub use error::{EngineError, EngineResult};
pub use exchange::{
    pump, ChangeSink, DiscardSink, Exporter, FolderChange, FolderStreamSink, HierarchyImporter,
    Importer, ItemStreamSink,
};
pub use ping::{PingTicket, PingTracker, Sleeper, ThreadSleeper};
pub use progress::{NullProgress, ProgressSink, TracingProgress};
pub use relay::MemoryRelay;
pub use request::{Credentials, QueryParams, Request, RequestBody, Response};
pub use server::SyncServer;
pub use state::{
    DeviceRecord, DeviceStates, FailState, MemoryStateStore, PingCollection, PingSession,
    PolicyState, StateStore, SyncState, WipeStatus,
};
