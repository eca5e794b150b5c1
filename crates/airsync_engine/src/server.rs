//! Main sync server.

use crate::backend::Backend;
use crate::config::EngineConfig;
use crate::context::RequestContext;
use crate::dispatcher::Dispatcher;
use crate::error::{EngineError, EngineResult};
use crate::ping::{PingTracker, Sleeper, ThreadSleeper};
use crate::progress::{ProgressSink, TracingProgress};
use crate::provisioning;
use crate::request::{Request, RequestBody, Response};
use crate::state::{DeviceStates, StateStore};
use airsync_codec::CodecError;
use airsync_protocol::Command;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The sync server.
///
/// Turns one transport-level [`Request`] into one [`Response`]: it
/// authenticates the request, enforces the provisioning gate, builds the
/// request context and runs the registered handler of the command. The
/// server holds no per-request state, so one instance serves every
/// device concurrently.
///
/// # Example
///
/// ```
/// use airsync_engine::{Credentials, MemoryBackend, MemoryStateStore, Request, SyncServer};
/// use airsync_protocol::Command;
/// use std::sync::Arc;
///
/// let backend = MemoryBackend::with_standard_folders();
/// backend.add_user("user", "secret");
/// let server = SyncServer::new(Arc::new(backend), Arc::new(MemoryStateStore::new()));
/// let request = Request::new(Command::Notify, "dev1", Credentials::new("user", "secret"));
/// assert!(server.process(request).is_ok());
/// ```
pub struct SyncServer {
    backend: Arc<dyn Backend>,
    store: Arc<dyn StateStore>,
    config: EngineConfig,
    dispatcher: Dispatcher,
    pings: Arc<PingTracker>,
    progress: Arc<dyn ProgressSink>,
    sleeper: Arc<dyn Sleeper>,
}

impl SyncServer {
    /// Creates a server with the default configuration and every built-in
    /// command handler.
    pub fn new(backend: Arc<dyn Backend>, store: Arc<dyn StateStore>) -> Self {
        Self {
            backend,
            store,
            config: EngineConfig::default(),
            dispatcher: Dispatcher::standard(),
            pings: Arc::new(PingTracker::new()),
            progress: Arc::new(TracingProgress),
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the command table.
    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Shares long-poll markers with other servers of the same deployment.
    pub fn with_ping_tracker(mut self, pings: Arc<PingTracker>) -> Self {
        self.pings = pings;
        self
    }

    /// Sets the progress sink.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Sets the sleeper of the Ping wait loop.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the long-poll markers.
    pub fn ping_tracker(&self) -> &Arc<PingTracker> {
        &self.pings
    }

    /// Processes one request.
    ///
    /// Errors are transport-level failures; map them with
    /// [`EngineError::http_status`].
    pub fn process(&self, request: Request) -> EngineResult<Response> {
        let command = request.command;
        if !self.dispatcher.handles(command) {
            warn!(%command, "command not implemented");
            return Err(EngineError::NotImplemented(command.to_string()));
        }
        check_body(&request)?;

        if command != Command::Provision {
            authenticate(self.backend.as_ref(), &request)?;
        }

        let states = DeviceStates::new(self.store.as_ref(), request.device_id.clone());
        if self.config.provisioning && !matches!(command, Command::Provision | Command::Ping) {
            let record = states.record()?;
            if provisioning::is_required(true, &record, request.policy_key.as_deref()) {
                info!(device = %request.device_id, %command, "provisioning required");
                return Err(EngineError::ProvisioningRequired);
            }
        }

        let mut ctx = RequestContext::new(
            &request,
            states,
            self.backend.as_ref(),
            &self.config,
            self.progress.as_ref(),
            self.sleeper.as_ref(),
            &self.pings,
        );
        match self.dispatcher.dispatch(&mut ctx) {
            Ok(()) => {
                debug!(%command, device = %request.device_id, "request handled");
                ctx.into_response()
            }
            Err(err) => {
                warn!(%command, device = %request.device_id, error = %err, "request failed");
                Err(err)
            }
        }
    }
}

/// Logs the user on and opens the mailbox the request asks for.
pub(crate) fn authenticate(backend: &dyn Backend, request: &Request) -> EngineResult<()> {
    let credentials = &request.credentials;
    if !backend.logon(credentials)? {
        return Err(EngineError::AuthenticationRequired(credentials.user.clone()));
    }
    if !backend.setup(
        credentials.mailbox(),
        &request.device_id,
        &request.protocol_version,
    )? {
        return Err(EngineError::AuthenticationRequired(format!(
            "{} may not open {}",
            credentials.user,
            credentials.mailbox()
        )));
    }
    Ok(())
}

/// Rejects bodies the command cannot read.
fn check_body(request: &Request) -> EngineResult<()> {
    let command = request.command;
    match &request.body {
        RequestBody::Plain(_) if !command.accepts_plain_input() => Err(CodecError::malformed(
            format!("{command} does not accept a plain body"),
        )
        .into()),
        RequestBody::Elements(_) if command.needs_no_input() => Err(CodecError::malformed(
            format!("{command} takes no body"),
        )
        .into()),
        _ => Ok(()),
    }
}

impl std::fmt::Debug for SyncServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncServer")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::request::Credentials;
    use crate::state::MemoryStateStore;

    fn server() -> SyncServer {
        let backend = MemoryBackend::with_standard_folders();
        backend.add_user("user", "secret");
        SyncServer::new(Arc::new(backend), Arc::new(MemoryStateStore::new()))
    }

    fn request(command: Command, password: &str) -> Request {
        Request::new(command, "dev1", Credentials::new("user", password))
    }

    #[test]
    fn bad_credentials_are_rejected() {
        let err = server().process(request(Command::Notify, "wrong")).unwrap_err();
        assert!(matches!(err, EngineError::AuthenticationRequired(_)));
        assert_eq!(err.http_status(), 401);
    }

    #[test]
    fn unhandled_command_is_not_implemented() {
        let err = server()
            .process(request(Command::ValidateCert, "secret"))
            .unwrap_err();
        assert_eq!(err.http_status(), 501);
    }

    #[test]
    fn plain_body_only_for_mail_commands() {
        let req = request(Command::Sync, "secret").with_plain(b"x".to_vec());
        let err = server().process(req).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn gate_blocks_unprovisioned_devices() {
        let server = server().with_config(EngineConfig::default().with_provisioning(true));
        let err = server.process(request(Command::FolderSync, "secret")).unwrap_err();
        assert!(matches!(err, EngineError::ProvisioningRequired));
        assert_eq!(err.http_status(), 449);
    }
}
