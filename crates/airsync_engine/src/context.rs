//! Request-scoped context.
//!
//! A [`RequestContext`] is built by the server for exactly one request and
//! handed to the command handler. It owns the decoder over the request
//! tree and the encoder of the reply tree, so nothing about one request
//! outlives it.

use crate::backend::Backend;
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::ping::{PingTracker, Sleeper};
use crate::progress::ProgressSink;
use crate::request::{Request, RequestBody, Response};
use crate::state::DeviceStates;
use airsync_codec::{TagDecoder, TagEncoder};

/// Everything a command handler works with.
pub struct RequestContext<'a> {
    /// The request being served.
    pub request: &'a Request,
    /// Cursor over the request tree.
    pub decoder: TagDecoder,
    /// Writer of the reply tree.
    pub encoder: TagEncoder,
    /// State of the requesting device.
    pub states: DeviceStates<'a>,
    /// Data store.
    pub backend: &'a dyn Backend,
    /// Engine configuration.
    pub config: &'a EngineConfig,
    /// Progress annotations.
    pub progress: &'a dyn ProgressSink,
    /// Waits of the Ping loop.
    pub sleeper: &'a dyn Sleeper,
    /// Long-poll freshness markers.
    pub pings: &'a PingTracker,
    raw: Option<(String, Vec<u8>)>,
}

impl<'a> RequestContext<'a> {
    /// Creates the context of one request.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        request: &'a Request,
        states: DeviceStates<'a>,
        backend: &'a dyn Backend,
        config: &'a EngineConfig,
        progress: &'a dyn ProgressSink,
        sleeper: &'a dyn Sleeper,
        pings: &'a PingTracker,
    ) -> Self {
        let elements = match &request.body {
            RequestBody::Elements(elements) => elements.clone(),
            _ => Vec::new(),
        };
        Self {
            request,
            decoder: TagDecoder::new(elements),
            encoder: TagEncoder::new(),
            states,
            backend,
            config,
            progress,
            sleeper,
            pings,
            raw: None,
        }
    }

    /// Plain request body, if the request carries one.
    pub fn plain_body(&self) -> Option<&[u8]> {
        match &self.request.body {
            RequestBody::Plain(data) => Some(data),
            _ => None,
        }
    }

    /// Returns true if the request carries a tag-element body.
    pub fn has_elements(&self) -> bool {
        matches!(self.request.body, RequestBody::Elements(_))
    }

    /// Sends raw bytes instead of a reply tree.
    pub fn respond_raw(&mut self, content_type: impl Into<String>, data: Vec<u8>) {
        self.raw = Some((content_type.into(), data));
    }

    /// Announces progress.
    pub fn announce(&self, message: &str, persistent: bool) {
        self.progress.announce(message, persistent);
    }

    /// Turns the written output into the response.
    pub fn into_response(self) -> EngineResult<Response> {
        if let Some((content_type, data)) = self.raw {
            return Ok(Response::Raw { content_type, data });
        }
        if !self.encoder.is_started() {
            return Ok(Response::Empty);
        }
        Ok(Response::Elements(self.encoder.into_elements()?))
    }
}
