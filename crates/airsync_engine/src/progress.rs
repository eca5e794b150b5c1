//! Progress annotations.

use tracing::debug;

/// Receives informational annotations about the running request.
///
/// Announcements never affect control flow; implementations must not block.
pub trait ProgressSink: Send + Sync {
    /// Records a message. Persistent messages describe the outcome of the
    /// request, the others only its current activity.
    fn announce(&self, message: &str, persistent: bool);
}

/// Forwards announcements to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn announce(&self, message: &str, persistent: bool) {
        debug!(persistent, "{message}");
    }
}

/// Drops every announcement.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn announce(&self, _message: &str, _persistent: bool) {}
}
