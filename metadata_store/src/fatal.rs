use observability_deps::tracing::error;
use std::sync::Arc;

/// Invoked when the metadata store's session with the coordination service expires
/// involuntarily. Production wiring treats this as unrecoverable: the node can no longer
/// trust its ephemeral liveness registration or any locks it held, so it should stop serving
/// and exit for the process supervisor to restart it.
pub trait FatalErrorHandler: Send + Sync + std::fmt::Debug + 'static {
    /// Called exactly once, from whatever thread observed the session expiry.
    fn on_session_expired(&self);
}

/// Logs and calls [`std::process::exit`] with a non-zero code, matching how this system treats
/// an unrecoverable session loss in production.
#[derive(Debug, Default)]
pub struct ProcessExitHandler;

impl FatalErrorHandler for ProcessExitHandler {
    fn on_session_expired(&self) {
        error!("metadata store session expired; exiting process");
        std::process::exit(1);
    }
}

/// Records that it fired, instead of exiting, for use in tests that exercise session-expiry
/// handling without killing the test process.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    fired: Arc<std::sync::atomic::AtomicBool>,
}

impl RecordingHandler {
    /// A handle that can be checked after the fact for whether [`FatalErrorHandler::on_session_expired`]
    /// was called.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this handler has fired.
    pub fn fired(&self) -> bool {
        self.fired.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl FatalErrorHandler for RecordingHandler {
    fn on_session_expired(&self) {
        self.fired.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}
