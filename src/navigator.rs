//! Forced navigation on unrecoverable authentication failure.

use parking_lot::Mutex;

/// Consumer-provided navigation hook.
///
/// Called when the session cannot be renewed. Whatever UI state the caller
/// holds should be considered abandoned once this fires.
pub trait Navigator: Send + Sync + 'static {
    fn redirect(&self, path: &str);
}

/// Navigator that only records the redirect in the log.
///
/// Suitable for headless consumers that inspect the returned errors instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn redirect(&self, path: &str) {
        tracing::warn!(path, "Session ended, redirecting to login");
    }
}

/// Navigator that remembers every redirect it was asked to perform.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    redirects: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn redirects(&self) -> Vec<String> {
        self.redirects.lock().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, path: &str) {
        self.redirects.lock().push(path.to_owned());
    }
}
