use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Generic text shown to the user when no response reached the client.
pub const SERVICE_UNAVAILABLE_MESSAGE: &str = "service is being upgraded, please try again later";

/// User-visible notification sink (toast, status line, log...)
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Notifier that only writes to the log, the default when no UI is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        warn!(message = %message, "user notification");
    }
}

#[derive(Default)]
struct DebounceState {
    pending: Option<String>,
    timer: Option<JoinHandle<()>>,
    /// Bumped by every `notify` and `reset`; a timer only fires for its own
    generation: u64,
}

/// Trailing-edge debounce in front of a [`Notifier`].
///
/// A burst of messages inside the window collapses into a single delivery of
/// the last one: each new message aborts the pending timer and replaces the
/// pending text. Clones share the same state.
#[derive(Clone)]
pub struct DebouncedNotifier {
    inner: Arc<dyn Notifier>,
    window: Duration,
    state: Arc<Mutex<DebounceState>>,
}

impl std::fmt::Debug for DebouncedNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebouncedNotifier")
            .field("window", &self.window)
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

impl DebouncedNotifier {
    pub fn new(inner: Arc<dyn Notifier>, window: Duration) -> Self {
        Self {
            inner,
            window,
            state: Arc::new(Mutex::new(DebounceState::default())),
        }
    }

    /// Schedule `message`; must be called inside a tokio runtime
    pub fn notify(&self, message: impl Into<String>) {
        let message = message.into();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(timer) = state.timer.take() {
            timer.abort();
            debug!("replacing pending notification");
        }
        state.pending = Some(message);
        state.generation = state.generation.wrapping_add(1);

        let generation = state.generation;
        let inner = self.inner.clone();
        let shared = self.state.clone();
        let window = self.window;
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            fire(&shared, inner.as_ref(), generation);
        }));
    }

    /// Message waiting for the window to elapse, if any
    pub fn pending(&self) -> Option<String> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pending
            .clone()
    }

    /// Drop any pending notification without delivering it
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.pending = None;
        state.generation = state.generation.wrapping_add(1);
    }
}

/// Deliver the pending message if no newer `notify` or `reset` happened.
///
/// A timer that already woke up cannot be aborted, so it may wait on the lock
/// while a newer message is scheduled.
fn fire(shared: &Mutex<DebounceState>, inner: &dyn Notifier, generation: u64) {
    let message = {
        let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);
        if state.generation != generation {
            debug!("stale debounce timer");
            return;
        }
        state.timer = None;
        state.pending.take()
    };
    if let Some(message) = message {
        inner.notify(&message);
    }
}
