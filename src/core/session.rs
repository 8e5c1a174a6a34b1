use std::sync::{PoisonError, RwLock};
use tracing::info;

/// Identifiers of the current session at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub token: Option<String>,
    pub client_id: Option<String>,
    pub trace_id: Option<String>,
}

impl SessionSnapshot {
    /// No token means an anonymous call, not an error.
    pub fn is_authenticated(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Token provider consulted once per envelope build.
///
/// Implementations must return the current values; the pipeline never caches
/// a snapshot beyond the call it was taken for.
pub trait SessionContext: Send + Sync {
    fn snapshot(&self) -> SessionSnapshot;
}

/// Sink invoked when the server reports the session as dead.
///
/// Expected to clear local session state and send the user back to the
/// re-authentication entry point.
pub trait SessionInvalidator: Send + Sync {
    fn invalidate(&self);
}

/// Write side of a session store, used after a successful login.
pub trait SessionWriter: Send + Sync {
    fn set_token(&self, token: String);
    fn set_client_info(&self, client_id: String, trace_id: String);
}

/// Minimal in-memory session store.
///
/// Holds token, client id and trace id behind a lock; `logout` clears all
/// three. Navigation after invalidation is delegated to an optional hook.
#[derive(Default)]
pub struct MemorySessionStore {
    state: RwLock<SessionSnapshot>,
    on_logout: Option<Box<dyn Fn() + Send + Sync>>,
}

impl std::fmt::Debug for MemorySessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySessionStore")
            .field("authenticated", &self.snapshot().is_authenticated())
            .field("has_logout_hook", &self.on_logout.is_some())
            .finish()
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `hook` after every logout, e.g. to route to the login screen
    pub fn with_logout_hook(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_logout = Some(Box::new(hook));
        self
    }

    pub fn is_logged_in(&self) -> bool {
        self.snapshot().is_authenticated()
    }

    /// Clear token, client id and trace id
    pub fn logout(&self) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = SessionSnapshot::default();
        info!("session cleared");
        if let Some(hook) = &self.on_logout {
            hook();
        }
    }
}

impl SessionContext for MemorySessionStore {
    fn snapshot(&self) -> SessionSnapshot {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SessionWriter for MemorySessionStore {
    fn set_token(&self, token: String) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .token = Some(token);
    }

    fn set_client_info(&self, client_id: String, trace_id: String) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.client_id = Some(client_id);
        state.trace_id = Some(trace_id);
    }
}

impl SessionInvalidator for MemorySessionStore {
    fn invalidate(&self) {
        self.logout();
    }
}

/// Session context for callers that never authenticate.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousSession;

impl SessionContext for AnonymousSession {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::default()
    }
}

impl SessionInvalidator for AnonymousSession {
    fn invalidate(&self) {}
}
