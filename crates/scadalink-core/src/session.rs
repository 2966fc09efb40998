// ── Session / credential store ──
//
// The single owner of the session token. Every mutation goes through
// `set_token` / `clear`, which persist to a `TokenStore` and publish on a
// watch channel that the live channel supervisor and the dispatcher read.

use std::sync::{Arc, Mutex};

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::CoreError;

// ── TokenStore ───────────────────────────────────────────────────

/// Durable storage for the session token under a fixed key.
///
/// Implementations live next to the configuration layer (keyring, file);
/// [`MemoryTokenStore`] is provided for tests and ephemeral sessions.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<SecretString>, CoreError>;
    fn save(&self, token: &SecretString) -> Result<(), CoreError>;
    fn clear(&self) -> Result<(), CoreError>;
}

/// Process-local token store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<SecretString>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `token`, as if persisted by an earlier run.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(SecretString::from(token.into()))),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<SecretString>>, CoreError> {
        self.token
            .lock()
            .map_err(|_| CoreError::Internal("token store lock poisoned".into()))
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<SecretString>, CoreError> {
        Ok(self.lock()?.clone())
    }

    fn save(&self, token: &SecretString) -> Result<(), CoreError> {
        *self.lock()? = Some(token.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), CoreError> {
        *self.lock()? = None;
        Ok(())
    }
}

// ── Session ──────────────────────────────────────────────────────

/// Explicitly owned session state, shared by handle.
///
/// Cheaply cloneable via `Arc<SessionInner>`. Absence of a token is a
/// valid state meaning "unauthenticated".
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    token: watch::Sender<Option<SecretString>>,
    store: Box<dyn TokenStore>,
}

impl Session {
    /// Create a session backed by `store`, resuming any persisted token.
    ///
    /// A store that cannot be read is logged and treated as empty.
    pub fn restore(store: impl TokenStore + 'static) -> Self {
        let initial = match store.load() {
            Ok(token) => token.filter(|t| !t.expose_secret().is_empty()),
            Err(e) => {
                warn!(error = %e, "could not read stored session token");
                None
            }
        };
        if initial.is_some() {
            debug!("resumed stored session token");
        }
        let (token, _) = watch::channel(initial);
        Self {
            inner: Arc::new(SessionInner {
                token,
                store: Box::new(store),
            }),
        }
    }

    /// An unauthenticated session with no durable storage.
    pub fn in_memory() -> Self {
        Self::restore(MemoryTokenStore::new())
    }

    /// Persist and publish a new token. An empty token clears the session.
    ///
    /// The token is published only if it was persisted.
    pub fn set_token(&self, token: SecretString) -> Result<(), CoreError> {
        if token.expose_secret().is_empty() {
            self.clear();
            return Ok(());
        }
        self.inner.store.save(&token)?;
        self.inner.token.send_replace(Some(token));
        info!("session token updated");
        Ok(())
    }

    /// Drop the token from storage and memory.
    ///
    /// Memory is always cleared, even if the durable store fails.
    pub fn clear(&self) {
        if let Err(e) = self.inner.store.clear() {
            warn!(error = %e, "could not remove stored session token");
        }
        let changed = self.inner.token.send_if_modified(|current| current.take().is_some());
        if changed {
            info!("session cleared");
        }
    }

    /// The current token, if any.
    pub fn token(&self) -> Option<SecretString> {
        self.inner.token.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.token.borrow().is_some()
    }

    /// Observe token changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<SecretString>> {
        self.inner.token.subscribe()
    }

    /// Whether `token` is still the current token.
    pub fn is_current(&self, token: &SecretString) -> bool {
        self.inner
            .token
            .borrow()
            .as_ref()
            .is_some_and(|t| t.expose_secret() == token.expose_secret())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct FailingStore;

    impl TokenStore for FailingStore {
        fn load(&self) -> Result<Option<SecretString>, CoreError> {
            Err(CoreError::Storage {
                message: "locked".into(),
            })
        }
        fn save(&self, _token: &SecretString) -> Result<(), CoreError> {
            Err(CoreError::Storage {
                message: "locked".into(),
            })
        }
        fn clear(&self) -> Result<(), CoreError> {
            Err(CoreError::Storage {
                message: "locked".into(),
            })
        }
    }

    #[test]
    fn restore_resumes_persisted_token() {
        let session = Session::restore(MemoryTokenStore::with_token("abc123"));
        assert!(session.is_authenticated());
        assert_eq!(session.token().unwrap().expose_secret(), "abc123");
    }

    #[test]
    fn set_then_clear_notifies_subscribers() {
        let session = Session::in_memory();
        let mut rx = session.subscribe();

        session.set_token(SecretString::from("t1")).unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_some());

        session.clear();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_none());
    }

    #[test]
    fn clearing_an_empty_session_is_silent() {
        let session = Session::in_memory();
        let rx = session.subscribe();
        session.clear();
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn empty_token_means_logged_out() {
        let session = Session::restore(MemoryTokenStore::with_token("abc"));
        session.set_token(SecretString::from("")).unwrap();
        assert!(!session.is_authenticated());
    }

    #[test]
    fn storage_failure_on_save_does_not_publish() {
        let session = Session::restore(FailingStore);
        assert!(!session.is_authenticated());
        assert!(session.set_token(SecretString::from("t")).is_err());
        assert!(!session.is_authenticated());
    }

    #[test]
    fn clear_survives_storage_failure() {
        let session = Session::restore(FailingStore);
        session.inner.token.send_replace(Some(SecretString::from("t")));
        session.clear();
        assert!(!session.is_authenticated());
    }

    #[test]
    fn is_current_compares_token_values() {
        let session = Session::restore(MemoryTokenStore::with_token("a"));
        assert!(session.is_current(&SecretString::from("a")));
        assert!(!session.is_current(&SecretString::from("b")));
    }
}
