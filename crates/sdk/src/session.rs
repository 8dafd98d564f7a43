//! Session state: the bearer token obtained from `/api/auth/login`.

use std::fmt;

use parking_lot::RwLock;

/// Holds the current auth token.
///
/// Shared (via `Arc`) by the request dispatcher and the connection
/// manager, which only read it. The token is written by a successful
/// authentication (or seeded at construction). There is no expiry
/// tracking: a stale token surfaces as a 401 from the server.
#[derive(Default)]
pub struct SessionState {
    token: RwLock<Option<String>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    /// Snapshot of the current token.
    pub fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.read().is_some()
    }

    pub(crate) fn set_token(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("token", &self.token.read().as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let s = SessionState::new();
        assert!(!s.is_authenticated());
        assert_eq!(s.token(), None);
    }

    #[test]
    fn set_token_replaces_previous() {
        let s = SessionState::with_token("old");
        s.set_token("new");
        assert_eq!(s.token().as_deref(), Some("new"));
    }

    #[test]
    fn debug_never_prints_token() {
        let s = SessionState::with_token("super-secret");
        let out = format!("{s:?}");
        assert!(!out.contains("super-secret"));
        assert!(out.contains("redacted"));
    }
}
