//! Session state shared by every catalog request.

use std::sync::Arc;

use super::error::SessionError;

/// Lifecycle of the catalog session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Uninitialized,
    Authenticating,
    Ready,
    Refreshing,
    Failed,
}

/// An established catalog session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: String,
    pub ajax_token: String,
    /// Increments each time a session replaces the previous one.
    pub epoch: u64,
}

/// The slot holding the current session, replaced wholesale on refresh.
///
/// `last_epoch` counts handshake outcomes, failed ones included, so a caller
/// that remembers the epoch it last saw can tell whether anything has been
/// decided since.
#[derive(Debug)]
pub(crate) struct SessionSlot {
    pub(crate) status: SessionStatus,
    pub(crate) session: Option<Arc<Session>>,
    pub(crate) last_epoch: u64,
    last_error: Option<SessionError>,
}

impl SessionSlot {
    pub(crate) fn new() -> Self {
        Self { status: SessionStatus::Uninitialized, session: None, last_epoch: 0, last_error: None }
    }

    /// The current session if it is usable.
    pub(crate) fn ready(&self) -> Option<Arc<Session>> {
        match (&self.session, self.status) {
            (Some(session), SessionStatus::Ready) => Some(Arc::clone(session)),
            _ => None,
        }
    }

    /// Install a freshly negotiated session.
    pub(crate) fn install(&mut self, session_id: String, ajax_token: String) -> Arc<Session> {
        self.last_epoch += 1;
        let session = Arc::new(Session { session_id, ajax_token, epoch: self.last_epoch });
        self.session = Some(Arc::clone(&session));
        self.status = SessionStatus::Ready;
        self.last_error = None;
        session
    }

    /// Record a failed handshake and return its epoch.
    pub(crate) fn fail(&mut self, error: SessionError) -> u64 {
        self.last_epoch += 1;
        self.session = None;
        self.status = SessionStatus::Failed;
        self.last_error = Some(error);
        self.last_epoch
    }

    /// Result of the most recent handshake.
    pub(crate) fn outcome(&self) -> Result<Arc<Session>, SessionError> {
        match self.ready() {
            Some(session) => Ok(session),
            None => Err(self
                .last_error
                .clone()
                .unwrap_or_else(|| SessionError::Bootstrap("no session established".to_string()))),
        }
    }
}
