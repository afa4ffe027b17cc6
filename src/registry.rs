//! Process-wide table of hosted sessions
//!
//! Each session sits behind its own `tokio::sync::Mutex`, so events for one
//! session are handled one at a time while different sessions proceed in
//! parallel. The table itself is only locked for map operations.

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use super::{
    constants::code::DRAW_ATTEMPTS,
    participant::Id,
    quiz::Quiz,
    session::{self, Options, Session},
    session_code::SessionCode,
};

/// A session shared between the connections taking part in it
pub type SharedSession = Arc<Mutex<Session>>;

/// A handle to a session that does not keep it alive
pub type WeakSession = Weak<Mutex<Session>>;

/// Errors that can occur when creating a session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Every drawn code was already taken
    #[error("no free session code after {0} attempts")]
    CodeSpaceExhausted(usize),
    /// The session could not be constructed
    #[error(transparent)]
    Session(#[from] session::Error),
}

impl From<Error> for session::Error {
    fn from(error: Error) -> Self {
        match error {
            Error::CodeSpaceExhausted(_) => Self::CodeSpaceExhausted,
            Error::Session(error) => error,
        }
    }
}

/// All currently hosted sessions, keyed by code
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionCode, SharedSession>>,
    draw_attempts: usize,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_draw_attempts(DRAW_ATTEMPTS)
    }
}

impl SessionRegistry {
    /// Creates an empty registry that gives up after `draw_attempts` taken codes
    pub fn with_draw_attempts(draw_attempts: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            draw_attempts: draw_attempts.max(1),
        }
    }

    /// Creates a lobby-phase session under a fresh random code
    ///
    /// # Errors
    ///
    /// Returns `Error::Session` if the quiz is invalid and
    /// `Error::CodeSpaceExhausted` if no unused code was drawn.
    pub async fn create(
        &self,
        quiz: Quiz,
        host: Id,
        host_identity: String,
        options: Options,
    ) -> Result<(SessionCode, SharedSession), Error> {
        self.create_with(quiz, host, host_identity, options, SessionCode::random)
            .await
    }

    /// Creates a session using `draw` to produce candidate codes
    ///
    /// Candidates already in use are redrawn; the table stays write-locked
    /// between the check and the insert.
    pub async fn create_with<D: FnMut() -> SessionCode>(
        &self,
        quiz: Quiz,
        host: Id,
        host_identity: String,
        options: Options,
        mut draw: D,
    ) -> Result<(SessionCode, SharedSession), Error> {
        let mut sessions = self.sessions.write().await;

        let code = std::iter::repeat_with(&mut draw)
            .take(self.draw_attempts)
            .find(|code| !sessions.contains_key(code))
            .ok_or(Error::CodeSpaceExhausted(self.draw_attempts))?;

        let session = Arc::new(Mutex::new(Session::new(
            code,
            quiz,
            host,
            host_identity,
            options,
        )?));
        sessions.insert(code, session.clone());

        tracing::info!(%code, host = %host, active = sessions.len(), "session created");
        Ok((code, session))
    }

    /// Looks up a session
    pub async fn get(&self, code: SessionCode) -> Option<SharedSession> {
        self.sessions.read().await.get(&code).cloned()
    }

    /// Whether `session` is still the one registered under `code`
    ///
    /// A destroyed session's code can be drawn again by a new session, so a
    /// code alone does not identify a session over time.
    pub async fn is_current(&self, code: SessionCode, session: &WeakSession) -> bool {
        self.sessions
            .read()
            .await
            .get(&code)
            .is_some_and(|live| std::ptr::eq(Arc::as_ptr(live), session.as_ptr()))
    }

    /// Removes a session; unknown codes are ignored
    pub async fn destroy(&self, code: SessionCode) -> Option<SharedSession> {
        let removed = self.sessions.write().await.remove(&code);
        if removed.is_some() {
            tracing::info!(%code, "session destroyed");
        }
        removed
    }

    /// Number of hosted sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
