//! In-memory store of live sessions.
//!
//! The registry map is only locked long enough to look up, insert or remove
//! an entry. Each session sits behind its own mutex, so transitions on one
//! session are strictly serialized while different sessions never wait on
//! each other.

use crate::error::SessionError;
use log::{debug, info};
use shared::{GameVariant, PlayerId, RaceSettings, SessionId, SessionState};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

type SessionCell = Arc<Mutex<SessionState>>;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionCell>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates and stores the initial state of a session.
    ///
    /// `on_created` runs while the new session is still locked, so it sees
    /// the session before any transition can. Fails with `AlreadyExists` if
    /// the identifier is taken, or with a rule error if the roster does not
    /// fit the variant.
    pub async fn create<F>(
        &self,
        session_id: SessionId,
        variant: GameVariant,
        players: Vec<PlayerId>,
        settings: &RaceSettings,
        now: u64,
        on_created: F,
    ) -> Result<SessionState, SessionError>
    where
        F: FnOnce(&SessionState),
    {
        let state = {
            let mut rng = rand::thread_rng();
            SessionState::new(session_id, variant, players, settings, &mut rng, now)?
        };
        let player_count = state.players.len();

        let cell = Arc::new(Mutex::new(state));
        let guard = Arc::clone(&cell).lock_owned().await;
        {
            let mut sessions = self.sessions.write().await;
            if sessions.contains_key(&session_id) {
                return Err(SessionError::AlreadyExists(session_id));
            }
            sessions.insert(session_id, cell);
        }
        info!("Session {} created ({}, {} players)", session_id, variant, player_count);

        on_created(&guard);
        Ok((*guard).clone())
    }

    /// Runs `f` with exclusive access to the session.
    ///
    /// `f` works on a copy of the current state. The copy replaces the stored
    /// state only if `f` returns `Ok`, so a rejected or panicking transition
    /// leaves the session exactly as it was.
    pub async fn with_session<T, F>(&self, session_id: SessionId, f: F) -> Result<T, SessionError>
    where
        F: FnOnce(&mut SessionState) -> Result<T, SessionError>,
    {
        let cell = self.cell(session_id).await?;
        let mut current = cell.lock().await;

        let mut next = current.clone();
        let output = f(&mut next)?;
        *current = next;

        Ok(output)
    }

    /// Point-in-time copy of the session state.
    pub async fn get(&self, session_id: SessionId) -> Result<SessionState, SessionError> {
        let cell = self.cell(session_id).await?;
        let state = cell.lock().await;
        Ok(state.clone())
    }

    /// Removes a session. Returns false if it was already gone.
    pub async fn evict(&self, session_id: SessionId) -> bool {
        let removed = self.sessions.write().await.remove(&session_id).is_some();
        if removed {
            info!("Session {} evicted", session_id);
        } else {
            debug!("Session {} already evicted", session_id);
        }
        removed
    }

    pub async fn contains(&self, session_id: SessionId) -> bool {
        self.sessions.read().await.contains_key(&session_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    async fn cell(&self, session_id: SessionId) -> Result<SessionCell, SessionError> {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .cloned()
            .ok_or(SessionError::NotFound(session_id))
    }
}
