use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::wizard::state::{Draft, WizardState};

/// One operator's in-progress conversation. Mutated only under its own
/// mutex, one event at a time.
pub struct Session {
    pub chat_id: i64,
    pub actor: String,
    pub state: WizardState,
    pub draft: Draft,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    fn new(chat_id: i64, actor: &str) -> Self {
        let now = Utc::now();
        Self {
            chat_id,
            actor: actor.to_string(),
            state: WizardState::AwaitingOperation,
            draft: Draft::new(),
            created_at: now,
            last_activity: now,
        }
    }
}

/// Owner of all conversation state. Sessions are independent; the map is
/// the only shared structure and is never held across a wizard step.
pub struct SessionManager {
    sessions: RwLock<HashMap<i64, Arc<Mutex<Session>>>>,
    idle_timeout: Duration,
}

impl SessionManager {
    pub fn new(idle_timeout_seconds: u64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout: Duration::seconds(idle_timeout_seconds as i64),
        }
    }

    /// Starts a fresh session, discarding any prior draft for the chat.
    pub async fn create_or_reset(&self, chat_id: i64, actor: &str) -> Arc<Mutex<Session>> {
        let session = Arc::new(Mutex::new(Session::new(chat_id, actor)));
        self.sessions.write().await.insert(chat_id, session.clone());
        session
    }

    pub async fn get(&self, chat_id: i64) -> Option<Arc<Mutex<Session>>> {
        self.sessions.read().await.get(&chat_id).cloned()
    }

    pub async fn terminate(&self, chat_id: i64) {
        self.sessions.write().await.remove(&chat_id);
    }

    /// Drops sessions idle past the timeout; an expired session behaves
    /// like an implicit cancel since no ledger effect is pending outside
    /// the commit step.
    pub async fn sweep_idle(&self) -> usize {
        let entries: Vec<(i64, Arc<Mutex<Session>>)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(chat_id, session)| (*chat_id, session.clone()))
            .collect();

        let cutoff = Utc::now() - self.idle_timeout;
        let mut stale = Vec::new();
        for (chat_id, session) in entries {
            if session.lock().await.last_activity < cutoff {
                stale.push(chat_id);
            }
        }

        let mut sessions = self.sessions.write().await;
        let mut removed = 0;
        for chat_id in stale {
            if sessions.remove(&chat_id).is_some() {
                debug!(chat_id, "removed idle session");
                removed += 1;
            }
        }
        removed
    }
}
