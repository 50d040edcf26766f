//! Per-user conversation state.
//!
//! Sessions are process-local scratch records. They are never persisted; a restarted process
//! rebuilds confirmed identities lazily from the user registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::domain::{UserId, UserProfile};
use crate::flows::RegistrationState;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub state: RegistrationState,
    /// Name collected while waiting for the identifier.
    pub pending_name: Option<String>,
    /// Confirmed identity, from registration or a registry lookup.
    pub profile: Option<UserProfile>,
}

impl Session {
    pub fn is_registered(&self) -> bool {
        self.profile.is_some()
    }
}

pub trait SessionStore: Send + Sync {
    /// Returns the stored session, creating an idle one on first contact.
    fn get_or_create(&self, user: UserId) -> Session;
    fn save(&self, user: UserId, session: Session);
}

#[derive(Clone, Debug, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<Mutex<HashMap<UserId, Session>>>,
}

impl InMemorySessionStore {
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<UserId, Session>> {
        match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl SessionStore for InMemorySessionStore {
    fn get_or_create(&self, user: UserId) -> Session {
        self.lock().entry(user).or_default().clone()
    }

    fn save(&self, user: UserId, session: Session) {
        self.lock().insert(user, session);
    }
}
