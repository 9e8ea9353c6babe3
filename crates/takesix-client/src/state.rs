//! Application state shared by the synchronizer, the gateway and the view.
//!
//! The [`ClientState`] struct is wrapped in `Arc<Mutex<>>`. The lock is only
//! ever taken for a synchronous read or merge and released before the next
//! `.await`, so every merge runs to completion without interleaving.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use takesix_shared::types::{User, UserId};
use takesix_store::GameModel;

/// Central client state.
#[derive(Debug, Default)]
pub struct ClientState {
    /// The authenticated user. `None` until `/users/current` answered.
    pub current_user: Option<User>,

    /// The game being followed. Written only through its merge operations.
    pub model: GameModel,
}

impl ClientState {
    /// Create a new, unauthenticated state with no game selected.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_user_id(&self) -> Option<UserId> {
        self.current_user.as_ref().map(|u| u.id)
    }
}

pub type SharedState = Arc<Mutex<ClientState>>;

pub fn shared() -> SharedState {
    Arc::new(Mutex::new(ClientState::new()))
}

/// Lock the state. A panic while holding the lock cannot leave a merge half
/// applied, so a poisoned lock is recovered rather than propagated.
pub fn lock_state(state: &SharedState) -> MutexGuard<'_, ClientState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
