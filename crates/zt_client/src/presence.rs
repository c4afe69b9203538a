//! Ephemeral presence: who is online, and whether the selected peer is
//! typing to us. Nothing here is persisted.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::TransportError;
use crate::transport::Transport;

#[derive(Default)]
struct PresenceState {
    online: HashMap<String, bool>,
    selected_peer: Option<String>,
    peer_typing: bool,
}

pub struct PresenceTracker {
    transport: Arc<dyn Transport>,
    me: String,
    state: Mutex<PresenceState>,
}

impl PresenceTracker {
    pub fn new(transport: Arc<dyn Transport>, me: impl Into<String>) -> Self {
        Self {
            transport,
            me: me.into(),
            state: Mutex::new(PresenceState::default()),
        }
    }

    pub async fn refresh_online(&self) -> Result<(), TransportError> {
        let online = self.transport.get_online_users().await?;
        debug!(target: "zt_client", event = "presence_refreshed", users = online.len());
        self.state.lock().online = online;
        Ok(())
    }

    /// No-op while no peer is selected. A result for a peer that was
    /// deselected mid-request is discarded.
    pub async fn refresh_typing(&self) -> Result<(), TransportError> {
        let Some(peer) = self.state.lock().selected_peer.clone() else {
            return Ok(());
        };
        let status = self.transport.get_typing_status(&peer).await?;
        let typing = status.typing_users.iter().any(|u| u == &peer && u != &self.me);

        let mut state = self.state.lock();
        if state.selected_peer.as_deref() == Some(peer.as_str()) {
            state.peer_typing = typing;
        }
        Ok(())
    }

    /// Selecting a different peer clears the previous peer's typing flag.
    pub fn select_peer(&self, peer: Option<String>) {
        let mut state = self.state.lock();
        if state.selected_peer != peer {
            state.peer_typing = false;
        }
        state.selected_peer = peer;
    }

    pub fn typing_peer(&self) -> Option<String> {
        let state = self.state.lock();
        if state.peer_typing {
            state.selected_peer.clone()
        } else {
            None
        }
    }

    pub fn is_peer_typing(&self) -> bool {
        self.state.lock().peer_typing
    }

    pub fn online_users(&self) -> HashMap<String, bool> {
        self.state.lock().online.clone()
    }

    /// Unknown users count as offline.
    pub fn is_online(&self, username: &str) -> bool {
        self.state
            .lock()
            .online
            .get(username)
            .copied()
            .unwrap_or(false)
    }
}
