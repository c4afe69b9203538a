//! One signed-in session: the components wired together over a shared
//! transport and directory.

use std::sync::Arc;

use zt_crypto::FileMetadata;
use zt_proto::api::UserSummary;
use zt_proto::MessageId;

use crate::config::ClientConfig;
use crate::directory::PublicKeyDirectory;
use crate::error::SyncError;
use crate::events::{EventBus, EventReceiver};
use crate::presence::PresenceTracker;
use crate::runtime::{spawn_sync, SyncHandle};
use crate::session::SessionContext;
use crate::sync::MessageSync;
use crate::transport::Transport;
use crate::typing::TypingNotifier;

pub struct Client {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    directory: Arc<PublicKeyDirectory>,
    sync: Arc<MessageSync>,
    presence: Arc<PresenceTracker>,
    typing: Arc<TypingNotifier>,
    events: EventBus,
}

impl Client {
    pub fn new(config: ClientConfig, session: SessionContext, transport: Arc<dyn Transport>) -> Self {
        let events = EventBus::new(config.event_capacity);
        let directory = Arc::new(PublicKeyDirectory::new(transport.clone()));
        let sync = Arc::new(MessageSync::new(
            session.clone(),
            transport.clone(),
            directory.clone(),
            events.clone(),
        ));
        let presence = Arc::new(PresenceTracker::new(transport.clone(), session.username()));
        let typing = Arc::new(TypingNotifier::new(transport.clone(), config.typing_idle()));
        Self {
            config,
            transport,
            directory,
            sync,
            presence,
            typing,
            events,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionContext {
        self.sync.session()
    }

    pub fn sync(&self) -> &Arc<MessageSync> {
        &self.sync
    }

    pub fn presence(&self) -> &Arc<PresenceTracker> {
        &self.presence
    }

    pub fn typing(&self) -> &Arc<TypingNotifier> {
        &self.typing
    }

    pub fn directory(&self) -> &Arc<PublicKeyDirectory> {
        &self.directory
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    pub async fn users(&self) -> Result<Vec<UserSummary>, SyncError> {
        Ok(self.transport.get_users().await?)
    }

    /// Send text and end the typing indicator for that peer.
    pub async fn send_text(
        &self,
        to: &str,
        body: &str,
        ttl: Option<u32>,
    ) -> Result<MessageId, SyncError> {
        self.typing.message_sent().await;
        self.sync
            .send_text(to, body, ttl.unwrap_or(self.config.default_ttl_secs))
            .await
    }

    /// Send a file and end the typing indicator for that peer.
    pub async fn send_file(
        &self,
        to: &str,
        metadata: FileMetadata,
        bytes: Vec<u8>,
        ttl: Option<u32>,
    ) -> Result<MessageId, SyncError> {
        self.typing.message_sent().await;
        self.sync
            .send_file(to, metadata, bytes, ttl.unwrap_or(self.config.default_ttl_secs))
            .await
    }

    /// Start the periodic tasks for this session.
    pub fn start(&self) -> SyncHandle {
        spawn_sync(
            &self.config,
            self.sync.clone(),
            self.presence.clone(),
            self.typing.clone(),
        )
    }
}
