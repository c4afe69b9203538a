//! MessageSync: reconciles server ciphertext with local conversation state
//! and runs the outbound send path.
//!
//! Inbound, per tick:
//!   fetch -> claim unseen ids -> resolve sender -> open -> merge + sort
//!   -> drop rows the server no longer serves -> notify
//! Every failure below the fetch is confined to the message it belongs to
//! and becomes a status on that message; nothing aborts the batch. A
//! transient failure resolving the sender defers the row to the next tick.
//!
//! Outbound:
//!   local entry (Encrypting) -> resolve recipient -> seal -> Uploading
//!   -> post -> drop local entry | SendingFailed (kept for manual retry)

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use zt_crypto::{file as file_cipher, open, seal, Envelope, FileCipherError, FileMetadata};
use zt_proto::api::{PostMessageRequest, UploadFileRequest};
use zt_proto::{
    ChatMessage, DeliveryStatus, MessageContent, MessageId, UnreadableReason, WireMessage,
};

use crate::conversation::{ConversationStore, OutboundDraft, PendingSend};
use crate::directory::PublicKeyDirectory;
use crate::error::SyncError;
use crate::events::{EventBus, Notification};
use crate::session::SessionContext;
use crate::transport::Transport;

/// Outcome of one poll tick.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub fetched: usize,
    pub merged: usize,
    pub unreadable: usize,
    /// Left unclaimed after a transient failure; retried next tick.
    pub deferred: usize,
    /// No longer served (expired or removed server-side).
    pub pruned: usize,
}

/// Why a row did not decode this tick.
enum Undecoded {
    /// Final: rendered as an unreadable message.
    Unreadable(UnreadableReason),
    /// Transient: the row is released and tried again.
    Deferred,
}

pub struct MessageSync {
    session: SessionContext,
    transport: Arc<dyn Transport>,
    directory: Arc<PublicKeyDirectory>,
    conversations: Arc<Mutex<ConversationStore>>,
    events: EventBus,
}

impl MessageSync {
    pub fn new(
        session: SessionContext,
        transport: Arc<dyn Transport>,
        directory: Arc<PublicKeyDirectory>,
        events: EventBus,
    ) -> Self {
        let conversations = Arc::new(Mutex::new(ConversationStore::new(session.username())));
        Self {
            session,
            transport,
            directory,
            conversations,
            events,
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn thread(&self, peer: &str) -> Vec<ChatMessage> {
        self.conversations.lock().thread(peer)
    }

    pub fn peers(&self) -> Vec<String> {
        self.conversations.lock().peers()
    }

    pub fn status(&self, id: &MessageId) -> Option<DeliveryStatus> {
        self.conversations.lock().status(id)
    }

    pub fn failed_sends(&self) -> Vec<MessageId> {
        self.conversations.lock().failed_sends()
    }

    // ── Inbound ──────────────────────────────────────────────────────────────

    /// One poll tick. Only the fetch can fail; the caller logs it and waits
    /// for the next tick.
    pub async fn tick(&self) -> Result<TickReport, SyncError> {
        let batch = self.transport.get_messages().await?;
        let fetched = batch.len();
        let served: HashSet<String> = batch.iter().map(|m| m.id.clone()).collect();

        let fresh = self.conversations.lock().claim_new(batch);
        if !fresh.is_empty() {
            info!(target: "zt_client", event = "poll_messages", fetched, new = fresh.len());
        }

        let mut decoded = Vec::with_capacity(fresh.len());
        let mut deferred = Vec::new();
        for wire in fresh {
            match self.decode(wire).await {
                Ok(msg) => decoded.push(msg),
                Err(id) => deferred.push(id),
            }
        }
        let unreadable = decoded.iter().filter(|m| m.content.is_unreadable()).count();

        let (merged, pruned) = {
            let mut conv = self.conversations.lock();
            conv.release(&deferred);
            let merged = conv.merge(decoded);
            let pruned = conv.retain_served(&served);
            (merged, pruned)
        };

        for msg in merged.iter().filter(|m| m.from != self.session.username()) {
            self.events.publish(Notification::from_message(msg));
        }
        if !deferred.is_empty() {
            debug!(target: "zt_client", event = "messages_deferred", count = deferred.len());
        }
        if !pruned.is_empty() {
            debug!(target: "zt_client", event = "messages_expired", count = pruned.len());
        }

        Ok(TickReport {
            fetched,
            merged: merged.len(),
            unreadable,
            deferred: deferred.len(),
            pruned: pruned.len(),
        })
    }

    /// Resolve one server row into its final local form, or hand back its id
    /// when the outcome has to wait for a later tick.
    async fn decode(&self, wire: WireMessage) -> Result<ChatMessage, String> {
        let envelope = Envelope::from_b64(&wire.envelope).ok();
        let me = self.session.username();

        let echo = if wire.from == me {
            self.conversations.lock().take_echo(&wire.envelope)
        } else {
            None
        };

        let (content, status) = if let Some(content) = echo {
            (content, None)
        } else if wire.from == me && wire.to != me {
            (MessageContent::SealedForPeer, None)
        } else {
            match self.open_inbound(&wire, envelope.as_ref()).await {
                Ok(content) => (content, None),
                Err(Undecoded::Deferred) => return Err(wire.id),
                Err(Undecoded::Unreadable(reason)) => {
                    warn!(
                        target: "zt_client",
                        event = "decrypt_failed",
                        message_id = %wire.id,
                        from = %wire.from,
                        reason = ?reason
                    );
                    (
                        MessageContent::Unreadable(reason),
                        Some(DeliveryStatus::DecryptionFailed),
                    )
                }
            }
        };

        Ok(ChatMessage {
            id: MessageId::Server(wire.id),
            from: wire.from,
            to: wire.to,
            envelope,
            content,
            ttl: wire.ttl,
            created_at: wire.created_at,
            is_file: wire.is_file,
            status,
        })
    }

    async fn open_inbound(
        &self,
        wire: &WireMessage,
        envelope: Option<&Envelope>,
    ) -> Result<MessageContent, Undecoded> {
        // Sealed boxes are anonymous: the sender key only gates on the sender
        // being known. Opening uses our own keypair.
        if let Err(e) = self.directory.resolve(&wire.from).await {
            debug!(target: "zt_client", event = "sender_key_unavailable", from = %wire.from, error = %e);
            return Err(if e.is_transient() {
                Undecoded::Deferred
            } else {
                Undecoded::Unreadable(UnreadableReason::SenderUnknown)
            });
        }
        self.open_with_own_key(wire, envelope)
            .map_err(Undecoded::Unreadable)
    }

    fn open_with_own_key(
        &self,
        wire: &WireMessage,
        envelope: Option<&Envelope>,
    ) -> Result<MessageContent, UnreadableReason> {
        let keypair = self
            .session
            .keypair()
            .map_err(|_| UnreadableReason::KeyNotFound)?;
        let envelope = envelope.ok_or(UnreadableReason::DecryptionFailed)?;

        if wire.is_file {
            return match file_cipher::decrypt_metadata(envelope, keypair) {
                Ok(metadata) => Ok(MessageContent::File {
                    metadata,
                    file_ref: wire.file_ref.clone(),
                }),
                Err(FileCipherError::MalformedMetadata(_)) => {
                    Err(UnreadableReason::MalformedMetadata)
                }
                Err(_) => Err(UnreadableReason::DecryptionFailed),
            };
        }

        let plaintext = open(envelope, &keypair.public, keypair.secret())
            .map_err(|_| UnreadableReason::DecryptionFailed)?;
        let text = std::str::from_utf8(&plaintext)
            .map_err(|_| UnreadableReason::DecryptionFailed)?;
        Ok(MessageContent::Text(text.to_string()))
    }

    /// Fetch and open a file blob addressed to us.
    pub async fn download_file(&self, file_ref: &str) -> Result<Vec<u8>, SyncError> {
        let keypair = self.session.keypair()?;
        let blob = self.transport.get_file(file_ref).await?;
        Ok(file_cipher::decrypt_file(&blob.encrypted_file, keypair)?)
    }

    // ── Outbound ─────────────────────────────────────────────────────────────

    pub async fn send_text(&self, to: &str, body: &str, ttl: u32) -> Result<MessageId, SyncError> {
        if body.is_empty() {
            return Err(SyncError::InvalidInput("message is empty".into()));
        }
        let content = MessageContent::Text(body.to_string());
        self.compose(to, ttl, OutboundDraft::Text(body.to_string()), content, false)
            .await
    }

    pub async fn send_file(
        &self,
        to: &str,
        metadata: FileMetadata,
        bytes: Vec<u8>,
        ttl: u32,
    ) -> Result<MessageId, SyncError> {
        if metadata.file_name.trim().is_empty() {
            return Err(SyncError::InvalidInput("file name is empty".into()));
        }
        let content = MessageContent::File {
            metadata: metadata.clone(),
            file_ref: None,
        };
        self.compose(to, ttl, OutboundDraft::File { metadata, bytes }, content, true)
            .await
    }

    /// Re-send a failed message. Manual only; nothing retries on its own.
    pub async fn retry(&self, id: &MessageId) -> Result<MessageId, SyncError> {
        let send = {
            let mut conv = self.conversations.lock();
            if conv.status(id) != Some(DeliveryStatus::SendingFailed) {
                return Err(SyncError::UnknownMessage(id.to_string()));
            }
            let Some(send) = conv.pending_send(id) else {
                return Err(SyncError::UnknownMessage(id.to_string()));
            };
            conv.set_status(id, Some(DeliveryStatus::Encrypting));
            send
        };
        info!(target: "zt_client", event = "send_retry", local_id = %id, to = %send.to);
        self.deliver(id, send).await?;
        Ok(id.clone())
    }

    async fn compose(
        &self,
        to: &str,
        ttl: u32,
        draft: OutboundDraft,
        content: MessageContent,
        is_file: bool,
    ) -> Result<MessageId, SyncError> {
        if to.trim().is_empty() {
            return Err(SyncError::InvalidInput("recipient is empty".into()));
        }
        if ttl == 0 {
            return Err(SyncError::InvalidInput("ttl must be non-zero".into()));
        }

        let id = MessageId::new_local();
        let local = ChatMessage {
            id: id.clone(),
            from: self.session.username().to_string(),
            to: to.to_string(),
            envelope: None,
            content,
            ttl,
            created_at: Utc::now(),
            is_file,
            status: Some(DeliveryStatus::Encrypting),
        };
        let send = PendingSend {
            to: to.to_string(),
            ttl,
            draft,
        };
        self.conversations.lock().insert_local(local, send.clone());

        self.deliver(&id, send).await?;
        Ok(id)
    }

    /// Seal and submit. On failure the local entry is marked `SendingFailed`
    /// and the error is returned to the caller.
    async fn deliver(&self, id: &MessageId, send: PendingSend) -> Result<(), SyncError> {
        match self.try_deliver(id, &send).await {
            Ok(()) => {
                self.conversations.lock().remove_local(id);
                info!(target: "zt_client", event = "message_sent", local_id = %id, to = %send.to);
                Ok(())
            }
            Err(e) => {
                self.conversations
                    .lock()
                    .set_status(id, Some(DeliveryStatus::SendingFailed));
                warn!(target: "zt_client", event = "send_failed", local_id = %id, to = %send.to, error = %e);
                Err(e)
            }
        }
    }

    async fn try_deliver(&self, id: &MessageId, send: &PendingSend) -> Result<(), SyncError> {
        let recipient = self.directory.resolve(&send.to).await.map_err(|e| {
            SyncError::RecipientKeyUnavailable {
                username: send.to.clone(),
                reason: e.to_string(),
            }
        })?;

        match &send.draft {
            OutboundDraft::Text(body) => {
                let envelope = seal(body.as_bytes(), &recipient)?;
                let echo_key = envelope.to_b64();
                self.before_upload(id, &echo_key, MessageContent::Text(body.clone()));

                let req = PostMessageRequest {
                    recipient_username: send.to.clone(),
                    ciphertext: envelope,
                    ttl: send.ttl,
                };
                self.transport
                    .post_message(&req)
                    .await
                    .map_err(|e| self.upload_failed(&echo_key, e.into()))
            }
            OutboundDraft::File { metadata, bytes } => {
                let encrypted_metadata = file_cipher::encrypt_metadata(metadata, &recipient)?;
                let encrypted_file = file_cipher::encrypt_file(bytes, &recipient)?;
                let echo_key = encrypted_metadata.to_b64();
                self.before_upload(
                    id,
                    &echo_key,
                    MessageContent::File {
                        metadata: metadata.clone(),
                        file_ref: None,
                    },
                );

                let req = UploadFileRequest {
                    recipient_username: send.to.clone(),
                    ttl: send.ttl,
                    encrypted_metadata,
                    encrypted_file,
                };
                let resp = self
                    .transport
                    .upload_file(&req)
                    .await
                    .map_err(|e| self.upload_failed(&echo_key, e.into()))?;
                if let Some(file_ref) = resp.file_ref {
                    self.conversations.lock().refresh_echo(
                        &echo_key,
                        MessageContent::File {
                            metadata: metadata.clone(),
                            file_ref: Some(file_ref),
                        },
                    );
                }
                Ok(())
            }
        }
    }

    /// The echo is recorded before the upload so a poll that races the
    /// response still renders our own copy.
    fn before_upload(&self, id: &MessageId, echo_key: &str, content: MessageContent) {
        let mut conv = self.conversations.lock();
        conv.record_echo(echo_key.to_string(), content);
        conv.set_status(id, Some(DeliveryStatus::Uploading));
    }

    fn upload_failed(&self, echo_key: &str, e: SyncError) -> SyncError {
        self.conversations.lock().forget_echo(echo_key);
        e
    }
}
