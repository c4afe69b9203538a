use tokio::sync::broadcast;

use zt_proto::{ChatMessage, MessageId};

const PREVIEW_CHARS: usize = 64;

/// One per newly merged message that someone else sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message_id: MessageId,
    pub from: String,
    pub preview: String,
}

impl Notification {
    pub fn from_message(msg: &ChatMessage) -> Self {
        let text = msg.display_text();
        let preview = if text.chars().count() > PREVIEW_CHARS {
            let cut: String = text.chars().take(PREVIEW_CHARS).collect();
            format!("{cut}…")
        } else {
            text
        };
        Self {
            message_id: msg.id.clone(),
            from: msg.from.clone(),
            preview,
        }
    }
}

pub type EventReceiver = broadcast::Receiver<Notification>;

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Notification>,
}

impl EventBus {
    pub fn new(size: usize) -> Self {
        let (tx, _) = broadcast::channel(size.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.tx.subscribe()
    }

    /// No subscribers is not an error.
    pub fn publish(&self, event: Notification) {
        let _ = self.tx.send(event);
    }
}
