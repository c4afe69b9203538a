//! Shared conversation state.
//!
//! Mutated by the poll task and by user sends, always through monotonic
//! operations (claim, merge, insert, status update) under one short-lived
//! lock, never by wholesale replacement. Invariants:
//! - every thread is sorted by `created_at` ascending, ties broken by id
//! - a server id is merged at most once per session (`known`), including ids
//!   the server has since stopped serving
//!
//! Expiry is the server's call: a merged message leaves its thread when a
//! successful fetch no longer contains it, never on the local clock.

use std::collections::{HashMap, HashSet};

use zt_crypto::FileMetadata;
use zt_proto::{ChatMessage, DeliveryStatus, MessageContent, MessageId, WireMessage};

/// What the user asked to send, kept until the server accepts it so a
/// failed send can be retried by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundDraft {
    Text(String),
    File {
        metadata: FileMetadata,
        bytes: Vec<u8>,
    },
}

#[derive(Debug, Clone)]
pub struct PendingSend {
    pub to: String,
    pub ttl: u32,
    pub draft: OutboundDraft,
}

pub struct ConversationStore {
    me: String,
    threads: HashMap<String, Vec<ChatMessage>>,
    known: HashSet<String>,
    /// Claimed by a running tick, not merged yet.
    in_flight: HashSet<String>,
    pending: HashMap<MessageId, PendingSend>,
    /// Envelope (base64) of our own accepted sends -> what we wrote.
    echoes: HashMap<String, MessageContent>,
}

impl ConversationStore {
    pub fn new(me: impl Into<String>) -> Self {
        Self {
            me: me.into(),
            threads: HashMap::new(),
            known: HashSet::new(),
            in_flight: HashSet::new(),
            pending: HashMap::new(),
            echoes: HashMap::new(),
        }
    }

    pub fn me(&self) -> &str {
        &self.me
    }

    /// Set difference of `batch` against everything merged or in flight.
    /// Returned rows are marked in flight so an overlapping tick skips them.
    pub fn claim_new(&mut self, batch: Vec<WireMessage>) -> Vec<WireMessage> {
        batch
            .into_iter()
            .filter(|m| !self.known.contains(&m.id) && self.in_flight.insert(m.id.clone()))
            .collect()
    }

    /// Give claimed rows back so the next tick picks them up again.
    pub fn release(&mut self, server_ids: &[String]) {
        for id in server_ids {
            self.in_flight.remove(id);
        }
    }

    /// Merge decoded server messages. Returns the ones actually inserted.
    pub fn merge(&mut self, decoded: Vec<ChatMessage>) -> Vec<ChatMessage> {
        let mut inserted = Vec::new();
        let mut touched = HashSet::new();
        for msg in decoded {
            let MessageId::Server(ref id) = msg.id else {
                continue;
            };
            self.in_flight.remove(id);
            if !self.known.insert(id.clone()) {
                continue;
            }
            let peer = msg.peer(&self.me).to_string();
            self.threads.entry(peer.clone()).or_default().push(msg.clone());
            touched.insert(peer);
            inserted.push(msg);
        }
        for peer in touched {
            self.sort_thread(&peer);
        }
        inserted
    }

    /// Optimistic local entry for an outbound message.
    pub fn insert_local(&mut self, msg: ChatMessage, send: PendingSend) {
        let peer = msg.peer(&self.me).to_string();
        self.pending.insert(msg.id.clone(), send);
        self.threads.entry(peer.clone()).or_default().push(msg);
        self.sort_thread(&peer);
    }

    pub fn pending_send(&self, id: &MessageId) -> Option<PendingSend> {
        self.pending.get(id).cloned()
    }

    pub fn set_status(&mut self, id: &MessageId, status: Option<DeliveryStatus>) -> bool {
        match self.find_mut(id) {
            Some(msg) => {
                msg.status = status;
                true
            }
            None => false,
        }
    }

    pub fn status(&self, id: &MessageId) -> Option<DeliveryStatus> {
        self.find(id).and_then(|m| m.status)
    }

    /// Drop a local entry once the server has accepted it; the server's copy
    /// arrives through the next poll.
    pub fn remove_local(&mut self, id: &MessageId) {
        self.pending.remove(id);
        for thread in self.threads.values_mut() {
            thread.retain(|m| &m.id != id);
        }
    }

    pub fn record_echo(&mut self, envelope_b64: String, content: MessageContent) {
        self.echoes.insert(envelope_b64, content);
    }

    /// Replace an echo that has not been consumed yet.
    pub fn refresh_echo(&mut self, envelope_b64: &str, content: MessageContent) -> bool {
        match self.echoes.get_mut(envelope_b64) {
            Some(slot) => {
                *slot = content;
                true
            }
            None => false,
        }
    }

    pub fn forget_echo(&mut self, envelope_b64: &str) {
        self.echoes.remove(envelope_b64);
    }

    pub fn take_echo(&mut self, envelope_b64: &str) -> Option<MessageContent> {
        self.echoes.remove(envelope_b64)
    }

    /// Drop merged server messages missing from the latest successful fetch.
    /// Their ids stay in the dedup set, so a row that reappears is not merged
    /// again. Local entries are untouched.
    pub fn retain_served(&mut self, served: &HashSet<String>) -> Vec<MessageId> {
        let mut pruned = Vec::new();
        for thread in self.threads.values_mut() {
            thread.retain(|m| {
                let gone = matches!(&m.id, MessageId::Server(id) if !served.contains(id));
                if gone {
                    pruned.push(m.id.clone());
                }
                !gone
            });
        }
        self.threads.retain(|_, t| !t.is_empty());
        pruned
    }

    pub fn thread(&self, peer: &str) -> Vec<ChatMessage> {
        self.threads.get(peer).cloned().unwrap_or_default()
    }

    pub fn peers(&self) -> Vec<String> {
        let mut peers: Vec<String> = self.threads.keys().cloned().collect();
        peers.sort();
        peers
    }

    pub fn failed_sends(&self) -> Vec<MessageId> {
        self.threads
            .values()
            .flatten()
            .filter(|m| m.status == Some(DeliveryStatus::SendingFailed))
            .map(|m| m.id.clone())
            .collect()
    }

    pub fn is_known(&self, server_id: &str) -> bool {
        self.known.contains(server_id)
    }

    fn find(&self, id: &MessageId) -> Option<&ChatMessage> {
        self.threads.values().flatten().find(|m| &m.id == id)
    }

    fn find_mut(&mut self, id: &MessageId) -> Option<&mut ChatMessage> {
        self.threads.values_mut().flatten().find(|m| &m.id == id)
    }

    fn sort_thread(&mut self, peer: &str) {
        if let Some(thread) = self.threads.get_mut(peer) {
            thread.sort_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.id.cmp(&b.id))
            });
        }
    }
}
