//! zt_client — Message synchronisation engine for Zero Trust Chat
//!
//! Polls the server for sealed messages, opens the ones addressed to this
//! identity and keeps per-peer conversation state in order. Also runs the
//! outbound send path and the presence/typing schedules.
//!
//! # Module layout
//! - `session`      — explicit session context (username + keypair)
//! - `transport`    — the transport trait; `http` is the reqwest implementation
//! - `directory`    — session-scoped public key cache
//! - `conversation` — shared, monotonic conversation state
//! - `sync`         — poll tick, send, retry, file download
//! - `presence`     — online map and selected-peer typing flag
//! - `typing`       — sender-side typing debounce
//! - `events`       — notification broadcast
//! - `runtime`      — independent periodic tasks and their shutdown handle
//! - `client`       — facade wiring the above together

pub mod client;
pub mod config;
pub mod conversation;
pub mod directory;
pub mod error;
pub mod events;
pub mod http;
pub mod presence;
pub mod runtime;
pub mod session;
pub mod sync;
pub mod transport;
pub mod typing;

pub use client::Client;
pub use config::ClientConfig;
pub use conversation::{ConversationStore, OutboundDraft};
pub use directory::PublicKeyDirectory;
pub use error::{SyncError, TransportError};
pub use events::{EventBus, Notification};
pub use http::HttpTransport;
pub use presence::PresenceTracker;
pub use runtime::SyncHandle;
pub use session::SessionContext;
pub use sync::{MessageSync, TickReport};
pub use transport::Transport;
pub use typing::{TypingDebounce, TypingNotifier, TypingSignal};
