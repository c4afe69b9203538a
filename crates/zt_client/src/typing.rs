//! Sender-side typing debounce.
//!
//! `typing=true` goes out on the first keystroke after idle; further
//! keystrokes only push the idle deadline back. `typing=false` goes out once
//! the idle window passes, when a message is sent, or when the user starts
//! typing to someone else. Only edge transitions are ever emitted.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use zt_proto::api::TypingRequest;

use crate::transport::Transport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingSignal {
    pub recipient: String,
    pub is_typing: bool,
}

impl TypingSignal {
    fn start(recipient: &str) -> Self {
        Self {
            recipient: recipient.to_string(),
            is_typing: true,
        }
    }

    fn stop(recipient: String) -> Self {
        Self {
            recipient,
            is_typing: false,
        }
    }
}

#[derive(Debug)]
pub struct TypingDebounce {
    idle: Duration,
    /// Peer we last told `typing=true`, and the last keystroke time.
    active: Option<(String, Instant)>,
}

impl TypingDebounce {
    pub fn new(idle: Duration) -> Self {
        Self { idle, active: None }
    }

    pub fn is_typing(&self) -> bool {
        self.active.is_some()
    }

    pub fn keystroke(&mut self, recipient: &str, now: Instant) -> Vec<TypingSignal> {
        match self.active.take() {
            Some((current, _)) if current == recipient => {
                self.active = Some((current, now));
                Vec::new()
            }
            Some((other, _)) => {
                self.active = Some((recipient.to_string(), now));
                vec![TypingSignal::stop(other), TypingSignal::start(recipient)]
            }
            None => {
                self.active = Some((recipient.to_string(), now));
                vec![TypingSignal::start(recipient)]
            }
        }
    }

    pub fn poll_idle(&mut self, now: Instant) -> Option<TypingSignal> {
        let idle = matches!(
            &self.active,
            Some((_, last)) if now.duration_since(*last) >= self.idle
        );
        if !idle {
            return None;
        }
        self.active.take().map(|(r, _)| TypingSignal::stop(r))
    }

    /// Sending a message (or ending the session) ends typing immediately.
    pub fn finish(&mut self) -> Option<TypingSignal> {
        self.active.take().map(|(r, _)| TypingSignal::stop(r))
    }
}

/// Drives a `TypingDebounce` and delivers its signals over the transport.
/// Delivery failures are logged; typing state is best-effort.
///
/// `turn` is held from the state transition through the post, so signals
/// reach the server in the order the debounce produced them.
pub struct TypingNotifier {
    transport: Arc<dyn Transport>,
    state: Mutex<TypingDebounce>,
    turn: tokio::sync::Mutex<()>,
}

impl TypingNotifier {
    pub fn new(transport: Arc<dyn Transport>, idle: Duration) -> Self {
        Self {
            transport,
            state: Mutex::new(TypingDebounce::new(idle)),
            turn: tokio::sync::Mutex::new(()),
        }
    }

    pub fn is_typing(&self) -> bool {
        self.state.lock().is_typing()
    }

    pub async fn keystroke(&self, recipient: &str) {
        let _turn = self.turn.lock().await;
        let signals = self.state.lock().keystroke(recipient, Instant::now());
        for signal in signals {
            self.deliver(signal).await;
        }
    }

    pub async fn check_idle(&self) {
        let _turn = self.turn.lock().await;
        let signal = self.state.lock().poll_idle(Instant::now());
        if let Some(signal) = signal {
            self.deliver(signal).await;
        }
    }

    pub async fn message_sent(&self) {
        let _turn = self.turn.lock().await;
        let signal = self.state.lock().finish();
        if let Some(signal) = signal {
            self.deliver(signal).await;
        }
    }

    async fn deliver(&self, signal: TypingSignal) {
        let req = TypingRequest {
            is_typing: signal.is_typing,
            recipient: signal.recipient,
        };
        match self.transport.post_typing(&req).await {
            Ok(()) => debug!(
                target: "zt_client",
                event = "typing_sent",
                recipient = %req.recipient,
                is_typing = req.is_typing
            ),
            Err(e) => warn!(
                target: "zt_client",
                event = "typing_failed",
                recipient = %req.recipient,
                error = %e
            ),
        }
    }
}
