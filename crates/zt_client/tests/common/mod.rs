//! In-memory chat server shared by several users, each seeing it through
//! its own `FakeTransport`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use zt_client::{SessionContext, Transport, TransportError};
use zt_crypto::{Envelope, Keypair};
use zt_proto::api::{
    FileBlobResponse, OnlineUsersResponse, PostMessageRequest, PublicKeyResponse, TypingRequest,
    TypingStatusResponse, UploadFileRequest, UploadFileResponse, UserSummary,
};
use zt_proto::WireMessage;

#[derive(Default)]
pub struct ServerState {
    pub keys: HashMap<String, String>,
    pub messages: Vec<WireMessage>,
    pub files: HashMap<String, Envelope>,
    pub online: HashMap<String, bool>,
    /// viewer -> users typing to them
    pub typing: HashMap<String, Vec<String>>,
    pub typing_posts: Vec<(String, TypingRequest)>,
    pub fail_posts: bool,
    pub fail_fetch: bool,
    /// Keep returning rows past their TTL, like a server with a lagging reaper.
    pub serve_expired: bool,
    /// Key lookups that time out before the directory answers again.
    pub key_timeouts: usize,
    /// Hold `typing=false` posts in flight this long before recording them.
    pub typing_stop_delay: Option<std::time::Duration>,
    pub message_fetches: usize,
    next_id: u64,
}

#[derive(Clone, Default)]
pub struct FakeServer {
    pub state: Arc<Mutex<ServerState>>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user with a fresh keypair and return a session for them.
    pub fn register(&self, username: &str) -> SessionContext {
        let kp = Keypair::generate().unwrap();
        self.state
            .lock()
            .keys
            .insert(username.to_string(), kp.public.to_b64());
        SessionContext::new(username, Some(kp))
    }

    pub fn transport(&self, me: &str) -> Arc<dyn Transport> {
        Arc::new(FakeTransport {
            server: self.clone(),
            me: me.to_string(),
        })
    }

    /// Drop a raw row into the store as if someone had posted it.
    pub fn inject(
        &self,
        from: &str,
        to: &str,
        envelope: String,
        created_at: DateTime<Utc>,
        ttl: u32,
    ) -> String {
        let mut st = self.state.lock();
        st.next_id += 1;
        let id = st.next_id.to_string();
        st.messages.push(WireMessage {
            id: id.clone(),
            from: from.into(),
            to: to.into(),
            envelope,
            ttl,
            created_at,
            is_file: false,
            file_ref: None,
        });
        id
    }

    pub fn inject_file(&self, from: &str, to: &str, metadata: Envelope, file_ref: &str) -> String {
        let id = self.inject(from, to, metadata.to_b64(), Utc::now(), 300);
        let mut st = self.state.lock();
        if let Some(row) = st.messages.iter_mut().find(|m| m.id == id) {
            row.is_file = true;
            row.file_ref = Some(file_ref.to_string());
        }
        id
    }

    pub fn set_fail_posts(&self, fail: bool) {
        self.state.lock().fail_posts = fail;
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.state.lock().fail_fetch = fail;
    }

    pub fn set_serve_expired(&self, serve: bool) {
        self.state.lock().serve_expired = serve;
    }

    pub fn time_out_key_lookups(&self, times: usize) {
        self.state.lock().key_timeouts = times;
    }

    pub fn delay_typing_stops(&self, delay: std::time::Duration) {
        self.state.lock().typing_stop_delay = Some(delay);
    }

    pub fn typing_posts(&self) -> Vec<(String, TypingRequest)> {
        self.state.lock().typing_posts.clone()
    }

    pub fn message_count(&self) -> usize {
        self.state.lock().messages.len()
    }
}

pub fn seconds_ago(secs: i64) -> DateTime<Utc> {
    Utc::now() - Duration::seconds(secs)
}

pub struct FakeTransport {
    server: FakeServer,
    me: String,
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get_users(&self) -> Result<Vec<UserSummary>, TransportError> {
        let st = self.server.state.lock();
        let mut names: Vec<&String> = st.keys.keys().collect();
        names.sort();
        Ok(names
            .into_iter()
            .enumerate()
            .map(|(i, u)| UserSummary {
                id: (i + 1).to_string(),
                username: u.clone(),
            })
            .collect())
    }

    async fn get_public_key(&self, username: &str) -> Result<PublicKeyResponse, TransportError> {
        let mut st = self.server.state.lock();
        if st.key_timeouts > 0 {
            st.key_timeouts -= 1;
            return Err(TransportError::Timeout);
        }
        st.keys
            .get(username)
            .map(|k| PublicKeyResponse {
                public_key: k.clone(),
            })
            .ok_or_else(|| TransportError::NotFound(format!("/users/{username}/key")))
    }

    async fn get_messages(&self) -> Result<Vec<WireMessage>, TransportError> {
        let mut st = self.server.state.lock();
        st.message_fetches += 1;
        if st.fail_fetch {
            return Err(TransportError::Timeout);
        }
        let now = Utc::now();
        Ok(st
            .messages
            .iter()
            .filter(|m| m.from == self.me || m.to == self.me)
            .filter(|m| {
                st.serve_expired || m.created_at + Duration::seconds(i64::from(m.ttl)) > now
            })
            .cloned()
            .collect())
    }

    async fn post_message(&self, req: &PostMessageRequest) -> Result<(), TransportError> {
        if self.server.state.lock().fail_posts {
            return Err(TransportError::Network("connection reset".into()));
        }
        self.server.inject(
            &self.me,
            &req.recipient_username,
            req.ciphertext.to_b64(),
            Utc::now(),
            req.ttl,
        );
        Ok(())
    }

    async fn upload_file(
        &self,
        req: &UploadFileRequest,
    ) -> Result<UploadFileResponse, TransportError> {
        if self.server.state.lock().fail_posts {
            return Err(TransportError::Network("connection reset".into()));
        }
        let file_ref = format!("file-{}", self.server.message_count() + 1);
        self.server
            .state
            .lock()
            .files
            .insert(file_ref.clone(), req.encrypted_file.clone());
        self.server.inject_file(
            &self.me,
            &req.recipient_username,
            req.encrypted_metadata.clone(),
            &file_ref,
        );
        Ok(UploadFileResponse {
            file_ref: Some(file_ref),
        })
    }

    async fn get_file(&self, file_ref: &str) -> Result<FileBlobResponse, TransportError> {
        self.server
            .state
            .lock()
            .files
            .get(file_ref)
            .map(|f| FileBlobResponse {
                encrypted_file: f.clone(),
            })
            .ok_or_else(|| TransportError::NotFound(format!("/files/{file_ref}")))
    }

    async fn get_online_users(&self) -> Result<OnlineUsersResponse, TransportError> {
        Ok(self.server.state.lock().online.clone())
    }

    async fn get_typing_status(&self, peer: &str) -> Result<TypingStatusResponse, TransportError> {
        let st = self.server.state.lock();
        let typing_users = st
            .typing
            .get(&self.me)
            .map(|users| users.iter().filter(|u| *u == peer).cloned().collect())
            .unwrap_or_default();
        Ok(TypingStatusResponse { typing_users })
    }

    async fn post_typing(&self, req: &TypingRequest) -> Result<(), TransportError> {
        let delay = self.server.state.lock().typing_stop_delay;
        if let (false, Some(delay)) = (req.is_typing, delay) {
            tokio::time::sleep(delay).await;
        }
        self.server
            .state
            .lock()
            .typing_posts
            .push((self.me.clone(), req.clone()));
        Ok(())
    }
}
