//! reqwest-backed `Transport`. Every call carries the bearer token and is
//! bounded by the configured request timeout.

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use zt_proto::api::{
    ErrorResponse, FileBlobResponse, OnlineUsersResponse, PostMessageRequest, PublicKeyResponse,
    TypingRequest, TypingStatusResponse, UploadFileRequest, UploadFileResponse, UserSummary,
};
use zt_proto::WireMessage;

use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::transport::Transport;

#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
    token: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig, token: impl Into<String>) -> Result<Self, TransportError> {
        let base_url = Url::parse(&config.api_url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {e}", config.api_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::InvalidUrl(config.api_url.clone()));
        }
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            base_url,
            token: token.into(),
        })
    }

    /// Path segments are percent-encoded, so usernames cannot escape their slot.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn authed_request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<reqwest::Response, TransportError> {
        let url = self.endpoint(segments)?;
        debug!(target: "zt_client", event = "http_request", method = %method, path = %url.path());
        let mut req = self.client.request(method, url).bearer_auth(&self.token);
        if let Some(b) = body {
            req = req.json(b);
        }
        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, TransportError> {
        let resp = self
            .authed_request::<()>(Method::GET, segments, None)
            .await?;
        resp.json::<T>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}

async fn api_error(resp: reqwest::Response) -> TransportError {
    let status = resp.status();
    let path = resp.url().path().to_string();
    let message = resp
        .json::<ErrorResponse>()
        .await
        .map(|b| b.error)
        .unwrap_or_else(|_| format!("Request failed ({status})"));
    if status == reqwest::StatusCode::NOT_FOUND {
        return TransportError::NotFound(path);
    }
    TransportError::Status {
        status: status.as_u16(),
        message,
    }
}

/// Decode each row on its own. A row that does not fit `WireMessage` is
/// logged and dropped; the rest of the batch still goes through.
fn message_rows(rows: Vec<serde_json::Value>) -> Vec<WireMessage> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.get("id").map(|v| v.to_string()).unwrap_or_default();
            match serde_json::from_value::<WireMessage>(row) {
                Ok(msg) => Some(msg),
                Err(e) => {
                    warn!(target: "zt_client", event = "message_row_skipped", message_id = %id, error = %e);
                    None
                }
            }
        })
        .collect()
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_users(&self) -> Result<Vec<UserSummary>, TransportError> {
        self.get_json(&["users"]).await
    }

    async fn get_public_key(&self, username: &str) -> Result<PublicKeyResponse, TransportError> {
        self.get_json(&["users", username, "key"]).await
    }

    async fn get_messages(&self) -> Result<Vec<WireMessage>, TransportError> {
        let rows: Vec<serde_json::Value> = self.get_json(&["messages"]).await?;
        Ok(message_rows(rows))
    }

    async fn post_message(&self, req: &PostMessageRequest) -> Result<(), TransportError> {
        self.authed_request(Method::POST, &["messages"], Some(req))
            .await?;
        Ok(())
    }

    async fn upload_file(
        &self,
        req: &UploadFileRequest,
    ) -> Result<UploadFileResponse, TransportError> {
        let resp = self
            .authed_request(Method::POST, &["upload"], Some(req))
            .await?;
        // Some servers answer 201 with an empty body.
        let bytes = resp.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(UploadFileResponse::default());
        }
        serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode(e.to_string()))
    }

    async fn get_file(&self, file_ref: &str) -> Result<FileBlobResponse, TransportError> {
        self.get_json(&["files", file_ref]).await
    }

    async fn get_online_users(&self) -> Result<OnlineUsersResponse, TransportError> {
        self.get_json(&["online-users"]).await
    }

    async fn get_typing_status(&self, peer: &str) -> Result<TypingStatusResponse, TransportError> {
        self.get_json(&["typing", peer]).await
    }

    async fn post_typing(&self, req: &TypingRequest) -> Result<(), TransportError> {
        self.authed_request(Method::POST, &["typing"], Some(req))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base: &str) -> HttpTransport {
        let cfg = ClientConfig {
            api_url: base.to_string(),
            ..ClientConfig::default()
        };
        HttpTransport::new(&cfg, "token").unwrap()
    }

    #[test]
    fn endpoint_joins_and_escapes_segments() {
        let t = transport("http://localhost:3001");
        let url = t.endpoint(&["users", "bob/../admin", "key"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3001/users/bob%2F..%2Fadmin/key");
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let t = transport("https://chat.example/api/");
        let url = t.endpoint(&["messages"]).unwrap();
        assert_eq!(url.as_str(), "https://chat.example/api/messages");
    }

    #[test]
    fn bad_row_is_dropped_and_the_rest_of_the_batch_survives() {
        let rows: Vec<serde_json::Value> = serde_json::from_str(
            r#"[
                {"id": 1, "from": "alice", "to": "bob", "ciphertext": "AAAA", "ttl": 60,
                 "createdAt": "2024-01-01T00:00:00Z"},
                {"id": 2, "from": "alice", "to": "bob", "ciphertext": null, "ttl": 60,
                 "createdAt": "2024-01-01T00:00:01Z"},
                {"id": 3, "from": "alice", "to": "bob", "ciphertext": "BBBB", "ttl": "soon",
                 "createdAt": "yesterday"},
                {"id": 4, "from": "alice", "to": "bob", "envelope": "CCCC", "ttl": 30,
                 "createdAt": "2024-01-01T00:00:02Z", "isFile": false}
            ]"#,
        )
        .unwrap();
        let ids: Vec<String> = message_rows(rows).into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["1", "4"]);
    }

    #[test]
    fn rejects_unusable_base_url() {
        let cfg = ClientConfig {
            api_url: "mailto:someone@example.com".into(),
            ..ClientConfig::default()
        };
        assert!(matches!(
            HttpTransport::new(&cfg, "t"),
            Err(TransportError::InvalidUrl(_))
        ));
    }
}
