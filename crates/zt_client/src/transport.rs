//! The transport seam. Every server interaction the client performs goes
//! through this trait; authentication is the implementor's concern.

use async_trait::async_trait;

use zt_proto::api::{
    FileBlobResponse, OnlineUsersResponse, PostMessageRequest, PublicKeyResponse,
    TypingRequest, TypingStatusResponse, UploadFileRequest, UploadFileResponse, UserSummary,
};
use zt_proto::WireMessage;

use crate::error::TransportError;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_users(&self) -> Result<Vec<UserSummary>, TransportError>;
    async fn get_public_key(&self, username: &str) -> Result<PublicKeyResponse, TransportError>;
    /// Every live message to or from the authenticated user.
    async fn get_messages(&self) -> Result<Vec<WireMessage>, TransportError>;
    async fn post_message(&self, req: &PostMessageRequest) -> Result<(), TransportError>;
    async fn upload_file(&self, req: &UploadFileRequest)
        -> Result<UploadFileResponse, TransportError>;
    async fn get_file(&self, file_ref: &str) -> Result<FileBlobResponse, TransportError>;
    async fn get_online_users(&self) -> Result<OnlineUsersResponse, TransportError>;
    async fn get_typing_status(&self, peer: &str) -> Result<TypingStatusResponse, TransportError>;
    async fn post_typing(&self, req: &TypingRequest) -> Result<(), TransportError>;
}
