//! Platform port and adapters
//!
//! The engines never talk to the wire directly; they depend on the
//! [`TelegramClient`] trait. The shipped adapter ([`GatewayClient`])
//! drives a local MTProto gateway process over HTTP/JSON. Tests inject a
//! scripted mock.

pub mod gateway;
pub mod resolver;
pub mod types;

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
pub use gateway::GatewayClient;
pub use types::{
    deep_link, internal_channel_id, AudioAttrs, Chat, Dialog, DocumentAttrs, ForumTopic,
    MediaPayload, Message, MessageKind, PollAttrs, VideoAttrs,
};

/// Session-based platform client
///
/// Every method is a single platform round-trip; retry, backoff, and
/// cancellation live in [`crate::retry`], not in implementations.
/// History is served newest-first, as the platform delivers it.
#[async_trait]
pub trait TelegramClient: Send + Sync {
    /// Fetch chat metadata by canonical id.
    async fn get_chat(&self, chat_id: i64) -> Result<Chat>;

    /// Resolve a public handle (or invite hash) to a canonical chat id.
    async fn resolve_username(&self, username: &str) -> Result<i64>;

    /// One page of history, newest-first, restricted to
    /// `min_id < id < max_id` (0 = unbounded). Implementations may return
    /// out-of-range rows; callers enforce boundaries client-side.
    async fn history_page(
        &self,
        chat_id: i64,
        min_id: i64,
        max_id: i64,
        limit: usize,
    ) -> Result<Vec<Message>>;

    /// Forward a message, returning the destination message id.
    async fn forward_message(&self, origin: i64, message_id: i64, destination: i64) -> Result<i64>;

    /// Send plain text, optionally into a forum topic.
    async fn send_text(&self, chat_id: i64, text: &str, topic_id: Option<i64>) -> Result<i64>;

    /// Send a local file with kind-appropriate metadata.
    async fn send_media(&self, chat_id: i64, media: &MediaPayload) -> Result<i64>;

    /// Re-create a poll in the destination.
    async fn send_poll(&self, chat_id: i64, question: &str, options: &[String]) -> Result<i64>;

    /// Re-create a location pin in the destination.
    async fn send_location(&self, chat_id: i64, latitude: f64, longitude: f64) -> Result<i64>;

    /// Download a message's primary payload to `destination`, returning
    /// the number of bytes written.
    async fn download_media(&self, chat_id: i64, message_id: i64, destination: &Path)
        -> Result<u64>;

    /// Create a new private channel.
    async fn create_channel(&self, title: &str) -> Result<Chat>;

    /// Replace the channel description.
    async fn set_chat_description(&self, chat_id: i64, description: &str) -> Result<()>;

    /// Export a fresh invite link for the chat.
    async fn export_invite_link(&self, chat_id: i64) -> Result<String>;

    /// Ids of pinned messages, newest-first as the platform returns them.
    async fn pinned_messages(&self, chat_id: i64) -> Result<Vec<i64>>;

    /// Pin a message in the chat.
    async fn pin_message(&self, chat_id: i64, message_id: i64) -> Result<()>;

    /// Leave the chat.
    async fn leave_chat(&self, chat_id: i64) -> Result<()>;

    /// All dialogs visible to the account.
    async fn list_dialogs(&self) -> Result<Vec<Dialog>>;

    /// Topics of a forum group.
    async fn list_forum_topics(&self, chat_id: i64) -> Result<Vec<ForumTopic>>;
}
