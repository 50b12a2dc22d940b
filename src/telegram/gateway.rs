//! HTTP adapter for a local MTProto gateway process
//!
//! The MTProto session itself lives in a sidecar gateway on the loopback
//! interface; this adapter maps each [`TelegramClient`] method to one
//! gateway call and classifies failures into the crate error taxonomy.
//! Retry and backoff are deliberately absent here - that is the retry
//! adapter's job.

use std::path::Path;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::io::AsyncWriteExt;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::telegram::types::{Chat, Dialog, ForumTopic, MediaPayload, Message};
use crate::telegram::TelegramClient;

/// Connect timeout for gateway calls
const CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);
/// Total per-call timeout; media bodies can be large
const BODY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(300);

/// Client for the local gateway's JSON API
pub struct GatewayClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    error: Option<GatewayError>,
}

#[derive(Deserialize)]
struct GatewayError {
    kind: String,
    message: String,
    #[serde(default)]
    retry_after: Option<u64>,
}

impl GatewayClient {
    /// Connect to the gateway and start (or resume) the account session.
    pub async fn connect(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(BODY_TIMEOUT)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;

        let client = Self {
            base_url: config.gateway_url.trim_end_matches('/').to_string(),
            http,
        };

        client
            .invoke::<serde_json::Value>(
                "start",
                json!({ "api_id": config.api_id, "api_hash": config.api_hash }),
            )
            .await?;

        Ok(client)
    }

    async fn invoke<T: DeserializeOwned>(&self, method: &str, body: serde_json::Value) -> Result<T> {
        let url = format!("{}/api/{}", self.base_url, method);

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(classify_reqwest)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(classify_reqwest)?;

        // The envelope error is more precise than the status line; prefer it.
        if let Ok(envelope) = serde_json::from_slice::<Envelope<T>>(&bytes) {
            if envelope.ok {
                return envelope
                    .result
                    .ok_or_else(|| Error::Transient(format!("{}: empty result", method)));
            }
            if let Some(error) = envelope.error {
                return Err(classify_gateway(method, error));
            }
        }

        Err(classify_status(method, status, &bytes))
    }
}

/// Map a gateway error record to the taxonomy.
fn classify_gateway(method: &str, error: GatewayError) -> Error {
    match error.kind.as_str() {
        "flood_wait" => Error::RateLimited(error.retry_after.unwrap_or(60)),
        "forward_restricted" => Error::Restricted,
        "unauthorized" | "auth_key_invalid" | "not_found" | "forbidden" | "bad_request"
        | "media_too_large" | "user_aborted" => {
            Error::Permanent(format!("{}: {}", method, error.message))
        }
        _ => Error::Transient(format!("{}: {}", method, error.message)),
    }
}

/// Fallback classification by HTTP status when no envelope was parsed.
fn classify_status(method: &str, status: StatusCode, body: &[u8]) -> Error {
    let text = String::from_utf8_lossy(body);
    match status.as_u16() {
        429 => Error::RateLimited(60),
        400..=499 => Error::Permanent(format!("{} ({}): {}", method, status, text)),
        _ => Error::Transient(format!("{} ({}): {}", method, status, text)),
    }
}

/// Connection-level failures are transient by definition.
fn classify_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        Error::Transient(format!("gateway unreachable: {e}"))
    } else {
        Error::Transient(format!("gateway transport error: {e}"))
    }
}

#[async_trait]
impl TelegramClient for GatewayClient {
    async fn get_chat(&self, chat_id: i64) -> Result<Chat> {
        self.invoke("get_chat", json!({ "chat_id": chat_id })).await
    }

    async fn resolve_username(&self, username: &str) -> Result<i64> {
        #[derive(Deserialize)]
        struct Resolved {
            chat_id: i64,
        }
        let resolved: Resolved = self
            .invoke("resolve_username", json!({ "username": username }))
            .await
            .map_err(|e| match e {
                Error::Permanent(msg) => Error::NoAccess(msg),
                other => other,
            })?;
        Ok(resolved.chat_id)
    }

    async fn history_page(
        &self,
        chat_id: i64,
        min_id: i64,
        max_id: i64,
        limit: usize,
    ) -> Result<Vec<Message>> {
        self.invoke(
            "history_page",
            json!({ "chat_id": chat_id, "min_id": min_id, "max_id": max_id, "limit": limit }),
        )
        .await
    }

    async fn forward_message(&self, origin: i64, message_id: i64, destination: i64) -> Result<i64> {
        #[derive(Deserialize)]
        struct Sent {
            message_id: i64,
        }
        let sent: Sent = self
            .invoke(
                "forward_message",
                json!({ "origin": origin, "message_id": message_id, "destination": destination }),
            )
            .await?;
        Ok(sent.message_id)
    }

    async fn send_text(&self, chat_id: i64, text: &str, topic_id: Option<i64>) -> Result<i64> {
        #[derive(Deserialize)]
        struct Sent {
            message_id: i64,
        }
        let sent: Sent = self
            .invoke(
                "send_text",
                json!({ "chat_id": chat_id, "text": text, "topic_id": topic_id }),
            )
            .await?;
        Ok(sent.message_id)
    }

    async fn send_media(&self, chat_id: i64, media: &MediaPayload) -> Result<i64> {
        #[derive(Deserialize)]
        struct Sent {
            message_id: i64,
        }
        // The gateway shares the filesystem; media travels by path.
        let sent: Sent = self
            .invoke(
                "send_media",
                json!({
                    "chat_id": chat_id,
                    "path": media.path,
                    "caption": media.caption,
                    "kind": media.kind,
                }),
            )
            .await?;
        Ok(sent.message_id)
    }

    async fn send_poll(&self, chat_id: i64, question: &str, options: &[String]) -> Result<i64> {
        #[derive(Deserialize)]
        struct Sent {
            message_id: i64,
        }
        let sent: Sent = self
            .invoke(
                "send_poll",
                json!({ "chat_id": chat_id, "question": question, "options": options }),
            )
            .await?;
        Ok(sent.message_id)
    }

    async fn send_location(&self, chat_id: i64, latitude: f64, longitude: f64) -> Result<i64> {
        #[derive(Deserialize)]
        struct Sent {
            message_id: i64,
        }
        let sent: Sent = self
            .invoke(
                "send_location",
                json!({ "chat_id": chat_id, "latitude": latitude, "longitude": longitude }),
            )
            .await?;
        Ok(sent.message_id)
    }

    async fn download_media(
        &self,
        chat_id: i64,
        message_id: i64,
        destination: &Path,
    ) -> Result<u64> {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let url = format!("{}/api/download_media", self.base_url);
        let mut response = self
            .http
            .post(&url)
            .json(&json!({ "chat_id": chat_id, "message_id": message_id }))
            .send()
            .await
            .map_err(classify_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let bytes = response.bytes().await.unwrap_or_default();
            return Err(classify_status("download_media", status, &bytes));
        }

        let mut file = tokio::fs::File::create(destination).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(classify_reqwest)? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }

    async fn create_channel(&self, title: &str) -> Result<Chat> {
        self.invoke("create_channel", json!({ "title": title })).await
    }

    async fn set_chat_description(&self, chat_id: i64, description: &str) -> Result<()> {
        let _: serde_json::Value = self
            .invoke(
                "set_chat_description",
                json!({ "chat_id": chat_id, "description": description }),
            )
            .await?;
        Ok(())
    }

    async fn export_invite_link(&self, chat_id: i64) -> Result<String> {
        #[derive(Deserialize)]
        struct Invite {
            link: String,
        }
        let invite: Invite = self
            .invoke("export_invite_link", json!({ "chat_id": chat_id }))
            .await?;
        Ok(invite.link)
    }

    async fn pinned_messages(&self, chat_id: i64) -> Result<Vec<i64>> {
        self.invoke("pinned_messages", json!({ "chat_id": chat_id })).await
    }

    async fn pin_message(&self, chat_id: i64, message_id: i64) -> Result<()> {
        let _: serde_json::Value = self
            .invoke(
                "pin_message",
                json!({ "chat_id": chat_id, "message_id": message_id }),
            )
            .await?;
        Ok(())
    }

    async fn leave_chat(&self, chat_id: i64) -> Result<()> {
        let _: serde_json::Value = self
            .invoke("leave_chat", json!({ "chat_id": chat_id }))
            .await?;
        Ok(())
    }

    async fn list_dialogs(&self) -> Result<Vec<Dialog>> {
        self.invoke("list_dialogs", json!({})).await
    }

    async fn list_forum_topics(&self, chat_id: i64) -> Result<Vec<ForumTopic>> {
        self.invoke("list_forum_topics", json!({ "chat_id": chat_id })).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_classification() {
        let err = |kind: &str| GatewayError {
            kind: kind.into(),
            message: "m".into(),
            retry_after: Some(7),
        };

        assert!(matches!(
            classify_gateway("op", err("flood_wait")),
            Error::RateLimited(7)
        ));
        assert!(matches!(
            classify_gateway("op", err("forward_restricted")),
            Error::Restricted
        ));
        assert!(matches!(
            classify_gateway("op", err("not_found")),
            Error::Permanent(_)
        ));
        assert!(matches!(
            classify_gateway("op", err("internal")),
            Error::Transient(_)
        ));
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            classify_status("op", StatusCode::TOO_MANY_REQUESTS, b""),
            Error::RateLimited(_)
        ));
        assert!(matches!(
            classify_status("op", StatusCode::NOT_FOUND, b""),
            Error::Permanent(_)
        ));
        assert!(matches!(
            classify_status("op", StatusCode::BAD_GATEWAY, b""),
            Error::Transient(_)
        ));
    }
}
