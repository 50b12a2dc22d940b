//! Identifier resolution
//!
//! Maps free-form user input - numeric id, `@handle`, public or private
//! `t.me` link, optionally with a trailing message id - to a canonical
//! chat id. Parsing is local and infallible network-wise; only handle
//! lookup needs a platform round-trip.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Error, Result};
use crate::telegram::TelegramClient;

lazy_static! {
    /// `t.me/c/<internal>[/<msg>]` private links
    static ref PRIVATE_LINK: Regex =
        Regex::new(r"/c/(\d+)(?:/(\d+))?/?$").unwrap();
    /// `t.me/<name>[/<msg>]` public links
    static ref PUBLIC_LINK: Regex =
        Regex::new(r"(?:https?://)?(?:www\.)?t(?:elegram)?\.me/(\+?[A-Za-z0-9_]+)(?:/(\d+))?/?$")
            .unwrap();
    /// Bare handles and invite hashes
    static ref HANDLE: Regex = Regex::new(r"^\+?[A-Za-z0-9_]{3,}$").unwrap();
}

/// Locally-parsed form of a user-supplied identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedIdentifier {
    /// Canonical id; passed through without a round-trip
    ChatId(i64),
    /// Handle or invite hash needing platform lookup
    Username(String),
    /// Private link; the canonical `-100<internal>` id is recoverable locally
    PrivateLink {
        chat_id: i64,
        message_id: Option<i64>,
    },
    /// Public link; the handle still needs platform lookup
    PublicLink {
        username: String,
        message_id: Option<i64>,
    },
}

/// Resolution result: canonical chat id plus optional message id from the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub chat_id: i64,
    pub message_id: Option<i64>,
}

impl Resolved {
    /// The canonical string form; resolving it again yields the same result.
    pub fn canonical_form(&self) -> String {
        self.chat_id.to_string()
    }
}

/// Parse an identifier without touching the network.
///
/// Rules are tried in order: pure integer, `@handle`, private `/c/` link,
/// public `t.me` link, bare handle. Anything else is `Unresolvable`.
pub fn parse_identifier(input: &str) -> Result<ParsedIdentifier> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::Unresolvable("empty identifier".into()));
    }

    if let Ok(id) = input.parse::<i64>() {
        return Ok(ParsedIdentifier::ChatId(id));
    }

    if let Some(handle) = input.strip_prefix('@') {
        if HANDLE.is_match(handle) {
            return Ok(ParsedIdentifier::Username(handle.to_string()));
        }
        return Err(Error::Unresolvable(format!("malformed handle '@{}'", handle)));
    }

    if input.contains("/c/") {
        let captures = PRIVATE_LINK
            .captures(input)
            .ok_or_else(|| Error::Unresolvable(format!("malformed private link '{}'", input)))?;
        let internal: i64 = captures[1]
            .parse()
            .map_err(|_| Error::Unresolvable(format!("bad channel id in '{}'", input)))?;
        let chat_id: i64 = format!("-100{}", internal)
            .parse()
            .map_err(|_| Error::Unresolvable(format!("channel id out of range in '{}'", input)))?;
        let message_id = captures.get(2).and_then(|m| m.as_str().parse().ok());
        return Ok(ParsedIdentifier::PrivateLink { chat_id, message_id });
    }

    if let Some(captures) = PUBLIC_LINK.captures(input) {
        let username = captures[1].to_string();
        let message_id = captures.get(2).and_then(|m| m.as_str().parse().ok());
        return Ok(ParsedIdentifier::PublicLink { username, message_id });
    }

    if HANDLE.is_match(input) {
        return Ok(ParsedIdentifier::Username(input.to_string()));
    }

    Err(Error::Unresolvable(format!("unrecognised identifier '{}'", input)))
}

/// Resolve an identifier to a canonical chat id.
///
/// Parse failures surface as [`Error::Unresolvable`] (local); lookup
/// failures surface as [`Error::NoAccess`] (round-trip).
pub async fn resolve(client: &dyn TelegramClient, input: &str) -> Result<Resolved> {
    match parse_identifier(input)? {
        ParsedIdentifier::ChatId(chat_id) => Ok(Resolved {
            chat_id,
            message_id: None,
        }),
        ParsedIdentifier::PrivateLink { chat_id, message_id } => Ok(Resolved { chat_id, message_id }),
        ParsedIdentifier::Username(username) => {
            let chat_id = lookup(client, &username).await?;
            Ok(Resolved {
                chat_id,
                message_id: None,
            })
        }
        ParsedIdentifier::PublicLink { username, message_id } => {
            let chat_id = lookup(client, &username).await?;
            Ok(Resolved { chat_id, message_id })
        }
    }
}

async fn lookup(client: &dyn TelegramClient, username: &str) -> Result<i64> {
    client.resolve_username(username).await.map_err(|e| match e {
        Error::NoAccess(_) => e,
        other => Error::NoAccess(format!("{}: {}", username, other)),
    })
}
