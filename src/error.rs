//! Error types for Clonechat

use thiserror::Error;

/// Main error type for Clonechat
///
/// The first seven variants form the platform error taxonomy; everything
/// below them is local plumbing (database, disk, configuration).
#[derive(Debug, Error)]
pub enum Error {
    /// Platform-issued back-off directive; the payload is the wait in seconds
    #[error("rate limited for {0}s")]
    RateLimited(u64),

    /// Network/timeout/ambiguous remote failure; retried with backoff
    #[error("transient error: {0}")]
    Transient(String),

    /// Auth, not-found, forbidden, bad-request; never retried
    #[error("permanent error: {0}")]
    Permanent(String),

    /// Forwarding forbidden on protected source content
    #[error("source content is protected from forwarding")]
    Restricted,

    /// Message kind the processor does not handle
    #[error("unsupported message kind: {0}")]
    Unsupported(String),

    /// Transcoder exited non-zero or was killed on timeout
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// User signal observed at a suspension point
    #[error("interrupted")]
    Interrupted,

    /// Identifier could not be parsed locally
    #[error("unresolvable identifier: {0}")]
    Unresolvable(String),

    /// Identifier parsed but the account cannot see the chat
    #[error("no access to chat: {0}")]
    NoAccess(String),

    /// Database-related errors
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Invalid user input (bad args, malformed batch file)
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// True for failures the retry adapter may replay with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient(_))
    }

    /// Process exit code for the top-level CLI handler.
    ///
    /// 0 success, 1 user error, 2 transcoder missing, 3 interrupted,
    /// 4 permanent platform error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Interrupted => 3,
            Error::ExternalTool(msg) if msg.contains("not found") => 2,
            Error::Permanent(_) | Error::Restricted | Error::NoAccess(_) => 4,
            Error::Unresolvable(_) | Error::InvalidInput(_) | Error::Configuration(_) => 1,
            _ => 1,
        }
    }
}

/// Result type alias for Clonechat operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::Interrupted.exit_code(), 3);
        assert_eq!(Error::Permanent("auth".into()).exit_code(), 4);
        assert_eq!(Error::Unresolvable("???".into()).exit_code(), 1);
        assert_eq!(
            Error::ExternalTool("ffmpeg not found in PATH".into()).exit_code(),
            2
        );
        assert_eq!(Error::ExternalTool("exit status 1".into()).exit_code(), 1);
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::Transient("connection reset".into()).is_transient());
        assert!(!Error::RateLimited(5).is_transient());
        assert!(!Error::Permanent("gone".into()).is_transient());
    }
}
