//! Clonechat - chat cloning, bulk video download, and folder publishing
//!
//! Client-side automation over an authenticated user account: an
//! idempotent, resumable clone engine; a video download engine with MP3
//! extraction; and a stage-gated publish pipeline. All three checkpoint
//! their progress in a single SQLite task store.

pub mod app;
pub mod cli;
pub mod config;
pub mod database;
pub mod download;
pub mod error;
pub mod media;
pub mod publish;
pub mod retry;
pub mod sync;
pub mod tasks;
pub mod telegram;

// Re-export main types
pub use app::{Clonechat, ClonechatBuilder};
pub use config::Config;
pub use error::{Error, Result};
pub use retry::RetryPolicy;
pub use tasks::CloningStrategy;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_COMMIT: &str = env!("GIT_COMMIT");
pub const BUILD_TIME: &str = env!("BUILD_TIME");
