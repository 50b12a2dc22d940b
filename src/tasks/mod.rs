//! Task persistence - models and store operations
//!
//! Three task kinds share the SQLite store: clone tasks keyed by origin
//! chat, download tasks keyed by origin chat, publish tasks keyed by
//! source folder path. Each kind exposes get / upsert / advance / delete;
//! every mutation is committed before control returns.

pub mod download;
pub mod models;
pub mod publish;
pub mod sync;

pub use models::{CloningStrategy, DownloadTask, PublishStep, PublishTask, SyncTask, TaskStatus};
