//! CLI command handlers

pub mod chats;
pub mod download;
pub mod publish;
pub mod sync;

pub use chats::{handle_list_chats, handle_list_topics, handle_test_resolve};
pub use download::handle_download;
pub use publish::handle_publish;
pub use sync::handle_sync;
