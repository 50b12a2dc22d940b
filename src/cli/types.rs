//! CLI argument types and command structures

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "clonechat")]
#[command(version, about = "Chat cloning and folder publishing over a user account", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Clone a source conversation into a destination conversation
    Sync {
        /// Origin chat: id, @handle, or t.me link
        #[arg(long)]
        origin: Option<String>,

        /// Destination chat; a fresh private channel is created when absent
        #[arg(long)]
        dest: Option<String>,

        /// Force the download-upload strategy even when forwarding works
        #[arg(long)]
        force_download: bool,

        /// Extract an MP3 next to every staged video
        #[arg(long)]
        extract_audio: bool,

        /// Drop task state and start over
        #[arg(long)]
        restart: bool,

        /// Leave the origin chat after a successful clone
        #[arg(long)]
        leave_origin: bool,

        /// Chat to receive the clone link on completion
        #[arg(long)]
        publish_to: Option<String>,

        /// Forum topic id for the published link
        #[arg(long)]
        topic: Option<i64>,

        /// Batch mode: run one clone task per identifier in --source
        #[arg(long)]
        batch: bool,

        /// Identifier file for batch mode, one per line
        #[arg(long)]
        source: Option<PathBuf>,
    },

    /// Bulk-download video messages with MP3 extraction
    Download {
        /// Origin chat: id, @handle, or t.me link
        #[arg(long)]
        origin: String,

        /// Stop after this many new videos
        #[arg(long)]
        limit: Option<usize>,

        /// Output directory root
        #[arg(long)]
        output: Option<PathBuf>,

        /// Drop task state and start over
        #[arg(long)]
        restart: bool,

        /// Remove each video once its MP3 is written
        #[arg(long)]
        delete_video: bool,

        /// Rewind the starting checkpoint to this message id
        #[arg(long)]
        message_id: Option<i64>,
    },

    /// Publish a local folder tree as a structured channel
    Publish {
        /// Source folder to publish
        #[arg(long)]
        folder: PathBuf,

        /// Drop task state and start over
        #[arg(long)]
        restart: bool,

        /// Skip the interactive authorisation gates
        #[arg(long)]
        yes: bool,
    },

    /// List all dialogs visible to the account
    ListChats,

    /// List the forum topics of a group
    ListTopics {
        /// Group: id, @handle, or t.me link
        #[arg(long)]
        id: String,
    },

    /// Resolve an identifier and print the canonical chat id
    TestResolve {
        /// Identifier to resolve
        #[arg(long)]
        id: String,
    },

    /// Create or migrate the task store schema
    InitDatabase,

    /// Print version and build information
    Version,
}
