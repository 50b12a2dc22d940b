//! CLI module - command-line interface for Clonechat

pub mod commands;
pub mod types;

use tokio_util::sync::CancellationToken;

use crate::app::Clonechat;
use crate::error::Result;
use types::{Cli, Commands};

/// Run the CLI application
pub async fn run(cli: Cli, app: Clonechat, cancel: CancellationToken) -> Result<()> {
    match cli.command {
        Commands::Sync {
            origin,
            dest,
            force_download,
            extract_audio,
            restart,
            leave_origin,
            publish_to,
            topic,
            batch,
            source,
        } => {
            commands::handle_sync(
                &app,
                cancel,
                origin,
                dest,
                force_download,
                extract_audio,
                restart,
                leave_origin,
                publish_to,
                topic,
                batch,
                source,
            )
            .await
        }

        Commands::Download {
            origin,
            limit,
            output,
            restart,
            delete_video,
            message_id,
        } => {
            commands::handle_download(
                &app,
                cancel,
                origin,
                limit,
                output,
                restart,
                delete_video,
                message_id,
            )
            .await
        }

        Commands::Publish { folder, restart, yes } => {
            commands::handle_publish(&app, cancel, folder, restart, yes).await
        }

        Commands::ListChats => commands::handle_list_chats(&app).await,

        Commands::ListTopics { id } => commands::handle_list_topics(&app, &id).await,

        Commands::TestResolve { id } => commands::handle_test_resolve(&app, &id).await,

        Commands::InitDatabase => {
            app.database.ensure_schema().await?;
            println!("Task store schema is up to date");
            Ok(())
        }

        // Handled in main.rs before the app is built
        Commands::Version => Ok(()),
    }
}
