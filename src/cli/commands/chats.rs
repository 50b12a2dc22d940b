//! Chat inspection command handlers - list-chats, list-topics, test-resolve

use std::sync::Arc;

use crate::app::Clonechat;
use crate::error::Result;
use crate::telegram::{resolver, GatewayClient, TelegramClient};

pub async fn handle_list_chats(app: &Clonechat) -> Result<()> {
    let client = Arc::new(GatewayClient::connect(&app.config).await?);
    let dialogs = client.list_dialogs().await?;

    if dialogs.is_empty() {
        println!("No dialogs visible to this account");
        return Ok(());
    }

    println!("{:<16} {:<10} Title", "ID", "Kind");
    println!("{}", "-".repeat(60));
    for dialog in dialogs {
        println!("{:<16} {:<10} {}", dialog.chat_id, dialog.kind, dialog.title);
    }

    Ok(())
}

pub async fn handle_list_topics(app: &Clonechat, id: &str) -> Result<()> {
    let client = Arc::new(GatewayClient::connect(&app.config).await?);
    let resolved = resolver::resolve(&*client, id).await?;
    let topics = client.list_forum_topics(resolved.chat_id).await?;

    if topics.is_empty() {
        println!("No topics in {}", resolved.chat_id);
        return Ok(());
    }

    println!("Topics of {}:", resolved.chat_id);
    for topic in topics {
        println!("{:<10} {}", topic.id, topic.title);
    }

    Ok(())
}

pub async fn handle_test_resolve(app: &Clonechat, id: &str) -> Result<()> {
    let client = Arc::new(GatewayClient::connect(&app.config).await?);
    let resolved = resolver::resolve(&*client, id).await?;

    println!("Chat id: {}", resolved.chat_id);
    if let Some(message_id) = resolved.message_id {
        println!("Message id: {}", message_id);
    }

    Ok(())
}
