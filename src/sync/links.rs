//! Append-only link file
//!
//! Two lines per completed clone: origin title, then the clone's
//! first-message deep link. Records are only ever appended.

use std::path::Path;

use tokio::io::AsyncWriteExt;

use crate::error::Result;

/// Append one clone record (plus an optional invite-link line).
pub async fn append_record(
    path: &Path,
    title: &str,
    deep_link: &str,
    invite_link: Option<&str>,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;

    let mut record = format!("{}\n{}\n", title, deep_link);
    if let Some(invite) = invite_link {
        record.push_str(invite);
        record.push('\n');
    }
    file.write_all(record.as_bytes()).await?;
    file.flush().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_are_appended_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links_canais.txt");

        append_record(&path, "First", "https://t.me/c/1/1", None)
            .await
            .unwrap();
        append_record(&path, "Second", "https://t.me/c/2/1", None)
            .await
            .unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(
            content,
            "First\nhttps://t.me/c/1/1\nSecond\nhttps://t.me/c/2/1\n"
        );
    }

    #[tokio::test]
    async fn test_invite_link_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.txt");

        append_record(&path, "T", "https://t.me/c/9/1", Some("https://t.me/+abc"))
            .await
            .unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, "T\nhttps://t.me/c/9/1\nhttps://t.me/+abc\n");
    }
}
