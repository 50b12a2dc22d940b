//! Ascending history replay over a newest-first platform API
//!
//! The platform serves history newest-first; the clone loop needs strict
//! ascending delivery. Pages are fetched descending with client-side
//! boundary enforcement (the server is not trusted to honour min_id /
//! max_id), stacked, and replayed oldest-first.

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::retry::RetryPolicy;
use crate::telegram::{Message, TelegramClient};

/// Page size for history requests
pub const PAGE_SIZE: usize = 100;

/// Collect every message with `id > min_id`, sorted ascending.
///
/// Termination is client-side: the walk stops when a page contains any id
/// at or below `min_id`, never on an empty response alone, and every page
/// is filtered to the requested range before it is kept.
pub async fn collect_pending(
    client: &dyn TelegramClient,
    retry: &RetryPolicy,
    cancel: &CancellationToken,
    chat_id: i64,
    min_id: i64,
) -> Result<Vec<Message>> {
    let mut pages: Vec<Vec<Message>> = Vec::new();
    let mut max_id = 0i64;

    loop {
        let raw = retry
            .call(cancel, "history_page", || {
                client.history_page(chat_id, min_id, max_id, PAGE_SIZE)
            })
            .await?;

        if raw.is_empty() {
            break;
        }

        let reached_min = raw.iter().any(|m| m.id <= min_id);
        let raw_min_id = raw.iter().map(|m| m.id).min();

        let mut page: Vec<Message> = raw
            .into_iter()
            .filter(|m| m.id > min_id && (max_id == 0 || m.id < max_id))
            .collect();

        if page.is_empty() {
            if reached_min {
                break;
            }
            // Server sent only out-of-range ids; move the cursor past them.
            match raw_min_id {
                Some(id) if max_id == 0 || id < max_id => max_id = id,
                _ => break,
            }
            continue;
        }

        page.sort_by_key(|m| m.id);
        let page_min = page[0].id;
        pages.push(page);

        if reached_min {
            break;
        }
        max_id = page_min;
    }

    // Pages were collected newest-first; replay them oldest-first.
    pages.reverse();
    Ok(pages.into_iter().flatten().collect())
}
