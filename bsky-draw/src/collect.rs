use bsky_msg::Page;
use log::{debug, warn};
use std::future::Future;

/// Items requested per listing call.
pub const PAGE_LIMIT: u8 = 100;

/// Drains a cursor-driven listing.
///
/// `list` is called with `None` first and then with each returned cursor
/// until the cursor comes back empty or repeats the one just sent. The first
/// failing call fails the whole collection. Duplicates are kept.
pub async fn collect_all<T, E, F, Fut>(mut list: F) -> Result<Vec<T>, E>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0;

    loop {
        let page = list(cursor.clone()).await?;
        pages += 1;
        items.extend(page.items);

        match page.cursor.filter(|next| !next.is_empty()) {
            None => break,
            Some(next) if cursor.as_ref() == Some(&next) => {
                warn!("Listing returned cursor {:?} twice, stopping", next);
                break;
            }
            Some(next) => cursor = Some(next),
        }
    }

    debug!("Collected {} items over {} pages", items.len(), pages);
    Ok(items)
}
