use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::contract::{RepositoryRef, SourceHost};

/// Collect search results from pages `1..=pages`, in page order.
///
/// A failing page is logged and skipped; results from other pages are kept.
/// Once `cancel` fires no further page is requested.
pub async fn fetch_repositories<H>(
    host: &H,
    query: &str,
    per_page: u32,
    pages: u32,
    cancel: &CancellationToken,
) -> Vec<RepositoryRef>
where
    H: SourceHost + ?Sized,
{
    let mut repositories = Vec::new();
    for page in 1..=pages {
        if cancel.is_cancelled() {
            warn!(page, "[SEARCH] Cancelled, not requesting further pages");
            break;
        }
        info!(page, pages, "[SEARCH] Fetching page of repository results");
        match host.search_repositories(query, per_page, page).await {
            Ok(items) => {
                info!(page, count = items.len(), "[SEARCH] Page fetched");
                repositories.extend(items);
            }
            Err(e) => {
                error!(page, error = %e, "[SEARCH] Failed to fetch page, continuing");
            }
        }
    }
    repositories
}
