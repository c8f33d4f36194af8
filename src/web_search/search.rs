//! Search execution and result extraction against a live page

use std::time::Duration;

use chromiumoxide::page::Page;
use tracing::{debug, info};
use url::Url;

use super::redirect::{is_ad_link, resolve_redirect};
use super::types::{SNIPPET_SELECTOR, SEARCH_RESULT_SELECTOR, SearchResult, TITLE_LINK_SELECTOR};
use crate::browser::{BrowserError, BrowserResult};

/// Build the results-page URL for `query` with proper encoding
pub fn build_search_url(base_url: &str, query: &str) -> BrowserResult<Url> {
    let mut search_url = Url::parse(base_url)
        .map_err(|e| BrowserError::NavigationFailed(format!("Invalid search URL {base_url}: {e}")))?;
    search_url.query_pairs_mut().append_pair("q", query);
    Ok(search_url)
}

/// Navigate `page` to the results page, bounded by `timeout`
pub async fn perform_search(page: &Page, search_url: &Url, timeout: Duration) -> BrowserResult<()> {
    info!("Navigating to search results: {}", search_url);

    let navigation = async {
        page.goto(search_url.as_str()).await?;
        page.wait_for_navigation().await?;
        Ok::<(), chromiumoxide::error::CdpError>(())
    };

    tokio::time::timeout(timeout, navigation)
        .await
        .map_err(|_| BrowserError::NavigationTimeout {
            url: search_url.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })?
        .map_err(|e| BrowserError::NavigationFailed(format!("{search_url}: {e}")))
}

/// Fields read from one result container, before any filtering
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResult {
    pub href: Option<String>,
    pub title: String,
    pub snippet: Option<String>,
}

/// Read every organic result container on `page` in document order
///
/// `chromiumoxide::Element` is not Clone, so each container is queried
/// inline rather than through helper functions.
pub async fn extract_results(page: &Page, limit: usize) -> BrowserResult<Vec<SearchResult>> {
    let containers = page
        .find_elements(SEARCH_RESULT_SELECTOR)
        .await
        .map_err(|e| BrowserError::ExtractionFailed(format!("Failed to find search results: {e}")))?;

    debug!("Found {} result containers", containers.len());

    let mut rows = Vec::with_capacity(containers.len());
    for container in containers {
        let Ok(title_link) = container.find_element(TITLE_LINK_SELECTOR).await else {
            rows.push(RawResult::default());
            continue;
        };

        let href = title_link.attribute("href").await.ok().flatten();
        let title = title_link.inner_text().await.ok().flatten().unwrap_or_default();
        let snippet = match container.find_element(SNIPPET_SELECTOR).await {
            Ok(el) => el.inner_text().await.ok().flatten(),
            Err(_) => None,
        };

        rows.push(RawResult { href, title, snippet });
    }

    Ok(collect_results(rows, limit))
}

/// Turn raw rows into at most `limit` results, keeping document order
///
/// Rows without a title link or with an empty href are skipped, as are
/// sponsored click trackers. Ranks are 1-based and dense over the kept rows.
pub fn collect_results(rows: Vec<RawResult>, limit: usize) -> Vec<SearchResult> {
    let mut results = Vec::with_capacity(limit.min(rows.len()));

    for (index, row) in rows.into_iter().enumerate() {
        if results.len() >= limit {
            break;
        }

        let href = match row.href.as_deref().map(str::trim) {
            Some(href) if !href.is_empty() => href,
            _ => {
                debug!("Result container {} has no href, skipping", index + 1);
                continue;
            }
        };

        if is_ad_link(href) {
            debug!("Result container {} is a sponsored link, skipping", index + 1);
            continue;
        }

        results.push(SearchResult {
            rank: results.len() + 1,
            title: row.title.trim().to_string(),
            url: resolve_redirect(href),
            snippet: row.snippet.map(|s| s.trim().to_string()).unwrap_or_default(),
        });
    }

    results
}
