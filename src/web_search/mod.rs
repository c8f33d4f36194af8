//! Web search through a headless browser
//!
//! `SearchProvider` is the seam the resolver depends on; `BrowserSearch` is
//! the chromiumoxide implementation that scrapes DuckDuckGo's static HTML
//! results page.
//!
//! # Failure policy
//! Searching never fails from the caller's point of view. Launch errors,
//! navigation or selector timeouts, and extraction errors are logged and
//! turned into an empty result list. The browser is torn down on every path.
//!
//! # Architecture
//! - `types` - Data structures and selectors
//! - `redirect` - Redirect-wrapper decoding
//! - `search` - Navigation and result extraction

mod redirect;
mod search;
mod types;

pub use redirect::resolve_redirect;
pub use search::build_search_url;
pub use types::{
    DEFAULT_LIMIT, REDIRECT_PARAM, SEARCH_RESULT_SELECTOR, SEARCH_URL, SNIPPET_SELECTOR,
    SearchResult, TITLE_LINK_SELECTOR,
};

use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::browser::{BrowserResult, with_session};
use crate::utils::wait_for_element;
use crate::{BrowserConfig, SearchConfig};

/// Source of search results for the resolver
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Return up to `limit` results for `query`; empty on any failure.
    async fn search(&self, query: &str, limit: usize) -> Vec<SearchResult>;
}

/// Scrapes the configured results page with a fresh browser per call
#[derive(Debug, Clone, Default)]
pub struct BrowserSearch {
    browser: BrowserConfig,
    search: SearchConfig,
}

impl BrowserSearch {
    pub fn new(browser: BrowserConfig, search: SearchConfig) -> Self {
        Self { browser, search }
    }

    pub fn from_config(config: &crate::Config) -> Self {
        Self::new(config.browser.clone(), config.search.clone())
    }

    async fn try_search(&self, query: &str, limit: usize) -> BrowserResult<Vec<SearchResult>> {
        let search_url = build_search_url(&self.search.base_url, query)?;
        let nav_timeout = Duration::from_secs(self.search.page_load_timeout_secs);
        let selector_timeout = Duration::from_secs(self.search.selector_timeout_secs);
        let search_url = &search_url;

        with_session(&self.browser, |page| async move {
            search::perform_search(&page, search_url, nav_timeout).await?;
            wait_for_element(&page, SEARCH_RESULT_SELECTOR, selector_timeout).await?;
            search::extract_results(&page, limit).await
        })
        .await
    }
}

#[async_trait]
impl SearchProvider for BrowserSearch {
    async fn search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        if query.trim().is_empty() || limit == 0 {
            warn!("Skipping search: empty query or zero limit");
            return Vec::new();
        }

        info!("Starting web search for query: {}", query);

        match self.try_search(query, limit).await {
            Ok(results) => {
                info!("Search completed with {} results", results.len());
                results
            }
            Err(e) => {
                warn!(query = %query, error = %e, "Search failed, continuing with no results");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_query_short_circuits_without_browser() {
        let provider = BrowserSearch::default();
        assert!(provider.search("   ", 5).await.is_empty());
        assert!(provider.search("hulu", 0).await.is_empty());
    }
}
