//! Data structures and constants for web search

use serde::{Deserialize, Serialize};

// =============================================================================
// Constants
// =============================================================================

/// DuckDuckGo static HTML results endpoint (no JavaScript rendering needed)
pub const SEARCH_URL: &str = "https://html.duckduckgo.com/html/";

/// CSS selector for organic result containers
///
/// Sponsored rows are `div.result.result--ad` and come first on the page.
pub const SEARCH_RESULT_SELECTOR: &str = "div.result:not(.result--ad)";

/// CSS selector for the title/link anchor inside a result
///
/// ```html
/// <h2 class="result__title">
///   <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com">Title</a>
/// </h2>
/// ```
pub const TITLE_LINK_SELECTOR: &str = "a.result__a";

/// CSS selector for the result snippet
pub const SNIPPET_SELECTOR: &str = ".result__snippet";

/// Query parameter that carries the real destination in redirect wrappers
pub const REDIRECT_PARAM: &str = "uddg";

/// Results handed to the prompt when the caller does not say otherwise
pub const DEFAULT_LIMIT: usize = 5;

// =============================================================================
// Data Structures
// =============================================================================

/// A single search result
///
/// `url` is always the redirect-resolved destination, or the untouched
/// wrapper when the destination could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Result ranking (1-indexed)
    pub rank: usize,

    pub title: String,

    pub url: String,

    /// Description snippet; empty when the engine shows none
    pub snippet: String,
}
