//! Redirect-wrapper decoding
//!
//! The HTML endpoint links every result through
//! `//duckduckgo.com/l/?uddg=<percent-encoded destination>&rut=...`.

use url::Url;

use super::types::REDIRECT_PARAM;

const SEARCH_ORIGIN: &str = "https://duckduckgo.com";
const AD_CLICK_PATH: &str = "/y.js";

/// Resolve a result href to its real destination.
///
/// Returns `href` unchanged when it is not a redirect wrapper or when the
/// embedded destination cannot be decoded into an absolute http(s) URL.
pub fn resolve_redirect(href: &str) -> String {
    match decode_wrapped_target(href) {
        Some(target) => target,
        None => href.to_string(),
    }
}

/// `true` for sponsored-result click trackers (`duckduckgo.com/y.js?...`)
///
/// These carry no decodable destination and never point at the advertised
/// site directly.
pub fn is_ad_link(href: &str) -> bool {
    search_engine_url(href).is_some_and(|parsed| parsed.path().starts_with(AD_CLICK_PATH))
}

/// `href` parsed as an absolute URL on the search engine's own host
fn search_engine_url(href: &str) -> Option<Url> {
    let parsed = Url::parse(&absolutize(href.trim())).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    (host == "duckduckgo.com" || host.ends_with(".duckduckgo.com")).then_some(parsed)
}

fn decode_wrapped_target(href: &str) -> Option<String> {
    let parsed = search_engine_url(href)?;
    if !parsed.path().starts_with("/l/") {
        return None;
    }

    let prefix = format!("{REDIRECT_PARAM}=");
    let raw = parsed
        .query()?
        .split('&')
        .find_map(|pair| pair.strip_prefix(prefix.as_str()))?;

    let unplussed = raw.replace('+', " ");
    let decoded = urlencoding::decode(&unplussed).ok()?;
    let target = decoded.trim();

    let scheme_ok = Url::parse(target)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false);
    scheme_ok.then(|| target.to_string())
}

fn absolutize(href: &str) -> String {
    if href.starts_with("//") {
        format!("https:{href}")
    } else if href.starts_with('/') {
        format!("{SEARCH_ORIGIN}{href}")
    } else {
        href.to_string()
    }
}
