//! Prompt construction for the generative model
//!
//! The prompt pins the model to URLs that appear in the search context,
//! ranks the kinds of page to prefer, lists URL shapes to avoid, and fixes
//! a single JSON schema for the answer.

use crate::info::Mode;
use crate::web_search::SearchResult;

/// Plan-tier suffixes dropped from service names before searching
///
/// Latin suffixes must be separated from the name; Japanese ones may be
/// attached ("YouTubeプレミアム").
const LATIN_PLAN_SUFFIXES: &[&str] = &["premium", "standard", "basic", "plus", "pro"];
const JAPANESE_PLAN_SUFFIXES: &[&str] = &["プレミアム", "スタンダード", "ベーシック", "プラス"];

/// Strip trailing plan-tier suffixes ("YouTube Premium" → "YouTube").
///
/// Never returns an empty string: a name that is nothing but a suffix comes
/// back trimmed and otherwise untouched.
pub fn normalize_service_name(name: &str) -> String {
    let original = name.trim();
    let mut current = original;

    loop {
        let stripped = strip_plan_suffix(current);
        if stripped == current {
            break;
        }
        current = stripped;
    }

    if current.is_empty() {
        original.to_string()
    } else {
        current.to_string()
    }
}

fn strip_plan_suffix(name: &str) -> &str {
    for suffix in LATIN_PLAN_SUFFIXES {
        if let Some(head) = strip_suffix_ignore_ascii_case(name, suffix)
            && head.ends_with(|c: char| c.is_whitespace() || matches!(c, '-' | '_' | '・'))
        {
            return head.trim_end_matches(|c: char| c.is_whitespace() || matches!(c, '-' | '_' | '・'));
        }
    }

    for suffix in JAPANESE_PLAN_SUFFIXES {
        if let Some(head) = name.strip_suffix(suffix) {
            return head.trim_end_matches(|c: char| c.is_whitespace() || c == '・');
        }
    }

    name
}

fn strip_suffix_ignore_ascii_case<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    let start = name.len().checked_sub(suffix.len())?;
    let tail = name.get(start..)?;
    tail.eq_ignore_ascii_case(suffix).then(|| &name[..start])
}

/// Search query for `mode`, built from the normalized service name
pub fn search_query(service_name: &str, mode: Mode) -> String {
    let name = normalize_service_name(service_name);
    match mode {
        Mode::Cancellation => format!("{name} 解約方法 公式"),
        Mode::Registration => format!("{name} 有料契約 登録 公式"),
    }
}

/// Render search results as the bullet list embedded in the prompt
pub fn format_search_context(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "(No search results are available. Do not guess a URL; leave the URL field empty.)"
            .to_string();
    }

    results
        .iter()
        .map(|r| {
            let mut entry = format!("- {}\n  URL: {}", r.title, r.url);
            if !r.snippet.is_empty() {
                entry.push_str("\n  ");
                entry.push_str(&r.snippet);
            }
            entry
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the full instruction for `service_name` in `mode`
pub fn build_prompt(service_name: &str, search_context: &str, mode: Mode) -> String {
    let (task, priorities, schema) = match mode {
        Mode::Cancellation => (
            format!("Find how to cancel the subscription service \"{service_name}\"."),
            CANCELLATION_PRIORITIES,
            CANCELLATION_SCHEMA,
        ),
        Mode::Registration => (
            format!("Find how to sign up for a paid plan of the service \"{service_name}\"."),
            REGISTRATION_PRIORITIES,
            REGISTRATION_SCHEMA,
        ),
    };

    format!(
        "You are an assistant that helps users manage their subscriptions.\n\
         {task}\n\n\
         ## Search results\n\
         {search_context}\n\n\
         ## Choosing the URL\n\
         Only use a URL that appears in the search results above. \
         Prefer pages in this order:\n\
         {priorities}\n\n\
         ## Never return\n\
         {AVOID_RULES}\n\n\
         If no search result is a suitable official page, return an empty string \
         for the URL. An empty URL is better than a guessed one.\n\
         Write labels and descriptions in Japanese.\n\n\
         ## Output\n\
         Respond with exactly one JSON object matching this schema, with no \
         markdown, code fences, or commentary:\n\
         {schema}"
    )
}

const CANCELLATION_PRIORITIES: &str = "\
1. Official help center or FAQ page explaining cancellation\n\
2. Official account or subscription settings page where the plan is cancelled\n\
3. Official homepage of the service";

const REGISTRATION_PRIORITIES: &str = "\
1. Official sign-up or plan selection page\n\
2. Official help center or FAQ page explaining how to subscribe\n\
3. Official homepage of the service";

const AVOID_RULES: &str = "\
- Login or sign-in pages\n\
- Generic contact or inquiry forms\n\
- Paths you constructed or guessed that do not appear in the search results\n\
- Third-party blogs, comparison sites, or app store listings";

const CANCELLATION_SCHEMA: &str = r#"{
  "cancellation_url": "string (empty if no official page was found)",
  "steps": [{"id": 1, "label": "short action", "description": "what the user does"}],
  "required_info": [{"label": "item the user needs", "value": "where to find it"}],
  "is_cancellable": true
}"#;

const REGISTRATION_SCHEMA: &str = r#"{
  "registration_url": "string (empty if no official page was found)",
  "has_free_trial": false,
  "trial_period": "string or null",
  "notes": "string or null"
}"#;
