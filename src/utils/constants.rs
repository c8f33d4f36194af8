//! Shared configuration constants
//!
//! This module contains default values used throughout the codebase to
//! ensure consistency and avoid magic numbers.

/// Chrome user agent string for the headless search browser
///
/// Chrome releases new stable versions ~every 4 weeks.
/// Update quarterly to stay within reasonable version window.
///
/// Reference: https://chromiumdash.appspot.com/schedule
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

/// User agent sent with URL validation probes
///
/// Identifies the caller honestly; target sites see who is checking their
/// cancellation pages.
pub const PROBE_USER_AGENT: &str = "Mozilla/5.0 (compatible; SubscriptionGuideLinkChecker/0.1; +https://github.com/subscription-guide)";
