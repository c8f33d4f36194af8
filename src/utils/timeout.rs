//! Timeout validation for configured browser, model, and probe operations

use std::time::Duration;

use super::errors::ConfigError;

/// Maximum timeout for browser navigation and model requests (5 minutes)
/// Covers slow-loading sites, heavy result pages, and network delays
pub const MAX_NAVIGATION_TIMEOUT_MS: u64 = 300_000; // 5 minutes

/// Maximum timeout for a single URL probe (30 seconds)
pub const MAX_PROBE_TIMEOUT_MS: u64 = 30_000; // 30 seconds

/// Validate timeout for navigation-scale operations
///
/// # Arguments
/// * `field` - Config field name, used in the error message
/// * `ms` - Timeout in milliseconds
///
/// # Returns
/// * `Ok(Duration)` - Validated Duration object
/// * `Err(ConfigError)` - If timeout is zero or exceeds MAX_NAVIGATION_TIMEOUT_MS
pub fn validate_navigation_timeout(field: &'static str, ms: u64) -> Result<Duration, ConfigError> {
    validate(field, ms, MAX_NAVIGATION_TIMEOUT_MS)
}

/// Validate timeout for a single HEAD/GET probe
pub fn validate_probe_timeout(field: &'static str, ms: u64) -> Result<Duration, ConfigError> {
    validate(field, ms, MAX_PROBE_TIMEOUT_MS)
}

fn validate(field: &'static str, ms: u64, max_ms: u64) -> Result<Duration, ConfigError> {
    if ms == 0 {
        return Err(ConfigError::ZeroTimeout { field });
    }

    if ms > max_ms {
        return Err(ConfigError::TimeoutTooLarge {
            field,
            max_ms,
            got_ms: ms,
        });
    }

    Ok(Duration::from_millis(ms))
}
