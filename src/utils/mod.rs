// Shared helpers for the search, probe, and config layers
pub mod constants;
mod errors;
mod timeout;
mod wait_for_element;

pub use errors::ConfigError;
pub use timeout::{validate_navigation_timeout, validate_probe_timeout};
pub use wait_for_element::wait_for_element;
