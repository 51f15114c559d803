//! Shared rate limiting for external tools (web crawler, search) that the
//! runtime must throttle regardless of which agent or role is calling them.
//!
//! [`crate::utilities::rpm_controller::RPMController`] is a general-purpose
//! requests-per-minute limiter; here it's kept in a process-wide registry
//! keyed by tool name via `dashmap`, since the limit belongs to the *tool*,
//! not to whichever agent happens to be calling it.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::Arc;

use crate::utilities::rpm_controller::RPMController;

/// Default cap for rate-limited external tools: about five requests per
/// minute.
pub const DEFAULT_MAX_RPM: i32 = 5;

static LIMITERS: Lazy<DashMap<String, Arc<RPMController>>> = Lazy::new(DashMap::new);

/// Returns the shared limiter for `tool_name`, creating one capped at
/// `max_rpm` the first time it's asked for. Later calls ignore `max_rpm` and
/// return the existing limiter — rate limit configuration is set once, at
/// startup, from each tool's registration.
pub fn limiter_for(tool_name: &str, max_rpm: i32) -> Arc<RPMController> {
    LIMITERS
        .entry(tool_name.to_string())
        .or_insert_with(|| Arc::new(RPMController::new(Some(max_rpm))))
        .clone()
}

/// Blocks the calling thread until `tool_name`'s shared limiter allows
/// another request. Intended to be called from inside a tool's `invoke`,
/// off the async executor thread (`RPMController::check_or_wait` performs a
/// blocking `thread::sleep`, so callers should run it via
/// `tokio::task::spawn_blocking`).
pub fn check_or_wait(tool_name: &str, max_rpm: i32) -> bool {
    limiter_for(tool_name, max_rpm).check_or_wait()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_for_returns_same_instance_for_same_name() {
        let a = limiter_for("search", DEFAULT_MAX_RPM);
        let b = limiter_for("search", DEFAULT_MAX_RPM);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn different_tool_names_get_independent_limiters() {
        let a = limiter_for("web_crawler", DEFAULT_MAX_RPM);
        let b = limiter_for("search", DEFAULT_MAX_RPM);
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
