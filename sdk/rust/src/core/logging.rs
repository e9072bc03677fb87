//! Opt-in log subscriber
//!
//! The SDK only emits `tracing` events. Applications that don't install their
//! own subscriber can call [`init_logging`].

use super::constants::{CRATE_TARGET, ENV_LOG_LEVEL};

/// Build the log filter from `INTROSPECTION_LOG_LEVEL`, `RUST_LOG`, or the default.
///
/// A bare level (`debug`, `WARN`) only raises the SDK's own verbosity.
pub fn log_filter(env: impl Fn(&str) -> Option<String>) -> String {
    if let Some(level) = env(ENV_LOG_LEVEL).filter(|v| !v.trim().is_empty()) {
        let level = level.trim().to_ascii_lowercase();
        let bare = match level.as_str() {
            "warning" => Some("warn"),
            "trace" | "debug" | "info" | "warn" | "error" => Some(level.as_str()),
            _ => None,
        };
        return match bare {
            Some(bare) => format!("info,{}={}", CRATE_TARGET, bare),
            None => level.clone(),
        };
    }
    env("RUST_LOG").unwrap_or_else(|| format!("info,{}=info", CRATE_TARGET))
}

/// Install a compact fmt subscriber. Returns `false` if one is already set.
pub fn init_logging() -> bool {
    let filter = log_filter(super::config::process_env);

    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .compact()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_default() {
        assert_eq!(log_filter(|_| None), "info,introspection_sdk=info");
    }

    #[test]
    fn test_log_filter_bare_level() {
        let env = |key: &str| (key == ENV_LOG_LEVEL).then(|| "DEBUG".to_string());
        assert_eq!(log_filter(env), "info,introspection_sdk=debug");

        let env = |key: &str| (key == ENV_LOG_LEVEL).then(|| "warning".to_string());
        assert_eq!(log_filter(env), "info,introspection_sdk=warn");
    }

    #[test]
    fn test_log_filter_directive_passthrough() {
        let env = |key: &str| (key == ENV_LOG_LEVEL).then(|| "introspection_sdk::trace=trace".to_string());
        assert_eq!(log_filter(env), "introspection_sdk::trace=trace");
    }

    #[test]
    fn test_log_filter_rust_log_fallback() {
        let env = |key: &str| (key == "RUST_LOG").then(|| "warn".to_string());
        assert_eq!(log_filter(env), "warn");
    }
}
