//! Tracing/logging bootstrap for the smoke harness.

use std::env;

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,chat_core=debug,chat_protocol=debug";

/// Initialize global tracing subscriber with severity gating from environment.
///
/// Filter precedence:
/// 1) `RUST_LOG`
/// 2) `CHAT_SMOKE_LOG`
/// 3) internal default filter
pub fn init() {
    let env_filter = filter_from_env();
    let _ = tracing_subscriber::fmt()
        .with_target(true)
        .with_env_filter(env_filter)
        .try_init();
}

fn filter_from_env() -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    if let Some(value) = env::var("CHAT_SMOKE_LOG")
        .ok()
        .filter(|v| !v.trim().is_empty())
        && let Ok(filter) = EnvFilter::try_new(value)
    {
        return filter;
    }

    EnvFilter::new(DEFAULT_FILTER)
}
