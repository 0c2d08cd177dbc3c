//! Structured logging setup
//!
//! Initializes the tracing subscriber once at startup. Output format and
//! verbosity are controlled by `LOG_FORMAT` ("json" or "plain") and the
//! standard `RUST_LOG` filter, defaulting to INFO for this crate.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// Safe to call exactly once; subsequent calls are ignored so tests that
/// share a process do not panic.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,givehaven_backend=info"));

    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "plain".to_string());

    let result = if format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(true)
            .with_target(true)
            .try_init()
    } else {
        fmt().with_env_filter(filter).with_target(true).try_init()
    };

    if result.is_err() {
        // Subscriber already set (e.g. by a test harness); keep the existing one.
        tracing::debug!("tracing subscriber already initialized");
    }
}

/// Mask a donor email for logging: keeps the first character of the local
/// part and the full domain, e.g. `jane.doe@example.org` -> `j***@example.org`.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() => {
            let first = local.chars().next().unwrap();
            format!("{}***@{}", first, domain)
        }
        _ => "***".to_string(),
    }
}
