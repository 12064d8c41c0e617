//! # Structured Logging Module
//!
//! Environment-aware `tracing` setup for applications embedding the bus, plus
//! the structured log helpers the bus itself uses for lifecycle and failure
//! events.

use std::sync::OnceLock;

use chrono::Utc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured console logging with environment-specific defaults.
///
/// `RUST_LOG` takes precedence over the environment-derived level. Set
/// `MESSAGE_BUS_LOG_FORMAT=json` for JSON lines. Safe to call repeatedly and
/// when another global subscriber is already installed.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));

        let layer = if json_output_requested() {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_filter(filter)
                .boxed()
        };

        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(environment = %environment, "Structured logging initialized");
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("MESSAGE_BUS_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
        .to_lowercase()
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "test" => "debug".to_string(),
        "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

fn json_output_requested() -> bool {
    std::env::var("MESSAGE_BUS_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Log a bus lifecycle transition (activate, deactivate, dispose)
pub fn log_lifecycle_operation(
    bus_id: Uuid,
    operation: &str,
    activation_id: Option<Uuid>,
    details: Option<&str>,
) {
    tracing::info!(
        bus_id = %bus_id,
        operation = %operation,
        activation_id = activation_id.map(|id| id.to_string()).as_deref(),
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "BUS_LIFECYCLE"
    );
}

/// Log a failed handler invocation with full context
pub fn log_callback_failure(
    bus_id: Uuid,
    message_type: &str,
    error: &str,
    activation_id: Option<Uuid>,
) {
    tracing::error!(
        bus_id = %bus_id,
        message_type = %message_type,
        error = %error,
        activation_id = activation_id.map(|id| id.to_string()).as_deref(),
        timestamp = %Utc::now().to_rfc3339(),
        "CALLBACK_FAILURE"
    );
}
