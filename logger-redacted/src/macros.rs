// Logging macros

/// `tracing::debug!` with a redacted JSON payload attached as the `payload` field
#[macro_export]
macro_rules! payload_debug {
    ($payload:expr, $($arg:tt)+) => {
        $crate::tracing::debug!(payload = %$crate::redact_json($payload), $($arg)+)
    };
}

/// `tracing::info!` with a redacted JSON payload attached as the `payload` field
#[macro_export]
macro_rules! payload_info {
    ($payload:expr, $($arg:tt)+) => {
        $crate::tracing::info!(payload = %$crate::redact_json($payload), $($arg)+)
    };
}
