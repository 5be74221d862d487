use thiserror::Error;

/// Patterns (lowercase) that indicate sensitive data not safe for log output.
/// Used by `contains_sensitive()` for case-insensitive matching.
pub(crate) const SENSITIVE_PATTERNS: &[&str] = &[
    "bearer ",
    "sessionid>",
    "access_token",
    "password>",
    "authorization:",
];

/// Returns true if the message contains any sensitive pattern (case-insensitive).
fn contains_sensitive(msg: &str) -> bool {
    let lower = msg.to_ascii_lowercase();
    SENSITIVE_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Application-wide error type.
///
/// Every stage of the export propagates one of these to the process boundary.
/// Nothing is retried or recovered.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Configuration ─────────────────────────────────────────────────────────
    #[error("Configuration error: {0}")]
    Configuration(String),

    // ── Salesforce ────────────────────────────────────────────────────────────
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Connection failed: {0}")]
    Transport(String),

    // ── Records ───────────────────────────────────────────────────────────────
    #[error("Unexpected record shape: {0}")]
    Schema(String),

    #[error("Query returned no records; cannot derive a CSV header")]
    EmptyResult,

    // ── Sinks ─────────────────────────────────────────────────────────────────
    #[error("File write failed: {0}")]
    Io(String),

    #[error("Object storage write failed: {0}")]
    Storage(String),
}

impl AppError {
    /// Returns the error text, or a generic fallback when the text looks like
    /// it carries a credential or session id.
    pub fn safe_message(&self) -> String {
        let msg = self.to_string();
        if contains_sensitive(&msg) {
            self.fallback_message().to_string()
        } else {
            msg
        }
    }

    fn fallback_message(&self) -> &'static str {
        match self {
            AppError::Configuration(_) => "Configuration error",
            AppError::Authentication(_) => "Authentication failed",
            AppError::Query(_) => "Query failed",
            AppError::Transport(_) => "Connection failed",
            AppError::Schema(_) => "Unexpected record shape",
            AppError::EmptyResult => "Query returned no records",
            AppError::Io(_) => "File write failed",
            AppError::Storage(_) => "Object storage write failed",
        }
    }
}
