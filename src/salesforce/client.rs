//! Salesforce HTTP client with session handling and safe logging.

use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Method;
use secrecy::ExposeSecret;
use tracing::info;
use url::Url;

use crate::error::AppError;
use crate::salesforce::auth::Session;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// User agent string for all Salesforce API requests.
const CLIENT_USER_AGENT: &str = concat!("case-export/", env!("CARGO_PKG_VERSION"));

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

// ─────────────────────────────────────────────────────────────────────────────
// URL Sanitization
// ─────────────────────────────────────────────────────────────────────────────

/// Reduces a URL to its path for logging.
///
/// Scheme, host, query and fragment are all dropped, so neither the instance
/// host nor the SOQL text ever reaches the logs.
pub fn sanitize_url_for_logs(url: &Url) -> String {
    url.path().to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// SalesforceClient
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP client bound to one authenticated Salesforce session.
pub struct SalesforceClient {
    http: reqwest::Client,
    session: Session,
}

impl SalesforceClient {
    pub fn new(http: reqwest::Client, session: Session) -> Self {
        Self { http, session }
    }

    /// Builds a full URL by joining the path with the instance URL.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Transport` if the instance URL or path cannot be parsed.
    pub fn build_url(&self, path: &str) -> Result<Url, AppError> {
        let base = Url::parse(&self.session.instance_url)
            .map_err(|_| AppError::Transport("Invalid instance URL".to_string()))?;

        base.join(path)
            .map_err(|_| AppError::Transport(format!("Invalid path: {}", path)))
    }

    /// Executes a request with the session id as bearer token.
    ///
    /// The response is returned whatever its status; callers map error bodies.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Transport` if the request never got a response.
    pub async fn request_authed(
        &self,
        method: Method,
        url: Url,
    ) -> Result<reqwest::Response, AppError> {
        let start = Instant::now();
        let sanitized_url = sanitize_url_for_logs(&url);

        let result = self
            .http
            .request(method.clone(), url.as_str())
            .bearer_auth(self.session.session_id.expose_secret())
            .send()
            .await;
        let duration_ms = start.elapsed().as_millis();

        match result {
            Ok(response) => {
                let x_request_id = response
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");

                info!(
                    "[SFDC] {} {} {} {}ms {}",
                    method,
                    sanitized_url,
                    response.status().as_u16(),
                    duration_ms,
                    x_request_id
                );

                Ok(response)
            }
            Err(e) => {
                info!("[SFDC] {} {} FAILED {}ms", method, sanitized_url, duration_ms);

                // The raw reqwest error may embed the full URL; keep only its kind.
                let kind = if e.is_timeout() { "timed out" } else { "failed" };
                Err(AppError::Transport(format!(
                    "Connection to Salesforce {}",
                    kind
                )))
            }
        }
    }
}

/// Builds the configured HTTP client.
pub fn build_http_client() -> Result<reqwest::Client, AppError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .build()
        .map_err(|e| AppError::Transport(format!("Failed to build HTTP client: {}", e)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
