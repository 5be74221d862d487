//! SOQL execution against the Salesforce REST `query` endpoint.
//!
//! Salesforce returns large results in pages; this client follows
//! `nextRecordsUrl` until the API reports `done`, so callers always get the
//! complete result or an error. The SOQL text is never logged.

use reqwest::Method;
use serde::Deserialize;
use tracing::info;
use url::Url;

use crate::error::AppError;
use crate::records::RawRecord;
use crate::salesforce::client::SalesforceClient;
use crate::salesforce::API_VERSION;

// ─────────────────────────────────────────────────────────────────────────────
// Internal Wire Types (match Salesforce JSON exactly)
// ─────────────────────────────────────────────────────────────────────────────

/// Mirrors one page of the Salesforce query response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireQueryResponse {
    /// Total number of records that match the query (not just this page).
    total_size: u64,
    done: bool,
    /// Relative URL of the next page. Only present if `done` is false.
    next_records_url: Option<String>,
    records: Vec<RawRecord>,
}

/// Salesforce returns errors as an array of these.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSalesforceError {
    message: String,
    error_code: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// RestQueryClient
// ─────────────────────────────────────────────────────────────────────────────

/// Executes SOQL queries over a session-bound [`SalesforceClient`].
pub struct RestQueryClient {
    client: SalesforceClient,
}

impl RestQueryClient {
    pub fn new(client: SalesforceClient) -> Self {
        Self { client }
    }

    /// Executes a SOQL query and returns every matching record in API order.
    ///
    /// Uses the `query` resource, so rows in the recycle bin and archived
    /// rows are not returned.
    ///
    /// # Errors
    ///
    /// - `AppError::Query` - Malformed SOQL or any other remote rejection
    /// - `AppError::Authentication` - The session was rejected (HTTP 401)
    /// - `AppError::Transport` - Network error or unreadable response
    pub async fn query_all(&self, soql: &str) -> Result<Vec<RawRecord>, AppError> {
        let mut initial_url = self
            .client
            .build_url(&format!("/services/data/{}/query", API_VERSION))?;
        initial_url.query_pairs_mut().append_pair("q", soql);

        info!("[REST] Starting SOQL query");

        let mut all_records: Vec<RawRecord> = Vec::new();
        let mut total_size: u64 = 0;
        let mut next_url: Option<Url> = Some(initial_url);
        let mut page_count: u32 = 0;

        while let Some(url) = next_url.take() {
            page_count += 1;

            let response = self.execute_query_request(url).await?;
            let page: WireQueryResponse = response.json().await.map_err(|_| {
                AppError::Transport("Failed to parse query response".to_string())
            })?;

            if page_count == 1 {
                total_size = page.total_size;
            }
            all_records.extend(page.records);

            if page.done {
                break;
            }

            // A page that is not done must say where the next one lives.
            let next_records_url = page.next_records_url.ok_or_else(|| {
                AppError::Query("Response not done but nextRecordsUrl is missing".to_string())
            })?;
            next_url = Some(self.client.build_url(&next_records_url)?);
        }

        info!(
            "[REST] Query complete: {} of {} records fetched, {} pages",
            all_records.len(),
            total_size,
            page_count
        );

        Ok(all_records)
    }

    /// Executes one page request and maps error responses.
    async fn execute_query_request(&self, url: Url) -> Result<reqwest::Response, AppError> {
        let response = self.client.request_authed(Method::GET, url).await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("Unable to read error body"));

        let detail = match serde_json::from_str::<Vec<WireSalesforceError>>(&body) {
            Ok(errors) if !errors.is_empty() => {
                format!("[{}] {}", errors[0].error_code, errors[0].message)
            }
            _ => format!(
                "HTTP {} - {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown error")
            ),
        };

        if status == reqwest::StatusCode::UNAUTHORIZED {
            Err(AppError::Authentication(detail))
        } else {
            Err(AppError::Query(detail))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
