pub mod config;
pub mod error;
pub mod records;
pub mod salesforce;
pub mod sink;

use tracing::info;

use crate::config::{Destination, ExportConfig};
use crate::error::AppError;
use crate::salesforce::{
    build_http_client, login, RestQueryClient, SalesforceClient, CASES_QUERY, CASE_COLUMNS,
};
use crate::sink::{upload_csv, write_local_csv, ObjectStorage};

/// Outcome of one successful export run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub record_count: usize,
    pub destination: Destination,
}

/// Runs one export: login, query, flatten, write.
///
/// Each stage consumes the previous stage's full output. `storage` is only
/// used when the destination is object storage.
///
/// # Errors
///
/// The first failing stage's error, unchanged. A failure in the write stage
/// never leaves a partial local file.
pub async fn run(
    config: ExportConfig,
    storage: &dyn ObjectStorage,
) -> Result<ExportSummary, AppError> {
    let ExportConfig {
        credentials,
        login_url,
        destination,
        ..
    } = config;

    let http = build_http_client()?;
    let session = login(&http, &login_url, credentials).await?;
    info!("connected to Salesforce");

    let query_client = RestQueryClient::new(SalesforceClient::new(http, session));
    let raw_records = query_client.query_all(CASES_QUERY).await?;

    let result_set = records::flatten(raw_records)?;
    result_set.ensure_columns(CASE_COLUMNS)?;
    info!("len of results: {}", result_set.len());

    let record_count = match &destination {
        Destination::LocalFile { path } => {
            write_local_csv(&result_set, path)?;
            result_set.len()
        }
        Destination::ObjectStorage { bucket, key } => {
            upload_csv(&result_set, storage, bucket, key).await?
        }
    };

    Ok(ExportSummary {
        record_count,
        destination,
    })
}
