//! Upload of the CSV payload to an object-storage bucket.
//!
//! The upload goes through the [`ObjectStorage`] trait so the export can be
//! tested with a recording fake. [`S3ObjectStorage`] is the real backend. It
//! takes credentials from `AWS_*` variables, then the shared credentials file,
//! then instance metadata. Each upload is one attempt with no retries.

use std::future::Future;
use std::pin::Pin;

use aws_config::profile::ProfileFileCredentialsProvider;
use aws_credential_types::provider::error::CredentialsError;
use aws_credential_types::provider::ProvideCredentials;
use bytes::Bytes;
use object_store::aws::{AmazonS3Builder, AmazonS3ConfigKey};
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload, RetryConfig};
use tracing::info;

use crate::error::AppError;
use crate::records::ResultSet;
use crate::sink::csv_encoder::encode_to_bytes;

// ─────────────────────────────────────────────────────────────────────────────
// Storage Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Single-object writes to a named bucket.
pub trait ObjectStorage: Send + Sync {
    /// Stores `body` at `key` in `bucket`, overwriting any existing object.
    fn put_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        body: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>>;
}

// ─────────────────────────────────────────────────────────────────────────────
// S3 Backend
// ─────────────────────────────────────────────────────────────────────────────

/// Amazon S3 (or S3-compatible) storage.
///
/// Holds a builder template; the bucket is filled in per call.
#[derive(Debug, Clone)]
pub struct S3ObjectStorage {
    builder: AmazonS3Builder,
}

impl S3ObjectStorage {
    /// Reads `AWS_*` environment variables, in the given region.
    ///
    /// Keys missing from the environment are looked up in the shared
    /// credentials file at upload time.
    pub fn from_env(region: &str) -> Self {
        Self::from_builder(AmazonS3Builder::from_env().with_region(region))
    }

    /// Uses a configured builder, e.g. one pointing at a custom endpoint.
    /// Retries are switched off either way.
    pub fn from_builder(builder: AmazonS3Builder) -> Self {
        Self {
            builder: builder.with_retry(single_attempt()),
        }
    }
}

impl ObjectStorage for S3ObjectStorage {
    fn put_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        body: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>> {
        Box::pin(async move {
            let store = with_shared_credentials(self.builder.clone())
                .await?
                .with_bucket_name(bucket)
                .build()
                .map_err(|e| AppError::Storage(format!("S3 client setup failed: {}", e)))?;

            let location = ObjectPath::parse(key)
                .map_err(|e| AppError::Storage(format!("Invalid object key '{}': {}", key, e)))?;

            store
                .put(&location, PutPayload::from(body))
                .await
                .map_err(|e| AppError::Storage(format!("PUT {}/{} failed: {}", bucket, key, e)))?;

            Ok(())
        })
    }
}

fn single_attempt() -> RetryConfig {
    RetryConfig {
        max_retries: 0,
        ..Default::default()
    }
}

/// Fills in keys from `~/.aws/credentials` when the builder has none.
///
/// `AWS_PROFILE` and `AWS_SHARED_CREDENTIALS_FILE` are honoured. A missing
/// file leaves the builder as is, so instance metadata is tried next.
async fn with_shared_credentials(builder: AmazonS3Builder) -> Result<AmazonS3Builder, AppError> {
    if builder
        .get_config_value(&AmazonS3ConfigKey::AccessKeyId)
        .is_some()
    {
        return Ok(builder);
    }

    let provider = ProfileFileCredentialsProvider::builder().build();
    match provider.provide_credentials().await {
        Ok(credentials) => {
            info!("Using AWS credentials from the shared credentials file");
            let builder = builder
                .with_access_key_id(credentials.access_key_id())
                .with_secret_access_key(credentials.secret_access_key());
            Ok(match credentials.session_token() {
                Some(token) => builder.with_token(token),
                None => builder,
            })
        }
        Err(CredentialsError::CredentialsNotLoaded(_)) => Ok(builder),
        Err(e) => Err(AppError::Storage(format!(
            "Failed to load AWS shared credentials: {}",
            e
        ))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Serializes the result set to CSV in memory and uploads it as one object.
///
/// Returns the number of data rows uploaded.
///
/// # Errors
///
/// - `AppError::EmptyResult` - Checked before anything is uploaded
/// - `AppError::Storage` - Authorization or network failure
pub async fn upload_csv(
    result_set: &ResultSet,
    storage: &dyn ObjectStorage,
    bucket: &str,
    key: &str,
) -> Result<usize, AppError> {
    let body = encode_to_bytes(result_set)?;

    storage.put_object(bucket, key, Bytes::from(body)).await?;

    info!("CSV uploaded to S3: {}/{}", bucket, key);
    Ok(result_set.len())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::FlatRecord;
    use serde_json::json;
    use std::sync::Mutex;
    use wiremock::matchers::{body_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Records every put instead of talking to a store.
    #[derive(Default)]
    struct RecordingStorage {
        puts: Mutex<Vec<(String, String, Vec<u8>)>>,
    }

    impl ObjectStorage for RecordingStorage {
        fn put_object<'a>(
            &'a self,
            bucket: &'a str,
            key: &'a str,
            body: Bytes,
        ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>> {
            Box::pin(async move {
                self.puts
                    .lock()
                    .unwrap()
                    .push((bucket.to_string(), key.to_string(), body.to_vec()));
                Ok(())
            })
        }
    }

    fn sample() -> ResultSet {
        ResultSet::new(vec![FlatRecord::from_pairs([
            ("CaseNumber", json!("001")),
            ("Status", json!("Open")),
        ])])
        .unwrap()
    }

    #[tokio::test]
    async fn upload_makes_exactly_one_put() {
        let storage = RecordingStorage::default();

        let rows = upload_csv(&sample(), &storage, "hfb-etl-data", "cax_test.csv")
            .await
            .unwrap();

        assert_eq!(rows, 1);
        let puts = storage.puts.lock().unwrap();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].0, "hfb-etl-data");
        assert_eq!(puts[0].1, "cax_test.csv");
        assert_eq!(puts[0].2, b"CaseNumber,Status\r\n001,Open\r\n".to_vec());
    }

    #[tokio::test]
    async fn empty_result_set_uploads_nothing() {
        let storage = RecordingStorage::default();
        let empty = ResultSet::new(Vec::new()).unwrap();

        let result = upload_csv(&empty, &storage, "hfb-etl-data", "cax_test.csv").await;

        assert!(matches!(result, Err(AppError::EmptyResult)));
        assert!(storage.puts.lock().unwrap().is_empty());
    }

    fn s3_against(endpoint: &str) -> S3ObjectStorage {
        S3ObjectStorage::from_builder(
            AmazonS3Builder::new()
                .with_region("us-east-1")
                .with_endpoint(endpoint)
                .with_allow_http(true)
                .with_access_key_id("AKIDEXAMPLE")
                .with_secret_access_key("wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY"),
        )
    }

    #[tokio::test]
    async fn s3_backend_puts_body_at_bucket_and_key() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/hfb-etl-data/cax_test.csv"))
            .and(body_string("CaseNumber,Status\r\n001,Open\r\n"))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"0123abcd\""))
            .expect(1)
            .mount(&mock_server)
            .await;

        let storage = s3_against(&mock_server.uri());

        upload_csv(&sample(), &storage, "hfb-etl-data", "cax_test.csv")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn s3_access_denied_is_storage_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/hfb-etl-data/cax_test.csv"))
            .respond_with(ResponseTemplate::new(403).set_body_string(
                "<Error><Code>AccessDenied</Code><Message>Access Denied</Message></Error>",
            ))
            .mount(&mock_server)
            .await;

        let storage = s3_against(&mock_server.uri());

        let result = upload_csv(&sample(), &storage, "hfb-etl-data", "cax_test.csv").await;

        assert!(matches!(result, Err(AppError::Storage(_))));
    }

    #[tokio::test]
    async fn s3_server_error_is_not_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/hfb-etl-data/cax_test.csv"))
            .respond_with(ResponseTemplate::new(500).set_body_string(
                "<Error><Code>InternalError</Code><Message>We encountered an internal error.</Message></Error>",
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let storage = s3_against(&mock_server.uri());

        let result = upload_csv(&sample(), &storage, "hfb-etl-data", "cax_test.csv").await;

        assert!(matches!(result, Err(AppError::Storage(_))));
    }
}
