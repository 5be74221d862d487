//! Run configuration read from the process environment.
//!
//! Everything here is resolved once at startup. Business logic receives an
//! [`ExportConfig`] value and never looks at the environment itself.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::AppError;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

pub const DEFAULT_LOGIN_URL: &str = "https://login.salesforce.com";
pub const DEFAULT_EXPORT_PATH: &str = "./cases.csv";
pub const DEFAULT_BUCKET: &str = "hfb-etl-data";
pub const DEFAULT_OBJECT_KEY: &str = "cax_test.csv";
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

// ─────────────────────────────────────────────────────────────────────────────
// Credentials
// ─────────────────────────────────────────────────────────────────────────────

/// Salesforce login credentials.
///
/// The password and security token are wrapped in `SecretString` so they never
/// show up through `Debug` or logging.
#[derive(Clone)]
pub struct Credentials {
    /// Salesforce username (e.g., "user@example.com")
    pub username: String,
    pub password: SecretString,
    /// Appended to the password at login. Empty for trusted IP ranges.
    pub security_token: SecretString,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("security_token", &"[REDACTED]")
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Destination
// ─────────────────────────────────────────────────────────────────────────────

/// Where the CSV payload goes. Exactly one per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    LocalFile { path: PathBuf },
    ObjectStorage { bucket: String, key: String },
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Destination::LocalFile { path } => write!(f, "{}", path.display()),
            Destination::ObjectStorage { bucket, key } => write!(f, "s3://{}/{}", bucket, key),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ExportConfig
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub credentials: Credentials,
    /// Base URL for the SOAP login call (production or sandbox host).
    pub login_url: String,
    pub destination: Destination,
    pub aws_region: String,
}

impl ExportConfig {
    /// Loads `.env` if present, then reads the configuration from the process
    /// environment.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Configuration` naming the first variable that is
    /// missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let username = required_non_blank(&lookup, "USERNAME")?;
        let password = required_non_blank(&lookup, "PASSWORD")?;
        let security_token = lookup("SECURITY_TOKEN").ok_or_else(|| {
            AppError::Configuration("SECURITY_TOKEN environment variable required".into())
        })?;

        let login_url = optional(&lookup, "SF_LOGIN_URL")
            .unwrap_or_else(|| DEFAULT_LOGIN_URL.to_string());
        if !login_url.starts_with("http://") && !login_url.starts_with("https://") {
            return Err(AppError::Configuration(
                "SF_LOGIN_URL must start with http:// or https://".into(),
            ));
        }
        let login_url = login_url.trim_end_matches('/').to_string();

        let destination = match optional(&lookup, "CASE_EXPORT_DESTINATION")
            .unwrap_or_else(|| "local".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "local" => Destination::LocalFile {
                path: optional(&lookup, "CASE_EXPORT_PATH")
                    .unwrap_or_else(|| DEFAULT_EXPORT_PATH.to_string())
                    .into(),
            },
            "s3" => Destination::ObjectStorage {
                bucket: optional(&lookup, "CASE_EXPORT_BUCKET")
                    .unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
                key: optional(&lookup, "CASE_EXPORT_KEY")
                    .unwrap_or_else(|| DEFAULT_OBJECT_KEY.to_string()),
            },
            other => {
                return Err(AppError::Configuration(format!(
                    "CASE_EXPORT_DESTINATION must be 'local' or 's3', got '{}'",
                    other
                )))
            }
        };

        let aws_region =
            optional(&lookup, "AWS_REGION").unwrap_or_else(|| DEFAULT_AWS_REGION.to_string());

        Ok(Self {
            credentials: Credentials {
                username,
                password: SecretString::from(password),
                security_token: SecretString::from(security_token),
            },
            login_url,
            destination,
            aws_region,
        })
    }
}

fn required_non_blank<F>(lookup: &F, name: &str) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(name)
        .ok_or_else(|| AppError::Configuration(format!("{} environment variable required", name)))?;
    if value.trim().is_empty() {
        return Err(AppError::Configuration(format!("{} cannot be empty", name)));
    }
    Ok(value)
}

/// Unset and blank values both count as absent.
fn optional<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).filter(|v| !v.trim().is_empty())
}
