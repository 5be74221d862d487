//! Salesforce login and query layer.
//!
//! - **auth**: SOAP username/password login producing a [`Session`]
//! - **client**: HTTP client bound to that session, with path-only request logging
//! - **rest**: `query` execution following `nextRecordsUrl`
//! - **soql**: the fixed case query

pub mod auth;
pub mod client;
pub mod rest;
pub mod soql;

/// Salesforce API version used for both login and queries.
pub const API_VERSION: &str = "v60.0";

pub use auth::{login, Session};
pub use client::{build_http_client, SalesforceClient};
pub use rest::RestQueryClient;
pub use soql::{CASES_QUERY, CASE_COLUMNS};
