//! Username/password login against the Salesforce partner SOAP endpoint.
//!
//! The password sent is the account password with the security token appended.
//! Both are XML-escaped before they go into the envelope and are never logged.

use std::time::Instant;

use secrecy::{ExposeSecret, SecretString};
use tracing::{error, info};
use url::Url;

use crate::config::Credentials;
use crate::error::AppError;
use crate::salesforce::API_VERSION;

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Authenticated Salesforce session.
///
/// The session id works as a bearer token for the REST API.
#[derive(Clone)]
pub struct Session {
    /// Instance URL (e.g., "https://na1.salesforce.com")
    pub instance_url: String,
    pub session_id: SecretString,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("instance_url", &self.instance_url)
            .field("session_id", &"[REDACTED]")
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Login
// ─────────────────────────────────────────────────────────────────────────────

/// Logs in with username, password and security token.
///
/// Consumes the credentials; nothing keeps them after the call returns.
///
/// # Errors
///
/// - `AppError::Authentication` - Salesforce rejected the login, or the
///   response did not carry a session
/// - `AppError::Transport` - Network error
pub async fn login(
    http: &reqwest::Client,
    login_url: &str,
    credentials: Credentials,
) -> Result<Session, AppError> {
    let soap_url = format!("{}/services/Soap/u/{}", login_url, soap_version());
    let envelope = login_envelope(&credentials);
    drop(credentials);

    let start = Instant::now();
    let response = http
        .post(&soap_url)
        .header("Content-Type", "text/xml; charset=UTF-8")
        .header("SOAPAction", "login")
        .body(envelope)
        .send()
        .await
        .map_err(|_| {
            error!("[SFDC] Login request failed");
            AppError::Transport("Failed to connect for login".to_string())
        })?;

    let status = response.status();
    let body = response.text().await.map_err(|_| {
        AppError::Transport("Failed to read login response".to_string())
    })?;

    info!(
        "[SFDC] POST /services/Soap/u/{} {} {}ms",
        soap_version(),
        status.as_u16(),
        start.elapsed().as_millis()
    );

    if !status.is_success() {
        let reason = extract_element(&body, "faultstring")
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
        error!("[SFDC] Login rejected: {}", reason);
        return Err(AppError::Authentication(reason));
    }

    let session_id = extract_element(&body, "sessionId").ok_or_else(|| {
        AppError::Authentication("Login response did not contain a session".to_string())
    })?;
    let server_url = extract_element(&body, "serverUrl").ok_or_else(|| {
        AppError::Authentication("Login response did not contain a server URL".to_string())
    })?;

    let instance_url = instance_url_from_server_url(&server_url)?;

    Ok(Session {
        instance_url,
        session_id: SecretString::from(session_id),
    })
}

/// `v60.0` -> `60.0`
fn soap_version() -> &'static str {
    API_VERSION.trim_start_matches('v')
}

fn login_envelope(credentials: &Credentials) -> String {
    let password = format!(
        "{}{}",
        credentials.password.expose_secret(),
        credentials.security_token.expose_secret()
    );

    format!(
        r#"<?xml version="1.0" encoding="utf-8" ?>
<env:Envelope xmlns:xsd="http://www.w3.org/2001/XMLSchema"
    xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
    xmlns:env="http://schemas.xmlsoap.org/soap/envelope/">
  <env:Body>
    <n1:login xmlns:n1="urn:partner.soap.sforce.com">
      <n1:username>{}</n1:username>
      <n1:password>{}</n1:password>
    </n1:login>
  </env:Body>
</env:Envelope>"#,
        xml_escape(&credentials.username),
        xml_escape(&password)
    )
}

/// Reduces a SOAP `serverUrl` to scheme, host and port.
fn instance_url_from_server_url(server_url: &str) -> Result<String, AppError> {
    let url = Url::parse(server_url).map_err(|_| {
        AppError::Authentication("Login response contained an invalid server URL".to_string())
    })?;
    let host = url.host_str().ok_or_else(|| {
        AppError::Authentication("Login response contained an invalid server URL".to_string())
    })?;

    Ok(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// XML helpers
// ─────────────────────────────────────────────────────────────────────────────

fn xml_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn xml_unescape(escaped: &str) -> String {
    escaped
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Returns the text of the first `<tag>` element, with or without a namespace
/// prefix. Attributes on the opening tag are not supported.
fn extract_element(xml: &str, tag: &str) -> Option<String> {
    let suffix = format!("{}>", tag);
    let mut search_from = 0;

    while let Some(found) = xml[search_from..].find(&suffix) {
        let name_start = search_from + found;
        let content_start = name_start + suffix.len();
        search_from = content_start;

        // Walk back to the '<' that opens this tag.
        let open = match xml[..name_start].rfind('<') {
            Some(open) => open,
            None => continue,
        };
        let prefix = &xml[open + 1..name_start];
        let is_opening = prefix.is_empty()
            || (prefix.ends_with(':') && !prefix.starts_with('/') && !prefix.contains(' '));
        if !is_opening {
            continue;
        }

        let content_end = xml[content_start..].find("</")?;
        return Some(xml_unescape(&xml[content_start..content_start + content_end]));
    }

    None
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN_RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns="urn:partner.soap.sforce.com">
  <soapenv:Body>
    <loginResponse>
      <result>
        <metadataServerUrl>https://na1.salesforce.com/services/Soap/m/60.0/00Dxx0000001234</metadataServerUrl>
        <passwordExpired>false</passwordExpired>
        <sandbox>false</sandbox>
        <serverUrl>https://na1.salesforce.com/services/Soap/u/60.0/00Dxx0000001234</serverUrl>
        <sessionId>00Dxx0000001234!AQ4AQFakeSession</sessionId>
        <userId>005xx0000001234</userId>
      </result>
    </loginResponse>
  </soapenv:Body>
</soapenv:Envelope>"#;

    const LOGIN_FAULT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:sf="urn:fault.partner.soap.sforce.com">
  <soapenv:Body>
    <soapenv:Fault>
      <faultcode>sf:INVALID_LOGIN</faultcode>
      <faultstring>INVALID_LOGIN: Invalid username, password, security token; or user locked out.</faultstring>
    </soapenv:Fault>
  </soapenv:Body>
</soapenv:Envelope>"#;

    fn test_credentials() -> Credentials {
        Credentials {
            username: "etl@example.org".to_string(),
            password: SecretString::from("p&ss<word>".to_string()),
            security_token: SecretString::from("TOKEN123".to_string()),
        }
    }

    #[test]
    fn extract_element_reads_unprefixed_tags() {
        assert_eq!(
            extract_element(LOGIN_RESPONSE, "sessionId").as_deref(),
            Some("00Dxx0000001234!AQ4AQFakeSession")
        );
        assert_eq!(
            extract_element(LOGIN_RESPONSE, "serverUrl").as_deref(),
            Some("https://na1.salesforce.com/services/Soap/u/60.0/00Dxx0000001234")
        );
    }

    #[test]
    fn extract_element_does_not_match_longer_tag_names() {
        // "metadataServerUrl" ends in "ServerUrl" but not "serverUrl"
        let xml = "<metadataserverUrl>wrong</metadataserverUrl><serverUrl>right</serverUrl>";
        assert_eq!(extract_element(xml, "serverUrl").as_deref(), Some("right"));
    }

    #[test]
    fn extract_element_reads_prefixed_tags() {
        let xml = "<sf:faultstring>bad &amp; worse</sf:faultstring>";
        assert_eq!(
            extract_element(xml, "faultstring").as_deref(),
            Some("bad & worse")
        );
    }

    #[test]
    fn extract_element_missing_returns_none() {
        assert!(extract_element(LOGIN_FAULT, "sessionId").is_none());
    }

    #[test]
    fn envelope_escapes_credentials_and_appends_token() {
        let envelope = login_envelope(&test_credentials());

        assert!(envelope.contains("<n1:username>etl@example.org</n1:username>"));
        assert!(envelope.contains("<n1:password>p&amp;ss&lt;word&gt;TOKEN123</n1:password>"));
    }

    #[test]
    fn instance_url_drops_path() {
        assert_eq!(
            instance_url_from_server_url(
                "https://na1.salesforce.com/services/Soap/u/60.0/00Dxx0000001234"
            )
            .unwrap(),
            "https://na1.salesforce.com"
        );
        assert_eq!(
            instance_url_from_server_url("http://127.0.0.1:8080/services/Soap/u/60.0/00D").unwrap(),
            "http://127.0.0.1:8080"
        );
    }

    #[test]
    fn instance_url_rejects_garbage() {
        assert!(matches!(
            instance_url_from_server_url("not a url"),
            Err(AppError::Authentication(_))
        ));
    }

    #[test]
    fn session_debug_redacts_id() {
        let session = Session {
            instance_url: "https://na1.salesforce.com".to_string(),
            session_id: SecretString::from("00Dxx!secret".to_string()),
        };

        let debug_output = format!("{:?}", session);

        assert!(debug_output.contains("na1.salesforce.com"));
        assert!(!debug_output.contains("00Dxx!secret"));
    }

    #[test]
    fn soap_version_strips_prefix() {
        assert_eq!(soap_version(), "60.0");
    }
}
