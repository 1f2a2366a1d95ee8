//! Remote up-to-date check.
//!
//! The backend answers a GET with `appid` and `version` query parameters:
//!
//! ```json
//! { "response": { "success": true, "up_to_date": false, "version_is_listable": false,
//!                 "required_version": 9001, "message": "Your server is out of date" } }
//! ```

use crate::config::UpdaterConfig;
use crate::error::UpdateCheckError;
use crate::version::LocalVersion;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Envelope of the up-to-date check response.
#[derive(Debug, Clone, Deserialize)]
pub struct UpToDateCheckResponse {
    pub response: Option<UpToDateCheck>,
}

/// Body of the up-to-date check response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpToDateCheck {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub up_to_date: bool,
    #[serde(default)]
    pub version_is_listable: bool,
    #[serde(default)]
    pub required_version: u32,
    #[serde(default)]
    pub message: Option<String>,
}

/// Anything that can tell whether a local build is still current.
#[async_trait]
pub trait VersionSource: Send + Sync {
    /// Asks the backend about `local`. Returns the raw answer, `success`
    /// included; interpreting it is the poller's job.
    async fn check(&self, local: &LocalVersion) -> Result<UpToDateCheck, UpdateCheckError>;
}

/// HTTP client for the vendor's up-to-date check endpoint.
#[derive(Debug, Clone)]
pub struct SteamVersionClient {
    client: reqwest::Client,
    endpoint: String,
    app_id: u32,
}

impl SteamVersionClient {
    /// Creates a client for `endpoint` asking about `app_id`.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Up-to-date check URL, without query
    /// * `app_id` - Application id sent as `appid`
    /// * `timeout` - Per-request timeout; `None` keeps the transport default
    pub fn new(
        endpoint: &str,
        app_id: u32,
        timeout: Option<Duration>,
    ) -> Result<Self, UpdateCheckError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| UpdateCheckError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            app_id,
        })
    }

    pub fn from_config(config: &UpdaterConfig) -> Result<Self, UpdateCheckError> {
        Self::new(&config.api_endpoint, config.app_id, config.request_timeout())
    }
}

#[async_trait]
impl VersionSource for SteamVersionClient {
    async fn check(&self, local: &LocalVersion) -> Result<UpToDateCheck, UpdateCheckError> {
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("appid", self.app_id.to_string()),
                ("version", local.to_string()),
            ])
            .send()
            .await
            .map_err(|e| UpdateCheckError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(UpdateCheckError::Network(format!(
                "HTTP request failed with status code: {status}"
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| UpdateCheckError::Network(e.to_string()))?;
        debug!("Up-to-date check answered: {}", body);

        parse_response(&body)
    }
}

/// Parses an up-to-date check body.
pub fn parse_response(body: &str) -> Result<UpToDateCheck, UpdateCheckError> {
    let envelope: UpToDateCheckResponse = serde_json::from_str(body)
        .map_err(|e| UpdateCheckError::MalformedResponse(e.to_string()))?;

    envelope
        .response
        .ok_or_else(|| UpdateCheckError::MalformedResponse("missing response object".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_outdated_response() {
        let check = parse_response(
            r#"{"response":{"success":true,"up_to_date":false,"version_is_listable":false,
               "required_version":9001,"message":"Your server is out of date, please upgrade"}}"#,
        )
        .unwrap();

        assert!(check.success);
        assert!(!check.up_to_date);
        assert_eq!(check.required_version, 9001);
        assert_eq!(
            check.message.as_deref(),
            Some("Your server is out of date, please upgrade")
        );
    }

    #[test]
    fn test_parse_current_response_without_optional_fields() {
        let check =
            parse_response(r#"{"response":{"success":true,"up_to_date":true}}"#).unwrap();
        assert!(check.up_to_date);
        assert_eq!(check.required_version, 0);
        assert!(check.message.is_none());
    }

    #[test]
    fn test_parse_rejects_missing_envelope() {
        assert!(matches!(
            parse_response("{}"),
            Err(UpdateCheckError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_response("<html>bad gateway</html>"),
            Err(UpdateCheckError::MalformedResponse(_))
        ));
    }
}
