//! HTTP dispatch layer for translation endpoints.
//! Template endpoints get the text substituted into the URL (GET) or the
//! body (POST). The auto-detect endpoint queries a primary host with a
//! short timeout and falls back to a mirror once; there is no backoff.

use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::{debug, warn};

use super::TranslateError;
use crate::endpoints::{Endpoint, EndpointKind, HttpMethod, TEXT_PLACEHOLDER};

/// Per-request timeout for the auto-detect hosts. The timeout is the
/// only retry trigger; the fallback host is the single retry.
const AUTO_DETECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Overall client timeout for template endpoints.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// `encodeURI` equivalent: keeps URL structure characters intact.
const ENCODE_URI: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b';')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b',')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'#');

/// `encodeURIComponent` equivalent, for text embedded as a path segment.
const ENCODE_URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Fallible transport layer. Errors here never escape the public
/// translation API; they are visible to the availability probe only.
pub struct TranslateClient {
    http: reqwest::Client,
}

impl TranslateClient {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(CLIENT_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "http client builder failed, using defaults");
                reqwest::Client::new()
            });
        Self { http }
    }

    /// Dispatch `text` to `endpoint` and return the raw translation.
    pub async fn request(&self, endpoint: &Endpoint, text: &str) -> Result<String, TranslateError> {
        match &endpoint.kind {
            EndpointKind::Template {
                method,
                url_pattern,
                body,
            } => {
                self.request_template(text, *method, url_pattern, body.as_deref())
                    .await
            }
            EndpointKind::AutoDetect {
                primary_host,
                fallback_host,
            } => self.request_auto_detect(text, primary_host, fallback_host).await,
        }
    }

    async fn request_template(
        &self,
        text: &str,
        method: HttpMethod,
        url_pattern: &str,
        body: Option<&str>,
    ) -> Result<String, TranslateError> {
        let encoded = utf8_percent_encode(text, ENCODE_URI).to_string();
        let url = url_pattern.replace(TEXT_PLACEHOLDER, &encoded);
        debug!(%url, method = ?method, "template request");

        let response = match method {
            HttpMethod::Get => self.http.get(&url).send().await,
            HttpMethod::Post => {
                let body = body.unwrap_or("").replace(TEXT_PLACEHOLDER, text);
                self.http.post(&url).body(body).send().await
            }
        }
        .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranslateError::Status(status.as_u16()));
        }

        let raw = response.text().await.map_err(map_reqwest_error)?;
        if raw.is_empty() {
            return Ok(text.to_string());
        }
        // Services commonly return a JSON-encoded string; unwrap it.
        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(serde_json::Value::String(s)) => Ok(s),
            _ => Ok(raw),
        }
    }

    async fn request_auto_detect(
        &self,
        text: &str,
        primary_host: &str,
        fallback_host: &str,
    ) -> Result<String, TranslateError> {
        let primary = self.fetch_auto_detect(primary_host, text).await;
        let primary_reachable = match primary {
            Ok(Some(translation)) => return Ok(translation),
            Ok(None) => true,
            Err(ref e) => {
                warn!(host = primary_host, error = %e, "primary host failed, trying fallback");
                false
            }
        };

        match self.fetch_auto_detect(fallback_host, text).await {
            Ok(Some(translation)) => Ok(translation),
            // Reachable but unhelpful on both hosts: hand back the input.
            Ok(None) => Ok(text.to_string()),
            Err(e) if primary_reachable => {
                warn!(host = fallback_host, error = %e, "fallback host failed");
                Ok(text.to_string())
            }
            Err(e) => {
                warn!(host = fallback_host, error = %e, "both hosts unreachable");
                Err(e)
            }
        }
    }

    /// Query one auto-detect host. `Ok(Some)` is a usable translation,
    /// `Ok(None)` a reachable host with nothing useful (empty body,
    /// missing field, or translation equal to the input).
    async fn fetch_auto_detect(
        &self,
        host: &str,
        text: &str,
    ) -> Result<Option<String>, TranslateError> {
        let encoded = utf8_percent_encode(text, ENCODE_URI_COMPONENT).to_string();
        let url = format!("{host}/api/v1/auto/en/{encoded}");

        let response = self
            .http
            .get(&url)
            .timeout(AUTO_DETECT_TIMEOUT)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranslateError::Status(status.as_u16()));
        }

        let value: serde_json::Value = match response.json().await {
            Ok(value) => value,
            Err(e) => {
                debug!(host, error = %e, "auto-detect response not JSON");
                return Ok(None);
            }
        };

        match value.get("translation").and_then(|t| t.as_str()) {
            Some(translation) if !translation.is_empty() && translation != text => {
                Ok(Some(translation.to_string()))
            }
            _ => Ok(None),
        }
    }
}

impl Default for TranslateClient {
    fn default() -> Self {
        Self::new()
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TranslateError {
    if e.is_timeout() {
        TranslateError::Timeout
    } else {
        TranslateError::Transport(e.to_string())
    }
}
