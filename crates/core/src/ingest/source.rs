use crate::config::Settings;
use crate::error::ServiceError;
use anyhow::{Context, Result};
use encoding_rs::WINDOWS_1252;
use std::time::Duration;

pub const DEFAULT_SOURCE_URL: &str = "https://www.fundamentus.com.br/resultado.php";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[async_trait::async_trait]
pub trait SourceClient: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// Fetches the results page markup.
    async fn fetch_results_html(&self) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct HttpSourceClient {
    http: reqwest::Client,
    url: String,
}

impl HttpSourceClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let url = settings
            .source_url
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string());

        let timeout_secs = settings.source_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        let user_agent = settings
            .source_user_agent
            .as_deref()
            .unwrap_or(DEFAULT_USER_AGENT);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()
            .context("failed to build source http client")?;

        Ok(Self { http, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl SourceClient for HttpSourceClient {
    fn source_name(&self) -> &'static str {
        "fundamentus"
    }

    async fn fetch_results_html(&self) -> Result<String> {
        let res = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ServiceError::Fetch(format!("request to {} failed: {e}", self.url)))?;

        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .map_err(|e| ServiceError::Fetch(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(ServiceError::Fetch(format!("source HTTP {status} from {}", self.url)).into());
        }

        tracing::debug!(url = %self.url, bytes = bytes.len(), "fetched source page");
        Ok(decode_body(&bytes))
    }
}

/// Decodes the body as UTF-8, falling back to Windows-1252 (the source serves Latin-1).
pub fn decode_body(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (cow, _, _) = WINDOWS_1252.decode(bytes);
            cow.into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_latin1_bodies() {
        // "Mrg. Líq." in ISO-8859-1.
        let bytes = b"Mrg. L\xedq.";
        assert_eq!(decode_body(bytes), "Mrg. Líq.");
        assert_eq!(decode_body("Cotação".as_bytes()), "Cotação");
    }

    #[test]
    fn default_url_when_unset() {
        let settings = Settings::default();
        let client = HttpSourceClient::from_settings(&settings).unwrap();
        assert_eq!(client.url(), DEFAULT_SOURCE_URL);
    }
}
