use super::transport::Transport;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Response, Url};
use serde_json::Value;
use tokio::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:54321/3/{endpoint}";
const ENDPOINT_PLACEHOLDER: &str = "{endpoint}";

/// Rewrites the port of a base URL template, keeping the `{endpoint}` placeholder.
pub fn base_url_with_port(base_url: &str, port: u16) -> Result<String> {
    // Url would percent-encode the braces, so swap the placeholder out first.
    const MARKER: &str = "h2o-runner-endpoint";
    let mut url = Url::parse(&base_url.replace(ENDPOINT_PLACEHOLDER, MARKER))
        .with_context(|| format!("Invalid base URL: {}", base_url))?;
    url.set_port(Some(port))
        .map_err(|_| anyhow::anyhow!("Base URL '{}' cannot carry a port", base_url))?;
    Ok(url.to_string().replace(MARKER, ENDPOINT_PLACEHOLDER))
}

pub struct H2OServer {
    base_url: String,
    client: Client,
}

impl H2OServer {
    /// `base_url` must contain an `{endpoint}` placeholder.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        if !base_url.contains(ENDPOINT_PLACEHOLDER) {
            anyhow::bail!("Base URL '{}' has no {} placeholder", base_url, ENDPOINT_PLACEHOLDER);
        }
        Url::parse(&base_url.replace(ENDPOINT_PLACEHOLDER, ""))
            .with_context(|| format!("Invalid base URL: {}", base_url))?;
        Ok(Self { base_url, client: Client::new() })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(self)
    }

    pub fn endpoint_url(&self, endpoint: &str) -> String {
        self.base_url.replace(ENDPOINT_PLACEHOLDER, endpoint)
    }

    /// Resolves `path` against the server origin when it is server-relative,
    /// otherwise treats it as a logical endpoint name.
    pub fn resolve(&self, path: &str) -> Result<String> {
        if !path.starts_with('/') {
            return Ok(self.endpoint_url(path));
        }
        let base = Url::parse(&self.endpoint_url(""))
            .with_context(|| format!("Invalid base URL: {}", self.base_url))?;
        let url = base
            .join(path)
            .with_context(|| format!("Failed to resolve path: {}", path))?;
        Ok(url.to_string())
    }

    fn generate_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        headers
    }

    async fn read_json(url: &str, response: Response) -> Result<Value> {
        let status = response.status();
        if status.is_success() {
            let response_value = response
                .json::<Value>()
                .await
                .with_context(|| format!("Failed to parse response from {} as JSON", url))?;
            debug!("Response from {}: {:?}", url, response_value);
            Ok(response_value)
        } else {
            let error_text = response
                .text()
                .await
                .with_context(|| format!("Failed to get error text from {}", url))?;
            error!("Request to {} failed with {}: {}", url, status, error_text);
            anyhow::bail!("Request to {} failed with {}: {}", url, status, error_text)
        }
    }
}

#[async_trait]
impl Transport for H2OServer {
    async fn post_form(&self, endpoint: &str, body: &str) -> Result<Value> {
        let url = self.endpoint_url(endpoint);
        info!("POST {}", url);
        debug!("Body: {}", body);
        let response = self
            .client
            .post(&url)
            .headers(self.generate_headers())
            .body(body.to_string())
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;
        Self::read_json(&url, response).await
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let url = self.resolve(path)?;
        debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;
        Self::read_json(&url, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_endpoint_urls() {
        let server = H2OServer::new(DEFAULT_BASE_URL).unwrap();
        assert_eq!(server.endpoint_url("ImportFiles"), "http://localhost:54321/3/ImportFiles");
        assert_eq!(
            server.resolve("Predictions/models/gbm/frames/validate").unwrap(),
            "http://localhost:54321/3/Predictions/models/gbm/frames/validate"
        );
    }

    #[test]
    fn resolves_job_paths_against_origin() {
        let server = H2OServer::new("http://10.0.0.5:54321/3/{endpoint}").unwrap();
        assert_eq!(
            server.resolve("/3/Jobs/$03017f00000132d4ffffffff$_a1").unwrap(),
            "http://10.0.0.5:54321/3/Jobs/$03017f00000132d4ffffffff$_a1"
        );
    }

    #[test]
    fn rejects_base_url_without_placeholder() {
        assert!(H2OServer::new("http://localhost:54321/3/").is_err());
        assert!(H2OServer::new("not a url {endpoint}").is_err());
    }

    #[test]
    fn port_rewrite_keeps_the_placeholder() {
        assert_eq!(
            base_url_with_port(DEFAULT_BASE_URL, 54322).unwrap(),
            "http://localhost:54322/3/{endpoint}"
        );
        assert_eq!(
            base_url_with_port("http://10.0.0.5/3/{endpoint}", 8080).unwrap(),
            "http://10.0.0.5:8080/3/{endpoint}"
        );
    }

    #[tokio::test]
    async fn unreachable_server_is_an_error() {
        let server = H2OServer::new("http://127.0.0.1:1/3/{endpoint}").unwrap();
        let err = server.post_form("ImportFiles", "path=/tmp/x.csv").await.unwrap_err();
        assert!(err.to_string().contains("Failed to send request"));
    }
}
