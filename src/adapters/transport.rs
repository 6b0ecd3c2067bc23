use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

#[cfg(test)]
use mockall::automock;

/// HTTP seam between the pipeline and the server.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST a form-encoded `body` to a logical endpoint such as `ParseSetup`.
    async fn post_form(&self, endpoint: &str, body: &str) -> Result<Value>;

    /// GET a logical endpoint (`Frames/predictions`) or a server-relative
    /// path starting with `/` (`/3/Jobs/...`).
    async fn get(&self, path: &str) -> Result<Value>;
}
