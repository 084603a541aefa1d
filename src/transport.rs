use crate::Error;
use crate::USER_AGENT;
use async_trait::async_trait;
use serde_json::Value;

/// The HTTP collaborator used by [`SoundcloudClient`](crate::SoundcloudClient).
///
/// Every request the client makes goes through this trait, which keeps the
/// resolution logic independent of the HTTP stack. Implement it to add
/// caching, proxying or canned responses.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch the raw body of `url`. Non-success statuses are errors.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, Error>;

    /// Fetch `url` and parse the body as JSON. An empty body is `null`.
    async fn fetch_json(&self, url: &str) -> Result<Value, Error> {
        let body = self.fetch(url).await?;
        if body.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&body)?)
    }

    /// Follow redirects from `url` and return where they end. A non-success
    /// status at the end of the chain is an error.
    async fn canonical_url(&self, url: &str) -> Result<String, Error>;
}

/// [`Transport`] backed by a `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, Error> {
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            log::debug!("Requested URL: {}", url);
            log::debug!("SoundCloud returned status {}", status);
            return Err(Error::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(resp.bytes().await?.to_vec())
    }

    async fn canonical_url(&self, url: &str) -> Result<String, Error> {
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await?;

        // A dead short link redirects to an error page
        let status = resp.status();
        if !status.is_success() {
            log::debug!("Short link {} ended at {} with status {}", url, resp.url(), status);
            return Err(Error::Status {
                status: status.as_u16(),
                url: resp.url().to_string(),
            });
        }

        Ok(resp.url().to_string())
    }
}
