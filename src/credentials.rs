use crate::Endpoints;
use crate::Error;
use crate::Transport;
use async_trait::async_trait;
use futures::future::join_all;
use regex::Regex;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

static SCRIPT_ASSET_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<script crossorigin src="(https://a-v2\.sndcdn\.com/assets/[^"]+\.js)"></script>"#)
        .expect("script asset pattern is valid")
});

static CLIENT_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"client_id\s*:\s*"([a-zA-Z0-9]+)""#).expect("client id pattern is valid")
});

/// A public client id together with the moment it stops being trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// The `client_id` query value sent with every API request
    pub client_id: String,
    /// `None` for ids supplied by the user, which never expire
    pub expires_at: Option<Instant>,
}

impl Credentials {
    pub fn new(client_id: String, ttl: Option<Duration>) -> Self {
        Self {
            client_id,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Instant::now() >= expires_at,
            None => false,
        }
    }
}

/// Strategy for discovering a public client id.
///
/// Scraping the web player breaks whenever SoundCloud reshuffles its assets,
/// so the strategy is kept behind this trait and can be replaced without
/// touching the client.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn discover(&self, transport: &dyn Transport, endpoints: &Endpoints)
    -> Result<String, Error>;
}

/// Finds the client id embedded in the web player's script assets.
///
/// The discovery page is fetched, every matching `<script>` asset is
/// downloaded, and the client id pattern is searched in their concatenation.
#[derive(Debug, Clone)]
pub struct ClientIdScraper {
    script_pattern: Regex,
    client_id_pattern: Regex,
}

impl Default for ClientIdScraper {
    fn default() -> Self {
        Self {
            script_pattern: SCRIPT_ASSET_PATTERN.clone(),
            client_id_pattern: CLIENT_ID_PATTERN.clone(),
        }
    }
}

impl ClientIdScraper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace both patterns. Each must have one capture group: the asset
    /// URL and the client id respectively.
    pub fn with_patterns(script_pattern: &str, client_id_pattern: &str) -> Result<Self, Error> {
        Ok(Self {
            script_pattern: Regex::new(script_pattern)?,
            client_id_pattern: Regex::new(client_id_pattern)?,
        })
    }

    /// Script asset URLs referenced by `html`, in page order.
    pub fn script_urls(&self, html: &str) -> Vec<String> {
        self.script_pattern
            .captures_iter(html)
            .filter_map(|captures| captures.get(1))
            .map(|url| url.as_str().to_string())
            .collect()
    }

    /// The first client id found in `script_text`.
    pub fn find_client_id(&self, script_text: &str) -> Option<String> {
        self.client_id_pattern
            .captures(script_text)
            .and_then(|captures| captures.get(1))
            .map(|client_id| client_id.as_str().to_string())
    }
}

#[async_trait]
impl CredentialProvider for ClientIdScraper {
    async fn discover(
        &self,
        transport: &dyn Transport,
        endpoints: &Endpoints,
    ) -> Result<String, Error> {
        let page = transport.fetch(&endpoints.discovery_page).await?;
        let script_urls = self.script_urls(&String::from_utf8_lossy(&page));

        if script_urls.is_empty() {
            return Err(Error::CredentialDiscovery(format!(
                "no script assets referenced by {}",
                endpoints.discovery_page
            )));
        }

        log::debug!("Searching {} script assets for a client id", script_urls.len());

        let scripts = join_all(script_urls.iter().map(|url| transport.fetch(url))).await;

        let mut script_text = String::new();
        for (url, script) in script_urls.iter().zip(scripts) {
            match script {
                Ok(script) => script_text.push_str(&String::from_utf8_lossy(&script)),
                Err(e) => log::warn!("Failed to fetch script {}: {}", url, e),
            }
        }

        self.find_client_id(&script_text).ok_or_else(|| {
            Error::CredentialDiscovery(format!(
                "no client id in {} script assets",
                script_urls.len()
            ))
        })
    }
}
