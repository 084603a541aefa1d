use crate::Error;
use serde::{Deserialize, Serialize};
use url::Url;

pub(crate) static SOUNDCLOUD_API_BASE_URL: &str = "https://api-v2.soundcloud.com";
pub(crate) static SOUNDCLOUD_DISCOVERY_URL: &str = "https://soundcloud.com/discover";

/// Base URLs and query values used to talk to SoundCloud.
///
/// The web API is undocumented and its query shapes change from time to
/// time, so everything that is not part of the resolution logic can be
/// overridden here. `Endpoints` deserializes with defaults for missing
/// fields, which allows loading a partial override from JSON:
///
/// ```
/// use soundcloudrs::Endpoints;
///
/// let endpoints: Endpoints = serde_json::from_str(r#"{"page_size": 50}"#).unwrap();
/// assert_eq!(endpoints.page_size, 50);
/// assert_eq!(endpoints.api_base, "https://api-v2.soundcloud.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Base of the JSON API
    pub api_base: String,
    /// Web page scraped for script assets carrying the public client id
    pub discovery_page: String,
    /// `app_version` query value sent with resolve requests, if any
    pub app_version: Option<String>,
    /// Page size requested from user track and playlist listings
    pub page_size: u32,
    /// Size token substituted for `large` in artwork URLs
    pub artwork_size: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api_base: SOUNDCLOUD_API_BASE_URL.to_string(),
            discovery_page: SOUNDCLOUD_DISCOVERY_URL.to_string(),
            app_version: Some("1499347238".to_string()),
            page_size: 200,
            artwork_size: "t500x500".to_string(),
        }
    }
}

impl Endpoints {
    fn api_url(&self, path: &str) -> Result<Url, Error> {
        Ok(Url::parse(&format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            path
        ))?)
    }

    /// URL that resolves a public SoundCloud URL to its API representation.
    pub fn resolve_url(&self, target: &str, client_id: &str) -> Result<Url, Error> {
        let mut url = self.api_url("resolve")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("url", target);
            query.append_pair("client_id", client_id);
            if let Some(app_version) = &self.app_version {
                query.append_pair("app_version", app_version);
            }
        }
        Ok(url)
    }

    /// URL that looks up several tracks at once.
    pub fn tracks_url(&self, track_ids: &[u64], client_id: &str) -> Result<Url, Error> {
        let ids = track_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let mut url = self.api_url("tracks")?;
        url.query_pairs_mut()
            .append_pair("ids", &ids)
            .append_pair("client_id", client_id);
        Ok(url)
    }

    pub fn search_url(
        &self,
        query: &str,
        limit: u32,
        offset: u32,
        client_id: &str,
    ) -> Result<Url, Error> {
        let mut url = self.api_url("search")?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("client_id", client_id)
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());
        Ok(url)
    }

    pub fn user_tracks_url(&self, user_id: u64, client_id: &str) -> Result<Url, Error> {
        self.user_listing_url(user_id, "tracks", client_id)
    }

    pub fn user_playlists_url(&self, user_id: u64, client_id: &str) -> Result<Url, Error> {
        self.user_listing_url(user_id, "playlists", client_id)
    }

    fn user_listing_url(&self, user_id: u64, listing: &str, client_id: &str) -> Result<Url, Error> {
        let mut url = self.api_url(&format!("users/{user_id}/{listing}"))?;
        url.query_pairs_mut()
            .append_pair("client_id", client_id)
            .append_pair("limit", &self.page_size.to_string())
            .append_pair("linked_partitioning", "1");
        Ok(url)
    }

    /// Attach `client_id` to a URL handed out by the API itself, such as a
    /// `next_href` or a transcoding URL. An existing `client_id` is replaced.
    pub fn authorize(&self, href: &str, client_id: &str) -> Result<Url, Error> {
        let mut url = Url::parse(href)?;
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != "client_id")
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        url.query_pairs_mut()
            .clear()
            .extend_pairs(pairs)
            .append_pair("client_id", client_id);
        Ok(url)
    }

    /// Upgrade an artwork URL to the configured size.
    pub fn large_artwork_url(&self, artwork_url: &str) -> String {
        artwork_url.replace("large", &self.artwork_size)
    }
}
