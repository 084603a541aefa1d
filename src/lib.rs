#![doc = include_str!("../README.md")]

mod batch;
pub mod blocking;
mod credentials;
mod endpoints;
mod materialize;
mod playlist;
mod reconcile;
mod resolve;
mod search;
mod track;
mod transport;
mod user;

pub use batch::TRACK_BATCH_SIZE;
pub use credentials::*;
pub use endpoints::*;
pub use materialize::*;
pub use playlist::*;
pub use reconcile::RESOLVE_THRESHOLD;
pub use search::*;
pub use track::*;
pub use transport::*;
pub use user::*;

use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use strum_macros::{AsRefStr, Display, EnumString};
use tokio::sync::{Semaphore, SemaphorePermit};
use url::Url;

pub(crate) static USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// How long a scraped client id is trusted before it is discovered again.
pub const DEFAULT_CREDENTIAL_TTL: Duration = Duration::from_secs(5 * 60);

/// Errors that can occur when using the soundcloudrs library.
///
/// `Http`, `SerdeJson`, `Status` and `Url` together make up the transport
/// failures. Every other variant describes a condition specific to the
/// SoundCloud web API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed (network issues, timeouts, etc.)
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    /// The server answered with a non-success status code
    #[error("Request to {url} failed with status {status}")]
    Status { status: u16, url: String },
    /// JSON serialization/deserialization failed
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    /// An endpoint URL could not be built
    #[error(transparent)]
    Url(#[from] url::ParseError),
    /// A custom scraping pattern failed to compile
    #[error(transparent)]
    Regex(#[from] regex::Error),
    /// The public client id could not be scraped from the web player
    #[error(
        "Could not find a public client id ({0}). SoundCloud has probably changed where the client id is located."
    )]
    CredentialDiscovery(String),
    /// The `kind` discriminant of a response is not one this library understands
    #[error("Unrecognised resource kind: {0:?}")]
    UnresolvedKind(String),
    /// A resource resolved to a different kind than the caller asked for
    #[error("Expected a {expected}, but the URL resolved to a {found}")]
    UnexpectedKind { expected: Kind, found: Kind },
    /// The track offers no progressive (single file) transcoding
    #[error(
        "Track {0} has no progressive stream. Only progressive downloads are supported; HLS (segmented) streams are not assembled by this library."
    )]
    UnsupportedStreamFormat(u64),
    /// The stream manifest did not contain a media URL
    #[error("No stream URL returned for track {0}")]
    MissingStreamUrl(u64),
    /// A batch lookup did not return the requested track
    #[error("Track {0} not found")]
    TrackNotFound(u64),
    /// The sink handed to `write_mp3_to` cannot be written, read back and rewound
    #[error("Sink must be opened for binary read and write: {0}")]
    InvalidSinkMode(#[source] std::io::Error),
    /// The tag writer rejected the audio data
    #[error("Tag writing error: {0}")]
    Tag(String),
    /// Failed to initialize audio stream
    #[error("Stream initialization error: {0}")]
    StreamInitializationError(String),
}

/// The `kind` discriminant carried by every SoundCloud resource.
#[derive(
    Debug, Serialize, Deserialize, EnumString, AsRefStr, Display, PartialEq, Eq, Clone, Copy, Hash,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Kind {
    Track,
    Playlist,
    /// Generated playlists such as artist stations
    SystemPlaylist,
    User,
}

impl Kind {
    /// Read the `kind` field of a raw response.
    pub fn of(value: &Value) -> Result<Kind, Error> {
        let kind = value.get("kind").and_then(Value::as_str).unwrap_or_default();
        kind.parse()
            .map_err(|_| Error::UnresolvedKind(kind.to_string()))
    }
}

/// Any entity a SoundCloud URL can resolve to.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Resource {
    Track(Box<Track>),
    /// Both regular and system playlists
    Playlist(Box<Playlist>),
    User(Box<User>),
}

impl Resource {
    /// Build a resource from a raw response by dispatching on its `kind`.
    ///
    /// Containers are returned exactly as received; their track listings may
    /// still contain stubs.
    pub fn from_value(value: Value) -> Result<Self, Error> {
        match Kind::of(&value)? {
            Kind::Track => Ok(Resource::Track(Box::new(serde_json::from_value(value)?))),
            Kind::Playlist | Kind::SystemPlaylist => {
                Ok(Resource::Playlist(Box::new(serde_json::from_value(value)?)))
            }
            Kind::User => Ok(Resource::User(Box::new(serde_json::from_value(value)?))),
        }
    }

    pub fn kind(&self) -> Kind {
        match self {
            Resource::Track(_) => Kind::Track,
            Resource::Playlist(playlist) => playlist.kind(),
            Resource::User(_) => Kind::User,
        }
    }

    pub fn id(&self) -> String {
        match self {
            Resource::Track(track) => track.id.to_string(),
            Resource::Playlist(playlist) => playlist.id.to_string(),
            Resource::User(user) => user.id.to_string(),
        }
    }

    pub fn into_track(self) -> Result<Track, Error> {
        match self {
            Resource::Track(track) => Ok(*track),
            other => Err(Error::UnexpectedKind {
                expected: Kind::Track,
                found: other.kind(),
            }),
        }
    }

    pub fn into_playlist(self) -> Result<Playlist, Error> {
        match self {
            Resource::Playlist(playlist) => Ok(*playlist),
            other => Err(Error::UnexpectedKind {
                expected: Kind::Playlist,
                found: other.kind(),
            }),
        }
    }

    pub fn into_user(self) -> Result<User, Error> {
        match self {
            Resource::User(user) => Ok(*user),
            other => Err(Error::UnexpectedKind {
                expected: Kind::User,
                found: other.kind(),
            }),
        }
    }
}

/// A page of results from a listing endpoint.
///
/// SoundCloud paginates with an opaque `next_href` rather than offsets; the
/// client follows it until it is absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection<T> {
    /// Items in the current page
    #[serde(default = "Vec::new")]
    pub collection: Vec<T>,
    /// URL of the next page, without credentials
    #[serde(default)]
    pub next_href: Option<String>,
    /// Total number of matches (search only)
    #[serde(default)]
    pub total_results: Option<u64>,
}

impl<T> Collection<T> {
    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            collection: Vec::new(),
            next_href: None,
            total_results: None,
        }
    }
}

/// Main client for the SoundCloud web API.
///
/// The client owns the only mutable shared state of the library: the public
/// client id. It is scraped from the web player on first use and again
/// whenever it is older than the configured TTL. Entities returned by the
/// client are plain data; operations that need further requests take the
/// client explicitly.
///
/// # Example
///
/// ```no_run
/// use soundcloudrs::SoundcloudClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = SoundcloudClient::new();
/// let track = client
///     .resolve_track("https://soundcloud.com/mt-marcy/cold-nights")
///     .await?;
/// println!("{} - {}", track.artist, track.title);
/// # Ok(())
/// # }
/// ```
///
/// # Thread Safety
///
/// `SoundcloudClient` can be shared between tasks. Credential refresh is
/// single-flight: concurrent callers that find the client id expired wait
/// for one refresh instead of each scraping the web player.
pub struct SoundcloudClient {
    transport: Arc<dyn Transport>,
    credentials: ArcSwapOption<Credentials>,
    credentials_semaphore: Semaphore,
    credential_provider: Arc<dyn CredentialProvider>,
    credential_ttl: Duration,
    endpoints: Endpoints,
    tag_writer: Arc<dyn TagWriter>,
}

impl Default for SoundcloudClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundcloudClient {
    /// Create a new client that discovers its client id on first use.
    pub fn new() -> Self {
        Self {
            transport: Arc::new(HttpTransport::new()),
            credentials: ArcSwapOption::from(None),
            credentials_semaphore: Semaphore::new(1),
            credential_provider: Arc::new(ClientIdScraper::default()),
            credential_ttl: DEFAULT_CREDENTIAL_TTL,
            endpoints: Endpoints::default(),
            tag_writer: Arc::new(Id3TagWriter),
        }
    }

    /// Use a custom HTTP client using the builder pattern.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use soundcloudrs::SoundcloudClient;
    ///
    /// let custom_client = reqwest::Client::builder()
    ///     .timeout(std::time::Duration::from_secs(30))
    ///     .build()
    ///     .unwrap();
    ///
    /// let client = SoundcloudClient::new().with_client(custom_client);
    /// ```
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.transport = Arc::new(HttpTransport::with_client(client));
        self
    }

    /// Replace the transport entirely, e.g. with a caching or recording one.
    pub fn with_transport<T>(mut self, transport: T) -> Self
    where
        T: Transport + 'static,
    {
        self.transport = Arc::new(transport);
        self
    }

    /// Use a known client id. It never expires and no scraping takes place.
    pub fn with_client_id(mut self, client_id: String) -> Self {
        self.credentials = ArcSwapOption::from_pointee(Credentials::new(client_id, None));
        self
    }

    /// Swap the strategy used to discover client ids.
    pub fn with_credential_provider<P>(mut self, provider: P) -> Self
    where
        P: CredentialProvider + 'static,
    {
        self.credential_provider = Arc::new(provider);
        self
    }

    /// Set how long a discovered client id is used before it is refreshed.
    pub fn with_credential_ttl(mut self, ttl: Duration) -> Self {
        self.credential_ttl = ttl;
        self
    }

    /// Override the API endpoints using the builder pattern.
    ///
    /// SoundCloud changes its undocumented API without notice, so every base
    /// URL and query value lives in [`Endpoints`].
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Use a different tag writer when materialising tracks.
    pub fn with_tag_writer<W>(mut self, tag_writer: W) -> Self
    where
        W: TagWriter + 'static,
    {
        self.tag_writer = Arc::new(tag_writer);
        self
    }

    pub fn get_endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn set_endpoints(&mut self, endpoints: Endpoints) {
        self.endpoints = endpoints;
    }

    pub fn get_credential_ttl(&self) -> Duration {
        self.credential_ttl
    }

    /// Get the current credentials, expired or not.
    ///
    /// Returns `None` until the first request has been made.
    pub fn get_credentials(&self) -> Option<Arc<Credentials>> {
        self.credentials.load_full()
    }

    /// Get a valid client id, discovering a new one when there is none or
    /// the current one has expired.
    pub async fn client_id(&self) -> Result<String, Error> {
        if let Some(credentials) = self.get_credentials() {
            if !credentials.is_expired() {
                return Ok(credentials.client_id.clone());
            }
        }

        let credentials = self.refresh_credentials().await?;
        Ok(credentials.client_id.clone())
    }

    /// Discover a new client id and store it.
    ///
    /// Only one caller discovers at a time. Callers that arrive while a
    /// discovery is running wait for it and reuse its client id; if it
    /// failed, the first of them runs a discovery of its own, so every caller
    /// sees the error of a discovery it waited on.
    pub async fn refresh_credentials(&self) -> Result<Arc<Credentials>, Error> {
        // Try to become the single refresher
        if let Ok(permit) = self.credentials_semaphore.try_acquire() {
            return self.discover_credentials(permit).await;
        }

        // Someone else is refreshing, wait for them and reuse the result.
        let permit = self
            .credentials_semaphore
            .acquire()
            .await
            .map_err(|e| Error::CredentialDiscovery(e.to_string()))?;

        match self.get_credentials() {
            Some(credentials) if !credentials.is_expired() => Ok(credentials),
            _ => self.discover_credentials(permit).await,
        }
    }

    // The permit is held until the new credentials are stored.
    async fn discover_credentials(
        &self,
        permit: SemaphorePermit<'_>,
    ) -> Result<Arc<Credentials>, Error> {
        let client_id = self
            .credential_provider
            .discover(self.transport.as_ref(), &self.endpoints)
            .await?;

        let credentials = Arc::new(Credentials::new(client_id, Some(self.credential_ttl)));
        self.credentials.store(Some(credentials.clone()));

        drop(permit);

        log::info!("Discovered SoundCloud client id {}", credentials.client_id);
        Ok(credentials)
    }

    // GET the given URL and deserialize the JSON body.
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, Error> {
        let value = self.transport.fetch_json(url.as_str()).await?;
        decode_response(url, value)
    }

    // Follow `next_href` until the listing is exhausted.
    pub(crate) async fn collect_pages<T: DeserializeOwned>(
        &self,
        first_page: Url,
        client_id: &str,
    ) -> Result<Vec<T>, Error> {
        let mut items = Vec::new();
        let mut next = Some(first_page);

        while let Some(url) = next {
            let page: Collection<T> = self.get_json(&url).await?;
            items.extend(page.collection);
            next = match page.next_href {
                Some(href) => Some(self.endpoints.authorize(&href, client_id)?),
                None => None,
            };
        }

        Ok(items)
    }
}

// Shared by both clients so that response logging looks the same.
pub(crate) fn decode_response<T: DeserializeOwned>(url: &Url, value: Value) -> Result<T, Error> {
    if log::log_enabled!(log::Level::Trace) {
        let pretty_value = serde_json::to_string_pretty(&value).unwrap_or_default();
        log::trace!("Requested URL: {}", url);
        log::trace!("Response {}", pretty_value);
    }

    match serde_json::from_value(value.clone()) {
        Ok(t) => Ok(t),
        Err(e) => {
            if log::log_enabled!(log::Level::Debug) {
                let pretty_problem_value = serde_json::to_string_pretty(&value).unwrap_or_default();
                log::debug!("Requested URL: {}", url);
                log::debug!("JSON deserialization error: {}", e);
                log::debug!("Response: {}", pretty_problem_value);
            }
            Err(Error::SerdeJson(e))
        }
    }
}

// Utility function to deserialize a null value as a default value
pub(crate) fn deserialize_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + serde::Deserialize<'de>,
{
    Option::deserialize(deserializer).map(|opt| opt.unwrap_or_default())
}
