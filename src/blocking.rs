//! A blocking SoundCloud client.
//!
//! The blocking client mirrors [`crate::SoundcloudClient`]: it returns the
//! same entities and errors and reconciles listings the same way. Requests
//! occupy the calling thread; batched track lookups are spread over a bounded
//! pool of scoped worker threads.
//!
//! Like `reqwest::blocking`, this client must not be created or used inside
//! an async runtime.
//!
//! ```no_run
//! use soundcloudrs::blocking::SoundcloudClient;
//!
//! # fn example() -> Result<(), soundcloudrs::Error> {
//! let client = SoundcloudClient::new();
//! let playlist = client.resolve_playlist("https://soundcloud.com/mt-marcy/sets/cold-nights")?;
//! for track in playlist.hydrated_tracks() {
//!     println!("{} - {}", track.artist, track.title);
//! }
//! # Ok(())
//! # }
//! ```

use crate::batch;
use crate::materialize::write_to_sink;
use crate::reconcile::ReconcilePlan;
use crate::resolve::Target;
use crate::search::DEFAULT_SEARCH_LIMIT;
use crate::track::StreamManifest;
use crate::{
    ClientIdScraper, Collection, Credentials, DEFAULT_CREDENTIAL_TTL, Endpoints, Error,
    Id3TagWriter, Playlist, Resource, SearchQuery, SearchResults, TagWriter, Track, TrackEntry,
    USER_AGENT, User, decode_response,
};
use arc_swap::ArcSwapOption;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::io::{Cursor, Read, Seek, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, mpsc};
use std::time::Duration;
use url::Url;

/// Default number of worker threads used for batched lookups.
pub const DEFAULT_MAX_WORKERS: usize = 8;

/// The blocking counterpart of [`crate::Transport`].
pub trait Transport: Send + Sync {
    /// Fetch the raw body of `url`. Non-success statuses are errors.
    fn fetch(&self, url: &str) -> Result<Vec<u8>, Error>;

    /// Fetch `url` and parse the body as JSON. An empty body is `null`.
    fn fetch_json(&self, url: &str) -> Result<Value, Error> {
        let body = self.fetch(url)?;
        if body.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&body)?)
    }

    /// Follow redirects from `url` and return where they end.
    fn canonical_url(&self, url: &str) -> Result<String, Error>;
}

/// [`Transport`] backed by a `reqwest::blocking::Client`.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, Error> {
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            log::debug!("Requested URL: {}", url);
            log::debug!("SoundCloud returned status {}", status);
            return Err(Error::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(resp.bytes()?.to_vec())
    }

    fn canonical_url(&self, url: &str) -> Result<String, Error> {
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()?;

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

/// The blocking counterpart of [`crate::CredentialProvider`].
pub trait CredentialProvider: Send + Sync {
    fn discover(&self, transport: &dyn Transport, endpoints: &Endpoints) -> Result<String, Error>;
}

// Scripts are fetched one at a time, so stop at the first one that matches.
impl CredentialProvider for ClientIdScraper {
    fn discover(&self, transport: &dyn Transport, endpoints: &Endpoints) -> Result<String, Error> {
        let page = transport.fetch(&endpoints.discovery_page)?;
        let script_urls = self.script_urls(&String::from_utf8_lossy(&page));

        if script_urls.is_empty() {
            return Err(Error::CredentialDiscovery(format!(
                "no script assets referenced by {}",
                endpoints.discovery_page
            )));
        }

        for url in &script_urls {
            let script = match transport.fetch(url) {
                Ok(script) => script,
                Err(e) => {
                    log::warn!("Failed to fetch script {}: {}", url, e);
                    continue;
                }
            };
            if let Some(client_id) = self.find_client_id(&String::from_utf8_lossy(&script)) {
                return Ok(client_id);
            }
        }

        Err(Error::CredentialDiscovery(format!(
            "no client id in {} script assets",
            script_urls.len()
        )))
    }
}

/// Blocking client for the SoundCloud web API.
///
/// See [`crate::SoundcloudClient`] for the semantics of each operation.
/// Credential refresh is single-flight here too: threads that find the
/// client id expired queue behind one refresh and reuse its result.
pub struct SoundcloudClient {
    transport: Arc<dyn Transport>,
    credentials: ArcSwapOption<Credentials>,
    refresh_gate: Mutex<()>,
    credential_provider: Arc<dyn CredentialProvider>,
    credential_ttl: Duration,
    endpoints: Endpoints,
    tag_writer: Arc<dyn TagWriter>,
    max_workers: usize,
}

impl Default for SoundcloudClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundcloudClient {
    pub fn new() -> Self {
        Self {
            transport: Arc::new(HttpTransport::new()),
            credentials: ArcSwapOption::from(None),
            refresh_gate: Mutex::new(()),
            credential_provider: Arc::new(ClientIdScraper::default()),
            credential_ttl: DEFAULT_CREDENTIAL_TTL,
            endpoints: Endpoints::default(),
            tag_writer: Arc::new(Id3TagWriter),
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }

    pub fn with_client(mut self, client: reqwest::blocking::Client) -> Self {
        self.transport = Arc::new(HttpTransport::with_client(client));
        self
    }

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

    pub fn with_credential_provider<P>(mut self, provider: P) -> Self
    where
        P: CredentialProvider + 'static,
    {
        self.credential_provider = Arc::new(provider);
        self
    }

    pub fn with_credential_ttl(mut self, ttl: Duration) -> Self {
        self.credential_ttl = ttl;
        self
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_tag_writer<W>(mut self, tag_writer: W) -> Self
    where
        W: TagWriter + 'static,
    {
        self.tag_writer = Arc::new(tag_writer);
        self
    }

    /// Limit the number of threads used for batched lookups. At least one
    /// worker is always used.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
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

    pub fn get_max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn get_credentials(&self) -> Option<Arc<Credentials>> {
        self.credentials.load_full()
    }

    fn valid_credentials(&self) -> Option<Arc<Credentials>> {
        self.get_credentials()
            .filter(|credentials| !credentials.is_expired())
    }

    /// Get a valid client id, discovering a new one when there is none or
    /// the current one has expired.
    pub fn client_id(&self) -> Result<String, Error> {
        if let Some(credentials) = self.valid_credentials() {
            return Ok(credentials.client_id.clone());
        }

        let _gate = self
            .refresh_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Refreshed by another thread while we waited for the gate
        if let Some(credentials) = self.valid_credentials() {
            return Ok(credentials.client_id.clone());
        }

        Ok(self.discover_credentials()?.client_id.clone())
    }

    /// Discover a new client id and store it.
    pub fn refresh_credentials(&self) -> Result<Arc<Credentials>, Error> {
        let _gate = self
            .refresh_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.discover_credentials()
    }

    // Callers hold the refresh gate.
    fn discover_credentials(&self) -> Result<Arc<Credentials>, Error> {
        let client_id = self
            .credential_provider
            .discover(self.transport.as_ref(), &self.endpoints)?;

        let credentials = Arc::new(Credentials::new(client_id, Some(self.credential_ttl)));
        self.credentials.store(Some(credentials.clone()));

        log::info!("Discovered SoundCloud client id {}", credentials.client_id);
        Ok(credentials)
    }

    fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, Error> {
        let value = self.transport.fetch_json(url.as_str())?;
        decode_response(url, value)
    }

    fn collect_pages<T: DeserializeOwned>(
        &self,
        first_page: Url,
        client_id: &str,
    ) -> Result<Vec<T>, Error> {
        let mut items = Vec::new();
        let mut next = Some(first_page);

        while let Some(url) = next {
            let page: Collection<T> = self.get_json(&url)?;
            items.extend(page.collection);
            next = match page.next_href {
                Some(href) => Some(self.endpoints.authorize(&href, client_id)?),
                None => None,
            };
        }

        Ok(items)
    }

    /// Run `job` over every input on the worker pool.
    ///
    /// Results are collected as workers finish and returned in input order.
    /// The first failure stops workers from picking up further inputs and is
    /// returned.
    fn run_all<J, T, F>(&self, inputs: &[J], job: F) -> Result<Vec<T>, Error>
    where
        J: Sync,
        T: Send,
        F: Fn(&J) -> Result<T, Error> + Sync,
    {
        let workers = self.max_workers.min(inputs.len());
        let next = AtomicUsize::new(0);
        let failed = AtomicBool::new(false);

        std::thread::scope(|scope| {
            let (sender, receiver) = mpsc::channel();

            for _ in 0..workers {
                let sender = sender.clone();
                let (next, failed, job) = (&next, &failed, &job);
                scope.spawn(move || {
                    while !failed.load(Ordering::Relaxed) {
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        let Some(input) = inputs.get(index) else {
                            break;
                        };

                        let result = job(input);
                        if result.is_err() {
                            failed.store(true, Ordering::Relaxed);
                        }
                        if sender.send((index, result)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(sender);

            let mut slots: Vec<Option<T>> = inputs.iter().map(|_| None).collect();
            for (index, result) in receiver {
                slots[index] = Some(result?);
            }

            Ok(slots.into_iter().flatten().collect())
        })
    }

    /// Look up several tracks by id. See [`crate::SoundcloudClient::tracks`].
    pub fn tracks(&self, track_ids: &[u64]) -> Result<Vec<Track>, Error> {
        if track_ids.is_empty() {
            return Ok(Vec::new());
        }

        let client_id = self.client_id()?;

        let urls = batch::chunks(track_ids)
            .map(|chunk| self.endpoints.tracks_url(chunk, &client_id))
            .collect::<Result<Vec<_>, Error>>()?;

        log::debug!(
            "Fetching {} tracks in {} requests",
            track_ids.len(),
            urls.len()
        );

        let pages: Vec<Vec<Track>> = self.run_all(&urls, |url| self.get_json(url))?;

        Ok(batch::restore_order(
            track_ids,
            pages.into_iter().flatten(),
        ))
    }

    pub fn track(&self, track_id: u64) -> Result<Track, Error> {
        self.tracks(&[track_id])?
            .into_iter()
            .next()
            .ok_or(Error::TrackNotFound(track_id))
    }

    pub fn stream_url(&self, track: &Track) -> Result<String, Error> {
        let transcoding = track
            .progressive_transcoding()
            .ok_or(Error::UnsupportedStreamFormat(track.id))?;

        let client_id = self.client_id()?;
        let mut url = self.endpoints.authorize(&transcoding.url, &client_id)?;
        if let Some(track_authorization) = &track.track_authorization {
            url.query_pairs_mut()
                .append_pair("track_authorization", track_authorization);
        }

        let manifest: StreamManifest = self.get_json(&url)?;
        manifest.url.ok_or(Error::MissingStreamUrl(track.id))
    }

    /// Resolve a SoundCloud URL or a numeric track id. See
    /// [`crate::SoundcloudClient::resolve`].
    pub fn resolve(&self, identifier: &str) -> Result<Resource, Error> {
        let target = match Target::parse(identifier) {
            Target::TrackId(track_id) => {
                return Ok(Resource::Track(Box::new(self.track(track_id)?)));
            }
            Target::Canonical(url) => url.to_string(),
            Target::Redirect(url) => {
                let canonical = self.transport.canonical_url(url)?;
                log::debug!("Followed {} to {}", url, canonical);
                canonical
            }
        };

        let client_id = self.client_id()?;
        let url = self.endpoints.resolve_url(&target, &client_id)?;
        let value: Value = self.get_json(&url)?;

        let mut resource = Resource::from_value(value)?;
        match &mut resource {
            Resource::Track(_) => {}
            Resource::Playlist(playlist) => self.reconcile_playlist(playlist)?,
            Resource::User(user) => self.reconcile_user(user)?,
        }

        Ok(resource)
    }

    pub fn resolve_track(&self, identifier: &str) -> Result<Track, Error> {
        self.resolve(identifier)?.into_track()
    }

    pub fn resolve_playlist(&self, url: &str) -> Result<Playlist, Error> {
        self.resolve(url)?.into_playlist()
    }

    pub fn resolve_user(&self, url: &str) -> Result<User, Error> {
        self.resolve(url)?.into_user()
    }

    /// Replace the stubs in a playlist's listing with hydrated tracks. See
    /// [`crate::SoundcloudClient::reconcile_playlist`].
    pub fn reconcile_playlist(&self, playlist: &mut Playlist) -> Result<(), Error> {
        if playlist.ready {
            return Ok(());
        }
        playlist.ready = true;

        log::debug!("Reconciling playlist {}", playlist.id);

        playlist.tracks = self.reconcile_entries(playlist.tracks.clone())?;
        Ok(())
    }

    pub fn playlist_tracks<'a>(&self, playlist: &'a mut Playlist) -> Result<Vec<&'a Track>, Error> {
        self.reconcile_playlist(playlist)?;
        Ok(playlist.hydrated_tracks().collect())
    }

    fn reconcile_entries(&self, entries: Vec<TrackEntry>) -> Result<Vec<TrackEntry>, Error> {
        let plan = ReconcilePlan::new(entries);
        let resolved = plan
            .batches()
            .iter()
            .map(|batch| self.tracks(batch))
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(plan.assemble(resolved))
    }

    pub fn user_tracks(&self, user_id: u64) -> Result<Vec<TrackEntry>, Error> {
        let client_id = self.client_id()?;
        let url = self.endpoints.user_tracks_url(user_id, &client_id)?;
        self.collect_pages(url, &client_id)
    }

    pub fn user_playlists(&self, user_id: u64) -> Result<Vec<Playlist>, Error> {
        let client_id = self.client_id()?;
        let url = self.endpoints.user_playlists_url(user_id, &client_id)?;
        self.collect_pages(url, &client_id)
    }

    /// Fetch a user's uploads and playlists and reconcile all of them. The
    /// playlists are reconciled one after another.
    pub fn reconcile_user(&self, user: &mut User) -> Result<(), Error> {
        if user.ready {
            return Ok(());
        }
        user.ready = true;

        log::debug!("Reconciling user {}", user.id);

        let tracks = self.reconcile_entries(self.user_tracks(user.id)?)?;
        let mut playlists = self.user_playlists(user.id)?;
        for playlist in &mut playlists {
            self.reconcile_playlist(playlist)?;
        }

        user.tracks = tracks;
        user.playlists = playlists;
        Ok(())
    }

    pub fn user_uploads<'a>(&self, user: &'a mut User) -> Result<Vec<&'a Track>, Error> {
        self.reconcile_user(user)?;
        Ok(user.hydrated_tracks().collect())
    }

    pub fn search(&self, search: SearchQuery<'_>) -> Result<SearchResults, Error> {
        let client_id = self.client_id()?;
        let url = self.endpoints.search_url(
            search.query,
            search.limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
            search.offset.unwrap_or(0),
            &client_id,
        )?;

        let page: Collection<Value> = self.get_json(&url)?;
        SearchResults::from_page(page)
    }

    /// Download a track's audio into `sink` and tag it. See
    /// [`crate::SoundcloudClient::write_mp3_to`].
    pub fn write_mp3_to<S>(&self, track: &mut Track, sink: &mut S) -> Result<(), Error>
    where
        S: Read + Write + Seek + lofty::io::Truncate,
    {
        let stream_url = self.stream_url(track)?;
        let audio = self.transport.fetch(&stream_url)?;

        let cover_art = match &track.artwork_url {
            Some(artwork_url) => {
                let artwork_url = self.endpoints.large_artwork_url(artwork_url);
                Some(self.transport.fetch(&artwork_url)?)
            }
            None => None,
        };

        write_to_sink(
            sink,
            &audio,
            &track.tags(),
            cover_art.as_deref(),
            self.tag_writer.as_ref(),
        )?;

        track.ready = true;
        Ok(())
    }

    pub fn materialize(&self, track: &mut Track) -> Result<Vec<u8>, Error> {
        let mut buffer = Cursor::new(Vec::new());
        self.write_mp3_to(track, &mut buffer)?;
        Ok(buffer.into_inner())
    }
}
