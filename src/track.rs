use crate::Error;
use crate::SoundcloudClient;
use crate::batch;
use crate::deserialize_null_default;
use futures::future::try_join_all;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use stream_download::storage::memory::MemoryStorageProvider;
use stream_download::{Settings, StreamDownload};

/// Represents a track from the SoundCloud catalog.
///
/// `artist` is not sent by SoundCloud. It is derived when the track is
/// deserialized: uploads titled `"artist - title"` are split on the first
/// `" - "`, anything else is attributed to the uploader.
///
/// Serializing a track yields every remote field plus the derived
/// `artist`, but never the internal `ready` flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self")]
pub struct Track {
    /// Unique track identifier
    pub id: u64,
    /// Always `"track"`
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub kind: String,
    /// Track title, with any `"artist - "` prefix removed
    pub title: String,
    /// Performing artist
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub artist: String,
    /// The uploader
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub user: UserSummary,
    pub user_id: Option<u64>,

    /// Duration of the stream in milliseconds (may be a preview)
    pub duration: Option<u64>,
    /// Duration of the full track in milliseconds
    pub full_duration: Option<u64>,

    /// Cover art URL at the default (`large`) size
    pub artwork_url: Option<String>,
    pub waveform_url: Option<String>,
    pub permalink: Option<String>,
    pub permalink_url: Option<String>,
    pub uri: Option<String>,
    pub urn: Option<String>,

    pub description: Option<String>,
    pub genre: Option<String>,
    pub tag_list: Option<String>,
    pub label_name: Option<String>,
    pub license: Option<String>,
    pub purchase_title: Option<String>,
    pub purchase_url: Option<String>,
    pub release_date: Option<String>,
    pub created_at: Option<String>,
    pub last_modified: Option<String>,
    pub display_date: Option<String>,

    pub commentable: Option<bool>,
    pub comment_count: Option<u64>,
    pub downloadable: Option<bool>,
    pub download_count: Option<u64>,
    pub download_url: Option<String>,
    pub has_downloads_left: Option<bool>,
    pub embeddable_by: Option<String>,
    pub likes_count: Option<u64>,
    pub playback_count: Option<u64>,
    pub reposts_count: Option<u64>,
    pub public: Option<bool>,
    pub secret_token: Option<String>,
    pub sharing: Option<String>,
    pub state: Option<String>,
    pub streamable: Option<bool>,
    pub monetization_model: Option<String>,
    pub policy: Option<String>,

    /// Available transcodings of the audio
    pub media: Option<Media>,
    /// Token that must accompany stream manifest requests for some tracks
    pub track_authorization: Option<String>,
    pub publisher_metadata: Option<Value>,
    pub visuals: Option<Value>,

    /// Album name written to the audio tags, set by the caller
    pub album: Option<String>,
    /// Track number written to the audio tags, set by the caller
    pub track_no: Option<u32>,

    #[serde(skip)]
    pub(crate) ready: bool,
}

impl Serialize for Track {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Track::serialize(self, serializer)
    }
}

impl<'de> Deserialize<'de> for Track {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut track = Track::deserialize(deserializer)?;
        track.derive_artist();
        Ok(track)
    }
}

impl Track {
    // A serialized track already carries its artist; only raw API records are split.
    fn derive_artist(&mut self) {
        if !self.artist.is_empty() {
            return;
        }
        match split_title(&self.title) {
            Some((artist, title)) => {
                self.artist = artist;
                self.title = title;
            }
            None => self.artist = self.user.username.clone(),
        }
    }

    /// Whether the track has been written to a sink with its tags.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// The progressive (single file) transcoding, preferring MP3.
    pub fn progressive_transcoding(&self) -> Option<&Transcoding> {
        let transcodings = &self.media.as_ref()?.transcodings;
        transcodings
            .iter()
            .find(|t| t.is_progressive() && t.format.mime_type.contains("mpeg"))
            .or_else(|| transcodings.iter().find(|t| t.is_progressive()))
    }
}

/// Split `"artist - title"` on the first separator.
pub(crate) fn split_title(title: &str) -> Option<(String, String)> {
    let (artist, title) = title.split_once(" - ")?;
    Some((artist.trim().to_string(), title.trim().to_string()))
}

/// The user summary embedded in tracks and playlists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(default)]
    pub id: u64,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub username: String,
    pub permalink: Option<String>,
    pub permalink_url: Option<String>,
    pub avatar_url: Option<String>,
    pub full_name: Option<String>,
    pub verified: Option<bool>,
}

/// Transcodings offered for a track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Media {
    #[serde(default)]
    pub transcodings: Vec<Transcoding>,
}

/// One encoding of a track's audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcoding {
    /// Manifest URL; requesting it (with a client id) yields the media URL
    pub url: String,
    pub preset: Option<String>,
    pub duration: Option<u64>,
    /// Whether this is a 30 second preview
    pub snipped: Option<bool>,
    pub format: TranscodingFormat,
    pub quality: Option<String>,
}

impl Transcoding {
    pub fn is_progressive(&self) -> bool {
        self.format.protocol == "progressive"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodingFormat {
    /// `"progressive"` or `"hls"`
    pub protocol: String,
    pub mime_type: String,
}

/// A reference to a track inside a playlist that has not been hydrated yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackStub {
    pub id: u64,
}

/// An element of a playlist or user track listing.
///
/// SoundCloud only sends complete metadata for the first few tracks of a
/// playlist; the rest arrive as stubs carrying just an id. Entries holding a
/// `title` are parsed as [`Track`], anything else as [`TrackStub`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TrackEntry {
    Full(Box<Track>),
    Stub(TrackStub),
}

impl TrackEntry {
    pub fn id(&self) -> u64 {
        match self {
            TrackEntry::Full(track) => track.id,
            TrackEntry::Stub(stub) => stub.id,
        }
    }

    pub fn as_track(&self) -> Option<&Track> {
        match self {
            TrackEntry::Full(track) => Some(track),
            TrackEntry::Stub(_) => None,
        }
    }

    pub fn is_stub(&self) -> bool {
        matches!(self, TrackEntry::Stub(_))
    }
}

impl From<Track> for TrackEntry {
    fn from(track: Track) -> Self {
        TrackEntry::Full(Box::new(track))
    }
}

impl<'de> Deserialize<'de> for TrackEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        if value.get("title").is_some() {
            serde_json::from_value::<Track>(value)
                .map(TrackEntry::from)
                .map_err(D::Error::custom)
        } else {
            serde_json::from_value::<TrackStub>(value)
                .map(TrackEntry::Stub)
                .map_err(D::Error::custom)
        }
    }
}

impl SoundcloudClient {
    /// Look up several tracks by id.
    ///
    /// Ids are split into requests of at most [`TRACK_BATCH_SIZE`](crate::TRACK_BATCH_SIZE),
    /// which are issued concurrently. The result follows the order of
    /// `track_ids` regardless of the order in which responses arrive. Ids the
    /// API does not return (deleted or private tracks) are skipped. A
    /// repeated id yields one entry per occurrence.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example(client: soundcloudrs::SoundcloudClient) -> Result<(), soundcloudrs::Error> {
    /// let tracks = client.tracks(&[222820656, 1860005124, 289589592]).await?;
    /// for track in tracks {
    ///     println!("{} - {}", track.artist, track.title);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn tracks(&self, track_ids: &[u64]) -> Result<Vec<Track>, Error> {
        if track_ids.is_empty() {
            return Ok(Vec::new());
        }

        let client_id = self.client_id().await?;

        let urls = batch::chunks(track_ids)
            .map(|chunk| self.endpoints.tracks_url(chunk, &client_id))
            .collect::<Result<Vec<_>, Error>>()?;

        log::debug!(
            "Fetching {} tracks in {} requests",
            track_ids.len(),
            urls.len()
        );

        let pages: Vec<Vec<Track>> = try_join_all(urls.iter().map(|url| self.get_json(url))).await?;

        Ok(batch::restore_order(
            track_ids,
            pages.into_iter().flatten(),
        ))
    }

    /// Get a single track by id.
    pub async fn track(&self, track_id: u64) -> Result<Track, Error> {
        self.tracks(&[track_id])
            .await?
            .into_iter()
            .next()
            .ok_or(Error::TrackNotFound(track_id))
    }

    /// Resolve the media URL of a track's progressive stream.
    ///
    /// Fails with [`Error::UnsupportedStreamFormat`] before making any
    /// request when the track is only available as HLS.
    pub async fn stream_url(&self, track: &Track) -> Result<String, Error> {
        let transcoding = track
            .progressive_transcoding()
            .ok_or(Error::UnsupportedStreamFormat(track.id))?;

        let client_id = self.client_id().await?;
        let mut url = self.endpoints.authorize(&transcoding.url, &client_id)?;
        if let Some(track_authorization) = &track.track_authorization {
            url.query_pairs_mut()
                .append_pair("track_authorization", track_authorization);
        }

        let manifest: StreamManifest = self.get_json(&url).await?;
        manifest.url.ok_or(Error::MissingStreamUrl(track.id))
    }

    /// Get a buffered, seekable stream of the track's audio.
    ///
    /// While this function is async, the returned stream is sync.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example(client: soundcloudrs::SoundcloudClient, track: soundcloudrs::Track) -> Result<(), soundcloudrs::Error> {
    /// let stream = client.track_stream(&track).await?;
    ///
    /// tokio::task::spawn_blocking(move || {
    ///     let device_handle = rodio::OutputStreamBuilder::open_default_stream().unwrap();
    ///     let sink = rodio::Sink::connect_new(device_handle.mixer());
    ///     sink.append(rodio::Decoder::new(stream).unwrap());
    ///     sink.play();
    ///     sink.sleep_until_end();
    /// })
    /// .await
    /// .unwrap();
    /// # Ok(())
    /// # }
    /// ```
    pub async fn track_stream(
        &self,
        track: &Track,
    ) -> Result<StreamDownload<MemoryStorageProvider>, Error> {
        let url: reqwest::Url = self.stream_url(track).await?.parse()?;

        let reader =
            match StreamDownload::new_http(url, MemoryStorageProvider, Settings::default()).await {
                Ok(reader) => reader,
                Err(e) => {
                    return Err(Error::StreamInitializationError(e.to_string()));
                }
            };

        Ok(reader)
    }
}

/// Response of a transcoding manifest request.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StreamManifest {
    pub url: Option<String>,
}
