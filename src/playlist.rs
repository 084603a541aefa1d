use crate::Error;
use crate::Kind;
use crate::SoundcloudClient;
use crate::Track;
use crate::TrackEntry;
use crate::UserSummary;
use crate::deserialize_null_default;
use crate::reconcile::ReconcilePlan;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Identifier of a playlist.
///
/// Regular playlists have numeric ids, system playlists (artist stations,
/// generated mixes) use URNs such as `soundcloud:system-playlists:...`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlaylistId {
    Numeric(u64),
    Urn(String),
}

impl Default for PlaylistId {
    fn default() -> Self {
        PlaylistId::Numeric(0)
    }
}

impl Display for PlaylistId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaylistId::Numeric(id) => write!(f, "{id}"),
            PlaylistId::Urn(urn) => write!(f, "{urn}"),
        }
    }
}

/// Represents a playlist (or album, or system playlist) from SoundCloud.
///
/// As received, `tracks` usually mixes hydrated tracks with stubs. Once the
/// playlist is reconciled, it holds only [`TrackEntry::Full`] entries, one
/// per track of the original listing and in the same order. Playlists
/// returned by [`SoundcloudClient::resolve`] are always reconciled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    /// Unique playlist identifier
    pub id: PlaylistId,
    /// `"playlist"` or `"system-playlist"`
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub title: String,
    /// Information about the playlist creator
    pub user: Option<UserSummary>,
    pub user_id: Option<u64>,

    /// Track listing, see the type level documentation
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub tracks: Vec<TrackEntry>,
    /// Number of tracks reported by SoundCloud
    #[serde(default)]
    pub track_count: Option<u32>,
    /// Total duration in milliseconds
    pub duration: Option<u64>,

    pub artwork_url: Option<String>,
    pub description: Option<String>,
    pub genre: Option<String>,
    pub tag_list: Option<String>,
    pub label_name: Option<String>,
    pub license: Option<String>,
    pub permalink: Option<String>,
    pub permalink_url: Option<String>,
    pub uri: Option<String>,
    pub purchase_title: Option<String>,
    pub purchase_url: Option<String>,
    pub release_date: Option<String>,
    pub created_at: Option<String>,
    pub last_modified: Option<String>,
    pub published_at: Option<String>,
    pub display_date: Option<String>,
    pub embeddable_by: Option<String>,
    pub likes_count: Option<u64>,
    pub reposts_count: Option<u64>,
    pub managed_by_feeds: Option<bool>,
    pub public: Option<bool>,
    pub secret_token: Option<String>,
    pub sharing: Option<String>,
    /// `"album"`, `"ep"`, ... for sets released as such
    pub set_type: Option<String>,
    pub is_album: Option<bool>,

    #[serde(skip)]
    pub(crate) ready: bool,
}

impl Playlist {
    /// The number of tracks in the playlist.
    ///
    /// This is the count reported by SoundCloud. It can be larger than
    /// `tracks.len()` even after reconciliation: stubs whose ids SoundCloud
    /// no longer returns, such as deleted or private tracks, are dropped from
    /// the listing with a warning.
    pub fn len(&self) -> usize {
        self.track_count
            .map(|count| count as usize)
            .unwrap_or(self.tracks.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> Kind {
        match self.kind.as_str() {
            "system-playlist" => Kind::SystemPlaylist,
            _ => Kind::Playlist,
        }
    }

    /// Whether the track listing has been reconciled.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// The hydrated tracks of the listing, skipping stubs.
    pub fn hydrated_tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter_map(TrackEntry::as_track)
    }
}

impl SoundcloudClient {
    /// Replace the stubs in a playlist's listing with hydrated tracks.
    ///
    /// Reconciliation happens at most once per playlist: the playlist is
    /// marked ready before the first lookup, and later calls return
    /// immediately without any request. If a lookup fails the listing is
    /// left as it was, but the playlist stays marked ready; fetch it again
    /// to retry.
    ///
    /// Stubs that the tracks endpoint does not return are left out of the
    /// reconciled listing, so it may be shorter than [`Playlist::len`].
    pub async fn reconcile_playlist(&self, playlist: &mut Playlist) -> Result<(), Error> {
        if playlist.ready {
            return Ok(());
        }
        playlist.ready = true;

        log::debug!("Reconciling playlist {}", playlist.id);

        playlist.tracks = self.reconcile_entries(playlist.tracks.clone()).await?;
        Ok(())
    }

    /// The playlist's tracks, reconciling it first if needed.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example(client: soundcloudrs::SoundcloudClient) -> Result<(), soundcloudrs::Error> {
    /// let mut playlist = client
    ///     .resolve_playlist("https://soundcloud.com/soundcloud-circuits/sets/web-tempo-future-dance-and-electronic")
    ///     .await?;
    /// for track in client.playlist_tracks(&mut playlist).await? {
    ///     println!("{} - {}", track.artist, track.title);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn playlist_tracks<'a>(
        &self,
        playlist: &'a mut Playlist,
    ) -> Result<Vec<&'a Track>, Error> {
        self.reconcile_playlist(playlist).await?;
        Ok(playlist.hydrated_tracks().collect())
    }

    // Batches are looked up one after another; each lookup fans out itself.
    pub(crate) async fn reconcile_entries(
        &self,
        entries: Vec<TrackEntry>,
    ) -> Result<Vec<TrackEntry>, Error> {
        let plan = ReconcilePlan::new(entries);

        let mut resolved = Vec::with_capacity(plan.batches().len());
        for batch in plan.batches() {
            resolved.push(self.tracks(batch).await?);
        }

        Ok(plan.assemble(resolved))
    }
}
