use crate::Error;
use crate::Playlist;
use crate::SoundcloudClient;
use crate::Track;
use crate::TrackEntry;
use crate::deserialize_null_default;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

/// Represents a SoundCloud user profile.
///
/// Resolving a profile URL also fetches the user's uploads and playlists.
/// [`SoundcloudClient::resolve`] returns users with `tracks` and every
/// playlist in `playlists` reconciled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier
    pub id: u64,
    /// Always `"user"`
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub username: String,
    pub permalink: Option<String>,
    pub permalink_url: Option<String>,
    pub uri: Option<String>,
    pub urn: Option<String>,
    pub avatar_url: Option<String>,
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub description: Option<String>,
    pub city: Option<String>,
    pub country_code: Option<String>,
    pub verified: Option<bool>,
    pub created_at: Option<String>,
    pub last_modified: Option<String>,

    pub followers_count: Option<u64>,
    pub followings_count: Option<u64>,
    pub likes_count: Option<u64>,
    pub playlist_count: Option<u32>,
    /// Number of public uploads reported by SoundCloud
    pub track_count: Option<u32>,

    /// The user's uploads
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub tracks: Vec<TrackEntry>,
    /// The user's playlists and albums
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub playlists: Vec<Playlist>,

    #[serde(skip)]
    pub(crate) ready: bool,
}

impl User {
    /// The number of uploads, as reported by SoundCloud.
    pub fn len(&self) -> usize {
        self.track_count
            .map(|count| count as usize)
            .unwrap_or(self.tracks.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether tracks and playlists have been fetched and reconciled.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn hydrated_tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter_map(TrackEntry::as_track)
    }
}

impl SoundcloudClient {
    /// Get every upload of a user, following pagination.
    pub async fn user_tracks(&self, user_id: u64) -> Result<Vec<TrackEntry>, Error> {
        let client_id = self.client_id().await?;
        let url = self.endpoints.user_tracks_url(user_id, &client_id)?;
        self.collect_pages(url, &client_id).await
    }

    /// Get every playlist of a user, following pagination.
    ///
    /// The playlists are not reconciled.
    pub async fn user_playlists(&self, user_id: u64) -> Result<Vec<Playlist>, Error> {
        let client_id = self.client_id().await?;
        let url = self.endpoints.user_playlists_url(user_id, &client_id)?;
        self.collect_pages(url, &client_id).await
    }

    /// Fetch a user's uploads and playlists and reconcile all of them.
    ///
    /// Like [`reconcile_playlist`](Self::reconcile_playlist) this runs at
    /// most once per user. The uploads and every playlist are reconciled
    /// concurrently.
    pub async fn reconcile_user(&self, user: &mut User) -> Result<(), Error> {
        if user.ready {
            return Ok(());
        }
        user.ready = true;

        log::debug!("Reconciling user {}", user.id);

        let (tracks, mut playlists) =
            futures::try_join!(self.user_tracks(user.id), self.user_playlists(user.id))?;

        let (tracks, _) = futures::try_join!(
            self.reconcile_entries(tracks),
            try_join_all(
                playlists
                    .iter_mut()
                    .map(|playlist| self.reconcile_playlist(playlist)),
            ),
        )?;

        user.tracks = tracks;
        user.playlists = playlists;
        Ok(())
    }

    /// The user's uploads, fetching and reconciling them first if needed.
    pub async fn user_uploads<'a>(&self, user: &'a mut User) -> Result<Vec<&'a Track>, Error> {
        self.reconcile_user(user).await?;
        Ok(user.hydrated_tracks().collect())
    }
}
