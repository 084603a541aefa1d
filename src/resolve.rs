use crate::Error;
use crate::Playlist;
use crate::Resource;
use crate::SoundcloudClient;
use crate::Track;
use crate::User;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static CANONICAL_URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(www\.|m\.)?soundcloud\.com/").expect("canonical url pattern is valid")
});

/// What an identifier passed to `resolve` refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Target<'a> {
    /// A bare numeric track id
    TrackId(u64),
    /// A public URL that can be sent to the resolve endpoint as is
    Canonical(&'a str),
    /// A short link (`on.soundcloud.com`, `snd.sc`, ...) that redirects to a public URL
    Redirect(&'a str),
}

impl<'a> Target<'a> {
    pub(crate) fn parse(identifier: &'a str) -> Self {
        let identifier = identifier.trim();
        if let Ok(track_id) = identifier.parse::<u64>() {
            return Target::TrackId(track_id);
        }
        if CANONICAL_URL_PATTERN.is_match(identifier) {
            Target::Canonical(identifier)
        } else {
            Target::Redirect(identifier)
        }
    }
}

impl SoundcloudClient {
    /// Resolve a SoundCloud URL or a numeric track id.
    ///
    /// Short links are followed to their canonical URL first. Playlists and
    /// users are reconciled before they are returned, so their listings only
    /// hold hydrated tracks.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use soundcloudrs::{Resource, SoundcloudClient};
    ///
    /// # async fn example() -> Result<(), soundcloudrs::Error> {
    /// let client = SoundcloudClient::new();
    /// match client.resolve("https://soundcloud.com/mt-marcy").await? {
    ///     Resource::User(user) => println!("{} has {} tracks", user.username, user.tracks.len()),
    ///     other => println!("Resolved a {}", other.kind()),
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn resolve(&self, identifier: &str) -> Result<Resource, Error> {
        let target = match Target::parse(identifier) {
            Target::TrackId(track_id) => {
                return Ok(Resource::Track(Box::new(self.track(track_id).await?)));
            }
            Target::Canonical(url) => url.to_string(),
            Target::Redirect(url) => {
                let canonical = self.transport.canonical_url(url).await?;
                log::debug!("Followed {} to {}", url, canonical);
                canonical
            }
        };

        let client_id = self.client_id().await?;
        let url = self.endpoints.resolve_url(&target, &client_id)?;
        let value: Value = self.get_json(&url).await?;

        let mut resource = Resource::from_value(value)?;
        match &mut resource {
            Resource::Track(_) => {}
            Resource::Playlist(playlist) => self.reconcile_playlist(playlist).await?,
            Resource::User(user) => self.reconcile_user(user).await?,
        }

        Ok(resource)
    }

    /// Resolve a URL that is expected to point at a track.
    pub async fn resolve_track(&self, identifier: &str) -> Result<Track, Error> {
        self.resolve(identifier).await?.into_track()
    }

    /// Resolve a URL that is expected to point at a playlist or album.
    pub async fn resolve_playlist(&self, url: &str) -> Result<Playlist, Error> {
        self.resolve(url).await?.into_playlist()
    }

    /// Resolve a URL that is expected to point at a user profile.
    pub async fn resolve_user(&self, url: &str) -> Result<User, Error> {
        self.resolve(url).await?.into_user()
    }
}
