//! An in-memory SoundCloud used by the integration tests.
//!
//! `FakeSoundcloud` answers the discovery page, script assets, resolve,
//! batched track, user listing and stream manifest requests from canned data
//! and records every URL it is asked for. It implements both the async and
//! the blocking transport so the two clients can be run against the same
//! data.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};
use soundcloudrs::{Error, TagWriter, TrackTags};
use std::collections::HashMap;
use std::io::{Cursor, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const CLIENT_ID: &str = "fakeClientId0123456789";
pub const DISCOVERY_PAGE: &str = "https://soundcloud.com/discover";
pub const SCRIPT_URL: &str = "https://a-v2.sndcdn.com/assets/49-4786eb1d.js";
pub const API: &str = "https://api-v2.soundcloud.com";

const LISTING_PAGE_SIZE: usize = 2;

#[derive(Default)]
struct State {
    client_ids: Vec<String>,
    resources: HashMap<String, Value>,
    redirects: HashMap<String, String>,
    tracks: HashMap<u64, Value>,
    user_tracks: HashMap<u64, Vec<Value>>,
    user_playlists: HashMap<u64, Vec<Value>>,
    search: Vec<Value>,
    bytes: HashMap<String, Vec<u8>>,
    requests: Vec<String>,
}

#[derive(Clone, Default)]
pub struct FakeSoundcloud {
    state: Arc<Mutex<State>>,
    discoveries: Arc<AtomicUsize>,
    track_lookups: Arc<AtomicUsize>,
    lookups_in_flight: Arc<AtomicUsize>,
    max_lookups_in_flight: Arc<AtomicUsize>,
    reverse_completion: bool,
    track_lookup_delay: Option<Duration>,
    discovery_delay: Option<Duration>,
}

impl FakeSoundcloud {
    pub fn new() -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().client_ids.push(CLIENT_ID.to_string());
        fake
    }

    /// Answer concurrent track lookups in reverse order of dispatch.
    pub fn with_reverse_completion(mut self) -> Self {
        self.reverse_completion = true;
        self
    }

    /// Hold every batched track lookup open for `delay`.
    pub fn with_track_lookup_delay(mut self, delay: Duration) -> Self {
        self.track_lookup_delay = Some(delay);
        self
    }

    /// Hold every request for the discovery page open for `delay`.
    pub fn with_discovery_delay(mut self, delay: Duration) -> Self {
        self.discovery_delay = Some(delay);
        self
    }

    /// The most batched track lookups that were open at the same time.
    pub fn max_lookups_in_flight(&self) -> usize {
        self.max_lookups_in_flight.load(Ordering::SeqCst)
    }

    /// Serve scripts without any client id.
    pub fn without_client_id(self) -> Self {
        self.state.lock().unwrap().client_ids.clear();
        self
    }

    /// Serve a different client id on each discovery, in order. An empty id
    /// serves a script without one.
    pub fn with_client_ids(self, client_ids: &[&str]) -> Self {
        self.state.lock().unwrap().client_ids = client_ids.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn add_track(&self, track: Value) {
        let id = track["id"].as_u64().unwrap();
        self.state.lock().unwrap().tracks.insert(id, track);
    }

    pub fn add_resource(&self, url: &str, resource: Value) {
        self.state
            .lock()
            .unwrap()
            .resources
            .insert(url.to_string(), resource);
    }

    pub fn add_redirect(&self, from: &str, to: &str) {
        self.state
            .lock()
            .unwrap()
            .redirects
            .insert(from.to_string(), to.to_string());
    }

    pub fn set_user_tracks(&self, user_id: u64, tracks: Vec<Value>) {
        self.state.lock().unwrap().user_tracks.insert(user_id, tracks);
    }

    pub fn set_user_playlists(&self, user_id: u64, playlists: Vec<Value>) {
        self.state
            .lock()
            .unwrap()
            .user_playlists
            .insert(user_id, playlists);
    }

    pub fn set_search_results(&self, results: Vec<Value>) {
        self.state.lock().unwrap().search = results;
    }

    /// Make the track's progressive stream serve `audio` and its artwork `cover`.
    pub fn add_audio(&self, track_id: u64, audio: &[u8], cover: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state.bytes.insert(
            progressive_url(track_id),
            json!({ "url": media_url(track_id) }).to_string().into_bytes(),
        );
        state.bytes.insert(media_url(track_id), audio.to_vec());
        state
            .bytes
            .insert(large_artwork_url(track_id), cover.to_vec());
    }

    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    pub fn clear_requests(&self) {
        self.state.lock().unwrap().requests.clear();
    }

    /// Requests made to the batched tracks endpoint.
    pub fn track_requests(&self) -> Vec<url::Url> {
        self.requests()
            .iter()
            .filter_map(|request| url::Url::parse(request).ok())
            .filter(|url| url.path() == "/tracks")
            .collect()
    }

    pub fn discoveries(&self) -> usize {
        self.discoveries.load(Ordering::SeqCst)
    }

    fn record(&self, request: &str) {
        self.state
            .lock()
            .unwrap()
            .requests
            .push(request.to_string());
    }

    fn respond(&self, request: &str) -> Result<Vec<u8>, Error> {
        let state = self.state.lock().unwrap();

        if request == DISCOVERY_PAGE {
            self.discoveries.fetch_add(1, Ordering::SeqCst);
            return Ok(format!(
                r#"<html><head><script crossorigin src="{SCRIPT_URL}"></script></head></html>"#
            )
            .into_bytes());
        }

        if request == SCRIPT_URL {
            let index = self.discoveries.load(Ordering::SeqCst).saturating_sub(1);
            let script = match state.client_ids.get(index).or(state.client_ids.last()) {
                Some(client_id) if !client_id.is_empty() => {
                    format!(r#"e.exports={{client_id:"{client_id}",env:"test"}}"#)
                }
                _ => "e.exports={env:\"test\"}".to_string(),
            };
            return Ok(script.into_bytes());
        }

        let url = url::Url::parse(request).map_err(Error::from)?;
        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
        let base = request.split('?').next().unwrap_or(request);

        if url.path() == "/resolve" {
            let target = query.get("url").cloned().unwrap_or_default();
            return match state.resources.get(&target) {
                Some(resource) => Ok(resource.to_string().into_bytes()),
                None => Err(not_found(request)),
            };
        }

        if url.path() == "/tracks" {
            let mut tracks: Vec<&Value> = query
                .get("ids")
                .map(|ids| ids.split(',').filter_map(|id| id.parse::<u64>().ok()).collect::<Vec<_>>())
                .unwrap_or_default()
                .iter()
                .filter_map(|id| state.tracks.get(id))
                .collect();
            // The real API does not keep the requested order either
            tracks.reverse();
            return Ok(json!(tracks).to_string().into_bytes());
        }

        if url.path() == "/search" {
            return Ok(json!({
                "collection": state.search,
                "total_results": state.search.len(),
                "next_href": null,
            })
            .to_string()
            .into_bytes());
        }

        let segments: Vec<&str> = url.path().trim_matches('/').split('/').collect();
        if let ["users", user_id, listing] = segments.as_slice() {
            let user_id: u64 = user_id.parse().map_err(|_| not_found(request))?;
            let items = match *listing {
                "tracks" => state.user_tracks.get(&user_id),
                "playlists" => state.user_playlists.get(&user_id),
                _ => None,
            }
            .cloned()
            .unwrap_or_default();

            let offset: usize = query
                .get("offset")
                .and_then(|offset| offset.parse().ok())
                .unwrap_or(0);
            let end = (offset + LISTING_PAGE_SIZE).min(items.len());
            let next_href = (end < items.len())
                .then(|| format!("{API}/users/{user_id}/{listing}?offset={end}&limit={LISTING_PAGE_SIZE}"));

            return Ok(json!({
                "collection": items[offset.min(end)..end],
                "next_href": next_href,
            })
            .to_string()
            .into_bytes());
        }

        state
            .bytes
            .get(base)
            .cloned()
            .ok_or_else(|| not_found(request))
    }

    fn redirect(&self, request: &str) -> String {
        self.record(request);
        self.state
            .lock()
            .unwrap()
            .redirects
            .get(request)
            .cloned()
            .unwrap_or_else(|| request.to_string())
    }

    fn completion_delay(&self, request: &str) -> Option<Duration> {
        if request == DISCOVERY_PAGE {
            return self.discovery_delay;
        }
        if !is_track_lookup(request) {
            return None;
        }
        if !self.reverse_completion {
            return self.track_lookup_delay;
        }
        let dispatched = self.track_lookups.fetch_add(1, Ordering::SeqCst) as u64;
        Some(Duration::from_millis(60u64.saturating_sub(dispatched * 20)))
    }

    fn lookup_started(&self, request: &str) {
        if is_track_lookup(request) {
            let open = self.lookups_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_lookups_in_flight.fetch_max(open, Ordering::SeqCst);
        }
    }

    fn lookup_finished(&self, request: &str) {
        if is_track_lookup(request) {
            self.lookups_in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

fn is_track_lookup(request: &str) -> bool {
    request.starts_with(&format!("{API}/tracks"))
}

fn not_found(url: &str) -> Error {
    Error::Status {
        status: 404,
        url: url.to_string(),
    }
}

#[async_trait]
impl soundcloudrs::Transport for FakeSoundcloud {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, Error> {
        self.record(url);
        self.lookup_started(url);
        if let Some(delay) = self.completion_delay(url) {
            tokio::time::sleep(delay).await;
        }
        let response = self.respond(url);
        self.lookup_finished(url);
        response
    }

    async fn canonical_url(&self, url: &str) -> Result<String, Error> {
        Ok(self.redirect(url))
    }
}

impl soundcloudrs::blocking::Transport for FakeSoundcloud {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, Error> {
        self.record(url);
        self.lookup_started(url);
        if let Some(delay) = self.completion_delay(url) {
            std::thread::sleep(delay);
        }
        let response = self.respond(url);
        self.lookup_finished(url);
        response
    }

    fn canonical_url(&self, url: &str) -> Result<String, Error> {
        Ok(self.redirect(url))
    }
}

/// Tags recorded by [`RecordingTagWriter`].
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenTags {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub track_number: Option<u32>,
    pub cover_art: Option<Vec<u8>>,
}

/// Appends a marker instead of real ID3 frames and remembers what it was given.
#[derive(Clone, Default)]
pub struct RecordingTagWriter {
    pub written: Arc<Mutex<Vec<WrittenTags>>>,
}

pub const TAG_MARKER: &[u8] = b"|TAGGED";

impl TagWriter for RecordingTagWriter {
    fn write_tags(
        &self,
        audio: &mut Cursor<Vec<u8>>,
        tags: &TrackTags<'_>,
        cover_art: Option<&[u8]>,
    ) -> Result<(), Error> {
        audio.seek(SeekFrom::End(0)).unwrap();
        audio.write_all(TAG_MARKER).unwrap();
        self.written.lock().unwrap().push(WrittenTags {
            title: tags.title.to_string(),
            artist: tags.artist.to_string(),
            album: tags.album.map(str::to_string),
            track_number: tags.track_number,
            cover_art: cover_art.map(<[u8]>::to_vec),
        });
        Ok(())
    }
}

pub fn progressive_url(track_id: u64) -> String {
    format!("{API}/media/soundcloud:tracks:{track_id}/stream/progressive")
}

pub fn media_url(track_id: u64) -> String {
    format!("https://cf-media.sndcdn.com/{track_id}.128.mp3")
}

pub fn artwork_url(track_id: u64) -> String {
    format!("https://i1.sndcdn.com/artworks-{track_id}-large.jpg")
}

pub fn large_artwork_url(track_id: u64) -> String {
    format!("https://i1.sndcdn.com/artworks-{track_id}-t500x500.jpg")
}

/// A complete track record as returned by the API.
pub fn track_json(id: u64, title: &str) -> Value {
    json!({
        "id": id,
        "kind": "track",
        "title": title,
        "user_id": 900,
        "user": {"id": 900, "username": "uploader", "permalink": "uploader"},
        "duration": 180000,
        "full_duration": 180000,
        "artwork_url": artwork_url(id),
        "permalink_url": format!("https://soundcloud.com/uploader/track-{id}"),
        "track_authorization": format!("auth-{id}"),
        "media": {"transcodings": [
            {
                "url": format!("{API}/media/soundcloud:tracks:{id}/stream/hls"),
                "preset": "mp3_0_0",
                "snipped": false,
                "format": {"protocol": "hls", "mime_type": "audio/mpeg"},
                "quality": "sq",
            },
            {
                "url": progressive_url(id),
                "preset": "mp3_0_0",
                "snipped": false,
                "format": {"protocol": "progressive", "mime_type": "audio/mpeg"},
                "quality": "sq",
            },
        ]},
    })
}

/// A track record offering HLS only.
pub fn hls_only_track_json(id: u64, title: &str) -> Value {
    let mut track = track_json(id, title);
    track["media"]["transcodings"] = json!([{
        "url": format!("{API}/media/soundcloud:tracks:{id}/stream/hls"),
        "format": {"protocol": "hls", "mime_type": "audio/mpeg"},
    }]);
    track
}

/// The stub SoundCloud sends for tracks past the first few of a playlist.
pub fn stub_json(id: u64) -> Value {
    json!({
        "id": id,
        "kind": "track",
        "monetization_model": "NOT_APPLICABLE",
        "policy": "ALLOW",
    })
}

pub fn playlist_json(id: u64, tracks: Vec<Value>) -> Value {
    json!({
        "id": id,
        "kind": "playlist",
        "title": format!("playlist {id}"),
        "user_id": 900,
        "track_count": tracks.len(),
        "tracks": tracks,
    })
}

pub fn user_json(id: u64, username: &str) -> Value {
    json!({
        "id": id,
        "kind": "user",
        "username": username,
        "permalink": username,
        "permalink_url": format!("https://soundcloud.com/{username}"),
    })
}

/// Register complete records for `ids` and return them as listing entries:
/// the first `hydrated` in full, the rest as stubs.
pub fn listing(fake: &FakeSoundcloud, ids: &[u64], hydrated: usize) -> Vec<Value> {
    ids.iter()
        .enumerate()
        .map(|(position, &id)| {
            let track = track_json(id, &format!("artist {id} - song {id}"));
            fake.add_track(track.clone());
            if position < hydrated {
                track
            } else {
                stub_json(id)
            }
        })
        .collect()
}

pub fn client(fake: &FakeSoundcloud) -> soundcloudrs::SoundcloudClient {
    soundcloudrs::SoundcloudClient::new().with_transport(fake.clone())
}

pub fn blocking_client(fake: &FakeSoundcloud) -> soundcloudrs::blocking::SoundcloudClient {
    soundcloudrs::blocking::SoundcloudClient::new().with_transport(fake.clone())
}
