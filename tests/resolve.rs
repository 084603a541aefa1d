//! Tests for resolving URLs and ids into entities.

mod common;

use common::*;
use serde_json::json;
use soundcloudrs::{Error, Kind, Resource};

const TRACK_URL: &str = "https://soundcloud.com/mt-marcy/cold-nights";
const PLAYLIST_URL: &str = "https://soundcloud.com/mt-marcy/sets/cold-nights";
const USER_URL: &str = "https://soundcloud.com/mt-marcy";

#[tokio::test]
async fn test_resolve_track_url() {
    let fake = FakeSoundcloud::new();
    fake.add_resource(TRACK_URL, track_json(1, "mt. marcy - cold nights"));
    let client = client(&fake);

    let track = client.resolve_track(TRACK_URL).await.unwrap();

    assert_eq!(track.id, 1);
    assert_eq!(track.artist, "mt. marcy");
    assert_eq!(track.title, "cold nights");
    assert!(!track.is_ready());
}

#[tokio::test]
async fn test_resolved_playlist_is_reconciled() {
    let fake = FakeSoundcloud::new();
    let tracks = listing(&fake, &[1, 2, 3, 4, 5], 2);
    fake.add_resource(PLAYLIST_URL, playlist_json(9, tracks));
    let client = client(&fake);

    let playlist = client.resolve_playlist(PLAYLIST_URL).await.unwrap();

    assert!(playlist.is_ready());
    assert_eq!(playlist.len(), playlist.tracks.len());
    assert!(playlist.tracks.iter().all(|entry| !entry.is_stub()));
}

#[tokio::test]
async fn test_system_playlist_resolves_as_playlist() {
    let fake = FakeSoundcloud::new();
    let tracks = listing(&fake, &[1, 2], 0);
    fake.add_resource(
        "https://soundcloud.com/discover/sets/artist-stations:127466931",
        json!({
            "id": "soundcloud:system-playlists:artist-stations:127466931",
            "kind": "system-playlist",
            "title": "Based on mt. marcy",
            "tracks": tracks,
        }),
    );
    let client = client(&fake);

    let resource = client
        .resolve("https://soundcloud.com/discover/sets/artist-stations:127466931")
        .await
        .unwrap();

    assert_eq!(resource.kind(), Kind::SystemPlaylist);
    let playlist = resource.into_playlist().unwrap();
    assert_eq!(playlist.hydrated_tracks().count(), 2);
}

#[tokio::test]
async fn test_resolved_user_is_reconciled() {
    let fake = FakeSoundcloud::new();
    fake.add_resource(USER_URL, user_json(77, "mt-marcy"));
    fake.set_user_tracks(77, listing(&fake, &[1, 2, 3], 0));
    fake.set_user_playlists(77, vec![playlist_json(5, listing(&fake, &[4], 0))]);
    let client = client(&fake);

    let user = client.resolve_user(USER_URL).await.unwrap();

    assert!(user.is_ready());
    assert_eq!(user.hydrated_tracks().count(), 3);
    assert_eq!(user.playlists[0].hydrated_tracks().count(), 1);
}

#[tokio::test]
async fn test_unknown_kind_fails_without_further_requests() {
    let fake = FakeSoundcloud::new();
    fake.add_resource(
        PLAYLIST_URL,
        json!({"id": 1, "kind": "station", "tracks": [{"id": 2}]}),
    );
    let client = client(&fake);

    let result = client.resolve(PLAYLIST_URL).await;

    match result {
        Err(Error::UnresolvedKind(kind)) => assert_eq!(kind, "station"),
        other => panic!("unexpected result: {other:?}"),
    }
    let last = fake.requests().pop().unwrap();
    assert!(last.starts_with(&format!("{API}/resolve?")));
    assert!(fake.track_requests().is_empty());
}

#[tokio::test]
async fn test_short_link_is_canonicalized_first() {
    let fake = FakeSoundcloud::new();
    fake.add_redirect("https://on.soundcloud.com/xYz12", TRACK_URL);
    fake.add_resource(TRACK_URL, track_json(1, "cold nights"));
    let client = client(&fake);

    let track = client
        .resolve_track("https://on.soundcloud.com/xYz12")
        .await
        .unwrap();

    assert_eq!(track.id, 1);
    assert_eq!(fake.requests()[0], "https://on.soundcloud.com/xYz12");
}

#[tokio::test]
async fn test_canonical_url_is_not_redirected() {
    let fake = FakeSoundcloud::new();
    fake.add_resource(TRACK_URL, track_json(1, "cold nights"));
    let client = client(&fake);

    client.resolve(TRACK_URL).await.unwrap();

    assert!(!fake.requests().iter().any(|request| request == TRACK_URL));
}

#[tokio::test]
async fn test_numeric_id_is_looked_up_as_track() {
    let fake = FakeSoundcloud::new();
    fake.add_track(track_json(222820656, "mt. marcy - cold nights"));
    let client = client(&fake);

    let resource = client.resolve("222820656").await.unwrap();

    assert!(matches!(&resource, Resource::Track(track) if track.title == "cold nights"));
    assert_eq!(fake.track_requests().len(), 1);
}

#[tokio::test]
async fn test_expected_kind_is_enforced() {
    let fake = FakeSoundcloud::new();
    fake.add_resource(TRACK_URL, track_json(1, "cold nights"));
    let client = client(&fake);

    assert!(matches!(
        client.resolve_playlist(TRACK_URL).await,
        Err(Error::UnexpectedKind {
            expected: Kind::Playlist,
            found: Kind::Track
        })
    ));
}

#[tokio::test]
async fn test_unknown_url_is_a_transport_error() {
    let fake = FakeSoundcloud::new();
    let client = client(&fake);

    assert!(matches!(
        client.resolve("https://soundcloud.com/nobody/nothing").await,
        Err(Error::Status { status: 404, .. })
    ));
}
