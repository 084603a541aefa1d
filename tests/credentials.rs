//! Tests for client id discovery and refresh.

mod common;

use common::*;
use soundcloudrs::{ClientIdScraper, Error, SoundcloudClient};
use std::time::Duration;

#[tokio::test]
async fn test_client_id_is_discovered_once_and_reused() {
    let fake = FakeSoundcloud::new();
    fake.add_track(track_json(1, "a - b"));
    let client = client(&fake);
    assert!(client.get_credentials().is_none());

    client.track(1).await.unwrap();
    client.track(1).await.unwrap();

    assert_eq!(fake.discoveries(), 1);
    assert_eq!(client.client_id().await.unwrap(), CLIENT_ID);
    assert!(
        fake.track_requests()
            .iter()
            .all(|url| url.query().unwrap().contains(&format!("client_id={CLIENT_ID}")))
    );
}

#[tokio::test]
async fn test_concurrent_callers_share_one_discovery() {
    let fake = FakeSoundcloud::new();
    let client = client(&fake);

    let ids = futures::future::try_join_all((0..8).map(|_| client.client_id()))
        .await
        .unwrap();

    assert!(ids.iter().all(|id| id == CLIENT_ID));
    assert_eq!(fake.discoveries(), 1);
}

#[tokio::test]
async fn test_expired_client_id_is_refreshed() {
    let fake = FakeSoundcloud::new().with_client_ids(&["firstClientId", "secondClientId"]);
    let client = client(&fake).with_credential_ttl(Duration::ZERO);

    assert_eq!(client.client_id().await.unwrap(), "firstClientId");
    assert!(client.get_credentials().unwrap().is_expired());
    assert_eq!(client.client_id().await.unwrap(), "secondClientId");
    assert_eq!(fake.discoveries(), 2);
}

#[tokio::test]
async fn test_missing_client_id_is_a_discovery_error() {
    let fake = FakeSoundcloud::new().without_client_id();
    let client = client(&fake);

    assert!(matches!(
        client.client_id().await,
        Err(Error::CredentialDiscovery(_))
    ));
    assert!(client.get_credentials().is_none());
}

#[tokio::test]
async fn test_waiting_caller_retries_after_a_failed_discovery() {
    let fake = FakeSoundcloud::new()
        .with_client_ids(&["", "secondClientId"])
        .with_discovery_delay(Duration::from_millis(30));
    let client = client(&fake);

    let (first, second) = tokio::join!(client.client_id(), client.client_id());

    assert!(matches!(first, Err(Error::CredentialDiscovery(_))));
    assert_eq!(second.unwrap(), "secondClientId");
    assert_eq!(fake.discoveries(), 2);
}

#[tokio::test]
async fn test_waiting_caller_reports_its_own_discovery_error() {
    let fake = FakeSoundcloud::new()
        .without_client_id()
        .with_discovery_delay(Duration::from_millis(30));
    let client = client(&fake);

    let (first, second) = tokio::join!(client.client_id(), client.client_id());

    for result in [first, second] {
        match result {
            Err(Error::CredentialDiscovery(message)) => {
                assert!(message.starts_with("no client id"), "{message}")
            }
            other => panic!("expected a discovery error, got {other:?}"),
        }
    }
    assert_eq!(fake.discoveries(), 2);
}

#[tokio::test]
async fn test_page_without_scripts_is_a_discovery_error() {
    let fake = FakeSoundcloud::new();
    let scraper = ClientIdScraper::with_patterns(r#"<script src="(nowhere)">"#, r"id=(\w+)").unwrap();
    let client = client(&fake).with_credential_provider(scraper);

    assert!(matches!(
        client.client_id().await,
        Err(Error::CredentialDiscovery(_))
    ));
    assert_eq!(fake.requests(), vec![DISCOVERY_PAGE.to_string()]);
}

#[tokio::test]
async fn test_static_client_id_skips_discovery() {
    let fake = FakeSoundcloud::new();
    fake.add_track(track_json(1, "a - b"));
    let client = SoundcloudClient::new()
        .with_transport(fake.clone())
        .with_client_id("staticClientId".to_string());

    client.track(1).await.unwrap();

    assert_eq!(fake.discoveries(), 0);
    assert!(fake.track_requests()[0].query().unwrap().contains("client_id=staticClientId"));
}

#[tokio::test]
async fn test_explicit_refresh_replaces_client_id() {
    let fake = FakeSoundcloud::new().with_client_ids(&["firstClientId", "secondClientId"]);
    let client = client(&fake);

    assert_eq!(client.client_id().await.unwrap(), "firstClientId");
    let refreshed = client.refresh_credentials().await.unwrap();

    assert_eq!(refreshed.client_id, "secondClientId");
    assert_eq!(client.client_id().await.unwrap(), "secondClientId");
}
