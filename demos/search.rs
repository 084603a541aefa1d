//! Search example demonstrating how to search the SoundCloud catalog.
//!
//! This example shows how to:
//! - Search with a limit and offset
//! - Tell tracks, playlists and users apart in the results
//! - Reconcile a playlist found by search

use soundcloudrs::{Resource, SearchQuery, SoundcloudClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::init();

    let client = SoundcloudClient::new();

    let query = SearchQuery::new("mt. marcy").with_limit(10);
    println!("Searching for: {}", query.query);
    let results = client.search(query).await?;

    if let Some(total) = results.total_results {
        println!("{} results in total", total);
    }

    let mut first_playlist = None;
    for resource in results.collection {
        match resource {
            Resource::Track(track) => {
                println!("  Track: {} - {} (ID: {})", track.artist, track.title, track.id)
            }
            Resource::User(user) => println!("  User: {} (ID: {})", user.username, user.id),
            Resource::Playlist(playlist) => {
                println!("  Playlist: {} (ID: {})", playlist.title, playlist.id);
                if first_playlist.is_none() {
                    first_playlist = Some(*playlist);
                }
            }
        }
    }

    // Playlists from search results still contain stubs
    if let Some(mut playlist) = first_playlist {
        println!("\nTracks of {}:", playlist.title);
        for track in client.playlist_tracks(&mut playlist).await? {
            println!("  - {} - {}", track.artist, track.title);
        }
    }

    Ok(())
}
