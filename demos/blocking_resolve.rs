//! Blocking example demonstrating the client without an async runtime.
//!
//! This example shows how to:
//! - Use `soundcloudrs::blocking::SoundcloudClient`
//! - Resolve a user, which hydrates their uploads and playlists
//! - Tune the number of worker threads used for batched lookups

use soundcloudrs::blocking::SoundcloudClient;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://soundcloud.com/mt-marcy".to_string());

    let client = SoundcloudClient::new().with_max_workers(4);

    println!("Resolving {}...", url);
    let user = client.resolve_user(&url)?;

    println!("User: {} (ID: {})", user.username, user.id);
    if let Some(city) = &user.city {
        println!("  City: {}", city);
    }

    println!("\nUploads ({}):", user.len());
    for track in user.hydrated_tracks() {
        println!("  - {} - {}", track.artist, track.title);
    }

    println!("\nPlaylists ({}):", user.playlists.len());
    for playlist in &user.playlists {
        println!("  {} ({} tracks)", playlist.title, playlist.len());
        for track in playlist.hydrated_tracks() {
            println!("    - {} - {}", track.artist, track.title);
        }
    }

    Ok(())
}
