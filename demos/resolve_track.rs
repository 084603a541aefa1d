//! Resolve example demonstrating how to look up tracks.
//!
//! This example shows how to:
//! - Resolve a track URL (short links work too)
//! - Look up several tracks by id at once
//! - Inspect the available transcodings
//!
//! Run with `RUST_LOG=soundcloudrs=debug` to see the requests being made.

use soundcloudrs::{Resource, SoundcloudClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://soundcloud.com/nittigritti/lights-nitti-gritti-remix-1".to_string());

    // The client id is scraped from the web player on first use
    let client = SoundcloudClient::new();

    println!("Resolving {}...", url);
    match client.resolve(&url).await? {
        Resource::Track(track) => {
            println!("Track: {} by {}", track.title, track.artist);
            println!("  ID: {}", track.id);
            println!("  Uploader: {}", track.user.username);
            if let Some(duration) = track.duration {
                println!("  Duration: {} seconds", duration / 1000);
            }

            if let Some(media) = &track.media {
                println!("  Transcodings:");
                for transcoding in &media.transcodings {
                    println!(
                        "    - {} ({})",
                        transcoding.format.protocol, transcoding.format.mime_type
                    );
                }
            }

            match client.stream_url(&track).await {
                Ok(stream_url) => println!("  Stream URL: {}", stream_url),
                Err(e) => println!("  No stream available: {}", e),
            }
        }
        other => {
            println!("{} is a {}, not a track", url, other.kind());
            return Ok(());
        }
    }

    // Batched lookups keep the order of the ids
    let ids = [222820656, 1860005124, 289589592, 268448230];
    println!("\nLooking up {} tracks by id...", ids.len());
    for track in client.tracks(&ids).await? {
        println!("  - {} - {} (ID: {})", track.artist, track.title, track.id);
    }

    Ok(())
}
