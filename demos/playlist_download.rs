//! Playlist download example demonstrating how to save a playlist as MP3s.
//!
//! This example shows how to:
//! - Resolve a playlist, which hydrates every track in it
//! - Set album and track number tags
//! - Write each track to a file with its cover art
//!
//! Usage: `cargo run --example playlist_download -- <playlist url> [output dir]`

use soundcloudrs::{Error, SoundcloudClient, TrackEntry};
use std::fs::OpenOptions;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let url = args
        .next()
        .unwrap_or_else(|| "https://soundcloud.com/mt-marcy/sets/cold-nights".to_string());
    let output_dir = PathBuf::from(args.next().unwrap_or_else(|| ".".to_string()));

    let client = SoundcloudClient::new();

    println!("Resolving {}...", url);
    let mut playlist = client.resolve_playlist(&url).await?;
    println!("Playlist: {} ({} tracks)", playlist.title, playlist.len());

    let album = playlist.title.clone();
    for (position, entry) in playlist.tracks.iter_mut().enumerate() {
        let TrackEntry::Full(track) = entry else {
            continue;
        };
        track.album = Some(album.clone());
        track.track_no = Some(position as u32 + 1);

        let file_name = format!("{:02} - {} - {}.mp3", position + 1, track.artist, track.title)
            .replace('/', "_");
        let path = output_dir.join(file_name);

        // The file is read back for tagging, so it must be readable too
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        match client.write_mp3_to(track, &mut file).await {
            Ok(()) => println!("  Saved {}", path.display()),
            Err(Error::UnsupportedStreamFormat(id)) => {
                println!("  Skipping track {}: only HLS is available", id);
                std::fs::remove_file(&path)?;
            }
            Err(e) => return Err(e.into()),
        }
    }

    println!("\nPlaylist download completed!");

    Ok(())
}
