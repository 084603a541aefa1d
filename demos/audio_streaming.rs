//! Audio streaming example demonstrating how to stream and play audio.
//!
//! This example shows how to:
//! - Resolve a track
//! - Check that a progressive stream is available
//! - Stream and play the audio while it downloads
//!
//! Note: This example requires the `rodio` crate for audio playback.
//! Add it to your Cargo.toml:
//! [dependencies]
//! rodio = "0.21"

use soundcloudrs::SoundcloudClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://soundcloud.com/mt-marcy/cold-nights".to_string());

    let client = SoundcloudClient::new();

    let track = client.resolve_track(&url).await?;
    println!("Found track: {} by {}", track.title, track.artist);

    match track.progressive_transcoding() {
        Some(transcoding) => {
            println!(
                "Streaming {} ({})",
                transcoding.format.mime_type,
                transcoding.preset.as_deref().unwrap_or("unknown preset")
            );
            if transcoding.snipped == Some(true) {
                println!("  Only a preview is available");
            }
        }
        None => {
            println!("Only HLS is available for this track");
            return Ok(());
        }
    }

    let audio_stream = client.track_stream(&track).await?;

    tokio::task::spawn_blocking(move || {
        let device_output = rodio::stream::OutputStreamBuilder::open_default_stream().unwrap();
        let sink = rodio::Sink::connect_new(device_output.mixer());
        let decoder = rodio::Decoder::new(audio_stream).unwrap();
        sink.append(decoder);
        sink.play();
        sink.sleep_until_end();
    })
    .await?;

    println!("\nAudio streaming example completed!");

    Ok(())
}
