use crate::Error;
use crate::SoundcloudClient;
use crate::Track;
use lofty::config::WriteOptions;
use lofty::error::LoftyError;
use lofty::io::Truncate;
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::tag::{Accessor, Tag, TagExt, TagType};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};

/// PNG magic bytes for MIME detection.
const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Metadata written into a materialised audio file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackTags<'a> {
    pub title: &'a str,
    pub artist: &'a str,
    pub album: Option<&'a str>,
    pub track_number: Option<u32>,
}

impl Track {
    /// The tags a materialised copy of this track carries.
    pub fn tags(&self) -> TrackTags<'_> {
        TrackTags {
            title: &self.title,
            artist: &self.artist,
            album: self.album.as_deref(),
            track_number: self.track_no,
        }
    }
}

/// Embeds metadata and cover art into audio data.
pub trait TagWriter: Send + Sync {
    /// Tag the audio held in `audio` in place.
    fn write_tags(
        &self,
        audio: &mut Cursor<Vec<u8>>,
        tags: &TrackTags<'_>,
        cover_art: Option<&[u8]>,
    ) -> Result<(), Error>;
}

/// [`TagWriter`] producing ID3v2 frames with `lofty`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Id3TagWriter;

impl TagWriter for Id3TagWriter {
    fn write_tags(
        &self,
        audio: &mut Cursor<Vec<u8>>,
        tags: &TrackTags<'_>,
        cover_art: Option<&[u8]>,
    ) -> Result<(), Error> {
        let mut tag = Tag::new(TagType::Id3v2);
        tag.set_title(tags.title.to_string());
        tag.set_artist(tags.artist.to_string());
        if let Some(album) = tags.album {
            tag.set_album(album.to_string());
        }
        if let Some(track_number) = tags.track_number {
            tag.set_track(track_number);
        }

        if let Some(img_data) = cover_art {
            let pic = Picture::new_unchecked(
                PictureType::CoverFront,
                Some(cover_mime_type(img_data)),
                None,
                img_data.to_vec(),
            );
            tag.push_picture(pic);
        }

        audio.rewind().map_err(|e| Error::Tag(e.to_string()))?;
        tag.save_to(audio, WriteOptions::default())
            .map_err(|e| Error::Tag(e.to_string()))?;

        Ok(())
    }
}

fn cover_mime_type(img_data: &[u8]) -> MimeType {
    if img_data.starts_with(&PNG_MAGIC) {
        MimeType::Png
    } else {
        MimeType::Jpeg
    }
}

fn sink_io(e: std::io::Error) -> Error {
    log::error!("Audio sink must be opened for binary read and write: {}", e);
    Error::InvalidSinkMode(e)
}

fn truncate_sink<S: Truncate + ?Sized>(sink: &mut S, len: u64) -> Result<(), Error> {
    sink.truncate(len).map_err(|e| {
        let e: LoftyError = e.into();
        sink_io(std::io::Error::other(e.to_string()))
    })
}

/// Write `audio` to `sink`, read it back, tag it and store the tagged bytes.
///
/// Anything the sink held beyond the tagged audio is cut off, and the sink
/// is left rewound to its start.
pub(crate) fn write_to_sink<S>(
    sink: &mut S,
    audio: &[u8],
    tags: &TrackTags<'_>,
    cover_art: Option<&[u8]>,
    tag_writer: &dyn TagWriter,
) -> Result<(), Error>
where
    S: Read + Write + Seek + Truncate + ?Sized,
{
    sink.seek(SeekFrom::Start(0)).map_err(sink_io)?;
    sink.write_all(audio).map_err(sink_io)?;
    sink.seek(SeekFrom::Start(0)).map_err(sink_io)?;

    let mut written = vec![0; audio.len()];
    sink.read_exact(&mut written).map_err(sink_io)?;

    let mut tagged = Cursor::new(written);
    tag_writer.write_tags(&mut tagged, tags, cover_art)?;

    sink.seek(SeekFrom::Start(0)).map_err(sink_io)?;
    sink.write_all(tagged.get_ref()).map_err(sink_io)?;
    truncate_sink(sink, tagged.get_ref().len() as u64)?;
    sink.flush().map_err(sink_io)?;
    sink.seek(SeekFrom::Start(0)).map_err(sink_io)?;

    Ok(())
}

impl SoundcloudClient {
    /// Download a track's audio into `sink` and tag it.
    ///
    /// The track's title, artist, album and track number are written along
    /// with its artwork in the configured large size. `sink` must be readable
    /// as well as writable; a file opened for writing only fails with
    /// [`Error::InvalidSinkMode`] once the audio has been written. Whatever
    /// the sink held before is replaced, and it is truncated to the length
    /// of the tagged audio.
    ///
    /// On success the track is marked ready.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example(client: soundcloudrs::SoundcloudClient) -> Result<(), Box<dyn std::error::Error>> {
    /// let mut track = client.resolve_track("https://soundcloud.com/mt-marcy/cold-nights").await?;
    /// track.album = Some("Cold Nights EP".to_string());
    ///
    /// let mut file = std::fs::OpenOptions::new()
    ///     .read(true)
    ///     .write(true)
    ///     .create(true)
    ///     .truncate(true)
    ///     .open("cold-nights.mp3")?;
    /// client.write_mp3_to(&mut track, &mut file).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn write_mp3_to<S>(&self, track: &mut Track, sink: &mut S) -> Result<(), Error>
    where
        S: Read + Write + Seek + Truncate + Send,
    {
        let stream_url = self.stream_url(track).await?;
        let audio = self.transport.fetch(&stream_url).await?;

        let cover_art = match &track.artwork_url {
            Some(artwork_url) => {
                let artwork_url = self.endpoints.large_artwork_url(artwork_url);
                Some(self.transport.fetch(&artwork_url).await?)
            }
            None => None,
        };

        log::debug!(
            "Writing {} bytes of audio for track {}",
            audio.len(),
            track.id
        );

        write_to_sink(
            sink,
            &audio,
            &track.tags(),
            cover_art.as_deref(),
            self.tag_writer.as_ref(),
        )?;

        track.ready = true;
        Ok(())
    }

    /// Download and tag a track's audio in memory.
    pub async fn materialize(&self, track: &mut Track) -> Result<Vec<u8>, Error> {
        let mut buffer = Cursor::new(Vec::new());
        self.write_mp3_to(track, &mut buffer).await?;
        Ok(buffer.into_inner())
    }
}
