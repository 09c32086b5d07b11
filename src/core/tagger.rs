//! Audio tag extraction for uploaded files

use std::path::Path;

use anyhow::{Context, Result};
use lofty::{Accessor, AudioFile, ItemKey, Probe, TaggedFileExt};

/// Metadata pulled out of an audio file's tags
#[derive(Debug, Default, Clone)]
pub struct ExtractedTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i64>,
    pub track_number: Option<i64>,
    /// Seconds, from the audio properties rather than the tags
    pub duration: Option<i64>,
}

/// Read the tags of an audio file. Missing or unreadable tags yield `None`
/// fields rather than an error; only an unreadable file itself fails.
pub fn extract(path: &Path) -> Result<ExtractedTags> {
    let tagged = Probe::open(path)
        .with_context(|| format!("Failed to open audio file {}", path.display()))?
        .read()
        .with_context(|| format!("Failed to parse audio file {}", path.display()))?;

    let duration = tagged.properties().duration().as_secs();
    let mut tags = ExtractedTags {
        duration: (duration > 0).then_some(duration as i64),
        ..Default::default()
    };

    if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
        tags.title = tag.title().map(|s| s.to_string());
        tags.artist = tag.artist().map(|s| s.to_string());
        tags.album = tag.album().map(|s| s.to_string());
        tags.genre = tag.genre().map(|s| s.to_string());

        tags.year = tag.year().map(i64::from).or_else(|| {
            tag.get_string(&ItemKey::RecordingDate)
                .and_then(parse_year)
        });
        tags.track_number = tag.track().map(i64::from).or_else(|| {
            tag.get_string(&ItemKey::TrackNumber)
                .and_then(parse_track_number)
        });
    }

    Ok(tags)
}

/// Pull the track number out of a tag value, handling the "N/M" form some
/// encoders write.
pub fn parse_track_number(raw: &str) -> Option<i64> {
    let head = raw.split('/').next()?.trim();
    head.parse().ok().filter(|n| *n > 0)
}

/// Find a four-digit year in a date tag value such as "2023-05-01" or "2023"
pub fn parse_year(raw: &str) -> Option<i64> {
    let bytes = raw.as_bytes();
    let mut start = None;
    for (i, b) in bytes.iter().enumerate() {
        if b.is_ascii_digit() {
            if start.is_none() {
                start = Some(i);
            }
            if i - start? == 3 {
                return raw[start?..=i].parse().ok();
            }
        } else {
            start = None;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_track_number() {
        assert_eq!(parse_track_number("3"), Some(3));
        assert_eq!(parse_track_number("3/12"), Some(3));
        assert_eq!(parse_track_number(" 7 / 10"), Some(7));
        assert_eq!(parse_track_number("0"), None);
        assert_eq!(parse_track_number("abc"), None);
        assert_eq!(parse_track_number(""), None);
    }

    #[test]
    fn test_garbage_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not_audio.mp3");
        std::fs::write(&path, b"definitely not an mpeg stream").unwrap();
        assert!(extract(&path).is_err());
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("2023"), Some(2023));
        assert_eq!(parse_year("2023-05-01"), Some(2023));
        assert_eq!(parse_year("released 1987"), Some(1987));
        assert_eq!(parse_year("99"), None);
        assert_eq!(parse_year("no digits"), None);
    }
}
