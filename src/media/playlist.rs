use serde::Serialize;
use uuid::Uuid;

use crate::domain::entities::HymnMedia;

/// One playable recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Track {
    pub id: Uuid,
    pub title: String,
    pub url: String,
    /// Score this recording accompanies, when one is linked.
    pub pdf_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Playlist {
    pub tracks: Vec<Track>,
}

impl Playlist {
    /// Builds the playlist of a hymn in upload order. Untitled recordings
    /// fall back to the hymn title, numbered when there are several.
    pub fn from_media(hymn_title: &str, media: &HymnMedia) -> Self {
        let mut audio: Vec<_> = media.audio.iter().collect();
        audio.sort_by_key(|record| record.created_at);
        let numbered = audio.len() > 1;

        let tracks = audio
            .into_iter()
            .enumerate()
            .map(|(index, record)| {
                let title = match record.title.as_deref().map(str::trim) {
                    Some(title) if !title.is_empty() => title.to_string(),
                    _ if numbered => format!("{hymn_title} ({})", index + 1),
                    _ => hymn_title.to_string(),
                };
                let pdf_url = record.pdf_id.and_then(|pdf_id| {
                    media
                        .pdfs
                        .iter()
                        .find(|pdf| pdf.id == pdf_id)
                        .map(|pdf| pdf.pdf_url.clone())
                });
                Track {
                    id: record.id,
                    title,
                    url: record.audio_url.clone(),
                    pdf_url,
                }
            })
            .collect();

        Self { tracks }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use time::{Duration, OffsetDateTime};

    use super::*;
    use crate::domain::entities::{HymnAudioRecord, HymnPdfRecord};

    fn audio(title: Option<&str>, pdf_id: Option<Uuid>, offset: i64) -> HymnAudioRecord {
        HymnAudioRecord {
            id: Uuid::new_v4(),
            hymn_id: Uuid::nil(),
            pdf_id,
            audio_url: format!("https://cdn.example/{offset}.mp3"),
            title: title.map(str::to_string),
            created_at: OffsetDateTime::UNIX_EPOCH + Duration::seconds(offset),
        }
    }

    #[test]
    fn tracks_follow_upload_order_and_link_scores() {
        let pdf = HymnPdfRecord {
            id: Uuid::new_v4(),
            hymn_id: Uuid::nil(),
            pdf_url: "https://cdn.example/score.pdf".to_string(),
            description: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        let media = HymnMedia {
            pdfs: vec![pdf.clone()],
            audio: vec![audio(None, None, 20), audio(Some("Choir"), Some(pdf.id), 10)],
            videos: Vec::new(),
        };

        let playlist = Playlist::from_media("Adoro Te Devote", &media);

        assert_eq!(playlist.len(), 2);
        assert_eq!(playlist.tracks[0].title, "Choir");
        assert_eq!(playlist.tracks[0].pdf_url.as_deref(), Some(pdf.pdf_url.as_str()));
        assert_eq!(playlist.tracks[1].title, "Adoro Te Devote (2)");
        assert_eq!(playlist.tracks[1].pdf_url, None);
    }

    #[test]
    fn single_untitled_track_uses_hymn_title() {
        let media = HymnMedia {
            audio: vec![audio(Some("  "), None, 0)],
            ..HymnMedia::default()
        };
        let playlist = Playlist::from_media("Veni Creator", &media);
        assert_eq!(playlist.tracks[0].title, "Veni Creator");
    }
}
