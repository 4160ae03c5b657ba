use serde::{Deserialize, Serialize};

/// Commands accepted by the player core, from the HTTP API or any other front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum Command {
    /// Switch the active media.  `None` (or an empty string) detaches.
    Open { url: Option<String> },
    SetPlayIntent { playing: bool },
    Seek { seconds: f64 },
    Volume { value: f32 },
}

/// One `[start, end)` interval of media the engine holds locally, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BufferedSegment {
    pub start: f64,
    pub end: f64,
}

impl BufferedSegment {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> f64 {
        self.end - self.start
    }
}

/// Canonical, coalesced view of the playback resource.
///
/// Rebuilt from scratch on every URL change.  `can_play` only ever flips
/// false → true within one attach cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackStatus {
    pub playing: bool,
    /// `None` until the engine knows the media length.
    pub duration: Option<f64>,
    pub current_time: f64,
    /// Ascending, non-overlapping.
    pub buffered: Vec<BufferedSegment>,
    pub can_play: bool,
    /// 0.0 ..= 1.0
    pub volume: f32,
}

impl PlaybackStatus {
    /// Fresh status for a new attach cycle (or for no media at all).
    pub fn detached(volume: f32) -> Self {
        Self {
            playing: false,
            duration: None,
            current_time: 0.0,
            buffered: Vec::new(),
            can_play: false,
            volume,
        }
    }

    /// Clamp a position into `[0, duration]` (only the lower bound while duration is unknown).
    pub fn clamp_time(&self, secs: f64) -> f64 {
        let secs = if secs.is_finite() { secs.max(0.0) } else { 0.0 };
        match self.duration {
            Some(d) => secs.min(d),
            None => secs,
        }
    }
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        Self::detached(1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    Buffered,
    Gap,
}

/// Renderable piece of the seek bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub kind: SpanKind,
    pub length: f64,
}

impl Span {
    pub fn buffered(length: f64) -> Self {
        Self {
            kind: SpanKind::Buffered,
            length,
        }
    }

    pub fn gap(length: f64) -> Self {
        Self {
            kind: SpanKind::Gap,
            length,
        }
    }
}

/// What the player publishes to front ends after every processed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlayerSnapshot {
    pub url: Option<String>,
    pub play_intent: bool,
    pub status: PlaybackStatus,
    pub spans: Vec<Span>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cast {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Podcast {
    pub name: String,
    pub slug: String,
    pub feed_url: String,
    pub casts: Vec<Cast>,
    /// Channel artwork, when the feed declares one.
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Lowercase ASCII slug: alphanumerics kept, every other run collapsed to one `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_format() {
        let json = serde_json::to_string(&Command::Seek { seconds: 12.5 }).unwrap();
        assert_eq!(json, r#"{"cmd":"Seek","seconds":12.5}"#);

        let cmd: Command = serde_json::from_str(r#"{"cmd":"Open","url":null}"#).unwrap();
        assert_eq!(cmd, Command::Open { url: None });
    }

    #[test]
    fn test_detached_status() {
        let status = PlaybackStatus::detached(0.3);
        assert!(!status.can_play);
        assert!(!status.playing);
        assert_eq!(status.duration, None);
        assert_eq!(status.volume, 0.3);
    }

    #[test]
    fn test_clamp_time() {
        let mut status = PlaybackStatus::default();
        assert_eq!(status.clamp_time(-3.0), 0.0);
        assert_eq!(status.clamp_time(42.0), 42.0);
        assert_eq!(status.clamp_time(f64::NAN), 0.0);
        status.duration = Some(30.0);
        assert_eq!(status.clamp_time(42.0), 30.0);
    }

    #[test]
    fn test_span_kind_serializes_lowercase() {
        let json = serde_json::to_string(&Span::gap(3.0)).unwrap();
        assert_eq!(json, r#"{"kind":"gap","length":3.0}"#);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("The Changelog: Software & More"), "the-changelog-software-more");
        assert_eq!(slugify("  99% Invisible "), "99-invisible");
        assert_eq!(slugify("---"), "");
    }
}
