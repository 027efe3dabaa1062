//! Data models for the signage panel

use serde::{Deserialize, Serialize};
use std::path::Path;

/// File extensions the signage server accepts, by media kind
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "wmv"];

fn default_true() -> bool { true }

/// Media type of a playlist item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Display duration used when the server did not store one
    pub fn default_duration(&self) -> u32 {
        match self {
            MediaKind::Image => 7,
            MediaKind::Video => 15,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Image => "Image",
            MediaKind::Video => "Video",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            MediaKind::Image => "🖼",
            MediaKind::Video => "🎞",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

/// One entry of a location's playlist, as stored by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: i64,
    pub filename: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub size: Option<u64>,
    // Older content lists predate the flag; absent means active
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl ContentItem {
    pub fn effective_duration(&self) -> u32 {
        match self.duration {
            Some(d) if d > 0 => d,
            _ => self.kind.default_duration(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    Playing,
    #[default]
    Stopped,
}

/// Mirror of the server's playback state for one location
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    pub current_item: Option<ContentItem>,
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        self.status == PlaybackStatus::Playing
    }
}

/// Kind of change announced by a `content_updated` push event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContentAction {
    Sync,
    Upload,
    Delete,
    Reorder,
    DurationUpdate,
    ActiveToggle,
    Clear,
    DurationFix,
    Unknown,
}

impl From<String> for ContentAction {
    fn from(s: String) -> Self {
        match s.as_str() {
            "sync" => ContentAction::Sync,
            "upload" => ContentAction::Upload,
            "delete" => ContentAction::Delete,
            "reorder" => ContentAction::Reorder,
            "duration_update" => ContentAction::DurationUpdate,
            "active_toggle" | "active_update" => ContentAction::ActiveToggle,
            "clear" => ContentAction::Clear,
            "duration_fix" => ContentAction::DurationFix,
            _ => ContentAction::Unknown,
        }
    }
}

impl From<ContentAction> for String {
    fn from(action: ContentAction) -> Self {
        action.as_str().to_string()
    }
}

impl ContentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentAction::Sync => "sync",
            ContentAction::Upload => "upload",
            ContentAction::Delete => "delete",
            ContentAction::Reorder => "reorder",
            ContentAction::DurationUpdate => "duration_update",
            ContentAction::ActiveToggle => "active_toggle",
            ContentAction::Clear => "clear",
            ContentAction::DurationFix => "duration_fix",
            ContentAction::Unknown => "unknown",
        }
    }

    /// Operator-facing description of the change
    pub fn notice(&self) -> &'static str {
        match self {
            ContentAction::Sync => "Playlist synchronized",
            ContentAction::Upload => "New content uploaded",
            ContentAction::Delete => "Content deleted",
            ContentAction::Reorder => "Playlist order changed",
            ContentAction::DurationUpdate => "Display duration changed",
            ContentAction::ActiveToggle => "Content enabled state changed",
            ContentAction::Clear => "Playlist cleared",
            ContentAction::DurationFix => "Video durations corrected",
            ContentAction::Unknown => "Playlist changed",
        }
    }
}

/// Either a single value or a list of them; upload responses use both shapes
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(v) => v,
            OneOrMany::One(t) => vec![t],
        }
    }
}

/// Resource usage as reported by the host; older servers send a bare percent
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Usage {
    Percent(f32),
    Detailed {
        percent: f32,
        #[serde(default)]
        used_gb: f32,
        #[serde(default)]
        total_gb: f32,
        #[serde(default)]
        free_gb: f32,
        #[serde(default)]
        sd_card_size: Option<String>,
    },
}

impl Usage {
    pub fn percent(&self) -> f32 {
        match self {
            Usage::Percent(p) => *p,
            Usage::Detailed { percent, .. } => *percent,
        }
    }
}

/// Host metrics of the player device
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct SystemInfo {
    #[serde(default)]
    pub cpu: f32,
    #[serde(default)]
    pub memory: Option<Usage>,
    #[serde(default)]
    pub disk: Option<Usage>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// `display_status` push payload
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DisplayStatusEvent {
    pub location: String,
    pub status: PlaybackStatus,
    #[serde(default)]
    pub current_item: Option<ContentItem>,
}

/// `content_updated` push payload
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContentUpdatedEvent {
    pub location: String,
    pub action: ContentAction,
    #[serde(default)]
    pub content_list: Option<Vec<ContentItem>>,
    #[serde(default)]
    pub content: Option<OneOrMany<ContentItem>>,
}

/// A display endpoint the panel can manage (persisted in config)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub key: String,
    pub title: String,
}

impl Location {
    pub fn new(key: &str, title: &str) -> Self {
        Self { key: key.to_string(), title: title.to_string() }
    }
}
