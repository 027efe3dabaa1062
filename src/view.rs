//! Pure presentation helpers: everything the UI shows is derived here

use std::time::{Duration, Instant};

use crate::models::*;
use crate::state::{PanelState, UploadState};
use crate::upload::UploadProgress;

/// Quick-select display durations in seconds
pub const DURATION_PRESETS: [u32; 6] = [5, 7, 10, 15, 30, 60];

pub const TOAST_ENTER: Duration = Duration::from_millis(100);
pub const TOAST_VISIBLE: Duration = Duration::from_millis(3000);
pub const TOAST_EXIT: Duration = Duration::from_millis(300);
pub const TOAST_LIFETIME: Duration = Duration::from_millis(3300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    Warning,
    Info,
}

impl ToastKind {
    pub fn icon(&self) -> &'static str {
        match self {
            ToastKind::Success => "✔",
            ToastKind::Error => "✖",
            ToastKind::Warning => "⚠",
            ToastKind::Info => "ℹ",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub id: u64,
    pub kind: ToastKind,
    pub text: String,
    pub created: Instant,
}

impl Toast {
    pub fn new(id: u64, kind: ToastKind, text: String, created: Instant) -> Self {
        Self { id, kind, text, created }
    }

    /// Fades in over the first 100 ms, out during the last 300 ms
    pub fn opacity(&self, now: Instant) -> f32 {
        let age = now.saturating_duration_since(self.created);
        if age < TOAST_ENTER {
            age.as_secs_f32() / TOAST_ENTER.as_secs_f32()
        } else if age < TOAST_VISIBLE {
            1.0
        } else if age < TOAST_LIFETIME {
            1.0 - (age - TOAST_VISIBLE).as_secs_f32() / TOAST_EXIT.as_secs_f32()
        } else {
            0.0
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created) >= TOAST_LIFETIME
    }
}

/// Human readable size with binary prefixes, e.g. `1.5 MB`
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let formatted = format!("{:.2}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}

pub fn format_duration(seconds: u32) -> String {
    format!("{}s", seconds)
}

/// One playlist row as drawn in the central panel
#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    pub id: i64,
    pub index: usize,
    pub position: usize,
    pub filename: String,
    pub kind: MediaKind,
    pub duration_text: String,
    pub size_text: String,
    pub is_current: bool,
    pub is_active: bool,
}

pub fn rows(state: &PanelState) -> Vec<RowView> {
    let current = state.current_id();
    let mut items: Vec<&ContentItem> = state.items.iter().collect();
    items.sort_by_key(|i| i.order);
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| RowView {
            id: item.id,
            index,
            position: index + 1,
            filename: item.filename.clone(),
            kind: item.kind,
            duration_text: format_duration(item.effective_duration()),
            size_text: item.size.map(format_file_size).unwrap_or_else(|| "-".to_string()),
            is_current: current == Some(item.id),
            is_active: item.is_active,
        })
        .collect()
}

pub fn status_text(state: &PanelState) -> String {
    if state.start_pending {
        return "Starting...".to_string();
    }
    if state.stop_pending {
        return "Stopping...".to_string();
    }
    match (&state.playback.status, &state.playback.current_item) {
        (PlaybackStatus::Playing, Some(item)) => format!("Playing: {}", item.filename),
        (PlaybackStatus::Playing, None) => "Playing".to_string(),
        (PlaybackStatus::Stopped, _) => "Stopped".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NowPlaying {
    pub title: String,
    pub detail: String,
    pub active: bool,
}

pub fn now_playing(state: &PanelState) -> NowPlaying {
    match (&state.playback.status, &state.playback.current_item) {
        (PlaybackStatus::Playing, Some(item)) => NowPlaying {
            title: item.filename.clone(),
            detail: format!("{} {} · {}", item.kind.icon(), item.kind.label(), format_duration(item.effective_duration())),
            active: true,
        },
        (PlaybackStatus::Playing, None) => NowPlaying {
            title: "Waiting for first item".to_string(),
            detail: String::new(),
            active: true,
        },
        (PlaybackStatus::Stopped, _) => NowPlaying {
            title: "Nothing playing".to_string(),
            detail: "Press Start to begin the playlist".to_string(),
            active: false,
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Controls {
    pub start_enabled: bool,
    pub stop_enabled: bool,
    pub clear_enabled: bool,
    pub fix_enabled: bool,
    pub start_label: &'static str,
    pub stop_label: &'static str,
}

pub fn controls(state: &PanelState) -> Controls {
    Controls {
        start_enabled: state.can_start(),
        stop_enabled: state.can_stop(),
        clear_enabled: !state.items.is_empty() && !state.clear_pending,
        fix_enabled: !state.fix_pending && state.items.iter().any(|i| i.kind == MediaKind::Video),
        start_label: if state.start_pending { "⏳ Starting" } else { "▶ Start" },
        stop_label: if state.stop_pending { "⏳ Stopping" } else { "⏹ Stop" },
    }
}

pub fn connection_label(connected: bool) -> &'static str {
    if connected { "● Connected" } else { "○ Disconnected" }
}

fn usage_line(label: &str, usage: &Usage) -> String {
    match usage {
        Usage::Percent(p) => format!("{}: {:.1}%", label, p),
        Usage::Detailed { percent, used_gb, total_gb, .. } if *total_gb > 0.0 => {
            format!("{}: {:.1}% ({:.1} / {:.1} GB)", label, percent, used_gb, total_gb)
        }
        Usage::Detailed { .. } => format!("{}: {:.1}%", label, usage.percent()),
    }
}

/// Host metrics as text lines for the side panel
pub fn system_lines(info: &SystemInfo) -> Vec<String> {
    let mut lines = vec![format!("CPU: {:.1}%", info.cpu)];
    if let Some(memory) = &info.memory {
        lines.push(usage_line("RAM", memory));
    }
    if let Some(disk) = &info.disk {
        lines.push(usage_line("Disk", disk));
        if let Usage::Detailed { free_gb, sd_card_size, .. } = disk {
            lines.push(format!("Free: {:.1} GB", free_gb));
            if let Some(card) = sd_card_size {
                lines.push(format!("SD card: {}", card));
            }
        }
    }
    lines
}

pub fn active_preset(value: u32) -> Option<u32> {
    DURATION_PRESETS.iter().copied().find(|p| *p == value)
}

pub fn upload_button_label(upload: &UploadState) -> String {
    match (&upload.progress, upload.files.len()) {
        (UploadProgress::Uploading { .. }, _) => {
            let percent = upload.progress.fraction().unwrap_or(0.0) * 100.0;
            format!("Uploading... {:.0}%", percent)
        }
        (_, 0) => "Select files to upload".to_string(),
        (_, 1) => "⬆ Upload file".to_string(),
        (_, n) => format!("⬆ Upload {} files", n),
    }
}

pub fn progress_text(progress: &UploadProgress) -> Option<String> {
    match progress {
        UploadProgress::Idle => None,
        UploadProgress::Uploading { sent, total } => Some(format!(
            "{} / {}",
            format_file_size(*sent),
            format_file_size(*total)
        )),
        UploadProgress::Completed { .. } => Some("Upload complete".to_string()),
    }
}

/// Label/value pairs shown in the delete confirmation dialog
pub fn delete_summary(item: &ContentItem) -> Vec<(&'static str, String)> {
    vec![
        ("Type", item.kind.label().to_string()),
        ("File", item.filename.clone()),
        ("Duration", format!("{} seconds", item.effective_duration())),
        ("Size", item.size.map(format_file_size).unwrap_or_else(|| "unknown".to_string())),
    ]
}

pub fn clock_text(now: &chrono::DateTime<chrono::Local>) -> String {
    now.format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, order: u32) -> ContentItem {
        ContentItem {
            id,
            filename: format!("item{}.png", id),
            kind: MediaKind::Image,
            duration: None,
            order,
            size: Some(1536),
            is_active: id != 2,
        }
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024 + 1024 * 1024 / 4), "5.25 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024), "3 GB");
        assert_eq!(format_file_size(2 * 1024u64.pow(4)), "2 TB");
    }

    #[test]
    fn test_rows_sorted_with_markers() {
        let mut state = PanelState::new("belediye", 7);
        state.items = vec![item(3, 2), item(1, 0), item(2, 1)];
        state.playback = PlaybackState { status: PlaybackStatus::Playing, current_item: Some(item(2, 1)) };

        let rows = rows(&state);
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(rows[1].position, 2);
        assert!(rows[1].is_current);
        assert!(!rows[1].is_active);
        assert_eq!(rows[0].duration_text, "7s");
        assert_eq!(rows[0].size_text, "1.5 KB");
    }

    #[test]
    fn test_status_and_now_playing() {
        let mut state = PanelState::new("belediye", 7);
        assert_eq!(status_text(&state), "Stopped");
        assert!(!now_playing(&state).active);

        state.playback = PlaybackState { status: PlaybackStatus::Playing, current_item: Some(item(3, 0)) };
        assert_eq!(status_text(&state), "Playing: item3.png");
        assert_eq!(now_playing(&state).title, "item3.png");
    }

    #[test]
    fn test_controls() {
        let mut state = PanelState::new("belediye", 7);
        let c = controls(&state);
        assert!(!c.start_enabled && !c.stop_enabled && !c.clear_enabled);

        state.items = vec![item(1, 0)];
        let c = controls(&state);
        assert!(c.start_enabled && c.clear_enabled && !c.fix_enabled);
    }

    #[test]
    fn test_toast_lifecycle() {
        let start = Instant::now();
        let toast = Toast::new(1, ToastKind::Success, "Saved".to_string(), start);
        assert!(toast.opacity(start + Duration::from_millis(50)) < 1.0);
        assert_eq!(toast.opacity(start + Duration::from_millis(1500)), 1.0);
        let fading = toast.opacity(start + Duration::from_millis(3150));
        assert!(fading > 0.0 && fading < 1.0);
        assert!(!toast.is_expired(start + Duration::from_millis(3299)));
        assert!(toast.is_expired(start + TOAST_LIFETIME));
    }

    #[test]
    fn test_system_lines() {
        let info = SystemInfo {
            cpu: 12.34,
            memory: Some(Usage::Percent(40.0)),
            disk: Some(Usage::Detailed {
                percent: 20.0,
                used_gb: 5.8,
                total_gb: 29.0,
                free_gb: 23.2,
                sd_card_size: Some("32 GB".to_string()),
            }),
            timestamp: None,
        };
        assert_eq!(
            system_lines(&info),
            vec!["CPU: 12.3%", "RAM: 40.0%", "Disk: 20.0% (5.8 / 29.0 GB)", "Free: 23.2 GB", "SD card: 32 GB"]
        );
    }

    #[test]
    fn test_presets_and_summary() {
        assert_eq!(active_preset(10), Some(10));
        assert_eq!(active_preset(11), None);

        let summary = delete_summary(&item(4, 0));
        assert_eq!(summary[2], ("Duration", "7 seconds".to_string()));
        assert_eq!(summary[3], ("Size", "1.5 KB".to_string()));
    }
}
