//! Panel state and the synchronizer that owns it
//!
//! Every input (operator intent, HTTP result, push event) goes through
//! [`Synchronizer::dispatch`], which mutates [`PanelState`] and returns the
//! side effects the shell must perform. Nothing here touches the network.

use std::path::PathBuf;
use std::time::Instant;

use crate::api::{Ack, ApiResult, ContentSnapshot, UploadOutcome};
use crate::models::*;
use crate::push::PushEvent;
use crate::upload::{SelectedFile, UploadProgress};
use crate::view::{Toast, ToastKind};

pub const MIN_DURATION: u32 = 1;
pub const MAX_DURATION: u32 = 120;

#[derive(Debug, Clone, PartialEq)]
pub enum Dialog {
    ConfirmDelete(ContentItem),
    ConfirmClear,
    EditDuration { item_id: i64, filename: String, value: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadState {
    pub files: Vec<SelectedFile>,
    pub duration: u32,
    pub progress: UploadProgress,
    pub in_flight: bool,
}

impl UploadState {
    fn new(duration: u32) -> Self {
        Self { files: Vec::new(), duration, progress: UploadProgress::Idle, in_flight: false }
    }

    /// Videos take their length from the media itself
    pub fn needs_duration(&self) -> bool {
        self.files.iter().any(|f| f.kind == Some(MediaKind::Image))
    }

    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelState {
    pub location: String,
    /// Sorted by `order`
    pub items: Vec<ContentItem>,
    pub loaded: bool,
    pub playback: PlaybackState,
    pub connected: bool,
    pub start_pending: bool,
    pub stop_pending: bool,
    pub clear_pending: bool,
    pub fix_pending: bool,
    pub dialog: Option<Dialog>,
    pub upload: UploadState,
    pub system: Option<SystemInfo>,
    pub toasts: Vec<Toast>,
    pub default_duration: u32,
    content_generation: u64,
    next_toast_id: u64,
}

impl PanelState {
    pub fn new(location: &str, default_duration: u32) -> Self {
        let default_duration = default_duration.clamp(MIN_DURATION, MAX_DURATION);
        Self {
            location: location.to_string(),
            items: Vec::new(),
            loaded: false,
            playback: PlaybackState::default(),
            connected: false,
            start_pending: false,
            stop_pending: false,
            clear_pending: false,
            fix_pending: false,
            dialog: None,
            upload: UploadState::new(default_duration),
            system: None,
            toasts: Vec::new(),
            default_duration,
            content_generation: 0,
            next_toast_id: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.playback.is_playing()
    }

    /// Playlist may only start when stopped and non-empty
    pub fn can_start(&self) -> bool {
        !self.is_running() && !self.items.is_empty() && !self.start_pending && !self.stop_pending
    }

    pub fn can_stop(&self) -> bool {
        self.is_running() && !self.stop_pending && !self.start_pending
    }

    /// Id of the item on screen right now, if any
    pub fn current_id(&self) -> Option<i64> {
        if self.is_running() {
            self.playback.current_item.as_ref().map(|i| i.id)
        } else {
            None
        }
    }

    pub fn item(&self, id: i64) -> Option<&ContentItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn item_ids(&self) -> Vec<i64> {
        self.items.iter().map(|i| i.id).collect()
    }
}

/// Outbound work for the shell to execute off the UI thread
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    FetchContent { location: String, generation: u64 },
    FetchStatus { location: String },
    Start { location: String },
    Stop { location: String },
    Reorder { location: String, ids: Vec<i64> },
    UpdateDuration { location: String, id: i64, duration: u32 },
    UpdateActive { location: String, id: i64, active: bool },
    Delete { location: String, id: i64, filename: String },
    Clear { location: String },
    FixDurations { location: String },
    Upload { location: String, files: Vec<PathBuf>, duration: Option<u32> },
    SystemInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Request(Request),
    JoinLocation(String),
}

#[derive(Debug)]
pub enum Msg {
    SelectLocation(String),
    Refresh,
    StartDisplay,
    StopDisplay,
    MoveItem { from: usize, to: usize },
    ToggleActive { id: i64, active: bool },
    EditDuration(i64),
    SetDialogDuration(u32),
    SaveDuration,
    RequestDelete(i64),
    ConfirmDelete,
    RequestClear,
    ConfirmClear,
    CancelDialog,
    FixDurations,
    FilesSelected(Vec<SelectedFile>),
    ClearSelection,
    SetUploadDuration(u32),
    StartUpload,
    PollSystem,
    Tick,

    ContentLoaded { location: String, generation: u64, result: ApiResult<ContentSnapshot> },
    StatusLoaded { location: String, result: ApiResult<PlaybackState> },
    StartFinished { location: String, result: ApiResult<Ack> },
    StopFinished { location: String, result: ApiResult<Ack> },
    ReorderFinished { location: String, result: ApiResult<Ack> },
    DurationFinished { location: String, id: i64, duration: u32, result: ApiResult<Ack> },
    ActiveFinished { location: String, id: i64, active: bool, result: ApiResult<Ack> },
    DeleteFinished { location: String, filename: String, result: ApiResult<Ack> },
    ClearFinished { location: String, result: ApiResult<Ack> },
    FixFinished { location: String, result: ApiResult<Ack> },
    UploadProgress { sent: u64, total: u64 },
    UploadFinished { location: String, result: ApiResult<UploadOutcome> },
    SystemLoaded(ApiResult<SystemInfo>),

    Push(PushEvent),
}

pub struct Synchronizer {
    state: PanelState,
}

impl Synchronizer {
    pub fn new(location: &str, default_duration: u32) -> Self {
        Self { state: PanelState::new(location, default_duration) }
    }

    pub fn state(&self) -> &PanelState {
        &self.state
    }

    /// Work to kick off once the window is up
    pub fn initial_effects(&mut self) -> Vec<Effect> {
        vec![self.fetch_content(), self.fetch_status(), Effect::Request(Request::SystemInfo)]
    }

    /// Start over against a new server, keeping the location and the fetch generation
    pub fn reset(&mut self, default_duration: u32) -> Vec<Effect> {
        let toasts = std::mem::take(&mut self.state.toasts);
        let (generation, toast_id) = (self.state.content_generation, self.state.next_toast_id);

        self.state = PanelState::new(&self.state.location, default_duration);
        self.state.toasts = toasts;
        self.state.content_generation = generation;
        self.state.next_toast_id = toast_id;
        self.initial_effects()
    }

    fn fetch_content(&mut self) -> Effect {
        self.state.content_generation += 1;
        Effect::Request(Request::FetchContent {
            location: self.state.location.clone(),
            generation: self.state.content_generation,
        })
    }

    fn fetch_status(&self) -> Effect {
        Effect::Request(Request::FetchStatus { location: self.state.location.clone() })
    }

    /// Local edits make any snapshot requested before them stale
    fn invalidate_fetches(&mut self) {
        self.state.content_generation += 1;
    }

    fn request(&self, build: impl FnOnce(String) -> Request) -> Effect {
        Effect::Request(build(self.state.location.clone()))
    }

    fn toast(&mut self, kind: ToastKind, text: impl Into<String>, now: Instant) {
        self.state.next_toast_id += 1;
        self.state.toasts.push(Toast::new(self.state.next_toast_id, kind, text.into(), now));
    }

    fn is_current(&self, location: &str) -> bool {
        if location == self.state.location {
            true
        } else {
            log::debug!("Discarding result for '{}' while viewing '{}'", location, self.state.location);
            false
        }
    }

    /// Install a fresh playlist; any fetch still in flight is now stale
    fn replace_items(&mut self, mut items: Vec<ContentItem>) {
        items.sort_by_key(|i| i.order);
        self.state.items = items;
        self.state.loaded = true;
        self.invalidate_fetches();

        // The screen cannot be showing something that is no longer in the playlist
        if let Some(id) = self.state.current_id() {
            if self.state.item(id).is_none() {
                log::debug!("Now playing item {} left the playlist", id);
                self.state.playback.current_item = None;
            }
        }

        let dialog_target = match &self.state.dialog {
            Some(Dialog::ConfirmDelete(item)) => Some(item.id),
            Some(Dialog::EditDuration { item_id, .. }) => Some(*item_id),
            _ => None,
        };
        if let Some(id) = dialog_target {
            if self.state.item(id).is_none() {
                self.state.dialog = None;
            }
        }
        if self.state.dialog == Some(Dialog::ConfirmClear) && self.state.items.is_empty() {
            self.state.dialog = None;
        }
    }

    pub fn dispatch(&mut self, msg: Msg, now: Instant) -> Vec<Effect> {
        match msg {
            Msg::SelectLocation(location) => {
                if location == self.state.location {
                    return Vec::new();
                }
                log::info!("Switching to location '{}'", location);
                let upload = self.state.upload.clone();
                let system = self.state.system.take();
                let toasts = std::mem::take(&mut self.state.toasts);
                let (connected, generation, toast_id) =
                    (self.state.connected, self.state.content_generation, self.state.next_toast_id);

                self.state = PanelState::new(&location, self.state.default_duration);
                self.state.upload = upload;
                self.state.system = system;
                self.state.toasts = toasts;
                self.state.connected = connected;
                self.state.content_generation = generation;
                self.state.next_toast_id = toast_id;

                vec![Effect::JoinLocation(location), self.fetch_content(), self.fetch_status()]
            }

            Msg::Refresh => vec![self.fetch_content(), self.fetch_status()],

            Msg::StartDisplay => {
                if self.state.items.is_empty() {
                    self.toast(ToastKind::Warning, "Playlist is empty, upload content first", now);
                    return Vec::new();
                }
                if !self.state.can_start() {
                    return Vec::new();
                }
                self.state.start_pending = true;
                vec![self.request(|location| Request::Start { location })]
            }

            Msg::StopDisplay => {
                if !self.state.can_stop() {
                    return Vec::new();
                }
                self.state.stop_pending = true;
                vec![self.request(|location| Request::Stop { location })]
            }

            Msg::MoveItem { from, to } => {
                let len = self.state.items.len();
                if from >= len || to >= len || from == to {
                    return Vec::new();
                }
                let item = self.state.items.remove(from);
                self.state.items.insert(to, item);
                for (rank, item) in self.state.items.iter_mut().enumerate() {
                    item.order = rank as u32;
                }
                self.invalidate_fetches();
                let ids = self.state.item_ids();
                vec![self.request(|location| Request::Reorder { location, ids })]
            }

            Msg::ToggleActive { id, active } => {
                let Some(item) = self.state.items.iter_mut().find(|i| i.id == id) else {
                    return Vec::new();
                };
                item.is_active = active;
                self.invalidate_fetches();
                vec![self.request(|location| Request::UpdateActive { location, id, active })]
            }

            Msg::EditDuration(id) => {
                if let Some(item) = self.state.item(id) {
                    self.state.dialog = Some(Dialog::EditDuration {
                        item_id: id,
                        filename: item.filename.clone(),
                        value: item.effective_duration().clamp(MIN_DURATION, MAX_DURATION),
                    });
                }
                Vec::new()
            }

            Msg::SetDialogDuration(duration) => {
                if let Some(Dialog::EditDuration { value, .. }) = &mut self.state.dialog {
                    *value = duration.clamp(MIN_DURATION, MAX_DURATION);
                }
                Vec::new()
            }

            Msg::SaveDuration => match self.state.dialog.take() {
                Some(Dialog::EditDuration { item_id, value, .. }) => {
                    vec![self.request(|location| Request::UpdateDuration { location, id: item_id, duration: value })]
                }
                other => {
                    self.state.dialog = other;
                    Vec::new()
                }
            },

            Msg::RequestDelete(id) => {
                if let Some(item) = self.state.item(id) {
                    self.state.dialog = Some(Dialog::ConfirmDelete(item.clone()));
                }
                Vec::new()
            }

            Msg::ConfirmDelete => match self.state.dialog.take() {
                Some(Dialog::ConfirmDelete(item)) => {
                    log::info!("Deleting '{}' (id {})", item.filename, item.id);
                    vec![self.request(|location| Request::Delete { location, id: item.id, filename: item.filename })]
                }
                other => {
                    self.state.dialog = other;
                    Vec::new()
                }
            },

            Msg::RequestClear => {
                if self.state.items.is_empty() {
                    self.toast(ToastKind::Info, "Playlist is already empty", now);
                } else {
                    self.state.dialog = Some(Dialog::ConfirmClear);
                }
                Vec::new()
            }

            Msg::ConfirmClear => {
                if self.state.dialog != Some(Dialog::ConfirmClear) || self.state.clear_pending {
                    return Vec::new();
                }
                self.state.dialog = None;
                self.state.clear_pending = true;
                vec![self.request(|location| Request::Clear { location })]
            }

            Msg::CancelDialog => {
                self.state.dialog = None;
                Vec::new()
            }

            Msg::FixDurations => {
                if self.state.fix_pending {
                    return Vec::new();
                }
                self.state.fix_pending = true;
                vec![self.request(|location| Request::FixDurations { location })]
            }

            Msg::FilesSelected(files) => {
                if self.state.upload.in_flight {
                    return Vec::new();
                }
                let (supported, rejected): (Vec<_>, Vec<_>) =
                    files.into_iter().partition(|f| f.kind.is_some());
                if !rejected.is_empty() {
                    let names: Vec<&str> = rejected.iter().map(|f| f.name.as_str()).collect();
                    self.toast(ToastKind::Warning, format!("Unsupported file type: {}", names.join(", ")), now);
                }
                self.state.upload.files = supported;
                self.state.upload.progress = UploadProgress::Idle;
                Vec::new()
            }

            Msg::ClearSelection => {
                if !self.state.upload.in_flight {
                    self.state.upload.files.clear();
                    self.state.upload.duration = self.state.default_duration;
                }
                Vec::new()
            }

            Msg::SetUploadDuration(duration) => {
                self.state.upload.duration = duration.clamp(MIN_DURATION, MAX_DURATION);
                Vec::new()
            }

            Msg::StartUpload => {
                let upload = &mut self.state.upload;
                if upload.in_flight || upload.files.is_empty() {
                    return Vec::new();
                }
                upload.in_flight = true;
                upload.progress = UploadProgress::Uploading { sent: 0, total: upload.total_size() };
                let duration = upload.needs_duration().then_some(upload.duration);
                let files = upload.files.iter().map(|f| f.path.clone()).collect();
                vec![self.request(|location| Request::Upload { location, files, duration })]
            }

            Msg::PollSystem => vec![Effect::Request(Request::SystemInfo)],

            Msg::Tick => {
                if self.state.upload.progress.should_hide(now) {
                    self.state.upload.progress = UploadProgress::Idle;
                }
                self.state.toasts.retain(|t| !t.is_expired(now));
                Vec::new()
            }

            Msg::ContentLoaded { location, generation, result } => {
                if !self.is_current(&location) || generation != self.state.content_generation {
                    log::debug!("Dropping stale content response (generation {})", generation);
                    return Vec::new();
                }
                match result {
                    Ok(snapshot) => {
                        self.replace_items(snapshot.items);
                        match snapshot.display_running {
                            Some(false) if !self.state.start_pending => {
                                self.state.playback = PlaybackState::default();
                            }
                            Some(true) if !self.state.is_running() && !self.state.stop_pending => {
                                self.state.playback.status = PlaybackStatus::Playing;
                            }
                            _ => {}
                        }
                    }
                    Err(e) => log::error!("Failed to load playlist for '{}': {}", location, e),
                }
                Vec::new()
            }

            Msg::StatusLoaded { location, result } => {
                if !self.is_current(&location) {
                    return Vec::new();
                }
                match result {
                    Ok(playback) => self.state.playback = playback,
                    Err(e) => log::error!("Failed to load playback status for '{}': {}", location, e),
                }
                Vec::new()
            }

            Msg::StartFinished { location, result } => {
                if !self.is_current(&location) {
                    return Vec::new();
                }
                self.state.start_pending = false;
                match result {
                    Ok(ack) => {
                        self.state.playback.status = PlaybackStatus::Playing;
                        let text = ack.message.unwrap_or_else(|| "Playback started".to_string());
                        self.toast(ToastKind::Success, text, now);
                    }
                    Err(e) => {
                        log::error!("Start failed: {}", e);
                        self.toast(ToastKind::Error, e.user_message("Could not start playback"), now);
                    }
                }
                Vec::new()
            }

            Msg::StopFinished { location, result } => {
                if !self.is_current(&location) {
                    return Vec::new();
                }
                self.state.stop_pending = false;
                match result {
                    Ok(ack) => {
                        self.state.playback = PlaybackState::default();
                        let text = ack.message.unwrap_or_else(|| "Playback stopped".to_string());
                        self.toast(ToastKind::Success, text, now);
                    }
                    Err(e) => {
                        log::error!("Stop failed: {}", e);
                        self.toast(ToastKind::Error, e.user_message("Could not stop playback"), now);
                    }
                }
                Vec::new()
            }

            Msg::ReorderFinished { location, result } => {
                if !self.is_current(&location) {
                    return Vec::new();
                }
                match result {
                    Ok(_) => {
                        self.toast(ToastKind::Success, "Playlist order saved", now);
                        Vec::new()
                    }
                    Err(e) => {
                        log::error!("Reorder failed: {}", e);
                        self.toast(ToastKind::Error, e.user_message("Could not save the new order"), now);
                        vec![self.fetch_content()]
                    }
                }
            }

            Msg::DurationFinished { location, id, duration, result } => {
                if !self.is_current(&location) {
                    return Vec::new();
                }
                match result {
                    Ok(_) => {
                        if let Some(item) = self.state.items.iter_mut().find(|i| i.id == id) {
                            item.duration = Some(duration);
                        }
                        self.invalidate_fetches();
                        self.toast(ToastKind::Success, format!("Duration set to {} seconds", duration), now);
                        Vec::new()
                    }
                    Err(e) => {
                        log::error!("Duration update for {} failed: {}", id, e);
                        self.toast(ToastKind::Error, e.user_message("Could not update the duration"), now);
                        vec![self.fetch_content()]
                    }
                }
            }

            Msg::ActiveFinished { location, id, active, result } => {
                if !self.is_current(&location) {
                    return Vec::new();
                }
                match result {
                    Ok(_) => {
                        let text = if active { "Content enabled" } else { "Content disabled" };
                        self.toast(ToastKind::Success, text, now);
                    }
                    Err(e) => {
                        log::error!("Active toggle for {} failed: {}", id, e);
                        self.toast(ToastKind::Error, e.user_message("Could not change the content state"), now);
                    }
                }
                vec![self.fetch_content()]
            }

            Msg::DeleteFinished { location, filename, result } => {
                if !self.is_current(&location) {
                    return Vec::new();
                }
                match result {
                    Ok(_) => self.toast(ToastKind::Success, format!("{} deleted", filename), now),
                    Err(e) => {
                        log::error!("Delete of '{}' failed: {}", filename, e);
                        self.toast(ToastKind::Error, e.user_message("Could not delete the content"), now);
                    }
                }
                // Reconcile regardless of outcome
                vec![self.fetch_content()]
            }

            Msg::ClearFinished { location, result } => {
                if !self.is_current(&location) {
                    return Vec::new();
                }
                self.state.clear_pending = false;
                match result {
                    Ok(ack) => {
                        let text = ack.message.unwrap_or_else(|| "Playlist cleared".to_string());
                        self.toast(ToastKind::Success, text, now);
                        vec![self.fetch_content(), self.fetch_status()]
                    }
                    Err(e) => {
                        log::error!("Clear failed: {}", e);
                        self.toast(ToastKind::Error, e.user_message("Could not clear the playlist"), now);
                        Vec::new()
                    }
                }
            }

            Msg::FixFinished { location, result } => {
                if !self.is_current(&location) {
                    return Vec::new();
                }
                self.state.fix_pending = false;
                match result {
                    Ok(ack) => {
                        let text = ack.message.unwrap_or_else(|| "Video durations updated".to_string());
                        self.toast(ToastKind::Success, text, now);
                        vec![self.fetch_content()]
                    }
                    Err(e) => {
                        log::error!("Fixing video durations failed: {}", e);
                        self.toast(ToastKind::Error, e.user_message("Could not fix video durations"), now);
                        Vec::new()
                    }
                }
            }

            Msg::UploadProgress { sent, total } => {
                if self.state.upload.in_flight {
                    self.state.upload.progress = UploadProgress::Uploading { sent, total };
                }
                Vec::new()
            }

            Msg::UploadFinished { location, result } => {
                let upload = &mut self.state.upload;
                upload.in_flight = false;
                match result {
                    Ok(outcome) => {
                        upload.progress = UploadProgress::Completed { at: now };
                        upload.files.clear();
                        upload.duration = self.state.default_duration;

                        let text = match outcome.items.as_slice() {
                            [item] => format!("{} uploaded successfully", item.filename),
                            items => outcome
                                .message
                                .unwrap_or_else(|| format!("{} files uploaded successfully", items.len())),
                        };
                        self.toast(ToastKind::Success, text, now);
                        if location == self.state.location {
                            vec![self.fetch_content()]
                        } else {
                            Vec::new()
                        }
                    }
                    Err(e) => {
                        upload.progress = UploadProgress::Idle;
                        log::error!("Upload to '{}' failed: {}", location, e);
                        self.toast(ToastKind::Error, e.user_message("Upload failed"), now);
                        Vec::new()
                    }
                }
            }

            Msg::SystemLoaded(result) => {
                match result {
                    Ok(info) => self.state.system = Some(info),
                    Err(e) => log::warn!("System info unavailable: {}", e),
                }
                Vec::new()
            }

            Msg::Push(event) => self.handle_push(event, now),
        }
    }

    fn handle_push(&mut self, event: PushEvent, now: Instant) -> Vec<Effect> {
        match event {
            PushEvent::Connected => {
                self.state.connected = true;
                Vec::new()
            }
            PushEvent::Disconnected(reason) => {
                if self.state.connected {
                    self.toast(ToastKind::Warning, "Connection to server lost", now);
                    log::warn!("Live updates paused: {}", reason);
                }
                self.state.connected = false;
                Vec::new()
            }
            PushEvent::DisplayStatus(ev) => {
                if ev.location != self.state.location {
                    return Vec::new();
                }
                match ev.status {
                    PlaybackStatus::Playing => {
                        self.state.playback.status = PlaybackStatus::Playing;
                        self.state.playback.current_item = ev.current_item;
                        // An unknown current item means our cache is behind
                        let stale = self
                            .state
                            .current_id()
                            .is_some_and(|id| self.state.item(id).is_none());
                        if stale {
                            return vec![self.fetch_content()];
                        }
                    }
                    PlaybackStatus::Stopped => self.state.playback = PlaybackState::default(),
                }
                Vec::new()
            }
            PushEvent::ContentUpdated(ev) => {
                if ev.location != self.state.location {
                    return Vec::new();
                }
                if ev.action != ContentAction::Sync {
                    self.toast(ToastKind::Info, ev.action.notice(), now);
                }
                match ev.content_list {
                    Some(list) if ev.action != ContentAction::Unknown => {
                        self.replace_items(list);
                        Vec::new()
                    }
                    _ => vec![self.fetch_content()],
                }
            }
            PushEvent::SystemInfo(info) => {
                self.state.system = Some(info);
                Vec::new()
            }
            PushEvent::ServerError(message) => {
                log::error!("Server reported: {}", message);
                self.toast(ToastKind::Error, message, now);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
