//! Signage Panel
//! Desktop control panel for location-based digital signage screens

// Hide console window on Windows release builds
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

// Use mimalloc for faster memory allocation (Linux, macOS)
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use eframe::egui;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

mod api;
mod config;
mod logging;
mod models;
mod push;
mod state;
mod upload;
mod view;

use api::PanelClient;
use config::AppConfig;
use logging::ConsoleLog;
use models::{MediaKind, IMAGE_EXTENSIONS, VIDEO_EXTENSIONS};
use push::{PushChannel, PushEvent};
use state::*;
use upload::SelectedFile;
use view::*;

const ACCENT: egui::Color32 = egui::Color32::from_rgb(0, 150, 136);
const DANGER: egui::Color32 = egui::Color32::from_rgb(200, 80, 80);

/// 64x64 window icon: a screen on a pole with a play mark
fn load_icon() -> egui::IconData {
    let size: usize = 64;
    let mut rgba = vec![0u8; size * size * 4];

    for y in 0..size {
        for x in 0..size {
            let idx = (y * size + x) * 4;
            let nx = x as f32 / size as f32;
            let ny = y as f32 / size as f32;

            let in_frame = (0.08..=0.92).contains(&nx) && (0.10..=0.62).contains(&ny);
            let in_screen = (0.14..=0.86).contains(&nx) && (0.16..=0.56).contains(&ny);
            let in_pole = (0.45..=0.55).contains(&nx) && ny > 0.62 && ny <= 0.86;
            let in_base = (0.30..=0.70).contains(&nx) && ny > 0.86 && ny <= 0.92;
            let in_play = {
                let px = nx - 0.42;
                let py = ny - 0.36;
                (0.0..=0.18).contains(&px) && py.abs() <= (0.18 - px) * 0.6
            };

            let color: [u8; 4] = if in_screen && in_play {
                [255, 255, 255, 255]
            } else if in_screen {
                // Teal gradient top to bottom
                let t = (ny - 0.16) / 0.40;
                [0, (170.0 - 60.0 * t) as u8, (150.0 - 40.0 * t) as u8, 255]
            } else if in_frame || in_pole || in_base {
                [38, 50, 56, 255]
            } else {
                [0, 0, 0, 0]
            };
            rgba[idx..idx + 4].copy_from_slice(&color);
        }
    }

    egui::IconData {
        rgba,
        width: size as u32,
        height: size as u32,
    }
}

/// Add a system emoji font so icons in labels render
fn install_fonts(ctx: &egui::Context) {
    let candidates: &[&str] = if cfg!(target_os = "windows") {
        &["C:\\Windows\\Fonts\\seguiemj.ttf"]
    } else if cfg!(target_os = "macos") {
        &["/System/Library/Fonts/Apple Color Emoji.ttc"]
    } else {
        &[
            "/usr/share/fonts/truetype/noto/NotoColorEmoji.ttf",
            "/usr/share/fonts/noto-emoji/NotoColorEmoji.ttf",
            "/usr/share/fonts/google-noto-emoji/NotoColorEmoji.ttf",
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        ]
    };

    let mut fonts = egui::FontDefinitions::default();
    if let Some(font_data) = candidates.iter().find_map(|path| std::fs::read(path).ok()) {
        fonts.font_data.insert("emoji".to_owned(), egui::FontData::from_owned(font_data).into());
        fonts
            .families
            .entry(egui::FontFamily::Proportional)
            .or_default()
            .push("emoji".to_owned());
    }
    ctx.set_fonts(fonts);
}

fn main() -> Result<(), eframe::Error> {
    let console = logging::init();
    let config = AppConfig::load();
    log::info!(
        "Signage Panel {} starting, server {}",
        env!("CARGO_PKG_VERSION"),
        config.server_url
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 720.0])
            .with_min_inner_size([900.0, 560.0])
            .with_icon(load_icon()),
        vsync: true,
        ..Default::default()
    };

    eframe::run_native(
        "Signage Panel",
        options,
        Box::new(move |cc| {
            install_fonts(&cc.egui_ctx);
            cc.egui_ctx.set_visuals(if config.dark_mode {
                egui::Visuals::dark()
            } else {
                egui::Visuals::light()
            });
            Ok(Box::new(PanelApp::new(config, console)))
        }),
    )
}

/// Perform one request on a worker thread and wrap the outcome for the synchronizer
fn execute(client: &PanelClient, request: Request, sender: &Sender<Msg>, ctx: &egui::Context) -> Msg {
    match request {
        Request::FetchContent { location, generation } => {
            let result = client.get_content(&location);
            Msg::ContentLoaded { location, generation, result }
        }
        Request::FetchStatus { location } => {
            let result = client.get_display_status(&location);
            Msg::StatusLoaded { location, result }
        }
        Request::Start { location } => {
            let result = client.start_display(&location);
            Msg::StartFinished { location, result }
        }
        Request::Stop { location } => {
            let result = client.stop_display(&location);
            Msg::StopFinished { location, result }
        }
        Request::Reorder { location, ids } => {
            let result = client.update_order(&location, &ids);
            Msg::ReorderFinished { location, result }
        }
        Request::UpdateDuration { location, id, duration } => {
            let result = client.update_duration(&location, id, duration);
            Msg::DurationFinished { location, id, duration, result }
        }
        Request::UpdateActive { location, id, active } => {
            let result = client.update_active(&location, id, active);
            Msg::ActiveFinished { location, id, active, result }
        }
        Request::Delete { location, id, filename } => {
            let result = client.delete_content(&location, id);
            Msg::DeleteFinished { location, filename, result }
        }
        Request::Clear { location } => {
            let result = client.clear_content(&location);
            Msg::ClearFinished { location, result }
        }
        Request::FixDurations { location } => {
            let result = client.fix_video_durations(&location);
            Msg::FixFinished { location, result }
        }
        Request::Upload { location, files, duration } => {
            let progress_sender = sender.clone();
            let progress_ctx = ctx.clone();
            let result = client.upload(
                &location,
                &files,
                duration,
                Box::new(move |sent, total| {
                    let _ = progress_sender.send(Msg::UploadProgress { sent, total });
                    progress_ctx.request_repaint();
                }),
            );
            Msg::UploadFinished { location, result }
        }
        Request::SystemInfo => Msg::SystemLoaded(client.system_info()),
    }
}

struct PanelApp {
    config: AppConfig,
    client: PanelClient,
    sync: Synchronizer,

    // Background task channel
    msg_sender: Sender<Msg>,
    msg_receiver: Receiver<Msg>,
    pending_effects: Vec<Effect>,

    push: Option<PushChannel>,
    push_sender: Sender<PushEvent>,
    push_receiver: Receiver<PushEvent>,

    console: ConsoleLog,
    show_console: bool,
    show_settings: bool,
    server_input: String,
    last_system_poll: Instant,
}

impl PanelApp {
    fn new(config: AppConfig, console: ConsoleLog) -> Self {
        let (msg_sender, msg_receiver) = channel();
        let (push_sender, push_receiver) = channel();
        let location = config.initial_location();
        let mut sync = Synchronizer::new(&location, config.default_image_duration);
        let pending_effects = sync.initial_effects();

        let mut app = Self {
            client: PanelClient::new(&config.server_url),
            server_input: config.server_url.clone(),
            config,
            sync,
            msg_sender,
            msg_receiver,
            pending_effects,
            push: None,
            push_sender,
            push_receiver,
            console,
            show_console: false,
            show_settings: false,
            last_system_poll: Instant::now(),
        };
        app.connect_push();
        app
    }

    fn connect_push(&mut self) {
        // Dropping the old channel shuts its thread down
        self.push = None;
        if self.config.push_enabled {
            self.push = Some(PushChannel::spawn(
                self.client.server(),
                &self.sync.state().location,
                self.push_sender.clone(),
            ));
        } else {
            log::info!("Live updates disabled in settings");
        }
    }

    fn apply_settings(&mut self, ctx: &egui::Context) {
        self.config.server_url = self.server_input.clone();
        self.config.normalize();
        self.server_input = self.config.server_url.clone();
        self.config.save();
        ctx.set_visuals(if self.config.dark_mode { egui::Visuals::dark() } else { egui::Visuals::light() });

        log::info!("Settings applied, server {}", self.config.server_url);
        self.client = PanelClient::new(&self.config.server_url);
        self.pending_effects = self.sync.reset(self.config.default_image_duration);
        self.connect_push();
    }

    fn run_effects(&mut self, effects: Vec<Effect>, ctx: &egui::Context) {
        for effect in effects {
            match effect {
                Effect::JoinLocation(location) => {
                    if let Some(push) = &self.push {
                        push.join_location(&location);
                    }
                    self.config.last_location = location;
                    self.config.save();
                }
                Effect::Request(request) => {
                    let client = self.client.clone();
                    let sender = self.msg_sender.clone();
                    let ctx = ctx.clone();
                    thread::spawn(move || {
                        let msg = execute(&client, request, &sender, &ctx);
                        let _ = sender.send(msg);
                        ctx.request_repaint();
                    });
                }
            }
        }
    }

    fn location_title(&self) -> String {
        self.config.location_title(&self.sync.state().location)
    }

    fn show_top_bar(&mut self, ctx: &egui::Context, intents: &mut Vec<Msg>) {
        let state = self.sync.state();
        let controls = controls(state);
        let mut selected = state.location.clone();
        let connected = state.connected;

        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.add_space(4.0);
            ui.horizontal(|ui| {
                ui.heading("📺 Signage Panel");
                ui.separator();

                egui::ComboBox::from_id_salt("location_picker")
                    .selected_text(self.config.location_title(&selected))
                    .width(260.0)
                    .show_ui(ui, |ui| {
                        for location in &self.config.locations {
                            ui.selectable_value(&mut selected, location.key.clone(), &location.title);
                        }
                    });
                if selected != self.sync.state().location {
                    intents.push(Msg::SelectLocation(selected.clone()));
                }

                let badge_color = if connected { ACCENT } else { DANGER };
                ui.label(egui::RichText::new(connection_label(connected)).color(badge_color));
                ui.separator();

                if ui
                    .add_enabled(controls.start_enabled, egui::Button::new(controls.start_label))
                    .on_disabled_hover_text("Playlist must be stopped and not empty")
                    .clicked()
                {
                    intents.push(Msg::StartDisplay);
                }
                if ui.add_enabled(controls.stop_enabled, egui::Button::new(controls.stop_label)).clicked() {
                    intents.push(Msg::StopDisplay);
                }
                if ui.add_enabled(controls.clear_enabled, egui::Button::new("🗑 Clear all")).clicked() {
                    intents.push(Msg::RequestClear);
                }
                if ui
                    .add_enabled(controls.fix_enabled, egui::Button::new("🛠 Fix video durations"))
                    .on_hover_text("Re-measure the length of every video on the server")
                    .clicked()
                {
                    intents.push(Msg::FixDurations);
                }
                if ui.button("🖥 Full screen").on_hover_text("Open the player page in a browser").clicked() {
                    ctx.open_url(egui::OpenUrl::new_tab(self.client.screen_url(&selected)));
                }
                if ui.button("🔄").on_hover_text("Refresh (F5)").clicked() {
                    intents.push(Msg::Refresh);
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("⚙").on_hover_text("Settings").clicked() {
                        self.show_settings = !self.show_settings;
                    }
                    if ui.button("🖹 Console").clicked() {
                        self.show_console = !self.show_console;
                    }
                    ui.label(egui::RichText::new(clock_text(&chrono::Local::now())).monospace());
                });
            });
            ui.add_space(4.0);
        });
    }

    fn show_status_bar(&self, ctx: &egui::Context) {
        let state = self.sync.state();
        let playing = now_playing(state);
        let active = state.items.iter().filter(|i| i.is_active).count();

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let color = if playing.active { ACCENT } else { ui.visuals().weak_text_color() };
                ui.label(egui::RichText::new(status_text(state)).color(color).strong());
                ui.separator();
                ui.label(&playing.title);
                if !playing.detail.is_empty() {
                    ui.label(egui::RichText::new(&playing.detail).weak());
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(egui::RichText::new(self.client.server()).weak());
                    ui.separator();
                    ui.label(format!("{} items, {} active", state.items.len(), active));
                });
            });
        });
    }

    fn show_side_panel(&mut self, ctx: &egui::Context, intents: &mut Vec<Msg>) {
        let state = self.sync.state();
        let upload = &state.upload;

        egui::SidePanel::left("upload_panel")
            .resizable(true)
            .default_width(300.0)
            .show(ctx, |ui| {
                ui.heading("⬆ Upload");
                ui.separator();

                ui.add_enabled_ui(!upload.in_flight, |ui| {
                    ui.horizontal(|ui| {
                        if ui.button("📂 Choose files").clicked() {
                            let extensions: Vec<&str> =
                                IMAGE_EXTENSIONS.iter().chain(VIDEO_EXTENSIONS.iter()).copied().collect();
                            if let Some(paths) = rfd::FileDialog::new()
                                .set_title("Select images or videos")
                                .add_filter("Images & videos", &extensions)
                                .pick_files()
                            {
                                let files = paths.iter().map(|p| SelectedFile::inspect(p)).collect();
                                intents.push(Msg::FilesSelected(files));
                            }
                        }
                        if !upload.files.is_empty() && ui.button("✖ Clear").clicked() {
                            intents.push(Msg::ClearSelection);
                        }
                    });
                });

                if upload.files.is_empty() {
                    ui.label(egui::RichText::new("No files selected").weak());
                } else {
                    egui::ScrollArea::vertical()
                        .id_salt("selected_files")
                        .max_height(140.0)
                        .show(ui, |ui| {
                            for file in &upload.files {
                                let icon = file.kind.map(|k| k.icon()).unwrap_or("?");
                                ui.label(format!("{} {} ({})", icon, file.name, format_file_size(file.size)));
                            }
                        });
                    ui.label(
                        egui::RichText::new(format!(
                            "{} file(s), {}",
                            upload.files.len(),
                            format_file_size(upload.total_size())
                        ))
                        .weak(),
                    );
                }

                if upload.needs_duration() {
                    ui.add_space(6.0);
                    ui.label("Image display duration");
                    let mut duration = upload.duration;
                    if ui
                        .add(egui::Slider::new(&mut duration, MIN_DURATION..=MAX_DURATION).suffix(" s"))
                        .changed()
                    {
                        intents.push(Msg::SetUploadDuration(duration));
                    }
                    ui.horizontal_wrapped(|ui| {
                        for preset in DURATION_PRESETS {
                            let selected = active_preset(upload.duration) == Some(preset);
                            if ui.selectable_label(selected, format!("{}s", preset)).clicked() {
                                intents.push(Msg::SetUploadDuration(preset));
                            }
                        }
                    });
                } else if upload.files.iter().all(|f| f.kind == Some(MediaKind::Video)) && !upload.files.is_empty() {
                    ui.label(egui::RichText::new("Video length is detected by the server").weak());
                }

                ui.add_space(6.0);
                let can_upload = !upload.files.is_empty() && !upload.in_flight;
                if ui
                    .add_enabled(can_upload, egui::Button::new(upload_button_label(upload)).min_size(egui::vec2(180.0, 28.0)))
                    .clicked()
                {
                    intents.push(Msg::StartUpload);
                }

                if let Some(fraction) = upload.progress.fraction() {
                    let mut bar = egui::ProgressBar::new(fraction).show_percentage();
                    if let Some(text) = progress_text(&upload.progress) {
                        bar = bar.text(text);
                    }
                    ui.add(bar);
                }

                ui.add_space(12.0);
                ui.heading("🖥 Player host");
                ui.separator();
                match &state.system {
                    Some(info) => {
                        for line in system_lines(info) {
                            ui.label(egui::RichText::new(line).monospace());
                        }
                        if let Some(stamp) = &info.timestamp {
                            ui.label(egui::RichText::new(format!("Updated {}", stamp)).weak().small());
                        }
                    }
                    None => {
                        ui.label(egui::RichText::new("No data yet").weak());
                    }
                }
            });
    }

    fn show_playlist(&self, ctx: &egui::Context, intents: &mut Vec<Msg>) {
        let state = self.sync.state();
        let rows = rows(state);
        let title = self.location_title();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading(&title);
                ui.label(egui::RichText::new(format!("{} items", rows.len())).weak());
            });
            ui.label(egui::RichText::new("Drag ☰ to reorder. Inactive items are skipped during playback.").weak().small());
            ui.separator();

            if !state.loaded {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Loading playlist...");
                });
                return;
            }
            if rows.is_empty() {
                ui.add_space(20.0);
                ui.vertical_centered(|ui| {
                    ui.label(egui::RichText::new("No content yet. Upload images or videos to get started.").weak());
                });
                return;
            }

            let last = rows.len() - 1;
            egui::ScrollArea::vertical().auto_shrink([false, false]).show(ui, |ui| {
                for row in &rows {
                    let fill = if row.is_current {
                        ui.visuals().selection.bg_fill.gamma_multiply(0.5)
                    } else {
                        ui.visuals().faint_bg_color
                    };

                    let response = egui::Frame::group(ui.style())
                        .fill(fill)
                        .show(ui, |ui| {
                            ui.set_width(ui.available_width());
                            ui.horizontal(|ui| {
                                ui.dnd_drag_source(egui::Id::new(("playlist_row", row.id)), row.index, |ui| {
                                    ui.label(egui::RichText::new("☰").strong());
                                });
                                ui.label(egui::RichText::new(format!("{:>2}.", row.position)).monospace());
                                ui.label(row.kind.icon());

                                let mut name = egui::RichText::new(&row.filename);
                                if row.is_current {
                                    name = egui::RichText::new(format!("▶ {}", row.filename)).strong().color(ACCENT);
                                } else if !row.is_active {
                                    name = name.weak().strikethrough();
                                }
                                ui.label(name);

                                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                                    if ui.button("🗑").on_hover_text("Delete").clicked() {
                                        intents.push(Msg::RequestDelete(row.id));
                                    }
                                    if ui.button("👁").on_hover_text("Preview in browser").clicked() {
                                        ctx.open_url(egui::OpenUrl::new_tab(
                                            self.client.media_url(&state.location, &row.filename),
                                        ));
                                    }
                                    if ui.add_enabled(row.index < last, egui::Button::new("⬇")).clicked() {
                                        intents.push(Msg::MoveItem { from: row.index, to: row.index + 1 });
                                    }
                                    if ui.add_enabled(row.index > 0, egui::Button::new("⬆")).clicked() {
                                        intents.push(Msg::MoveItem { from: row.index, to: row.index - 1 });
                                    }
                                    let mut active = row.is_active;
                                    if ui.checkbox(&mut active, "Active").changed() {
                                        intents.push(Msg::ToggleActive { id: row.id, active });
                                    }
                                    if ui
                                        .button(format!("⏱ {}", row.duration_text))
                                        .on_hover_text("Change display duration")
                                        .clicked()
                                    {
                                        intents.push(Msg::EditDuration(row.id));
                                    }
                                    ui.label(egui::RichText::new(&row.size_text).weak());
                                    ui.label(egui::RichText::new(row.kind.label()).weak());
                                });
                            });
                        })
                        .response;

                    if response.dnd_hover_payload::<usize>().is_some() {
                        let stroke = egui::Stroke::new(2.0, ACCENT);
                        ui.painter().hline(response.rect.x_range(), response.rect.top(), stroke);
                    }
                    if let Some(from) = response.dnd_release_payload::<usize>() {
                        intents.push(Msg::MoveItem { from: *from, to: row.index });
                    }
                }
            });
        });
    }

    fn show_dialogs(&self, ctx: &egui::Context, intents: &mut Vec<Msg>) {
        let state = self.sync.state();
        let Some(dialog) = &state.dialog else {
            return;
        };

        match dialog {
            Dialog::ConfirmDelete(item) => {
                egui::Window::new("🗑 Delete content")
                    .collapsible(false)
                    .resizable(false)
                    .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                    .show(ctx, |ui| {
                        ui.label(egui::RichText::new("Delete this item from the playlist?").strong());
                        ui.add_space(8.0);
                        egui::Grid::new("delete_summary").num_columns(2).show(ui, |ui| {
                            for (label, value) in delete_summary(item) {
                                ui.label(format!("{}:", label));
                                ui.label(value);
                                ui.end_row();
                            }
                        });
                        ui.add_space(8.0);
                        ui.label(egui::RichText::new("The file is removed from the server.").color(DANGER));
                        ui.add_space(8.0);
                        ui.horizontal(|ui| {
                            if ui.button("Cancel").clicked() {
                                intents.push(Msg::CancelDialog);
                            }
                            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                                if ui.button(egui::RichText::new("Delete").color(DANGER)).clicked() {
                                    intents.push(Msg::ConfirmDelete);
                                }
                            });
                        });
                    });
            }
            Dialog::ConfirmClear => {
                let title = self.location_title();
                egui::Window::new("⚠ Clear playlist")
                    .collapsible(false)
                    .resizable(false)
                    .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                    .show(ctx, |ui| {
                        ui.label(
                            egui::RichText::new(format!("Remove all {} items from {}?", state.items.len(), title))
                                .strong(),
                        );
                        ui.add_space(8.0);
                        ui.label(egui::RichText::new("This action cannot be undone!").color(DANGER));
                        ui.add_space(8.0);
                        ui.horizontal(|ui| {
                            if ui.button("Cancel").clicked() {
                                intents.push(Msg::CancelDialog);
                            }
                            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                                if ui.button(egui::RichText::new("Clear all").color(DANGER)).clicked() {
                                    intents.push(Msg::ConfirmClear);
                                }
                            });
                        });
                    });
            }
            Dialog::EditDuration { filename, value, .. } => {
                egui::Window::new("⏱ Display duration")
                    .collapsible(false)
                    .resizable(false)
                    .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                    .show(ctx, |ui| {
                        ui.label(egui::RichText::new(filename).strong());
                        ui.add_space(6.0);
                        let mut duration = *value;
                        if ui
                            .add(egui::Slider::new(&mut duration, MIN_DURATION..=MAX_DURATION).suffix(" s"))
                            .changed()
                        {
                            intents.push(Msg::SetDialogDuration(duration));
                        }
                        ui.horizontal(|ui| {
                            for preset in DURATION_PRESETS {
                                if ui.selectable_label(*value == preset, format!("{}s", preset)).clicked() {
                                    intents.push(Msg::SetDialogDuration(preset));
                                }
                            }
                        });
                        ui.add_space(8.0);
                        ui.horizontal(|ui| {
                            if ui.button("Cancel").clicked() {
                                intents.push(Msg::CancelDialog);
                            }
                            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                                if ui.button("💾 Save").clicked() {
                                    intents.push(Msg::SaveDuration);
                                }
                            });
                        });
                    });
            }
        }
    }

    fn show_console_window(&mut self, ctx: &egui::Context) {
        if !self.show_console {
            return;
        }
        let console = &self.console;
        egui::Window::new("🖹 Console")
            .open(&mut self.show_console)
            .resizable(true)
            .default_size([720.0, 360.0])
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("Console Log");
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("🗑 Clear").clicked() {
                            console.clear();
                        }
                    });
                });
                ui.separator();

                egui::ScrollArea::vertical()
                    .auto_shrink([false, false])
                    .stick_to_bottom(true)
                    .show(ui, |ui| {
                        for line in console.snapshot() {
                            let color = if line.contains("[ERROR]") {
                                egui::Color32::RED
                            } else if line.contains("[WARN]") {
                                egui::Color32::YELLOW
                            } else if line.contains("[INFO]") {
                                egui::Color32::LIGHT_BLUE
                            } else {
                                egui::Color32::GRAY
                            };
                            ui.label(egui::RichText::new(line).monospace().color(color));
                        }
                    });
            });
    }

    fn show_settings_window(&mut self, ctx: &egui::Context) {
        if !self.show_settings {
            return;
        }
        let mut open = self.show_settings;
        let mut apply = false;
        egui::Window::new("⚙ Settings")
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                egui::Grid::new("settings_grid").num_columns(2).spacing([12.0, 8.0]).show(ui, |ui| {
                    ui.label("Server:");
                    ui.add(
                        egui::TextEdit::singleline(&mut self.server_input)
                            .hint_text("http://192.168.1.20:5000")
                            .desired_width(260.0),
                    );
                    ui.end_row();

                    ui.label("Default image duration:");
                    ui.add(
                        egui::DragValue::new(&mut self.config.default_image_duration)
                            .range(MIN_DURATION..=MAX_DURATION)
                            .suffix(" s"),
                    );
                    ui.end_row();

                    ui.label("Host metrics refresh:");
                    ui.add(egui::DragValue::new(&mut self.config.system_poll_secs).range(2..=300).suffix(" s"));
                    ui.end_row();

                    ui.label("Live updates:");
                    ui.checkbox(&mut self.config.push_enabled, "Receive push events");
                    ui.end_row();

                    ui.label("Theme:");
                    ui.checkbox(&mut self.config.dark_mode, "Dark mode");
                    ui.end_row();
                });
                ui.add_space(8.0);
                ui.label(egui::RichText::new(format!("Config: {}", AppConfig::config_path().display())).weak().small());
                ui.add_space(8.0);
                if ui.button("✔ Apply & reconnect").clicked() {
                    apply = true;
                }
            });

        self.show_settings = open && !apply;
        if apply {
            self.apply_settings(ctx);
        }
    }

    fn show_toasts(&self, ctx: &egui::Context, now: Instant) {
        let toasts = &self.sync.state().toasts;
        if toasts.is_empty() {
            return;
        }
        egui::Area::new(egui::Id::new("toasts"))
            .anchor(egui::Align2::RIGHT_BOTTOM, [-16.0, -40.0])
            .order(egui::Order::Foreground)
            .interactable(false)
            .show(ctx, |ui| {
                for toast in toasts {
                    let fill = match toast.kind {
                        ToastKind::Success => egui::Color32::from_rgb(46, 125, 50),
                        ToastKind::Error => egui::Color32::from_rgb(198, 40, 40),
                        ToastKind::Warning => egui::Color32::from_rgb(239, 108, 0),
                        ToastKind::Info => egui::Color32::from_rgb(21, 101, 192),
                    };
                    ui.push_id(toast.id, |ui| {
                        ui.set_opacity(toast.opacity(now));
                        egui::Frame::popup(ui.style()).fill(fill).show(ui, |ui| {
                            ui.set_max_width(340.0);
                            ui.label(
                                egui::RichText::new(format!("{} {}", toast.kind.icon(), toast.text))
                                    .color(egui::Color32::WHITE),
                            );
                        });
                    });
                    ui.add_space(6.0);
                }
            });
    }
}

impl eframe::App for PanelApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        let mut effects = std::mem::take(&mut self.pending_effects);

        // Process background task results (non-blocking)
        while let Ok(msg) = self.msg_receiver.try_recv() {
            effects.extend(self.sync.dispatch(msg, now));
        }
        while let Ok(event) = self.push_receiver.try_recv() {
            effects.extend(self.sync.dispatch(Msg::Push(event), now));
        }

        if now.duration_since(self.last_system_poll) >= Duration::from_secs(self.config.system_poll_secs) {
            self.last_system_poll = now;
            effects.extend(self.sync.dispatch(Msg::PollSystem, now));
        }
        effects.extend(self.sync.dispatch(Msg::Tick, now));

        let mut intents = Vec::new();
        if ctx.input(|i| i.key_pressed(egui::Key::F5)) {
            intents.push(Msg::Refresh);
        }

        self.show_top_bar(ctx, &mut intents);
        self.show_status_bar(ctx);
        self.show_side_panel(ctx, &mut intents);
        self.show_playlist(ctx, &mut intents);
        self.show_dialogs(ctx, &mut intents);
        self.show_console_window(ctx);
        self.show_settings_window(ctx);
        self.show_toasts(ctx, now);

        for msg in intents {
            effects.extend(self.sync.dispatch(msg, now));
        }
        self.run_effects(effects, ctx);

        // Animations need frames; otherwise the clock ticks once a second
        let state = self.sync.state();
        let animating = !state.toasts.is_empty() || state.upload.progress.fraction().is_some();
        ctx.request_repaint_after(if animating { Duration::from_millis(33) } else { Duration::from_secs(1) });
    }
}
