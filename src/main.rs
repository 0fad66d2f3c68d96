//! Desktop front end for yt-dlp: paste a URL, pick a folder and a quality, download.

// Settings file handling
mod config;
// Fetch → pick → download state machine
mod controller;
// yt-dlp process driver
mod downloader;
// Engine seam used by the controller
mod engine;
mod error;
mod logging;
// Request, format and progress types
mod model;
// yt-dlp progress line parsing
mod progress;

use std::{path::PathBuf, sync::Arc, time::Duration};

use config::AppConfig;
use controller::Controller;
use downloader::YtDlp;
use error::AppError;

// eframe/egui for GUI application framework
use eframe::{egui, App, Frame};
use egui::Visuals;
// OnceCell for single-time runtime initialization
use once_cell::sync::OnceCell;
// FileDialog for folder selection dialogs
use rfd::FileDialog;
use tokio::runtime::Runtime;

// Global Tokio runtime stored in a OnceCell for lazy init
static RUNTIME: OnceCell<Arc<Runtime>> = OnceCell::new();

/// Program entry point: initializes logging, runtime and engine, then launches the GUI
fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_tracing();

    let rt = RUNTIME.get_or_try_init(|| Runtime::new().map(Arc::new))?;

    let config_path = AppConfig::default_path();
    let config = config_path
        .as_deref()
        .map(AppConfig::load_or_default)
        .unwrap_or_default();
    let engine = YtDlp::from_config(&config)?;
    let controller = Controller::new(Arc::new(engine), rt.handle().clone());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([520.0, 360.0]),
        ..Default::default()
    };
    eframe::run_native(
        "YT Downloader",
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(Visuals::dark());
            Box::new(YtGrabApp::new(controller, config, config_path))
        }),
    )?;
    Ok(())
}

/// Window state; everything downloader-related lives in the controller
struct YtGrabApp {
    /// Input field for the video URL
    url_input: String,
    /// Destination folder, empty until picked
    download_folder: String,
    /// Position in the quality picker
    selected: Option<usize>,
    controller: Controller,
    config: AppConfig,
    config_path: Option<PathBuf>,
}

impl YtGrabApp {
    fn new(controller: Controller, config: AppConfig, config_path: Option<PathBuf>) -> Self {
        let download_folder = config
            .last_folder
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        Self {
            url_input: String::new(),
            download_folder,
            selected: None,
            controller,
            config,
            config_path,
        }
    }

    fn choose_folder(&mut self) {
        let mut dialog = FileDialog::new();
        if !self.download_folder.is_empty() {
            dialog = dialog.set_directory(&self.download_folder);
        }
        let Some(folder) = dialog.pick_folder() else {
            return;
        };
        self.download_folder = folder.display().to_string();
        self.config.last_folder = Some(folder);
        if let Some(path) = &self.config_path {
            if let Err(e) = self.config.save(path) {
                tracing::warn!(error = %e, "could not remember folder");
            }
        }
    }

    fn start(&mut self) {
        match self.controller.start(&self.url_input, &self.download_folder) {
            Ok(()) => self.selected = None,
            Err(AppError::Busy) => tracing::debug!("busy, start ignored"),
            Err(e) => tracing::debug!(error = %e, "start rejected"),
        }
    }

    fn confirm(&mut self) {
        if let Err(e) = self.controller.confirm(self.selected) {
            tracing::debug!(error = %e, "confirm rejected");
        }
    }
}

/// GUI update loop: called each frame to drain worker events and redraw
impl App for YtGrabApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        self.controller.poll();
        if self.controller.selection_enabled() && self.selected.is_none() && !self.controller.choices().is_empty() {
            self.selected = Some(0);
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.spacing_mut().item_spacing.y = 12.0;

            ui.label("Video URL:");
            ui.add(
                egui::TextEdit::singleline(&mut self.url_input)
                    .hint_text("Paste YouTube video URL")
                    .desired_width(f32::INFINITY),
            );

            ui.horizontal(|ui| {
                if ui.button("📁 Choose Save Folder").clicked() {
                    self.choose_folder();
                }
                if self.download_folder.is_empty() {
                    ui.weak("No folder selected");
                } else {
                    ui.label(&self.download_folder);
                }
            });

            ui.label("Choose Quality:");
            let selecting = self.controller.selection_enabled();
            ui.add_enabled_ui(selecting, |ui| {
                let choices = self.controller.choices();
                let current = self
                    .selected
                    .and_then(|i| choices.get(i))
                    .map(|c| c.label.clone())
                    .unwrap_or_default();
                egui::ComboBox::from_id_source("quality")
                    .selected_text(current)
                    .width(ui.available_width())
                    .show_ui(ui, |ui| {
                        for (i, choice) in choices.iter().enumerate() {
                            ui.selectable_value(&mut self.selected, Some(i), &choice.label);
                        }
                    });
            });

            let action = if selecting { "⬇️ Confirm Download" } else { "⬇️ Start Download" };
            if ui.add_enabled(!self.controller.is_busy(), egui::Button::new(action)).clicked() {
                if selecting {
                    self.confirm();
                } else {
                    self.start();
                }
            }

            ui.add(egui::ProgressBar::new(self.controller.progress() / 100.0).show_percentage());

            ui.vertical_centered(|ui| {
                ui.label(self.controller.status_line());
            });
        });

        if self.controller.is_busy() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}
