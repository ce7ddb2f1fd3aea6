use std::time::Duration;

use eframe::egui;
use ks_html::RichTextDocument;
use ks_html::extract_title;
use ks_net::FetchedPage;
use ks_renderer::MarkupPipeline;
use ks_renderer::PipelineConfig;
use ks_renderer::error_fragment;

use crate::navigation::FetchCompletion;
use crate::navigation::Navigator;
use crate::rich_text;

pub const APP_NAME: &str = "Kestrel Browser";
const LOADING_REPAINT_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Status {
    Ready,
    Loading(String),
    Loaded { url: String, status: u16 },
    Failed(String),
}

impl Status {
    fn line(&self) -> String {
        match self {
            Self::Ready => "Ready".to_owned(),
            Self::Loading(address) => format!("Loading {address}..."),
            Self::Loaded { url, status } => format!("Loaded {url} (status {status})"),
            Self::Failed(address) => format!("Failed to load {address}"),
        }
    }
}

/// What the window shows after a completion has been processed.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DisplayedPage {
    pub title: Option<String>,
    pub document: RichTextDocument,
}

pub struct KestrelApp {
    address_input: String,
    navigator: Navigator,
    pipeline: MarkupPipeline,
    status: Status,
    page: DisplayedPage,
    window_title: String,
}

impl KestrelApp {
    pub fn new(navigator: Navigator, initial_address: Option<String>) -> Self {
        let mut app = Self {
            address_input: String::new(),
            navigator,
            pipeline: MarkupPipeline::new(PipelineConfig::default()),
            status: Status::Ready,
            page: DisplayedPage {
                title: None,
                document: RichTextDocument::default(),
            },
            window_title: APP_NAME.to_owned(),
        };

        if let Some(address) = initial_address {
            app.address_input = address;
            app.submit();
        }
        app
    }

    fn submit(&mut self) {
        if self.address_input.trim().is_empty() {
            return;
        }

        match self.navigator.submit(&self.address_input) {
            Ok(address) => {
                self.address_input = address.clone();
                self.status = Status::Loading(address);
            }
            Err(error) => {
                tracing::warn!(code = error.code, "navigation not started: {}", error.message);
                self.page = error_page(&error.message);
                self.status = Status::Failed(self.address_input.clone());
            }
        }
    }

    fn poll_navigation(&mut self) {
        let Some(completion) = self.navigator.poll() else {
            return;
        };

        let FetchCompletion {
            address, result, ..
        } = completion;
        match result {
            Ok(page) => {
                tracing::info!(url = %page.url, status = page.status, "navigation finished");
                self.status = Status::Loaded {
                    url: page.url.clone(),
                    status: page.status,
                };
                self.address_input = page.url.clone();
                self.page = render_page(&self.pipeline, &page);
            }
            Err(error) => {
                tracing::info!(address = %address, code = error.code, "navigation failed");
                self.status = Status::Failed(address);
                self.page = error_page(&error.message);
            }
        }
    }

    fn sync_window_title(&mut self, ctx: &egui::Context) {
        let title = match &self.page.title {
            Some(page_title) => format!("{page_title} - {APP_NAME}"),
            None => APP_NAME.to_owned(),
        };
        if title != self.window_title {
            ctx.send_viewport_cmd(egui::ViewportCommand::Title(title.clone()));
            self.window_title = title;
        }
    }
}

/// Runs a fetched body through the markup pipeline into a display document.
pub(crate) fn render_page(pipeline: &MarkupPipeline, page: &FetchedPage) -> DisplayedPage {
    let title = extract_title(&page.body);
    match pipeline.transform(&page.body) {
        Ok(transformed) => DisplayedPage {
            title,
            document: RichTextDocument::from_markup(&transformed.markup),
        },
        Err(error) => {
            tracing::warn!(code = error.code, "markup pipeline failed: {}", error.message);
            error_page(&error.message)
        }
    }
}

/// The error fragment goes straight to the display model.
pub(crate) fn error_page(message: &str) -> DisplayedPage {
    DisplayedPage {
        title: None,
        document: RichTextDocument::from_markup(&error_fragment(message)),
    }
}

impl eframe::App for KestrelApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_navigation();
        if self.navigator.is_loading() {
            ctx.request_repaint_after(LOADING_REPAINT_INTERVAL);
        }
        self.sync_window_title(ctx);

        egui::TopBottomPanel::top("toolbar_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let width = (ui.available_width() - 60.0).max(200.0);
                let response = ui.add_sized(
                    [width, 28.0],
                    egui::TextEdit::singleline(&mut self.address_input).hint_text("Enter address"),
                );

                let pressed_enter =
                    response.lost_focus() && ui.input(|input| input.key_pressed(egui::Key::Enter));
                if pressed_enter || ui.button("Go").clicked() {
                    self.submit();
                }
            });
        });

        egui::TopBottomPanel::bottom("status_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if self.navigator.is_loading() {
                    ui.spinner();
                }
                ui.label(self.status.line());
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    rich_text::show_document(ui, &self.page.document);
                });
        });
    }
}
