mod app;
mod logging;
mod navigation;
mod rich_text;

use eframe::egui;

use crate::app::APP_NAME;
use crate::app::KestrelApp;
use crate::navigation::Navigator;

fn main() -> Result<(), eframe::Error> {
    logging::init_logging();

    let initial_address = std::env::args().nth(1);
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(APP_NAME)
            .with_inner_size([1024.0, 768.0])
            .with_min_inner_size([480.0, 320.0]),
        ..Default::default()
    };

    let result = eframe::run_native(
        APP_NAME,
        native_options,
        Box::new(move |_cc| {
            Ok(Box::new(KestrelApp::new(
                Navigator::with_default_fetcher(),
                initial_address,
            )))
        }),
    );
    if let Err(error) = &result {
        tracing::error!("window could not be created: {error}");
    }
    result
}
