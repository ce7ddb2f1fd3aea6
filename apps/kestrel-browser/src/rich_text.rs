//! Paints a `RichTextDocument` with egui labels.

use eframe::egui;
use egui::text::LayoutJob;
use ks_html::Block;
use ks_html::BlockKind;
use ks_html::RichTextDocument;
use ks_html::Rgb;
use ks_html::Span;

const BODY_SIZE: f32 = 14.0;
const INDENT_WIDTH: f32 = 18.0;
const BLOCK_SPACING: f32 = 6.0;

pub fn show_document(ui: &mut egui::Ui, document: &RichTextDocument) {
    for block in &document.blocks {
        let indent = block.indent as f32 * INDENT_WIDTH;
        ui.horizontal_wrapped(|ui| {
            ui.add_space(indent);
            match block.kind {
                BlockKind::Rule => {
                    ui.separator();
                }
                BlockKind::Preformatted => {
                    egui::Frame::group(ui.style()).show(ui, |ui| {
                        ui.label(block_job(ui.style(), block));
                    });
                }
                _ => {
                    ui.label(block_job(ui.style(), block));
                }
            }
        });
        ui.add_space(BLOCK_SPACING);
    }
}

/// Lays out one block, including its list marker.
pub fn block_job(style: &egui::Style, block: &Block) -> LayoutJob {
    let mut job = LayoutJob::default();
    let size = font_size(&block.kind);

    if let BlockKind::ListItem { marker } = &block.kind {
        egui::RichText::new(format!("{marker} "))
            .size(size)
            .append_to(&mut job, style, egui::FontSelection::Default, egui::Align::Center);
    }
    for span in &block.spans {
        span_text(style, span, size).append_to(
            &mut job,
            style,
            egui::FontSelection::Default,
            egui::Align::Center,
        );
    }

    job
}

fn span_text(style: &egui::Style, span: &Span, size: f32) -> egui::RichText {
    let mut text = egui::RichText::new(span.text.as_str()).size(size);
    if span.style.bold {
        text = text.strong();
    }
    if span.style.italic {
        text = text.italics();
    }
    if span.style.underline {
        text = text.underline();
    }
    if span.style.monospace {
        text = text.monospace();
    }

    match (span.style.color, &span.style.link) {
        (Some(color), _) => text.color(to_color32(color)),
        (None, Some(_)) => text.color(style.visuals.hyperlink_color),
        (None, None) => text,
    }
}

pub fn font_size(kind: &BlockKind) -> f32 {
    match kind {
        BlockKind::Heading(1) => 28.0,
        BlockKind::Heading(2) => 22.0,
        BlockKind::Heading(3) => 18.0,
        BlockKind::Heading(_) => 16.0,
        _ => BODY_SIZE,
    }
}

pub fn to_color32(rgb: Rgb) -> egui::Color32 {
    egui::Color32::from_rgb(rgb.r, rgb.g, rgb.b)
}
