//! Markup pipeline from fetched page text to display-ready markup.
//!
//! Stages run in a fixed order over the raw text: style blocks are parsed and
//! removed, unstyled paragraphs are coloured, then script blocks are evaluated
//! and removed. No document tree is built along the way.

mod fragment;
mod patterns;
mod scripts;
mod styles;

pub use fragment::error_fragment;
pub use ks_js::JsRuntimeConfig;
pub use scripts::ScriptSummary;
pub use scripts::run_scripts;
pub use styles::CssConfig;
pub use styles::CssStage;
pub use styles::PARAGRAPH_STYLE;
pub use styles::StyleSummary;
pub use styles::StylesheetFailure;
pub use styles::colour_paragraphs;
pub use styles::extract_styles;
pub use styles::parse_style_block;

use ks_core::BrowserResult;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineConfig {
    pub css: CssConfig,
    pub js: JsRuntimeConfig,
}

/// What one document run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub style_blocks: usize,
    pub stylesheet_failures: usize,
    pub css_rules: usize,
    pub paragraphs_coloured: usize,
    pub scripts_run: usize,
    pub scripts_failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedDocument {
    pub markup: String,
    pub report: PipelineReport,
}

#[derive(Debug, Clone, Default)]
pub struct MarkupPipeline {
    config: PipelineConfig,
}

impl MarkupPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Rewrites `markup` for display. Stylesheet and script failures are
    /// logged and counted, never returned.
    pub fn transform(&self, markup: &str) -> BrowserResult<TransformedDocument> {
        let (markup, styles) = extract_styles(markup, &self.config.css)?;
        let (markup, paragraphs_coloured) = colour_paragraphs(&markup)?;
        let (markup, scripts) = run_scripts(&markup, &self.config.js)?;

        let report = PipelineReport {
            style_blocks: styles.blocks,
            stylesheet_failures: styles.failures,
            css_rules: styles.rules,
            paragraphs_coloured,
            scripts_run: scripts.run,
            scripts_failed: scripts.failed,
        };
        tracing::debug!(?report, "markup pipeline finished");

        Ok(TransformedDocument { markup, report })
    }
}
