//! Compiled block and tag patterns, built once per process.

use ks_core::BrowserError;
use ks_core::BrowserResult;
use once_cell::sync::OnceCell;
use regex_lite::Regex;

const STYLE_BLOCK: &str = r"(?is)<style[^>]*>(.*?)</style>";
const SCRIPT_BLOCK: &str = r"(?is)<script[^>]*>(.*?)</script>";
const PARAGRAPH_TAG: &str = r"(?i)<p(?:[\s/][^>]*)?>";

fn compiled(cell: &'static OnceCell<Regex>, pattern: &str) -> BrowserResult<&'static Regex> {
    cell.get_or_try_init(|| Regex::new(pattern)).map_err(|error| {
        BrowserError::new(
            "renderer.pattern_invalid",
            format!("pattern `{pattern}` failed to compile: {error}"),
        )
    })
}

/// `<style ...>...</style>`, inner text in group 1.
pub(crate) fn style_block() -> BrowserResult<&'static Regex> {
    static CELL: OnceCell<Regex> = OnceCell::new();
    compiled(&CELL, STYLE_BLOCK)
}

/// `<script ...>...</script>`, inner text in group 1.
pub(crate) fn script_block() -> BrowserResult<&'static Regex> {
    static CELL: OnceCell<Regex> = OnceCell::new();
    compiled(&CELL, SCRIPT_BLOCK)
}

/// A `<p>` start tag: `<p` then whitespace, `/` or `>`.
pub(crate) fn paragraph_tag() -> BrowserResult<&'static Regex> {
    static CELL: OnceCell<Regex> = OnceCell::new();
    compiled(&CELL, PARAGRAPH_TAG)
}
