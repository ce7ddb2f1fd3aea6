//! Style block extraction, the stylesheet adapter and paragraph colouring.

use core::fmt;

use ks_core::BrowserError;
use ks_core::BrowserResult;
use ks_css::CssLevel;
use ks_css::Stylesheet;
use regex_lite::Captures;

use crate::patterns;

/// Attribute text inserted into every unstyled `<p>` tag.
pub const PARAGRAPH_STYLE: &str = " style='color:blue;'";

/// How style block contents are handed to the stylesheet parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssConfig {
    pub level: CssLevel,
    pub charset: &'static str,
}

impl Default for CssConfig {
    fn default() -> Self {
        Self {
            level: CssLevel::Default,
            charset: "UTF-8",
        }
    }
}

/// Stylesheet lifecycle step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CssStage {
    Create,
    Append,
    Finalize,
}

impl fmt::Display for CssStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Create => "create",
            Self::Append => "append",
            Self::Finalize => "finalize",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StylesheetFailure {
    pub stage: CssStage,
    pub error: BrowserError,
}

/// Counters from one style pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StyleSummary {
    pub blocks: usize,
    pub failures: usize,
    pub rules: usize,
}

/// Runs one block of CSS text through create, append and finalise.
///
/// The sheet is dropped on every path, including early failures.
pub fn parse_style_block(css: &str, config: &CssConfig) -> Result<Stylesheet, StylesheetFailure> {
    let mut sheet =
        Stylesheet::create(config.level, config.charset).map_err(failed_at(CssStage::Create))?;
    sheet
        .append_data(css.as_bytes())
        .map_err(failed_at(CssStage::Append))?;
    sheet.data_done().map_err(failed_at(CssStage::Finalize))?;
    Ok(sheet)
}

fn failed_at(stage: CssStage) -> impl FnOnce(BrowserError) -> StylesheetFailure {
    move |error| StylesheetFailure { stage, error }
}

/// Parses every style block in document order, then removes them all.
pub fn extract_styles(markup: &str, config: &CssConfig) -> BrowserResult<(String, StyleSummary)> {
    let pattern = patterns::style_block()?;
    let mut summary = StyleSummary::default();

    for (index, captures) in pattern.captures_iter(markup).enumerate() {
        summary.blocks += 1;
        let css = captures.get(1).map_or("", |inner| inner.as_str());
        match parse_style_block(css, config) {
            Ok(sheet) => summary.rules += sheet.rule_count(),
            Err(failure) => {
                summary.failures += 1;
                tracing::warn!(
                    block = index,
                    stage = %failure.stage,
                    code = failure.error.code,
                    "stylesheet {} failed: {}",
                    failure.stage,
                    failure.error.message
                );
            }
        }
    }

    if summary.blocks == 0 {
        return Ok((markup.to_owned(), summary));
    }
    Ok((pattern.replace_all(markup, "").into_owned(), summary))
}

/// Adds [`PARAGRAPH_STYLE`] before the `>` of every `<p>` tag lacking `style=`.
///
/// Returns the rewritten markup and how many tags were changed.
pub fn colour_paragraphs(markup: &str) -> BrowserResult<(String, usize)> {
    let pattern = patterns::paragraph_tag()?;
    let mut coloured = 0;

    let output = pattern.replace_all(markup, |captures: &Captures<'_>| {
        let tag = captures.get(0).map_or("", |found| found.as_str());
        if tag.to_ascii_lowercase().contains("style=") {
            return tag.to_owned();
        }
        match tag.strip_suffix('>') {
            Some(open) => {
                coloured += 1;
                format!("{open}{PARAGRAPH_STYLE}>")
            }
            None => tag.to_owned(),
        }
    });

    Ok((output.into_owned(), coloured))
}

#[cfg(test)]
mod tests {
    use super::CssConfig;
    use super::CssStage;
    use super::StyleSummary;
    use super::colour_paragraphs;
    use super::extract_styles;
    use super::parse_style_block;

    fn extracted(markup: &str) -> (String, StyleSummary) {
        match extract_styles(markup, &CssConfig::default()) {
            Ok(result) => result,
            Err(error) => panic!("{error}"),
        }
    }

    fn coloured(markup: &str) -> (String, usize) {
        match colour_paragraphs(markup) {
            Ok(result) => result,
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn removes_every_style_block() {
        let (markup, summary) = extracted(
            "<head><style>p { color: red }</style><STYLE type=\"text/css\">\nh1 { margin: 0 }\n</STYLE></head><body>x</body>",
        );
        assert_eq!(markup, "<head></head><body>x</body>");
        assert_eq!(summary.blocks, 2);
        assert_eq!(summary.failures, 0);
        assert_eq!(summary.rules, 2);
    }

    #[test]
    fn broken_css_is_still_removed() {
        let (markup, summary) = extracted("<style>p { color: red</style><p>a</p>");
        assert_eq!(markup, "<p>a</p>");
        assert_eq!(summary.blocks, 1);
        assert_eq!(summary.failures, 1);
        assert_eq!(summary.rules, 0);
    }

    #[test]
    fn deeply_nested_css_is_a_failure_not_a_crash() {
        let depth = 100_000;
        let markup = format!(
            "<style>{}p{{color:red}}{}</style><p>a</p>",
            "@media{".repeat(depth),
            "}".repeat(depth)
        );
        let (markup, summary) = extracted(&markup);
        assert_eq!(markup, "<p>a</p>");
        assert_eq!(summary.blocks, 1);
        assert_eq!(summary.failures, 1);
    }

    #[test]
    fn markup_without_style_blocks_is_untouched() {
        let (markup, summary) = extracted("<p>plain</p>");
        assert_eq!(markup, "<p>plain</p>");
        assert_eq!(summary.blocks, 0);
    }

    #[test]
    fn adapter_reports_the_failing_stage() {
        let unsupported = CssConfig {
            charset: "ISO-8859-1",
            ..CssConfig::default()
        };
        match parse_style_block("p {}", &unsupported) {
            Ok(_) => panic!("expected a create failure"),
            Err(failure) => assert_eq!(failure.stage, CssStage::Create),
        }

        match parse_style_block("p { color: red", &CssConfig::default()) {
            Ok(_) => panic!("expected a finalize failure"),
            Err(failure) => {
                assert_eq!(failure.stage, CssStage::Finalize);
                assert_eq!(failure.stage.to_string(), "finalize");
            }
        }

        match parse_style_block("a { color: red } b { color: blue }", &CssConfig::default()) {
            Ok(sheet) => assert_eq!(sheet.rule_count(), 2),
            Err(failure) => panic!("{}", failure.error),
        }
    }

    #[test]
    fn colours_unstyled_paragraphs() {
        let (markup, count) = coloured("<p>one</p><p class=\"lead\">two</p><P>three</P>");
        assert_eq!(
            markup,
            "<p style='color:blue;'>one</p><p class=\"lead\" style='color:blue;'>two</p><P style='color:blue;'>three</P>"
        );
        assert_eq!(count, 3);
    }

    #[test]
    fn styled_paragraphs_are_left_alone() {
        let source = "<p style=\"margin:0\">a</p><p STYLE='color:green'>b</p>";
        let (markup, count) = coloured(source);
        assert_eq!(markup, source);
        assert_eq!(count, 0);
    }

    #[test]
    fn lookalike_tags_are_not_coloured() {
        let source = "<pre>x</pre><param name=a><progress></progress>";
        let (markup, count) = coloured(source);
        assert_eq!(markup, source);
        assert_eq!(count, 0);
    }
}
