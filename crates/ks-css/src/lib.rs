//! Stylesheet objects with a create / append / finalise lifecycle.
//!
//! A [`Stylesheet`] buffers raw bytes until [`Stylesheet::data_done`] parses
//! them into [`StyleRule`]s. Dropping the handle releases it at any stage.

use ks_core::BrowserError;
use ks_core::BrowserResult;

/// Largest stylesheet source accepted, in bytes.
pub const MAX_STYLESHEET_BYTES: usize = 4 * 1024 * 1024;

/// Deepest run of nested grouping rules such as `@media` that is flattened.
pub const MAX_NESTING_DEPTH: usize = 32;

/// CSS language level a sheet is parsed against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CssLevel {
    Level1,
    Level2,
    Level21,
    Level3,
    /// Whatever level the parser treats as current; CSS 2.1 here.
    #[default]
    Default,
}

/// One declaration, whitespace-normalised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub value: String,
    pub important: bool,
}

/// Selector plus its declaration block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRule {
    pub selector: String,
    pub declarations: Vec<Declaration>,
}

impl StyleRule {
    /// Compact `selector{name:value;...}` form, mostly for logs and tests.
    pub fn to_css(&self) -> String {
        let body = self
            .declarations
            .iter()
            .map(|declaration| {
                if declaration.important {
                    format!("{}:{} !important", declaration.name, declaration.value)
                } else {
                    format!("{}:{}", declaration.name, declaration.value)
                }
            })
            .collect::<Vec<_>>()
            .join(";");
        format!("{}{{{body}}}", self.selector)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SheetState {
    Collecting,
    Done,
}

#[derive(Debug)]
pub struct Stylesheet {
    level: CssLevel,
    source: Vec<u8>,
    state: SheetState,
    rules: Vec<StyleRule>,
}

impl Stylesheet {
    /// Creates an empty sheet. Only UTF-8 input is supported.
    pub fn create(level: CssLevel, charset: &str) -> BrowserResult<Self> {
        let normalized = charset.trim().to_ascii_lowercase();
        if !matches!(normalized.as_str(), "utf-8" | "utf8" | "unicode-1-1-utf-8") {
            return Err(BrowserError::new(
                "css.stylesheet.charset_unsupported",
                format!("unsupported stylesheet charset `{charset}`"),
            ));
        }

        Ok(Self {
            level,
            source: Vec::new(),
            state: SheetState::Collecting,
            rules: Vec::new(),
        })
    }

    pub fn level(&self) -> CssLevel {
        self.level
    }

    pub fn append_data(&mut self, data: &[u8]) -> BrowserResult<()> {
        if self.state == SheetState::Done {
            return Err(BrowserError::new(
                "css.stylesheet.append_after_done",
                "stylesheet data was already finalised",
            ));
        }

        if self.source.len().saturating_add(data.len()) > MAX_STYLESHEET_BYTES {
            return Err(BrowserError::new(
                "css.stylesheet.too_large",
                format!("stylesheet exceeds {MAX_STYLESHEET_BYTES} bytes"),
            ));
        }

        self.source.extend_from_slice(data);
        Ok(())
    }

    /// Finalises the sheet and parses every buffered byte.
    pub fn data_done(&mut self) -> BrowserResult<()> {
        if self.state == SheetState::Done {
            return Err(BrowserError::new(
                "css.stylesheet.already_done",
                "stylesheet data was already finalised",
            ));
        }

        let text = std::str::from_utf8(&self.source).map_err(|error| {
            BrowserError::new(
                "css.stylesheet.invalid_utf8",
                format!("stylesheet is not valid UTF-8: {error}"),
            )
        })?;

        let stripped = strip_comments(text)?;
        let mut rules = Vec::new();
        parse_rules(&stripped, 0, &mut rules)?;

        self.rules = rules;
        self.state = SheetState::Done;
        self.source = Vec::new();
        Ok(())
    }

    pub fn is_done(&self) -> bool {
        self.state == SheetState::Done
    }

    pub fn rules(&self) -> &[StyleRule] {
        &self.rules
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

/// Walks CSS text while tracking strings and bracket nesting.
struct Scanner<'a> {
    bytes: &'a [u8],
    quote: Option<u8>,
    escape: bool,
    parens: u32,
    brackets: u32,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            quote: None,
            escape: false,
            parens: 0,
            brackets: 0,
        }
    }

    /// Feeds one byte; returns true when it sits at top level outside strings.
    fn step(&mut self, byte: u8) -> bool {
        if let Some(quote) = self.quote {
            if self.escape {
                self.escape = false;
            } else if byte == b'\\' {
                self.escape = true;
            } else if byte == quote {
                self.quote = None;
            }
            return false;
        }

        match byte {
            b'\'' | b'"' => {
                self.quote = Some(byte);
                false
            }
            b'(' => {
                self.parens = self.parens.saturating_add(1);
                false
            }
            b')' => {
                self.parens = self.parens.saturating_sub(1);
                false
            }
            b'[' => {
                self.brackets = self.brackets.saturating_add(1);
                false
            }
            b']' => {
                self.brackets = self.brackets.saturating_sub(1);
                false
            }
            _ => self.parens == 0 && self.brackets == 0,
        }
    }

    fn find_top_level(mut self, from: usize, target: u8) -> Option<usize> {
        (from..self.bytes.len()).find(|&idx| {
            let byte = self.bytes[idx];
            self.step(byte) && byte == target
        })
    }

    fn split_top_level(mut self, delimiter: u8) -> Vec<(usize, usize)> {
        let mut parts = Vec::new();
        let mut start = 0_usize;
        for idx in 0..self.bytes.len() {
            let byte = self.bytes[idx];
            if self.step(byte) && byte == delimiter {
                parts.push((start, idx));
                start = idx + 1;
            }
        }
        parts.push((start, self.bytes.len()));
        parts
    }
}

fn strip_comments(input: &str) -> BrowserResult<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut scanner = Scanner::new(input);
    let mut idx = 0_usize;

    while idx < bytes.len() {
        let byte = bytes[idx];
        if scanner.quote.is_none() && byte == b'/' && bytes.get(idx + 1) == Some(&b'*') {
            let close = input[idx + 2..].find("*/").ok_or_else(|| {
                BrowserError::new("css.stylesheet.unterminated", "unterminated comment")
            })?;
            idx += close + 4;
            out.push(b' ');
            continue;
        }

        scanner.step(byte);
        out.push(byte);
        idx += 1;
    }

    if scanner.quote.is_some() {
        return Err(BrowserError::new(
            "css.stylesheet.unterminated",
            "unterminated string",
        ));
    }

    Ok(String::from_utf8_lossy(&out).into_owned())
}

fn find_matching_brace(input: &str, open: usize) -> Option<usize> {
    let mut scanner = Scanner::new(input);
    let mut depth = 0_u32;
    for (idx, &byte) in input.as_bytes().iter().enumerate().skip(open) {
        if scanner.quote.is_none() && byte == b'{' {
            depth = depth.saturating_add(1);
        } else if scanner.quote.is_none() && byte == b'}' {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(idx);
            }
        }
        scanner.step(byte);
    }
    None
}

fn parse_rules(input: &str, depth: usize, out: &mut Vec<StyleRule>) -> BrowserResult<()> {
    if depth > MAX_NESTING_DEPTH {
        return Err(BrowserError::new(
            "css.stylesheet.nesting_too_deep",
            format!("grouping rules nest deeper than {MAX_NESTING_DEPTH} levels"),
        ));
    }
    let mut cursor = 0_usize;

    while cursor < input.len() {
        let Some(open) = Scanner::new(input).find_top_level(cursor, b'{') else {
            // Trailing statements such as `@import url(a.css);` carry no rules.
            break;
        };
        let close = find_matching_brace(input, open).ok_or_else(|| {
            BrowserError::new("css.stylesheet.unterminated", "unterminated block")
        })?;

        let prelude = &input[cursor..open];
        // Statement at-rules before the block end at top-level semicolons.
        let selector_start = Scanner::new(prelude)
            .split_top_level(b';')
            .last()
            .map(|&(start, _)| start)
            .unwrap_or(0);
        let selector = collapse_whitespace(&prelude[selector_start..]);
        let body = &input[open + 1..close];
        cursor = close + 1;

        if selector.is_empty() {
            continue;
        }

        if let Some(at_rule) = selector.strip_prefix('@') {
            let name = at_rule
                .split(|ch: char| ch.is_whitespace() || ch == '(')
                .next()
                .unwrap_or_default()
                .to_ascii_lowercase();
            if matches!(name.as_str(), "media" | "supports" | "layer" | "document") {
                parse_rules(body, depth + 1, out)?;
            }
            continue;
        }

        let declarations = parse_declarations(body);
        if !declarations.is_empty() {
            out.push(StyleRule {
                selector,
                declarations,
            });
        }
    }

    Ok(())
}

/// Parses a declaration list such as the body of a rule or a `style` attribute.
pub fn parse_declarations(input: &str) -> Vec<Declaration> {
    Scanner::new(input)
        .split_top_level(b';')
        .into_iter()
        .filter_map(|(start, end)| {
            let declaration = input[start..end].trim();
            let colon = Scanner::new(declaration).find_top_level(0, b':')?;
            let name = declaration[..colon].trim().to_ascii_lowercase();
            let mut value = collapse_whitespace(&declaration[colon + 1..]);

            let lower = value.to_ascii_lowercase();
            let important = lower.ends_with("!important");
            if important {
                value.truncate(value.len() - "!important".len());
                value = value.trim_end().to_owned();
            }

            if name.is_empty() || value.is_empty() {
                return None;
            }

            Some(Declaration {
                name,
                value,
                important,
            })
        })
        .collect()
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::CssLevel;
    use super::MAX_NESTING_DEPTH;
    use super::Stylesheet;
    use super::parse_declarations;

    fn finished(source: &str) -> Stylesheet {
        let mut sheet = match Stylesheet::create(CssLevel::Default, "UTF-8") {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        if let Err(error) = sheet.append_data(source.as_bytes()) {
            panic!("{error}");
        }
        if let Err(error) = sheet.data_done() {
            panic!("{error}");
        }
        sheet
    }

    #[test]
    fn parses_simple_rules() {
        let sheet = finished("body { color: red; } .card { padding: 8px; }");
        assert!(sheet.is_done());
        assert_eq!(sheet.rule_count(), 2);
        assert_eq!(sheet.rules()[0].to_css(), "body{color:red}");
        assert_eq!(sheet.rules()[1].to_css(), ".card{padding:8px}");
    }

    #[test]
    fn strips_comments_and_empty_rules() {
        let sheet = finished("/* x */ p { font-size: 14px; } div { }");
        assert_eq!(sheet.rule_count(), 1);
        assert_eq!(sheet.rules()[0].to_css(), "p{font-size:14px}");
    }

    #[test]
    fn flattens_media_blocks_and_skips_other_at_rules() {
        let sheet = finished(
            "@import url(a.css); @media screen and (min-width: 800px) { .hero { margin: 0 auto; } } @font-face { font-family: x; } h1 { color: #fff !important }",
        );
        let rules: Vec<String> = sheet.rules().iter().map(|rule| rule.to_css()).collect();
        assert_eq!(rules, vec![".hero{margin:0 auto}", "h1{color:#fff !important}"]);
    }

    #[test]
    fn keeps_semicolons_inside_function_values() {
        let sheet = finished(
            r#".icon { background-image: url("data:image/svg+xml;utf8,<svg></svg>"); color: red; }"#,
        );
        assert_eq!(
            sheet.rules()[0].to_css(),
            r#".icon{background-image:url("data:image/svg+xml;utf8,<svg></svg>");color:red}"#
        );
    }

    #[test]
    fn data_may_arrive_in_pieces() {
        let mut sheet = match Stylesheet::create(CssLevel::Level21, "utf-8") {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert!(sheet.append_data(b"p { col").is_ok());
        assert!(sheet.append_data(b"or: blue }").is_ok());
        assert!(sheet.data_done().is_ok());
        assert_eq!(sheet.rules()[0].to_css(), "p{color:blue}");
    }

    #[test]
    fn rejects_unsupported_charset() {
        match Stylesheet::create(CssLevel::Default, "ISO-8859-1") {
            Ok(_) => panic!("expected an error"),
            Err(error) => assert_eq!(error.code, "css.stylesheet.charset_unsupported"),
        }
    }

    #[test]
    fn finalising_fails_on_unterminated_input() {
        for source in ["p { color: red;", "p { color: red } /* open", "p { content: \"x }"] {
            let mut sheet = match Stylesheet::create(CssLevel::Default, "UTF-8") {
                Ok(value) => value,
                Err(error) => panic!("{error}"),
            };
            assert!(sheet.append_data(source.as_bytes()).is_ok());
            match sheet.data_done() {
                Ok(()) => panic!("expected an error for `{source}`"),
                Err(error) => assert_eq!(error.code, "css.stylesheet.unterminated"),
            }
            assert!(!sheet.is_done());
        }
    }

    #[test]
    fn finalising_fails_on_runaway_nesting() {
        let depth = 200_000;
        let source = format!("{}p{{color:red}}{}", "@media{".repeat(depth), "}".repeat(depth));
        let mut sheet = match Stylesheet::create(CssLevel::Default, "UTF-8") {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert!(sheet.append_data(source.as_bytes()).is_ok());
        match sheet.data_done() {
            Ok(()) => panic!("expected an error"),
            Err(error) => assert_eq!(error.code, "css.stylesheet.nesting_too_deep"),
        }
        assert!(!sheet.is_done());
    }

    #[test]
    fn flattens_nesting_up_to_the_limit() {
        let source = format!(
            "{}p{{color:red}}{}",
            "@media screen{".repeat(MAX_NESTING_DEPTH),
            "}".repeat(MAX_NESTING_DEPTH)
        );
        let sheet = finished(&source);
        assert_eq!(sheet.rule_count(), 1);
        assert_eq!(sheet.rules()[0].to_css(), "p{color:red}");
    }

    #[test]
    fn statement_before_a_rule_is_not_part_of_its_selector() {
        let sheet = finished("@charset \"utf-8\"; @import url(a.css); h2 { color: red }");
        assert_eq!(sheet.rules()[0].selector, "h2");
    }

    #[test]
    fn finalising_fails_on_invalid_utf8() {
        let mut sheet = match Stylesheet::create(CssLevel::Default, "UTF-8") {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert!(sheet.append_data(&[b'p', 0xFF]).is_ok());
        assert!(sheet.data_done().is_err());
    }

    #[test]
    fn rejects_data_after_finalising() {
        let mut sheet = finished("p { color: red }");
        assert!(sheet.append_data(b"a { color: blue }").is_err());
        assert!(sheet.data_done().is_err());
    }

    #[test]
    fn parses_inline_declarations() {
        let declarations = parse_declarations("color: RED ; font-weight:bold;; bogus");
        assert_eq!(declarations.len(), 2);
        assert_eq!(declarations[0].name, "color");
        assert_eq!(declarations[0].value, "RED");
        assert_eq!(declarations[1].name, "font-weight");
    }
}
