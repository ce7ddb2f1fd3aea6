//! Styled text blocks built from display markup.

use crate::color::Rgb;
use crate::color::color_from_style;
use crate::entities::decode_entities;
use crate::tokenizer::Token;
use crate::tokenizer::attr;
use crate::tokenizer::tokenize;

/// Inline appearance of a run of text. `None` colour means "theme default".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpanStyle {
    pub color: Option<Rgb>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub monospace: bool,
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub style: SpanStyle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    /// `h1` through `h6`.
    Heading(u8),
    /// `marker` is `"•"` or `"3."`.
    ListItem {
        marker: String,
    },
    Preformatted,
    Rule,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    /// Nesting depth from lists and block quotes.
    pub indent: usize,
    pub spans: Vec<Span>,
}

impl Block {
    pub fn text(&self) -> String {
        self.spans.iter().map(|span| span.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RichTextDocument {
    pub title: Option<String>,
    pub blocks: Vec<Block>,
}

impl RichTextDocument {
    /// Converts markup into blocks. Unknown tags are transparent; `head`,
    /// `title`, `style` and `script` content is not displayed.
    pub fn from_markup(markup: &str) -> Self {
        let mut builder = Builder::default();
        for token in tokenize(markup) {
            builder.push(token);
        }
        builder.finish()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Block texts joined by newlines.
    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .map(Block::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The first non-empty `<title>` in `markup`, whitespace-collapsed.
pub fn extract_title(markup: &str) -> Option<String> {
    let mut tokens = tokenize(markup).into_iter();
    while let Some(token) = tokens.next() {
        if !matches!(&token, Token::Start { name, .. } if name == "title") {
            continue;
        }

        let mut raw = String::new();
        for token in tokens.by_ref() {
            match token {
                Token::Text(text) => raw.push_str(&text),
                Token::End { name } if name == "title" => break,
                _ => {}
            }
        }

        let title = collapse_whitespace(&decode_entities(&raw));
        if !title.is_empty() {
            return Some(title);
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Unordered,
    Ordered(usize),
}

#[derive(Debug)]
struct OpenElement {
    name: String,
    style: SpanStyle,
}

#[derive(Debug, Default)]
struct Builder {
    blocks: Vec<Block>,
    current: Option<Block>,
    elements: Vec<OpenElement>,
    contexts: Vec<BlockKind>,
    lists: Vec<ListKind>,
    quote_depth: usize,
    pre_depth: usize,
    hidden_depth: usize,
    title: Option<String>,
    title_buffer: Option<String>,
}

impl Builder {
    fn push(&mut self, token: Token) {
        match token {
            Token::Start {
                name,
                attrs,
                self_closing,
            } => self.start(name, &attrs, self_closing),
            Token::End { name } => self.end(&name),
            Token::Text(text) => self.text(&text),
        }
    }

    fn finish(mut self) -> RichTextDocument {
        self.close_block();
        RichTextDocument {
            title: self.title,
            blocks: self.blocks,
        }
    }

    fn start(&mut self, name: String, attrs: &[(String, String)], self_closing: bool) {
        match name.as_str() {
            "br" => {
                if self.hidden_depth == 0 {
                    self.append("\n".to_owned());
                }
                return;
            }
            "hr" => {
                if self.hidden_depth == 0 {
                    self.close_block();
                    self.blocks.push(Block {
                        kind: BlockKind::Rule,
                        indent: self.indent(),
                        spans: Vec::new(),
                    });
                }
                return;
            }
            _ => {}
        }
        if self_closing || is_void(&name) {
            return;
        }

        if is_hidden(&name) {
            self.hidden_depth += 1;
            if name == "title" && self.title_buffer.is_none() {
                self.title_buffer = Some(String::new());
            }
        }

        if let Some(kind) = self.block_kind_for(&name) {
            self.close_block();
            self.contexts.push(kind);
        }
        match name.as_str() {
            "blockquote" => self.quote_depth += 1,
            "pre" => self.pre_depth += 1,
            "ul" => self.lists.push(ListKind::Unordered),
            "ol" => self.lists.push(ListKind::Ordered(0)),
            _ => {}
        }

        let mut style = self.style();
        match name.as_str() {
            "strong" | "b" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => style.bold = true,
            "em" | "i" => style.italic = true,
            "u" => style.underline = true,
            "code" | "pre" => style.monospace = true,
            "a" => {
                if let Some(href) = attr(attrs, "href") {
                    style.underline = true;
                    style.link = Some(href.to_owned());
                }
            }
            _ => {}
        }
        if let Some(color) = attr(attrs, "style").and_then(color_from_style) {
            style.color = Some(color);
        }

        self.elements.push(OpenElement { name, style });
    }

    fn end(&mut self, name: &str) {
        let Some(position) = self
            .elements
            .iter()
            .rposition(|element| element.name == name)
        else {
            return;
        };

        let closed = self.elements.split_off(position);
        for element in closed.iter().rev() {
            self.close_element(&element.name);
        }
    }

    fn close_element(&mut self, name: &str) {
        if is_hidden(name) {
            self.hidden_depth = self.hidden_depth.saturating_sub(1);
            if name == "title" {
                let title = self
                    .title_buffer
                    .take()
                    .map(|raw| collapse_whitespace(&raw))
                    .filter(|title| !title.is_empty());
                if self.title.is_none() {
                    self.title = title;
                }
            }
        }

        if is_block(name) {
            self.close_block();
            self.contexts.pop();
        }
        match name {
            "blockquote" => self.quote_depth = self.quote_depth.saturating_sub(1),
            "pre" => self.pre_depth = self.pre_depth.saturating_sub(1),
            "ul" | "ol" => {
                self.lists.pop();
            }
            _ => {}
        }
    }

    fn text(&mut self, raw: &str) {
        let decoded = decode_entities(raw);
        if self.hidden_depth > 0 {
            if let Some(buffer) = self.title_buffer.as_mut() {
                buffer.push_str(&decoded);
            }
            return;
        }

        if self.pre_depth > 0 {
            self.append(decoded);
            return;
        }

        let mut collapsed = collapse_runs(&decoded);
        let at_line_start = self.current.as_ref().is_none_or(|block| {
            block
                .spans
                .last()
                .is_none_or(|span| span.text.ends_with([' ', '\n']))
        });
        if at_line_start {
            collapsed = collapsed.trim_start_matches(' ').to_owned();
        }
        if collapsed.is_empty() {
            return;
        }
        self.append(collapsed);
    }

    fn append(&mut self, text: String) {
        let style = self.style();
        if self.current.is_none() {
            let kind = self.contexts.last().cloned().unwrap_or(BlockKind::Paragraph);
            self.current = Some(Block {
                kind,
                indent: self.indent(),
                spans: Vec::new(),
            });
        }
        let Some(block) = self.current.as_mut() else {
            return;
        };

        match block.spans.last_mut() {
            Some(last) if last.style == style => last.text.push_str(&text),
            _ => block.spans.push(Span { text, style }),
        }
    }

    fn close_block(&mut self) {
        let Some(mut block) = self.current.take() else {
            return;
        };

        if block.kind != BlockKind::Preformatted {
            if let Some(last) = block.spans.last_mut() {
                let trimmed = last.text.trim_end_matches(' ').len();
                last.text.truncate(trimmed);
            }
            block.spans.retain(|span| !span.text.is_empty());
        }
        if !block.spans.is_empty() {
            self.blocks.push(block);
        }
    }

    fn block_kind_for(&mut self, name: &str) -> Option<BlockKind> {
        let kind = match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                BlockKind::Heading(name[1..].parse().unwrap_or(1))
            }
            "pre" => BlockKind::Preformatted,
            "li" => {
                let marker = match self.lists.last_mut() {
                    Some(ListKind::Ordered(counter)) => {
                        *counter += 1;
                        format!("{counter}.")
                    }
                    _ => "•".to_owned(),
                };
                BlockKind::ListItem { marker }
            }
            _ if is_block(name) => match self.contexts.last() {
                Some(BlockKind::ListItem { .. }) => BlockKind::Paragraph,
                Some(kind @ BlockKind::Heading(_)) => kind.clone(),
                _ => BlockKind::Paragraph,
            },
            _ => return None,
        };
        Some(kind)
    }

    fn style(&self) -> SpanStyle {
        self.elements
            .last()
            .map(|element| element.style.clone())
            .unwrap_or_default()
    }

    fn indent(&self) -> usize {
        self.lists.len() + self.quote_depth
    }
}

fn is_hidden(name: &str) -> bool {
    matches!(name, "head" | "title" | "style" | "script" | "noscript" | "template")
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "p" | "div"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "ul"
            | "ol"
            | "li"
            | "pre"
            | "blockquote"
            | "section"
            | "article"
            | "header"
            | "footer"
            | "nav"
            | "main"
            | "table"
            | "tr"
            | "body"
    )
}

fn is_void(name: &str) -> bool {
    matches!(
        name,
        "area" | "base" | "col" | "embed" | "img" | "input" | "link" | "meta" | "param"
            | "source" | "track" | "wbr"
    )
}

/// Collapses ASCII whitespace runs to a single space. Non-breaking spaces
/// survive.
fn collapse_runs(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_space = false;
    for ch in input.chars() {
        if ch.is_ascii_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::BlockKind;
    use super::RichTextDocument;
    use super::extract_title;
    use crate::color::Rgb;

    #[test]
    fn coloured_paragraph_becomes_a_blue_block() {
        let document = RichTextDocument::from_markup("<p style='color:blue;'>hi</p>");
        assert_eq!(document.blocks.len(), 1);
        let block = &document.blocks[0];
        assert_eq!(block.kind, BlockKind::Paragraph);
        assert_eq!(block.text(), "hi");
        assert_eq!(block.spans[0].style.color, Some(Rgb::new(0, 0, 255)));
    }

    #[test]
    fn error_fragment_renders_red_with_bold_label() {
        let document = RichTextDocument::from_markup(
            "<p style='color:red;'><strong>Error:</strong> Connection refused</p>",
        );
        let block = &document.blocks[0];
        assert_eq!(block.text(), "Error: Connection refused");
        assert_eq!(block.spans.len(), 2);
        assert!(block.spans[0].style.bold);
        assert!(!block.spans[1].style.bold);
        assert!(
            block
                .spans
                .iter()
                .all(|span| span.style.color == Some(Rgb::new(255, 0, 0)))
        );
    }

    #[test]
    fn collapses_whitespace_and_decodes_entities() {
        let document = RichTextDocument::from_markup("<div>\n  fish   &amp;\n chips  </div>");
        assert_eq!(document.plain_text(), "fish & chips");
    }

    #[test]
    fn hides_head_and_records_title() {
        let document = RichTextDocument::from_markup(
            "<html><head><title> My  Page </title><meta charset=utf-8></head><body><h2>Top</h2><p>Body</p></body></html>",
        );
        assert_eq!(document.title.as_deref(), Some("My Page"));
        assert_eq!(document.plain_text(), "Top\nBody");
        assert_eq!(document.blocks[0].kind, BlockKind::Heading(2));
        assert!(document.blocks[0].spans[0].style.bold);
    }

    #[test]
    fn builds_list_items_with_markers() {
        let document =
            RichTextDocument::from_markup("<ol><li>one</li><li>two</li></ol><ul><li>dot</li></ul>");
        let markers = document
            .blocks
            .iter()
            .map(|block| match &block.kind {
                BlockKind::ListItem { marker } => marker.clone(),
                other => panic!("unexpected block {other:?}"),
            })
            .collect::<Vec<_>>();
        assert_eq!(markers, vec!["1.", "2.", "•"]);
        assert!(document.blocks.iter().all(|block| block.indent == 1));
    }

    #[test]
    fn preformatted_text_keeps_whitespace() {
        let document = RichTextDocument::from_markup("<pre>  a\n    b</pre>");
        assert_eq!(document.blocks[0].kind, BlockKind::Preformatted);
        assert_eq!(document.blocks[0].text(), "  a\n    b");
        assert!(document.blocks[0].spans[0].style.monospace);
    }

    #[test]
    fn inline_styles_nest_and_unwind() {
        let document = RichTextDocument::from_markup(
            "<p>a <em>b <a href=\"/x\">c</a></em> d<br>e</p><hr><p>f</p>",
        );
        let first = &document.blocks[0];
        assert_eq!(first.text(), "a b c d\ne");
        let link = first
            .spans
            .iter()
            .find(|span| span.text == "c")
            .map(|span| span.style.clone());
        match link {
            Some(style) => {
                assert!(style.italic);
                assert!(style.underline);
                assert_eq!(style.link.as_deref(), Some("/x"));
            }
            None => panic!("link span missing"),
        }
        assert_eq!(document.blocks[1].kind, BlockKind::Rule);
        assert_eq!(document.blocks[2].text(), "f");
    }

    #[test]
    fn unknown_tags_are_transparent() {
        let document =
            RichTextDocument::from_markup("<custom-tag><p>x<blink>y</blink></p></custom-tag>");
        assert_eq!(document.plain_text(), "xy");
    }

    #[test]
    fn unclosed_inline_tags_end_with_their_block() {
        let document = RichTextDocument::from_markup("<p><b>bold</p><p>plain</p>");
        assert!(document.blocks[0].spans[0].style.bold);
        assert!(!document.blocks[1].spans[0].style.bold);
    }

    #[test]
    fn empty_markup_has_no_blocks() {
        assert!(RichTextDocument::from_markup("").is_empty());
        assert!(RichTextDocument::from_markup("<style>p{}</style><script>1</script>  ").is_empty());
    }

    #[test]
    fn extracts_the_first_non_empty_title() {
        assert_eq!(
            extract_title("<title> </title><TITLE>Hello &amp;\n  World</TITLE>"),
            Some("Hello & World".to_owned())
        );
        assert_eq!(extract_title("<p>no title</p>"), None);
    }
}
