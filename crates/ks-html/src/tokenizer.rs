//! Forgiving tag/text tokenizer for display markup.

use crate::entities::decode_entities;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Start {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    End {
        name: String,
    },
    /// Raw text; entities are still encoded.
    Text(String),
}

pub(crate) fn attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

/// Splits markup into tokens. Comments, doctypes and processing instructions
/// are dropped; the bodies of `script` and `style` are dropped as well.
pub(crate) fn tokenize(source: &str) -> Vec<Token> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut idx = 0;

    while idx < bytes.len() {
        if starts_with(bytes, idx, b"<!--") {
            idx = skip_comment(bytes, idx);
            continue;
        }

        if bytes[idx] == b'<' {
            if starts_with(bytes, idx, b"</") {
                if let Some((token, next)) = parse_end_tag(bytes, idx) {
                    tokens.push(token);
                    idx = next;
                    continue;
                }
            } else if starts_with(bytes, idx, b"<!") || starts_with(bytes, idx, b"<?") {
                idx = skip_to_gt(bytes, idx.saturating_add(2));
                continue;
            } else if let Some((token, next)) = parse_start_tag(bytes, idx) {
                let raw_text_tag = match &token {
                    Token::Start {
                        name, self_closing, ..
                    } if !*self_closing && is_raw_text_tag(name) => Some(name.clone()),
                    _ => None,
                };

                tokens.push(token);
                idx = next;

                if let Some(name) = raw_text_tag {
                    idx = skip_raw_text(bytes, idx, &name);
                    tokens.push(Token::End { name });
                }
                continue;
            }
        }

        let (text, next) = read_text(bytes, idx);
        if !text.is_empty() {
            tokens.push(Token::Text(text));
        }
        idx = next;
    }

    tokens
}

fn starts_with(bytes: &[u8], idx: usize, pattern: &[u8]) -> bool {
    let end = idx.saturating_add(pattern.len());
    end <= bytes.len() && bytes[idx..end] == *pattern
}

fn skip_comment(bytes: &[u8], start: usize) -> usize {
    let mut idx = start.saturating_add(4);
    while idx.saturating_add(2) < bytes.len() {
        if bytes[idx..idx + 3] == *b"-->" {
            return idx + 3;
        }
        idx += 1;
    }
    bytes.len()
}

fn skip_to_gt(bytes: &[u8], mut idx: usize) -> usize {
    while idx < bytes.len() {
        if bytes[idx] == b'>' {
            return idx + 1;
        }
        idx += 1;
    }
    bytes.len()
}

/// Text up to the next `<`. A `<` at `start` that did not open a tag is
/// taken as literal text.
fn read_text(bytes: &[u8], start: usize) -> (String, usize) {
    let mut idx = start.saturating_add(1).min(bytes.len());
    while idx < bytes.len() && bytes[idx] != b'<' {
        idx += 1;
    }
    (String::from_utf8_lossy(&bytes[start..idx]).into_owned(), idx)
}

/// Returns the index just past `</name ...>`, or the end of input.
fn skip_raw_text(bytes: &[u8], start: usize, name: &str) -> usize {
    let name = name.as_bytes();
    let mut idx = start;

    while idx < bytes.len() {
        let name_start = idx.saturating_add(2);
        let name_end = name_start.saturating_add(name.len());
        if bytes[idx] == b'<'
            && bytes.get(idx + 1) == Some(&b'/')
            && name_end <= bytes.len()
            && bytes[name_start..name_end].eq_ignore_ascii_case(name)
            && !bytes.get(name_end).copied().is_some_and(is_name_char)
        {
            return skip_to_gt(bytes, name_end);
        }
        idx += 1;
    }

    bytes.len()
}

fn parse_end_tag(bytes: &[u8], start: usize) -> Option<(Token, usize)> {
    let mut idx = skip_spaces(bytes, start + 2);
    let name_start = idx;
    while idx < bytes.len() && is_name_char(bytes[idx]) {
        idx += 1;
    }
    if idx == name_start {
        return None;
    }

    let name = String::from_utf8_lossy(&bytes[name_start..idx]).to_ascii_lowercase();
    let end = skip_to_gt(bytes, idx);
    if bytes.get(end.saturating_sub(1)) != Some(&b'>') {
        return None;
    }

    Some((Token::End { name }, end))
}

fn parse_start_tag(bytes: &[u8], start: usize) -> Option<(Token, usize)> {
    let mut idx = start + 1;
    let name_start = idx;
    while idx < bytes.len() && is_name_char(bytes[idx]) {
        idx += 1;
    }
    if idx == name_start || !bytes[name_start].is_ascii_alphabetic() {
        return None;
    }

    let name = String::from_utf8_lossy(&bytes[name_start..idx]).to_ascii_lowercase();
    let mut attrs = Vec::new();
    let mut self_closing = false;

    loop {
        idx = skip_spaces(bytes, idx);
        match bytes.get(idx) {
            None => return None,
            Some(b'>') => {
                idx += 1;
                break;
            }
            Some(b'/') => {
                self_closing = true;
                idx += 1;
                continue;
            }
            Some(_) => {}
        }
        self_closing = false;

        let attr_start = idx;
        while idx < bytes.len()
            && !bytes[idx].is_ascii_whitespace()
            && !matches!(bytes[idx], b'=' | b'>' | b'/')
        {
            idx += 1;
        }
        if idx == attr_start {
            idx += 1;
            continue;
        }
        let attr_name = String::from_utf8_lossy(&bytes[attr_start..idx]).to_ascii_lowercase();

        idx = skip_spaces(bytes, idx);
        let mut value = String::new();
        if bytes.get(idx) == Some(&b'=') {
            idx = skip_spaces(bytes, idx + 1);
            match bytes.get(idx).copied() {
                Some(quote @ (b'"' | b'\'')) => {
                    idx += 1;
                    let value_start = idx;
                    while idx < bytes.len() && bytes[idx] != quote {
                        idx += 1;
                    }
                    value = String::from_utf8_lossy(&bytes[value_start..idx]).into_owned();
                    idx = (idx + 1).min(bytes.len());
                }
                _ => {
                    let value_start = idx;
                    while idx < bytes.len()
                        && !bytes[idx].is_ascii_whitespace()
                        && bytes[idx] != b'>'
                    {
                        idx += 1;
                    }
                    value = String::from_utf8_lossy(&bytes[value_start..idx]).into_owned();
                }
            }
        }

        attrs.push((attr_name, decode_entities(&value)));
    }

    Some((
        Token::Start {
            name,
            attrs,
            self_closing,
        },
        idx,
    ))
}

fn skip_spaces(bytes: &[u8], mut idx: usize) -> usize {
    while idx < bytes.len() && bytes[idx].is_ascii_whitespace() {
        idx += 1;
    }
    idx
}

fn is_name_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b':')
}

fn is_raw_text_tag(name: &str) -> bool {
    matches!(name, "script" | "style")
}
