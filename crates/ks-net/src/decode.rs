//! Content-encoding and charset decoding of response bodies.

use crate::http::Header;
use brotli::Decompressor;
use encoding_rs::Encoding;
use flate2::read::DeflateDecoder;
use flate2::read::GzDecoder;
use flate2::read::ZlibDecoder;
use ks_core::BrowserError;
use ks_core::BrowserResult;
use std::io::Cursor;
use std::io::Read;

const CHARSET_SNIFF_BYTES: usize = 8192;

/// Undoes every `Content-Encoding` layer, last applied first.
pub fn decode_content_encoding(headers: &[Header], body: &[u8]) -> BrowserResult<Vec<u8>> {
    let encodings = content_encodings(headers);
    if encodings.is_empty() {
        return Ok(body.to_vec());
    }

    let mut decoded = body.to_vec();
    for encoding in encodings.iter().rev() {
        decoded = match encoding.as_str() {
            "identity" => decoded,
            "gzip" | "x-gzip" => decode_gzip(&decoded)?,
            "deflate" => decode_deflate(&decoded)?,
            "br" => decode_brotli(&decoded)?,
            _ => {
                return Err(BrowserError::new(
                    "net.http.content_encoding_unsupported",
                    format!("Unsupported content encoding `{encoding}`"),
                ));
            }
        };
    }

    Ok(decoded)
}

fn content_encodings(headers: &[Header]) -> Vec<String> {
    headers
        .iter()
        .filter(|header| header.name.eq_ignore_ascii_case("content-encoding"))
        .flat_map(|header| header.value.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

fn decode_gzip(body: &[u8]) -> BrowserResult<Vec<u8>> {
    let mut decoded = Vec::new();
    GzDecoder::new(Cursor::new(body))
        .read_to_end(&mut decoded)
        .map_err(|error| {
            BrowserError::new(
                "net.http.decode_failed",
                format!("gzip decode failed: {error}"),
            )
        })?;
    Ok(decoded)
}

fn decode_deflate(body: &[u8]) -> BrowserResult<Vec<u8>> {
    // Servers disagree on whether "deflate" means zlib-wrapped or raw.
    let mut zlib_decoded = Vec::new();
    if ZlibDecoder::new(Cursor::new(body))
        .read_to_end(&mut zlib_decoded)
        .is_ok()
    {
        return Ok(zlib_decoded);
    }

    let mut raw_decoded = Vec::new();
    DeflateDecoder::new(Cursor::new(body))
        .read_to_end(&mut raw_decoded)
        .map_err(|error| {
            BrowserError::new(
                "net.http.decode_failed",
                format!("deflate decode failed: {error}"),
            )
        })?;
    Ok(raw_decoded)
}

fn decode_brotli(body: &[u8]) -> BrowserResult<Vec<u8>> {
    let mut decoded = Vec::new();
    Decompressor::new(Cursor::new(body), 4096)
        .read_to_end(&mut decoded)
        .map_err(|error| {
            BrowserError::new(
                "net.http.decode_failed",
                format!("brotli decode failed: {error}"),
            )
        })?;
    Ok(decoded)
}

/// Decodes a body as text.
///
/// An HTML `<meta charset>` wins over the `Content-Type` charset; without
/// either the bytes are read as UTF-8 with replacement characters.
pub fn decode_text(body: &[u8], content_type: Option<&str>) -> String {
    let label = parse_charset_from_html_prefix(body)
        .or_else(|| content_type.and_then(parse_charset_from_content_type));

    if let Some(encoding) = label.and_then(|label| Encoding::for_label(label.as_bytes())) {
        let (decoded, _, _) = encoding.decode(body);
        return decoded.into_owned();
    }

    String::from_utf8_lossy(body).into_owned()
}

fn parse_charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|part| {
        let (name, value) = part.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let label = value.trim().trim_matches('"').trim_matches('\'');
        (!label.is_empty()).then(|| label.to_owned())
    })
}

fn parse_charset_from_html_prefix(body: &[u8]) -> Option<String> {
    let prefix = String::from_utf8_lossy(&body[..body.len().min(CHARSET_SNIFF_BYTES)]);
    let lower = prefix.to_ascii_lowercase();
    let mut search_start = 0_usize;

    while let Some(relative) = lower[search_start..].find("charset=") {
        let charset_start = search_start + relative + "charset=".len();
        if let Some(label) = parse_charset_label(&prefix[charset_start..]) {
            return Some(label);
        }
        search_start = charset_start;
    }

    None
}

fn parse_charset_label(input: &str) -> Option<String> {
    let trimmed = input.trim_start();
    let first = trimmed.chars().next()?;

    let label = if first == '"' || first == '\'' {
        let rest = &trimmed[first.len_utf8()..];
        &rest[..rest.find(first)?]
    } else {
        let end = trimmed
            .find(|ch: char| ch.is_whitespace() || matches!(ch, '"' | '\'' | ';' | '>' | '/'))
            .unwrap_or(trimmed.len());
        &trimmed[..end]
    };

    let label = label.trim();
    (!label.is_empty()).then(|| label.to_owned())
}
