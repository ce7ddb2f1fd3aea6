//! HTTP request/response types.

use crate::url::BrowserUrl;
use ks_core::BrowserError;
use ks_core::BrowserResult;

/// Outbound methods the fetcher issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
        }
    }
}

/// HTTP protocol version seen on a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    Http10,
    Http11,
}

impl HttpVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http10 => "HTTP/1.0",
            Self::Http11 => "HTTP/1.1",
        }
    }
}

/// Single header with a wire-safe name and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: &str, value: &str) -> BrowserResult<Self> {
        if name.is_empty() || !name.bytes().all(is_token_char) {
            return Err(BrowserError::new(
                "net.http.header_name_invalid",
                format!("invalid HTTP header name `{name}`"),
            ));
        }

        if value.bytes().any(|byte| matches!(byte, b'\r' | b'\n' | 0)) {
            return Err(BrowserError::new(
                "net.http.header_value_invalid",
                format!("invalid characters found in HTTP header `{name}`"),
            ));
        }

        Ok(Self {
            name: name.to_owned(),
            value: value.to_owned(),
        })
    }
}

/// Looks up the first header named `name`, ignoring ASCII case.
pub fn find_header<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|header| header.name.eq_ignore_ascii_case(name))
        .map(|header| header.value.as_str())
}

/// True when any comma-separated token of header `name` equals `value`.
pub fn header_contains(headers: &[Header], name: &str, value: &str) -> bool {
    headers.iter().any(|header| {
        header.name.eq_ignore_ascii_case(name)
            && header
                .value
                .split(',')
                .any(|token| token.trim().eq_ignore_ascii_case(value))
    })
}

/// Outgoing request. Bodies are never sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: BrowserUrl,
    pub headers: Vec<Header>,
}

impl HttpRequest {
    /// Builds a request with `Host` already set from the URL authority.
    pub fn new(method: HttpMethod, url: BrowserUrl) -> BrowserResult<Self> {
        let host = Header::new("Host", &url.authority())?;
        Ok(Self {
            method,
            url,
            headers: vec![host],
        })
    }

    pub fn with_header(mut self, name: &str, value: &str) -> BrowserResult<Self> {
        if name.eq_ignore_ascii_case("host") {
            return Err(BrowserError::new(
                "net.http.duplicate_header",
                "header `Host` is derived from the URL",
            ));
        }
        self.headers.push(Header::new(name, value)?);
        Ok(self)
    }

    pub fn request_target(&self) -> String {
        self.url.path_and_query()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Serialises the request head for an HTTP/1.1 connection.
    pub fn encode(&self) -> Vec<u8> {
        let mut encoded = Vec::new();
        encoded.extend_from_slice(self.method.as_str().as_bytes());
        encoded.push(b' ');
        encoded.extend_from_slice(self.request_target().as_bytes());
        encoded.push(b' ');
        encoded.extend_from_slice(HttpVersion::Http11.as_str().as_bytes());
        encoded.extend_from_slice(b"\r\n");

        for header in &self.headers {
            encoded.extend_from_slice(header.name.as_bytes());
            encoded.extend_from_slice(b": ");
            encoded.extend_from_slice(header.value.as_bytes());
            encoded.extend_from_slice(b"\r\n");
        }
        encoded.extend_from_slice(b"\r\n");
        encoded
    }
}

/// HTTP status code in the 100-599 range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HttpStatusCode(u16);

impl HttpStatusCode {
    pub fn new(code: u16) -> BrowserResult<Self> {
        if (100..=599).contains(&code) {
            return Ok(Self(code));
        }

        Err(BrowserError::new(
            "net.http.status_invalid",
            format!("status code must be 100-599, got `{code}`"),
        ))
    }

    pub fn as_u16(self) -> u16 {
        self.0
    }

    pub fn is_success(self) -> bool {
        (200..=299).contains(&self.0)
    }

    pub fn is_redirect(self) -> bool {
        matches!(self.0, 301 | 302 | 303 | 307 | 308)
    }

    pub fn allows_body(self) -> bool {
        !((100..200).contains(&self.0) || self.0 == 204 || self.0 == 304)
    }
}

/// Parsed response with a fully decoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub version: HttpVersion,
    pub status: HttpStatusCode,
    pub reason: String,
    pub headers: Vec<Header>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn is_token_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(
            byte,
            b'!' | b'#'
                | b'$'
                | b'%'
                | b'&'
                | b'\''
                | b'*'
                | b'+'
                | b'-'
                | b'.'
                | b'^'
                | b'_'
                | b'`'
                | b'|'
                | b'~'
        )
}
