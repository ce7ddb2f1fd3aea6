//! One-shot HTTP/1.1 client over the DNS, transport and TLS seams.

use crate::decode::decode_content_encoding;
use crate::dns::DnsResolver;
use crate::dns::SystemDnsResolver;
use crate::http::Header;
use crate::http::HttpMethod;
use crate::http::HttpRequest;
use crate::http::HttpResponse;
use crate::http::HttpStatusCode;
use crate::http::HttpVersion;
use crate::http::header_contains;
use crate::tls::TlsPolicy;
use crate::tls_backend::RustlsTlsAdapter;
use crate::tls_backend::TlsBackendAdapter;
use crate::transport::BoxedIoStream;
use crate::transport::TcpTransport;
use crate::transport::Transport;
use crate::transport::connect_first_available;
use ks_core::BrowserError;
use ks_core::BrowserResult;
use std::io::Read;
use std::io::Write;
use std::time::Duration;

const MAX_RESPONSE_HEAD_BYTES: usize = 128 * 1024;
const MAX_CHUNK_LINE_BYTES: usize = 8 * 1024;
/// Largest encoded body accepted, whatever the framing.
pub const MAX_RESPONSE_BODY_BYTES: usize = 32 * 1024 * 1024;

/// HTTP/1.1 client that opens a fresh connection per request.
pub struct Http11Client<R = SystemDnsResolver, T = TcpTransport, A = RustlsTlsAdapter>
where
    R: DnsResolver,
    T: Transport,
    A: TlsBackendAdapter,
{
    dns: R,
    transport: T,
    tls_adapter: A,
    tls_policy: TlsPolicy,
    timeout: Duration,
}

impl Http11Client {
    pub fn new(tls_policy: TlsPolicy, timeout: Duration) -> Self {
        Self::with_parts(
            SystemDnsResolver,
            TcpTransport,
            RustlsTlsAdapter,
            tls_policy,
            timeout,
        )
    }
}

impl<R, T, A> Http11Client<R, T, A>
where
    R: DnsResolver,
    T: Transport,
    A: TlsBackendAdapter,
{
    fn with_parts(
        dns: R,
        transport: T,
        tls_adapter: A,
        tls_policy: TlsPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            dns,
            transport,
            tls_adapter,
            tls_policy,
            timeout,
        }
    }

    pub fn execute(&self, request: &HttpRequest) -> BrowserResult<HttpResponse> {
        let mut stream = self.open_stream(request)?;
        write_request(&mut stream, request)?;
        read_response(&mut stream, request.method)
    }

    fn open_stream(&self, request: &HttpRequest) -> BrowserResult<BoxedIoStream> {
        let url = &request.url;
        let addresses = self.dns.resolve(url.host(), url.port())?;
        let stream = connect_first_available(&self.transport, &addresses, self.timeout)?;

        if url.is_secure() {
            self.tls_adapter
                .connect_tls(stream, url.host(), &self.tls_policy)
        } else {
            Ok(Box::new(stream))
        }
    }
}

fn write_request(stream: &mut dyn Write, request: &HttpRequest) -> BrowserResult<()> {
    stream.write_all(&request.encode()).map_err(|error| {
        BrowserError::new(
            "net.http.write_failed",
            format!("Sending the request failed: {error}"),
        )
    })?;
    stream.flush().map_err(|error| {
        BrowserError::new(
            "net.http.write_failed",
            format!("Sending the request failed: {error}"),
        )
    })
}

fn read_response(stream: &mut dyn Read, method: HttpMethod) -> BrowserResult<HttpResponse> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 4096];
    let header_end = loop {
        if let Some(end) = find_header_end(&buffer) {
            break end;
        }

        let read = stream.read(&mut chunk).map_err(|error| {
            BrowserError::new(
                "net.http.read_head_failed",
                format!("Reading the response failed: {error}"),
            )
        })?;

        if read == 0 {
            return Err(BrowserError::new(
                "net.http.unexpected_eof",
                "Connection closed before a complete response was received",
            ));
        }

        buffer.extend_from_slice(&chunk[..read]);
        if buffer.len() > MAX_RESPONSE_HEAD_BYTES && find_header_end(&buffer).is_none() {
            return Err(BrowserError::new(
                "net.http.head_too_large",
                format!("HTTP response head exceeds {MAX_RESPONSE_HEAD_BYTES} bytes"),
            ));
        }
    };

    let head_text = std::str::from_utf8(&buffer[..header_end]).map_err(|error| {
        BrowserError::new(
            "net.http.head_invalid_utf8",
            format!("HTTP response head is not valid UTF-8 text: {error}"),
        )
    })?;

    let mut lines = head_text.split("\r\n");
    let status_line = lines.next().ok_or_else(|| {
        BrowserError::new("net.http.status_line_missing", "missing HTTP status line")
    })?;
    let (version, status, reason) = parse_status_line(status_line)?;

    let mut headers = Vec::new();
    for line in lines.filter(|line| !line.is_empty()) {
        let (name, value) = line.split_once(':').ok_or_else(|| {
            BrowserError::new(
                "net.http.header_invalid",
                format!("invalid HTTP header line `{line}`"),
            )
        })?;
        headers.push(Header::new(name.trim(), value.trim())?);
    }

    let prefetched = buffer[header_end..].to_vec();
    let body = if method == HttpMethod::Head || !status.allows_body() {
        Vec::new()
    } else {
        let raw = read_body(stream, &headers, prefetched)?;
        decode_content_encoding(&headers, &raw)?
    };

    Ok(HttpResponse {
        version,
        status,
        reason,
        headers,
        body,
    })
}

fn read_body(
    stream: &mut dyn Read,
    headers: &[Header],
    mut prefetched: Vec<u8>,
) -> BrowserResult<Vec<u8>> {
    let has_transfer_encoding = headers
        .iter()
        .any(|header| header.name.eq_ignore_ascii_case("transfer-encoding"));
    if has_transfer_encoding {
        if !header_contains(headers, "transfer-encoding", "chunked") {
            return Err(BrowserError::new(
                "net.http.transfer_encoding_unsupported",
                "only chunked transfer encoding is supported",
            ));
        }
        return read_chunked_body(stream, prefetched);
    }

    if let Some(len) = parse_content_length(headers)? {
        if len > MAX_RESPONSE_BODY_BYTES {
            return Err(body_too_large());
        }
        if prefetched.len() < len {
            let missing = (len - prefetched.len()) as u64;
            Read::take(&mut *stream, missing)
                .read_to_end(&mut prefetched)
                .map_err(read_body_failed)?;
            if prefetched.len() < len {
                return Err(BrowserError::new(
                    "net.http.unexpected_eof",
                    format!(
                        "Connection closed after {} of {len} body bytes",
                        prefetched.len()
                    ),
                ));
            }
        } else {
            prefetched.truncate(len);
        }
        return Ok(prefetched);
    }

    // Requests carry `Connection: close`, so the body runs to end of stream.
    if prefetched.len() > MAX_RESPONSE_BODY_BYTES {
        return Err(body_too_large());
    }
    let allowance = (MAX_RESPONSE_BODY_BYTES + 1 - prefetched.len()) as u64;
    Read::take(&mut *stream, allowance)
        .read_to_end(&mut prefetched)
        .map_err(read_body_failed)?;
    if prefetched.len() > MAX_RESPONSE_BODY_BYTES {
        return Err(body_too_large());
    }
    Ok(prefetched)
}

fn body_too_large() -> BrowserError {
    BrowserError::new(
        "net.http.body_too_large",
        format!("Response body exceeds {MAX_RESPONSE_BODY_BYTES} bytes"),
    )
}

fn read_body_failed(error: std::io::Error) -> BrowserError {
    BrowserError::new(
        "net.http.read_body_failed",
        format!("Reading the response body failed: {error}"),
    )
}

struct PrefixedStreamReader<'a> {
    prefetched: Vec<u8>,
    offset: usize,
    stream: &'a mut dyn Read,
}

impl<'a> PrefixedStreamReader<'a> {
    fn new(stream: &'a mut dyn Read, prefetched: Vec<u8>) -> Self {
        Self {
            prefetched,
            offset: 0,
            stream,
        }
    }

    fn read_exact_into(&mut self, out: &mut [u8]) -> BrowserResult<()> {
        let available = self.prefetched.len().saturating_sub(self.offset);
        let prefix_take = available.min(out.len());

        if prefix_take > 0 {
            out[..prefix_take]
                .copy_from_slice(&self.prefetched[self.offset..self.offset + prefix_take]);
            self.offset += prefix_take;
        }

        if prefix_take < out.len() {
            self.stream
                .read_exact(&mut out[prefix_take..])
                .map_err(|error| {
                    BrowserError::new(
                        "net.http.read_body_failed",
                        format!("Reading the chunked response body failed: {error}"),
                    )
                })?;
        }

        Ok(())
    }
}

fn read_chunked_body(stream: &mut dyn Read, prefetched: Vec<u8>) -> BrowserResult<Vec<u8>> {
    let mut reader = PrefixedStreamReader::new(stream, prefetched);
    let mut decoded = Vec::new();

    loop {
        let size_line = read_crlf_line(&mut reader)?;
        if size_line.is_empty() {
            continue;
        }

        let size_token = size_line.split(';').next().unwrap_or_default().trim();
        let chunk_size = usize::from_str_radix(size_token, 16).map_err(|error| {
            BrowserError::new(
                "net.http.chunk_size_invalid",
                format!("invalid chunk size `{size_token}`: {error}"),
            )
        })?;

        if chunk_size == 0 {
            // Trailers are read and ignored.
            while !read_crlf_line(&mut reader)?.is_empty() {}
            break;
        }

        let start = decoded.len();
        let end = start
            .checked_add(chunk_size)
            .filter(|end| *end <= MAX_RESPONSE_BODY_BYTES)
            .ok_or_else(body_too_large)?;
        decoded.resize(end, 0);
        reader.read_exact_into(&mut decoded[start..])?;

        let mut terminator = [0_u8; 2];
        reader.read_exact_into(&mut terminator)?;
        if terminator != *b"\r\n" {
            return Err(BrowserError::new(
                "net.http.chunk_terminator_invalid",
                "chunk data is missing trailing CRLF",
            ));
        }
    }

    Ok(decoded)
}

fn read_crlf_line(reader: &mut PrefixedStreamReader<'_>) -> BrowserResult<String> {
    let mut line = Vec::new();

    loop {
        let mut byte = [0_u8; 1];
        reader.read_exact_into(&mut byte)?;
        line.push(byte[0]);

        if line.len() > MAX_CHUNK_LINE_BYTES {
            return Err(BrowserError::new(
                "net.http.chunk_line_too_large",
                format!("chunk metadata line exceeds {MAX_CHUNK_LINE_BYTES} bytes"),
            ));
        }

        if line.ends_with(b"\r\n") {
            line.truncate(line.len() - 2);
            return Ok(String::from_utf8_lossy(&line).into_owned());
        }
    }
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|idx| idx + 4)
}

fn parse_status_line(line: &str) -> BrowserResult<(HttpVersion, HttpStatusCode, String)> {
    let mut parts = line.splitn(3, ' ');
    let version = match parts.next() {
        Some("HTTP/1.0") => HttpVersion::Http10,
        Some("HTTP/1.1") => HttpVersion::Http11,
        other => {
            return Err(BrowserError::new(
                "net.http.version_unsupported",
                format!("unsupported response version `{}`", other.unwrap_or_default()),
            ));
        }
    };

    let code_text = parts.next().ok_or_else(|| {
        BrowserError::new(
            "net.http.status_line_invalid",
            format!("missing status code in status line `{line}`"),
        )
    })?;
    let code_value = code_text.parse::<u16>().map_err(|error| {
        BrowserError::new(
            "net.http.status_line_invalid",
            format!("invalid status code `{code_text}`: {error}"),
        )
    })?;
    let reason = parts.next().unwrap_or_default().trim().to_owned();

    Ok((version, HttpStatusCode::new(code_value)?, reason))
}

fn parse_content_length(headers: &[Header]) -> BrowserResult<Option<usize>> {
    let mut value: Option<usize> = None;
    for header in headers
        .iter()
        .filter(|header| header.name.eq_ignore_ascii_case("content-length"))
    {
        let parsed = header.value.trim().parse::<usize>().map_err(|error| {
            BrowserError::new(
                "net.http.content_length_invalid",
                format!("invalid Content-Length `{}`: {error}", header.value),
            )
        })?;

        match value {
            Some(existing) if existing != parsed => {
                return Err(BrowserError::new(
                    "net.http.content_length_conflict",
                    "conflicting Content-Length headers in response",
                ));
            }
            _ => value = Some(parsed),
        }
    }

    Ok(value)
}
