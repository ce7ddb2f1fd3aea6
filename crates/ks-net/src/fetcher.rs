//! Address-to-page fetching: normalise, GET, follow redirects, decode.

use crate::client::Http11Client;
use crate::decode::decode_text;
use crate::dns::DnsResolver;
use crate::dns::SystemDnsResolver;
use crate::http::HttpMethod;
use crate::http::HttpRequest;
use crate::tls::TlsPolicy;
use crate::tls_backend::RustlsTlsAdapter;
use crate::tls_backend::TlsBackendAdapter;
use crate::transport::TcpTransport;
use crate::transport::Transport;
use crate::url::BrowserUrl;
use crate::url::normalize_address;
use ks_core::BrowserError;
use ks_core::BrowserResult;
use std::time::Duration;

const DEFAULT_USER_AGENT: &str = concat!("Kestrel/", env!("CARGO_PKG_VERSION"));
const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,*/*;q=0.8";

/// Transport defaults for a fetch. Not exposed to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub max_redirects: usize,
    pub user_agent: String,
    pub tls: TlsPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_redirects: 10,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            tls: TlsPolicy::default(),
        }
    }
}

/// Successful fetch: the final URL after redirects and the decoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

/// Fetches one page per call. Holds no per-request state.
pub struct Fetcher<R, T, A>
where
    R: DnsResolver,
    T: Transport,
    A: TlsBackendAdapter,
{
    client: Http11Client<R, T, A>,
    config: FetchConfig,
}

impl Fetcher<SystemDnsResolver, TcpTransport, RustlsTlsAdapter> {
    pub fn new(config: FetchConfig) -> Self {
        let client = Http11Client::new(config.tls.clone(), config.timeout);
        Self { client, config }
    }
}

impl<R, T, A> Fetcher<R, T, A>
where
    R: DnsResolver,
    T: Transport,
    A: TlsBackendAdapter,
{
    /// Normalises `address` and fetches it.
    pub fn fetch(&self, address: &str) -> BrowserResult<FetchedPage> {
        let normalized = normalize_address(address);
        let url = BrowserUrl::parse(&normalized)?;
        self.fetch_url(url)
    }

    pub fn fetch_url(&self, url: BrowserUrl) -> BrowserResult<FetchedPage> {
        let original = url.as_str().to_owned();
        let mut current = url;
        let mut redirects = 0_usize;

        loop {
            tracing::debug!(url = current.as_str(), "GET");
            let request = HttpRequest::new(HttpMethod::Get, current.clone())?
                .with_header("User-Agent", &self.config.user_agent)?
                .with_header("Accept", DEFAULT_ACCEPT)?
                .with_header("Accept-Encoding", "gzip, deflate, br")?
                .with_header("Connection", "close")?;
            let response = self.client.execute(&request)?;

            if response.status.is_redirect() {
                if let Some(location) = response.header("Location") {
                    if redirects >= self.config.max_redirects {
                        return Err(BrowserError::new(
                            "net.http.too_many_redirects",
                            format!(
                                "Too many redirects (>{}) while loading {original}",
                                self.config.max_redirects
                            ),
                        ));
                    }

                    let next = current.join(location)?;
                    if current.is_secure() && !next.is_secure() {
                        return Err(BrowserError::new(
                            "net.http.insecure_redirect",
                            format!(
                                "Insecure redirect from {} to {}",
                                current.as_str(),
                                next.as_str()
                            ),
                        ));
                    }

                    current = next;
                    redirects = redirects.saturating_add(1);
                    continue;
                }
            }

            if !response.status.is_success() {
                let reason = if response.reason.is_empty() {
                    format!("status {}", response.status.as_u16())
                } else {
                    response.reason.clone()
                };
                return Err(BrowserError::new(
                    "net.http.status",
                    format!(
                        "Error transferring {} - server replied: {reason}",
                        current.as_str()
                    ),
                ));
            }

            let content_type = response.header("Content-Type").map(str::to_owned);
            let body = decode_text(&response.body, content_type.as_deref());
            return Ok(FetchedPage {
                url: current.as_str().to_owned(),
                status: response.status.as_u16(),
                content_type,
                body,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FetchConfig;
    use super::Fetcher;
    use crate::DefaultFetcher;
    use std::io::Read;
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    /// Serves one canned response per accepted connection, in order.
    fn serve(responses: Vec<String>) -> u16 {
        let listener = match TcpListener::bind("127.0.0.1:0") {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        let port = match listener.local_addr() {
            Ok(address) => address.port(),
            Err(error) => panic!("{error}"),
        };

        thread::spawn(move || {
            for response in responses {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                let mut head = Vec::new();
                let mut byte = [0_u8; 1];
                while !head.ends_with(b"\r\n\r\n") {
                    match stream.read(&mut byte) {
                        Ok(1) => head.push(byte[0]),
                        _ => break,
                    }
                }
                let _ = stream.write_all(response.as_bytes());
            }
        });

        port
    }

    fn fetcher() -> DefaultFetcher {
        let config = FetchConfig {
            timeout: Duration::from_secs(5),
            ..FetchConfig::default()
        };
        Fetcher::new(config)
    }

    #[test]
    fn fetches_body_from_address_without_scheme() {
        let port = serve(vec![
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 9\r\n\r\n<p>hi</p>"
                .to_owned(),
        ]);

        let page = match fetcher().fetch(&format!("127.0.0.1:{port}/index.html")) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert_eq!(page.body, "<p>hi</p>");
        assert_eq!(page.status, 200);
        assert_eq!(page.url, format!("http://127.0.0.1:{port}/index.html"));
    }

    #[test]
    fn follows_relative_redirects() {
        let port = serve(vec![
            "HTTP/1.1 302 Found\r\nLocation: /final\r\nContent-Length: 0\r\n\r\n".to_owned(),
            "HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\ndone".to_owned(),
        ]);

        let page = match fetcher().fetch(&format!("http://127.0.0.1:{port}/start")) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert_eq!(page.body, "done");
        assert!(page.url.ends_with("/final"));
    }

    #[test]
    fn non_success_status_is_an_error() {
        let port = serve(vec![
            "HTTP/1.1 404 Not Found\r\nContent-Length: 3\r\n\r\nnope".to_owned(),
        ]);

        match fetcher().fetch(&format!("http://127.0.0.1:{port}/missing")) {
            Ok(page) => panic!("unexpected page: {page:?}"),
            Err(error) => {
                assert_eq!(error.code, "net.http.status");
                assert!(error.message.ends_with("server replied: Not Found"));
            }
        }
    }

    #[test]
    fn refused_connection_is_a_network_error() {
        let port = match TcpListener::bind("127.0.0.1:0") {
            Ok(listener) => match listener.local_addr() {
                Ok(address) => address.port(),
                Err(error) => panic!("{error}"),
            },
            Err(error) => panic!("{error}"),
        };

        match fetcher().fetch(&format!("127.0.0.1:{port}")) {
            Ok(page) => panic!("unexpected page: {page:?}"),
            Err(error) => assert!(error.code.starts_with("net.transport.")),
        }
    }

    #[test]
    fn stops_after_redirect_limit() {
        let config = FetchConfig {
            timeout: Duration::from_secs(5),
            max_redirects: 1,
            ..FetchConfig::default()
        };
        let fetcher = Fetcher::new(config);
        let redirect = "HTTP/1.1 301 Moved\r\nLocation: /again\r\nContent-Length: 0\r\n\r\n";
        let port = serve(vec![redirect.to_owned(), redirect.to_owned()]);

        match fetcher.fetch(&format!("http://127.0.0.1:{port}/")) {
            Ok(page) => panic!("unexpected page: {page:?}"),
            Err(error) => assert_eq!(error.code, "net.http.too_many_redirects"),
        }
    }
}
