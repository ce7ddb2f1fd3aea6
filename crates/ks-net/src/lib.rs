//! Networking: address normalisation, HTTP/1.1 over TCP or rustls, and the
//! page fetcher used by the browser window.

pub mod client;
pub mod decode;
pub mod dns;
pub mod fetcher;
pub mod http;
pub mod tls;
pub mod tls_backend;
pub mod transport;
pub mod url;

pub use fetcher::FetchConfig;
pub use fetcher::FetchedPage;
pub use fetcher::Fetcher;
pub use http::Header;
pub use http::HttpResponse;
pub use http::HttpStatusCode;
pub use tls::TlsPolicy;
pub use tls::TlsVersion;
pub use tls::TrustStoreMode;
pub use crate::url::BrowserUrl;
pub use crate::url::Scheme;
pub use crate::url::normalize_address;

/// Fetcher wired to the system resolver, plain TCP and rustls.
pub type DefaultFetcher =
    Fetcher<dns::SystemDnsResolver, transport::TcpTransport, tls_backend::RustlsTlsAdapter>;
