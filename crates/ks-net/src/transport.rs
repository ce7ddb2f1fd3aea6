//! TCP transport.

use ks_core::BrowserError;
use ks_core::BrowserResult;
use std::io::Read;
use std::io::Write;
use std::net::SocketAddr;
use std::net::TcpStream;
use std::time::Duration;

/// Object-safe byte stream the HTTP client reads and writes.
pub trait IoStream: Read + Write {}
impl<T> IoStream for T where T: Read + Write {}

pub type BoxedIoStream = Box<dyn IoStream>;

/// Opens TCP connections.
pub trait Transport {
    fn connect(&self, address: SocketAddr, timeout: Duration) -> BrowserResult<TcpStream>;
}

/// Standard library TCP transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

impl Transport for TcpTransport {
    fn connect(&self, address: SocketAddr, timeout: Duration) -> BrowserResult<TcpStream> {
        let stream = TcpStream::connect_timeout(&address, timeout).map_err(|error| {
            BrowserError::new(
                "net.transport.connect_failed",
                format!("Connection to {address} failed: {error}"),
            )
        })?;

        stream.set_nodelay(true).map_err(|error| {
            BrowserError::new(
                "net.transport.nodelay_failed",
                format!("failed to enable TCP_NODELAY for {address}: {error}"),
            )
        })?;

        stream.set_read_timeout(Some(timeout)).map_err(|error| {
            BrowserError::new(
                "net.transport.read_timeout_failed",
                format!("failed to set read timeout for {address}: {error}"),
            )
        })?;

        stream.set_write_timeout(Some(timeout)).map_err(|error| {
            BrowserError::new(
                "net.transport.write_timeout_failed",
                format!("failed to set write timeout for {address}: {error}"),
            )
        })?;

        Ok(stream)
    }
}

/// Tries each address in order and returns the first connection that opens.
pub fn connect_first_available<T: Transport>(
    transport: &T,
    addresses: &[SocketAddr],
    timeout: Duration,
) -> BrowserResult<TcpStream> {
    let mut last_error: Option<BrowserError> = None;

    for address in addresses {
        match transport.connect(*address, timeout) {
            Ok(stream) => return Ok(stream),
            Err(error) => {
                last_error = Some(error);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        BrowserError::new(
            "net.transport.no_addresses",
            "no addresses available to open a connection",
        )
    }))
}
