use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::DeviceStream;

/// TCP transport to a receiver port.
///
/// Resolves `host:port` and connects to the first address that accepts,
/// optionally bounded by a connect timeout.
pub struct TcpTransport;

impl TcpTransport {
    /// Connect to `addr` (`host:port`) without a connect timeout (blocking).
    pub fn connect(addr: &str) -> Result<DeviceStream> {
        Self::connect_timeout(addr, None)
    }

    /// Connect to `addr` (`host:port`), bounding each attempt by `timeout`.
    pub fn connect_timeout(addr: &str, timeout: Option<Duration>) -> Result<DeviceStream> {
        let candidates = Self::resolve(addr)?;

        let mut last_err = None;
        for candidate in candidates {
            let attempt = match timeout {
                Some(timeout) => TcpStream::connect_timeout(&candidate, timeout),
                None => TcpStream::connect(candidate),
            };
            match attempt {
                Ok(stream) => {
                    info!(%candidate, "connected to receiver");
                    return Ok(DeviceStream::from_tcp(stream));
                }
                Err(err) => {
                    debug!(%candidate, error = %err, "connect attempt failed");
                    last_err = Some(err);
                }
            }
        }

        Err(TransportError::Connect {
            addr: addr.to_string(),
            source: last_err.unwrap_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    "address resolved to no candidates",
                )
            }),
        })
    }

    /// Resolve `addr` into candidate socket addresses.
    pub fn resolve(addr: &str) -> Result<Vec<SocketAddr>> {
        let candidates: Vec<SocketAddr> = addr
            .to_socket_addrs()
            .map_err(|e| TransportError::Resolve {
                addr: addr.to_string(),
                source: e,
            })?
            .collect();
        if candidates.is_empty() {
            return Err(TransportError::Resolve {
                addr: addr.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    "no addresses found",
                ),
            });
        }
        Ok(candidates)
    }

    /// Connect asynchronously (requires the `async` feature).
    #[cfg(feature = "async")]
    pub async fn connect_async(addr: &str) -> Result<tokio::net::TcpStream> {
        let stream = tokio::net::TcpStream::connect(addr)
            .await
            .map_err(|e| TransportError::Connect {
                addr: addr.to_string(),
                source: e,
            })?;
        info!(addr, "connected to receiver (async)");
        Ok(stream)
    }

    /// Transport name for diagnostics.
    pub fn transport_name() -> &'static str {
        "tcp"
    }
}
