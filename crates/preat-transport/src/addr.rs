use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::TransportError;

/// Where a link lives.
///
/// Parsed from `unix:PATH`, `tcp:HOST:PORT`, or a bare filesystem path
/// (treated as a Unix domain socket).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAddr {
    /// Filesystem-path Unix domain socket.
    Unix(PathBuf),
    /// TCP endpoint in `host:port` form.
    Tcp(String),
}

impl LinkAddr {
    /// Short transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match self {
            LinkAddr::Unix(_) => "unix-domain-socket",
            LinkAddr::Tcp(_) => "tcp",
        }
    }
}

impl FromStr for LinkAddr {
    type Err = TransportError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        if input.is_empty() {
            return Err(TransportError::InvalidAddr(input.to_string()));
        }

        if let Some(path) = input.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(TransportError::InvalidAddr(input.to_string()));
            }
            return Ok(LinkAddr::Unix(PathBuf::from(path)));
        }

        if let Some(endpoint) = input.strip_prefix("tcp:") {
            let valid = endpoint
                .rsplit_once(':')
                .map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
                .unwrap_or(false);
            if !valid {
                return Err(TransportError::InvalidAddr(input.to_string()));
            }
            return Ok(LinkAddr::Tcp(endpoint.to_string()));
        }

        Ok(LinkAddr::Unix(PathBuf::from(input)))
    }
}

impl fmt::Display for LinkAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkAddr::Unix(path) => write!(f, "unix:{}", path.display()),
            LinkAddr::Tcp(endpoint) => write!(f, "tcp:{endpoint}"),
        }
    }
}
