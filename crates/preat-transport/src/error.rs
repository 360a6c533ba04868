use std::path::PathBuf;

/// Errors that can occur while opening or using a link.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The link address could not be parsed.
    #[error("invalid link address '{0}' (expected unix:PATH, tcp:HOST:PORT or a socket path)")]
    InvalidAddr(String),

    /// The address names a transport this platform does not provide.
    #[error("unsupported transport on this platform: {0}")]
    Unsupported(&'static str),

    /// Failed to bind to the specified address.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the link.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },
}

pub type Result<T> = std::result::Result<T, TransportError>;
