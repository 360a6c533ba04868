use std::net::TcpListener;

use tracing::{debug, info};

use crate::addr::LinkAddr;
use crate::error::{Result, TransportError};
use crate::stream::LinkStream;

/// Accepts incoming links on a Unix domain socket or TCP port.
///
/// A Unix socket file created by [`LinkListener::bind`] is removed again on
/// drop, unless something else has replaced it in the meantime.
pub struct LinkListener {
    inner: ListenerInner,
    addr: LinkAddr,
}

enum ListenerInner {
    #[cfg(unix)]
    Unix {
        listener: std::os::unix::net::UnixListener,
        created_inode: Option<(u64, u64)>,
    },
    Tcp(TcpListener),
}

impl LinkListener {
    /// Maximum socket path length (`sockaddr_un.sun_path`).
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind and listen on `addr`.
    ///
    /// An existing Unix socket file at the path is treated as stale and
    /// removed; any other kind of file makes binding fail.
    pub fn bind(addr: &LinkAddr) -> Result<Self> {
        let inner = match addr {
            #[cfg(unix)]
            LinkAddr::Unix(path) => bind_unix(addr, path)?,
            #[cfg(not(unix))]
            LinkAddr::Unix(_) => return Err(TransportError::Unsupported("unix-domain-socket")),
            LinkAddr::Tcp(endpoint) => {
                let listener =
                    TcpListener::bind(endpoint.as_str()).map_err(|source| TransportError::Bind {
                        addr: addr.to_string(),
                        source,
                    })?;
                ListenerInner::Tcp(listener)
            }
        };

        // Port 0 binds are resolved to the real port so callers can connect.
        let addr = match &inner {
            ListenerInner::Tcp(listener) => LinkAddr::Tcp(listener.local_addr()?.to_string()),
            #[cfg(unix)]
            ListenerInner::Unix { .. } => addr.clone(),
        };

        info!(%addr, "listening for links");
        Ok(Self { inner, addr })
    }

    /// Accept an incoming link (blocking).
    pub fn accept(&self) -> Result<LinkStream> {
        let stream = match &self.inner {
            #[cfg(unix)]
            ListenerInner::Unix { listener, .. } => {
                let (stream, _peer) = listener.accept().map_err(TransportError::Accept)?;
                LinkStream::from_unix(stream)
            }
            ListenerInner::Tcp(listener) => {
                let (stream, peer) = listener.accept().map_err(TransportError::Accept)?;
                debug!(%peer, "accepted tcp link");
                LinkStream::from_tcp(stream)?
            }
        };
        debug!(addr = %self.addr, "accepted link");
        Ok(stream)
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> &LinkAddr {
        &self.addr
    }
}

#[cfg(unix)]
fn bind_unix(addr: &LinkAddr, path: &std::path::Path) -> Result<ListenerInner> {
    use std::os::unix::fs::{FileTypeExt, MetadataExt};

    let bind_err = |source: std::io::Error| TransportError::Bind {
        addr: addr.to_string(),
        source,
    };

    let path_bytes = path.as_os_str().len();
    if path_bytes >= LinkListener::MAX_PATH_LEN {
        return Err(TransportError::PathTooLong {
            path: path.to_path_buf(),
            len: path_bytes,
            max: LinkListener::MAX_PATH_LEN,
        });
    }

    if let Ok(metadata) = std::fs::symlink_metadata(path) {
        if !metadata.file_type().is_socket() {
            return Err(bind_err(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "existing path is not a unix socket",
            )));
        }
        debug!(?path, "removing stale socket");
        std::fs::remove_file(path).map_err(bind_err)?;
    }

    let listener = std::os::unix::net::UnixListener::bind(path).map_err(bind_err)?;
    let created = std::fs::symlink_metadata(path).map_err(bind_err)?;

    Ok(ListenerInner::Unix {
        listener,
        created_inode: Some((created.dev(), created.ino())),
    })
}

impl Drop for LinkListener {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::fs::{FileTypeExt, MetadataExt};

            let (ListenerInner::Unix { created_inode, .. }, LinkAddr::Unix(path)) =
                (&self.inner, &self.addr)
            else {
                return;
            };
            let Some((dev, ino)) = *created_inode else {
                return;
            };
            match std::fs::symlink_metadata(path) {
                Ok(metadata)
                    if metadata.file_type().is_socket()
                        && metadata.dev() == dev
                        && metadata.ino() == ino =>
                {
                    debug!(?path, "cleaning up socket file");
                    let _ = std::fs::remove_file(path);
                }
                Ok(_) => debug!(?path, "socket path identity changed; skipping cleanup"),
                Err(_) => {}
            }
        }
    }
}

impl std::fmt::Debug for LinkListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkListener")
            .field("addr", &self.addr)
            .finish()
    }
}
