/// Errors that end a server session or the server loop.
///
/// Protocol failures are never errors here: they are answered on the link.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] preat_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] preat_frame::FrameError),
}

pub type Result<T> = std::result::Result<T, ServeError>;
