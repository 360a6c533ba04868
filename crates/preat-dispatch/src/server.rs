use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use preat_assert::{EventGroup, EventWait};
use preat_frame::{ErrorCode, FrameBuffer, FrameError, FrameReader, FrameWriter};
use preat_transport::LinkListener;
use tracing::{debug, info, warn};

use crate::dispatcher::Dispatcher;
use crate::error::Result;

/// Configuration for a [`Server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServerConfig {
    /// Read timeout applied to every accepted link.
    ///
    /// When it expires the server checks whether it should stop. A frame
    /// that was only partly received at that moment is kept and completed
    /// by the next read.
    pub read_timeout: Option<Duration>,
}

/// Counters for one served link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStats {
    /// Frames answered.
    pub frames: u64,
    /// Frames answered with a failure response.
    pub failures: u64,
}

/// Serves a dispatcher over links, one session at a time.
pub struct Server<W = EventGroup> {
    dispatcher: Dispatcher<W>,
    config: ServerConfig,
}

impl<W: EventWait> Server<W> {
    pub fn new(dispatcher: Dispatcher<W>) -> Self {
        Self::with_config(dispatcher, ServerConfig::default())
    }

    pub fn with_config(dispatcher: Dispatcher<W>, config: ServerConfig) -> Self {
        Self { dispatcher, config }
    }

    pub fn dispatcher(&self) -> &Dispatcher<W> {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher<W> {
        &mut self.dispatcher
    }

    /// Accept links and serve them until `running` is cleared.
    ///
    /// The flag is checked between links and, with a read timeout set,
    /// while a link is idle. A failed session is logged and the next link
    /// is accepted.
    pub fn run(&mut self, listener: &LinkListener, running: &AtomicBool) -> Result<()> {
        while running.load(Ordering::SeqCst) {
            let link = listener.accept()?;
            if !running.load(Ordering::SeqCst) {
                break;
            }
            link.set_read_timeout(self.config.read_timeout)?;
            info!(transport = link.transport_name(), "session started");

            match self.serve_session(link, running) {
                Ok(stats) => info!(
                    frames = stats.frames,
                    failures = stats.failures,
                    "session ended"
                ),
                Err(err) => warn!(%err, "session aborted"),
            }
        }
        Ok(())
    }

    /// Answer frames from `stream` until it closes or `running` is cleared.
    pub fn serve_session<S>(&mut self, stream: S, running: &AtomicBool) -> Result<SessionStats>
    where
        S: Read + Write,
    {
        let mut reader = FrameReader::new(stream);
        let mut buf = FrameBuffer::new();
        let mut stats = SessionStats::default();

        while running.load(Ordering::SeqCst) {
            let outcome = match reader.read_frame(&mut buf) {
                Ok(_) => self.dispatcher.execute(&mut buf),
                Err(FrameError::InvalidLength { len, .. }) => {
                    warn!(len, "unusable frame length");
                    self.dispatcher.reject(&mut buf, ErrorCode::Crc);
                    Err(ErrorCode::Crc)
                }
                Err(FrameError::ConnectionClosed) => {
                    debug!("link closed by peer");
                    break;
                }
                Err(FrameError::Io(err))
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            FrameWriter::new(reader.get_mut()).write_frame(&buf)?;
            stats.frames += 1;
            if outcome.is_err() {
                stats.failures += 1;
            }
        }
        Ok(stats)
    }

    pub fn into_dispatcher(self) -> Dispatcher<W> {
        self.dispatcher
    }
}

impl<W> std::fmt::Debug for Server<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("dispatcher", &self.dispatcher)
            .field("config", &self.config)
            .finish()
    }
}
