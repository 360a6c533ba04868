use std::io::{ErrorKind, Read};

use crate::codec::{FrameBuffer, FRAME_CAPACITY, MIN_FRAME_LEN};
use crate::error::{FrameError, Result};

/// Reads complete frames from any `Read` stream.
///
/// The first byte of every frame is its length, so the reader takes that byte
/// and then exactly the rest of the frame. Callers always get whole frames.
///
/// A `WouldBlock` or `TimedOut` error inside a frame keeps the bytes read so
/// far. The next call with the same buffer continues that frame.
pub struct FrameReader<T> {
    inner: T,
    filled: usize,
}

impl<T: Read> FrameReader<T> {
    pub fn new(inner: T) -> Self {
        Self { inner, filled: 0 }
    }

    /// Read the next complete frame into `buf` (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` on EOF, whether it comes
    /// before or inside a frame. A length byte that cannot start a frame is
    /// reported as `InvalidLength` after consuming only that byte.
    ///
    /// After an `Io` error the partial frame stays in `buf`; pass the same
    /// buffer again to resume it.
    pub fn read_frame(&mut self, buf: &mut FrameBuffer) -> Result<usize> {
        let bytes = buf.as_mut_bytes();
        if self.filled == 0 {
            self.fill(&mut bytes[..1])?;
        }

        let len = usize::from(bytes[0]);
        if !(MIN_FRAME_LEN..=FRAME_CAPACITY).contains(&len) {
            self.filled = 0;
            return Err(FrameError::InvalidLength {
                len,
                available: FRAME_CAPACITY,
            });
        }

        self.fill(&mut bytes[..len])?;
        self.filled = 0;
        Ok(len)
    }

    /// Bytes of the current frame received so far.
    pub fn pending(&self) -> usize {
        self.filled
    }

    fn fill(&mut self, dst: &mut [u8]) -> Result<()> {
        while self.filled < dst.len() {
            match self.inner.read(&mut dst[self.filled..]) {
                Ok(0) => {
                    self.filled = 0;
                    return Err(FrameError::ConnectionClosed);
                }
                Ok(n) => self.filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(())
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
