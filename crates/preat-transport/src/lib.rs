//! Byte-stream links between a test host and a PREAT target.
//!
//! The protocol only needs an ordered, reliable byte stream. On real
//! hardware that is a UART; on a development host it is usually a Unix
//! domain socket or a TCP bridge in front of the serial port. This crate
//! hides which one is in use behind [`LinkStream`] and [`LinkListener`].

pub mod addr;
pub mod error;
pub mod listener;
pub mod stream;

pub use addr::LinkAddr;
pub use error::{Result, TransportError};
pub use listener::LinkListener;
pub use stream::LinkStream;
