//! Target side of the remote test protocol.
//!
//! The [`Dispatcher`] turns a request frame into a response frame in place,
//! routing output methods through the assertion engine while an assertion
//! is open. [`Server`] runs it over a link, one session at a time, and
//! [`SimBoard`] provides digital I/O methods for a simulated target.

pub mod board;
pub mod dispatcher;
pub mod error;
pub mod server;

pub use board::{
    BoardConfig, SimBoard, METHOD_EXPECT_FALLING, METHOD_EXPECT_RISING, METHOD_INPUT_LEVEL,
    METHOD_OUTPUT_HIGH, METHOD_OUTPUT_LOW,
};
pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use error::{Result, ServeError};
pub use server::{Server, ServerConfig, SessionStats};
