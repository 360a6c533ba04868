//! Method registry for the remote test protocol.
//!
//! Maps 12-bit method ids to handlers, a direction and a declared parameter
//! signature. Built-in methods are looked up before user methods, and the
//! first match wins.

pub mod builtin;
pub mod config;
pub mod handler;
pub mod registry;

pub use builtin::StartAssertion;
pub use config::{RegistryConfig, DEFAULT_CAPACITY};
pub use handler::{handler_fn, FnHandler, Handler, MethodContext};
pub use registry::{Direction, HandlerDescriptor, MethodRegistry};
