//! Protocol for Remote Execution of Automated Tests.
//!
//! A test host sends small checksummed frames to a target that drives and
//! observes digital signals. Each frame invokes one registered method; an
//! assertion ties one output action to the input edges expected to follow it
//! within a time window.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte-stream links (Unix domain sockets, TCP)
//! - [`frame`]: checksum, parameters, frame encode/decode, stream framing
//! - [`assert`]: event group and assertion engine
//! - [`registry`]: method registry, handler trait, built-in methods
//! - [`dispatch`]: dispatcher, frame server and simulated board

/// Re-export transport types.
pub mod transport {
    pub use preat_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use preat_frame::*;
}

/// Re-export assertion engine types.
pub mod assert {
    pub use preat_assert::*;
}

/// Re-export registry types.
pub mod registry {
    pub use preat_registry::*;
}

/// Re-export dispatcher, server and board types.
pub mod dispatch {
    pub use preat_dispatch::*;
}
