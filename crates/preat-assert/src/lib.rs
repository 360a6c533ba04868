//! Assertion engine for remote hardware-in-the-loop tests.
//!
//! An assertion ties one output action to a set of input events: after the
//! output runs, no expected input may fire during the delay window, and all
//! of them must fire before the timeout. Inputs signal through an
//! [`EventGroup`], which may be driven from any thread.

pub mod assertion;
pub mod events;

pub use assertion::{Assertion, AssertionConfig, AssertionControl, InputHandle, DEFAULT_MAX_INPUTS};
pub use events::{EventGroup, EventMask, EventSignal, EventWait, INVALID_EVENT, MAX_EVENTS};
