//! Structured logging facility for cfgdelta
//!
//! One initialization point, three lifecycle macros and an in-memory capture
//! layer for tests.
//!
//! ```rust
//! use cfgdelta_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```
//!
//! Lifecycle events (`start`, `end`, `end_error`) are owned by the engine
//! boundary. Core algorithms only emit `debug!`/`trace!` detail.

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
