//! # everything-wrapper
//!
//! A session wrapper over the [Everything](https://www.voidtools.com/) desktop
//! search engine's SDK.
//!
//! The engine does all the work: indexing, query parsing, sorting. This
//! crate owns the translation layer only: UTF-16 strings in and out, the
//! engine's null-on-failure and last-error conventions turned into
//! [`Result`]s, and result sets exposed as lazy iterators.
//!
//! The engine keeps a single global search context, so a process gets one
//! DLL-backed [`Everything`] session at a time.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use everything_wrapper::{Sort, EverythingError};
//!
//! fn main() -> Result<(), EverythingError> {
//!     let everything = everything_wrapper::session()
//!         .wait_for_db(true)
//!         .open()?;
//!
//!     everything.set_search("ext:mkv");
//!     everything.set_sort(Sort::DateModifiedDescending);
//!     everything.set_max_results(20);
//!
//!     if !everything.query() {
//!         eprintln!("query failed: {}", everything.last_error());
//!     }
//!
//!     for path in everything.path_iter() {
//!         println!("{}", path?);
//!     }
//!
//!     everything.cleanup();
//!     Ok(())
//! }
//! ```
//!
//! # Custom Native Layers
//!
//! Implement [`NativeApi`] to drive a session through something other than
//! the SDK DLL, e.g. an in-memory engine for tests:
//!
//! ```rust,ignore
//! let everything = everything_wrapper::session()
//!     .api(MyStubEngine::default())
//!     .open()?;
//! ```

#![deny(unsafe_op_in_unsafe_fn)]

pub mod abi;
pub mod wait;
pub mod wide;

mod builder;
mod error;
mod flags;
mod results;
mod session;
mod sort;
mod traits;

// ── Public re-exports ─────────────────────────────────────────────────────────

pub use abi::DllApi;
pub use builder::{SessionBuilder, LIBRARY_ENV};
pub use error::{EverythingError, NativeErrorKind, Result};
pub use flags::RequestFlags;
pub use results::{ResultField, ResultIter};
pub use session::{EngineVersion, Everything};
pub use sort::Sort;
pub use traits::{Clock, NativeApi};
pub use wait::{CancelToken, SystemClock};

// ── Entry point ───────────────────────────────────────────────────────────────

/// Create a new [`SessionBuilder`] to configure and open a session.
///
/// # Example
///
/// ```rust,no_run
/// let everything = everything_wrapper::session()
///     .library("Everything64.dll")
///     .open()
///     .expect("Everything SDK not available");
///
/// println!("Everything v{}", everything.version());
/// everything.cleanup();
/// ```
pub fn session() -> SessionBuilder {
    SessionBuilder::default()
}
