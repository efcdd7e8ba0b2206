use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::abi::{default_library_name, DllApi};
use crate::error::Result;
use crate::session::{Everything, SessionClaim};
use crate::traits::NativeApi;
use crate::wait::{DEFAULT_LOAD_TIMEOUT, DEFAULT_POLL_INTERVAL};

/// Environment variable naming the SDK library to load when no explicit
/// path is configured.
pub const LIBRARY_ENV: &str = "EVERYTHING_SDK_DLL";

// ---------------------------------------------------------------------------
// SessionBuilder
// ---------------------------------------------------------------------------

/// Configures and opens an [`Everything`] session.
///
/// Created via [`everything_wrapper::session()`](crate::session). Configure
/// with chained builder methods, then call [`open()`](SessionBuilder::open).
///
/// # Example
///
/// ```rust,ignore
/// let everything = everything_wrapper::session()
///     .library(r"C:\Program Files\Everything\Everything64.dll")
///     .load_timeout(Duration::from_secs(30))
///     .wait_for_db(true)
///     .open()?;
/// ```
pub struct SessionBuilder {
    library:       Option<PathBuf>,
    api:           Option<Box<dyn NativeApi>>,
    poll_interval: Duration,
    load_timeout:  Duration,
    wait_for_db:   bool,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            library:       None,
            api:           None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            load_timeout:  DEFAULT_LOAD_TIMEOUT,
            wait_for_db:   false,
        }
    }
}

impl SessionBuilder {
    // ── Native layer ──────────────────────────────────────────────────────

    /// Load the SDK library from `path`.
    ///
    /// Without this, `open()` uses `$EVERYTHING_SDK_DLL`, falling back to
    /// `Everything64.dll` (or `Everything32.dll` on 32-bit targets) on the
    /// loader's search path.
    pub fn library(mut self, path: impl Into<PathBuf>) -> Self {
        self.library = Some(path.into());
        self
    }

    /// Drive the session through a caller-supplied [`NativeApi`] instead of
    /// loading the SDK library. Takes precedence over `.library()`.
    ///
    /// Sessions opened this way don't count against the one-DLL-session
    /// limit.
    pub fn api(mut self, api: impl NativeApi + 'static) -> Self {
        self.api = Some(Box::new(api));
        self
    }

    // ── Index wait ────────────────────────────────────────────────────────

    /// Delay between readiness polls. Defaults to 100 ms; values under 1 ms
    /// are raised to 1 ms.
    pub fn poll_interval(mut self, d: Duration) -> Self {
        self.poll_interval = d;
        self
    }

    /// Ceiling on the readiness wait. Defaults to 10 s.
    pub fn load_timeout(mut self, d: Duration) -> Self {
        self.load_timeout = d;
        self
    }

    /// Wait for the index to load before `open()` returns. Off by default.
    pub fn wait_for_db(mut self, yes: bool) -> Self {
        self.wait_for_db = yes;
        self
    }

    // ── Open ──────────────────────────────────────────────────────────────

    /// Open the session.
    ///
    /// # Errors
    ///
    /// - [`SessionActive`](crate::EverythingError::SessionActive) if another
    ///   DLL-backed session is open in this process.
    /// - [`Library`](crate::EverythingError::Library) /
    ///   [`MissingSymbol`](crate::EverythingError::MissingSymbol) if the SDK
    ///   library can't be loaded.
    /// - [`Timeout`](crate::EverythingError::Timeout) if `.wait_for_db(true)`
    ///   was set and the index didn't load in time.
    pub fn open(self) -> Result<Everything> {
        let session = match self.api {
            Some(api) => {
                Everything::from_parts(api, self.poll_interval, self.load_timeout, None)
            }
            None => {
                let claim = SessionClaim::acquire()?;
                let path = resolve_library(self.library);
                let api = DllApi::load(&path)?;
                Everything::from_parts(Box::new(api), self.poll_interval, self.load_timeout, Some(claim))
            }
        };

        if self.wait_for_db {
            session.wait_db_loaded()?;
        }

        debug!("Everything session open");
        Ok(session)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Explicit path, then `$EVERYTHING_SDK_DLL`, then the default name.
fn resolve_library(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var_os(LIBRARY_ENV).filter(|v| !v.is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(default_library_name()))
}
