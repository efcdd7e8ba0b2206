use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::error::{EverythingError, NativeErrorKind, Result};
use crate::flags::RequestFlags;
use crate::results::{ResultField, ResultIter};
use crate::sort::Sort;
use crate::traits::{Clock, NativeApi};
use crate::wait::{wait_until, CancelToken, SystemClock, DEFAULT_LOAD_TIMEOUT, DEFAULT_POLL_INTERVAL};
use crate::wide::{from_wide, to_wide};

// ---------------------------------------------------------------------------
// Process-wide claim
// ---------------------------------------------------------------------------

static DLL_SESSION_OPEN: AtomicBool = AtomicBool::new(false);

/// Marks the process's one DLL-backed session as open. Released on drop.
#[derive(Debug)]
pub(crate) struct SessionClaim(());

impl SessionClaim {
    pub(crate) fn acquire() -> Result<Self> {
        DLL_SESSION_OPEN
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| SessionClaim(()))
            .map_err(|_| EverythingError::SessionActive)
    }
}

impl Drop for SessionClaim {
    fn drop(&mut self) {
        DLL_SESSION_OPEN.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Engine version
// ---------------------------------------------------------------------------

/// The engine's full version, as reported by the four version exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EngineVersion {
    pub major:    u32,
    pub minor:    u32,
    pub revision: u32,
    pub build:    u32,
}

impl std::fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.revision, self.build)
    }
}

// ---------------------------------------------------------------------------
// Everything
// ---------------------------------------------------------------------------

/// A session over the engine's single global search context.
///
/// The session holds no search state of its own: every setter pushes
/// straight to the engine and every getter reads straight back. Result
/// strings are copied out on each call and never cached.
///
/// Lifecycle: open (see [`session()`](crate::session())), optionally
/// [`wait_db_loaded`](Self::wait_db_loaded), then any number of
/// configure/[`query`](Self::query)/read rounds, then
/// [`cleanup`](Self::cleanup). A session dropped without `cleanup` cleans
/// up from `Drop`.
///
/// `Everything` is `Send` but not `Sync`. To share one across threads wrap
/// it in a `Mutex` and hold the lock for a whole configure-query-read
/// sequence; interleaving those from two callers corrupts the engine's
/// current search.
pub struct Everything {
    api:           Box<dyn NativeApi>,
    poll_interval: Duration,
    load_timeout:  Duration,
    cleaned_up:    bool,
    _claim:        Option<SessionClaim>,
}

impl std::fmt::Debug for Everything {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Everything")
            .field("poll_interval", &self.poll_interval)
            .field("load_timeout", &self.load_timeout)
            .field("cleaned_up", &self.cleaned_up)
            .finish_non_exhaustive()
    }
}

impl Everything {
    pub(crate) fn from_parts(
        api:           Box<dyn NativeApi>,
        poll_interval: Duration,
        load_timeout:  Duration,
        claim:         Option<SessionClaim>,
    ) -> Self {
        Self {
            api,
            poll_interval,
            load_timeout,
            cleaned_up: false,
            _claim: claim,
        }
    }

    /// A session over `api` with default wait settings.
    ///
    /// Shorthand for `session().api(api).open()`, which cannot fail for a
    /// caller-supplied API.
    pub fn with_api(api: impl NativeApi + 'static) -> Self {
        Self::from_parts(Box::new(api), DEFAULT_POLL_INTERVAL, DEFAULT_LOAD_TIMEOUT, None)
    }

    // ── Index readiness ───────────────────────────────────────────────────

    /// Whether the engine's index is loaded.
    pub fn is_db_loaded(&self) -> bool {
        self.api.is_db_loaded()
    }

    /// Block until the index is loaded, polling on the configured interval.
    ///
    /// # Errors
    ///
    /// [`EverythingError::Timeout`] once the configured load timeout passes.
    pub fn wait_db_loaded(&self) -> Result<()> {
        self.wait_db_loaded_with(&SystemClock, &CancelToken::new())
    }

    /// [`wait_db_loaded`](Self::wait_db_loaded) with an explicit clock and
    /// cancellation token.
    ///
    /// # Errors
    ///
    /// [`EverythingError::Timeout`] on the ceiling,
    /// [`EverythingError::Cancelled`] when `cancel` fires first.
    pub fn wait_db_loaded_with(&self, clock: &dyn Clock, cancel: &CancelToken) -> Result<()> {
        debug!(
            interval_ms = self.poll_interval.as_millis() as u64,
            timeout_ms  = self.load_timeout.as_millis() as u64,
            "waiting for Everything index"
        );
        wait_until(clock, cancel, self.poll_interval, self.load_timeout, || {
            self.api.is_db_loaded()
        })
        .inspect_err(|e| warn!(error = %e, "Everything index not ready"))
    }

    // ── Engine info ───────────────────────────────────────────────────────

    /// The engine's major version.
    pub fn version(&self) -> u32 {
        self.api.get_major_version()
    }

    /// The engine's major, minor, revision and build numbers.
    pub fn engine_version(&self) -> EngineVersion {
        EngineVersion {
            major:    self.api.get_major_version(),
            minor:    self.api.get_minor_version(),
            revision: self.api.get_revision(),
            build:    self.api.get_build_number(),
        }
    }

    /// The engine's last-error code, mapped. Unknown codes map to
    /// [`NativeErrorKind::Unknown`].
    pub fn last_error(&self) -> NativeErrorKind {
        NativeErrorKind::from_code(self.api.get_last_error())
    }

    fn native_failure(&self, call: &'static str) -> EverythingError {
        let kind = self.last_error();
        warn!(call, code = kind.code(), kind = %kind, "native call failed");
        EverythingError::Native(kind)
    }

    // ── Search configuration ──────────────────────────────────────────────

    /// Set the search text used by the next [`query`](Self::query).
    pub fn set_search(&self, text: &str) {
        self.api.set_search_w(&to_wide(text));
    }

    /// The engine's current search text.
    ///
    /// # Errors
    ///
    /// [`EverythingError::Native`] when the engine returns a null string.
    pub fn search(&self) -> Result<String> {
        self.api
            .get_search_w()
            .map(|units| from_wide(&units))
            .ok_or_else(|| self.native_failure("GetSearchW"))
    }

    pub fn set_sort(&self, sort: Sort) {
        self.api.set_sort(sort.code());
    }

    /// Push a raw sort code. Codes outside 1–24 are passed through unchecked.
    pub fn set_sort_code(&self, code: u32) {
        self.api.set_sort(code);
    }

    /// The current sort order, or `None` if the engine reports a code this
    /// crate doesn't know.
    pub fn sort(&self) -> Option<Sort> {
        Sort::from_code(self.sort_code())
    }

    pub fn sort_code(&self) -> u32 {
        self.api.get_sort()
    }

    /// Whether the engine has `sort` indexed and can apply it without a
    /// full re-sort.
    pub fn is_fast_sort(&self, sort: Sort) -> bool {
        self.api.is_fast_sort(sort.code())
    }

    /// Cap the number of results in the next result window.
    pub fn set_max_results(&self, max: u32) {
        self.api.set_max(max);
    }

    pub fn max_results(&self) -> u32 {
        self.api.get_max()
    }

    /// Index of the first result in the next result window.
    pub fn set_offset(&self, offset: u32) {
        self.api.set_offset(offset);
    }

    pub fn offset(&self) -> u32 {
        self.api.get_offset()
    }

    /// Choose which result attributes the next [`query`](Self::query) loads.
    pub fn set_request_flags(&self, flags: RequestFlags) {
        self.api.set_request_flags(flags.bits());
    }

    /// The engine's current request flags. Bits this crate doesn't know are
    /// dropped.
    pub fn request_flags(&self) -> RequestFlags {
        RequestFlags::from_bits_truncate(self.api.get_request_flags())
    }

    /// Reset the engine's search state to its defaults, request flags
    /// included.
    pub fn reset(&self) {
        debug!("resetting Everything search state");
        self.api.reset();
    }

    // ── Query ─────────────────────────────────────────────────────────────

    /// Run the configured search, blocking until the engine answers.
    ///
    /// Returns the engine's success flag. `false` is an ordinary outcome;
    /// check [`last_error`](Self::last_error) to tell a failed call from an
    /// empty one. No retries are attempted.
    pub fn query(&self) -> bool {
        let ok = self.api.query_w(true);
        debug!(ok, "query finished");
        ok
    }

    /// [`query`](Self::query), turning a `false` return into an error
    /// carrying the engine's last-error kind.
    pub fn query_checked(&self) -> Result<()> {
        if self.query() {
            Ok(())
        } else {
            Err(self.native_failure("QueryW"))
        }
    }

    // ── Results ───────────────────────────────────────────────────────────

    /// Results in the current window.
    pub fn num_results(&self) -> u32 {
        self.api.get_num_results()
    }

    /// Total matches for the last query, ignoring offset and max.
    pub fn total_results(&self) -> u32 {
        self.api.get_tot_results()
    }

    /// Full path of the result at `index`.
    ///
    /// Measures first (null buffer, length 0), then fills a buffer of the
    /// reported length plus one terminator unit. The index is not checked
    /// locally; the engine decides what an out-of-range index means.
    ///
    /// # Errors
    ///
    /// [`EverythingError::Native`] when the engine reports a zero length and
    /// its last error is set, or when the fill copies nothing after a
    /// non-zero measure.
    pub fn result_path(&self, index: u32) -> Result<String> {
        let len = self.api.get_result_full_path_name_w(index, None);
        if len == 0 {
            let kind = self.last_error();
            if !kind.is_ok() {
                warn!(call = "GetResultFullPathNameW", index, kind = %kind, "native call failed");
                return Err(EverythingError::Native(kind));
            }
            return Ok(String::new());
        }

        let mut buf = vec![0u16; len as usize + 1];
        let copied = self.api.get_result_full_path_name_w(index, Some(&mut buf));
        if copied == 0 {
            return Err(self.native_failure("GetResultFullPathNameW"));
        }
        trace!(index, len, copied, "read result path");
        Ok(from_wide(&buf))
    }

    /// Bare file name of the result at `index`.
    ///
    /// # Errors
    ///
    /// [`EverythingError::Native`] when the engine returns a null string.
    pub fn result_file_name(&self, index: u32) -> Result<String> {
        let units = self
            .api
            .get_result_file_name_w(index)
            .ok_or_else(|| self.native_failure("GetResultFileNameW"))?;
        trace!(index, "read result file name");
        Ok(from_wide(&units))
    }

    /// Size in bytes of the result at `index`.
    ///
    /// # Errors
    ///
    /// [`EverythingError::Native`] when the engine can't supply it, e.g.
    /// [`NativeErrorKind::InvalidRequest`] if [`RequestFlags::SIZE`] wasn't
    /// set before the query.
    pub fn result_size(&self, index: u32) -> Result<u64> {
        self.api
            .get_result_size(index)
            .ok_or_else(|| self.native_failure("GetResultSize"))
    }

    /// Creation time of the result at `index`, as raw `FILETIME` ticks
    /// (100 ns intervals since 1601-01-01 UTC).
    ///
    /// # Errors
    ///
    /// As [`result_size`](Self::result_size); needs
    /// [`RequestFlags::DATE_CREATED`].
    pub fn result_date_created(&self, index: u32) -> Result<u64> {
        self.api
            .get_result_date_created(index)
            .ok_or_else(|| self.native_failure("GetResultDateCreated"))
    }

    /// Last-write time of the result at `index`, as raw `FILETIME` ticks.
    ///
    /// # Errors
    ///
    /// As [`result_size`](Self::result_size); needs
    /// [`RequestFlags::DATE_MODIFIED`].
    pub fn result_date_modified(&self, index: u32) -> Result<u64> {
        self.api
            .get_result_date_modified(index)
            .ok_or_else(|| self.native_failure("GetResultDateModified"))
    }

    /// Extension of the result at `index`, without the dot.
    ///
    /// # Errors
    ///
    /// [`EverythingError::Native`] when the engine returns a null string.
    pub fn result_extension(&self, index: u32) -> Result<String> {
        let units = self
            .api
            .get_result_extension_w(index)
            .ok_or_else(|| self.native_failure("GetResultExtensionW"))?;
        Ok(from_wide(&units))
    }

    pub fn is_file_result(&self, index: u32) -> bool {
        self.api.is_file_result(index)
    }

    pub fn is_folder_result(&self, index: u32) -> bool {
        self.api.is_folder_result(index)
    }

    pub fn is_volume_result(&self, index: u32) -> bool {
        self.api.is_volume_result(index)
    }

    /// Lazily yield the full path of every result in the current window.
    ///
    /// The result count is read once, here. The iterator is single-pass:
    /// call `path_iter` again for a fresh traversal.
    pub fn path_iter(&self) -> ResultIter<'_> {
        ResultIter::new(self, ResultField::FullPath, self.num_results())
    }

    /// Lazily yield the file name of every result in the current window.
    ///
    /// Same snapshot and single-pass rules as [`path_iter`](Self::path_iter).
    pub fn file_name_iter(&self) -> ResultIter<'_> {
        ResultIter::new(self, ResultField::FileName, self.num_results())
    }

    // ── Teardown ──────────────────────────────────────────────────────────

    /// Release the engine's resources and end the session.
    pub fn cleanup(mut self) {
        self.clean_up_native();
    }

    fn clean_up_native(&mut self) {
        if !self.cleaned_up {
            self.cleaned_up = true;
            debug!("cleaning up Everything session");
            self.api.clean_up();
        }
    }
}

impl Drop for Everything {
    fn drop(&mut self) {
        self.clean_up_native();
    }
}
