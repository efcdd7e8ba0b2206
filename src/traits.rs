use std::time::{Duration, Instant};

/// The native engine's exported entry points, one method per export.
///
/// Implement this to drive an [`Everything`](crate::Everything) session
/// through any call mechanism: the SDK DLL ([`DllApi`](crate::abi::DllApi)),
/// an IPC bridge, or an in-memory stub for tests.
///
/// Methods speak the engine's wire types: `u32` for counts, sort codes and
/// error codes, `bool` for the engine's `BOOL`, and UTF-16 code units for
/// text. Implementations must not expose raw pointers: a null string
/// return becomes `None`.
///
/// # Thread Safety
///
/// `Send` is required so a session can move to another thread. `Sync` is
/// deliberately not: the engine has one global search context, so calls
/// from several threads must be serialized by the caller.
pub trait NativeApi: Send {
    /// `Everything_SetSearchW`. `search` is null-terminated.
    fn set_search_w(&self, search: &[u16]);

    /// `Everything_GetSearchW`. `None` when the engine returns null.
    fn get_search_w(&self) -> Option<Vec<u16>>;

    /// `Everything_SetSort`.
    fn set_sort(&self, sort: u32);

    /// `Everything_GetSort`.
    fn get_sort(&self) -> u32;

    /// `Everything_SetMax`.
    fn set_max(&self, max: u32);

    /// `Everything_GetMax`.
    fn get_max(&self) -> u32;

    /// `Everything_SetOffset`.
    fn set_offset(&self, offset: u32);

    /// `Everything_GetOffset`.
    fn get_offset(&self) -> u32;

    /// `Everything_QueryW`. Blocks until the engine answers when `wait` is set.
    fn query_w(&self, wait: bool) -> bool;

    /// `Everything_GetNumResults`: results visible in the current window.
    fn get_num_results(&self) -> u32;

    /// `Everything_GetTotResults`: total matches, ignoring offset and max.
    fn get_tot_results(&self) -> u32;

    /// `Everything_GetResultFullPathNameW`.
    ///
    /// With `buf == None` the engine is called with a null buffer and a
    /// length of zero and returns the required length in code units,
    /// excluding the terminator. With a buffer, `buf.len()` is passed as the
    /// buffer length and the return is the number of units copied.
    fn get_result_full_path_name_w(&self, index: u32, buf: Option<&mut [u16]>) -> u32;

    /// `Everything_GetResultFileNameW`. `None` when the engine returns null.
    fn get_result_file_name_w(&self, index: u32) -> Option<Vec<u16>>;

    /// `Everything_IsDBLoaded`.
    fn is_db_loaded(&self) -> bool;

    /// `Everything_GetMajorVersion`.
    fn get_major_version(&self) -> u32;

    /// `Everything_GetLastError`.
    fn get_last_error(&self) -> u32;

    /// `Everything_CleanUp`.
    fn clean_up(&self);

    /// `Everything_Reset`.
    fn reset(&self);

    /// `Everything_IsFastSort`.
    fn is_fast_sort(&self, sort: u32) -> bool;

    /// `Everything_IsFileResult`.
    fn is_file_result(&self, index: u32) -> bool;

    /// `Everything_IsFolderResult`.
    fn is_folder_result(&self, index: u32) -> bool;

    /// `Everything_IsVolumeResult`.
    fn is_volume_result(&self, index: u32) -> bool;

    /// `Everything_SetRequestFlags`.
    fn set_request_flags(&self, flags: u32);

    /// `Everything_GetRequestFlags`.
    fn get_request_flags(&self) -> u32;

    /// `Everything_GetResultSize`. `None` when the call returns false.
    fn get_result_size(&self, index: u32) -> Option<u64>;

    /// `Everything_GetResultDateCreated` as raw `FILETIME` ticks. `None` when
    /// the call returns false.
    fn get_result_date_created(&self, index: u32) -> Option<u64>;

    /// `Everything_GetResultDateModified` as raw `FILETIME` ticks.
    fn get_result_date_modified(&self, index: u32) -> Option<u64>;

    /// `Everything_GetResultExtensionW`. `None` when the engine returns null.
    fn get_result_extension_w(&self, index: u32) -> Option<Vec<u16>>;

    /// `Everything_GetMinorVersion`.
    fn get_minor_version(&self) -> u32;

    /// `Everything_GetRevision`.
    fn get_revision(&self) -> u32;

    /// `Everything_GetBuildNumber`.
    fn get_build_number(&self) -> u32;
}

/// Time source for the index-ready wait.
///
/// Injected so tests can drive the poll loop without real sleeps.
pub trait Clock {
    fn now(&self) -> Instant;

    fn sleep(&self, d: Duration);
}
