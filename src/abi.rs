//! The native entry-point table and the DLL-backed [`NativeApi`].
//!
//! [`ENTRY_POINTS`] is the single declaration of every export this crate
//! uses and how its arguments and return value are marshalled. [`DllApi`]
//! resolves each of them from the SDK library at load time.

use std::path::{Path, PathBuf};

use libloading::Library;
use tracing::debug;

use crate::error::{EverythingError, Result};
use crate::traits::NativeApi;
use crate::wide::copy_wide_ptr;

// ---------------------------------------------------------------------------
// Entry-point table
// ---------------------------------------------------------------------------

/// How a value crosses the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marshal {
    /// No value.
    Void,
    /// `DWORD`: counts, offsets, sort codes, error codes, indices.
    U32,
    /// `BOOL`: a 32-bit int, nonzero is true.
    Bool,
    /// `LPCWSTR` passed in: null-terminated UTF-16.
    WideIn,
    /// `LPCWSTR` returned: null on failure, otherwise null-terminated UTF-16.
    WidePtr,
    /// `LPWSTR` destination buffer, paired with a `U32` length. May be null.
    WideBuf,
    /// `LARGE_INTEGER*` out-parameter, filled when the call returns true.
    I64Out,
    /// `FILETIME*` out-parameter, filled when the call returns true.
    FileTimeOut,
}

/// One exported function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPoint {
    /// Exported symbol name.
    pub name: &'static str,
    /// Argument kinds, in call order.
    pub args: &'static [Marshal],
    /// Return kind.
    pub ret:  Marshal,
}

const fn entry(name: &'static str, args: &'static [Marshal], ret: Marshal) -> EntryPoint {
    EntryPoint { name, args, ret }
}

use Marshal::*;

pub const SET_SEARCH_W: EntryPoint        = entry("Everything_SetSearchW", &[WideIn], Void);
pub const GET_SEARCH_W: EntryPoint        = entry("Everything_GetSearchW", &[], WidePtr);
pub const SET_SORT: EntryPoint            = entry("Everything_SetSort", &[U32], Void);
pub const GET_SORT: EntryPoint            = entry("Everything_GetSort", &[], U32);
pub const SET_MAX: EntryPoint             = entry("Everything_SetMax", &[U32], Void);
pub const GET_MAX: EntryPoint             = entry("Everything_GetMax", &[], U32);
pub const SET_OFFSET: EntryPoint          = entry("Everything_SetOffset", &[U32], Void);
pub const GET_OFFSET: EntryPoint          = entry("Everything_GetOffset", &[], U32);
pub const QUERY_W: EntryPoint             = entry("Everything_QueryW", &[Bool], Bool);
pub const GET_NUM_RESULTS: EntryPoint     = entry("Everything_GetNumResults", &[], U32);
pub const GET_TOT_RESULTS: EntryPoint     = entry("Everything_GetTotResults", &[], U32);
pub const GET_RESULT_FULL_PATH_NAME_W: EntryPoint =
    entry("Everything_GetResultFullPathNameW", &[U32, WideBuf, U32], U32);
pub const GET_RESULT_FILE_NAME_W: EntryPoint = entry("Everything_GetResultFileNameW", &[U32], WidePtr);
pub const IS_DB_LOADED: EntryPoint        = entry("Everything_IsDBLoaded", &[], Bool);
pub const GET_MAJOR_VERSION: EntryPoint   = entry("Everything_GetMajorVersion", &[], U32);
pub const GET_LAST_ERROR: EntryPoint      = entry("Everything_GetLastError", &[], U32);
pub const CLEAN_UP: EntryPoint            = entry("Everything_CleanUp", &[], Void);
pub const RESET: EntryPoint               = entry("Everything_Reset", &[], Void);
pub const IS_FAST_SORT: EntryPoint        = entry("Everything_IsFastSort", &[U32], Bool);
pub const IS_FILE_RESULT: EntryPoint      = entry("Everything_IsFileResult", &[U32], Bool);
pub const IS_FOLDER_RESULT: EntryPoint    = entry("Everything_IsFolderResult", &[U32], Bool);
pub const IS_VOLUME_RESULT: EntryPoint    = entry("Everything_IsVolumeResult", &[U32], Bool);
pub const SET_REQUEST_FLAGS: EntryPoint   = entry("Everything_SetRequestFlags", &[U32], Void);
pub const GET_REQUEST_FLAGS: EntryPoint   = entry("Everything_GetRequestFlags", &[], U32);
pub const GET_RESULT_SIZE: EntryPoint     = entry("Everything_GetResultSize", &[U32, I64Out], Bool);
pub const GET_RESULT_DATE_CREATED: EntryPoint =
    entry("Everything_GetResultDateCreated", &[U32, FileTimeOut], Bool);
pub const GET_RESULT_DATE_MODIFIED: EntryPoint =
    entry("Everything_GetResultDateModified", &[U32, FileTimeOut], Bool);
pub const GET_RESULT_EXTENSION_W: EntryPoint = entry("Everything_GetResultExtensionW", &[U32], WidePtr);
pub const GET_MINOR_VERSION: EntryPoint   = entry("Everything_GetMinorVersion", &[], U32);
pub const GET_REVISION: EntryPoint        = entry("Everything_GetRevision", &[], U32);
pub const GET_BUILD_NUMBER: EntryPoint    = entry("Everything_GetBuildNumber", &[], U32);

/// Every export resolved by [`DllApi::load`].
pub const ENTRY_POINTS: &[EntryPoint] = &[
    SET_SEARCH_W,
    GET_SEARCH_W,
    SET_SORT,
    GET_SORT,
    SET_MAX,
    GET_MAX,
    SET_OFFSET,
    GET_OFFSET,
    QUERY_W,
    GET_NUM_RESULTS,
    GET_TOT_RESULTS,
    GET_RESULT_FULL_PATH_NAME_W,
    GET_RESULT_FILE_NAME_W,
    IS_DB_LOADED,
    GET_MAJOR_VERSION,
    GET_LAST_ERROR,
    CLEAN_UP,
    RESET,
    IS_FAST_SORT,
    IS_FILE_RESULT,
    IS_FOLDER_RESULT,
    IS_VOLUME_RESULT,
    SET_REQUEST_FLAGS,
    GET_REQUEST_FLAGS,
    GET_RESULT_SIZE,
    GET_RESULT_DATE_CREATED,
    GET_RESULT_DATE_MODIFIED,
    GET_RESULT_EXTENSION_W,
    GET_MINOR_VERSION,
    GET_REVISION,
    GET_BUILD_NUMBER,
];

/// Look up an entry point by its exported name.
pub fn entry_point(name: &str) -> Option<&'static EntryPoint> {
    ENTRY_POINTS.iter().find(|e| e.name == name)
}

/// Default SDK library name for the target's pointer width.
pub fn default_library_name() -> &'static str {
    if cfg!(target_pointer_width = "64") {
        "Everything64.dll"
    } else {
        "Everything32.dll"
    }
}

// ---------------------------------------------------------------------------
// DllApi
// ---------------------------------------------------------------------------

type Bool32 = i32;

type VoidFn     = unsafe extern "system" fn();
type U32Fn      = unsafe extern "system" fn() -> u32;
type SetU32Fn   = unsafe extern "system" fn(u32);
type BoolFn     = unsafe extern "system" fn() -> Bool32;
type U32BoolFn  = unsafe extern "system" fn(u32) -> Bool32;
type WideInFn   = unsafe extern "system" fn(*const u16);
type WidePtrFn  = unsafe extern "system" fn() -> *const u16;
type IdxWideFn  = unsafe extern "system" fn(u32) -> *const u16;
type QueryFn    = unsafe extern "system" fn(Bool32) -> Bool32;
type FullPathFn = unsafe extern "system" fn(u32, *mut u16, u32) -> u32;
type SizeFn     = unsafe extern "system" fn(u32, *mut i64) -> Bool32;
type FileTimeFn = unsafe extern "system" fn(u32, *mut FileTime) -> Bool32;

/// Win32 `FILETIME`: 100 ns ticks since 1601-01-01 UTC, split in two halves.
#[repr(C)]
#[derive(Default)]
struct FileTime {
    low:  u32,
    high: u32,
}

impl FileTime {
    fn ticks(&self) -> u64 {
        (u64::from(self.high) << 32) | u64::from(self.low)
    }
}

/// [`NativeApi`] backed by the Everything SDK shared library.
///
/// All symbols are resolved eagerly; a library missing any export from
/// [`ENTRY_POINTS`] is rejected at load time.
pub struct DllApi {
    path:                        PathBuf,
    set_search_w:                WideInFn,
    get_search_w:                WidePtrFn,
    set_sort:                    SetU32Fn,
    get_sort:                    U32Fn,
    set_max:                     SetU32Fn,
    get_max:                     U32Fn,
    set_offset:                  SetU32Fn,
    get_offset:                  U32Fn,
    query_w:                     QueryFn,
    get_num_results:             U32Fn,
    get_tot_results:             U32Fn,
    get_result_full_path_name_w: FullPathFn,
    get_result_file_name_w:      IdxWideFn,
    is_db_loaded:                BoolFn,
    get_major_version:           U32Fn,
    get_last_error:              U32Fn,
    clean_up:                    VoidFn,
    reset:                       VoidFn,
    is_fast_sort:                U32BoolFn,
    is_file_result:              U32BoolFn,
    is_folder_result:            U32BoolFn,
    is_volume_result:            U32BoolFn,
    set_request_flags:           SetU32Fn,
    get_request_flags:           U32Fn,
    get_result_size:             SizeFn,
    get_result_date_created:     FileTimeFn,
    get_result_date_modified:    FileTimeFn,
    get_result_extension_w:      IdxWideFn,
    get_minor_version:           U32Fn,
    get_revision:                U32Fn,
    get_build_number:            U32Fn,
    // Keeps the function pointers above valid.
    _lib:                        Library,
}

impl std::fmt::Debug for DllApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DllApi").field("path", &self.path).finish_non_exhaustive()
    }
}

/// Buffer length as the engine's `DWORD`. Lengths past `u32::MAX` saturate;
/// the engine then writes less than the buffer holds.
fn buffer_len(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

fn resolve<T: Copy>(lib: &Library, ep: EntryPoint) -> Result<T> {
    // SAFETY: `T` is the function type declared for `ep` in the table above.
    let symbol = unsafe { lib.get::<T>(ep.name.as_bytes()) }
        .map_err(|source| EverythingError::MissingSymbol { name: ep.name, source })?;
    Ok(*symbol)
}

impl DllApi {
    /// Load the SDK library at `path` and resolve every entry point.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        debug!(path = %path.display(), "loading Everything SDK");

        // SAFETY: loading runs the library's initialisers; the SDK DLL has
        // no initialisation side effects beyond its own globals.
        let lib = unsafe { Library::new(&path) }.map_err(|source| EverythingError::Library {
            path: path.clone(),
            source,
        })?;

        let api = Self {
            set_search_w:                resolve(&lib, SET_SEARCH_W)?,
            get_search_w:                resolve(&lib, GET_SEARCH_W)?,
            set_sort:                    resolve(&lib, SET_SORT)?,
            get_sort:                    resolve(&lib, GET_SORT)?,
            set_max:                     resolve(&lib, SET_MAX)?,
            get_max:                     resolve(&lib, GET_MAX)?,
            set_offset:                  resolve(&lib, SET_OFFSET)?,
            get_offset:                  resolve(&lib, GET_OFFSET)?,
            query_w:                     resolve(&lib, QUERY_W)?,
            get_num_results:             resolve(&lib, GET_NUM_RESULTS)?,
            get_tot_results:             resolve(&lib, GET_TOT_RESULTS)?,
            get_result_full_path_name_w: resolve(&lib, GET_RESULT_FULL_PATH_NAME_W)?,
            get_result_file_name_w:      resolve(&lib, GET_RESULT_FILE_NAME_W)?,
            is_db_loaded:                resolve(&lib, IS_DB_LOADED)?,
            get_major_version:           resolve(&lib, GET_MAJOR_VERSION)?,
            get_last_error:              resolve(&lib, GET_LAST_ERROR)?,
            clean_up:                    resolve(&lib, CLEAN_UP)?,
            reset:                       resolve(&lib, RESET)?,
            is_fast_sort:                resolve(&lib, IS_FAST_SORT)?,
            is_file_result:              resolve(&lib, IS_FILE_RESULT)?,
            is_folder_result:            resolve(&lib, IS_FOLDER_RESULT)?,
            is_volume_result:            resolve(&lib, IS_VOLUME_RESULT)?,
            set_request_flags:           resolve(&lib, SET_REQUEST_FLAGS)?,
            get_request_flags:           resolve(&lib, GET_REQUEST_FLAGS)?,
            get_result_size:             resolve(&lib, GET_RESULT_SIZE)?,
            get_result_date_created:     resolve(&lib, GET_RESULT_DATE_CREATED)?,
            get_result_date_modified:    resolve(&lib, GET_RESULT_DATE_MODIFIED)?,
            get_result_extension_w:      resolve(&lib, GET_RESULT_EXTENSION_W)?,
            get_minor_version:           resolve(&lib, GET_MINOR_VERSION)?,
            get_revision:                resolve(&lib, GET_REVISION)?,
            get_build_number:            resolve(&lib, GET_BUILD_NUMBER)?,
            path,
            _lib: lib,
        };

        debug!(symbols = ENTRY_POINTS.len(), "resolved Everything SDK exports");
        Ok(api)
    }

    /// Path the library was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

// SAFETY (all calls below): each pointer was resolved from the loaded
// library with the signature the table declares, and `_lib` outlives it.
impl NativeApi for DllApi {
    fn set_search_w(&self, search: &[u16]) {
        debug_assert_eq!(search.last(), Some(&0), "search must be null-terminated");
        unsafe { (self.set_search_w)(search.as_ptr()) }
    }

    fn get_search_w(&self) -> Option<Vec<u16>> {
        // SAFETY: the engine returns null or a terminated string it owns.
        unsafe { copy_wide_ptr((self.get_search_w)()) }
    }

    fn set_sort(&self, sort: u32) {
        unsafe { (self.set_sort)(sort) }
    }

    fn get_sort(&self) -> u32 {
        unsafe { (self.get_sort)() }
    }

    fn set_max(&self, max: u32) {
        unsafe { (self.set_max)(max) }
    }

    fn get_max(&self) -> u32 {
        unsafe { (self.get_max)() }
    }

    fn set_offset(&self, offset: u32) {
        unsafe { (self.set_offset)(offset) }
    }

    fn get_offset(&self) -> u32 {
        unsafe { (self.get_offset)() }
    }

    fn query_w(&self, wait: bool) -> bool {
        unsafe { (self.query_w)(wait as Bool32) != 0 }
    }

    fn get_num_results(&self) -> u32 {
        unsafe { (self.get_num_results)() }
    }

    fn get_tot_results(&self) -> u32 {
        unsafe { (self.get_tot_results)() }
    }

    fn get_result_full_path_name_w(&self, index: u32, buf: Option<&mut [u16]>) -> u32 {
        let (ptr, len) = match buf {
            Some(b) => (b.as_mut_ptr(), buffer_len(b.len())),
            None    => (std::ptr::null_mut(), 0),
        };
        // SAFETY: `ptr` is null with length 0, or a writable buffer of `len` units.
        unsafe { (self.get_result_full_path_name_w)(index, ptr, len) }
    }

    fn get_result_file_name_w(&self, index: u32) -> Option<Vec<u16>> {
        unsafe { copy_wide_ptr((self.get_result_file_name_w)(index)) }
    }

    fn is_db_loaded(&self) -> bool {
        unsafe { (self.is_db_loaded)() != 0 }
    }

    fn get_major_version(&self) -> u32 {
        unsafe { (self.get_major_version)() }
    }

    fn get_last_error(&self) -> u32 {
        unsafe { (self.get_last_error)() }
    }

    fn clean_up(&self) {
        unsafe { (self.clean_up)() }
    }

    fn reset(&self) {
        unsafe { (self.reset)() }
    }

    fn is_fast_sort(&self, sort: u32) -> bool {
        unsafe { (self.is_fast_sort)(sort) != 0 }
    }

    fn is_file_result(&self, index: u32) -> bool {
        unsafe { (self.is_file_result)(index) != 0 }
    }

    fn is_folder_result(&self, index: u32) -> bool {
        unsafe { (self.is_folder_result)(index) != 0 }
    }

    fn is_volume_result(&self, index: u32) -> bool {
        unsafe { (self.is_volume_result)(index) != 0 }
    }

    fn set_request_flags(&self, flags: u32) {
        unsafe { (self.set_request_flags)(flags) }
    }

    fn get_request_flags(&self) -> u32 {
        unsafe { (self.get_request_flags)() }
    }

    fn get_result_size(&self, index: u32) -> Option<u64> {
        let mut size = 0i64;
        let ok = unsafe { (self.get_result_size)(index, &mut size) } != 0;
        ok.then_some(size as u64)
    }

    fn get_result_date_created(&self, index: u32) -> Option<u64> {
        let mut ft = FileTime::default();
        let ok = unsafe { (self.get_result_date_created)(index, &mut ft) } != 0;
        ok.then(|| ft.ticks())
    }

    fn get_result_date_modified(&self, index: u32) -> Option<u64> {
        let mut ft = FileTime::default();
        let ok = unsafe { (self.get_result_date_modified)(index, &mut ft) } != 0;
        ok.then(|| ft.ticks())
    }

    fn get_result_extension_w(&self, index: u32) -> Option<Vec<u16>> {
        unsafe { copy_wide_ptr((self.get_result_extension_w)(index)) }
    }

    fn get_minor_version(&self) -> u32 {
        unsafe { (self.get_minor_version)() }
    }

    fn get_revision(&self) -> u32 {
        unsafe { (self.get_revision)() }
    }

    fn get_build_number(&self) -> u32 {
        unsafe { (self.get_build_number)() }
    }
}
