//! UTF-16 marshalling for text crossing the native boundary.
//!
//! Strings go in as null-terminated UTF-16 code units. Strings come back as
//! code units that are read up to the first zero unit; anything after it
//! is ignored. Unpaired surrogates decode lossily to U+FFFD.

use widestring::{U16CStr, U16CString, U16Str};

/// Encode `s` as UTF-16 with a trailing zero unit.
///
/// An interior NUL truncates the string there, as the engine would stop
/// reading at it anyway.
pub fn to_wide(s: &str) -> Vec<u16> {
    U16CString::from_str_truncate(s).into_vec_with_nul()
}

/// Decode code units up to the first zero unit, or the whole slice if
/// there is none.
pub fn from_wide(units: &[u16]) -> String {
    match U16CStr::from_slice_truncate(units) {
        Ok(s) => s.to_string_lossy(),
        Err(_) => U16Str::from_slice(units).to_string_lossy(),
    }
}

/// Copy a null-terminated UTF-16 string out of native memory.
///
/// Returns `None` for a null pointer. The returned units exclude the
/// terminator.
///
/// # Safety
///
/// A non-null `ptr` must point to a readable, zero-terminated sequence of
/// `u16` that stays valid for the duration of the call.
pub unsafe fn copy_wide_ptr(ptr: *const u16) -> Option<Vec<u16>> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: caller guarantees a terminator exists within readable memory.
    let s = unsafe { U16CStr::from_ptr_str(ptr) };
    Some(s.as_slice().to_vec())
}
