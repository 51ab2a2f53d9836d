use std::{
    ffi::{c_char, CStr},
    ptr::NonNull,
};

use super::EngineLibrary;
use crate::{Error, Result};

/// A buffer returned by the engine, released with `destroy_string` when dropped.
pub(crate) struct NativeString<'a> {
    ptr: NonNull<c_char>,
    library: &'a dyn EngineLibrary,
}

impl<'a> NativeString<'a> {
    /// Take ownership of `ptr`. Returns `None` for a null pointer.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a NUL-terminated buffer returned by `library` that has not been freed.
    pub(crate) unsafe fn from_raw(
        library: &'a dyn EngineLibrary,
        ptr: *mut c_char,
    ) -> Option<NativeString<'a>> {
        NonNull::new(ptr).map(|ptr| NativeString { ptr, library })
    }

    pub(crate) fn to_str(&self) -> Result<&str> {
        // SAFETY: `ptr` is a live NUL-terminated buffer until `self` is dropped.
        let cstr = unsafe { CStr::from_ptr(self.ptr.as_ptr()) };
        cstr.to_str().map_err(|err| {
            log::warn!(target: "flipt", "engine returned non UTF-8 data: {err}");
            Error::InvalidString
        })
    }
}

impl Drop for NativeString<'_> {
    fn drop(&mut self) {
        // SAFETY: the buffer came from `library` and is freed only here.
        unsafe { self.library.destroy_string(self.ptr.as_ptr()) }
    }
}
