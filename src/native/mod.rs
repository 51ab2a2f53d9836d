//! The native engine's function table.
//!
//! [`EngineLibrary`] is the seam between the client and the compiled engine. [`NativeLibrary`]
//! binds it to a shared library loaded at runtime. Tests substitute an in-process implementation.
use std::{
    ffi::{c_char, c_void, CStr},
    path::Path,
};

mod library;
#[cfg(test)]
pub(crate) mod mock;
mod string;

pub use library::NativeLibrary;
pub(crate) use string::NativeString;

/// Functions exported by the native engine.
///
/// Every method returning `*mut c_char` hands ownership of a NUL-terminated UTF-8 buffer to the
/// caller, which must release it with exactly one call to [`EngineLibrary::destroy_string`] on
/// the same library. A returned null pointer owns nothing.
///
/// # Safety
///
/// Implementors must return either null or a valid NUL-terminated buffer that stays valid until
/// it is passed to `destroy_string`. `initialize_engine` must return either null or a handle that
/// stays valid until it is passed to `destroy_engine`.
pub unsafe trait EngineLibrary: Send + Sync {
    /// Create an engine from JSON-encoded options.
    ///
    /// # Safety
    ///
    /// `opts` must be valid JSON.
    unsafe fn initialize_engine(&self, opts: &CStr) -> *mut c_void;

    /// Free an engine.
    ///
    /// # Safety
    ///
    /// `engine` must come from `initialize_engine` and must not be used afterwards.
    unsafe fn destroy_engine(&self, engine: *mut c_void);

    /// Evaluate a variant flag.
    ///
    /// # Safety
    ///
    /// `engine` must be a live handle from `initialize_engine`.
    unsafe fn evaluate_variant(&self, engine: *mut c_void, request: &CStr) -> *mut c_char;

    /// Evaluate a boolean flag.
    ///
    /// # Safety
    ///
    /// `engine` must be a live handle from `initialize_engine`.
    unsafe fn evaluate_boolean(&self, engine: *mut c_void, request: &CStr) -> *mut c_char;

    /// Evaluate a JSON array of requests.
    ///
    /// # Safety
    ///
    /// `engine` must be a live handle from `initialize_engine`.
    unsafe fn evaluate_batch(&self, engine: *mut c_void, requests: &CStr) -> *mut c_char;

    /// List flags in the engine's namespace.
    ///
    /// # Safety
    ///
    /// `engine` must be a live handle from `initialize_engine`.
    unsafe fn list_flags(&self, engine: *mut c_void) -> *mut c_char;

    /// Serialize the engine state as base64 JSON.
    ///
    /// # Safety
    ///
    /// `engine` must be a live handle from `initialize_engine`.
    unsafe fn get_snapshot(&self, engine: *mut c_void) -> *mut c_char;

    /// Replace the engine's credentials. Returns `None` when the engine does not export this
    /// function.
    ///
    /// # Safety
    ///
    /// `engine` must be a live handle from `initialize_engine`.
    unsafe fn update_authentication(
        &self,
        engine: *mut c_void,
        authentication: &CStr,
    ) -> Option<*mut c_char>;

    /// Free a buffer returned by any other function of this library.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this library and not freed before.
    unsafe fn destroy_string(&self, ptr: *mut c_char);

    /// Location the library was loaded from, if any.
    fn path(&self) -> Option<&Path> {
        None
    }
}
