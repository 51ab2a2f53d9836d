use std::{
    ffi::{c_char, c_void, CStr},
    path::{Path, PathBuf},
};

use libloading::Library;

use super::EngineLibrary;
use crate::{platform, Result};

type InitializeEngineFn = unsafe extern "C" fn(*const c_char) -> *mut c_void;
type DestroyEngineFn = unsafe extern "C" fn(*mut c_void);
type RequestFn = unsafe extern "C" fn(*mut c_void, *const c_char) -> *mut c_char;
type QueryFn = unsafe extern "C" fn(*mut c_void) -> *mut c_char;
type DestroyStringFn = unsafe extern "C" fn(*mut c_char);

/// The engine shared library, loaded at runtime.
///
/// Function pointers are resolved once when the library is opened and remain valid for as long
/// as the library stays loaded, which is the lifetime of this value.
pub struct NativeLibrary {
    path: PathBuf,
    initialize_engine: InitializeEngineFn,
    destroy_engine: DestroyEngineFn,
    evaluate_variant: RequestFn,
    evaluate_boolean: RequestFn,
    evaluate_batch: RequestFn,
    list_flags: QueryFn,
    get_snapshot: QueryFn,
    update_authentication: Option<RequestFn>,
    destroy_string: DestroyStringFn,
    // Keeps the function pointers above alive.
    _library: Library,
}

impl NativeLibrary {
    /// Load the engine packaged for the current platform.
    ///
    /// See [`platform::default_library_path`] for how the library is located.
    pub fn open_default() -> Result<NativeLibrary> {
        NativeLibrary::open(platform::default_library_path()?)
    }

    /// Load the engine from `path` and bind its exported functions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Library`](crate::Error::Library) if the library cannot be opened or a
    /// required function is not exported.
    pub fn open(path: impl AsRef<Path>) -> Result<NativeLibrary> {
        let path = path.as_ref();
        log::debug!(target: "flipt", path:?; "loading engine library");

        // SAFETY: loading runs the library's initializers. The engine is a trusted artifact, and
        // every symbol below is declared with the signature from the engine's C header.
        unsafe {
            let library = Library::new(path)?;

            let initialize_engine = *library.get::<InitializeEngineFn>(b"initialize_engine\0")?;
            let destroy_engine = *library.get::<DestroyEngineFn>(b"destroy_engine\0")?;
            let evaluate_variant = *library.get::<RequestFn>(b"evaluate_variant\0")?;
            let evaluate_boolean = *library.get::<RequestFn>(b"evaluate_boolean\0")?;
            let evaluate_batch = *library.get::<RequestFn>(b"evaluate_batch\0")?;
            let list_flags = *library.get::<QueryFn>(b"list_flags\0")?;
            let get_snapshot = *library.get::<QueryFn>(b"get_snapshot\0")?;
            let destroy_string = *library.get::<DestroyStringFn>(b"destroy_string\0")?;
            let update_authentication = library
                .get::<RequestFn>(b"update_authentication\0")
                .ok()
                .map(|symbol| *symbol);

            if update_authentication.is_none() {
                log::debug!(target: "flipt", "engine does not export update_authentication");
            }

            Ok(NativeLibrary {
                path: path.to_owned(),
                initialize_engine,
                destroy_engine,
                evaluate_variant,
                evaluate_boolean,
                evaluate_batch,
                list_flags,
                get_snapshot,
                update_authentication,
                destroy_string,
                _library: library,
            })
        }
    }
}

impl std::fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("path", &self.path)
            .field(
                "update_authentication",
                &self.update_authentication.is_some(),
            )
            .finish_non_exhaustive()
    }
}

// SAFETY: the function pointers come from the engine library, which implements the documented
// ownership contract for engines and strings.
unsafe impl EngineLibrary for NativeLibrary {
    unsafe fn initialize_engine(&self, opts: &CStr) -> *mut c_void {
        (self.initialize_engine)(opts.as_ptr())
    }

    unsafe fn destroy_engine(&self, engine: *mut c_void) {
        (self.destroy_engine)(engine)
    }

    unsafe fn evaluate_variant(&self, engine: *mut c_void, request: &CStr) -> *mut c_char {
        (self.evaluate_variant)(engine, request.as_ptr())
    }

    unsafe fn evaluate_boolean(&self, engine: *mut c_void, request: &CStr) -> *mut c_char {
        (self.evaluate_boolean)(engine, request.as_ptr())
    }

    unsafe fn evaluate_batch(&self, engine: *mut c_void, requests: &CStr) -> *mut c_char {
        (self.evaluate_batch)(engine, requests.as_ptr())
    }

    unsafe fn list_flags(&self, engine: *mut c_void) -> *mut c_char {
        (self.list_flags)(engine)
    }

    unsafe fn get_snapshot(&self, engine: *mut c_void) -> *mut c_char {
        (self.get_snapshot)(engine)
    }

    unsafe fn update_authentication(
        &self,
        engine: *mut c_void,
        authentication: &CStr,
    ) -> Option<*mut c_char> {
        self.update_authentication
            .map(|update| update(engine, authentication.as_ptr()))
    }

    unsafe fn destroy_string(&self, ptr: *mut c_char) {
        (self.destroy_string)(ptr)
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}
