//! Owned handle to a native engine instance.
use std::{
    ffi::{c_char, c_void},
    ptr::NonNull,
    sync::Arc,
};

use serde::de::DeserializeOwned;

use crate::{
    codec,
    models::{EngineResult, InternalEvaluationRequest},
    native::{EngineLibrary, NativeString},
    Authentication, BatchEvaluationResponse, BooleanEvaluationResponse, ClientOptions, Error,
    Flag, Result, Snapshot, VariantEvaluationResponse,
};

/// A live engine. Destroyed exactly once, when dropped.
///
/// The engine is not safe for concurrent use, so `Engine` is `Send` but not `Sync`.
pub(crate) struct Engine {
    handle: NonNull<c_void>,
    library: Arc<dyn EngineLibrary>,
}

// SAFETY: the handle is only used through `&self`/`&mut self` of a single owner, and `Engine` is
// not `Sync`, so calls never overlap.
unsafe impl Send for Engine {}

impl Engine {
    pub(crate) fn initialize(
        library: Arc<dyn EngineLibrary>,
        options: &ClientOptions,
    ) -> Result<Engine> {
        let opts = codec::encode(options)?;

        // SAFETY: `opts` is a JSON document.
        let handle = unsafe { library.initialize_engine(&opts) };
        let Some(handle) = NonNull::new(handle) else {
            log::warn!(target: "flipt", namespace = options.namespace.as_str(); "engine failed to initialize");
            return Err(Error::EngineInitialization);
        };

        log::debug!(target: "flipt", namespace = options.namespace.as_str(), library:? = library.path(); "engine initialized");
        Ok(Engine { handle, library })
    }

    pub(crate) fn evaluate_variant(
        &self,
        request: &InternalEvaluationRequest<'_>,
    ) -> Result<VariantEvaluationResponse> {
        let request = codec::encode(request)?;
        // SAFETY: `handle` is live until drop.
        let ptr = unsafe { self.library.evaluate_variant(self.handle.as_ptr(), &request) };
        self.enveloped("evaluate_variant", ptr)
    }

    pub(crate) fn evaluate_boolean(
        &self,
        request: &InternalEvaluationRequest<'_>,
    ) -> Result<BooleanEvaluationResponse> {
        let request = codec::encode(request)?;
        // SAFETY: `handle` is live until drop.
        let ptr = unsafe { self.library.evaluate_boolean(self.handle.as_ptr(), &request) };
        self.enveloped("evaluate_boolean", ptr)
    }

    pub(crate) fn evaluate_batch(
        &self,
        requests: &[InternalEvaluationRequest<'_>],
    ) -> Result<BatchEvaluationResponse> {
        let requests = codec::encode(requests)?;
        // SAFETY: `handle` is live until drop.
        let ptr = unsafe { self.library.evaluate_batch(self.handle.as_ptr(), &requests) };
        self.enveloped("evaluate_batch", ptr)
    }

    pub(crate) fn list_flags(&self) -> Result<Vec<Flag>> {
        // SAFETY: `handle` is live until drop.
        let ptr = unsafe { self.library.list_flags(self.handle.as_ptr()) };
        self.enveloped("list_flags", ptr)
    }

    /// The snapshot is returned as the bare base64 string, without an envelope.
    pub(crate) fn get_snapshot(&self) -> Result<Snapshot> {
        // SAFETY: `handle` is live until drop.
        let ptr = unsafe { self.library.get_snapshot(self.handle.as_ptr()) };
        let response = self.take("get_snapshot", ptr)?;
        Ok(Snapshot::from(response.to_str()?))
    }

    pub(crate) fn update_authentication(&self, authentication: &Authentication) -> Result<()> {
        let authentication = codec::encode(authentication)?;
        // SAFETY: `handle` is live until drop.
        let ptr = unsafe {
            self.library
                .update_authentication(self.handle.as_ptr(), &authentication)
        }
        .ok_or(Error::Unsupported("update_authentication"))?;
        let response = self.take("update_authentication", ptr)?;
        codec::decode::<EngineResult<serde_json::Value>>(response.to_str()?)?.into_status()
    }

    fn enveloped<T: DeserializeOwned>(&self, function: &'static str, ptr: *mut c_char) -> Result<T> {
        let response = self.take(function, ptr)?;
        codec::decode::<EngineResult<T>>(response.to_str()?)?.into_result()
    }

    /// Take ownership of a buffer just returned by the engine.
    fn take(&self, function: &'static str, ptr: *mut c_char) -> Result<NativeString<'_>> {
        // SAFETY: `ptr` was just returned by `library` and is owned by nobody else.
        unsafe { NativeString::from_raw(&*self.library, ptr) }.ok_or_else(|| {
            log::warn!(target: "flipt", function; "engine returned no response");
            Error::NullResponse(function)
        })
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // SAFETY: `handle` came from `initialize_engine` and is destroyed only here.
        unsafe { self.library.destroy_engine(self.handle.as_ptr()) };
        log::debug!(target: "flipt", "engine destroyed");
    }
}
