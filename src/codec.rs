//! JSON encoding of engine requests and decoding of engine responses.
//!
//! This is the only place that talks to `serde_json` for data crossing the engine boundary.
use std::{ffi::CString, sync::Arc};

use serde::{de::DeserializeOwned, Serialize};

use crate::{Error, Result};

/// Serialize `value` to JSON as a NUL-terminated string that can be passed to the engine.
pub(crate) fn encode<T: Serialize + ?Sized>(value: &T) -> Result<CString> {
    let json = serde_json::to_vec(value).map_err(|err| Error::Encoding(Arc::new(err)))?;
    CString::new(json).map_err(|_| Error::InvalidString)
}

/// Parse a JSON document returned by the engine.
pub(crate) fn decode<T: DeserializeOwned>(json: &str) -> Result<T> {
    serde_json::from_str(json).map_err(|err| {
        log::warn!(target: "flipt", "failed to decode engine response: {:?}", err);
        Error::Decoding(Arc::new(err))
    })
}

/// Parse a JSON document from raw bytes.
pub(crate) fn decode_bytes<T: DeserializeOwned>(json: &[u8]) -> Result<T> {
    serde_json::from_slice(json).map_err(|err| Error::Decoding(Arc::new(err)))
}
