use std::{path::PathBuf, sync::Arc};

/// Result type used throughout the Flipt client.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the Flipt client.
///
/// Errors fall into two groups. [`Error::Validation`] and [`Error::Evaluation`] are returned by
/// individual evaluation calls. The remaining variants are construction-time failures (the engine
/// library could not be located, loaded, or initialized) or indicate a broken contract with the
/// native engine.
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// Caller input was rejected before reaching the engine.
    #[error("{0}")]
    Validation(String),

    /// The engine reported a failure. The message is passed through verbatim.
    #[error("{0}")]
    Evaluation(String),

    /// There is no packaged engine library for this operating system and architecture.
    #[error("unsupported platform/processor: {os}/{arch}")]
    UnsupportedPlatform {
        /// Operating system name.
        os: String,
        /// Processor architecture name.
        arch: String,
    },

    /// The engine library file does not exist.
    #[error("the engine library could not be found at the path: {}", .0.display())]
    LibraryNotFound(PathBuf),

    /// The engine library could not be opened or a required symbol is missing.
    #[error("failed to load engine library")]
    // libloading::Error is not clonable, so we're wrapping it in an Arc.
    Library(#[source] Arc<libloading::Error>),

    /// `initialize_engine` returned a null handle.
    #[error("engine failed to initialize")]
    EngineInitialization,

    /// A native function returned a null buffer where a response was expected.
    #[error("no response returned from native function `{0}`")]
    NullResponse(&'static str),

    /// Invalid `url` in client options.
    #[error("invalid url configuration")]
    InvalidUrl(#[source] url::ParseError),

    /// Failed to serialize a request for the engine.
    #[error("failed to encode engine request")]
    Encoding(#[source] Arc<serde_json::Error>),

    /// Failed to parse a response returned by the engine.
    #[error("failed to decode engine response")]
    Decoding(#[source] Arc<serde_json::Error>),

    /// A request contained an interior NUL byte, or the engine returned a non-UTF-8 string.
    #[error("string cannot cross the engine boundary")]
    InvalidString,

    /// Snapshot is not base64-encoded JSON.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// An [`AuthenticationProvider`](crate::AuthenticationProvider) could not supply credentials.
    #[error("failed to obtain authentication: {0}")]
    Authentication(String),

    /// The loaded engine does not export an optional function.
    #[error("engine does not support `{0}`")]
    Unsupported(&'static str),

    /// An I/O error.
    #[error(transparent)]
    // std::io::Error is not clonable, so we're wrapping it in an Arc.
    Io(Arc<std::io::Error>),
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

impl From<libloading::Error> for Error {
    fn from(value: libloading::Error) -> Self {
        Error::Library(Arc::new(value))
    }
}

impl From<url::ParseError> for Error {
    fn from(value: url::ParseError) -> Self {
        Error::InvalidUrl(value)
    }
}

impl Error {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }
}
