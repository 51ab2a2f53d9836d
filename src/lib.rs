//! The Rust client for Flipt, backed by the native Flipt evaluation engine.
//!
//! # Overview
//!
//! The client loads the pre-built Flipt engine (`libfliptengine.so`, `libfliptengine.dylib` or
//! `fliptengine.dll`) at runtime and evaluates flags locally. The engine fetches flag state from
//! a Flipt server in the background; evaluations never leave the process.
//!
//! Create a [`FliptClient`] from [`ClientOptions`], then call
//! [`evaluate_variant`](FliptClient::evaluate_variant),
//! [`evaluate_boolean`](FliptClient::evaluate_boolean) or
//! [`evaluate_batch`](FliptClient::evaluate_batch) with an entity id and a [`Context`].
//!
//! The engine library for the current [`Platform`] is looked up in the directory named by the
//! `FLIPT_ENGINE_DIR` environment variable, or in `ext/` next to the running executable. Use
//! [`NativeLibrary::open`] with [`FliptClient::with_library`] to load it from elsewhere.
//!
//! An [`EvaluationHook`] observes every evaluation. An [`AuthenticationProvider`] supplies
//! short-lived credentials, which the client refreshes in the background before they expire.
//!
//! # Error Handling
//!
//! Errors are represented by the [`Error`] enum.
//!
//! Failures reported by the engine (for example, evaluating a flag that does not exist) are
//! returned as [`Error::Evaluation`] carrying the engine's message. Invalid arguments are rejected
//! with [`Error::Validation`] before the engine is called.
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate for logging
//! messages under the `flipt` target. Consider integrating a `log`-compatible logger
//! implementation for better visibility into client operations.
//!
//! # Examples
//!
//! ```no_run
//! # use flipt_client::{ClientOptions, Context, FliptClient};
//! let client = FliptClient::new(ClientOptions::new().url("http://localhost:8080"))?;
//!
//! let enabled = client
//!     .evaluate_boolean("flag_boolean", "someentity", &Context::new())?
//!     .enabled;
//! # Ok::<(), flipt_client::Error>(())
//! ```
//!
//! A complete example can be found in the `demos` directory of the crate repository.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

mod client;
mod codec;
mod config;
mod engine;
mod error;
mod hook;
mod models;
mod native;
mod platform;
mod refresher;
mod tls;

pub use client::FliptClient;
pub use config::{Authentication, ClientOptions, ErrorStrategy, FetchMode};
pub use error::{Error, Result};
pub use hook::{AfterEvaluation, BeforeEvaluation, EvaluationHook};
pub use models::{
    BatchEvaluationResponse, BooleanEvaluationResponse, Context, ErrorEvaluationResponse,
    EvaluationRequest, EvaluationResponse, Flag, FlagType, Snapshot, VariantEvaluationResponse,
};
pub use native::{EngineLibrary, NativeLibrary};
pub use platform::{
    default_library_path, engine_dir, resolve_library_path, Platform, ENGINE_DIR_ENV,
};
pub use refresher::{AuthenticationLease, AuthenticationProvider};
pub use tls::TlsConfig;
