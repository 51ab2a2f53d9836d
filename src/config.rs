use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize, Serializer};

use crate::{AuthenticationProvider, EvaluationHook, Result, Snapshot, TlsConfig};

/// Configuration for [`FliptClient`](crate::FliptClient).
///
/// Options are serialized once and handed to the engine when the client is created. Options that
/// are not set are omitted, so the engine applies its own defaults. Hooks and the authentication
/// provider stay on the Rust side.
///
/// # Examples
/// ```
/// # use std::time::Duration;
/// # use flipt_client::{Authentication, ClientOptions, ErrorStrategy};
/// let options = ClientOptions::new()
///     .url("https://flipt.example.com")
///     .namespace("production")
///     .authentication(Authentication::client_token("secret"))
///     .update_interval(Duration::from_secs(30))
///     .error_strategy(ErrorStrategy::Fallback);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ClientOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) environment: Option<String>,
    pub(crate) namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) url: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_seconds"
    )]
    pub(crate) request_timeout: Option<Duration>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_seconds"
    )]
    pub(crate) update_interval: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) authentication: Option<Authentication>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) fetch_mode: Option<FetchMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error_strategy: Option<ErrorStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) snapshot: Option<Snapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) tls_config: Option<TlsConfig>,
    #[serde(skip)]
    pub(crate) authentication_provider: Option<Arc<dyn AuthenticationProvider>>,
    #[serde(skip)]
    pub(crate) hooks: Vec<Arc<dyn EvaluationHook>>,
}

impl ClientOptions {
    /// Namespace used when none is set.
    pub const DEFAULT_NAMESPACE: &'static str = "default";

    /// Create options with every setting left to the engine's default.
    pub fn new() -> ClientOptions {
        ClientOptions::default()
    }

    /// Flipt environment to read flags from.
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Namespace to evaluate flags in. Defaults to [`ClientOptions::DEFAULT_NAMESPACE`].
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Base URL of the Flipt server.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Timeout of each request the engine makes to the server. Sent as whole seconds.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Interval between polls for new flag state. Sent as whole seconds.
    pub fn update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = Some(interval);
        self
    }

    /// Credentials for the Flipt server.
    pub fn authentication(mut self, authentication: Authentication) -> Self {
        self.authentication = Some(authentication);
        self
    }

    /// Obtain credentials from `provider` and keep them fresh.
    ///
    /// The provider supplies the initial credentials, replacing any set with
    /// [`ClientOptions::authentication`]. The client then asks it again 30 seconds before each
    /// lease expires and pushes the result to the engine from a background thread.
    pub fn authentication_provider(
        mut self,
        provider: impl AuthenticationProvider + 'static,
    ) -> Self {
        self.authentication_provider = Some(Arc::new(provider));
        self
    }

    /// Register a hook called around every flag evaluation. Hooks run in registration order.
    pub fn hook(mut self, hook: impl EvaluationHook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Git reference to read flag state from (for Git-backed Flipt instances).
    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// How the engine receives updates.
    pub fn fetch_mode(mut self, fetch_mode: FetchMode) -> Self {
        self.fetch_mode = Some(fetch_mode);
        self
    }

    /// What the engine does when the server cannot be reached.
    pub fn error_strategy(mut self, error_strategy: ErrorStrategy) -> Self {
        self.error_strategy = Some(error_strategy);
        self
    }

    /// Initial flag state, as returned by
    /// [`FliptClient::get_snapshot`](crate::FliptClient::get_snapshot).
    pub fn snapshot(mut self, snapshot: impl Into<Snapshot>) -> Self {
        self.snapshot = Some(snapshot.into());
        self
    }

    /// TLS settings for the server connection.
    pub fn tls_config(mut self, tls_config: TlsConfig) -> Self {
        self.tls_config = Some(tls_config);
        self
    }

    /// Check options that can be validated without the engine.
    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(url) = &self.url {
            url::Url::parse(url)?;
        }
        Ok(())
    }
}

impl Default for ClientOptions {
    fn default() -> ClientOptions {
        ClientOptions {
            environment: None,
            namespace: ClientOptions::DEFAULT_NAMESPACE.to_owned(),
            url: None,
            request_timeout: None,
            update_interval: None,
            authentication: None,
            reference: None,
            fetch_mode: None,
            error_strategy: None,
            snapshot: None,
            tls_config: None,
            authentication_provider: None,
            hooks: Vec::new(),
        }
    }
}

fn serialize_seconds<S>(value: &Option<Duration>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(duration) => serializer.serialize_u64(duration.as_secs()),
        None => serializer.serialize_none(),
    }
}

/// Credentials the engine presents to the Flipt server.
///
/// Serialized as `{"client_token": "..."}` or `{"jwt_token": "..."}`.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Authentication {
    /// Static client token.
    ClientToken(String),
    /// JSON Web Token.
    JwtToken(String),
}

impl Authentication {
    /// Client token authentication.
    pub fn client_token(token: impl Into<String>) -> Authentication {
        Authentication::ClientToken(token.into())
    }

    /// JWT authentication.
    pub fn jwt_token(token: impl Into<String>) -> Authentication {
        Authentication::JwtToken(token.into())
    }
}

// Tokens are secrets and must not end up in logs.
impl std::fmt::Debug for Authentication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Authentication::ClientToken(_) => f.write_str("ClientToken(<redacted>)"),
            Authentication::JwtToken(_) => f.write_str("JwtToken(<redacted>)"),
        }
    }
}

/// How the engine receives flag state updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// Poll the server every update interval.
    #[default]
    Polling,
    /// Keep a streaming connection open. Requires server support.
    Streaming,
}

/// Engine behavior when fetching flag state fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorStrategy {
    /// Surface the failure on evaluation.
    #[default]
    Fail,
    /// Keep evaluating against the last known (or snapshot) state.
    Fallback,
}
