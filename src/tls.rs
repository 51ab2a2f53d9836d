use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// TLS settings for the engine's connection to the Flipt server.
///
/// Data fields take precedence over their file counterparts when both are set.
///
/// ```
/// # use flipt_client::TlsConfig;
/// let tls = TlsConfig::with_ca_cert_data("-----BEGIN CERTIFICATE-----\n...")
///     .unwrap()
///     .insecure_skip_hostname_verify(true);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ca_cert_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ca_cert_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    insecure_skip_verify: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    insecure_skip_hostname_verify: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_cert_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_key_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_cert_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_key_data: Option<String>,
}

impl TlsConfig {
    /// Empty configuration: the engine uses system roots.
    pub fn new() -> TlsConfig {
        TlsConfig::default()
    }

    /// Skip certificate verification. Only use this in development.
    pub fn insecure() -> TlsConfig {
        TlsConfig::new().insecure_skip_verify(true)
    }

    /// Trust the PEM CA certificate at `path`. The file must exist.
    pub fn with_ca_cert_file(path: impl AsRef<Path>) -> Result<TlsConfig> {
        let path = existing_file(path.as_ref(), "CA certificate file")?;
        Ok(TlsConfig::new().ca_cert_file(path))
    }

    /// Trust the given PEM CA certificate.
    pub fn with_ca_cert_data(pem: impl Into<String>) -> Result<TlsConfig> {
        let pem = non_blank(pem.into(), "CA certificate data")?;
        Ok(TlsConfig::new().ca_cert_data(pem))
    }

    /// Mutual TLS with PEM client certificate and key files. Both files must exist.
    pub fn with_mutual_tls(
        cert_file: impl AsRef<Path>,
        key_file: impl AsRef<Path>,
    ) -> Result<TlsConfig> {
        let cert_file = existing_file(cert_file.as_ref(), "client certificate file")?;
        let key_file = existing_file(key_file.as_ref(), "client key file")?;
        Ok(TlsConfig::new()
            .client_cert_file(cert_file)
            .client_key_file(key_file))
    }

    /// Mutual TLS with PEM client certificate and key contents.
    pub fn with_mutual_tls_data(
        cert_pem: impl Into<String>,
        key_pem: impl Into<String>,
    ) -> Result<TlsConfig> {
        let cert_pem = non_blank(cert_pem.into(), "client certificate data")?;
        let key_pem = non_blank(key_pem.into(), "client key data")?;
        Ok(TlsConfig::new()
            .client_cert_data(cert_pem)
            .client_key_data(key_pem))
    }

    /// Set the CA certificate file path.
    pub fn ca_cert_file(mut self, path: impl Into<String>) -> Self {
        self.ca_cert_file = Some(path.into());
        self
    }

    /// Set the CA certificate contents.
    pub fn ca_cert_data(mut self, pem: impl Into<String>) -> Self {
        self.ca_cert_data = Some(pem.into());
        self
    }

    /// Skip certificate verification.
    pub fn insecure_skip_verify(mut self, skip: bool) -> Self {
        self.insecure_skip_verify = Some(skip);
        self
    }

    /// Skip hostname verification while still verifying the certificate chain.
    pub fn insecure_skip_hostname_verify(mut self, skip: bool) -> Self {
        self.insecure_skip_hostname_verify = Some(skip);
        self
    }

    /// Set the client certificate file path.
    pub fn client_cert_file(mut self, path: impl Into<String>) -> Self {
        self.client_cert_file = Some(path.into());
        self
    }

    /// Set the client key file path.
    pub fn client_key_file(mut self, path: impl Into<String>) -> Self {
        self.client_key_file = Some(path.into());
        self
    }

    /// Set the client certificate contents.
    pub fn client_cert_data(mut self, pem: impl Into<String>) -> Self {
        self.client_cert_data = Some(pem.into());
        self
    }

    /// Set the client key contents.
    pub fn client_key_data(mut self, pem: impl Into<String>) -> Self {
        self.client_key_data = Some(pem.into());
        self
    }
}

fn existing_file(path: &Path, what: &str) -> Result<String> {
    if path.as_os_str().is_empty() {
        return Err(Error::validation(format!("{what} path cannot be empty")));
    }
    if !path.is_file() {
        return Err(Error::validation(format!(
            "{what} does not exist: {}",
            path.display()
        )));
    }
    Ok(path.to_string_lossy().into_owned())
}

fn non_blank(value: String, what: &str) -> Result<String> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{what} cannot be empty")));
    }
    Ok(value)
}
