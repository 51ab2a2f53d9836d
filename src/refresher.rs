use std::{
    sync::{mpsc::RecvTimeoutError, Arc, Mutex, PoisonError},
    thread::JoinHandle,
    time::Duration,
};

use chrono::{DateTime, Utc};

use crate::{engine::Engine, Authentication, Result};

/// Credentials together with the time they stop being valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationLease {
    /// Credentials to present to the Flipt server.
    pub authentication: Authentication,
    /// When the credentials expire.
    pub expires_at: DateTime<Utc>,
}

impl AuthenticationLease {
    /// Create a lease.
    pub fn new(authentication: Authentication, expires_at: DateTime<Utc>) -> AuthenticationLease {
        AuthenticationLease {
            authentication,
            expires_at,
        }
    }
}

/// Source of short-lived credentials.
///
/// When set with
/// [`ClientOptions::authentication_provider`](crate::ClientOptions::authentication_provider), the
/// provider supplies the initial credentials and is asked again shortly before each lease
/// expires. Failures are retried.
///
/// Any `Fn() -> Result<AuthenticationLease>` closure is a provider:
/// ```
/// # use chrono::{Duration, Utc};
/// # use flipt_client::{Authentication, AuthenticationLease, ClientOptions};
/// let options = ClientOptions::new().authentication_provider(
///     || -> flipt_client::Result<AuthenticationLease> {
///         Ok(AuthenticationLease::new(
///             Authentication::jwt_token("token"),
///             Utc::now() + Duration::minutes(10),
///         ))
///     },
/// );
/// ```
pub trait AuthenticationProvider: Send + Sync {
    /// Obtain fresh credentials.
    fn authenticate(&self) -> Result<AuthenticationLease>;
}

impl<T: Fn() -> Result<AuthenticationLease> + Send + Sync> AuthenticationProvider for T {
    fn authenticate(&self) -> Result<AuthenticationLease> {
        self()
    }
}

impl std::fmt::Debug for dyn AuthenticationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthenticationProvider")
    }
}

/// Credentials are refreshed this long before they expire.
const EXPIRY_BUFFER: Duration = Duration::from_secs(30);
/// Lower bound on the wait before retrying a refresh that is already due.
const MIN_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Background thread pushing fresh credentials from a provider to the engine.
///
/// Stopped and joined when dropped.
pub(crate) struct AuthenticationRefresher {
    join_handle: Option<JoinHandle<()>>,

    /// Used to send a stop command to the refresher thread.
    stop_sender: std::sync::mpsc::Sender<()>,
}

impl AuthenticationRefresher {
    pub(crate) fn start(
        engine: Arc<Mutex<Engine>>,
        provider: Arc<dyn AuthenticationProvider>,
        expires_at: DateTime<Utc>,
    ) -> Result<AuthenticationRefresher> {
        let (stop_sender, stop_receiver) = std::sync::mpsc::channel::<()>();

        let join_handle = std::thread::Builder::new()
            .name("flipt-auth-refresh".to_owned())
            .spawn(move || {
                let mut expires_at = expires_at;
                loop {
                    let delay = refresh_delay(expires_at, Utc::now());
                    match stop_receiver.recv_timeout(delay) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                            log::debug!(target: "flipt", "authentication refresher received stop command");
                            return;
                        }
                    }

                    let refreshed = provider.authenticate().and_then(|lease| {
                        engine
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .update_authentication(&lease.authentication)?;
                        Ok(lease.expires_at)
                    });
                    match refreshed {
                        Ok(next) => {
                            log::debug!(target: "flipt", expires_at:display = next; "refreshed authentication");
                            expires_at = next;
                        }
                        Err(err) => {
                            // `expires_at` is unchanged, so the next attempt comes after
                            // MIN_RETRY_DELAY.
                            log::warn!(target: "flipt", "failed to refresh authentication: {:?}", err);
                        }
                    }
                }
            })?;

        Ok(AuthenticationRefresher {
            join_handle: Some(join_handle),
            stop_sender,
        })
    }
}

impl Drop for AuthenticationRefresher {
    fn drop(&mut self) {
        // Error means that the thread has already exited.
        let _ = self.stop_sender.send(());
        if let Some(join_handle) = self.join_handle.take() {
            if join_handle.join().is_err() {
                log::warn!(target: "flipt", "authentication refresher thread panicked");
            }
        }
    }
}

/// Time to wait before refreshing a lease expiring at `expires_at`.
fn refresh_delay(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (expires_at - now)
        .to_std()
        .ok()
        .and_then(|remaining| remaining.checked_sub(EXPIRY_BUFFER))
        .filter(|delay| !delay.is_zero())
        .unwrap_or(MIN_RETRY_DELAY)
}
