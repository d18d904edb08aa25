// Bearer credential cache with a lifetime-scoped periodic refresh
use crate::application::collaborators::AuthProvider;
use crate::domain::auth::AuthToken;
use crate::domain::error::AuthError;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);

struct TokenSlot {
    provider: Arc<dyn AuthProvider>,
    token: RwLock<Option<AuthToken>>,
}

impl TokenSlot {
    fn current(&self) -> Option<AuthToken> {
        self.token.read().clone()
    }

    fn store(&self, token: AuthToken) {
        *self.token.write() = Some(token);
    }
}

/// Owns one dialog's credential and its keep-alive timer.
///
/// The timer is (re)armed by every [`refresh`](Self::refresh) and runs until
/// [`dispose`](Self::dispose) is called or the manager is dropped.
pub struct AuthTokenManager {
    slot: Arc<TokenSlot>,
    interval: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
}

impl AuthTokenManager {
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self::with_interval(provider, DEFAULT_REFRESH_INTERVAL)
    }

    pub fn with_interval(provider: Arc<dyn AuthProvider>, interval: Duration) -> Self {
        Self {
            slot: Arc::new(TokenSlot {
                provider,
                token: RwLock::new(None),
            }),
            interval,
            timer: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    /// Cached token, refreshing first if there is none.
    pub async fn get_token(&self) -> Result<AuthToken, AuthError> {
        if let Some(token) = self.slot.current() {
            return Ok(token);
        }
        self.refresh().await
    }

    pub fn current(&self) -> Option<AuthToken> {
        self.slot.current()
    }

    /// Unconditionally fetch a new token and re-arm the periodic refresh.
    pub async fn refresh(&self) -> Result<AuthToken, AuthError> {
        let result = self.slot.provider.refresh_token().await;
        match &result {
            Ok(token) => {
                self.slot.store(token.clone());
                tracing::debug!("Bearer token refreshed");
            }
            Err(e) => tracing::warn!(error = %e, "Bearer token refresh failed"),
        }
        self.arm_timer();
        result
    }

    /// Drop the cached token. The periodic timer keeps running.
    pub fn invalidate(&self) {
        *self.slot.token.write() = None;
    }

    /// Stop the periodic timer for good. Later calls are no-ops.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            tracing::debug!("Token manager already disposed");
            return;
        }
        if let Some(timer) = self.timer.lock().take() {
            timer.abort();
        }
        tracing::debug!("Token refresh timer cancelled");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn arm_timer(&self) {
        let mut timer = self.timer.lock();
        // Checked under the lock so a concurrent dispose cannot miss the new task.
        if self.is_disposed() {
            return;
        }

        let slot = Arc::clone(&self.slot);
        let period = self.interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match slot.provider.refresh_token().await {
                    Ok(token) => {
                        slot.store(token);
                        tracing::debug!("Periodic token refresh succeeded");
                    }
                    Err(e) => tracing::warn!(error = %e, "Periodic token refresh failed"),
                }
            }
        });

        if let Some(previous) = timer.replace(handle) {
            previous.abort();
        }
    }
}

impl Drop for AuthTokenManager {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            timer.abort();
        }
    }
}
