//! Background token refresh.
//!
//! DESIGN
//! ======
//! A ticker checks the held session and refreshes it once it is inside the
//! refresh margin. Transient failures are retried on the next tick; a
//! rejected refresh token signs the user out inside `AuthClient`.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::client::AuthClient;

pub const DEFAULT_REFRESH_TICK_SECS: u64 = 10;

/// Spawn the refresh loop. Abort the returned handle to stop it.
pub fn spawn_auto_refresh(client: Arc<AuthClient>, tick: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match client.refresh_if_due().await {
                Ok(true) => tracing::debug!("auto refresh renewed session"),
                Ok(false) => {}
                Err(e) if e.retryable() => tracing::warn!(error = %e, "auto refresh failed; will retry"),
                Err(e) => tracing::warn!(error = %e, "auto refresh gave up on session"),
            }
        }
    })
}

#[cfg(test)]
#[path = "refresh_test.rs"]
mod tests;
