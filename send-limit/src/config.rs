use std::num::NonZeroUsize;
use std::time::Duration;

use crate::ConfigError;
use crate::OnSend;
use crate::Throttler;

/// Untyped throttler settings, as read from a command line or a file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThrottlerConfig {
    /// Maximum sends within any `interval`.
    pub capacity: usize,
    pub interval: Duration,
    /// Upper bound on queued messages enforced by [`Throttler::offer`].
    pub max_pending: Option<usize>,
}

impl Default for ThrottlerConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            interval: Duration::from_secs(1),
            max_pending: None,
        }
    }
}

impl ThrottlerConfig {
    pub fn new(capacity: usize, interval: Duration) -> Self {
        Self {
            capacity,
            interval,
            max_pending: None,
        }
    }

    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = Some(max_pending);
        self
    }

    /// Build a sliding window throttler delivering through `on_send`.
    ///
    /// # Errors
    ///
    /// Fails if `capacity` or a configured `max_pending` is zero.
    pub fn build<H, C>(&self, on_send: C) -> Result<Throttler<H, C>, ConfigError>
    where
        H: Send + 'static,
        C: OnSend<H>,
    {
        let capacity = NonZeroUsize::new(self.capacity).ok_or(ConfigError::ZeroCapacity)?;
        let mut throttler = Throttler::new(capacity, self.interval, on_send);

        if let Some(max_pending) = self.max_pending {
            let limit = NonZeroUsize::new(max_pending).ok_or(ConfigError::ZeroPendingLimit)?;
            throttler = throttler.with_max_pending(limit);
        }

        Ok(throttler)
    }
}
