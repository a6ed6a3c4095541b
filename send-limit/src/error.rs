use std::fmt;

/// Errors produced when building a throttler from untyped configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A window must admit at least one send.
    #[error("capacity must be non-zero")]
    ZeroCapacity,

    /// A pending limit of zero would reject every throttled message.
    #[error("max_pending must be non-zero when set")]
    ZeroPendingLimit,
}

/// A throttled message that could not be queued because the pending
/// queues were already at their limit.
///
/// The message is handed back to the caller untouched.
pub struct Rejected<M> {
    message: M,
    limit: usize,
}

impl<M> Rejected<M> {
    pub(crate) fn new(message: M, limit: usize) -> Self {
        Self { message, limit }
    }

    /// The configured pending limit that was hit.
    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn into_inner(self) -> M {
        self.message
    }
}

impl<M> fmt::Debug for Rejected<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("message", &std::any::type_name::<M>())
            .field("limit", &self.limit)
            .finish()
    }
}

impl<M> fmt::Display for Rejected<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pending queue is full ({} messages)", self.limit)
    }
}

impl<M> std::error::Error for Rejected<M> {}
