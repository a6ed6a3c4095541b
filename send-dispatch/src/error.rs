/// Errors produced by a [`DispatchHandle`](crate::DispatchHandle).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The worker task has stopped and can no longer accept messages.
    #[error("dispatcher is closed")]
    Closed,
}
