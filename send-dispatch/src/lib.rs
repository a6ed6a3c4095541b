//! # Send Dispatch
//!
//! `send-dispatch` runs a [`send_limit::Throttler`] inside a single tokio task
//! and lets any number of producers feed it.
//!
//! The throttler itself never sleeps; it only reports how long to wait. The
//! [`Dispatcher`] worker owns it exclusively, takes messages from an mpsc
//! channel, and schedules a drain whenever a send is throttled:
//!
//! 1. **Submit**: Every inbound message goes through `try_send`. A non-zero
//!    result schedules a drain at `now + delay`.
//! 2. **Drain**: When the deadline passes, `send_queued` runs and the next
//!    deadline is taken from its result.
//! 3. **Shutdown**: Once every [`DispatchHandle`] is dropped, the worker keeps
//!    draining until nothing is pending and then hands the throttler back.

mod dispatcher;
mod error;


pub use dispatcher::DispatchHandle;
pub use dispatcher::Dispatcher;
pub use error::DispatchError;
