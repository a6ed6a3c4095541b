//! # send-limit
//!
//! `send-limit` throttles outbound sends with an exact sliding window and parks
//! rejected messages until the window reopens.
//!
//! ## Core Philosophy
//!
//! The throttler never sleeps and never spawns anything. Every call is an
//! ordinary synchronous call that either delivers the message through the
//! injected callback or queues it, and reports how long the caller must wait
//! before asking again. Scheduling that retry is the caller's job.
//!
//! ## Key Concepts
//!
//! * **Exact Window**: The last `capacity` send timestamps are kept in a
//!   [`RingBuffer`]. A send is admitted unless all of them fall inside the
//!   interval, in which case the wait is exactly the time until the oldest
//!   one leaves it.
//! * **Two Tiers**: One message type is designated high priority. Queued
//!   high priority messages are always drained before anything else.
//! * **Open Categories**: Any other type the callback accepts (via [`OnSend`])
//!   can be queued; it is type-erased behind a uniform deliver operation.
//!
//! ## Example
//!
//! ```rust
//! use std::num::NonZeroUsize;
//! use std::time::Duration;
//!
//! use send_limit::OnSend;
//! use send_limit::Throttler;
//!
//! struct Cancel(u32);
//! struct Amend(u32);
//!
//! #[derive(Default)]
//! struct Wire {
//!     sent: Vec<String>,
//! }
//!
//! impl OnSend<Cancel> for Wire {
//!     fn on_send(&mut self, message: Cancel) {
//!         self.sent.push(format!("cancel {}", message.0));
//!     }
//! }
//!
//! impl OnSend<Amend> for Wire {
//!     fn on_send(&mut self, message: Amend) {
//!         self.sent.push(format!("amend {}", message.0));
//!     }
//! }
//!
//! let capacity = NonZeroUsize::new(1).unwrap();
//! let mut throttler: Throttler<Cancel, Wire> =
//!     Throttler::new(capacity, Duration::from_secs(1), Wire::default());
//!
//! assert!(throttler.try_send(Amend(1)).is_zero());
//! // The window is full, so this one is queued.
//! let delay = throttler.try_send(Cancel(2));
//! assert!(!delay.is_zero());
//! assert_eq!(throttler.pending(), 1);
//! ```

use std::fmt::Debug;
use std::ops::ControlFlow;
use std::time::Duration;

mod config;
mod error;
mod ring_buffer;
mod sliding_window;
mod throttler;

pub use config::ThrottlerConfig;
pub use error::ConfigError;
pub use error::Rejected;
pub use ring_buffer::RingBuffer;
pub use sliding_window::SlidingWindow;
pub use throttler::OnSend;
pub use throttler::Throttler;

/// Reasons why a send might be rejected by a strategy.
#[derive(Debug, PartialEq)]
pub enum Reason {
    Overloaded { retry_after: Duration },
}

/// Admission control consulted by a [`Throttler`] before every send.
///
/// Implementations are single-owner and need no synchronization; the
/// throttler holds the strategy exclusively.
pub trait Strategy: Debug {
    /// Attempts to admit a single send.
    ///
    /// An admitted send is recorded against the limit. A rejected one
    /// leaves the strategy untouched.
    ///
    /// # Errors
    ///
    /// Returns `Reason` if the rate limit has been reached.
    fn process(&mut self) -> ControlFlow<Reason>;
}
