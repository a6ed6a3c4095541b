use std::any::Any;
use std::any::type_name;
use std::collections::VecDeque;
use std::fmt;
use std::num::NonZeroUsize;
use std::ops::ControlFlow;
use std::time::Duration;

use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use quanta::Clock;
use tracing::debug;
use tracing::trace;

use crate::Reason;
use crate::Rejected;
use crate::SlidingWindow;
use crate::Strategy;

const TIER_DIRECT: &str = "direct";
const TIER_HIGH: &str = "high";
const TIER_GENERAL: &str = "general";

// A rejection must never look like a send to the caller.
const MIN_RETRY: Duration = Duration::from_nanos(1);

/// The delivery callback, implemented once for every message category it
/// accepts.
pub trait OnSend<M> {
    fn on_send(&mut self, message: M);
}

/// A queued message of some category, erased to a uniform deliver operation.
pub(crate) trait Deliver<C>: Send {
    /// Hand the message to the callback, consuming it.
    fn deliver(self: Box<Self>, on_send: &mut C);

    /// Name of the message category, for diagnostics.
    fn category(&self) -> &'static str;
}

struct Queued<M>(M);

impl<M, C> Deliver<C> for Queued<M>
where
    M: Send,
    C: OnSend<M>,
{
    fn deliver(self: Box<Self>, on_send: &mut C) {
        on_send.on_send(self.0);
    }

    fn category(&self) -> &'static str {
        type_name::<M>()
    }
}

#[derive(Clone, Debug)]
struct ThrottlerMetrics {
    delivered: Counter<u64>,
    queued: Counter<u64>,
    throttled: Counter<u64>,
    rejected: Counter<u64>,
}

impl ThrottlerMetrics {
    fn new() -> Self {
        let meter = global::meter("throttler");
        Self {
            delivered: meter.u64_counter("delivered").build(),
            queued: meter.u64_counter("queued").build(),
            throttled: meter.u64_counter("throttled").build(),
            rejected: meter.u64_counter("rejected").build(),
        }
    }
}

/// Throttles sends through a [`Strategy`] and queues whatever it rejects.
///
/// Messages of type `H` are high priority: when queued they are always
/// delivered before any other queued message. Every other type the callback
/// `C` accepts goes to a single general queue in arrival order.
///
/// The throttler never blocks. Both [`try_send`](Self::try_send) and
/// [`send_queued`](Self::send_queued) return how long the caller should wait
/// before calling `send_queued` again, or zero if nothing is left waiting.
pub struct Throttler<H, C, S = SlidingWindow> {
    strategy: S,
    on_send: C,
    high_priority: VecDeque<H>,
    general: VecDeque<Box<dyn Deliver<C>>>,
    max_pending: Option<NonZeroUsize>,
    instruments: ThrottlerMetrics,
}

impl<H, C> Throttler<H, C>
where
    H: Send + 'static,
    C: OnSend<H>,
{
    /// Throttle to at most `capacity` sends in any `interval`.
    pub fn new(capacity: NonZeroUsize, interval: Duration, on_send: C) -> Self {
        Self::with_strategy(SlidingWindow::new(capacity, interval), on_send)
    }

    pub fn with_clock(
        capacity: NonZeroUsize,
        interval: Duration,
        clock: Clock,
        on_send: C,
    ) -> Self {
        Self::with_strategy(
            SlidingWindow::with_clock(capacity, interval, clock),
            on_send,
        )
    }
}

impl<H, C, S> Throttler<H, C, S>
where
    H: Send + 'static,
    C: OnSend<H>,
    S: Strategy,
{
    pub fn with_strategy(strategy: S, on_send: C) -> Self {
        Self {
            strategy,
            on_send,
            high_priority: VecDeque::new(),
            general: VecDeque::new(),
            max_pending: None,
            instruments: ThrottlerMetrics::new(),
        }
    }

    /// Bound the number of queued messages accepted by [`offer`](Self::offer).
    ///
    /// [`try_send`](Self::try_send) ignores this limit.
    pub fn with_max_pending(mut self, max_pending: NonZeroUsize) -> Self {
        self.max_pending = Some(max_pending);
        self
    }

    /// Send `message` now if the strategy admits it, otherwise queue it.
    ///
    /// Returns zero if the message was delivered. Otherwise returns the
    /// minimum time to wait before calling [`send_queued`](Self::send_queued).
    pub fn try_send<M>(&mut self, message: M) -> Duration
    where
        M: Send + 'static,
        C: OnSend<M>,
    {
        match self.strategy.process() {
            ControlFlow::Continue(()) => {
                self.send_now(message);
                Duration::ZERO
            }
            ControlFlow::Break(Reason::Overloaded { retry_after }) => {
                self.enqueue(message, retry_after);
                retry_after.max(MIN_RETRY)
            }
        }
    }

    /// Like [`try_send`](Self::try_send), but refuses to queue beyond the
    /// configured pending limit.
    ///
    /// # Errors
    ///
    /// Returns the message inside [`Rejected`] if it was throttled and the
    /// queues already hold `max_pending` messages.
    pub fn offer<M>(&mut self, message: M) -> Result<Duration, Rejected<M>>
    where
        M: Send + 'static,
        C: OnSend<M>,
    {
        match self.strategy.process() {
            ControlFlow::Continue(()) => {
                self.send_now(message);
                Ok(Duration::ZERO)
            }
            ControlFlow::Break(Reason::Overloaded { retry_after }) => {
                if let Some(limit) = self.max_pending
                    && self.pending() >= limit.get()
                {
                    self.instruments.rejected.add(1, &[]);
                    debug!(
                        category = type_name::<M>(),
                        limit = limit.get(),
                        "pending queue full; message rejected"
                    );
                    return Err(Rejected::new(message, limit.get()));
                }
                self.enqueue(message, retry_after);
                Ok(retry_after.max(MIN_RETRY))
            }
        }
    }

    /// Deliver queued messages while the strategy admits them.
    ///
    /// High priority messages go first. The general queue is only touched
    /// once the high priority queue is empty. Returns zero when both queues
    /// are empty, otherwise the time to wait before calling again.
    pub fn send_queued(&mut self) -> Duration {
        let delay = self.send_high_priority();
        if !delay.is_zero() {
            return delay;
        }
        self.send_general()
    }

    fn send_now<M>(&mut self, message: M)
    where
        C: OnSend<M>,
    {
        trace!(category = type_name::<M>(), "message sent");
        self.on_send.on_send(message);
        self.instruments
            .delivered
            .add(1, &[KeyValue::new("tier", TIER_DIRECT)]);
    }

    fn enqueue<M>(&mut self, message: M, retry_after: Duration)
    where
        M: Send + 'static,
        C: OnSend<M>,
    {
        let mut slot = Some(message);
        let tier = if let Some(high) = (&mut slot as &mut dyn Any).downcast_mut::<Option<H>>() {
            self.high_priority.extend(high.take());
            TIER_HIGH
        } else {
            self.general
                .extend(slot.map(|message| Box::new(Queued(message)) as Box<dyn Deliver<C>>));
            TIER_GENERAL
        };

        self.instruments.throttled.add(1, &[]);
        self.instruments
            .queued
            .add(1, &[KeyValue::new("tier", tier)]);
        debug!(
            category = type_name::<M>(),
            tier,
            ?retry_after,
            pending = self.pending(),
            "send throttled; message queued"
        );
    }

    fn send_high_priority(&mut self) -> Duration {
        while !self.high_priority.is_empty() {
            if let ControlFlow::Break(reason) = self.strategy.process() {
                return self.stalled(reason, TIER_HIGH);
            }
            if let Some(message) = self.high_priority.pop_front() {
                trace!(category = type_name::<H>(), "queued message sent");
                self.on_send.on_send(message);
                self.instruments
                    .delivered
                    .add(1, &[KeyValue::new("tier", TIER_HIGH)]);
            }
        }
        Duration::ZERO
    }

    fn send_general(&mut self) -> Duration {
        while !self.general.is_empty() {
            if let ControlFlow::Break(reason) = self.strategy.process() {
                return self.stalled(reason, TIER_GENERAL);
            }
            if let Some(message) = self.general.pop_front() {
                trace!(category = message.category(), "queued message sent");
                message.deliver(&mut self.on_send);
                self.instruments
                    .delivered
                    .add(1, &[KeyValue::new("tier", TIER_GENERAL)]);
            }
        }
        Duration::ZERO
    }

    fn stalled(&self, reason: Reason, tier: &'static str) -> Duration {
        let Reason::Overloaded { retry_after } = reason;
        debug!(
            tier,
            ?retry_after,
            pending = self.pending(),
            "drain throttled"
        );
        retry_after.max(MIN_RETRY)
    }
}

impl<H, C, S> Throttler<H, C, S> {
    /// Number of queued messages across both tiers.
    pub fn pending(&self) -> usize {
        self.high_priority.len() + self.general.len()
    }

    pub fn high_priority_pending(&self) -> usize {
        self.high_priority.len()
    }

    pub fn general_pending(&self) -> usize {
        self.general.len()
    }

    /// True if nothing is waiting to be sent.
    pub fn is_drained(&self) -> bool {
        self.pending() == 0
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn on_send(&self) -> &C {
        &self.on_send
    }

    pub fn on_send_mut(&mut self) -> &mut C {
        &mut self.on_send
    }

    /// Consume the throttler, dropping anything still queued.
    pub fn into_on_send(self) -> C {
        self.on_send
    }
}

impl<H, C, S: fmt::Debug> fmt::Debug for Throttler<H, C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throttler")
            .field("strategy", &self.strategy)
            .field("high_priority", &self.high_priority.len())
            .field("general", &self.general.len())
            .field("max_pending", &self.max_pending)
            .finish()
    }
}
