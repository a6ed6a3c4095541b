use std::num::NonZeroUsize;
use std::ops::ControlFlow;
use std::time::Duration;

use quanta::Clock;
use quanta::Instant;

use crate::Reason;
use crate::RingBuffer;
use crate::Strategy;

/// An exact sliding window limiter.
///
/// Records the timestamps of the last `capacity` admitted sends. A new send
/// is rejected while all of them lie within `interval` of now, and the wait
/// reported is the time until the oldest of them leaves the window.
#[derive(Debug)]
pub struct SlidingWindow {
    sends: RingBuffer<Instant>,
    interval: Duration,
    clock: Clock,
}

impl SlidingWindow {
    /// Creates a new `SlidingWindow` strategy.
    ///
    /// # Arguments
    ///
    /// * `capacity` - The maximum number of sends allowed within any interval.
    /// * `interval` - The width of the sliding window.
    pub fn new(capacity: NonZeroUsize, interval: Duration) -> Self {
        Self::with_clock(capacity, interval, Clock::new())
    }

    pub fn with_clock(capacity: NonZeroUsize, interval: Duration, clock: Clock) -> Self {
        Self {
            sends: RingBuffer::new(capacity),
            interval,
            clock,
        }
    }

    /// Request a send right now.
    ///
    /// Returns a zero duration if the send was admitted, otherwise the time
    /// left until one can be.
    pub fn request(&mut self) -> Duration {
        match self.process() {
            ControlFlow::Continue(()) => Duration::ZERO,
            ControlFlow::Break(Reason::Overloaded { retry_after }) => retry_after,
        }
    }

    pub fn capacity(&self) -> usize {
        self.sends.capacity()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Strategy for SlidingWindow {
    #[inline]
    fn process(&mut self) -> ControlFlow<Reason> {
        let now = self.clock.now();

        // Only a full window can throttle
        if self.sends.is_full()
            && let Some(oldest) = self.sends.oldest()
        {
            let age = now.duration_since(oldest);
            if age < self.interval {
                return ControlFlow::Break(Reason::Overloaded {
                    retry_after: self.interval - age,
                });
            }
        }

        self.sends.insert(now);
        ControlFlow::Continue(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use more_asserts::assert_gt;
    use more_asserts::assert_le;
    use quanta::Mock;

    use super::*;

    fn window(capacity: usize, interval: Duration) -> (SlidingWindow, Arc<Mock>) {
        let (clock, mock) = Clock::mock();
        let capacity = NonZeroUsize::new(capacity).unwrap();
        (SlidingWindow::with_clock(capacity, interval, clock), mock)
    }

    #[test]
    fn it_admits_exactly_capacity_per_interval() {
        let interval = Duration::from_millis(100);
        let (mut sw, mock) = window(5, interval);

        for _ in 0..5 {
            assert_eq!(sw.request(), Duration::ZERO);
        }

        let delay = sw.request();
        assert_gt!(delay, Duration::ZERO);
        assert_le!(delay, interval);

        // One interval after the first admitted send, room frees up again.
        mock.increment(interval);
        assert_eq!(sw.request(), Duration::ZERO);
    }

    #[test]
    fn it_reports_the_time_until_the_oldest_send_expires() {
        let interval = Duration::from_millis(100);
        let (mut sw, mock) = window(2, interval);

        assert!(sw.process().is_continue());
        mock.increment(Duration::from_millis(30));
        assert!(sw.process().is_continue());
        mock.increment(Duration::from_millis(20));

        // Oldest send is 50ms old
        assert_eq!(
            sw.process(),
            ControlFlow::Break(Reason::Overloaded {
                retry_after: Duration::from_millis(50)
            })
        );

        // Rejections do not consume capacity
        mock.increment(Duration::from_millis(50));
        assert!(sw.process().is_continue());

        // Now the 30ms send is the oldest, 70ms old
        assert_eq!(sw.request(), Duration::from_millis(30));
    }

    #[test]
    fn test_burst_without_clock_movement_waits_a_full_interval() {
        let interval = Duration::from_millis(100);
        let (mut sw, mock) = window(4, interval);
        assert_eq!(sw.capacity(), 4);
        assert_eq!(sw.interval(), interval);

        for _ in 0..4 {
            assert!(sw.request().is_zero());
        }

        // Every timestamp is now, so the oldest is a whole interval from leaving
        assert_eq!(sw.request(), interval);

        mock.increment(Duration::from_nanos(1));
        assert_eq!(sw.request(), interval - Duration::from_nanos(1));
    }

    #[test]
    fn test_never_throttles_before_full() {
        let (mut sw, _mock) = window(3, Duration::from_secs(60));

        // The clock has not moved, so every timestamp is identical
        assert!(sw.process().is_continue());
        assert!(sw.process().is_continue());
        assert!(sw.process().is_continue());
        assert!(sw.process().is_break());
    }

    #[test]
    fn test_long_idle_restores_full_capacity() {
        let interval = Duration::from_millis(10);
        let (mut sw, mock) = window(10, interval);

        for _ in 0..10 {
            let _ = sw.process();
        }
        assert!(sw.process().is_break());

        mock.increment(interval * 10);

        for _ in 0..10 {
            assert!(sw.process().is_continue());
        }
        assert!(sw.process().is_break());
    }

    #[test]
    fn test_no_double_burst_across_boundary() {
        let interval = Duration::from_millis(100);
        let (mut sw, mock) = window(100, interval);

        // Half the capacity early, half late
        for _ in 0..50 {
            let _ = sw.process();
        }
        mock.increment(Duration::from_millis(90));
        for _ in 0..50 {
            let _ = sw.process();
        }

        // Just past the first batch, only that batch has left the window
        mock.increment(Duration::from_millis(15));
        let mut extra = 0;
        while sw.process().is_continue() {
            extra += 1;
        }
        assert_eq!(extra, 50);
    }

    #[test]
    fn it_enforces_limits_in_real_time() {
        // Accept 100 requests per second
        let mut sw = SlidingWindow::new(NonZeroUsize::new(100).unwrap(), Duration::from_secs(1));

        std::thread::sleep(Duration::from_millis(500));

        for _ in 0..90 {
            assert_eq!(sw.request(), Duration::ZERO);
        }

        std::thread::sleep(Duration::from_millis(600));

        for _ in 0..10 {
            assert_eq!(sw.request(), Duration::ZERO);
        }

        // The window is full; the 90 early sends only expire ~400ms from now
        for _ in 0..10 {
            assert_gt!(sw.request(), Duration::ZERO);
        }
    }
}
