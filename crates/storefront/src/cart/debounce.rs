//! Debounced write-back.
//!
//! The guest cart is rewritten on every mutation. Rapid successive
//! mutations (quantity spinners, re-rendered UI firing twice) would issue
//! a save per keystroke; the debouncer coalesces them into one pending
//! value with an explicit delay, cancel, and flush. The caller owns the
//! actual I/O - the debouncer only decides *what* to write and *when* it
//! is due.

use tokio::time::{Duration, Instant};

/// Coalesces writes of `T`: each [`schedule`](Self::schedule) replaces the
/// pending value and restarts the delay; [`take_due`](Self::take_due)
/// takes the pending value once its deadline has passed; [`flush`](Self::flush)
/// takes it immediately; [`cancel`](Self::cancel) discards it.
#[derive(Debug)]
pub struct WriteDebouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> WriteDebouncer<T> {
    /// Create a debouncer with the given flush delay.
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// The configured delay.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule a write, replacing any pending one and restarting the
    /// delay (cancel-and-reschedule on new input).
    pub fn schedule(&mut self, value: T) {
        self.pending = Some((value, Instant::now() + self.delay));
    }

    /// Whether a write is pending.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Borrow the pending write without taking it. A pending value is
    /// newer than whatever the backing store holds.
    #[must_use]
    pub fn pending(&self) -> Option<&T> {
        self.pending.as_ref().map(|(value, _)| value)
    }

    /// Deadline of the pending write.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, at)| *at)
    }

    /// Discard the pending write, returning it.
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }

    /// Take the pending write immediately, regardless of its deadline.
    pub fn flush(&mut self) -> Option<T> {
        self.cancel()
    }

    /// Take the pending write only once its deadline has passed. A write
    /// whose deadline was pushed forward by a later [`schedule`](Self::schedule)
    /// stays pending for that scheduler to take.
    pub fn take_due(&mut self) -> Option<T> {
        match self.deadline() {
            Some(at) if at <= Instant::now() => self.cancel(),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_flush_takes_pending_immediately() {
        let mut debouncer = WriteDebouncer::new(Duration::from_secs(60));
        debouncer.schedule(1);
        assert!(debouncer.is_pending());
        assert_eq!(debouncer.flush(), Some(1));
        assert!(!debouncer.is_pending());
        assert_eq!(debouncer.flush(), None);
    }

    #[tokio::test]
    async fn test_reschedule_replaces_value() {
        let mut debouncer = WriteDebouncer::new(Duration::from_secs(60));
        debouncer.schedule(1);
        debouncer.schedule(2);
        debouncer.schedule(3);
        // Only the last scheduled value survives.
        assert_eq!(debouncer.flush(), Some(3));
    }

    #[tokio::test]
    async fn test_cancel_discards() {
        let mut debouncer = WriteDebouncer::new(Duration::from_millis(1));
        debouncer.schedule("x");
        assert_eq!(debouncer.cancel(), Some("x"));
        assert!(!debouncer.is_pending());
        assert_eq!(debouncer.take_due(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_due_respects_the_deadline() {
        let mut debouncer = WriteDebouncer::new(Duration::from_millis(200));
        debouncer.schedule(7);

        assert_eq!(debouncer.take_due(), None);
        assert_eq!(debouncer.pending(), Some(&7));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(debouncer.take_due(), Some(7));
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_pushes_the_deadline() {
        let mut debouncer = WriteDebouncer::new(Duration::from_millis(200));
        debouncer.schedule(1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        debouncer.schedule(2);

        // 250ms after the first schedule, 100ms after the second: the
        // first deadline has passed but the write is no longer due.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(debouncer.take_due(), None);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(debouncer.take_due(), Some(2));
    }
}
