//! Virtual-time event scheduler
//!
//! Events are ordered by their scheduled time and, for equal times, by the order in which they
//! were scheduled. The clock only moves forward when an event is popped.

use crate::error::SchedulerError;
use std::collections::{BinaryHeap, HashSet};
use std::time::Duration;

/// Identifies a scheduled event, so it can be cancelled before it fires
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EventHandle {
    seq: u64,
}

pub struct EventScheduler<E> {
    now: Duration,
    next_seq: u64,
    queue: BinaryHeap<ScheduledEvent<E>>,
    /// Sequence numbers of events that are still waiting to fire (cancelled events are removed
    /// from here and skipped once they reach the top of the heap)
    pending: HashSet<u64>,
}

impl<E> Default for EventScheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventScheduler<E> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_seq: 0,
            queue: BinaryHeap::new(),
            pending: HashSet::new(),
        }
    }

    /// The current virtual time
    pub fn now(&self) -> Duration {
        self.now
    }

    /// The number of events that are still waiting to fire
    pub fn pending_events(&self) -> usize {
        self.pending.len()
    }

    /// Schedules `event` to fire `delay` after the current time
    ///
    /// A delay that would overflow the clock schedules the event at [`Duration::MAX`], which no
    /// run reaches.
    pub fn schedule(&mut self, delay: Duration, event: E) -> EventHandle {
        let at = self.now.saturating_add(delay);
        self.push(at, event)
    }

    /// Schedules `event` to fire after `delay_secs` seconds, rejecting negative delays and
    /// delays the clock cannot represent
    pub fn schedule_secs(&mut self, delay_secs: f64, event: E) -> Result<EventHandle, SchedulerError> {
        let delay = Duration::try_from_secs_f64(delay_secs)
            .map_err(|_| SchedulerError::NegativeDelay { delay_secs })?;
        let at = self
            .now
            .checked_add(delay)
            .ok_or(SchedulerError::Overflow {
                delay,
                now: self.now,
            })?;
        Ok(self.push(at, event))
    }

    /// Schedules `event` to fire at the absolute time `at`
    pub fn schedule_at(&mut self, at: Duration, event: E) -> Result<EventHandle, SchedulerError> {
        if at < self.now {
            return Err(SchedulerError::InThePast { at, now: self.now });
        }

        Ok(self.push(at, event))
    }

    fn push(&mut self, at: Duration, event: E) -> EventHandle {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(ScheduledEvent { at, seq, event });
        self.pending.insert(seq);
        EventHandle { seq }
    }

    /// Cancels a scheduled event
    ///
    /// Returns `false` if the event already fired or was cancelled before.
    pub fn cancel(&mut self, handle: EventHandle) -> Result<bool, SchedulerError> {
        if handle.seq >= self.next_seq {
            return Err(SchedulerError::UnknownHandle { id: handle.seq });
        }

        Ok(self.pending.remove(&handle.seq))
    }

    pub fn is_pending(&self, handle: EventHandle) -> bool {
        self.pending.contains(&handle.seq)
    }

    /// Pops the next event scheduled at or before `stop`, advancing the clock to its time
    pub fn pop_due(&mut self, stop: Duration) -> Option<E> {
        loop {
            let next = self.queue.peek()?;
            if next.at > stop {
                return None;
            }

            let next = self.queue.pop()?;
            if !self.pending.remove(&next.seq) {
                // Cancelled
                continue;
            }

            self.now = next.at;
            return Some(next.event);
        }
    }

    /// Moves the clock forward to `time`, if it is not already past it
    pub fn advance_to(&mut self, time: Duration) {
        self.now = self.now.max(time);
    }

    /// Runs events until none are left at or before `stop`, then moves the clock to `stop`
    ///
    /// Handlers may schedule further events, which are run too if they are due.
    pub fn run_until(&mut self, stop: Duration, mut handler: impl FnMut(&mut Self, E)) {
        while let Some(event) = self.pop_due(stop) {
            handler(self, event);
        }

        self.advance_to(stop);
    }

    /// Discards all pending events, returning how many there were
    pub fn clear(&mut self) -> usize {
        let discarded = self.pending.len();
        self.queue.clear();
        self.pending.clear();
        discarded
    }
}

struct ScheduledEvent<E> {
    at: Duration,
    seq: u64,
    event: E,
}

impl<E> Eq for ScheduledEvent<E> {}

impl<E> PartialEq<Self> for ScheduledEvent<E> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl<E> PartialOrd<Self> for ScheduledEvent<E> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for ScheduledEvent<E> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Note: the order is reversed, so the "max" event is the one that should fire next
        other.at.cmp(&self.at).then(other.seq.cmp(&self.seq))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_events_fire_in_time_order() {
        let mut scheduler = EventScheduler::new();
        scheduler.schedule(Duration::from_secs(3), "c");
        scheduler.schedule(Duration::from_secs(1), "a");
        scheduler.schedule(Duration::from_secs(2), "b");

        let mut fired = Vec::new();
        scheduler.run_until(Duration::from_secs(10), |s, e| fired.push((s.now(), e)));

        assert_eq!(
            fired,
            vec![
                (Duration::from_secs(1), "a"),
                (Duration::from_secs(2), "b"),
                (Duration::from_secs(3), "c"),
            ]
        );
        assert_eq!(scheduler.now(), Duration::from_secs(10));
    }

    #[test]
    fn test_equal_times_fire_in_insertion_order() {
        let mut scheduler = EventScheduler::new();
        for i in 0..10 {
            scheduler.schedule(Duration::from_millis(5), i);
        }

        let mut fired = Vec::new();
        scheduler.run_until(Duration::from_millis(5), |_, e| fired.push(e));
        assert_eq!(fired, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_handlers_can_schedule_more_events() {
        let mut scheduler = EventScheduler::new();
        scheduler.schedule(Duration::ZERO, 0u32);

        let mut fired = Vec::new();
        scheduler.run_until(Duration::from_millis(35), |s, e| {
            fired.push(s.now());
            s.schedule(Duration::from_millis(10), e + 1);
        });

        assert_eq!(
            fired,
            [0, 10, 20, 30].map(Duration::from_millis).to_vec()
        );
        assert_eq!(scheduler.pending_events(), 1);
    }

    #[test]
    fn test_run_until_is_resumable() {
        let mut scheduler = EventScheduler::new();
        scheduler.schedule(Duration::from_secs(1), 1);
        scheduler.schedule(Duration::from_secs(5), 5);

        let mut fired = Vec::new();
        scheduler.run_until(Duration::from_secs(2), |_, e| fired.push(e));
        assert_eq!(fired, vec![1]);
        assert_eq!(scheduler.now(), Duration::from_secs(2));

        // Relative delays are measured from the resumed clock
        scheduler.schedule(Duration::from_secs(1), 3);
        scheduler.run_until(Duration::from_secs(10), |_, e| fired.push(e));
        assert_eq!(fired, vec![1, 3, 5]);
    }

    #[test]
    fn test_cancel() {
        let mut scheduler = EventScheduler::new();
        let cancelled = scheduler.schedule(Duration::from_secs(1), "cancelled");
        let fired = scheduler.schedule(Duration::from_secs(1), "fired");

        assert_eq!(scheduler.cancel(cancelled), Ok(true));
        assert!(!scheduler.is_pending(cancelled));

        let mut events = Vec::new();
        scheduler.run_until(Duration::from_secs(2), |_, e| events.push(e));
        assert_eq!(events, vec!["fired"]);

        // Cancelling after the fact is a no-op
        assert_eq!(scheduler.cancel(fired), Ok(false));
        assert_eq!(scheduler.cancel(cancelled), Ok(false));
    }

    #[test]
    fn test_cancel_unknown_handle_is_an_error() {
        let mut scheduler: EventScheduler<()> = EventScheduler::new();
        let foreign = EventHandle { seq: 7 };
        assert_eq!(
            scheduler.cancel(foreign),
            Err(SchedulerError::UnknownHandle { id: 7 })
        );
    }

    #[test]
    fn test_invalid_schedules_are_rejected() {
        let mut scheduler = EventScheduler::new();
        assert!(matches!(
            scheduler.schedule_secs(-0.5, ()),
            Err(SchedulerError::NegativeDelay { .. })
        ));
        assert!(scheduler.schedule_secs(f64::NAN, ()).is_err());

        scheduler.advance_to(Duration::from_secs(3));
        assert_eq!(
            scheduler.schedule_at(Duration::from_secs(2), ()),
            Err(SchedulerError::InThePast {
                at: Duration::from_secs(2),
                now: Duration::from_secs(3)
            })
        );
        assert_eq!(scheduler.pending_events(), 0);
    }

    #[test]
    fn test_overflowing_delays_never_fire() {
        let mut scheduler = EventScheduler::new();
        let late = Duration::MAX - Duration::from_secs(1);
        scheduler.advance_to(late);
        assert_eq!(
            scheduler.schedule_secs(10.0, ()),
            Err(SchedulerError::Overflow {
                delay: Duration::from_secs(10),
                now: late,
            })
        );

        let mut scheduler = EventScheduler::new();
        scheduler.advance_to(Duration::from_secs(10));
        let handle = scheduler.schedule(Duration::MAX, ());
        assert!(scheduler.is_pending(handle));
        scheduler.run_until(Duration::from_secs(1 << 40), |_, _| panic!("fired"));
        assert!(scheduler.is_pending(handle));
    }

    #[test]
    fn test_clear_discards_pending_events() {
        let mut scheduler = EventScheduler::new();
        scheduler.schedule(Duration::from_secs(1), ());
        let cancelled = scheduler.schedule(Duration::from_secs(2), ());
        scheduler.schedule(Duration::from_secs(3), ());
        scheduler.cancel(cancelled).unwrap();

        assert_eq!(scheduler.clear(), 2);
        assert!(scheduler.pop_due(Duration::MAX).is_none());
    }
}
