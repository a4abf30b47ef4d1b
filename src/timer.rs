// Timer queue - Deadline-ordered timeouts and intervals for the sequencer
//
// Single-threaded: timers stay sorted by deadline and `pop_due` hands them
// out one at a time, so callbacks never overlap. Deadlines are seconds on
// whatever clock the caller passes as `now` (the audio clock for the
// sequencer).

/// Handle for clearing a registered timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Debug, Clone)]
struct Timer<T> {
    id: TimerId,
    deadline: f64,
    /// Repeat period in seconds, `None` for one-shot timers
    period: Option<f64>,
    task: T,
}

/// Timers sorted by deadline; ties fire in registration order.
#[derive(Debug, Clone)]
pub struct TimerQueue<T> {
    timers: Vec<Timer<T>>,
    next_id: u64,
}

impl<T: Clone> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            timers: Vec::new(),
            next_id: 0,
        }
    }

    /// Run `task` once, `delay_ms` after `now`.
    pub fn set_timeout(&mut self, now: f64, delay_ms: u64, task: T) -> TimerId {
        let id = self.allocate_id();
        self.insert(Timer {
            id,
            deadline: now + ms_to_seconds(delay_ms),
            period: None,
            task,
        });
        id
    }

    /// Run `task` every `period_ms`, first at `now + period_ms`.
    ///
    /// A zero period is bumped to one millisecond so the queue always drains.
    pub fn set_interval(&mut self, now: f64, period_ms: u64, task: T) -> TimerId {
        let id = self.allocate_id();
        let period = ms_to_seconds(period_ms.max(1));
        self.insert(Timer {
            id,
            deadline: now + period,
            period: Some(period),
            task,
        });
        id
    }

    /// Cancel a timer. Returns false if it already fired or was cleared.
    pub fn clear(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.id != id);
        self.timers.len() != before
    }

    /// Take the earliest timer due at `now`, rescheduling it if periodic.
    ///
    /// An interval that has fallen more than one period behind skips the
    /// missed periods rather than firing once per period.
    pub fn pop_due(&mut self, now: f64) -> Option<T> {
        if self.timers.first()?.deadline > now {
            return None;
        }

        let mut timer = self.timers.remove(0);
        let task = timer.task.clone();

        if let Some(period) = timer.period {
            timer.deadline += period;
            if timer.deadline <= now {
                timer.deadline = now + period;
            }
            self.insert(timer);
        }

        Some(task)
    }

    /// Deadline of the earliest pending timer
    pub fn next_deadline(&self) -> Option<f64> {
        self.timers.first().map(|t| t.deadline)
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.timers.iter().any(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    fn allocate_id(&mut self) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        id
    }

    fn insert(&mut self, timer: Timer<T>) {
        // After every timer with an earlier or equal deadline
        let pos = self.timers.partition_point(|t| t.deadline <= timer.deadline);
        self.timers.insert(pos, timer);
    }
}

impl<T: Clone> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn ms_to_seconds(ms: u64) -> f64 {
    ms as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_fires_once_when_due() {
        let mut queue = TimerQueue::new();
        queue.set_timeout(0.0, 100, "a");

        assert_eq!(queue.pop_due(0.05), None);
        assert_eq!(queue.pop_due(0.1), Some("a"));
        assert_eq!(queue.pop_due(1.0), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_zero_delay_timeout_is_due_immediately() {
        let mut queue = TimerQueue::new();
        queue.set_timeout(2.0, 0, 1);
        assert_eq!(queue.pop_due(2.0), Some(1));
    }

    #[test]
    fn test_timers_fire_in_deadline_order() {
        let mut queue = TimerQueue::new();
        queue.set_timeout(0.0, 300, 3);
        queue.set_timeout(0.0, 100, 1);
        queue.set_timeout(0.0, 200, 2);

        assert_eq!(queue.next_deadline(), Some(0.1));
        assert_eq!(queue.pop_due(1.0), Some(1));
        assert_eq!(queue.pop_due(1.0), Some(2));
        assert_eq!(queue.pop_due(1.0), Some(3));
    }

    #[test]
    fn test_equal_deadlines_keep_registration_order() {
        let mut queue = TimerQueue::new();
        queue.set_timeout(0.0, 50, "first");
        queue.set_timeout(0.0, 50, "second");

        assert_eq!(queue.pop_due(0.05), Some("first"));
        assert_eq!(queue.pop_due(0.05), Some("second"));
    }

    #[test]
    fn test_interval_repeats() {
        let mut queue = TimerQueue::new();
        queue.set_interval(0.0, 25, "tick");

        assert_eq!(queue.pop_due(0.01), None);
        assert_eq!(queue.pop_due(0.025), Some("tick"));
        assert_eq!(queue.pop_due(0.03), None);
        assert_eq!(queue.pop_due(0.05), Some("tick"));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_late_interval_skips_missed_periods() {
        let mut queue = TimerQueue::new();
        queue.set_interval(0.0, 25, "tick");

        assert_eq!(queue.pop_due(1.0), Some("tick"));
        assert_eq!(queue.pop_due(1.0), None);
        let next = queue.next_deadline().unwrap();
        assert!((next - 1.025).abs() < 1e-12);
    }

    #[test]
    fn test_clear_cancels_timer() {
        let mut queue = TimerQueue::new();
        let id = queue.set_interval(0.0, 25, "tick");

        assert!(queue.is_pending(id));
        assert!(queue.clear(id));
        assert!(!queue.clear(id));
        assert_eq!(queue.pop_due(10.0), None);
    }
}
