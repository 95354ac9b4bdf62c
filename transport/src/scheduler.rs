//! Periodic work run by a reader thread between reads.
//!
//! Tasks never fire on their own thread: the owning reader asks which ones
//! are due after every read or read timeout, so they see transport state
//! exactly as the reader does.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Task {
    /// Drive or start the DTLS handshake
    Handshake,
    /// Binding indication on the selected path
    Keepalive,
}

#[derive(Debug)]
struct Entry {
    task: Task,
    interval: Duration,
    next_due: Instant,
}

#[derive(Debug, Default)]
pub(crate) struct Scheduler {
    entries: Vec<Entry>,
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Runs `task` every `interval`, first at `first`. Replaces an earlier
    /// schedule of the same task.
    pub(crate) fn schedule(&mut self, task: Task, interval: Duration, first: Instant) {
        self.cancel(task);
        self.entries.push(Entry {
            task,
            interval,
            next_due: first,
        });
    }

    pub(crate) fn cancel(&mut self, task: Task) {
        self.entries.retain(|entry| entry.task != task);
    }

    pub(crate) fn is_scheduled(&self, task: Task) -> bool {
        self.entries.iter().any(|entry| entry.task == task)
    }

    /// Tasks due at `now`, each pushed to its next slot.
    pub(crate) fn due(&mut self, now: Instant) -> Vec<Task> {
        let mut due = Vec::new();
        for entry in &mut self.entries {
            if entry.next_due <= now {
                due.push(entry.task);
                entry.next_due = now + entry.interval;
            }
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_due_and_reschedule() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new();
        scheduler.schedule(Task::Keepalive, Duration::from_secs(15), start);
        scheduler.schedule(Task::Handshake, Duration::from_millis(20), start);

        assert_eq!(scheduler.due(start), vec![Task::Keepalive, Task::Handshake]);
        assert!(scheduler.due(start + Duration::from_millis(10)).is_empty());
        assert_eq!(
            scheduler.due(start + Duration::from_millis(25)),
            vec![Task::Handshake]
        );
    }

    #[test]
    fn test_cancel() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new();
        scheduler.schedule(Task::Handshake, Duration::from_millis(50), start);
        assert!(scheduler.is_scheduled(Task::Handshake));
        scheduler.cancel(Task::Handshake);
        assert!(!scheduler.is_scheduled(Task::Handshake));
        assert!(scheduler.due(start + Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn test_schedule_replaces() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new();
        scheduler.schedule(Task::Keepalive, Duration::from_secs(1), start);
        scheduler.schedule(Task::Keepalive, Duration::from_secs(2), start);
        assert_eq!(scheduler.due(start), vec![Task::Keepalive]);
        assert!(scheduler.due(start + Duration::from_millis(1500)).is_empty());
    }
}
