//! Deferred tasks on a frame clock.
//!
//! Staggered effects are queued as `(delay, task)` pairs and handed back once
//! enough frame time has passed. Nothing runs on its own: the owner drains due
//! tasks from its per-frame update. Clearing the queue is how a reset cancels
//! effects that have not started yet.

/// A task waiting for its due time.
#[derive(Debug, Clone)]
struct Pending<T> {
    due: f32,
    seq: u64,
    task: T,
}

/// Queue of tasks released after a delay.
#[derive(Debug, Clone)]
pub struct Scheduler<T> {
    now: f32,
    next_seq: u64,
    pending: Vec<Pending<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            now: 0.0,
            next_seq: 0,
            pending: Vec::new(),
        }
    }
}

impl<T> Scheduler<T> {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `task` to be released `delay` seconds from now.
    pub fn schedule(&mut self, delay: f32, task: T) {
        self.pending.push(Pending {
            due: self.now + delay.max(0.0),
            seq: self.next_seq,
            task,
        });
        self.next_seq += 1;
    }

    /// Queues several `(delay, task)` pairs.
    pub fn schedule_all(&mut self, tasks: impl IntoIterator<Item = (f32, T)>) {
        for (delay, task) in tasks {
            self.schedule(delay, task);
        }
    }

    /// Advances the clock and returns due tasks, earliest first.
    ///
    /// Tasks due at the same time keep their scheduling order.
    pub fn advance(&mut self, dt: f32) -> Vec<T> {
        self.now += dt.max(0.0);
        let now = self.now;

        let (mut due, rest): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|p| p.due <= now);
        self.pending = rest;

        due.sort_by(|a, b| a.due.total_cmp(&b.due).then(a.seq.cmp(&b.seq)));
        due.into_iter().map(|p| p.task).collect()
    }

    /// Drops every pending task.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Number of pending tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Seconds elapsed on the scheduler clock.
    #[must_use]
    pub const fn now(&self) -> f32 {
        self.now
    }
}
