//! Cooperative deferred-task queue.
//!
//! Tasks carry a typed payload rather than a closure; the owner of the run
//! loop pops due payloads one at a time and dispatches them, so a running
//! task is free to post or cancel others. Two queues back the scheduler: an
//! immediate queue ordered by (priority, insertion) and a deferred queue
//! ordered by absolute deadline against the [`Timer`] counter. Deferred
//! tasks promote into the immediate queue once their deadline elapses.

use std::collections::VecDeque;
use std::rc::Rc;

use tracing::{error, trace};

use crate::constants::MAX_NUM_TASKS;
use crate::hal::Timer;

/// Highest priority value (runs first).
pub const HIGHEST_PRIORITY: u32 = 0;
/// Priority used when the caller has no ordering preference.
pub const DEFAULT_PRIORITY: u32 = 7;

/// Handle to a posted task. A dead handle (already run, cancelled, or
/// dropped on overflow) is valid to cancel or query; both are no-ops.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TaskHandle {
    id: Option<u32>,
}

struct Entry<T> {
    id: u32,
    name: &'static str,
    priority: u32,
    payload: T,
}

struct Deferred<T> {
    deadline_ms: u64,
    seq: u32,
    entry: Entry<T>,
}

/// Single-threaded cooperative scheduler over payload type `T`.
pub struct Scheduler<T> {
    timer: Rc<dyn Timer>,
    immediate: VecDeque<Entry<T>>,
    deferred: Vec<Deferred<T>>,
    next_id: u32,
}

impl<T> Scheduler<T> {
    pub fn new(timer: Rc<dyn Timer>) -> Self {
        Self {
            timer,
            immediate: VecDeque::new(),
            deferred: Vec::new(),
            next_id: 0,
        }
    }

    /// Queue `payload` to run after `delay_ms` (0 = eligible immediately).
    ///
    /// On queue overflow the task is dropped and a dead handle returned.
    pub fn post(
        &mut self,
        payload: T,
        name: &'static str,
        priority: u32,
        delay_ms: u32,
    ) -> TaskHandle {
        if self.immediate.len() + self.deferred.len() >= MAX_NUM_TASKS {
            error!(name, "scheduler queue full, dropping task");
            return TaskHandle::default();
        }

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        let entry = Entry {
            id,
            name,
            priority,
            payload,
        };

        if delay_ms == 0 {
            self.insert_immediate(entry);
        } else {
            let deadline_ms = self.timer.counter_ms() + u64::from(delay_ms);
            self.deferred.push(Deferred {
                deadline_ms,
                seq: id,
                entry,
            });
        }
        trace!(name, id, priority, delay_ms, "task posted");
        TaskHandle { id: Some(id) }
    }

    fn insert_immediate(&mut self, entry: Entry<T>) {
        let at = self
            .immediate
            .iter()
            .position(|e| e.priority > entry.priority)
            .unwrap_or(self.immediate.len());
        self.immediate.insert(at, entry);
    }

    /// Remove a pending task. Safe on dead or foreign handles.
    pub fn cancel(&mut self, handle: &mut TaskHandle) {
        let Some(id) = handle.id.take() else {
            return;
        };
        if let Some(at) = self.immediate.iter().position(|e| e.id == id) {
            trace!(name = self.immediate[at].name, id, "task cancelled");
            self.immediate.remove(at);
            return;
        }
        if let Some(at) = self.deferred.iter().position(|d| d.entry.id == id) {
            trace!(name = self.deferred[at].entry.name, id, "task cancelled");
            self.deferred.remove(at);
        }
    }

    /// True while the task is still pending (not run, not cancelled).
    pub fn is_scheduled(&self, handle: &TaskHandle) -> bool {
        let Some(id) = handle.id else {
            return false;
        };
        self.immediate.iter().any(|e| e.id == id)
            || self.deferred.iter().any(|d| d.entry.id == id)
    }

    /// Drop every pending task.
    pub fn clear_all(&mut self) {
        self.immediate.clear();
        self.deferred.clear();
    }

    pub fn is_any_task_scheduled(&self) -> bool {
        !self.immediate.is_empty() || !self.deferred.is_empty()
    }

    /// Milliseconds until the next deferred deadline, if any.
    pub fn next_deadline_in_ms(&self) -> Option<u64> {
        let now = self.timer.counter_ms();
        self.deferred
            .iter()
            .map(|d| d.deadline_ms.saturating_sub(now))
            .min()
    }

    /// Pop the next due payload, promoting elapsed deferred tasks first.
    ///
    /// The entry is removed before it is handed out, so the task is free to
    /// re-post itself; returns `None` once nothing is eligible right now.
    pub fn pop_due(&mut self) -> Option<T> {
        self.promote_elapsed();
        let entry = self.immediate.pop_front()?;
        trace!(name = entry.name, id = entry.id, "task running");
        Some(entry.payload)
    }

    fn promote_elapsed(&mut self) {
        let now = self.timer.counter_ms();
        let mut due: Vec<Deferred<T>> = Vec::new();
        let mut i = 0;
        while i < self.deferred.len() {
            if self.deferred[i].deadline_ms <= now {
                due.push(self.deferred.remove(i));
            } else {
                i += 1;
            }
        }
        due.sort_by_key(|d| (d.deadline_ms, d.seq));
        for d in due {
            self.insert_immediate(d.entry);
        }
    }
}
