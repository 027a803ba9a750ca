#![forbid(unsafe_code)]

//! Render-tick queue.
//!
//! Work that must wait until the renderer has observed a change (the canonical
//! case being "open this modal after it has been mounted") is deferred onto a
//! [`TickQueue`]. The host flushes the queue once per render pass, after it
//! has drawn the current state.
//!
//! # Usage
//!
//! ```ignore
//! use imodal_runtime::TickQueue;
//!
//! let ticks = TickQueue::new();
//! ticks.defer(|| println!("runs after the next render"));
//!
//! render(&state);
//! ticks.flush();
//! ```
//!
//! # Invariants
//!
//! 1. Tasks run in the order they were deferred.
//! 2. A task deferred while a flush is running is held for the next flush,
//!    never run in the same pass.
//! 3. Every task runs at most once.
//!
//! # Failure Modes
//!
//! - **Task panics during flush**: Remaining tasks are still run.
//!   The first panic is re-raised after all tasks have been attempted.

use std::cell::RefCell;
use std::rc::Rc;
use tracing::trace;

type DeferredTask = Box<dyn FnOnce()>;

/// A FIFO queue of tasks to run after the next render pass.
///
/// Cloning a `TickQueue` yields another handle to the same queue.
#[derive(Clone, Default)]
pub struct TickQueue {
    tasks: Rc<RefCell<Vec<DeferredTask>>>,
}

impl std::fmt::Debug for TickQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

impl TickQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defer `task` until the next [`flush`](Self::flush).
    pub fn defer(&self, task: impl FnOnce() + 'static) {
        self.tasks.borrow_mut().push(Box::new(task));
    }

    /// Number of tasks waiting for the next flush.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    /// Run every task queued before this call. Returns how many ran.
    pub fn flush(&self) -> usize {
        let tasks = std::mem::take(&mut *self.tasks.borrow_mut());
        if tasks.is_empty() {
            return 0;
        }

        let count = tasks.len();
        trace!(count, "flushing render tick");

        let mut first_panic: Option<Box<dyn std::any::Any + Send>> = None;
        for task in tasks {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(task));
            if let Err(payload) = result
                && first_panic.is_none()
            {
                first_panic = Some(payload);
            }
        }

        if let Some(payload) = first_panic {
            std::panic::resume_unwind(payload);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn tasks_wait_for_flush() {
        let ticks = TickQueue::new();
        let ran = Rc::new(Cell::new(false));
        let r = Rc::clone(&ran);
        ticks.defer(move || r.set(true));

        assert!(!ran.get());
        assert_eq!(ticks.pending(), 1);
        assert_eq!(ticks.flush(), 1);
        assert!(ran.get());
        assert!(ticks.is_empty());
    }

    #[test]
    fn flush_preserves_order() {
        let ticks = TickQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..4 {
            let l = Rc::clone(&log);
            ticks.defer(move || l.borrow_mut().push(i));
        }
        ticks.flush();
        assert_eq!(*log.borrow(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn task_deferred_during_flush_runs_next_tick() {
        let ticks = TickQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let (t, l) = (ticks.clone(), Rc::clone(&log));
        ticks.defer(move || {
            l.borrow_mut().push("outer");
            let inner = Rc::clone(&l);
            t.defer(move || inner.borrow_mut().push("inner"));
        });

        assert_eq!(ticks.flush(), 1);
        assert_eq!(*log.borrow(), vec!["outer"]);
        assert_eq!(ticks.flush(), 1);
        assert_eq!(*log.borrow(), vec!["outer", "inner"]);
    }

    #[test]
    fn empty_flush_is_noop() {
        assert_eq!(TickQueue::new().flush(), 0);
    }

    #[test]
    fn panic_in_task_still_runs_the_rest() {
        let ticks = TickQueue::new();
        let ran = Rc::new(Cell::new(false));
        ticks.defer(|| panic!("boom"));
        let r = Rc::clone(&ran);
        ticks.defer(move || r.set(true));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| ticks.flush()));
        assert!(result.is_err());
        assert!(ran.get());
    }
}
