//! Input event queue (spec.md §4.5).
//!
//! An unbounded FIFO guarded by a mutex plus a "not-empty" condition,
//! translating the original's `CRITICAL_SECTION` + auto-reset `Event` pair
//! into a `Mutex`/`Condvar`. The producer (capture backend) holds the lock
//! only long enough to push and notify; the consumer (the engine's single
//! pipeline thread) waits on the condition, pops one item, and releases
//! the lock before processing -- matching "the consumer ... pops one item
//! ... releases the mutex, then processes."
//!
//! Shutdown translates "set the queue to null, signal" into a `closed`
//! flag: once set, `pop` drains remaining items, then returns `None`
//! forever after.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use crate::engine::pipeline::RawEvent;

struct Inner {
    queue: VecDeque<RawEvent>,
    closed: bool,
}

pub struct EventBus {
    inner: Mutex<Inner>,
    not_empty: Condvar,
}

impl EventBus {
    pub fn new() -> Self {
        EventBus {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
        }
    }

    /// Producer side: push and wake the consumer. No-op once closed.
    pub fn push(&self, event: RawEvent) {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return;
        }
        inner.queue.push_back(event);
        self.not_empty.notify_one();
    }

    /// Consumer side: blocks until an item is available or the bus is
    /// closed and drained, in which case it returns `None`.
    pub fn pop(&self) -> Option<RawEvent> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if let Some(event) = inner.queue.pop_front() {
                return Some(event);
            }
            if inner.closed {
                return None;
            }
            inner = self.not_empty.wait(inner).unwrap();
        }
    }

    /// Shutdown: marks the bus closed and wakes the consumer so its wait
    /// returns and observes the closed state.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;
        self.not_empty.notify_all();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
