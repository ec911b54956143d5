//! The bounded, process-local event queue shared by producers and the
//! background worker.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::event::Event;

#[derive(Debug)]
pub struct EventQueue {
    inner: Mutex<VecDeque<Event>>,
    capacity: usize,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Appends `event` and returns the new length, or hands the event back
    /// when the queue is already full.
    pub fn push(&self, event: Event) -> Result<usize, Event> {
        let mut queue = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if queue.len() >= self.capacity {
            return Err(event);
        }
        queue.push_back(event);
        Ok(queue.len())
    }

    /// Removes up to `max` events from the head, oldest first.
    pub fn take_batch(&self, max: usize) -> Vec<Event> {
        let mut queue = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let n = max.min(queue.len());
        queue.drain(..n).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
