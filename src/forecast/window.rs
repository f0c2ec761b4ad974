//! Fixed-capacity FIFO used for recent-match and history windows

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Ordered buffer that evicts its oldest entry once capacity is exceeded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundedWindow<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T> BoundedWindow<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            items: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Build a window from existing items, keeping only the newest `capacity`
    pub fn from_items(capacity: usize, items: impl IntoIterator<Item = T>) -> Self {
        let mut window = Self::new(capacity);
        for item in items {
            window.push(item);
        }
        window
    }

    pub fn push(&mut self, item: T) {
        self.items.push_back(item);
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate oldest first
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }
}
