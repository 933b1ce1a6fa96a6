//! Bounded breadcrumb trail
//!
//! A FIFO ring of the most recent breadcrumbs. Overflow drops the oldest
//! entry; snapshots come back newest-first, which is the order crash payloads
//! carry them in.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use beacon_core::domain::{Attributes, Breadcrumb, BreadcrumbCategory, BreadcrumbLevel};

/// Number of breadcrumbs kept when no capacity is configured
pub const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug)]
pub struct BreadcrumbTrail {
    capacity: usize,
    entries: Mutex<VecDeque<Breadcrumb>>,
}

impl BreadcrumbTrail {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Records a new breadcrumb stamped with the current time
    pub fn add(
        &self,
        message: impl Into<String>,
        category: BreadcrumbCategory,
        level: BreadcrumbLevel,
        data: Option<Attributes>,
    ) {
        self.push(Breadcrumb::new(message, category, level, data));
    }

    /// Appends an already built breadcrumb, evicting the oldest on overflow
    pub fn push(&self, breadcrumb: Breadcrumb) {
        let mut entries = self.lock();
        entries.push_back(breadcrumb);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Current entries, most recent first
    pub fn snapshot(&self) -> Vec<Breadcrumb> {
        self.lock().iter().rev().cloned().collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Breadcrumb>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for BreadcrumbTrail {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
