//! Shared state of one top-level search

use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashSet;

/// Visit set and found flag shared by every branch of one search
#[derive(Debug, Default)]
pub struct SearchState {
    visited: DashSet<String>,
    found: AtomicBool,
}

impl SearchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `lower_id` as visited; false if another branch got there first
    pub fn mark_visited(&self, lower_id: &str) -> bool {
        self.visited.insert(lower_id.to_string())
    }

    pub fn is_visited(&self, lower_id: &str) -> bool {
        self.visited.contains(lower_id)
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn set_found(&self) {
        self.found.store(true, Ordering::Release);
    }

    pub fn is_found(&self) -> bool {
        self.found.load(Ordering::Acquire)
    }
}
