//! Per-instrument settings cache.
//!
//! Drivers read hardware settings through the cache and batch writes by
//! marking keys dirty. The state sits behind a reentrant lock: a flush
//! callback may read the cache, write further settings or start a nested
//! flush on the same thread without deadlocking. Other threads block until
//! the outermost flush returns.
//!
//! The generation counter increments on every effective change and on
//! invalidation, so readers can detect that their snapshot is stale.

use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default)]
struct CacheState {
    values: BTreeMap<String, String>,
    dirty: BTreeSet<String>,
    generation: u64,
}

#[derive(Debug, Default)]
pub struct SettingsCache {
    state: ReentrantMutex<RefCell<CacheState>>,
}

impl SettingsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.values.get(key).cloned()
    }

    /// Store a value and queue it for the next flush. Returns false when
    /// the cached value was already equal.
    pub fn set(&self, key: &str, value: &str) -> bool {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        if state.values.get(key).map(String::as_str) == Some(value) {
            return false;
        }
        state.values.insert(key.to_string(), value.to_string());
        state.dirty.insert(key.to_string());
        state.generation += 1;
        true
    }

    /// Record a value read back from hardware. Not queued for flushing.
    pub fn store_readback(&self, key: &str, value: &str) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        if state.values.get(key).map(String::as_str) != Some(value) {
            state.values.insert(key.to_string(), value.to_string());
            state.generation += 1;
        }
    }

    /// Forget one cached value so the next read goes to hardware.
    pub fn invalidate(&self, key: &str) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        if state.values.remove(key).is_some() {
            state.dirty.remove(key);
            state.generation += 1;
        }
    }

    pub fn invalidate_all(&self) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        state.values.clear();
        state.dirty.clear();
        state.generation += 1;
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().borrow().generation
    }

    pub fn is_dirty(&self, key: &str) -> bool {
        self.state.lock().borrow().dirty.contains(key)
    }

    pub fn dirty_count(&self) -> usize {
        self.state.lock().borrow().dirty.len()
    }

    /// Push every dirty setting through `push`, in key order. Keys dirtied
    /// by `push` itself are flushed in the same call. Returns the number
    /// of settings pushed.
    pub fn flush<F>(&self, mut push: F) -> usize
    where
        F: FnMut(&SettingsCache, &str, &str),
    {
        let _guard = self.state.lock();
        let mut pushed = 0;
        while let Some((key, value)) = self.take_dirty() {
            push(self, &key, &value);
            pushed += 1;
        }
        pushed
    }

    fn take_dirty(&self) -> Option<(String, String)> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        let key = state.dirty.pop_first()?;
        let value = state.values.get(&key).cloned().unwrap_or_default();
        Some((key, value))
    }
}
