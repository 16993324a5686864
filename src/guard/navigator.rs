//! Navigation seam used by the route guard.
//!
//! `MemoryNavigator` is a plain history stack; it backs the CLI `watch` mode
//! and the guard tests.

use std::sync::Mutex;

use tokio::sync::watch;

use super::route::RouteLocation;

pub trait Navigator: Send + Sync {
    /// Current location.
    fn location(&self) -> RouteLocation;
    /// Open `target` as a new history entry.
    fn push(&self, target: &RouteLocation);
    /// Swap the current history entry for `target`.
    fn replace(&self, target: &RouteLocation);
    /// Location updates, latest value first.
    fn subscribe(&self) -> watch::Receiver<RouteLocation>;
}

struct History {
    entries: Vec<RouteLocation>,
    replacements: usize,
}

pub struct MemoryNavigator {
    history: Mutex<History>,
    current: watch::Sender<RouteLocation>,
}

impl MemoryNavigator {
    #[must_use]
    pub fn new(start: RouteLocation) -> Self {
        let (current, _rx) = watch::channel(start.clone());
        Self { history: Mutex::new(History { entries: vec![start], replacements: 0 }), current }
    }

    /// Pop the current entry. Returns `false` at the bottom of the stack.
    pub fn back(&self) -> bool {
        let mut history = self.lock();
        if history.entries.len() <= 1 {
            return false;
        }
        history.entries.pop();
        if let Some(top) = history.entries.last() {
            self.current.send_replace(top.clone());
        }
        true
    }

    /// Snapshot of the history stack, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<RouteLocation> {
        self.lock().entries.clone()
    }

    /// How many times `replace` has been called.
    #[must_use]
    pub fn replacements(&self) -> usize {
        self.lock().replacements
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Navigator for MemoryNavigator {
    fn location(&self) -> RouteLocation {
        self.current.borrow().clone()
    }

    fn push(&self, target: &RouteLocation) {
        let mut history = self.lock();
        history.entries.push(target.clone());
        self.current.send_replace(target.clone());
    }

    fn replace(&self, target: &RouteLocation) {
        let mut history = self.lock();
        history.replacements += 1;
        match history.entries.last_mut() {
            Some(top) => *top = target.clone(),
            None => history.entries.push(target.clone()),
        }
        self.current.send_replace(target.clone());
    }

    fn subscribe(&self) -> watch::Receiver<RouteLocation> {
        self.current.subscribe()
    }
}

#[cfg(test)]
#[path = "navigator_test.rs"]
mod tests;
