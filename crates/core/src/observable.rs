//! Observable state cell
//!
//! A thin wrapper over [`tokio::sync::watch`] giving owners `set`/`update`
//! and readers `get`/`subscribe`. Readers never block writers and always see
//! the latest value; intermediate values may be skipped by slow subscribers.

use tokio::sync::watch;

#[derive(Debug)]
pub struct Observable<T> {
    sender: watch::Sender<T>,
}

impl<T: Clone> Observable<T> {
    pub fn new(initial: T) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    /// Current value
    pub fn get(&self) -> T {
        self.sender.borrow().clone()
    }

    /// Replace the value and wake every subscriber
    pub fn set(&self, value: T) {
        self.sender.send_replace(value);
    }

    /// Mutate in place; subscribers are woken only if `f` returns true
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut T) -> bool,
    {
        self.sender.send_if_modified(f)
    }

    /// A receiver that observes every subsequent change
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T: Clone + Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
