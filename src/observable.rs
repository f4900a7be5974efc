//! Observable value cells.
//!
//! Every piece of mutable form state lives in an [`Observable`]: a value that can be read,
//! replaced, or modified in place, and whose changes can be awaited through
//! [`Observable::subscribe`].  The cell is backed by a `tokio::sync::watch` channel, so a
//! write made anywhere wakes every subscriber, and reads never block on writers for long.

use tokio::sync::watch;

/// A shared, observable value.
///
/// Never call another method on the same cell from inside an [`Observable::with`],
/// [`Observable::update`], or [`Observable::update_if`] closure: the cell is locked for the
/// duration of the closure.
pub struct Observable<T> {
    tx: watch::Sender<T>,
}

impl<T> Observable<T> {
    /// Creates a cell holding `value`.
    pub fn new(value: T) -> Self {
        let (tx, _rx) = watch::channel(value);
        Observable { tx }
    }

    /// Runs `f` against the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// Replaces the value and notifies subscribers.
    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Modifies the value in place and notifies subscribers.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.tx.send_modify(f);
    }

    /// Modifies the value in place; subscribers are notified only when `f` returns true.
    pub fn update_if(&self, f: impl FnOnce(&mut T) -> bool) -> bool {
        self.tx.send_if_modified(f)
    }

    /// Returns a receiver that observes every subsequent change.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

impl<T: Clone> Observable<T> {
    /// Returns a copy of the current value.
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }
}

impl<T: Default> Default for Observable<T> {
    fn default() -> Self {
        Observable::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Observable").field(&*self.tx.borrow()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_set_update() {
        let cell = Observable::new(1);
        assert_eq!(cell.get(), 1);
        cell.set(2);
        assert_eq!(cell.get(), 2);
        cell.update(|v| *v += 3);
        assert_eq!(cell.get(), 5);
        assert_eq!(cell.with(|v| *v * 2), 10);
    }

    #[test]
    fn update_if_reports_modification() {
        let cell = Observable::new(vec![1]);
        let mut rx = cell.subscribe();
        assert!(!cell.update_if(|_| false));
        assert!(!rx.has_changed().unwrap());
        assert!(cell.update_if(|v| {
            v.push(2);
            true
        }));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), vec![1, 2]);
    }

    #[tokio::test]
    async fn subscribers_wake_on_set() {
        let cell = Observable::new(String::from("a"));
        let mut rx = cell.subscribe();
        let waiter = tokio::spawn(async move {
            rx.changed().await.unwrap();
            rx.borrow().clone()
        });
        cell.set(String::from("b"));
        assert_eq!(waiter.await.unwrap(), "b");
    }
}
