//! Signals and memos.
//!
//! Invalidation is pushed, recomputation is pulled: writing a [`Signal`]
//! marks every dependent [`Memo`] dirty (transitively), and a dirty memo
//! recomputes only on its next read. Between invalidations a read is a
//! clone of the cached value.
//!
//! Dependencies are collected dynamically. While a memo computes it is the
//! current observer, and every `get` on a signal or memo subscribes it.
//! Before each recomputation the memo unsubscribes from the sources of the
//! previous run, so branches that are no longer taken stop invalidating it.

use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ObserverId(u64);

impl ObserverId {
    fn next() -> Self {
        thread_local! {
            static NEXT_OBSERVER_ID: Cell<u64> = const { Cell::new(0) };
        }
        NEXT_OBSERVER_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            ObserverId(id)
        })
    }
}

trait Observer {
    fn id(&self) -> ObserverId;
    fn invalidate(&self);
    fn add_source(&self, source: Rc<dyn Source>);
}

trait Source {
    fn unsubscribe(&self, observer: ObserverId);
}

thread_local! {
    static CURRENT_OBSERVER: RefCell<Option<Rc<dyn Observer>>> = const { RefCell::new(None) };
}

/// Swaps the current observer and restores the previous one on drop.
struct ObserverGuard {
    previous: Option<Rc<dyn Observer>>,
}

impl ObserverGuard {
    fn enter(observer: Option<Rc<dyn Observer>>) -> Self {
        let previous = CURRENT_OBSERVER.with(|current| current.replace(observer));
        Self { previous }
    }
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT_OBSERVER.with(|current| *current.borrow_mut() = previous);
    }
}

/// Run `f` without subscribing the current observer to anything it reads.
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    let _guard = ObserverGuard::enter(None);
    f()
}

#[derive(Default)]
struct Subscribers {
    observers: RefCell<SmallVec<[(ObserverId, Weak<dyn Observer>); 4]>>,
}

impl Subscribers {
    fn track(&self, source: impl FnOnce() -> Rc<dyn Source>) {
        let Some(observer) = CURRENT_OBSERVER.with(|current| current.borrow().clone()) else {
            return;
        };
        let id = observer.id();
        {
            let mut observers = self.observers.borrow_mut();
            if observers.iter().any(|(existing, _)| *existing == id) {
                return;
            }
            observers.push((id, Rc::downgrade(&observer)));
        }
        observer.add_source(source());
    }

    /// Invalidate every subscriber. Subscribers re-subscribe when they
    /// recompute, so the list is emptied.
    fn notify(&self) {
        let observers = std::mem::take(&mut *self.observers.borrow_mut());
        for (_, observer) in observers {
            if let Some(observer) = observer.upgrade() {
                observer.invalidate();
            }
        }
    }

    fn remove(&self, id: ObserverId) {
        self.observers
            .borrow_mut()
            .retain(|(existing, _)| *existing != id);
    }

    fn len(&self) -> usize {
        self.observers.borrow().len()
    }
}

/// A writable reactive value.
pub struct Signal<T> {
    inner: Rc<SignalInner<T>>,
}

struct SignalInner<T> {
    value: RefCell<T>,
    subscribers: Subscribers,
}

impl<T> Source for SignalInner<T> {
    fn unsubscribe(&self, observer: ObserverId) {
        self.subscribers.remove(observer);
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + 'static> Signal<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                value: RefCell::new(value),
                subscribers: Subscribers::default(),
            }),
        }
    }

    /// Current value; subscribes the current observer.
    pub fn get(&self) -> T {
        self.track();
        self.inner.value.borrow().clone()
    }

    /// Current value without creating a dependency.
    pub fn peek(&self) -> T {
        self.inner.value.borrow().clone()
    }

    pub fn set(&self, value: T) {
        let previous = self.inner.value.replace(value);
        drop(previous);
        self.inner.subscribers.notify();
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.inner.value.borrow_mut());
        self.inner.subscribers.notify();
    }

    /// Number of observers currently subscribed.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    fn track(&self) {
        let inner = &self.inner;
        inner.subscribers.track(|| inner.clone() as Rc<dyn Source>);
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_tuple("Signal").field(&self.inner.value.borrow()).finish()
    }
}

/// A lazily computed, cached value derived from other signals and memos.
pub struct Memo<T> {
    inner: Rc<MemoInner<T>>,
}

struct MemoInner<T> {
    id: ObserverId,
    compute: Box<dyn Fn() -> T>,
    value: RefCell<Option<T>>,
    dirty: Cell<bool>,
    computing: Cell<bool>,
    sources: RefCell<SmallVec<[Rc<dyn Source>; 4]>>,
    subscribers: Subscribers,
    this: Weak<MemoInner<T>>,
}

impl<T> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + 'static> Memo<T> {
    /// Nothing is computed until the first read.
    pub fn new(compute: impl Fn() -> T + 'static) -> Self {
        let inner = Rc::new_cyclic(|this| MemoInner {
            id: ObserverId::next(),
            compute: Box::new(compute),
            value: RefCell::new(None),
            dirty: Cell::new(true),
            computing: Cell::new(false),
            sources: RefCell::new(SmallVec::new()),
            subscribers: Subscribers::default(),
            this: this.clone(),
        });
        Self { inner }
    }

    /// Current value, recomputed first if dirty; subscribes the current observer.
    ///
    /// # Panics
    ///
    /// When read from inside its own computation. Use [`Memo::try_get`] where
    /// the compute function may reach this memo again.
    pub fn get(&self) -> T {
        match self.try_get() {
            Some(value) => value,
            None => panic!("memo read its own value while computing"),
        }
    }

    /// Current value without creating a dependency. Panics like [`Memo::get`].
    pub fn peek(&self) -> T {
        match self.try_peek() {
            Some(value) => value,
            None => panic!("memo read its own value while computing"),
        }
    }

    /// `None` when read from inside its own computation.
    pub fn try_get(&self) -> Option<T> {
        let inner = &self.inner;
        if inner.computing.get() {
            return None;
        }
        inner.subscribers.track(|| inner.clone() as Rc<dyn Source>);
        Some(inner.refresh())
    }

    pub fn try_peek(&self) -> Option<T> {
        if self.inner.computing.get() {
            return None;
        }
        Some(self.inner.refresh())
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }
}

impl<T: Clone + 'static> MemoInner<T> {
    fn refresh(&self) -> T {
        if !self.dirty.get() {
            if let Some(value) = self.value.borrow().as_ref() {
                return value.clone();
            }
        }
        debug_assert!(!self.computing.get());

        let stale = std::mem::take(&mut *self.sources.borrow_mut());
        for source in stale {
            source.unsubscribe(self.id);
        }

        // Cleared before computing so a write during the computation leaves it dirty.
        self.dirty.set(false);
        self.computing.set(true);
        let value = {
            let observer = self.this.upgrade().map(|this| this as Rc<dyn Observer>);
            let _guard = ObserverGuard::enter(observer);
            (self.compute)()
        };
        self.computing.set(false);
        log::trace!("memo {:?} recomputed", self.id);

        *self.value.borrow_mut() = Some(value.clone());
        value
    }
}

impl<T> Observer for MemoInner<T> {
    fn id(&self) -> ObserverId {
        self.id
    }

    fn invalidate(&self) {
        if !self.dirty.replace(true) {
            self.subscribers.notify();
        }
    }

    fn add_source(&self, source: Rc<dyn Source>) {
        self.sources.borrow_mut().push(source);
    }
}

impl<T> Source for MemoInner<T> {
    fn unsubscribe(&self, observer: ObserverId) {
        self.subscribers.remove(observer);
    }
}

impl<T> std::fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.inner.id)
            .field("dirty", &self.inner.dirty.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counted<T: Clone + 'static>(f: impl Fn() -> T + 'static) -> (Memo<T>, Rc<Cell<usize>>) {
        let runs = Rc::new(Cell::new(0));
        let memo = Memo::new({
            let runs = runs.clone();
            move || {
                runs.set(runs.get() + 1);
                f()
            }
        });
        (memo, runs)
    }

    #[test]
    fn memo_is_lazy_and_cached() {
        let source = Signal::new(2);
        let (doubled, runs) = counted({
            let source = source.clone();
            move || source.get() * 2
        });

        assert_eq!(runs.get(), 0);
        assert_eq!(doubled.get(), 4);
        assert_eq!(doubled.get(), 4);
        assert_eq!(doubled.peek(), 4);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn set_invalidates_but_does_not_recompute() {
        let source = Signal::new(1);
        let (plus_one, runs) = counted({
            let source = source.clone();
            move || source.get() + 1
        });
        assert_eq!(plus_one.get(), 2);

        source.set(10);
        source.set(20);
        assert!(plus_one.is_dirty());
        assert_eq!(runs.get(), 1);

        assert_eq!(plus_one.get(), 21);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn update_notifies_like_set() {
        let source = Signal::new(vec![1]);
        let len = Memo::new({
            let source = source.clone();
            move || source.get().len()
        });
        assert_eq!(len.get(), 1);
        source.update(|items| items.push(2));
        assert!(len.is_dirty());
        assert_eq!(len.get(), 2);
    }

    #[test]
    fn invalidation_is_transitive() {
        let source = Signal::new(1);
        let first = Memo::new({
            let source = source.clone();
            move || source.get() * 10
        });
        let (second, runs) = counted({
            let first = first.clone();
            move || first.get() + 1
        });

        assert_eq!(second.get(), 11);
        source.set(2);
        assert!(second.is_dirty());
        assert_eq!(second.get(), 21);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn stale_branches_are_unsubscribed() {
        let use_left = Signal::new(true);
        let left = Signal::new("left");
        let right = Signal::new("right");
        let (picked, runs) = counted({
            let (use_left, left, right) = (use_left.clone(), left.clone(), right.clone());
            move || if use_left.get() { left.get() } else { right.get() }
        });

        assert_eq!(picked.get(), "left");
        assert_eq!(right.subscriber_count(), 0);

        use_left.set(false);
        assert_eq!(picked.get(), "right");
        assert_eq!(left.subscriber_count(), 0);

        left.set("ignored");
        assert!(!picked.is_dirty());
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn reentrant_read_is_refused() {
        let slot: Rc<RefCell<Option<Memo<Option<i32>>>>> = Rc::new(RefCell::new(None));
        let looping = Memo::new({
            let slot = slot.clone();
            move || {
                let this = slot.borrow().clone()?;
                this.try_get().flatten()
            }
        });
        *slot.borrow_mut() = Some(looping.clone());

        assert_eq!(looping.try_get(), Some(None));
        assert_eq!(looping.inner.subscribers.len(), 0);
        assert_eq!(looping.get(), None);
    }

    #[test]
    fn peek_and_untrack_do_not_subscribe() {
        let tracked = Signal::new(1);
        let silent = Signal::new(100);
        let sum = Memo::new({
            let (tracked, silent) = (tracked.clone(), silent.clone());
            move || tracked.get() + silent.peek() + untrack(|| silent.get())
        });

        assert_eq!(sum.get(), 201);
        silent.set(0);
        assert!(!sum.is_dirty());
        assert_eq!(sum.get(), 201);

        tracked.set(2);
        assert_eq!(sum.get(), 2);
    }
}
