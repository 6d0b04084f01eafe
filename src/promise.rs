//! The promise state machine.
//!
//! A promise is `Pending` with a list of waiting deliveries, or `Resolved`
//! with its value. Registration and resolution take the same lock, so a
//! registration either lands in the waiter list before the flip to
//! `Resolved` and is flushed, or sees `Resolved` and is served from the
//! value cell. There is no window in between.
use crate::cell::ValueCell;
use crate::delivery::{channel, Delivery, Sender};
use crate::spawn::{Spawner, ThreadSpawner};
use crate::Error;
use log::{error, trace, warn};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// The eventual value of a computation.
///
/// Cloning a `Promise` is cheap and yields another handle to the same value.
///
/// # Examples
///
/// ```
/// use thread_promise::Promise;
/// use std::thread;
/// let promise = Promise::spawn(|| 1337);
/// let observer = promise.clone();
///
/// let task1 = thread::spawn(move || observer.wait());
/// assert_eq!(promise.wait(), 1337);
/// assert_eq!(task1.join().expect("The task1 thread has panicked."), 1337);
/// ```
pub struct Promise<T> {
    inner: Arc<Inner<T>>,
}

/// The only way to resolve a pending promise. Consumed by resolving.
pub(crate) struct Resolver<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    state: Mutex<State<T>>,
}

enum State<T> {
    Pending(Vec<Sender<T>>),
    Resolved(ValueCell<T>),
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> Inner<T> {
    fn register(&self) -> Delivery<T> {
        let mut state = self.lock();
        match &mut *state {
            State::Resolved(cell) => cell.deliver(),
            State::Pending(waiters) => {
                // Timed-out and aborted deliveries would otherwise pile up
                // until resolution.
                waiters.retain(|waiter| !waiter.is_abandoned());
                let (tx, rx) = channel();
                waiters.push(tx);
                rx
            }
        }
    }

    fn resolve(&self, value: T) {
        let mut state = self.lock();
        if let State::Resolved(_) = &*state {
            warn!("ignoring second resolution of a promise");
            return;
        }
        // Clone before touching the waiters: a panicking clone must leave
        // them registered.
        let cell = ValueCell::wrap(value.clone());
        let waiters = match std::mem::replace(&mut *state, State::Resolved(cell)) {
            State::Pending(waiters) => waiters,
            State::Resolved(_) => Vec::new(),
        };
        drop(state);

        // Everything registered from here on takes the resolved path, so the
        // flush can run without the lock.
        trace!("flushing promise value to {} waiters", waiters.len());
        for waiter in waiters {
            waiter.send(value.clone());
        }
    }
}

impl<T: Clone> Resolver<T> {
    pub(crate) fn resolve(self, value: T) {
        self.inner.resolve(value)
    }
}

impl<T> Promise<T> {
    pub(crate) fn pending() -> (Self, Resolver<T>) {
        let inner = Arc::new(Inner {
            state: Mutex::new(State::Pending(Vec::new())),
        });
        (
            Self {
                inner: inner.clone(),
            },
            Resolver { inner },
        )
    }

    /// A promise that already holds `value`. Nothing is spawned.
    pub fn resolved(value: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::Resolved(ValueCell::wrap(value))),
            }),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(*self.inner.lock(), State::Resolved(_))
    }

    #[cfg(test)]
    pub(crate) fn waiter_count(&self) -> usize {
        match &*self.inner.lock() {
            State::Pending(waiters) => waiters.len(),
            State::Resolved(_) => 0,
        }
    }
}

impl<T: Clone> Promise<T> {
    /// Returns a handle that yields the value exactly once: right away if the
    /// promise is resolved, otherwise when it resolves.
    ///
    /// The handle can be received from on any thread or awaited as a future.
    ///
    /// ```
    /// use thread_promise::Promise;
    /// use futures::executor::block_on;
    /// let promise = Promise::spawn(|| String::from("🍓"));
    /// let value = block_on(promise.delivery()).unwrap();
    /// assert_eq!(value, "🍓");
    /// ```
    pub fn delivery(&self) -> Delivery<T> {
        self.inner.register()
    }

    /// Blocks until the promise resolves and returns a copy of the value.
    pub fn wait(&self) -> T {
        if let Some(value) = self.try_value() {
            return value;
        }
        match self.delivery().recv() {
            Ok(value) => value,
            // Waiters are only released by being sent to, and `self` keeps
            // the waiter list alive.
            Err(err) => unreachable!("promise delivery failed: {err}"),
        }
    }

    /// Like [`wait`](Self::wait) but gives up with [`Error::Timeout`].
    ///
    /// The promise itself keeps pending; a later `wait` can still succeed.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<T, Error> {
        self.delivery().recv_timeout(timeout)
    }

    /// The value, if the promise has resolved. Never blocks.
    pub fn try_value(&self) -> Option<T> {
        match &*self.inner.lock() {
            State::Resolved(cell) => Some(cell.get().clone()),
            State::Pending(_) => None,
        }
    }
}

impl<T: Clone + Send + 'static> Promise<T> {
    /// Runs `producer` on its own thread and resolves with its return value.
    pub fn spawn<F>(producer: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::spawn_with(&ThreadSpawner::new(), producer)
    }

    /// Like [`spawn`](Self::spawn) on a caller-supplied [`Spawner`].
    ///
    /// A producer that panics leaves the promise pending for good.
    pub fn spawn_with<S, F>(spawner: &S, producer: F) -> Self
    where
        S: Spawner + ?Sized,
        F: FnOnce() -> T + Send + 'static,
    {
        let (promise, resolver) = Self::pending();
        spawner.spawn(move || match panic::catch_unwind(AssertUnwindSafe(producer)) {
            Ok(value) => resolver.resolve(value),
            Err(payload) => {
                error!("promise producer panicked; the promise will never resolve");
                panic::resume_unwind(payload)
            }
        });
        promise
    }

    /// Calls `callback` with the value on its own thread once the promise
    /// resolves. Callbacks registered on the same promise run concurrently,
    /// in no particular order.
    ///
    /// ```
    /// use thread_promise::Promise;
    /// use std::sync::mpsc;
    /// let (tx, rx) = mpsc::channel();
    /// Promise::resolved(3).on_resolve(move |value| tx.send(value).unwrap());
    /// assert_eq!(rx.recv().unwrap(), 3);
    /// ```
    pub fn on_resolve<F>(&self, callback: F)
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.on_resolve_with(&ThreadSpawner::new(), callback)
    }

    pub fn on_resolve_with<S, F>(&self, spawner: &S, callback: F)
    where
        S: Spawner + ?Sized,
        F: FnOnce(T) + Send + 'static,
    {
        let promise = self.clone();
        spawner.spawn(move || callback(promise.wait()));
    }

    /// A new promise holding `f` applied to this promise's value. `f` runs
    /// on its own thread.
    pub fn then<U, F>(&self, f: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.then_with(&ThreadSpawner::new(), f)
    }

    pub fn then_with<S, U, F>(&self, spawner: &S, f: F) -> Promise<U>
    where
        S: Spawner + ?Sized,
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let promise = self.clone();
        Promise::spawn_with(spawner, move || f(promise.wait()))
    }
}

impl<T: fmt::Debug> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.inner.lock() {
            State::Pending(waiters) => f
                .debug_struct("Promise")
                .field("state", &"Pending")
                .field("waiters", &waiters.len())
                .finish(),
            State::Resolved(cell) => f
                .debug_struct("Promise")
                .field("state", &"Resolved")
                .field("value", cell.get())
                .finish(),
        }
    }
}
