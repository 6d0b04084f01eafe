use crate::{Error, WakerState};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll, Waker},
};

/// Creates a one-shot delivery channel.
///
/// The [`Sender`] can put at most one value in, and the [`Delivery`] can take
/// at most one value out. The delivery can be consumed by blocking with
/// [`Delivery::recv`] or by awaiting it as a future.
///
/// # Examples
///
/// ```
/// use thread_promise::delivery::channel;
/// use futures::executor::block_on;
/// use std::thread;
/// let (sender, delivery) = channel::<String>();
///
/// let task1 = thread::spawn(move || block_on(async {
///     assert_eq!(delivery.await.unwrap(), "Hi");
/// }));
/// sender.send("Hi".into());
/// task1.join().expect("The task1 thread has panicked.");
/// ```
pub fn channel<T>() -> (Sender<T>, Delivery<T>) {
    let slot = Arc::new(Slot {
        inner: Mutex::new(Inner {
            value: None,
            waker: Err(WakerState::Fresh),
            cancelled: false,
        }),
        ready: Condvar::new(),
    });
    (Sender { slot: slot.clone() }, Delivery { slot })
}

/// Writing half of a delivery channel.
#[derive(Debug)]
pub struct Sender<T> {
    slot: Arc<Slot<T>>,
}

/// Reading half of a delivery channel. Yields exactly one outcome.
#[derive(Debug)]
pub struct Delivery<T> {
    slot: Arc<Slot<T>>,
}

/// Stops a [`Delivery`] from waiting any longer.
#[derive(Debug)]
pub struct Abort<T> {
    slot: Arc<Slot<T>>,
}

#[derive(Debug)]
struct Slot<T> {
    inner: Mutex<Inner<T>>,
    ready: Condvar,
}

#[derive(Debug)]
struct Inner<T> {
    value: Option<T>,
    // Tainted once the sender is gone, whether or not it sent anything.
    waker: Result<Waker, WakerState>,
    cancelled: bool,
}

impl<T> Inner<T> {
    /// A value that has arrived always wins over a cancellation.
    fn outcome(&mut self) -> Option<Result<T, Error>> {
        if let Some(value) = self.value.take() {
            return Some(Ok(value));
        }
        if self.cancelled {
            return Some(Err(Error::Cancelled));
        }
        match self.waker {
            Err(WakerState::Tainted) => Some(Err(Error::ProducerDropped)),
            _ => None,
        }
    }
}

impl<T> Slot<T> {
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish(&self, value: Option<T>) {
        let mut inner = self.lock();
        if value.is_some() {
            inner.value = value;
        }
        let waker = std::mem::replace(&mut inner.waker, Err(WakerState::Tainted));
        drop(inner);
        self.ready.notify_all();
        if let Ok(waker) = waker {
            waker.wake()
        }
    }
}

impl<T> Sender<T> {
    /// Hands the value to the delivery. Never blocks.
    pub fn send(self, value: T) {
        self.slot.finish(Some(value));
    }

    /// True once nothing can observe this channel any more: the delivery and
    /// every abort handle made from it are gone.
    pub fn is_abandoned(&self) -> bool {
        Arc::strong_count(&self.slot) == 1
    }
}

impl<T> Drop for Sender<T> {
    /// An unsent sender wakes the delivery with [`Error::ProducerDropped`].
    fn drop(&mut self) {
        self.slot.finish(None);
    }
}

impl<T> Delivery<T> {
    /// Blocks the current thread until the outcome is known.
    pub fn recv(self) -> Result<T, Error> {
        let mut inner = self.slot.lock();
        loop {
            if let Some(outcome) = inner.outcome() {
                return outcome;
            }
            inner = self
                .slot
                .ready
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`recv`](Self::recv) but gives up with [`Error::Timeout`].
    ///
    /// A timeout too large to express as a deadline waits without one.
    pub fn recv_timeout(self, timeout: Duration) -> Result<T, Error> {
        let mut inner = self.slot.lock();
        if let Some(outcome) = inner.outcome() {
            return outcome;
        }
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            drop(inner);
            return self.recv();
        };
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout);
            }
            inner = self
                .slot
                .ready
                .wait_timeout(inner, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
            if let Some(outcome) = inner.outcome() {
                return outcome;
            }
        }
    }

    /// Returns `Ok(None)` while nothing has happened yet.
    pub fn try_recv(&mut self) -> Result<Option<T>, Error> {
        self.slot.lock().outcome().transpose()
    }

    pub fn abort_handle(&self) -> Abort<T> {
        Abort {
            slot: self.slot.clone(),
        }
    }
}

impl<T> Abort<T> {
    /// Wakes the delivery with [`Error::Cancelled`] unless a value is already
    /// waiting in it.
    pub fn abort(&self) {
        let mut inner = self.slot.lock();
        inner.cancelled = true;
        let waker = if inner.waker.is_ok() {
            std::mem::replace(&mut inner.waker, Err(WakerState::Fresh)).ok()
        } else {
            None
        };
        drop(inner);
        self.slot.ready.notify_all();
        if let Some(waker) = waker {
            waker.wake()
        }
    }
}

impl<T> Future for Delivery<T> {
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.slot.lock();
        match inner.outcome() {
            Some(outcome) => Poll::Ready(outcome),
            None => {
                inner.waker = Ok(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::channel;
    use crate::Error;
    use futures::executor::block_on;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_delivery_send() {
        let (tx, rx) = channel::<String>();
        let task1 = thread::spawn(move || block_on(async { rx.await }));
        let task2 = thread::spawn(move || tx.send(String::from("🍓")));
        task2.join().expect("The task2 thread has panicked");
        let value = task1.join().expect("The task1 thread has panicked");
        assert_eq!(value, Ok(String::from("🍓")));
    }

    #[test]
    fn test_delivery_blocking_recv() {
        let (tx, rx) = channel::<i32>();
        let task1 = thread::spawn(move || rx.recv());
        thread::sleep(Duration::from_millis(20));
        tx.send(42);
        assert_eq!(task1.join().expect("The task1 thread has panicked"), Ok(42));
    }

    #[test]
    fn test_delivery_sender_dropped() {
        let (tx, rx) = channel::<String>();
        let task1 = thread::spawn(move || block_on(async { rx.await }));
        let task2 = thread::spawn(move || {
            // Move the sender into this thread and never send.
            std::mem::drop(tx);
        });
        task2.join().expect("The task2 thread has panicked");
        let outcome = task1.join().expect("The task1 thread has panicked");
        assert_eq!(outcome, Err(Error::ProducerDropped));
    }

    #[test]
    fn test_delivery_no_consumer() {
        let (tx, rx) = channel::<String>();
        drop(rx);
        tx.send(String::from("🍓"));
    }

    #[test]
    fn test_delivery_value_is_taken_once() {
        let (tx, mut rx) = channel::<i32>();
        assert_eq!(rx.try_recv(), Ok(None));
        tx.send(7);
        assert_eq!(rx.try_recv(), Ok(Some(7)));
        assert_eq!(rx.try_recv(), Err(Error::ProducerDropped));
    }

    #[test]
    fn test_delivery_timeout() {
        let (_tx, rx) = channel::<i32>();
        assert_eq!(rx.recv_timeout(Duration::from_millis(10)), Err(Error::Timeout));
    }

    #[test]
    fn test_delivery_unbounded_timeout() {
        let (tx, rx) = channel::<i32>();
        tx.send(3);
        assert_eq!(rx.recv_timeout(Duration::MAX), Ok(3));

        let (tx, rx) = channel::<i32>();
        let task1 = thread::spawn(move || rx.recv_timeout(Duration::MAX));
        thread::sleep(Duration::from_millis(20));
        tx.send(4);
        assert_eq!(task1.join().expect("The task1 thread has panicked"), Ok(4));
    }

    #[test]
    fn test_sender_abandoned() {
        let (tx, rx) = channel::<i32>();
        let abort = rx.abort_handle();
        assert!(!tx.is_abandoned());
        drop(rx);
        assert!(!tx.is_abandoned());
        drop(abort);
        assert!(tx.is_abandoned());
    }

    #[test]
    fn test_abort_wakes_blocked_receiver() {
        let (_tx, rx) = channel::<i32>();
        let abort = rx.abort_handle();
        let task1 = thread::spawn(move || rx.recv());
        thread::sleep(Duration::from_millis(20));
        abort.abort();
        let outcome = task1.join().expect("The task1 thread has panicked");
        assert_eq!(outcome, Err(Error::Cancelled));
    }

    #[test]
    fn test_abort_wakes_async_receiver() {
        let (_tx, rx) = channel::<i32>();
        let abort = rx.abort_handle();
        let task1 = thread::spawn(move || block_on(rx));
        thread::sleep(Duration::from_millis(20));
        abort.abort();
        let outcome = task1.join().expect("The task1 thread has panicked");
        assert_eq!(outcome, Err(Error::Cancelled));
    }

    #[test]
    fn test_value_beats_late_abort() {
        let (tx, rx) = channel::<i32>();
        let abort = rx.abort_handle();
        tx.send(1);
        abort.abort();
        assert_eq!(rx.recv(), Ok(1));
    }
}
