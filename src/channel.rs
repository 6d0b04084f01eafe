//! Promises fed by an existing single-value source instead of a producer
//! closure. The source is drained on its own thread; if it closes without a
//! value the promise never resolves.
//!
use crate::delivery::Delivery;
use crate::spawn::{Spawner, ThreadSpawner};
use crate::Promise;
use log::warn;
use std::sync::mpsc::Receiver;

impl<T: Clone + Send + 'static> Promise<T> {
    /// Resolves with the first value received on `receiver`.
    ///
    /// # Examples
    ///
    /// ```
    /// use thread_promise::Promise;
    /// use std::sync::mpsc::channel;
    /// let (tx, rx) = channel();
    /// let promise = Promise::from_receiver(rx);
    /// tx.send(5).unwrap();
    /// assert_eq!(promise.wait(), 5);
    /// ```
    pub fn from_receiver(receiver: Receiver<T>) -> Self {
        Self::from_receiver_with(&ThreadSpawner::new(), receiver)
    }

    pub fn from_receiver_with<S>(spawner: &S, receiver: Receiver<T>) -> Self
    where
        S: Spawner + ?Sized,
    {
        let (promise, resolver) = Self::pending();
        spawner.spawn(move || match receiver.recv() {
            Ok(value) => resolver.resolve(value),
            Err(err) => {
                warn!("source channel closed before sending ({err}); promise stays pending")
            }
        });
        promise
    }

    /// Resolves with whatever `delivery` yields.
    pub fn from_delivery(delivery: Delivery<T>) -> Self {
        Self::from_delivery_with(&ThreadSpawner::new(), delivery)
    }

    pub fn from_delivery_with<S>(spawner: &S, delivery: Delivery<T>) -> Self
    where
        S: Spawner + ?Sized,
    {
        let (promise, resolver) = Self::pending();
        spawner.spawn(move || match delivery.recv() {
            Ok(value) => resolver.resolve(value),
            Err(err) => warn!("delivery failed ({err}); promise stays pending"),
        });
        promise
    }
}
