//! Promises built out of other promises.
use crate::delivery::{self, Abort, Delivery};
use crate::spawn::{Spawner, ThreadSpawner};
use crate::{Error, Promise};
use log::{debug, error, trace, warn};
use std::sync::{mpsc, Arc, Mutex, PoisonError};

/// Resolves with every input's value, in input order.
///
/// Each input is waited on by its own observer so a slow member does not
/// hold up the others. An empty input resolves immediately with an empty
/// `Vec`.
///
/// # Examples
///
/// ```
/// use thread_promise::{all, Promise};
/// use std::{thread, time::Duration};
/// let results = all(vec![
///     Promise::spawn(|| {
///         thread::sleep(Duration::from_millis(100));
///         65
///     }),
///     Promise::spawn(|| 75),
/// ])
/// .wait();
/// assert_eq!(results, vec![65, 75]);
/// ```
pub fn all<T, I>(promises: I) -> Promise<Vec<T>>
where
    T: Clone + Send + 'static,
    I: IntoIterator<Item = Promise<T>>,
{
    all_with(&ThreadSpawner::new(), promises)
}

pub fn all_with<T, I, S>(spawner: &S, promises: I) -> Promise<Vec<T>>
where
    T: Clone + Send + 'static,
    I: IntoIterator<Item = Promise<T>>,
    S: Spawner + Clone + Send + 'static,
{
    let promises: Vec<Promise<T>> = promises.into_iter().collect();
    if promises.is_empty() {
        return Promise::resolved(Vec::new());
    }

    let (promise, resolver) = Promise::<Vec<T>>::pending();
    let observers = spawner.clone();
    spawner.spawn(move || {
        let count = promises.len();
        let (tx, rx) = mpsc::channel();
        for (index, promise) in promises.into_iter().enumerate() {
            let tx = tx.clone();
            observers.spawn(move || {
                let _ = tx.send((index, promise.wait()));
            });
        }
        drop(tx);

        let mut slots: Vec<Option<T>> = (0..count).map(|_| None).collect();
        for (index, value) in rx {
            slots[index] = Some(value);
        }
        match slots.into_iter().collect::<Option<Vec<T>>>() {
            Some(values) => {
                trace!("all {count} promises resolved");
                resolver.resolve(values)
            }
            None => error!("an observer exited without a value; joined promise stays pending"),
        }
    });
    promise
}

/// Resolves with the value of whichever input resolves first.
///
/// The other inputs keep running, but their observers stop listening as
/// soon as there is a winner and their values are discarded. Racing an
/// empty set is an [`Error::EmptyRace`].
///
/// # Examples
///
/// ```
/// use thread_promise::{race, Promise};
/// use std::{thread, time::Duration};
/// let slow = Promise::spawn(|| {
///     thread::sleep(Duration::from_millis(100));
///     65
/// });
/// let fast = Promise::spawn(|| 75);
/// assert_eq!(race(vec![slow, fast]).unwrap().wait(), 75);
/// ```
pub fn race<T, I>(promises: I) -> Result<Promise<T>, Error>
where
    T: Clone + Send + 'static,
    I: IntoIterator<Item = Promise<T>>,
{
    race_with(&ThreadSpawner::new(), promises)
}

pub fn race_with<T, I, S>(spawner: &S, promises: I) -> Result<Promise<T>, Error>
where
    T: Clone + Send + 'static,
    I: IntoIterator<Item = Promise<T>>,
    S: Spawner + ?Sized,
{
    let deliveries: Vec<Delivery<T>> = promises.into_iter().map(|p| p.delivery()).collect();
    if deliveries.is_empty() {
        return Err(Error::EmptyRace);
    }

    let stops: Arc<Vec<Abort<T>>> =
        Arc::new(deliveries.iter().map(Delivery::abort_handle).collect());
    let (winner_tx, winner_rx) = delivery::channel();
    let winner = Arc::new(Mutex::new(Some(winner_tx)));

    for (index, delivery) in deliveries.into_iter().enumerate() {
        let stops = stops.clone();
        let winner = winner.clone();
        spawner.spawn(move || match delivery.recv() {
            Ok(value) => {
                let claimed = winner.lock().unwrap_or_else(PoisonError::into_inner).take();
                match claimed {
                    Some(tx) => {
                        debug!("race won by input {index}");
                        tx.send(value);
                        for (other, stop) in stops.iter().enumerate() {
                            if other != index {
                                stop.abort();
                            }
                        }
                    }
                    None => trace!("race input {index} resolved after the winner; discarded"),
                }
            }
            Err(Error::Cancelled) => trace!("race input {index} stopped listening"),
            Err(err) => warn!("race input {index} failed: {err}"),
        });
    }

    Ok(Promise::from_delivery_with(spawner, winner_rx))
}
