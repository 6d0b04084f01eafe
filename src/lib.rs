//! Thread-backed promises.
//!
//! A [`Promise`] holds the eventual result of a computation running on its
//! own thread. Any number of observers may wait for it, before or after it
//! resolves, and each receives the value exactly once.
//!
//! # Examples
//!
//! ```
//! use thread_promise::{all, race, Promise};
//! use std::{thread, time::Duration};
//!
//! let slow = Promise::spawn(|| {
//!     thread::sleep(Duration::from_millis(50));
//!     65
//! });
//! let fast = Promise::resolved(75);
//!
//! assert_eq!(all(vec![slow.clone(), fast.clone()]).wait(), vec![65, 75]);
//! assert_eq!(race(vec![slow, fast]).unwrap().wait(), 75);
//! ```
use thiserror::Error;

pub mod cell;
pub mod channel;
pub mod combinator;
pub mod delivery;
pub mod promise;
pub mod spawn;

pub use cell::ValueCell;
pub use combinator::{all, all_with, race, race_with};
pub use delivery::{Abort, Delivery, Sender};
pub use promise::Promise;
pub use spawn::{Spawner, ThreadSpawner};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("the producer was dropped before delivering a value")]
    ProducerDropped,
    #[error("the delivery was cancelled")]
    Cancelled,
    #[error("timed out waiting for a value")]
    Timeout,
    #[error("cannot race an empty set of promises")]
    EmptyRace,
}

#[derive(Debug)]
pub(crate) enum WakerState {
    Fresh,
    Tainted,
}
