//! Where producers, callbacks and combinator observers run.
use log::error;
use std::sync::Arc;
use std::thread;

/// Runs a task on its own logical thread of execution.
///
/// Implementations must not run the task inline on the calling thread:
/// combinators block inside the tasks they spawn.
pub trait Spawner {
    fn spawn<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static;
}

impl<S: Spawner + ?Sized> Spawner for &S {
    fn spawn<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        (**self).spawn(task)
    }
}

impl<S: Spawner + ?Sized> Spawner for Arc<S> {
    fn spawn<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        (**self).spawn(task)
    }
}

/// Spawns one OS thread per task.
///
/// # Examples
///
/// ```
/// use thread_promise::{Promise, ThreadSpawner};
/// let spawner = ThreadSpawner::named("loader").stack_size(256 * 1024);
/// let promise = Promise::spawn_with(&spawner, || {
///     std::thread::current().name().map(str::to_owned)
/// });
/// assert_eq!(promise.wait().as_deref(), Some("loader"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ThreadSpawner {
    name: Option<String>,
    stack_size: Option<usize>,
}

impl ThreadSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every spawned thread gets exactly this name; no counter is appended.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            stack_size: None,
        }
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }
}

impl Spawner for ThreadSpawner {
    fn spawn<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut builder = thread::Builder::new();
        if let Some(name) = &self.name {
            builder = builder.name(name.clone());
        }
        if let Some(bytes) = self.stack_size {
            builder = builder.stack_size(bytes);
        }
        if let Err(err) = builder.spawn(task) {
            // Same contract as `std::thread::spawn`.
            error!("failed to spawn thread: {err}");
            panic!("failed to spawn thread: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Spawner, ThreadSpawner};
    use std::sync::{mpsc, Arc};
    use std::thread;

    #[test]
    fn test_spawn_runs_on_other_thread() {
        let (tx, rx) = mpsc::channel();
        let caller = thread::current().id();
        ThreadSpawner::new().spawn(move || tx.send(thread::current().id()).unwrap());
        assert_ne!(rx.recv().unwrap(), caller);
    }

    fn thread_name<S: Spawner>(spawner: S) -> Option<String> {
        let (tx, rx) = mpsc::channel();
        spawner.spawn(move || {
            tx.send(thread::current().name().map(str::to_owned)).unwrap()
        });
        rx.recv().unwrap()
    }

    #[test]
    fn test_spawn_uses_name() {
        let spawner = ThreadSpawner::named("promise-test");
        assert_eq!(thread_name(&spawner).as_deref(), Some("promise-test"));
        // Every thread gets the same name, not a numbered variant.
        assert_eq!(thread_name(&spawner).as_deref(), Some("promise-test"));
        assert_eq!(thread_name(Arc::new(spawner)).as_deref(), Some("promise-test"));
    }
}
