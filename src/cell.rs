//! Holder for a resolved value.
use crate::delivery::{channel, Delivery};

/// A resolved value that can be handed to any number of observers without
/// running the producer again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueCell<T> {
    value: T,
}

impl<T> ValueCell<T> {
    pub fn wrap(value: T) -> Self {
        Self { value }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T: Clone> ValueCell<T> {
    /// Returns a fresh delivery that already holds a copy of the value, so
    /// receiving from it never blocks.
    ///
    /// # Examples
    ///
    /// ```
    /// use thread_promise::ValueCell;
    /// let cell = ValueCell::wrap(5);
    /// assert_eq!(cell.deliver().recv(), Ok(5));
    /// assert_eq!(cell.deliver().recv(), Ok(5));
    /// ```
    pub fn deliver(&self) -> Delivery<T> {
        let (tx, rx) = channel();
        tx.send(self.value.clone());
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::ValueCell;
    use std::time::Duration;

    #[test]
    fn test_deliver_is_immediate() {
        let cell = ValueCell::wrap(String::from("🍓"));
        let outcome = cell.deliver().recv_timeout(Duration::ZERO);
        assert_eq!(outcome, Ok(String::from("🍓")));
    }

    #[test]
    fn test_deliver_leaves_value_untouched() {
        let cell = ValueCell::wrap(vec![1, 2, 3]);
        let mut first = cell.deliver().recv().unwrap();
        first.push(4);
        assert_eq!(cell.get(), &vec![1, 2, 3]);
        assert_eq!(cell.into_inner(), vec![1, 2, 3]);
    }

    #[test]
    fn test_deliver_empty_value() {
        let cell = ValueCell::wrap(Vec::<u8>::new());
        assert_eq!(cell.deliver().recv(), Ok(Vec::new()));
    }
}
