/// WatchedValue holds a value together with the value it replaced, so that a change between two
/// successive updates can be detected.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchedValue<T> {
    value: T,
    old_value: T,
}

impl<T: Clone + PartialEq> WatchedValue<T> {
    pub fn new(initial_value: T) -> WatchedValue<T> {
        WatchedValue {
            old_value: initial_value.clone(),
            value: initial_value,
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn previous(&self) -> &T {
        &self.old_value
    }

    /// True if the last call to `set` replaced the value with a different one.
    pub fn has_changed(&self) -> bool {
        self.value != self.old_value
    }

    pub fn set(&mut self, value: T) {
        self.old_value = std::mem::replace(&mut self.value, value);
    }
}

impl<T: Copy + PartialEq> WatchedValue<T> {
    pub fn value(&self) -> T {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unchanged_after_construction() {
        let v = WatchedValue::new(3);
        assert!(!v.has_changed());
        assert_eq!(v.value(), 3);
    }

    #[test]
    fn test_changed_exactly_once() {
        let mut v = WatchedValue::new(0);
        v.set(1);
        assert!(v.has_changed());
        assert_eq!(*v.previous(), 0);

        v.set(1);
        assert!(!v.has_changed());
    }

    #[test]
    fn test_identical_values_never_change() {
        let mut v = WatchedValue::new(String::from("a"));
        v.set(String::from("a"));
        v.set(String::from("a"));
        assert!(!v.has_changed());
        assert_eq!(v.get(), "a");
    }

    #[test]
    fn test_next_set_resets_flag() {
        let mut v = WatchedValue::new(false);
        v.set(true);
        assert!(v.has_changed());
        v.set(false);
        assert!(v.has_changed());
        v.set(false);
        assert!(!v.has_changed());
    }
}
