use std::{any::Any, collections::HashMap};

/// Resources published by passes for the passes that run after them, keyed by pass name.
#[derive(Default)]
pub struct Blackboard {
    entries: HashMap<&'static str, Box<dyn Any>>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `value` under `pass`, replacing what the pass published before.
    pub fn publish<T: 'static>(&mut self, pass: &'static str, value: T) {
        self.entries.insert(pass, Box::new(value));
    }

    pub fn get<T: 'static>(&self, pass: &str) -> Option<&T> {
        self.entries.get(pass)?.downcast_ref()
    }

    pub fn contains(&self, pass: &str) -> bool {
        self.entries.contains_key(pass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_are_typed() {
        let mut blackboard = Blackboard::new();
        blackboard.publish("depth", 42u32);
        assert_eq!(blackboard.get::<u32>("depth"), Some(&42));
        assert_eq!(blackboard.get::<i64>("depth"), None);
        assert_eq!(blackboard.get::<u32>("color"), None);
    }

    #[test]
    fn republishing_replaces() {
        let mut blackboard = Blackboard::new();
        blackboard.publish("hiz", "first");
        blackboard.publish("hiz", "second");
        assert_eq!(blackboard.get::<&str>("hiz"), Some(&"second"));
        assert!(blackboard.contains("hiz"));
    }
}
