/// Holds a value derived from `K` and recreates it whenever the key changes.
pub struct Cache<K, V>(Option<(K, V)>);

impl<K: Eq, V> Cache<K, V> {
    pub fn try_get<E>(&mut self, key: K, f: impl FnOnce() -> Result<V, E>) -> Result<&mut V, E> {
        match self.0.take() {
            Some((current, value)) if current == key => Ok(&mut self.0.insert((current, value)).1),
            _ => {
                let value = f()?;
                Ok(&mut self.0.insert((key, value)).1)
            }
        }
    }

    pub fn get(&mut self, key: K, f: impl FnOnce() -> V) -> &mut V {
        match self.try_get(key, || Ok::<_, std::convert::Infallible>(f())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    pub fn current(&self) -> Option<&V> {
        self.0.as_ref().map(|(_, value)| value)
    }
}

impl<K, V> Default for Cache<K, V> {
    fn default() -> Self {
        Self(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recreates_only_on_key_change() {
        let mut cache = Cache::default();
        let mut created = 0;
        for key in [1, 1, 2, 2, 1].iter() {
            cache.get(*key, || {
                created += 1;
                key * 100
            });
        }
        assert_eq!(created, 3);
        assert_eq!(cache.current(), Some(&100));
    }

    #[test]
    fn failed_creation_leaves_cache_empty() {
        let mut cache: Cache<u32, u32> = Cache::default();
        assert!(cache.try_get(1, || Err("out of memory")).is_err());
        assert!(cache.current().is_none());
        assert_eq!(*cache.try_get(1, || Ok::<_, ()>(7)).unwrap(), 7);
    }
}
