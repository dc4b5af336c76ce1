use derive_more::Deref;
use serde::{Deserialize, Deserializer, Serialize};

///
/// KeyedList
///
/// Insertion-ordered list of `(K, V)` entries with unique keys.
/// Iteration order is first-seen insertion order; lookups are linear, which
/// is deliberate for the small member tables this engine manages.
///

#[derive(Clone, Debug, Deref, Eq, PartialEq, Serialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct KeyedList<K, V>(Vec<(K, V)>);

impl<K, V> KeyedList<K, V> {
    /// Create an empty keyed list.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Return the number of entries in the list.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the list is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Return an iterator over `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.0.iter().map(|(k, v)| (k, v))
    }

    /// Return an iterator over keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.0.iter().map(|(k, _)| k)
    }

    /// Return an iterator over values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.0.iter().map(|(_, v)| v)
    }

    /// Clear all entries from the list.
    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl<K, V> KeyedList<K, V>
where
    K: Eq,
{
    /// Build a keyed list, keeping the last value for each key.
    #[must_use]
    pub fn from_vec(entries: Vec<(K, V)>) -> Self {
        let mut list = Self::new();
        for (key, value) in entries {
            list.insert(key, value);
        }

        list
    }

    /// Return a reference to the value for `key` if present.
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.position(key).map(|idx| &self.0[idx].1)
    }

    /// Return a mutable reference to the value for `key` if present.
    #[must_use]
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.position(key).map(|idx| &mut self.0[idx].1)
    }

    /// Insert or replace a value for `key`, returning the old value if
    /// present. A replaced key keeps its original position.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.position(&key) {
            Some(index) => Some(std::mem::replace(&mut self.0[index].1, value)),
            None => {
                self.0.push((key, value));
                None
            }
        }
    }

    /// Insert a value for a key that must not already exist. On a duplicate
    /// key the list is unchanged and the pair is handed back.
    pub fn try_insert(&mut self, key: K, value: V) -> Result<(), (K, V)> {
        if self.contains_key(&key) {
            return Err((key, value));
        }
        self.0.push((key, value));

        Ok(())
    }

    /// Remove the entry for `key`, returning the value if present.
    /// Later entries keep their relative order.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.position(key).map(|idx| self.0.remove(idx).1)
    }

    /// Returns `true` if the list contains `key`.
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: std::borrow::Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.position(key).is_some()
    }

    fn position<Q>(&self, key: &Q) -> Option<usize>
    where
        K: std::borrow::Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.0.iter().position(|(k, _)| k.borrow() == key)
    }
}

impl<K, V> Default for KeyedList<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> IntoIterator for KeyedList<K, V> {
    type Item = (K, V);
    type IntoIter = std::vec::IntoIter<(K, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a, K, V> IntoIterator for &'a KeyedList<K, V> {
    type Item = &'a (K, V);
    type IntoIter = std::slice::Iter<'a, (K, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<'de, K, V> Deserialize<'de> for KeyedList<K, V>
where
    K: Deserialize<'de> + Eq,
    V: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries = Vec::<(K, V)>::deserialize(deserializer)?;

        Ok(Self::from_vec(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_insertion_order() {
        let mut list = KeyedList::new();
        list.try_insert("b", 1).expect("fresh key");
        list.try_insert("a", 2).expect("fresh key");
        list.try_insert("c", 3).expect("fresh key");

        let keys: Vec<_> = list.keys().copied().collect();
        assert_eq!(keys, ["b", "a", "c"]);
    }

    #[test]
    fn try_insert_rejects_duplicates_without_mutation() {
        let mut list = KeyedList::new();
        list.try_insert("x", 1).expect("fresh key");

        assert_eq!(list.try_insert("x", 9), Err(("x", 9)));
        assert_eq!(list.get("x"), Some(&1));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn remove_keeps_relative_order() {
        let mut list = KeyedList::new();
        for (k, v) in [("a", 1), ("b", 2), ("c", 3)] {
            list.try_insert(k, v).expect("fresh key");
        }

        assert_eq!(list.remove("b"), Some(2));
        let keys: Vec<_> = list.keys().copied().collect();
        assert_eq!(keys, ["a", "c"]);
    }
}
