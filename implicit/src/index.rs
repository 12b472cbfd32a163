use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};

/// A bidirectional mapping between external identifiers and the contiguous positions used as
/// matrix rows or columns. Positions are handed out in insertion order.
#[derive(Debug, Clone)]
pub struct IdIndex<T> {
    ids: Vec<T>,
    positions: HashMap<T, usize>,
}

impl<T> Default for IdIndex<T> {
    fn default() -> IdIndex<T> {
        IdIndex {
            ids: vec![],
            positions: HashMap::new(),
        }
    }
}

impl<T: Clone + Eq + Hash> IdIndex<T> {
    pub fn new() -> IdIndex<T> {
        IdIndex::default()
    }

    /// Returns the position of `id`, assigning the next free one if it was never seen.
    pub fn insert(&mut self, id: T) -> usize {
        if let Some(&position) = self.positions.get(&id) {
            return position;
        }

        let position = self.ids.len();
        self.positions.insert(id.clone(), position);
        self.ids.push(id);

        position
    }

    pub fn position<Q>(&self, id: &Q) -> Option<usize>
    where
        T: Borrow<Q>,
        Q: ?Sized + Eq + Hash,
    {
        self.positions.get(id).copied()
    }
}

impl<T> IdIndex<T> {
    /// The identifier at `position`, if any.
    pub fn id(&self, position: usize) -> Option<&T> {
        self.ids.get(position)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Identifiers by ascending position.
    pub fn iter(&self) -> impl '_ + Iterator<Item = &T> {
        self.ids.iter()
    }
}

impl<T: Clone + Eq + Hash> FromIterator<T> for IdIndex<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> IdIndex<T> {
        let mut index = IdIndex::new();
        for id in iter {
            index.insert(id);
        }

        index
    }
}

/// Resolves item identifiers into something a person can read.
pub trait ItemLookup<T> {
    fn description(&self, item_id: &T) -> Option<&str>;
}

impl<T: Eq + Hash, S: BuildHasher> ItemLookup<T> for HashMap<T, String, S> {
    fn description(&self, item_id: &T) -> Option<&str> {
        self.get(item_id).map(String::as_str)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_positions_follow_first_insertion() {
        let mut index = IdIndex::new();
        assert_eq!(index.insert("b".to_owned()), 0);
        assert_eq!(index.insert("a".to_owned()), 1);
        assert_eq!(index.insert("b".to_owned()), 0);

        assert_eq!(index.len(), 2);
        assert_eq!(index.position("a"), Some(1));
        assert_eq!(index.position("z"), None);
        assert_eq!(index.id(0).map(String::as_str), Some("b"));
        assert_eq!(index.id(2), None);
        assert_eq!(index.iter().cloned().collect::<Vec<_>>(), ["b", "a"]);
    }

    #[test]
    fn test_collect_deduplicates() {
        let index = [17850u64, 13047, 17850, 12583]
            .into_iter()
            .collect::<IdIndex<_>>();

        assert_eq!(index.len(), 3);
        assert_eq!(index.position(&12583), Some(2));
    }

    #[test]
    fn test_lookup_from_map() {
        let lookup = HashMap::from([("85123A".to_owned(), "WHITE HANGING HEART".to_owned())]);

        assert_eq!(
            lookup.description(&"85123A".to_owned()),
            Some("WHITE HANGING HEART")
        );
        assert_eq!(lookup.description(&"00000".to_owned()), None);
    }
}
