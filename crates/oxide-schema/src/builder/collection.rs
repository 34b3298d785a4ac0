//! Case-insensitive, insertion-ordered name registries.

use std::collections::HashMap;

use super::{name_key, ObjectId};

/// An insertion-ordered, case-insensitive name to object map.
///
/// The collection only stores ids; kind checks happen in the database
/// when an id is resolved to a builder.
#[derive(Debug, Clone, Default)]
pub struct NamedCollection {
    keys: HashMap<String, ObjectId>,
    order: Vec<ObjectId>,
}

impl NamedCollection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id stored under `name`, ignoring case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ObjectId> {
        self.keys.get(&name_key(name)).copied()
    }

    /// Returns true if `name` is occupied, ignoring case.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.keys.contains_key(&name_key(name))
    }

    /// Inserts `id` under `name`.
    ///
    /// Returns the occupant's id if the slot is taken.
    pub fn insert(&mut self, name: &str, id: ObjectId) -> Result<(), ObjectId> {
        let key = name_key(name);
        if let Some(existing) = self.keys.get(&key) {
            return Err(*existing);
        }
        self.keys.insert(key, id);
        self.order.push(id);
        Ok(())
    }

    /// Removes the entry stored under `name`.
    pub fn remove(&mut self, name: &str) -> Option<ObjectId> {
        let id = self.keys.remove(&name_key(name))?;
        self.order.retain(|o| *o != id);
        Some(id)
    }

    /// Moves the entry stored under `old` to `new`, keeping its position.
    ///
    /// Returns the occupant's id if `new` names a different entry.
    pub fn rekey(&mut self, old: &str, new: &str) -> Result<(), ObjectId> {
        let old_key = name_key(old);
        let new_key = name_key(new);
        if old_key == new_key {
            return Ok(());
        }
        if let Some(existing) = self.keys.get(&new_key) {
            return Err(*existing);
        }
        if let Some(id) = self.keys.remove(&old_key) {
            self.keys.insert(new_key, id);
        }
        Ok(())
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.order.iter().copied()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> ObjectId {
        ObjectId::new(raw)
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let mut c = NamedCollection::new();
        c.insert("Users", id(1)).unwrap();
        assert_eq!(c.get("users"), Some(id(1)));
        assert!(c.contains("USERS"));
        assert_eq!(c.insert("users", id(2)), Err(id(1)));
    }

    #[test]
    fn test_remove_then_contains() {
        let mut c = NamedCollection::new();
        c.insert("a", id(1)).unwrap();
        c.insert("b", id(2)).unwrap();
        assert_eq!(c.remove("A"), Some(id(1)));
        assert!(!c.contains("a"));
        assert_eq!(c.ids().collect::<Vec<_>>(), vec![id(2)]);
        assert_eq!(c.remove("a"), None);
    }

    #[test]
    fn test_rekey_keeps_order() {
        let mut c = NamedCollection::new();
        c.insert("a", id(1)).unwrap();
        c.insert("b", id(2)).unwrap();
        c.rekey("a", "c").unwrap();
        assert_eq!(c.get("c"), Some(id(1)));
        assert!(!c.contains("a"));
        assert_eq!(c.ids().collect::<Vec<_>>(), vec![id(1), id(2)]);
        assert_eq!(c.rekey("c", "B"), Err(id(2)));
        // Case-only renames keep the slot.
        assert!(c.rekey("c", "C").is_ok());
    }
}
