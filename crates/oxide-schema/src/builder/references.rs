//! Back-reference sets kept by referenced objects.

use std::collections::BTreeMap;

use super::{ObjectId, ObjectKind};

/// Back-references held by a referenced object.
///
/// Most objects are never referenced, so the map is only allocated on
/// the first insertion and released again when the last referencer
/// leaves. Entries are ordered by id, which keeps error listings and
/// cascades deterministic.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    entries: Option<Box<BTreeMap<ObjectId, ObjectKind>>>,
}

impl ReferenceSet {
    /// Creates an empty, unallocated set.
    #[must_use]
    pub const fn new() -> Self {
        Self { entries: None }
    }

    /// Records `id` as a referencer.
    pub fn add(&mut self, id: ObjectId, kind: ObjectKind) {
        self.entries
            .get_or_insert_with(Default::default)
            .insert(id, kind);
    }

    /// Forgets `id`; returns true if it was present.
    pub fn remove(&mut self, id: ObjectId) -> bool {
        let Some(entries) = self.entries.as_mut() else {
            return false;
        };
        let removed = entries.remove(&id).is_some();
        if entries.is_empty() {
            self.entries = None;
        }
        removed
    }

    /// Returns true if `id` references the owner.
    #[must_use]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.entries.as_ref().is_some_and(|e| e.contains_key(&id))
    }

    /// Returns true if nothing references the owner.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_none()
    }

    /// Number of referencers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |e| e.len())
    }

    /// Referencers in id order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, ObjectKind)> + '_ {
        self.entries
            .iter()
            .flat_map(|e| e.iter().map(|(id, kind)| (*id, *kind)))
    }

    /// Referencer ids in id order.
    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.iter().map(|(id, _)| id)
    }

    pub(crate) fn is_allocated(&self) -> bool {
        self.entries.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lazy_allocation() {
        let mut refs = ReferenceSet::new();
        assert!(!refs.is_allocated());
        assert!(!refs.remove(ObjectId::new(1)));

        refs.add(ObjectId::new(2), ObjectKind::View);
        refs.add(ObjectId::new(1), ObjectKind::Index);
        assert!(refs.is_allocated());
        assert_eq!(refs.len(), 2);
        assert_eq!(
            refs.iter().collect::<Vec<_>>(),
            vec![
                (ObjectId::new(1), ObjectKind::Index),
                (ObjectId::new(2), ObjectKind::View)
            ]
        );

        assert!(refs.remove(ObjectId::new(1)));
        assert!(refs.remove(ObjectId::new(2)));
        assert!(refs.is_empty());
        assert!(!refs.is_allocated());
    }
}
