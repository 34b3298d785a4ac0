//! Ordering of renames inside one namespace.
//!
//! A batch of renames cannot always run in declaration order: swapping
//! `a` and `b` collides on the first statement. The resolver runs each
//! rename as soon as its target is free. When the target is held by
//! another entry that is still waiting, that entry runs first; when the
//! wait would be circular, the occupant is parked under a disposable
//! name and finished later.

use std::collections::{HashMap, HashSet};

use crate::builder::name_key;
use crate::error::{Result, SchemaError};

/// One rename to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRename {
    /// Name before the batch.
    pub from: String,
    /// Name after the batch.
    pub to: String,
}

impl PendingRename {
    /// Creates a pending rename.
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// One executable rename statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameStep {
    /// Current name.
    pub from: String,
    /// New name.
    pub to: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Pending,
    Completed,
}

/// Orders renames so that no statement collides with a live name.
#[derive(Debug)]
pub struct RenameResolver {
    temp_prefix: String,
    current: Vec<String>,
    targets: Vec<String>,
    status: Vec<Status>,
    /// Lowercased live name -> entry currently holding it.
    holders: HashMap<String, usize>,
    /// Lowercased live names of entries that are not renamed.
    fixed: HashSet<String>,
    steps: Vec<RenameStep>,
}

impl RenameResolver {
    /// Creates a resolver for `renames` in a namespace that also holds
    /// the untouched names in `fixed`.
    pub fn new<I, S>(renames: Vec<PendingRename>, fixed: I, temp_prefix: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let holders = renames
            .iter()
            .enumerate()
            .map(|(i, r)| (name_key(&r.from), i))
            .collect();
        let status = vec![Status::Pending; renames.len()];
        let (current, targets) = renames.into_iter().map(|r| (r.from, r.to)).unzip();
        Self {
            temp_prefix: temp_prefix.to_string(),
            current,
            targets,
            status,
            holders,
            fixed: fixed.into_iter().map(|n| name_key(n.as_ref())).collect(),
            steps: Vec::new(),
        }
    }

    /// Produces the rename statements in execution order.
    pub fn resolve(mut self) -> Result<Vec<RenameStep>> {
        for start in 0..self.current.len() {
            if self.status[start] == Status::Completed {
                continue;
            }
            let mut stack = vec![start];
            while let Some(&top) = stack.last() {
                let target = name_key(&self.targets[top]);
                if target == name_key(&self.current[top]) {
                    self.complete(top);
                    stack.pop();
                    continue;
                }
                if self.fixed.contains(&target) {
                    return Err(SchemaError::InvalidOperation(format!(
                        "cannot rename '{}' to '{}': the name is taken",
                        self.current[top], self.targets[top]
                    )));
                }
                match self.holders.get(&target).copied() {
                    None => {
                        self.complete(top);
                        stack.pop();
                    }
                    Some(occupant) if stack.contains(&occupant) => self.park(occupant),
                    Some(occupant) => stack.push(occupant),
                }
            }
        }
        Ok(self.steps)
    }

    fn complete(&mut self, entry: usize) {
        let to = self.targets[entry].clone();
        self.move_entry(entry, to);
        self.status[entry] = Status::Completed;
    }

    /// Moves `entry` out of the way under a disposable name.
    fn park(&mut self, entry: usize) {
        let base = format!("{}{}", self.temp_prefix, self.targets[entry]);
        let mut candidate = base.clone();
        let mut counter = 0;
        while self.is_taken(&candidate) {
            counter += 1;
            candidate = format!("{base}_{counter}");
        }
        self.move_entry(entry, candidate);
    }

    fn is_taken(&self, name: &str) -> bool {
        let key = name_key(name);
        self.fixed.contains(&key)
            || self.holders.contains_key(&key)
            || self.targets.iter().any(|t| name_key(t) == key)
    }

    fn move_entry(&mut self, entry: usize, to: String) {
        let from = std::mem::replace(&mut self.current[entry], to.clone());
        self.holders.remove(&name_key(&from));
        self.holders.insert(name_key(&to), entry);
        self.steps.push(RenameStep { from, to });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(renames: &[(&str, &str)], fixed: &[&str]) -> Vec<(String, String)> {
        let pending = renames
            .iter()
            .map(|(from, to)| PendingRename::new(*from, *to))
            .collect();
        RenameResolver::new(pending, fixed.iter().copied(), "__rename__")
            .resolve()
            .unwrap()
            .into_iter()
            .map(|s| (s.from, s.to))
            .collect()
    }

    fn pair(from: &str, to: &str) -> (String, String) {
        (from.to_string(), to.to_string())
    }

    #[test]
    fn test_independent_renames_keep_order() {
        assert_eq!(
            steps(&[("a", "x"), ("b", "y")], &["c"]),
            vec![pair("a", "x"), pair("b", "y")]
        );
    }

    #[test]
    fn test_chain_runs_blocker_first() {
        assert_eq!(
            steps(&[("a", "b"), ("b", "c")], &[]),
            vec![pair("b", "c"), pair("a", "b")]
        );
    }

    #[test]
    fn test_swap_parks_one_side() {
        assert_eq!(
            steps(&[("a", "b"), ("b", "a")], &[]),
            vec![
                pair("a", "__rename__b"),
                pair("b", "a"),
                pair("__rename__b", "b")
            ]
        );
    }

    #[test]
    fn test_rotation_of_three() {
        let result = steps(&[("a", "b"), ("b", "c"), ("c", "a")], &[]);
        assert_eq!(result.len(), 4);
        // Replaying the steps yields the requested assignment.
        let mut names = vec![String::from("a"), String::from("b"), String::from("c")];
        for (from, to) in &result {
            let slot = names.iter().position(|n| n == from).unwrap();
            assert!(!names.contains(to));
            names[slot] = to.clone();
        }
        assert_eq!(names, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_case_only_rename() {
        assert_eq!(steps(&[("name", "Name")], &[]), vec![pair("name", "Name")]);
    }

    #[test]
    fn test_parked_name_avoids_collisions() {
        let result = steps(&[("a", "b"), ("b", "a")], &["__rename__b"]);
        assert_eq!(result[0], pair("a", "__rename__b_1"));
    }

    #[test]
    fn test_fixed_target_is_rejected() {
        let pending = vec![PendingRename::new("a", "b")];
        assert!(RenameResolver::new(pending, ["b"], "__rename__")
            .resolve()
            .is_err());
    }
}
