use std::collections::HashMap;

use crate::{prelude::*, resolve::Lookup};

/// Named terms, each holding one reference into the pool.
#[derive(Default, Debug)]
pub struct Symbols {
    entries: HashMap<String, NodeId>,
}

impl Symbols {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `term`, taking over the caller's reference. A previous
    /// definition is released.
    pub fn define(&mut self, pool: &mut Pool, name: impl Into<String>, term: NodeId) {
        if let Some(old) = self.entries.insert(name.into(), term) {
            pool.release(old);
        }
    }

    /// Borrowed handle of the term named `name`.
    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.entries.get(name).copied()
    }

    /// Takes the term out of the table, handing its reference to the caller.
    pub fn take(&mut self, name: &str) -> Option<NodeId> {
        self.entries.remove(name)
    }

    pub fn remove(&mut self, pool: &mut Pool, name: &str) -> bool {
        match self.entries.remove(name) {
            Some(term) => {
                pool.release(term);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self, pool: &mut Pool) {
        for (_, term) in self.entries.drain() {
            pool.release(term);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names = self.entries.keys().map(String::as_str).collect::<Vec<_>>();
        names.sort_unstable();
        names
    }
}

impl Lookup for Symbols {
    fn lookup(&self, name: &str) -> Option<NodeId> {
        self.get(name)
    }
}
