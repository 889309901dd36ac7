//! Substitution that keeps the graph shared.
//!
//! Only the part of `body` that depends on the substituted binder is rebuilt:
//! variables of that binder, and every abstraction whose body mentions it or
//! mentions an abstraction that had to be rebuilt itself. Everything else is
//! reused as is, and so is the replacement, which ends up shared by every
//! occurrence instead of being copied.

use std::collections::HashMap;

use rpds::HashTrieSet;

use crate::prelude::*;

struct Substitution<'a> {
    pool: &'a mut Pool,
    binder: NodeId,
    replacement: NodeId,
    /// Abstractions a node refers to without containing them.
    free: HashMap<NodeId, HashTrieSet<NodeId>>,
    /// Rebuilt abstraction to its copy.
    clones: HashMap<NodeId, NodeId>,
    /// Owns one reference to every value.
    rebuilt: HashMap<NodeId, NodeId>,
}

impl Substitution<'_> {
    fn free_binders(&mut self, id: NodeId) -> HashTrieSet<NodeId> {
        if let Some(free) = self.free.get(&id) {
            return free.clone();
        }
        let free = match self.pool[id] {
            Term::Invalid => HashTrieSet::new(),
            Term::Variable { binder } => HashTrieSet::new().insert(binder),
            Term::Abstraction { body } => self.free_binders(body).remove(&id),
            Term::Application { function, operand } => {
                let lhs = self.free_binders(function);
                let rhs = self.free_binders(operand);
                let (small, large) = if lhs.size() < rhs.size() {
                    (lhs, rhs)
                } else {
                    (rhs, lhs)
                };
                small.iter().fold(large, |set, binder| set.insert(*binder))
            }
        };
        self.free.insert(id, free.clone());
        free
    }

    fn depends(&mut self, id: NodeId) -> bool {
        self.free_binders(id)
            .iter()
            .any(|binder| *binder == self.binder || self.clones.contains_key(binder))
    }

    /// Returns an owned reference to the rewritten `id`. On failure every node
    /// allocated for it has been released again.
    fn rebuild(&mut self, id: NodeId) -> Result<NodeId, OutOfMemory> {
        if !self.depends(id) {
            return Ok(self.pool.retain(id));
        }
        if let Some(&done) = self.rebuilt.get(&id) {
            return Ok(self.pool.retain(done));
        }
        let result = match self.pool[id] {
            Term::Variable { binder } if binder == self.binder => {
                self.pool.retain(self.replacement)
            }
            Term::Variable { binder } => match self.clones.get(&binder) {
                Some(&clone) => self.pool.try_allocate(Term::Variable { binder: clone })?,
                None => unreachable!("{id:?} depends on nothing being rebuilt"),
            },
            Term::Abstraction { body } => {
                let clone = self.pool.try_allocate(Term::Invalid)?;
                self.clones.insert(id, clone);
                match self.rebuild(body) {
                    Ok(body) => self.pool.set(clone, Term::Abstraction { body }),
                    Err(e) => {
                        self.pool.release(clone);
                        return Err(e);
                    }
                };
                clone
            }
            Term::Application { function, operand } => {
                let function = self.rebuild(function)?;
                let operand = match self.rebuild(operand) {
                    Ok(operand) => operand,
                    Err(e) => {
                        self.pool.release(function);
                        return Err(e);
                    }
                };
                self.pool
                    .try_allocate(Term::Application { function, operand })
                    .map_err(|e| {
                        self.pool.release(function);
                        self.pool.release(operand);
                        e
                    })?
            }
            Term::Invalid => unreachable!("placeholder {id:?} inside a complete term"),
        };
        let memo = self.pool.retain(result);
        self.rebuilt.insert(id, memo);
        Ok(result)
    }
}

/// Replaces every variable bound by `binder` in `body` with `replacement`.
///
/// Borrows all three arguments and returns an owned reference. When `body`
/// does not mention `binder` the result is `body` itself and nothing is
/// allocated. When the pool runs out the graph is left as it was.
pub fn substitute(
    pool: &mut Pool,
    body: NodeId,
    binder: NodeId,
    replacement: NodeId,
) -> Result<NodeId, OutOfMemory> {
    let mut substitution = Substitution {
        pool,
        binder,
        replacement,
        free: HashMap::new(),
        clones: HashMap::new(),
        rebuilt: HashMap::new(),
    };
    let result = substitution.rebuild(body);
    let Substitution {
        pool,
        clones,
        rebuilt,
        ..
    } = substitution;
    log::trace!(
        "substitution rebuilt {} nodes, {} of them abstractions",
        rebuilt.len(),
        clones.len()
    );
    for (_, memo) in rebuilt {
        pool.release(memo);
    }
    result
}
