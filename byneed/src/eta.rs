use std::collections::HashMap;

use crate::{prelude::*, term::Child};

struct EtaConversion<'a> {
    pool: &'a mut Pool,
    /// What each visited node is to be replaced with in its parents, borrowed.
    converted: HashMap<NodeId, Option<NodeId>>,
    occurrences: HashMap<(NodeId, NodeId), bool>,
    dirty: bool,
}

impl EtaConversion<'_> {
    /// Whether `id` contains a variable bound by `binder`.
    fn occurs(&mut self, id: NodeId, binder: NodeId) -> bool {
        if let Some(&occurs) = self.occurrences.get(&(id, binder)) {
            return occurs;
        }
        let occurs = match self.pool[id] {
            Term::Invalid => false,
            Term::Variable { binder: b } => b == binder,
            Term::Abstraction { body } => self.occurs(body, binder),
            Term::Application { function, operand } => {
                self.occurs(function, binder) || self.occurs(operand, binder)
            }
        };
        self.occurrences.insert((id, binder), occurs);
        occurs
    }

    fn convert(&mut self, id: NodeId) -> Option<NodeId> {
        if let Some(&converted) = self.converted.get(&id) {
            return converted;
        }
        let term = self.pool[id];
        for child in [Child::Body, Child::Function, Child::Operand] {
            let Some(old) = term.child(child) else {
                continue;
            };
            if let Some(new) = self.convert(old) {
                let new = self.pool.retain(new);
                self.pool.redirect(id, child, new);
            }
        }

        let converted = match self.pool[id] {
            Term::Abstraction { body } => {
                let body = self.pool[body];
                match body {
                    Term::Application { function, operand }
                        if self.pool[operand].is_bound_by(id) && !self.occurs(function, id) =>
                    {
                        Some(function)
                    }
                    _ => None,
                }
            }
            _ => None,
        };
        if let Some(function) = converted {
            log::trace!("eta: {id:?} contracts to {function:?}");
            self.dirty = true;
        }
        self.converted.insert(id, converted);
        converted
    }
}

/// Rewrites every abstraction of the form `lambda F 1`, with `F` not
/// mentioning that abstraction, to `F`, in one bottom-up pass.
///
/// Takes ownership of `term` and returns the owned root, together with
/// whether anything was rewritten.
pub fn eta_step(pool: &mut Pool, term: NodeId) -> (NodeId, bool) {
    let mut eta = EtaConversion {
        pool: &mut *pool,
        converted: HashMap::new(),
        occurrences: HashMap::new(),
        dirty: false,
    };
    let converted = eta.convert(term);
    let dirty = eta.dirty;
    match converted {
        Some(new) => {
            let new = pool.retain(new);
            pool.release(term);
            (new, true)
        }
        None => (term, dirty),
    }
}
