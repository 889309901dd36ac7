use std::{collections::HashMap, fmt};

use crate::prelude::*;

/// Renders a term in surface syntax that parses back to the same shape.
pub struct Display<'a> {
    pool: &'a Pool,
    term: NodeId,
}

pub fn display(pool: &Pool, term: NodeId) -> Display<'_> {
    Display { pool, term }
}

struct Printer<'a, 'f, 'w> {
    pool: &'a Pool,
    f: &'f mut fmt::Formatter<'w>,
    /// Level of every abstraction on the current path, outermost is 1.
    levels: HashMap<NodeId, usize>,
}

impl Printer<'_, '_, '_> {
    /// `last` is set when nothing follows the term up to the next closing
    /// paren, so a trailing abstraction can go without parens.
    fn write(&mut self, id: NodeId, depth: usize, last: bool) -> fmt::Result {
        match self.pool[id] {
            Term::Invalid => self.f.write_str("[invalid]"),
            Term::Variable { binder } => match self.levels.get(&binder) {
                Some(level) => write!(self.f, "{}", depth + 1 - level),
                None => self.f.write_str("[free]"),
            },
            Term::Abstraction { body } => {
                if !last {
                    self.f.write_str("(")?;
                }
                self.f.write_str("lambda ")?;
                self.levels.insert(id, depth + 1);
                self.write(body, depth + 1, true)?;
                self.levels.remove(&id);
                if !last {
                    self.f.write_str(")")?;
                }
                Ok(())
            }
            Term::Application { function, operand } => {
                self.write(function, depth, false)?;
                self.f.write_str(" ")?;
                if matches!(self.pool[operand], Term::Application { .. }) {
                    self.f.write_str("(")?;
                    self.write(operand, depth, true)?;
                    self.f.write_str(")")
                } else {
                    self.write(operand, depth, last)
                }
            }
        }
    }
}

impl fmt::Display for Display<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Printer {
            pool: self.pool,
            f,
            levels: HashMap::new(),
        }
        .write(self.term, 0, true)
    }
}
