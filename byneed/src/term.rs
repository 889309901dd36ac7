use crate::pool::NodeId;

/// A node of the term graph.
///
/// `Variable` refers to the abstraction binding it without owning it; the
/// other edges are strong and counted by the [`Pool`](crate::pool::Pool).
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Term {
    /// Placeholder for an abstraction whose body is not built yet.
    Invalid,
    /// `k`, bound by `binder`
    Variable { binder: NodeId },
    /// `lambda body`
    Abstraction { body: NodeId },
    /// `function operand`
    Application { function: NodeId, operand: NodeId },
}

/// An owning edge of a node, used to rewrite a parent in place.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Child {
    Body,
    Function,
    Operand,
}

impl Term {
    /// Strong edges only; the variable's binder is never part of this.
    pub fn owned(&self) -> impl Iterator<Item = NodeId> {
        let edges = match *self {
            Term::Invalid | Term::Variable { .. } => [None, None],
            Term::Abstraction { body } => [Some(body), None],
            Term::Application { function, operand } => [Some(function), Some(operand)],
        };
        edges.into_iter().flatten()
    }

    pub fn child(&self, child: Child) -> Option<NodeId> {
        match (*self, child) {
            (Term::Abstraction { body }, Child::Body) => Some(body),
            (Term::Application { function, .. }, Child::Function) => Some(function),
            (Term::Application { operand, .. }, Child::Operand) => Some(operand),
            _ => None,
        }
    }

    /// Returns the term with `child` pointed at `id`, or `None` if this kind
    /// has no such edge.
    pub fn with_child(self, child: Child, id: NodeId) -> Option<Term> {
        match (self, child) {
            (Term::Abstraction { .. }, Child::Body) => Some(Term::Abstraction { body: id }),
            (Term::Application { operand, .. }, Child::Function) => Some(Term::Application {
                function: id,
                operand,
            }),
            (Term::Application { function, .. }, Child::Operand) => Some(Term::Application {
                function,
                operand: id,
            }),
            _ => None,
        }
    }

    pub fn is_bound_by(&self, abstraction: NodeId) -> bool {
        matches!(self, Term::Variable { binder } if *binder == abstraction)
    }
}
