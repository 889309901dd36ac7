use std::collections::HashSet;

use crate::{prelude::*, substitute::substitute, term::Child};

enum Search {
    /// No redex below this node.
    Clean,
    /// A redex below was contracted in place.
    Contracted,
    /// This node is a redex; holds an owned reference to its contractum.
    Replace(NodeId),
}

struct BetaReduction<'a> {
    pool: &'a mut Pool,
    clean: HashSet<NodeId>,
}

impl BetaReduction<'_> {
    fn search(&mut self, id: NodeId) -> Result<Search, OutOfMemory> {
        if self.clean.contains(&id) {
            return Ok(Search::Clean);
        }
        let found = match self.pool[id] {
            Term::Invalid | Term::Variable { .. } => Search::Clean,
            Term::Abstraction { body } => self.descend(id, Child::Body, body)?,
            Term::Application { function, operand } => {
                if let Term::Abstraction { body } = self.pool[function] {
                    log::trace!("beta: contracting {id:?}");
                    let contractum = substitute(self.pool, body, function, operand)?;
                    return Ok(Search::Replace(contractum));
                }
                match self.descend(id, Child::Function, function)? {
                    Search::Clean => self.descend(id, Child::Operand, operand)?,
                    found => found,
                }
            }
        };
        if let Search::Clean = found {
            self.clean.insert(id);
        }
        Ok(found)
    }

    fn descend(
        &mut self,
        parent: NodeId,
        child: Child,
        id: NodeId,
    ) -> Result<Search, OutOfMemory> {
        Ok(match self.search(id)? {
            Search::Replace(new) => {
                self.pool.redirect(parent, child, new);
                Search::Contracted
            }
            found => found,
        })
    }
}

/// Contracts the leftmost outermost redex, if there is one.
///
/// Takes ownership of `term` and returns the owned root, together with
/// whether a redex was found. When the contraction runs out of nodes the
/// graph is unchanged and `term` stays with the caller.
pub fn beta_step(pool: &mut Pool, term: NodeId) -> Result<(NodeId, bool), OutOfMemory> {
    let mut beta = BetaReduction {
        pool: &mut *pool,
        clean: HashSet::new(),
    };
    Ok(match beta.search(term)? {
        Search::Clean => (term, false),
        Search::Contracted => (term, true),
        Search::Replace(new) => {
            pool.release(term);
            (new, true)
        }
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{parse, pool::PoolConfig, printer::display, resolve::NoSymbols};

    fn steps(s: &str, n: usize) -> Vec<String> {
        let mut pool = Pool::new();
        let mut term = parse(&mut pool, s, &NoSymbols).unwrap();
        let mut printed = vec![];
        for _ in 0..n {
            let (next, changed) = beta_step(&mut pool, term).unwrap();
            term = next;
            if !changed {
                break;
            }
            printed.push(display(&pool, term).to_string());
        }
        pool.release(term);
        assert_eq!(pool.live(), 0);
        printed
    }

    #[test]
    fn test_identity_application() {
        assert_eq!(steps("(lambda 1) (lambda 1)", 8), vec!["lambda 1"]);
    }

    #[test]
    fn test_leftmost_outermost_order() {
        // the outer redex goes first and discards the inner one
        assert_eq!(
            steps("(lambda lambda 1) ((lambda 1 1) (lambda 1 1))", 8),
            vec!["lambda 1"]
        );
        assert_eq!(
            steps("lambda (lambda 1) ((lambda 1) 1)", 8),
            vec!["lambda (lambda 1) 1", "lambda 1"]
        );
        assert_eq!(
            steps("lambda 1 ((lambda 1) 1) ((lambda 1) 1)", 8),
            vec!["lambda 1 1 ((lambda 1) 1)", "lambda 1 1 1"]
        );
    }

    #[test]
    fn test_reduction_under_binders() {
        assert_eq!(
            steps("lambda lambda (lambda 2 1) 1", 8),
            vec!["lambda lambda 1 1"]
        );
        assert_eq!(
            steps("(lambda lambda 2 1) (lambda 1)", 8),
            vec!["lambda (lambda 1) 1", "lambda 1"]
        );
    }

    #[test]
    fn test_omega_does_not_terminate() {
        let omega = "(lambda 1 1) lambda 1 1";
        assert_eq!(steps(omega, 3), vec![omega, omega, omega]);
    }

    #[test]
    fn test_normal_form_is_untouched() {
        let mut pool = Pool::new();
        let term = parse(&mut pool, "lambda lambda 2 (1 lambda 1)", &NoSymbols).unwrap();
        let live = pool.live();
        let capacity = pool.capacity();
        assert_eq!(beta_step(&mut pool, term), Ok((term, false)));
        assert_eq!(pool.live(), live);
        assert_eq!(pool.capacity(), capacity);
        pool.release(term);
        assert_eq!(pool.live(), 0);
    }

    #[test]
    fn test_argument_is_shared_not_copied() {
        let mut pool = Pool::new();
        let term = parse(
            &mut pool,
            "(lambda lambda 1 2 2) (lambda (lambda 1) 1)",
            &NoSymbols,
        )
        .unwrap();
        let (term, changed) = beta_step(&mut pool, term).unwrap();
        assert!(changed);
        let Term::Abstraction { body } = pool[term] else {
            panic!("{:?}", pool[term]);
        };
        let Term::Application { function, operand } = pool[body] else {
            panic!("{:?}", pool[body]);
        };
        let Term::Application { operand: first, .. } = pool[function] else {
            panic!("{:?}", pool[function]);
        };
        assert_eq!(first, operand);
        assert_eq!(pool.refs(operand), 2);

        // one contraction inside the shared argument shows up at both uses
        let (term, changed) = beta_step(&mut pool, term).unwrap();
        assert!(changed);
        assert_eq!(
            display(&pool, term).to_string(),
            "lambda 1 (lambda 1) lambda 1"
        );
        assert_eq!(beta_step(&mut pool, term), Ok((term, false)));
        pool.release(term);
        assert_eq!(pool.live(), 0);
    }

    #[test]
    fn test_running_out_keeps_the_term() {
        let mut pool = Pool::with_config(PoolConfig {
            block: 16,
            max_nodes: Some(14),
        });
        // the contractum needs two fresh applications, the pool has room for one
        let term = parse(&mut pool, "(lambda 1 1 1) lambda 1 1 1", &NoSymbols).unwrap();
        assert_eq!(pool.live(), 13);
        assert_eq!(beta_step(&mut pool, term), Err(OutOfMemory));
        assert_eq!(pool.live(), 13);
        assert_eq!(display(&pool, term).to_string(), "(lambda 1 1 1) lambda 1 1 1");
        pool.release(term);
        assert_eq!(pool.live(), 0);
    }
}
