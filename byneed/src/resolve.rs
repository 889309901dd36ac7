use rpds::Stack;

use crate::{
    parser::{Expr, Token},
    prelude::*,
};

/// Source of named terms that identifiers in the input refer to.
///
/// The returned handle is borrowed: the resolver retains it for each use.
pub trait Lookup {
    fn lookup(&self, name: &str) -> Option<NodeId>;
}

/// A lookup in which no name is defined.
pub struct NoSymbols;

impl Lookup for NoSymbols {
    fn lookup(&self, _name: &str) -> Option<NodeId> {
        None
    }
}

impl<F: Fn(&str) -> Option<NodeId>> Lookup for F {
    fn lookup(&self, name: &str) -> Option<NodeId> {
        self(name)
    }
}

struct Resolver<'a, L: ?Sized> {
    pool: &'a mut Pool,
    lookup: &'a L,
}

impl<'a, L: Lookup + ?Sized> Resolver<'a, L> {
    /// `binders` holds the enclosing abstractions, innermost on top.
    fn resolve(
        &mut self,
        expr: &Spanned<Expr>,
        binders: &Stack<NodeId>,
    ) -> Result<NodeId, ParseError> {
        let offset = expr.span.start;
        match expr.value() {
            Expr::Empty => Err(ParseError::Empty { offset }),
            Expr::Ident(name) => match self.lookup.lookup(name) {
                Some(term) => Ok(self.pool.retain(term)),
                None => Err(ParseError::UnknownIdentifier {
                    name: name.to_string(),
                    offset,
                }),
            },
            Expr::Index(index) => {
                let binder = (*index as usize)
                    .checked_sub(1)
                    .and_then(|k| binders.iter().nth(k))
                    .copied()
                    .ok_or(ParseError::FreeVariable {
                        index: *index,
                        offset,
                    })?;
                Ok(self.pool.try_allocate(Term::Variable { binder })?)
            }
            Expr::Abs(body) => {
                let abstraction = self.pool.try_allocate(Term::Invalid)?;
                match self.resolve(body, &binders.push(abstraction)) {
                    Ok(body) => {
                        self.pool.set(abstraction, Term::Abstraction { body });
                        Ok(abstraction)
                    }
                    Err(e) => {
                        self.pool.release(abstraction);
                        Err(e)
                    }
                }
            }
            Expr::App(lhs, rhs) => {
                let function = self.resolve(lhs, binders)?;
                let operand = match self.resolve(rhs, binders) {
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
                        e.into()
                    })
            }
        }
    }
}

/// Builds the term graph for `expr`. On failure every node allocated on the
/// way is released again.
pub fn resolve<L: Lookup + ?Sized>(
    pool: &mut Pool,
    expr: &Spanned<Expr>,
    lookup: &L,
) -> Result<NodeId, ParseError> {
    Resolver { pool, lookup }.resolve(expr, &Stack::new())
}

/// The first variable or identifier among `tokens` before `limit` that
/// cannot be resolved.
///
/// Meant for input that fails to parse at `limit`. An abstraction reaches up
/// to the parenthesis closing around it, so the binders in scope at a token
/// are the `lambda`s before it at its own level and every enclosing one.
pub fn unbound_before<L: Lookup + ?Sized>(
    tokens: &[Spanned<Token>],
    limit: usize,
    lookup: &L,
) -> Option<ParseError> {
    let mut binders = vec![0usize];
    for token in tokens.iter().take_while(|t| t.span.start < limit) {
        let offset = token.span.start;
        match token.value() {
            Token::LParen => binders.push(0),
            Token::RParen if binders.len() > 1 => {
                binders.pop();
            }
            Token::Lambda => {
                if let Some(level) = binders.last_mut() {
                    *level += 1;
                }
            }
            Token::Ident(name) if lookup.lookup(name).is_none() => {
                return Some(ParseError::UnknownIdentifier {
                    name: name.to_string(),
                    offset,
                })
            }
            Token::Index(index) if *index as usize > binders.iter().sum::<usize>() => {
                return Some(ParseError::FreeVariable {
                    index: *index,
                    offset,
                })
            }
            Token::RParen | Token::Ident(_) | Token::Index(_) | Token::Invalid(_) => {}
        }
    }
    None
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;
    use crate::{parser, printer};

    fn build(pool: &mut Pool, s: &str, lookup: &impl Lookup) -> Result<NodeId, ParseError> {
        resolve(pool, &parser::parse(s)?, lookup)
    }

    #[test]
    fn test_variables_point_at_binders() {
        let mut pool = Pool::new();
        let k = build(&mut pool, "lambda lambda 2", &NoSymbols).unwrap();
        let Term::Abstraction { body: inner } = pool[k] else {
            panic!("{:?}", pool[k]);
        };
        let Term::Abstraction { body: var } = pool[inner] else {
            panic!("{:?}", pool[inner]);
        };
        assert_eq!(pool[var], Term::Variable { binder: k });
        assert_eq!(printer::display(&pool, k).to_string(), "lambda lambda 2");
        pool.release(k);
        assert_eq!(pool.live(), 0);
    }

    #[test]
    fn test_application_of_abstractions() {
        let mut pool = Pool::new();
        let term = build(&mut pool, "(lambda 1) (lambda 1)", &NoSymbols).unwrap();
        let Term::Application { function, operand } = pool[term] else {
            panic!("{:?}", pool[term]);
        };
        for abs in [function, operand] {
            let Term::Abstraction { body } = pool[abs] else {
                panic!("{:?}", pool[abs]);
            };
            assert!(pool[body].is_bound_by(abs));
        }
        assert_ne!(function, operand);
        pool.release(term);
        assert_eq!(pool.live(), 0);
    }

    #[test]
    fn test_free_variable() {
        let mut pool = Pool::new();
        assert_eq!(
            build(&mut pool, "lambda (1 2)", &NoSymbols),
            Err(ParseError::FreeVariable {
                index: 2,
                offset: 10
            })
        );
        assert_eq!(
            build(&mut pool, "1", &NoSymbols),
            Err(ParseError::FreeVariable {
                index: 1,
                offset: 0
            })
        );
        assert_eq!(pool.live(), 0);
    }

    #[test]
    fn test_empty_subexpression() {
        let mut pool = Pool::new();
        assert!(matches!(
            build(&mut pool, "", &NoSymbols),
            Err(ParseError::Empty { .. })
        ));
        assert_eq!(
            build(&mut pool, "lambda 1 ()", &NoSymbols),
            Err(ParseError::Empty { offset: 9 })
        );
        assert_eq!(
            build(&mut pool, "lambda", &NoSymbols).map_err(|e| e.to_string()),
            Err("(Sub)expression is empty.".to_string())
        );
        assert_eq!(pool.live(), 0);
    }

    #[test]
    fn test_lookup_shares_named_terms() {
        let mut pool = Pool::new();
        let id = build(&mut pool, "lambda 1", &NoSymbols).unwrap();
        let mut symbols = HashMap::new();
        symbols.insert("I".to_string(), id);

        let symbols = |name: &str| symbols.get(name).copied();

        let term = build(&mut pool, "I I", &symbols).unwrap();
        assert_eq!(
            pool[term],
            Term::Application {
                function: id,
                operand: id
            }
        );
        assert_eq!(pool.refs(id), 3);
        assert_eq!(
            build(&mut pool, "lambda I J", &symbols),
            Err(ParseError::UnknownIdentifier {
                name: "J".to_string(),
                offset: 9
            })
        );
        assert_eq!(pool.refs(id), 3);

        pool.release(term);
        pool.release(id);
        assert_eq!(pool.live(), 0);
    }

    #[test]
    fn test_closure_lookup() {
        let mut pool = Pool::new();
        let id = build(&mut pool, "lambda 1", &NoSymbols).unwrap();
        let lookup = |name: &str| (name == "id").then_some(id);
        let term = build(&mut pool, "lambda id 1", &lookup).unwrap();
        assert_eq!(printer::display(&pool, term).to_string(), "lambda (lambda 1) 1");
        pool.release(term);
        pool.release(id);
        assert_eq!(pool.live(), 0);
    }
}
