//! Call-by-need normalization of untyped lambda terms.
//!
//! Terms are written with numeric binder references (`lambda lambda 2` is
//! `K`) and live as a shared graph in a [`Pool`]. Variables point straight at
//! the abstraction binding them, so substitution never renumbers anything and
//! an argument is shared by all of its uses instead of being copied.

pub mod beta;
pub mod error;
pub mod eta;
pub mod normalize;
pub mod parser;
pub mod pool;
pub mod prelude;
pub mod printer;
pub mod resolve;
pub mod substitute;
pub mod symbols;
pub mod term;

pub use crate::{
    beta::beta_step,
    error::{LexError, ParseError},
    eta::eta_step,
    normalize::{normalize, Normalized, Step, Stop, DEFAULT_MAX_STEPS},
    pool::{NodeId, OutOfMemory, Pool, PoolConfig},
    printer::display,
    resolve::{Lookup, NoSymbols},
    substitute::substitute,
    symbols::Symbols,
    term::Term,
};

/// Parses `text` into a fresh term owned by the caller. Identifiers are
/// resolved through `lookup`, and their terms are shared rather than copied.
///
/// The error is the first one in the text: a variable or name that cannot be
/// resolved wins over a syntax error further on.
pub fn parse<L: Lookup + ?Sized>(
    pool: &mut Pool,
    text: &str,
    lookup: &L,
) -> Result<NodeId, ParseError> {
    let tokens = parser::tokenize(text)?;
    let expr = parser::parse_tokens(text, &tokens).map_err(|e| match e.offset() {
        Some(limit) => resolve::unbound_before(&tokens, limit, lookup).unwrap_or(e),
        None => e,
    })?;
    resolve::resolve(pool, &expr, lookup)
}
