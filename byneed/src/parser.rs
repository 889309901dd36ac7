use std::rc::Rc;

use chumsky::{error::SimpleReason, prelude::*, Stream};

use crate::prelude::*;

pub trait SimpleParser<I: Clone + std::hash::Hash, O>: Parser<I, O, Error = Simple<I>> {}
impl<I: Clone + std::hash::Hash, O, T> SimpleParser<I, O> for T where
    T: Parser<I, O, Error = Simple<I>>
{
}

/// Largest accepted variable index.
pub const MAX_INDEX: u32 = 65536;

const SYMBOLS: &str = "~!$%^&*-+=|\\/<>?_";

#[derive(PartialEq, Eq, Hash, Clone, derive_more::Display, Debug)]
pub enum Token {
    #[display(fmt = "(")]
    LParen,
    #[display(fmt = ")")]
    RParen,
    /// Either `.` or the word `lambda`.
    #[display(fmt = "lambda")]
    Lambda,
    #[display(fmt = "{_0}")]
    Ident(Identifier),
    #[display(fmt = "{_0}")]
    Index(u32),
    #[display(fmt = "{_0}")]
    Invalid(LexError),
}

fn is_ident_start(c: &char) -> bool {
    c.is_ascii_alphabetic() || SYMBOLS.contains(*c)
}

fn is_ident_continue(c: &char) -> bool {
    c.is_ascii_digit() || is_ident_start(c)
}

fn numeral(digits: &str) -> Token {
    let mut value = 0;
    for digit in digits.chars().filter_map(|c| c.to_digit(10)) {
        value = value * 10 + digit;
        if value > MAX_INDEX {
            return Token::Invalid(LexError::StackTooDeep);
        }
    }
    if value == 0 {
        Token::Invalid(LexError::Zero)
    } else {
        Token::Index(value)
    }
}

/// Total lexer: anything that is not a token comes out as [`Token::Invalid`],
/// which the grammar then refuses at its position.
pub fn lexer() -> impl SimpleParser<char, Vec<Spanned<Token>>> {
    let identifier = filter(is_ident_start)
        .chain(filter(is_ident_continue).repeated())
        .collect::<String>()
        .map(|name| {
            if name == "lambda" {
                Token::Lambda
            } else {
                Token::Ident(Identifier::new(name))
            }
        });
    let index = filter(char::is_ascii_digit)
        .repeated()
        .at_least(1)
        .collect::<String>()
        .map(|digits| numeral(&digits));
    let token = choice((
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        just('.').to(Token::Lambda),
        index,
        identifier,
        any().to(Token::Invalid(LexError::Unrecognised)),
    ));
    token
        .map_with_span(Spanned::new)
        .padded()
        .repeated()
        .padded()
        .then_ignore(end())
}

/// Surface syntax, before variables are bound to abstractions.
#[derive(Clone, Debug)]
pub enum Expr {
    /// Nothing where a term was required, e.g. `()`.
    Empty,
    Ident(Identifier),
    Index(u32),
    Abs(Rc<Spanned<Expr>>),
    App(Rc<Spanned<Expr>>, Rc<Spanned<Expr>>),
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Empty => f.write_str("()"),
            Expr::Ident(name) => f.write_str(name),
            Expr::Index(index) => f.write_fmt(format_args!("{index}")),
            Expr::Abs(body) => f.write_fmt(format_args!("(lambda {body})")),
            Expr::App(lhs, rhs) => f.write_fmt(format_args!("({lhs} {rhs})")),
        }
    }
}

/// ```text
/// Term    ::= AppTerm* Abs | AppTerm+
/// Abs     ::= lambda Term
/// AppTerm ::= ident | index | ( Term )
/// ```
///
/// An empty `Term` parses as [`Expr::Empty`] and is rejected by the resolver,
/// so the grammar itself never backtracks.
pub fn term_parser() -> impl SimpleParser<Token, Spanned<Expr>> {
    recursive(|term: Recursive<_, Spanned<Expr>, _>| {
        let atom = choice((
            select! {
                Token::Ident(name) => Expr::Ident(name),
                Token::Index(index) => Expr::Index(index),
            },
            term.clone()
                .map(Spanned::forget_span)
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        ))
        .map_with_span(Spanned::new)
        .labelled("application term");

        let abs = just(Token::Lambda)
            .ignore_then(term)
            .map(|body| Expr::Abs(body.into()))
            .map_with_span(Spanned::new)
            .labelled("abstraction");

        atom.repeated()
            .then(abs.or_not())
            .map_with_span(|(atoms, abs), span| {
                atoms
                    .into_iter()
                    .chain(abs)
                    .reduce(|lhs, rhs| {
                        let span = lhs.span.start..rhs.span.end;
                        Spanned::new(Expr::App(lhs.into(), rhs.into()), span)
                    })
                    .unwrap_or(Spanned::new(Expr::Empty, span))
            })
    })
    .then_ignore(end())
}

fn syntax_error(e: Simple<Token>) -> ParseError {
    let offset = e.span().start;
    match (e.reason(), e.found()) {
        (SimpleReason::Custom(msg), _) => ParseError::Internal(msg.clone()),
        (_, Some(Token::Invalid(error))) => ParseError::Lex {
            error: *error,
            offset,
        },
        (_, found) => {
            let found = found
                .map(|t| format!("`{t}`"))
                .unwrap_or_else(|| "end of input".to_string());
            let mut expected = e
                .expected()
                .map(|t| {
                    t.as_ref()
                        .map(|t| format!("`{t}`"))
                        .unwrap_or_else(|| "end of input".to_string())
                })
                .collect::<Vec<_>>();
            expected.sort();
            expected.dedup();
            let expected = if expected.is_empty() {
                "something else".to_string()
            } else {
                expected.join(", ")
            };
            ParseError::Unexpected {
                found,
                expected,
                offset,
            }
        }
    }
}

fn unexpected(found: &str, expected: &str, offset: usize) -> ParseError {
    ParseError::Unexpected {
        found: found.to_string(),
        expected: expected.to_string(),
        offset,
    }
}

fn mark(filled: &mut [bool], value: bool) {
    if let Some(last) = filled.last_mut() {
        *last = value;
    }
}

/// Finds the first syntax error by reading `tokens` left to right with one
/// token of lookahead. The grammar only tells that the input is wrong, this
/// tells where such a reading has to stop.
fn first_syntax_error(tokens: &[Spanned<Token>], eoi: usize, e: Simple<Token>) -> ParseError {
    // whether the term being read has anything in it yet, per open parenthesis
    // and the top level
    let mut filled = vec![false];
    for token in tokens {
        let offset = token.span.start;
        let empty = filled.last() == Some(&false);
        match token.value() {
            Token::Invalid(error) => {
                return ParseError::Lex {
                    error: *error,
                    offset,
                }
            }
            Token::RParen if empty => return ParseError::Empty { offset },
            Token::RParen if filled.len() == 1 => {
                return unexpected("`)`", "end of input", offset)
            }
            Token::RParen => {
                filled.pop();
            }
            Token::LParen => {
                mark(&mut filled, true);
                filled.push(false);
            }
            Token::Lambda => mark(&mut filled, false),
            Token::Ident(_) | Token::Index(_) => mark(&mut filled, true),
        }
    }
    match filled.as_slice() {
        [.., false] => ParseError::Empty { offset: eoi },
        [_, _, ..] => unexpected("end of input", "`)`", eoi),
        _ => syntax_error(e),
    }
}

pub fn tokenize(s: &str) -> Result<Vec<Spanned<Token>>, ParseError> {
    lexer().parse(s).map_err(|es| {
        ParseError::Internal(format!(
            "lexer rejected its input: {:?}",
            es.into_iter().next()
        ))
    })
}

/// Parses already lexed input. `s` is only used to place the end of input.
pub fn parse_tokens(s: &str, tokens: &[Spanned<Token>]) -> Result<Spanned<Expr>, ParseError> {
    let len = s.chars().count();
    let eoi = len..len + 1;
    term_parser()
        .parse(Stream::from_iter(eoi, tokens.iter().cloned().map(Into::into)))
        .map_err(|es| match es.into_iter().next() {
            Some(e) => first_syntax_error(tokens, len, e),
            None => ParseError::Internal("parser failed without an error".to_string()),
        })
}

pub fn parse(s: &str) -> Result<Spanned<Expr>, ParseError> {
    parse_tokens(s, &tokenize(s)?)
}
