use thiserror::Error;

use crate::pool::OutOfMemory;

/// Why a token could not be recognised.
#[derive(Error, PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum LexError {
    #[error("Unrecognised token.")]
    Unrecognised,
    #[error("Stack too deep (variable index > 65536).")]
    StackTooDeep,
    #[error("Bound variable cannot be 0.")]
    Zero,
}

#[derive(Error, PartialEq, Eq, Clone, Debug)]
pub enum ParseError {
    #[error("{error}")]
    Lex { error: LexError, offset: usize },
    #[error("(Sub)expression is empty.")]
    Empty { offset: usize },
    #[error("Unexpected {found}. Expecting {expected}.")]
    Unexpected {
        found: String,
        expected: String,
        offset: usize,
    },
    #[error("Cannot find the specified named expression `{name}`.")]
    UnknownIdentifier { name: String, offset: usize },
    #[error("Stack overflow. Free variable is not supported.")]
    FreeVariable { index: u32, offset: usize },
    #[error("Internal parser error: {0}")]
    Internal(String),
    #[error(transparent)]
    OutOfMemory(#[from] OutOfMemory),
}

impl ParseError {
    /// Character offset of the offending token in the source, if the error
    /// points at one.
    pub fn offset(&self) -> Option<usize> {
        match self {
            ParseError::Lex { offset, .. }
            | ParseError::Empty { offset }
            | ParseError::Unexpected { offset, .. }
            | ParseError::UnknownIdentifier { offset, .. }
            | ParseError::FreeVariable { offset, .. } => Some(*offset),
            ParseError::Internal(_) | ParseError::OutOfMemory(_) => None,
        }
    }
}
