use std::rc::Rc;

pub type Identifier = Rc<String>;

pub type Span = std::ops::Range<usize>;

/// A value with the character range of the source it came from.
#[derive(Clone, derive_more::Display, Debug)]
#[display(bound = "T: std::fmt::Display")]
#[display(fmt = "{value}")]
pub struct Spanned<T> {
    pub span: Span,
    pub value: T,
}
impl<T> Spanned<T> {
    pub fn new(value: T, span: Span) -> Self {
        Self { span, value }
    }
    pub fn forget_span(self) -> T {
        self.value
    }
    pub fn value(&self) -> &T {
        &self.value
    }
    pub fn span(&self) -> Span {
        self.span.clone()
    }
}
impl<T> From<Spanned<T>> for (T, Span) {
    fn from(Spanned { span, value }: Spanned<T>) -> Self {
        (value, span)
    }
}

pub use crate::error::{LexError, ParseError};
pub use crate::pool::{NodeId, OutOfMemory, Pool};
pub use crate::term::Term;
