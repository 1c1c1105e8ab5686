use crate::node::NodeKind;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// What a caller needed when a node of the wrong kind showed up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    Boolean,
    Literal,
    Number,
    Text,
    Block,
    Function,
    NumberOrBlank,
    TextOrBlank,
}

impl std::fmt::Display for Expected {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            Expected::Boolean => "boolean",
            Expected::Literal => "literal",
            Expected::Number => "number",
            Expected::Text => "text",
            Expected::Block => "block",
            Expected::Function => "function",
            Expected::NumberOrBlank => "number-or-blank",
            Expected::TextOrBlank => "text-or-blank",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("expected {expected}, found {found}")]
    TypeMismatch { expected: Expected, found: NodeKind },

    #[error("unbound identifier `{0}`")]
    UnboundIdentifier(String),

    #[error("unknown property `{0}`")]
    UnknownProperty(String),

    #[error("index {index} is out of range for {len} items")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("index must be a finite number of at least 1, got {0}")]
    InvalidIndex(f64),

    #[error("slice step cannot be zero")]
    ZeroSliceStep,

    #[error("cannot statically resolve a function node")]
    CannotResolveFunction,

    #[error("cell is read-only")]
    ReadOnlyCell,

    #[error("duplicate key `{0}` in block")]
    DuplicateKey(String),

    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("resolution nested deeper than {0} levels")]
    DepthExceeded(usize),

    #[error("value depends on itself")]
    Cycle,

    #[error("{0}")]
    Custom(String),
}

impl Error {
    pub fn type_mismatch(expected: Expected, found: NodeKind) -> Self {
        Error::TypeMismatch { expected, found }
    }

    pub fn custom(message: impl Into<String>) -> Self {
        Error::Custom(message.into())
    }
}
