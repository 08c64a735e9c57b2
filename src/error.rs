use std::fmt;

use thiserror::Error;

use crate::token::Token;
use crate::value::Value;

/// The crate's single error type. `Syntax`/`Runtime` are the two user-facing
/// diagnostic kinds from the language spec (row/col + message); `Return` is an
/// internal control-flow signal, never shown to a user unless it escapes every
/// call frame, in which case [`Error::escaped_return`] turns it into a Runtime
/// error at the `return` token's location.
#[derive(Error)]
pub enum Error {
    #[error("{row}:{col}: Syntax Error: {message}")]
    Syntax { row: u32, col: u32, message: String },

    #[error("{row}:{col}: Runtime Error: {message}")]
    Runtime { row: u32, col: u32, message: String },

    #[error("return escaped every call frame")]
    Return { token: Token, value: Value },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl Error {
    pub fn syntax(row: u32, col: u32, message: impl Into<String>) -> Self {
        Error::Syntax {
            row,
            col,
            message: message.into(),
        }
    }

    pub fn runtime(row: u32, col: u32, message: impl Into<String>) -> Self {
        Error::Runtime {
            row,
            col,
            message: message.into(),
        }
    }

    /// A `return` that unwound every call frame and reached the top level is a
    /// runtime error at the `return` keyword's own location (§7); every other
    /// error passes through unchanged.
    pub fn escaped_return(self) -> Self {
        match self {
            Error::Return { token, .. } => {
                Error::runtime(token.row, token.col, "cannot return from top-level code")
            }
            other => other,
        }
    }
}
