//! Fatal parse outcomes.
//!
//! The core state machine communicates failure through a `bool` return and
//! `Tokenizer::bad_lint`, matching the contract callers of the line-pragma
//! dispatch rely on (see the crate's top-level docs). [`Fatal`] is a typed
//! view over that same information for callers that want
//! `std::error::Error`; it does not change control flow anywhere in the
//! tokenizer itself.

use thiserror::Error;

/// A fatal condition that aborted a parse. Each variant corresponds to one
/// of the `Lint*` kinds that abort rather than accumulate.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum Fatal {
    /// Input buffer length was outside `2..2^32`.
    #[error("input buffer length out of bounds (must be 2..2^32)")]
    BadBufLen,
    /// A control character was seen in strict mode.
    #[error("control character at line {line}")]
    CtlChars {
        /// Line on which the control character was seen.
        line: u32,
    },
    /// A registered line-pragma handler returned `false`.
    #[error("line-pragma handler rejected its trigger at line {line}")]
    BadLnPrag {
        /// Line on which the handler was invoked.
        line: u32,
    },
    /// A line-pragma handler left the buffer in an invalid state.
    #[error("line-pragma handler left the input buffer corrupt at line {line}")]
    BufCorrupt {
        /// Line on which the handler was invoked.
        line: u32,
    },
    /// A raw (heredoc) block was never closed before the buffer ended.
    #[error("raw block opened at line {line} was never closed")]
    NoBoundary {
        /// Line on which the raw block opened.
        line: u32,
    },
    /// The buffer did not end with a newline after the last non-comment
    /// line.
    #[error("input buffer did not end with a newline at line {line}")]
    BadEndLin {
        /// Line on which the missing newline was detected.
        line: u32,
    },
}

impl Fatal {
    /// The line this fatal condition is attributed to, or `0` for
    /// conditions detected before any line could be counted (matching the
    /// "terminating fatal record may carry line 0" allowance on the lapse
    /// table's ordering invariant).
    #[must_use]
    pub fn line(self) -> u32 {
        match self {
            Self::BadBufLen => 0,
            Self::CtlChars { line }
            | Self::BadLnPrag { line }
            | Self::BufCorrupt { line }
            | Self::NoBoundary { line }
            | Self::BadEndLin { line } => line,
        }
    }
}
