//! Tokenizer and linter for the OCONF line-oriented configuration format.
//!
//! OCONF has no nesting and no grammar beyond "one item per line"; this
//! crate's job is to turn a byte buffer into a flat table of [`Item`]
//! records (name/value/pragma offsets into the original buffer) plus a
//! table of non-fatal [`Lapse`]s, in one pass, without allocating more
//! than those two tables.
//!
//! # Two entry points, one state machine
//!
//! - [`Tokenizer::tokenize`]: the fast path. Hardcoded default character
//!   sets, a control character is a recoverable lapse rather than a fatal
//!   condition, and lapses are only appended to [`Tokenizer::lapses`] when
//!   [`Tokenizer::lint_full`] is set (otherwise only counted in
//!   [`Tokenizer::lapses_found`]).
//! - [`tokenize_lint`]: the reference path. Honors any restriction
//!   installed with [`Tokenizer::linter_setup`], treats a control
//!   character as fatal, and always appends lapses.
//!
//! Both run the same underlying state machine; the two entry points are a
//! configuration choice, not two parsers.
//!
//! # Usage
//!
//! ```
//! use octok::Tokenizer;
//!
//! let mut oc = Tokenizer::new(b"name : value\n".to_vec());
//! assert!(oc.tokenize());
//! assert_eq!(oc.items.len(), 1);
//! ```
//!
//! # Stability
//!
//! - [`Item`]: fields are stable; offsets obey the ordering invariant
//!   documented on the type.
//! - [`Fatal`]: variants may grow.
//! - [`Flags`] / [`LintFlags`]: bit positions are part of the contract and
//!   are never renumbered.

mod backscan;
mod classify;
mod error;
mod flags;
mod item;
mod line_pragma;
mod raw_block;
mod tokenizer;

pub use classify::{ByteSet8, LinterPragmaChars};
pub use error::Fatal;
pub use flags::{Flags, LintFlags};
pub use item::Item;
pub use line_pragma::LinePragmaHandler;
pub use tokenizer::{tokenize_lint, Lapse, Tokenizer};
