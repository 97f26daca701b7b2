//! Packed flag sets carried on every [`crate::item::Item`] and every lint
//! accumulator.
//!
//! Both sets keep their Go-source bit positions verbatim: external ports and
//! fixtures compare raw `Fl`/`What` byte values, so the discriminants here
//! are not renumbered for Rust convenience.

use bitflags::bitflags;

bitflags! {
    /// Per-item flag byte (`Fl` in the original layout).
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Flags: u8 {
        /// Item has no name (`: value` form).
        const IS_ORD    = 1 << 0;
        /// `Vs == Ve`; the value range is empty.
        const IS_EMPTY  = 1 << 1;
        /// Pragma chain ended in `+` (continuation join).
        const NEXT_CONT = 1 << 2;
        /// Pragma chain ended in `%` (meta join).
        const NEXT_META = 1 << 3;
        /// Pragma chain contained `\` (unescape marker).
        const UNESCAPE  = 1 << 4;
        /// Pragma chain contained `` ` `` (backtick marker).
        const BACKTICK  = 1 << 5;
        /// Name opens with a structure byte (section/group/list/dict/set).
        const IS_SPEC   = 1 << 6;
        /// Name begins with an ASCII digit (array-index-shaped NAV/ORD name).
        const IS_INDEX  = 1 << 7;
    }
}

bitflags! {
    /// Per-line non-fatal lint accumulator (`What` in the original layout).
    ///
    /// `LintOK` is the all-zero value and is never set explicitly; its
    /// presence is implied by an empty [`LintFlags`].
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct LintFlags: u16 {
        /// A pragma-looking tail turned out not to be a pragma chain.
        const SUS_PRAGMA   = 1 << 0;
        /// A remark (`//`) was cancelled by a later pragma on the same line.
        const REM_CANCEL   = 1 << 1;
        /// A non-separator, non-comment line produced nothing parseable.
        const NO_COMMENT   = 1 << 2;
        /// More than one run of carets (`^`) in a single pragma chain.
        const DUBL_CARET   = 1 << 3;
        /// 64 or more carets accumulated in one pragma chain.
        const TOO_MANY_NL  = 1 << 4;
        /// Both a type char and a caret run were requested for `Tc`.
        const TYPE_AND_NL  = 1 << 5;
        /// Both `+` and `%` joins were requested in one pragma chain.
        const TWO_JOINS    = 1 << 6;
        /// More than one type character was requested for `Tc`.
        const MANY_TYPES   = 1 << 7;
        /// A name had more than three dot/space-delimited parts.
        const KEY_PARTS    = 1 << 8;
        /// A control character was tolerated (lenient variant only).
        const CTL_CHARS    = 1 << 9;
    }
}

impl LintFlags {
    /// Human-readable description of every set bit, one clause per kind,
    /// joined with `"; "`. Mirrors `LintMessage()` from the source this
    /// crate was ported from: callers doing interactive diagnostics want a
    /// single string, not a list of enum names.
    #[must_use]
    pub fn describe(self) -> String {
        if self.is_empty() {
            return "ok".to_owned();
        }
        const MESSAGES: &[(LintFlags, &str)] = &[
            (LintFlags::SUS_PRAGMA, "suspicious pragma-like tail that was not a pragma chain"),
            (LintFlags::REM_CANCEL, "end-of-line remark cancelled by a later pragma"),
            (LintFlags::NO_COMMENT, "line had a separator-less, comment-less body"),
            (LintFlags::DUBL_CARET, "more than one caret run in a pragma chain"),
            (LintFlags::TOO_MANY_NL, "64 or more carets in a pragma chain"),
            (LintFlags::TYPE_AND_NL, "both a type character and a caret run requested"),
            (LintFlags::TWO_JOINS, "both a continuation join and a meta join requested"),
            (LintFlags::MANY_TYPES, "more than one type character requested"),
            (LintFlags::KEY_PARTS, "name had more than three parts"),
            (LintFlags::CTL_CHARS, "control character tolerated"),
        ];
        let mut out = String::new();
        for (flag, msg) in MESSAGES {
            if self.contains(*flag) {
                if !out.is_empty() {
                    out.push_str("; ");
                }
                out.push_str(msg);
            }
        }
        out
    }
}

impl std::fmt::Display for LintFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}
