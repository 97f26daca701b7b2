//! The main state machine (§4.F) and item finalizer (§4.G), tied together
//! behind the two public entry points [`Tokenizer::tokenize`] and
//! [`tokenize_lint`].

use tracing::{debug, trace};

use crate::backscan::pragma_back_scan;
use crate::classify::{Classifiers, LinterPragmaChars};
use crate::error::Fatal;
use crate::flags::{Flags, LintFlags};
use crate::item::Item;
use crate::line_pragma::{LinePragmaHandler, LinePragmaTable};
use crate::raw_block::scan_raw_block;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    LpCheck,
    InName,
    InValue,
}

/// One completed lapse: a line number and the non-fatal lint bits
/// observed on it.
pub type Lapse = (u32, LintFlags);

/// Owns the input buffer, the output tables, and the configuration
/// (restricted character sets, registered line pragmas) for one parse.
///
/// A `Tokenizer` is single-threaded and synchronous end to end: the only
/// suspension point is the in-line call into a line-pragma handler, which
/// may replace [`Tokenizer::buf`] before returning (see
/// [`Tokenizer::register_line_pragma`]).
pub struct Tokenizer {
    buf: Vec<u8>,

    /// Completed items, in source order.
    pub items: Vec<Item>,
    /// Non-fatal lapses, in source order, populated when lint recording is
    /// active (always for [`tokenize_lint`]; only when `lint_full` is set
    /// for [`Tokenizer::tokenize`]).
    pub lapses: Vec<Lapse>,
    /// Count of non-fatal lapses observed, incremented unconditionally
    /// regardless of whether `lapses` itself was populated.
    pub lapses_found: u32,
    /// The fatal condition that aborted the last parse, if any.
    pub bad_lint: Option<Fatal>,
    /// Current byte position; readable and, from inside a line-pragma
    /// handler, writable (see §4.E).
    pub inpos: u32,
    /// Current line number; readable and, from inside a line-pragma
    /// handler, writable.
    pub in_line: u32,

    /// Disallow all type characters in the pragma chain.
    pub no_types: bool,
    /// Disallow all meta brackets in the pragma chain.
    pub no_metas: bool,
    /// Allow any byte (not just printable + `\t\r\n`) inside a raw block.
    pub allow_bin_raw: bool,
    /// Always append lapses to `lapses` for [`Tokenizer::tokenize`] (the
    /// fast path otherwise only counts them in `lapses_found`). Has no
    /// effect on [`tokenize_lint`], which always appends.
    pub lint_full: bool,
    /// Pre-sizing hint for `items`/`lapses`.
    pub items_expected: u32,

    classifiers: Classifiers,
    line_pragmas: LinePragmaTable,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self {
            buf: Vec::new(),
            items: Vec::new(),
            lapses: Vec::new(),
            lapses_found: 0,
            bad_lint: None,
            inpos: 0,
            in_line: 0,
            no_types: false,
            no_metas: false,
            allow_bin_raw: false,
            lint_full: false,
            items_expected: 0,
            classifiers: Classifiers::default(),
            line_pragmas: LinePragmaTable::default(),
        }
    }
}

/// Per-line scratch state, reset at every `registerItem`/blank-line
/// transition.
struct LineState {
    stage: Stage,
    /// Position of the last byte seen that was neither space, CR, nor
    /// (in the reference variant) tab; used to compute `Ne` for NAV items.
    last_non_space: u32,
    got_sep: bool,
    got_item: bool,
    got_com: bool,
    got_quote: bool,
    got_raw: bool,
    line_lint: LintFlags,
    item: Item,
}

impl LineState {
    fn new() -> Self {
        Self {
            stage: Stage::LpCheck,
            last_non_space: 0,
            got_sep: false,
            got_item: false,
            got_com: false,
            got_quote: false,
            got_raw: false,
            line_lint: LintFlags::empty(),
            item: Item::default(),
        }
    }
}

impl Tokenizer {
    /// Builds a tokenizer over `buf`. `buf` must satisfy `2 <= len < 2^32`;
    /// violating this is reported as `Fatal::BadBufLen` from the first
    /// `tokenize`/`tokenize_lint` call rather than here, matching the
    /// source this crate is modeled on (the length check is part of the
    /// parse, not construction).
    #[must_use]
    pub fn new(buf: Vec<u8>) -> Self {
        Self { buf, ..Self::default() }
    }

    #[must_use]
    pub fn buf(&self) -> &[u8] {
        &self.buf
    }

    /// Replaces the input buffer entirely. This is the mechanism a
    /// line-pragma handler uses to rewrite `Inbuf` (see §4.E): it calls
    /// this, then sets [`Tokenizer::inpos`] to a position whose byte is
    /// `\n` before returning. The tokenizer re-validates both after every
    /// handler call; it never caches a view across the call.
    pub fn set_buf(&mut self, new_buf: Vec<u8>) {
        self.buf = new_buf;
    }

    /// Narrows the pragma/type/meta-close sets and/or widens the structure
    /// set. Returns `false` (leaving any prior configuration untouched) if
    /// any requested byte is invalid.
    pub fn linter_setup(&mut self, chars: LinterPragmaChars<'_>) -> bool {
        self.classifiers.apply(chars)
    }

    /// Registers a first-column trigger byte (`<= 0x2F`, not already
    /// registered, at most eight total).
    pub fn register_line_pragma(&mut self, trigger: u8, handler: LinePragmaHandler) -> bool {
        self.line_pragmas.register(trigger, handler)
    }

    /// Clears `items`/`lapses`/`lapses_found`/`bad_lint` and installs
    /// `new_buf` for a re-parse. When `all` is set, also clears configured
    /// character-set restrictions and the line-pragma table.
    pub fn reset(&mut self, new_buf: Vec<u8>, all: bool) {
        self.buf = new_buf;
        self.items.clear();
        self.lapses.clear();
        self.lapses_found = 0;
        self.bad_lint = None;
        self.inpos = 0;
        self.in_line = 0;
        if all {
            self.classifiers.reset();
            self.line_pragmas.clear();
        }
    }

    /// Fast path: hardcoded default character sets, lenient (recoverable)
    /// control-character handling, lapses appended only when `lint_full`.
    pub fn tokenize(&mut self) -> bool {
        self.run(false)
    }

    fn run(&mut self, reference_variant: bool) -> bool {
        let blen = self.buf.len();
        if !(2..(1u64 << 32) as usize).contains(&blen) {
            self.lapses_found += 1;
            self.bad_lint = Some(Fatal::BadBufLen);
            if reference_variant || self.lint_full {
                self.lapses.push((0, LintFlags::empty()));
            }
            return false;
        }

        self.items = Vec::with_capacity(self.items_expected as usize);
        let always_record = reference_variant || self.lint_full;
        self.lapses =
            if always_record { Vec::with_capacity((self.items_expected / 8) as usize) } else { Vec::new() };
        self.bad_lint = None;
        self.lapses_found = 0;

        let classifiers = if reference_variant { self.classifiers } else { Classifiers::default() };

        let mut st = LineState::new();
        self.in_line = 1;
        let mut p: u32 = 0;

        while (p as usize) < self.buf.len() {
            self.inpos = p;
            let c = self.buf[p as usize];

            if c == b' ' || c == b'\r' {
                p += 1;
                continue;
            }
            if reference_variant && c == b'\t' {
                p += 1;
                continue;
            }

            if (c < 0x20 && c != b'\n') || c == 0x7f {
                if reference_variant {
                    self.bad_lint = Some(Fatal::CtlChars { line: self.in_line });
                    return false;
                }
                if st.got_com {
                    p += 1;
                    continue;
                }
                self.lapses_found += 1;
                st.line_lint |= LintFlags::CTL_CHARS;
                if always_record {
                    self.lapses.push((self.in_line, st.line_lint));
                }
                st.line_lint = LintFlags::empty();
                st.item = Item::default();
                st.got_sep = false;
                st.got_item = true;
                st.got_com = true;
                p += 1;
                continue;
            }
            // Must be tested before the `gotCom` skip below (Go: `case c ==
            // 0x0a` precedes `case gotCom`, octok.go:60-62) — a comment/
            // pragma/ctl line still needs its terminating newline to reach
            // `finalize_item`, which is what resets `got_com` via a fresh
            // `LineState`. Skipping it here would swallow the rest of the
            // buffer once `got_com` is set.
            if c == b'\n' {
                if st.got_item {
                    match self.finalize_item(&mut st, p, always_record, reference_variant, classifiers) {
                        Ok(new_p) => {
                            p = new_p;
                            st = LineState::new();
                            continue;
                        }
                        Err(fatal) => {
                            self.bad_lint = Some(fatal);
                            return false;
                        }
                    }
                } else {
                    // Blank line: no lapse, and the original source never
                    // advances the line counter here either (only
                    // `registerItem`/`badChar` do), so neither do we.
                    p += 1;
                    continue;
                }
            }
            if st.got_com {
                p += 1;
                continue;
            }

            st.last_non_space = p;

            let outcome = match st.stage {
                Stage::LpCheck => self.dispatch_lp_check(&mut st, c, p, reference_variant, &classifiers),
                Stage::InName => {
                    self.dispatch_in_name(&mut st, c, p, reference_variant, &classifiers);
                    Ok(None)
                }
                Stage::InValue => {
                    self.dispatch_in_value(&mut st, c, p, &classifiers);
                    Ok(None)
                }
            };
            let resume = match outcome {
                Ok(resume) => resume,
                Err(fatal) => {
                    self.bad_lint = Some(fatal);
                    return false;
                }
            };
            // A line-pragma handler that actually rewrote the buffer (Go:
            // `p = Inpos - 1`, octok.go:153) leaves `self.inpos` pointing at
            // the '\n' that now follows the rewritten span, which may no
            // longer be adjacent to the trigger position. Resuming at `p + 1`
            // here would re-enter the loop still inside the stretch the
            // handler spliced in, and since `got_com` stays set until that
            // '\n' is processed, the fast-skip above would swallow it whole
            // instead of letting the line-pragma line close out normally.
            if let Some(new_p) = resume {
                p = new_p;
                continue;
            }

            p += 1;
        }

        if st.got_item && !st.got_com {
            self.lapses_found += 1;
            self.bad_lint = Some(Fatal::BadEndLin { line: self.in_line });
            return false;
        }
        true
    }

    fn dispatch_lp_check(
        &mut self,
        st: &mut LineState,
        c: u8,
        p: u32,
        reference_variant: bool,
        classifiers: &Classifiers,
    ) -> Result<Option<u32>, Fatal> {
        let mut resume = None;
        match c {
            b':' => {
                st.item.ns = p;
                st.got_item = true;
                self.try_separator(st, p, true, reference_variant, classifiers);
            }
            0x27 => {
                st.item.ns = p + 1;
                st.stage = Stage::InName;
                st.got_item = true;
                st.got_quote = true;
            }
            _ if classifiers.is_structure(c) => {
                st.item.fl |= Flags::IS_SPEC;
                st.item.ns = p;
                st.stage = Stage::InName;
                st.got_item = true;
            }
            _ if c > 0x2f => {
                if c.is_ascii_digit() {
                    st.item.fl |= Flags::IS_ORD | Flags::IS_INDEX;
                }
                st.item.ns = p;
                st.stage = Stage::InName;
                st.got_item = true;
            }
            _ => {
                if c > 0x23 && self.line_pragmas.is_registered(c) {
                    resume = self.dispatch_line_pragma(c, p)?;
                }
                st.got_item = true;
                st.got_com = true;
            }
        }
        Ok(resume)
    }

    /// Returns `Some(new_p)` when a handler rewrote the buffer and the main
    /// loop must resume from `self.inpos` rather than `p + 1` (Go: `p =
    /// Inpos - 1`, octok.go:153) — `self.inpos` may no longer be adjacent to
    /// the trigger position `p`, and the line's `got_com` flag would
    /// otherwise fast-skip straight past the '\n' it now points at. Returns
    /// `None` when no handler ran, or the handler left the buffer unchanged
    /// (treated as a plain comment; ordinary `got_com` skipping resumes it).
    fn dispatch_line_pragma(&mut self, c: u8, p: u32) -> Result<Option<u32>, Fatal> {
        let Some(mut handler) = self.line_pragmas.take(c) else {
            return Ok(None);
        };
        self.inpos = p;
        debug!(trigger = c, line = self.in_line, "dispatching line pragma");
        let buf_len_was = self.buf.len();
        let ok = handler(c, self);
        self.line_pragmas.restore(c, handler);
        if !ok {
            return Err(Fatal::BadLnPrag { line: self.in_line });
        }
        let blen = self.buf.len();
        if blen <= p as usize || blen >= (1usize << 32) {
            return Err(Fatal::BufCorrupt { line: self.in_line });
        }
        let new_pos = self.inpos as usize;
        // Checked before the newline requirement below (spec §4.E step 4):
        // a buffer the handler left byte-for-byte unchanged (same length,
        // same Inpos, same byte at Inpos) is treated as a plain comment
        // line, not corruption.
        if blen == buf_len_was && new_pos == p as usize && self.buf[new_pos] == c {
            return Ok(None);
        }
        if new_pos >= blen || self.buf[new_pos] != b'\n' {
            return Err(Fatal::BufCorrupt { line: self.in_line });
        }
        trace!(new_pos, "line pragma rewrote buffer");
        Ok(Some(new_pos as u32))
    }

    fn dispatch_in_name(
        &mut self,
        st: &mut LineState,
        c: u8,
        p: u32,
        reference_variant: bool,
        classifiers: &Classifiers,
    ) {
        if !st.got_sep && c == b':' {
            self.try_separator(st, p, false, reference_variant, classifiers);
            return;
        }

        let ns = st.item.ns;
        if reference_variant && !st.got_quote && classifiers.is_structure(c) {
            let run_start = p;
            let is_new_run = p == ns || self.buf[(p - 1) as usize] != c;
            if is_new_run {
                st.item.fl |= Flags::IS_SPEC;
                self.record_name_part(st, run_start - ns);
            }
            return;
        }

        if c == b'.' {
            self.record_name_part(st, p - ns + 1);
            return;
        }

        if p > ns && self.buf[(p - 1) as usize] == b' ' {
            self.record_name_part(st, p - ns);
        }
    }

    fn record_name_part(&mut self, st: &mut LineState, raw_offset: u32) {
        if raw_offset > 0x1F {
            st.line_lint |= LintFlags::KEY_PARTS;
            return;
        }
        if !st.item.push_name_part(raw_offset as u16) {
            st.line_lint |= LintFlags::KEY_PARTS;
        }
    }

    fn dispatch_in_value(&mut self, st: &mut LineState, c: u8, p: u32, classifiers: &Classifiers) {
        if c != b'.' && c != b'/' {
            return;
        }
        let blen = self.buf.len() as u32;
        if blen - p < 2 {
            return;
        }
        let next = self.buf[(p + 1) as usize];
        let prev = self.buf[(p - 1) as usize];
        if c == b'/' && next == b'/' && prev == b' ' {
            st.item.ve = p;
        } else if next < 0x21 && (classifiers.is_pragma(prev, true) || classifiers.is_type(prev)) {
            st.item.pe = p;
            if st.item.ve != 0 {
                st.line_lint |= LintFlags::REM_CANCEL;
            }
            st.item.ve = 0;
        }
    }

    /// Attempts to recognize `:` at `p` as a separator, examining the
    /// bytes that follow. On success, sets `Vs`/`Ve`/`Ne` as appropriate and
    /// transitions to `InValue`; on failure, reverts to `InName` (the only
    /// stage `ckSEP` is ever entered from once a name has started) so
    /// scanning continues over the colon as an ordinary name byte.
    fn try_separator(
        &mut self,
        st: &mut LineState,
        p: u32,
        is_ord: bool,
        reference_variant: bool,
        classifiers: &Classifiers,
    ) {
        let blen = self.buf.len() as u32;
        let peek = |k: u32| -> u8 {
            let idx = p + k;
            if idx < blen { self.buf[idx as usize] } else { 0 }
        };
        let c1 = peek(1);
        let remaining = blen - p;

        if c1 == b'=' {
            let mut vs = p + 2;
            if vs < blen && matches!(self.buf[vs as usize], b' ' | b'\t') {
                vs += 1;
            }
            st.item.vs = vs;
            st.got_raw = true;
        } else if reference_variant && classifiers.is_structure(c1) {
            st.item.fl |= Flags::IS_SPEC;
            st.item.vs = p + 1;
        } else if c1 < 0x20 || remaining < 4 {
            st.item.vs = p + 1;
            st.item.ve = p + 1;
        } else if c1 == b':' && matches!(peek(2), b' ' | b'\t') {
            st.item.vs = p + 2;
        } else if c1 == b' ' || c1 == b'\t' {
            st.item.vs = p + 2;
        } else {
            st.stage = Stage::InName;
            return;
        }

        if is_ord {
            st.item.ne = p;
            st.item.fl |= Flags::IS_ORD;
        } else {
            st.item.ne = st.last_non_space + 1;
        }
        st.got_sep = true;
        st.stage = Stage::InValue;
    }

    fn finalize_item(
        &mut self,
        st: &mut LineState,
        newline_pos: u32,
        always_record: bool,
        reference_variant: bool,
        classifiers: Classifiers,
    ) -> Result<u32, Fatal> {
        if !st.got_sep {
            if !st.got_com {
                st.line_lint |= LintFlags::NO_COMMENT;
            }
            if !st.line_lint.is_empty() {
                self.lapses_found += 1;
                if always_record {
                    self.lapses.push((self.in_line, st.line_lint));
                }
            }
            self.in_line += 1;
            return Ok(newline_pos + 1);
        }

        if st.item.ne == st.item.ns {
            st.item.fl |= Flags::IS_ORD;
        }
        if !reference_variant
            && !st.item.fl.contains(Flags::IS_SPEC)
            && !st.got_quote
            && st.item.ne > 0
            && classifiers.is_structure(self.buf[(st.item.ne - 1) as usize])
        {
            st.item.fl |= Flags::IS_SPEC;
        }

        let mut i: i64 =
            if st.item.ve > 0 { i64::from(st.item.ve) - 1 } else { i64::from(newline_pos) - 1 };
        let vs_i = i64::from(st.item.vs);
        while i >= vs_i && self.buf[i as usize] <= 0x20 {
            i -= 1;
        }

        let mut disa = false;
        if i >= 0 && i as u32 == st.item.pe && self.buf[i as usize] == b'.' {
            let result = pragma_back_scan(
                &self.buf,
                st.item.vs,
                i as u32,
                &classifiers,
                self.no_types,
                self.no_metas,
                &mut st.item,
                &mut st.line_lint,
            );
            disa = result.disa;
        } else {
            let pe = (i + 1).max(vs_i) as u32;
            st.item.pe = pe;
            st.item.ve = pe;
            st.item.ps = pe;
            st.item.ms = pe;
        }

        if disa {
            st.line_lint &= !LintFlags::REM_CANCEL;
        }

        let mut resume_p = newline_pos;
        if st.got_raw {
            match scan_raw_block(&self.buf, newline_pos, st.item.vs, st.item.ve, self.in_line, self.allow_bin_raw)
            {
                Ok(raw) => {
                    st.item.vs = raw.vs;
                    st.item.ve = raw.ve;
                    self.in_line = raw.line;
                    resume_p = raw.resume_pos;
                }
                Err(fatal) => {
                    self.lapses_found += 1;
                    return Err(fatal);
                }
            }
        }

        if st.item.vs == st.item.ve {
            st.item.fl |= Flags::IS_EMPTY;
        }

        if !st.line_lint.is_empty() {
            self.lapses_found += 1;
            if always_record {
                self.lapses.push((self.in_line, st.line_lint));
            }
        }
        self.items.push(st.item);
        self.in_line += 1;

        Ok(resume_p + 1)
    }
}

/// Reference path: honors restricted character sets from
/// [`Tokenizer::linter_setup`], treats control characters as fatal rather
/// than recoverable, and always records lapses regardless of `lint_full`.
pub fn tokenize_lint(oc: &mut Tokenizer) -> bool {
    oc.run(true)
}

#[cfg(test)]
mod tests {
    use super::{tokenize_lint, Tokenizer};
    use crate::classify::LinterPragmaChars;
    use crate::error::Fatal;
    use crate::flags::{Flags, LintFlags};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn ok(src: &[u8]) -> Tokenizer {
        let mut oc = Tokenizer::new(src.to_vec());
        assert!(oc.tokenize(), "expected tokenize() to succeed on {src:?}");
        oc
    }

    // === §8 literal end-to-end scenarios ===

    #[test]
    fn scenario_1_simple_named_item() {
        let oc = ok(b"name : value\n");
        assert_eq!(oc.items.len(), 1);
        let it = oc.items[0];
        assert_eq!((it.ns, it.ne, it.vs, it.ve, it.pe), (0, 4, 7, 12, 12));
        assert_eq!(it.fl, Flags::empty());
        assert_eq!(it.tc, 0);
        assert_eq!(it.np, 0);
        assert!(oc.lapses.is_empty());
    }

    #[test]
    fn scenario_2_ord_item() {
        let oc = ok(b": value\n");
        assert_eq!(oc.items.len(), 1);
        let it = oc.items[0];
        assert!(it.fl.contains(Flags::IS_ORD));
        assert_eq!((it.ns, it.ne, it.vs, it.ve), (0, 0, 2, 7));
    }

    #[test]
    fn scenario_3_continuation_join_trims_before_pragma() {
        let oc = ok(b"Name : Value +.  \n");
        assert_eq!(oc.items.len(), 1);
        let it = oc.items[0];
        assert!(it.fl.contains(Flags::NEXT_CONT));
        assert_eq!(it.ve, 12);
        assert_eq!(it.pe, 14);
        assert!(oc.lapses.is_empty());
    }

    #[test]
    fn scenario_4_caret_run_packs_into_tc() {
        // Four carets: Tc's top bit marks a caret count, not a type char.
        let oc = ok(b"Name : Value ^^^^+.  \n");
        let it = oc.items[0];
        assert!(it.tc_is_carets());
        assert_eq!(it.caret_count(), Some(4));
        assert!(it.fl.contains(Flags::NEXT_CONT));
    }

    #[test]
    fn scenario_5_two_joins_is_a_lapse() {
        let mut oc = Tokenizer::new(b"Name : Value %+.\n".to_vec());
        oc.lint_full = true;
        assert!(oc.tokenize());
        let it = oc.items[0];
        assert!(it.fl.contains(Flags::NEXT_CONT) && it.fl.contains(Flags::NEXT_META));
        assert_eq!(oc.lapses_found, 1);
        assert_eq!(oc.lapses[0].1, LintFlags::TWO_JOINS);
    }

    #[test]
    fn scenario_6_dotted_name_parts() {
        let oc = ok(b"Some.Key.Here : value\n");
        let it = oc.items[0];
        // Offsets are dot positions + 1, packed 5 bits per slot, MSB-first.
        assert_eq!((it.np >> 10) & 0x1F, 5);
        assert_eq!((it.np >> 5) & 0x1F, 9);
        assert!(oc.lapses.is_empty());
    }

    #[test]
    fn scenario_7_short_buffer_is_fatal() {
        let mut oc = Tokenizer::new(b":".to_vec());
        assert!(!oc.tokenize());
        assert_eq!(oc.bad_lint, Some(Fatal::BadBufLen));
    }

    #[test]
    fn scenario_8_missing_final_newline_is_fatal() {
        let mut oc = Tokenizer::new(b"name : value".to_vec());
        assert!(!oc.tokenize());
        assert!(matches!(oc.bad_lint, Some(Fatal::BadEndLin { .. })));
    }

    #[test]
    fn scenario_9_raw_block_excludes_boundary() {
        let oc = ok(b"Name := ==END\nraw\nbody\n==END\n");
        assert_eq!(oc.items.len(), 1);
        let it = oc.items[0];
        assert_eq!(&oc.buf()[it.vs as usize..it.ve as usize], b"raw\nbody\n");
    }

    #[test]
    fn scenario_9b_raw_block_default_boundary() {
        let oc = ok(b"Name :=\nraw\nbody\n==RawEnd\n");
        let it = oc.items[0];
        assert_eq!(&oc.buf()[it.vs as usize..it.ve as usize], b"raw\nbody\n");
    }

    #[test]
    fn scenario_10_line_pragma_handler_runs_once() {
        let mut oc = Tokenizer::new(b"$ set\nname : v\n".to_vec());
        let calls = std::rc::Rc::new(std::cell::Cell::new(0));
        let calls_inner = calls.clone();
        assert!(oc.register_line_pragma(
            b'$',
            Box::new(move |_trigger, tok| {
                calls_inner.set(calls_inner.get() + 1);
                let rest = tok.buf()[tok.inpos as usize..].to_vec();
                let nl = rest.iter().position(|&b| b == b'\n').unwrap();
                let mut new_buf = tok.buf()[..tok.inpos as usize].to_vec();
                new_buf.extend_from_slice(&rest[nl..]);
                let new_inpos = tok.inpos;
                tok.set_buf(new_buf);
                tok.inpos = new_inpos;
                true
            })
        ));
        assert!(oc.tokenize());
        assert_eq!(calls.get(), 1);
        assert_eq!(oc.items.len(), 1);
        assert_eq!(&oc.buf()[oc.items[0].ns as usize..oc.items[0].ne as usize], b"name");
    }

    #[test]
    fn line_pragma_handler_false_is_fatal() {
        let mut oc = Tokenizer::new(b"$oops\nname : v\n".to_vec());
        assert!(oc.register_line_pragma(b'$', Box::new(|_c, _t| false)));
        assert!(!oc.tokenize());
        assert!(matches!(oc.bad_lint, Some(Fatal::BadLnPrag { .. })));
    }

    #[test]
    fn line_pragma_handler_leaving_non_newline_inpos_is_buf_corrupt() {
        let mut oc = Tokenizer::new(b"$oops\nname : v\n".to_vec());
        assert!(oc.register_line_pragma(
            b'$',
            Box::new(|_c, tok| {
                tok.inpos += 1; // not a '\n'
                true
            })
        ));
        assert!(!oc.tokenize());
        assert!(matches!(oc.bad_lint, Some(Fatal::BufCorrupt { .. })));
    }

    #[test]
    fn unchanged_buffer_after_handler_is_treated_as_comment() {
        let mut oc = Tokenizer::new(b"$text\nname : v\n".to_vec());
        assert!(oc.register_line_pragma(b'$', Box::new(|_c, _t| true)));
        assert!(oc.tokenize());
        assert_eq!(oc.items.len(), 1);
        assert_eq!(&oc.buf()[oc.items[0].ns as usize..oc.items[0].ne as usize], b"name");
    }

    #[test]
    fn register_line_pragma_rejects_conflicts_and_overflow() {
        let mut oc = Tokenizer::new(b"x\n".to_vec());
        assert!(oc.register_line_pragma(b'$', Box::new(|_c, _t| true)));
        assert!(!oc.register_line_pragma(b'$', Box::new(|_c, _t| true)));
        assert!(!oc.register_line_pragma(0x30, Box::new(|_c, _t| true))); // > 0x2F
        for trigger in [b'!', b'"', b'#', b'%', b'&', b'\'', b'('] {
            assert!(oc.register_line_pragma(trigger, Box::new(|_c, _t| true)));
        }
        // Table is now full (8 slots: '$' plus these 7).
        assert!(!oc.register_line_pragma(b')', Box::new(|_c, _t| true)));
    }

    #[test]
    fn raw_block_without_boundary_is_fatal() {
        let mut oc = Tokenizer::new(b"Name := ==END\nraw\n".to_vec());
        assert!(!oc.tokenize());
        assert!(matches!(oc.bad_lint, Some(Fatal::NoBoundary { .. })));
    }

    #[test]
    fn empty_value_sets_is_empty_flag() {
        let oc = ok(b"name :\n");
        assert!(oc.items[0].fl.contains(Flags::IS_EMPTY));
        assert_eq!(oc.items[0].vs, oc.items[0].ve);
    }

    #[test]
    fn remark_is_cancelled_by_trailing_pragma() {
        let mut oc = Tokenizer::new(b"name : value  //text +.\n".to_vec());
        oc.lint_full = true;
        assert!(oc.tokenize());
        assert!(oc.lapses.iter().any(|(_, w)| w.contains(LintFlags::REM_CANCEL)));
    }

    #[test]
    fn remark_without_pragma_trims_value_at_slashes() {
        let oc = ok(b"name : value  //text\n");
        let it = oc.items[0];
        assert_eq!(&oc.buf()[it.vs as usize..it.ve as usize], b"value");
    }

    #[test]
    fn suspicious_pragma_tail_is_a_lapse() {
        // "value )." - ')' is a meta-close byte with no open partner
        // anywhere in the value, so the forward scan's broad pragma-or-
        // type-or-meta test arms Pe, but the back-scan can't resolve it as
        // a meta (no partner) or continue it as a pragma/type chain. Not a
        // real chain; the back-scan should flag it as suspicious rather
        // than silently eating the tail.
        let mut oc = Tokenizer::new(b"name : value ).\n".to_vec());
        oc.lint_full = true;
        assert!(oc.tokenize());
        assert!(oc.lapses.iter().any(|(_, w)| w.contains(LintFlags::SUS_PRAGMA)));
    }

    #[test]
    fn too_many_carets_is_fatal_in_lint_sense() {
        let mut caret_line = b"name : value ".to_vec();
        caret_line.extend(std::iter::repeat(b'^').take(70));
        caret_line.extend_from_slice(b".\n");
        let mut oc = Tokenizer::new(caret_line);
        oc.lint_full = true;
        assert!(oc.tokenize());
        assert!(oc.lapses.iter().any(|(_, w)| w.contains(LintFlags::TOO_MANY_NL)));
    }

    #[test]
    fn forced_quote_name_sets_is_ord() {
        let oc = ok(b"' weird.name : v\n");
        assert!(oc.items[0].fl.contains(Flags::IS_ORD));
    }

    #[test]
    fn control_char_is_fatal_in_tokenize_lint() {
        let mut oc = Tokenizer::new(b"name : val\x01ue\n".to_vec());
        assert!(!tokenize_lint(&mut oc));
        assert!(matches!(oc.bad_lint, Some(Fatal::CtlChars { .. })));
    }

    #[test]
    fn control_char_is_recoverable_in_tokenize() {
        let mut oc = Tokenizer::new(b"name : val\x01ue\nok : v\n".to_vec());
        oc.lint_full = true;
        assert!(oc.tokenize());
        assert_eq!(oc.items.len(), 1);
        assert!(oc.lapses.iter().any(|(_, w)| w.contains(LintFlags::CTL_CHARS)));
    }

    // === Reset idempotence ===

    #[test]
    fn reset_then_reparse_is_idempotent() {
        let src = b"name : value\nother : thing +.\n".to_vec();
        let mut oc = Tokenizer::new(src.clone());
        assert!(oc.tokenize());
        let first_items = oc.items.clone();
        let first_lapses = oc.lapses.clone();

        oc.reset(src, false);
        assert!(oc.tokenize());
        assert_eq!(oc.items, first_items);
        assert_eq!(oc.lapses, first_lapses);
    }

    #[test]
    fn reset_all_clears_configured_line_pragmas() {
        let mut oc = Tokenizer::new(b"$x\nname : v\n".to_vec());
        assert!(oc.register_line_pragma(b'$', Box::new(|_c, _t| false)));
        oc.reset(b"$x\nname : v\n".to_vec(), true);
        // With the handler cleared, '$' is just an ordinary comment char.
        assert!(oc.tokenize());
        assert_eq!(oc.items.len(), 1);
    }

    // === Classifier equivalence ===

    #[test]
    fn tokenize_lint_full_matches_tokenize_lint_full_with_default_sets() {
        let src: &[u8] = b"Name.Sub : Value ^^+.   // trailing\n: ord\nraw := ==END\nbody\n==END\n";

        let mut fast = Tokenizer::new(src.to_vec());
        fast.lint_full = true;
        assert!(fast.tokenize());

        let mut reference = Tokenizer::new(src.to_vec());
        assert!(tokenize_lint(&mut reference));

        assert_eq!(fast.items, reference.items);
        assert_eq!(fast.lapses, reference.lapses);
    }

    // === LinterSetup restriction ===

    #[test]
    fn linter_setup_rejects_unknown_byte() {
        let mut oc = Tokenizer::new(b"x\n".to_vec());
        assert!(!oc.linter_setup(LinterPragmaChars { pragma: b"z", ..Default::default() }));
    }

    #[test]
    fn linter_setup_narrows_pragma_set() {
        let mut oc = Tokenizer::new(b"name : value +.\n".to_vec());
        assert!(oc.linter_setup(LinterPragmaChars { pragma: b"_", ..Default::default() }));
        oc.lint_full = true;
        assert!(tokenize_lint(&mut oc));
        // '+' is no longer a recognized pragma char, so the back-scan
        // doesn't see a legitimate chain and flags it as suspicious.
        assert!(oc.lapses.iter().any(|(_, w)| w.contains(LintFlags::SUS_PRAGMA)));
    }

    #[test]
    fn linter_setup_rejects_structure_extra_without_open_partner() {
        let mut oc = Tokenizer::new(b"x\n".to_vec());
        // 'a' is alphabetic; structure extras must be non-letter.
        assert!(!oc.linter_setup(LinterPragmaChars { structure_extra: b"a", ..Default::default() }));
    }

    // === Invariants over generated inputs ===

    fn oconf_line() -> impl Strategy<Value = String> {
        let name = "[A-Za-z][A-Za-z0-9]{0,6}";
        let value = "[A-Za-z0-9 ]{0,10}";
        (name, value).prop_map(|(n, v)| format!("{n} : {v}\n"))
    }

    proptest! {
        #[test]
        fn invariant_offset_ordering_holds(lines in proptest::collection::vec(oconf_line(), 1..8)) {
            let src: String = lines.concat();
            let mut oc = Tokenizer::new(src.into_bytes());
            oc.lint_full = true;
            if oc.tokenize() {
                for it in &oc.items {
                    prop_assert!(it.ns <= it.ne);
                    prop_assert!(it.ne <= it.vs);
                    prop_assert!(it.vs <= it.ve);
                    prop_assert!(it.ve <= it.ps);
                    prop_assert!(it.ps <= it.ms);
                    prop_assert!(it.ms <= it.pe);
                    prop_assert!((it.pe as usize) <= oc.buf().len());
                    prop_assert_eq!(it.fl.contains(Flags::IS_EMPTY), it.vs == it.ve);
                }
            }
        }

        #[test]
        fn invariant_crlf_yields_identical_items(lines in proptest::collection::vec(oconf_line(), 1..5)) {
            let lf: String = lines.concat();
            let crlf = lf.replace('\n', "\r\n");

            let mut lf_oc = Tokenizer::new(lf.into_bytes());
            let mut crlf_oc = Tokenizer::new(crlf.into_bytes());
            let lf_ok = lf_oc.tokenize();
            let crlf_ok = crlf_oc.tokenize();

            prop_assert_eq!(lf_ok, crlf_ok);
            if lf_ok {
                prop_assert_eq!(lf_oc.items.len(), crlf_oc.items.len());
            }
        }

        #[test]
        fn invariant_deterministic_across_runs(lines in proptest::collection::vec(oconf_line(), 1..5)) {
            let src = lines.concat().into_bytes();
            let mut a = Tokenizer::new(src.clone());
            let mut b = Tokenizer::new(src);
            a.lint_full = true;
            b.lint_full = true;
            let ok_a = a.tokenize();
            let ok_b = b.tokenize();
            prop_assert_eq!(ok_a, ok_b);
            prop_assert_eq!(a.items, b.items);
            prop_assert_eq!(a.lapses, b.lapses);
        }
    }
}
