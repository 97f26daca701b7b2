//! Character classifiers (pragma / type / meta-close / structure) and the
//! configurable restriction object used by [`crate::tokenizer::Tokenizer::linter_setup`].
//!
//! The source this crate is modeled on packs each set into a single `u64`
//! and tests membership by shifting 8 bits at a time. That representation
//! is not load-bearing — the contract is membership, not bit layout — so
//! this crate uses a small fixed-capacity byte array instead, which reads
//! better in Rust and costs nothing at the sizes involved (at most eight
//! members per set).

/// Up to eight distinct bytes, in registration order. `contains` is a
/// linear scan; sets this small beat a bitmap on every realistic input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ByteSet8 {
    bytes: [u8; 8],
    len: u8,
}

impl ByteSet8 {
    /// Builds a set from a slice, deduplicating. `None` if more than eight
    /// distinct bytes are supplied.
    #[must_use]
    pub fn from_slice(src: &[u8]) -> Option<Self> {
        let mut set = Self::default();
        for &b in src {
            if set.contains(b) {
                continue;
            }
            if set.len == 8 {
                return None;
            }
            set.bytes[set.len as usize] = b;
            set.len += 1;
        }
        Some(set)
    }

    #[must_use]
    pub fn contains(&self, b: u8) -> bool {
        self.bytes[..self.len as usize].contains(&b)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Full default pragma set: `` % \ + ^ | _ ' ` `` (space handled as the
/// chain terminator by the back-scan directly, not as a membership test
/// here).
pub const PRAGMA_DEFAULT: &[u8] = b"%\\+^|_'`";
/// Full default type set.
pub const TYPE_DEFAULT: &[u8] = b"-*~,$#?\"";
/// Full default meta-close set.
pub const META_CLOSE_DEFAULT: &[u8] = b"})]>/;";
/// Full default structure set.
pub const STRUCTURE_DEFAULT: &[u8] = b"^@()[]{}<>";

#[must_use]
pub fn is_pragma_default(b: u8) -> bool {
    PRAGMA_DEFAULT.contains(&b)
}

#[must_use]
pub fn is_type_default(b: u8) -> bool {
    TYPE_DEFAULT.contains(&b)
}

#[must_use]
pub fn is_meta_close_default(b: u8) -> bool {
    META_CLOSE_DEFAULT.contains(&b)
}

#[must_use]
pub fn is_structure_default(b: u8) -> bool {
    STRUCTURE_DEFAULT.contains(&b)
}

/// The open partner of a meta-close byte, resolving the `/` ambiguity (it
/// opens with either `=` or `&`) by returning the primary partner; callers
/// doing back-scan accept both explicitly.
#[must_use]
pub fn meta_open_partner(close: u8) -> Option<u8> {
    match close {
        b'}' => Some(b'{'),
        b')' => Some(b'('),
        b']' => Some(b'['),
        b'>' => Some(b'<'),
        b'/' => Some(b'='),
        b';' => Some(b'@'),
        _ => None,
    }
}

/// Derives the implied opening bracket for a byte proposed as a structure-set
/// extension, using the same `c - 2` trick as the source this crate is
/// modeled on (ground-truthed against `original_source/linter.go`'s
/// `LinterSetup`): closing brackets sit two code points after their partner
/// in ASCII (`) (0x29) -> ( (0x28)` needs the `)` special-case bump first;
/// `] (0x5D) -> [ (0x5B)`; `} (0x7D) -> { (0x7B)`; `> (0x3E) -> < (0x3C)`).
#[must_use]
fn implied_open_for_structure_extra(c: u8) -> Option<u8> {
    let adjusted = if c == b')' { c.wrapping_add(1) } else { c };
    adjusted.checked_sub(2)
}

/// Narrowing/widening configuration for [`crate::tokenizer::Tokenizer::linter_setup`],
/// mirroring `LinterPragmaChars` in the source this crate is modeled on —
/// `P`/`T`/`M` narrow, `S` widens.
#[derive(Clone, Copy, Debug, Default)]
pub struct LinterPragmaChars<'a> {
    /// Narrows the pragma set to this subset of [`PRAGMA_DEFAULT`].
    pub pragma: &'a [u8],
    /// Narrows the type set to this subset of [`TYPE_DEFAULT`].
    pub type_: &'a [u8],
    /// Narrows the meta-close set to this subset of [`META_CLOSE_DEFAULT`].
    pub meta: &'a [u8],
    /// Extends the structure set with up to eight additional non-letter
    /// bytes, each of which must have a resolvable open partner.
    pub structure_extra: &'a [u8],
}

/// Resolved, possibly-restricted classifier state held by a
/// [`crate::tokenizer::Tokenizer`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Classifiers {
    pragma: Option<ByteSet8>,
    type_: Option<ByteSet8>,
    meta: Option<ByteSet8>,
    structure_extra: ByteSet8,
}

impl Classifiers {
    /// Applies a [`LinterPragmaChars`] restriction, validating every
    /// requested byte against the full default set for its category (and,
    /// for structure extras, against having a resolvable open partner).
    /// Returns `false` without mutating `self` if any byte is invalid.
    pub fn apply(&mut self, chars: LinterPragmaChars<'_>) -> bool {
        if chars.pragma.iter().any(|&b| !is_pragma_default(b)) {
            return false;
        }
        if chars.type_.iter().any(|&b| !is_type_default(b)) {
            return false;
        }
        if chars.meta.iter().any(|&b| !is_meta_close_default(b)) {
            return false;
        }
        if chars
            .structure_extra
            .iter()
            .any(|&b| b.is_ascii_alphabetic() || implied_open_for_structure_extra(b).is_none())
        {
            return false;
        }
        let Some(pragma) = ByteSet8::from_slice(chars.pragma) else {
            return false;
        };
        let Some(type_) = ByteSet8::from_slice(chars.type_) else {
            return false;
        };
        let Some(meta) = ByteSet8::from_slice(chars.meta) else {
            return false;
        };
        let Some(structure_extra) = ByteSet8::from_slice(chars.structure_extra) else {
            return false;
        };
        self.pragma = (!pragma.is_empty()).then_some(pragma);
        self.type_ = (!type_.is_empty()).then_some(type_);
        self.meta = (!meta.is_empty()).then_some(meta);
        self.structure_extra = structure_extra;
        true
    }

    /// Clears any restriction, returning to full default sets.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub fn is_pragma(&self, b: u8, with_meta: bool) -> bool {
        let in_pragma = self.pragma.map_or_else(|| is_pragma_default(b), |set| set.contains(b));
        in_pragma || (with_meta && self.is_meta_close(b))
    }

    #[must_use]
    pub fn is_type(&self, b: u8) -> bool {
        self.type_.map_or_else(|| is_type_default(b), |set| set.contains(b))
    }

    #[must_use]
    pub fn is_meta_close(&self, b: u8) -> bool {
        self.meta.map_or_else(|| is_meta_close_default(b), |set| set.contains(b))
    }

    #[must_use]
    pub fn is_structure(&self, b: u8) -> bool {
        is_structure_default(b) || self.structure_extra.contains(b)
    }
}
