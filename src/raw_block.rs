//! Raw-block (heredoc) scanner (§4.D).
//!
//! Entered from the item finalizer once a value has been recognized as
//! opening a raw block (`:=` followed on the same line by the boundary
//! declaration). The declaration line's own (already-trimmed) value text is
//! the boundary to match; closing is a whole subsequent line comparing
//! equal to it, not a sliding byte window (see `DESIGN.md` for why this
//! crate departs from the fixed 64-bit window the source it's modeled on
//! uses: that window cannot represent boundaries shorter than eight bytes,
//! which the worked raw-block example in this crate's test suite requires).

use crate::error::Fatal;

const DEFAULT_BOUNDARY_BYTES: &[u8] = b"==RawEnd";

fn is_raw_allowed(c: u8, allow_bin_raw: bool) -> bool {
    allow_bin_raw || c == b'\t' || (0x20..=0x7e).contains(&c)
}

/// Up to eight boundary bytes, fixed-capacity like the crate's other small
/// character sets.
struct RawBoundary {
    bytes: [u8; 8],
    len: u8,
}

impl RawBoundary {
    fn matches(&self, line: &[u8]) -> bool {
        line.len() == self.len as usize && line == &self.bytes[..self.len as usize]
    }
}

/// The declaration line's own value text (`nominal_vs..nominal_ve`, already
/// trimmed by the finalizer) is the boundary, capped at eight bytes; an
/// empty declaration falls back to the default `==RawEnd`.
fn resolve_boundary(buf: &[u8], nominal_vs: u32, nominal_ve: u32) -> RawBoundary {
    let mut bytes = [0u8; 8];
    if nominal_ve > nominal_vs {
        let len = ((nominal_ve - nominal_vs) as usize).min(8);
        bytes[..len].copy_from_slice(&buf[nominal_vs as usize..nominal_vs as usize + len]);
        RawBoundary { bytes, len: len as u8 }
    } else {
        bytes.copy_from_slice(DEFAULT_BOUNDARY_BYTES);
        RawBoundary { bytes, len: 8 }
    }
}

/// Result of a successful raw-block scan.
pub(crate) struct RawBlock {
    /// Value start: the byte right after the declaration line's newline.
    pub vs: u32,
    /// Value end: the position of the first byte of the closing boundary
    /// line.
    pub ve: u32,
    /// Position of the newline that terminates the closing boundary's own
    /// line; the caller resumes its main loop from here.
    pub resume_pos: u32,
    /// Updated line counter, now pointing at the closing boundary line.
    pub line: u32,
}

/// Scans a raw block opened on the line ending at `decl_newline_pos`,
/// reading forward line by line until one compares equal to the boundary
/// derived from `nominal_vs..nominal_ve`.
pub(crate) fn scan_raw_block(
    buf: &[u8],
    decl_newline_pos: u32,
    nominal_vs: u32,
    nominal_ve: u32,
    mut line: u32,
    allow_bin_raw: bool,
) -> Result<RawBlock, Fatal> {
    let boundary = resolve_boundary(buf, nominal_vs, nominal_ve);
    let blen = buf.len() as u32;
    let vs = decl_newline_pos + 1;
    let mut line_start = vs;

    loop {
        if line_start >= blen {
            return Err(Fatal::NoBoundary { line });
        }
        let Some(g) = memchr::memchr(b'\n', &buf[line_start as usize..]).map(|off| line_start + off as u32) else {
            return Err(Fatal::NoBoundary { line });
        };
        if buf[line_start as usize..g as usize].iter().any(|&c| c != b'\r' && !is_raw_allowed(c, allow_bin_raw)) {
            return Err(Fatal::CtlChars { line });
        }
        let mut line_end = g;
        if line_end > line_start && buf[(line_end - 1) as usize] == b'\r' {
            line_end -= 1;
        }
        line += 1;

        if boundary.matches(&buf[line_start as usize..line_end as usize]) {
            return Ok(RawBlock { vs, ve: line_start, resume_pos: g, line });
        }
        line_start = g + 1;
    }
}
