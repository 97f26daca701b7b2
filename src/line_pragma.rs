//! Line-pragma registration and dispatch table.
//!
//! A handler is a capability: "given the trigger byte and the tokenizer,
//! decide whether to continue, optionally rewriting the input buffer".
//! The source this crate is modeled on passes an untyped `interface{}`
//! context alongside each handler and has it downcast on every call; Rust
//! closures make that unnecessary; a handler closes over whatever context
//! it needs directly.

use crate::tokenizer::Tokenizer;

/// A registered line-pragma handler.
///
/// Returning `false` aborts the parse with `Fatal::BadLnPrag`. On success
/// the handler may have replaced `tokenizer`'s input buffer entirely; it
/// must leave `tokenizer.inpos` pointing at a `\n` byte (see
/// [`crate::tokenizer::Tokenizer::register_line_pragma`]).
pub type LinePragmaHandler = Box<dyn FnMut(u8, &mut Tokenizer) -> bool>;

/// Fixed-capacity registration table: at most eight trigger bytes, each
/// `<= 0x2F`. The bound is part of the contract, not an implementation
/// detail, so this is a plain array rather than a `Vec`.
#[derive(Default)]
pub struct LinePragmaTable {
    slots: [Option<(u8, LinePragmaHandler)>; 8],
}

impl LinePragmaTable {
    /// Registers `handler` for `trigger`. Fails if `trigger` is `> 0x2F`,
    /// already registered, or the table is full.
    pub fn register(&mut self, trigger: u8, handler: LinePragmaHandler) -> bool {
        if trigger > 0x2F {
            return false;
        }
        if self.slots.iter().flatten().any(|(c, _)| *c == trigger) {
            return false;
        }
        for slot in &mut self.slots {
            if slot.is_none() {
                *slot = Some((trigger, handler));
                return true;
            }
        }
        false
    }

    /// Returns the handler for `trigger`, if registered, leaving its slot
    /// temporarily empty so the tokenizer can call it with `&mut self`
    /// borrowed elsewhere. Callers must put it back with
    /// [`Self::restore`] once the call completes.
    pub(crate) fn take(&mut self, trigger: u8) -> Option<LinePragmaHandler> {
        for slot in &mut self.slots {
            if matches!(slot, Some((c, _)) if *c == trigger) {
                return slot.take().map(|(_, h)| h);
            }
        }
        None
    }

    pub(crate) fn restore(&mut self, trigger: u8, handler: LinePragmaHandler) {
        for slot in &mut self.slots {
            if slot.is_none() {
                *slot = Some((trigger, handler));
                return;
            }
        }
        debug_assert!(false, "line-pragma table had no free slot to restore {trigger:#04x} into");
    }

    pub(crate) fn is_registered(&self, trigger: u8) -> bool {
        self.slots.iter().flatten().any(|(c, _)| *c == trigger)
    }

    pub(crate) fn clear(&mut self) {
        self.slots = Default::default();
    }
}
