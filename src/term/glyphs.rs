//! Reference-counted glyph cache.
//!
//! Cells store a single symbol byte, so multi-byte UTF-8 code points live
//! in this fixed table and cells carry a one-byte reference into it. ASCII
//! never takes a slot: bytes below 0x7F are their own reference. The table
//! has 128 slots because references are encoded as `0x80 | slot`, the only
//! byte range disjoint from the ASCII bypass; 0x7F is reserved as the
//! always-valid replacement reference.

use thiserror::Error;
use tracing::{debug, warn};

/// Number of cache slots.
pub const CACHE_SLOTS: usize = 128;

/// Reference that always resolves to U+FFFD. Returned when the cache is
/// full and substituted for stale references.
pub const REPLACEMENT_REF: u8 = 0x7F;

const REPLACEMENT_UTF8: [u8; 4] = [0xEF, 0xBF, 0xBD, 0x00];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GlyphError {
    /// The referenced slot has been freed: a use-after-free by the caller.
    #[error("stale glyph reference 0x{0:02x}")]
    StaleReference(u8),
}

/// The 1-4 bytes of one code point, returned by value so callers can copy
/// them straight into cells or output buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphBytes {
    buf: [u8; 4],
    len: u8,
}

impl GlyphBytes {
    fn new(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 4];
        buf[..bytes.len()].copy_from_slice(bytes);
        Self {
            buf,
            len: bytes.len() as u8,
        }
    }

    /// The U+FFFD replacement character.
    pub fn replacement() -> Self {
        Self {
            buf: REPLACEMENT_UTF8,
            len: 3,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[derive(Clone, Copy)]
struct Slot {
    bytes: [u8; 4],
    len: u8,
    refs: u16,
}

const FREE_SLOT: Slot = Slot {
    bytes: [0; 4],
    len: 0,
    refs: 0,
};

/// Fixed-capacity, reference-counted code-point table.
pub struct GlyphCache {
    slots: [Slot; CACHE_SLOTS],
}

impl Default for GlyphCache {
    fn default() -> Self {
        Self::new()
    }
}

impl GlyphCache {
    pub fn new() -> Self {
        Self {
            slots: [FREE_SLOT; CACHE_SLOTS],
        }
    }

    /// Intern a validated UTF-8 code point (1-4 bytes) and return its cell
    /// reference. ASCII bypasses the table and returns the byte itself. A
    /// full table returns [`REPLACEMENT_REF`] and logs - it never aborts.
    pub fn add(&mut self, bytes: &[u8]) -> u8 {
        debug_assert!(!bytes.is_empty() && bytes.len() <= 4);
        if bytes.len() == 1 && bytes[0] < REPLACEMENT_REF {
            return bytes[0];
        }

        let mut free = None;
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.refs == 0 {
                if free.is_none() {
                    free = Some(i);
                }
            } else if slot.len as usize == bytes.len()
                && &slot.bytes[..slot.len as usize] == bytes
            {
                slot.refs = slot.refs.saturating_add(1);
                return 0x80 | i as u8;
            }
        }

        match free {
            Some(i) => {
                let slot = &mut self.slots[i];
                slot.bytes = [0; 4];
                slot.bytes[..bytes.len()].copy_from_slice(bytes);
                slot.len = bytes.len() as u8;
                slot.refs = 1;
                0x80 | i as u8
            }
            None => {
                warn!("glyph cache full ({CACHE_SLOTS} slots), substituting U+FFFD");
                REPLACEMENT_REF
            }
        }
    }

    /// Resolve a reference to its stored bytes without touching refcounts.
    /// A freed slot is a use-after-free: logged and reported.
    pub fn retrieve(&self, reference: u8) -> Result<GlyphBytes, GlyphError> {
        if reference < REPLACEMENT_REF {
            return Ok(GlyphBytes::new(&[reference]));
        }
        if reference == REPLACEMENT_REF {
            return Ok(GlyphBytes::replacement());
        }
        let slot = &self.slots[(reference & 0x7F) as usize];
        if slot.refs == 0 {
            warn!("stale glyph reference 0x{reference:02x}");
            return Err(GlyphError::StaleReference(reference));
        }
        Ok(GlyphBytes::new(&slot.bytes[..slot.len as usize]))
    }

    /// [`retrieve`](Self::retrieve) with the graceful-fallback policy:
    /// stale references resolve to U+FFFD.
    pub fn bytes_or_replacement(&self, reference: u8) -> GlyphBytes {
        self.retrieve(reference)
            .unwrap_or_else(|_| GlyphBytes::replacement())
    }

    /// Drop one reference; the slot frees when the count reaches zero.
    /// ASCII and the replacement reference are no-ops.
    pub fn remove(&mut self, reference: u8) {
        if reference <= REPLACEMENT_REF {
            return;
        }
        let slot = &mut self.slots[(reference & 0x7F) as usize];
        if slot.refs == 0 {
            debug!("remove on already-free glyph slot 0x{reference:02x}");
        } else {
            slot.refs -= 1;
        }
    }

    /// Free every slot (the resize path clears the grid and cache together).
    pub fn clear(&mut self) {
        self.slots = [FREE_SLOT; CACHE_SLOTS];
    }

    /// Number of occupied slots, for diagnostics and tests.
    pub fn live_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.refs > 0).count()
    }
}
