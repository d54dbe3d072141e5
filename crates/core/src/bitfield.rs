//! Legacy bitfield codec.
//!
//! Older resource rows (members, events) carry a single integer `flags`
//! column where each bit is a named boolean. Bit semantics are fixed per
//! resource type; new capabilities are modeled as flag grants, never as new
//! bits. These functions exist only for backward compatibility with those
//! rows.
//!
//! All functions are pure and total over `u64`: a bit index at or beyond the
//! word width is a no-op (mask 0) rather than a panic.

/// Bit 0: the resource is active.
pub const BIT_ACTIVE: u8 = 0;
/// Bit 1: the resource is publicly visible.
pub const BIT_PUBLIC: u8 = 1;

fn mask(bit: u8) -> u64 {
    1u64.checked_shl(u32::from(bit)).unwrap_or(0)
}

/// True iff `bit` is set in `value`.
pub fn has_flag(value: u64, bit: u8) -> bool {
    value & mask(bit) != 0
}

/// Set `bit` in `value`, preserving all other bits.
pub fn set_flag(value: u64, bit: u8) -> u64 {
    value | mask(bit)
}

/// Clear `bit` in `value`, preserving all other bits.
pub fn clear_flag(value: u64, bit: u8) -> u64 {
    value & !mask(bit)
}

/// Toggle `bit` in `value`, preserving all other bits.
pub fn toggle_flag(value: u64, bit: u8) -> u64 {
    value ^ mask(bit)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
