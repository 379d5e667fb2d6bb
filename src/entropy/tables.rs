//! Adaptive codebook selection tables.
//!
//! A codebook descriptor byte packs three fields: `rice_order` in the
//! top three bits, `exp_order` in the middle three and `switch_bits`
//! in the bottom two. The previously decoded symbol selects the next
//! codebook.

/// Codebook for the first DC coefficient of every slice plane.
pub const FIRST_DC_CB: u8 = 0xB8;

/// DC codebooks, indexed by the previous DC magnitude (saturated at 6).
pub const DC_CODEBOOK: [u8; 7] = [0x04, 0x28, 0x28, 0x4D, 0x4D, 0x70, 0x70];

/// Run codebooks, indexed by the previous run value (saturated at 15).
pub const RUN_TO_CB: [u8; 16] = [
    0x06, 0x06, 0x05, 0x05, 0x04, 0x29, 0x29, 0x29, 0x29, 0x28, 0x28, 0x28,
    0x28, 0x28, 0x28, 0x4C,
];

/// Level codebooks, indexed by the previous level value (saturated at 9).
pub const LEV_TO_CB: [u8; 10] =
    [0x04, 0x0A, 0x05, 0x06, 0x04, 0x28, 0x28, 0x28, 0x28, 0x4C];
