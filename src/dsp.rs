//! DSP primitives: block clearing, the dequantizing IDCT and the
//! coefficient-order permutation machinery.
//!
//! Scan and quantization tables are permuted once at header-parse
//! time into the order the IDCT kernel consumes, so per-block work
//! never re-permutes anything. The scalar kernel here works in natural
//! coefficient order, hence an identity permutation; a SIMD kernel
//! with a different internal order only has to publish its own table.

use std::f32::consts::{FRAC_1_SQRT_2, PI};

/// Coefficients in one 8x8 block.
pub const BLOCK_SIZE: usize = 64;

/// Scan order for progressive frames, in natural coefficient order.
pub const PROGRESSIVE_SCAN: [u8; 64] = [
     0,  1,  8,  9,  2,  3, 10, 11,
    16, 17, 24, 25, 18, 19, 26, 27,
     4,  5, 12, 13,  6,  7, 14, 15,
    20, 21, 28, 29, 22, 23, 30, 31,
    32, 33, 40, 41, 34, 35, 42, 43,
    48, 49, 56, 57, 50, 51, 58, 59,
    36, 37, 44, 45, 38, 39, 46, 47,
    52, 53, 60, 61, 54, 55, 62, 63,
];

/// Scan order for interlaced frames.
pub const INTERLACED_SCAN: [u8; 64] = [
     0,  8,  1,  9, 16, 24, 17, 25,
     2, 10,  3, 11, 18, 26, 19, 27,
    32, 40, 33, 41, 48, 56, 49, 57,
    34, 42, 35, 43, 50, 58, 51, 59,
     4, 12,  5, 13, 20, 28, 21, 29,
     6, 14,  7, 15, 22, 30, 23, 31,
    36, 44, 37, 45, 52, 60, 53, 61,
    38, 46, 39, 47, 54, 62, 55, 63,
];

/// Maps `src` through `permutation`: `dst[i] = permutation[src[i]]`.
pub fn permute_scantable(
    dst: &mut [u8; 64],
    src: &[u8; 64],
    permutation: &[u8; 64],
) {
    for (out, &index) in dst.iter_mut().zip(src.iter()) {
        *out = permutation[index as usize];
    }
}

/// The per-stream DSP vtable: an inverse transform keyed to the raw
/// sample depth plus the coefficient permutation it consumes.
pub struct ProresDsp {
    /// Coefficient order expected by [`ProresDsp::idct_put`]; identity
    /// for the scalar kernel.
    pub idct_permutation: [u8; 64],
    bit_depth: u8,
    basis: [[f32; 8]; 8],
}

impl ProresDsp {
    /// Builds the kernel for 10- or 12-bit raw samples.
    pub fn new(bit_depth: u8) -> Self {
        let mut idct_permutation = [0u8; 64];
        for (i, p) in idct_permutation.iter_mut().enumerate() {
            *p = i as u8;
        }

        // Orthonormal 8-point DCT-III basis with the 1/2 C(u) weights
        // folded in, so two passes yield the 2D inverse transform.
        let mut basis = [[0f32; 8]; 8];
        for (x, row) in basis.iter_mut().enumerate() {
            for (u, b) in row.iter_mut().enumerate() {
                let cu = if u == 0 { FRAC_1_SQRT_2 } else { 1.0 };
                let angle = (2 * x + 1) as f32 * u as f32 * PI / 16.0;
                *b = 0.5 * cu * angle.cos();
            }
        }

        Self {
            idct_permutation,
            bit_depth,
            basis,
        }
    }

    /// Zeroes the 64 coefficients of one block.
    pub fn clear_block(block: &mut [i16]) {
        for coeff in &mut block[..BLOCK_SIZE] {
            *coeff = 0;
        }
    }

    /// Dequantizes `block` against `qmat`, inverse transforms it and
    /// stores one 8x8 tile of samples at `dst`, clipped to the
    /// unsigned range of the raw sample depth. `dst_stride` is in
    /// samples.
    pub fn idct_put(
        &self,
        dst: &mut [u16],
        dst_stride: usize,
        block: &[i16],
        qmat: &[i32; 64],
    ) {
        let max = (1i32 << self.bit_depth) - 1;

        let mut coeffs = [0f32; 64];
        for (i, out) in coeffs.iter_mut().enumerate() {
            *out = (i32::from(block[i]) * qmat[i]) as f32;
        }

        // Rows, then columns.
        let mut tmp = [0f32; 64];
        for v in 0..8 {
            for x in 0..8 {
                let mut acc = 0f32;
                for u in 0..8 {
                    acc += self.basis[x][u] * coeffs[v * 8 + u];
                }
                tmp[v * 8 + x] = acc;
            }
        }
        for x in 0..8 {
            for y in 0..8 {
                let mut acc = 0f32;
                for v in 0..8 {
                    acc += self.basis[y][v] * tmp[v * 8 + x];
                }
                let sample = (acc.round() as i32).max(0).min(max);
                dst[y * dst_stride + x] = sample as u16;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_permutation(table: &[u8; 64]) -> bool {
        let mut seen = [false; 64];
        for &i in table.iter() {
            seen[i as usize] = true;
        }
        seen.iter().all(|&s| s)
    }

    #[test]
    fn scan_tables_are_permutations() {
        assert!(is_permutation(&PROGRESSIVE_SCAN));
        assert!(is_permutation(&INTERLACED_SCAN));
    }

    #[test]
    fn identity_permutation_round_trips() {
        let dsp = ProresDsp::new(10);
        let mut once = [0u8; 64];
        permute_scantable(
            &mut once,
            &PROGRESSIVE_SCAN,
            &dsp.idct_permutation,
        );
        assert_eq!(once, PROGRESSIVE_SCAN);

        let mut twice = [0u8; 64];
        permute_scantable(&mut twice, &once, &dsp.idct_permutation);
        assert_eq!(twice, PROGRESSIVE_SCAN);
    }

    #[test]
    fn dc_only_block_is_flat() {
        let dsp = ProresDsp::new(10);
        let mut block = [0i16; 64];
        block[0] = 256;
        let qmat = [4i32; 64];

        let mut dst = [0u16; 64];
        dsp.idct_put(&mut dst, 8, &block, &qmat);
        // 256 * 4 / 8
        assert!(dst.iter().all(|&s| s == 128));
    }

    #[test]
    fn output_is_clipped_to_depth() {
        let dsp = ProresDsp::new(10);
        let mut block = [0i16; 64];
        block[0] = i16::MAX;
        let qmat = [64i32; 64];

        let mut dst = [0u16; 64];
        dsp.idct_put(&mut dst, 8, &block, &qmat);
        assert!(dst.iter().all(|&s| s == 1023));

        block[0] = i16::MIN;
        dsp.idct_put(&mut dst, 8, &block, &qmat);
        assert!(dst.iter().all(|&s| s == 0));
    }

    #[test]
    fn clear_block_zeroes_one_block_only() {
        let mut blocks = [7i16; 2 * BLOCK_SIZE];
        ProresDsp::clear_block(&mut blocks[..BLOCK_SIZE]);
        assert!(blocks[..BLOCK_SIZE].iter().all(|&c| c == 0));
        assert!(blocks[BLOCK_SIZE..].iter().all(|&c| c == 7));
    }
}
