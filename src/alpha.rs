//! Run-length differential alpha decoding.
//!
//! Unlike the image planes, alpha is not transform coded: the stream
//! carries deltas against a running value, interleaved with run
//! lengths that repeat it. Samples are coded at 8 or 16 bits per the
//! frame's alpha mode and widened to the output precision on the fly.

use crate::entropy::bitreader::BitReader;

/// Output precision of the expanded alpha samples, fixed per stream
/// by the codec tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaUnpack {
    To10,
    To12,
}

impl AlphaUnpack {
    /// Expands `dst.len()` alpha samples from the bitstream.
    ///
    /// `num_bits` is the coded width (8 or 16) from the frame header's
    /// alpha mode.
    pub fn unpack(self, br: &mut BitReader, dst: &mut [u16], num_bits: u32) {
        match self {
            AlphaUnpack::To10 => unpack_alpha(br, dst, num_bits, 10),
            AlphaUnpack::To12 => unpack_alpha(br, dst, num_bits, 12),
        }
    }
}

fn upscale(alpha: u32, num_bits: u32, precision: u32) -> u16 {
    let val = match (num_bits, precision) {
        (16, 10) => alpha >> 6,
        (16, _) => alpha >> 4,
        (8, 10) => (alpha << 2) | (alpha >> 6),
        _ => (alpha << 4) | (alpha >> 4),
    };
    val as u16
}

fn unpack_alpha(
    br: &mut BitReader,
    dst: &mut [u16],
    num_bits: u32,
    precision: u32,
) {
    let num_coeffs = dst.len();
    let mask = (1u32 << num_bits) - 1;
    let mut alpha = mask;
    let mut idx = 0;

    loop {
        loop {
            let val = if br.get_bit() {
                br.get_bits(num_bits)
            } else {
                let raw = br.get_bits(if num_bits == 16 { 7 } else { 4 });
                let val = (raw + 2) >> 1;
                if raw & 1 != 0 {
                    val.wrapping_neg()
                } else {
                    val
                }
            };
            alpha = alpha.wrapping_add(val) & mask;
            dst[idx] = upscale(alpha, num_bits, precision);
            idx += 1;
            if idx >= num_coeffs {
                break;
            }
            if !(br.bits_left() > 0 && br.get_bit()) {
                break;
            }
        }

        let mut run = br.get_bits(4) as usize;
        if run == 0 {
            run = br.get_bits(11) as usize;
        }
        run = run.min(num_coeffs - idx);

        let sample = upscale(alpha, num_bits, precision);
        for out in &mut dst[idx..idx + run] {
            *out = sample;
        }
        idx += run;

        if idx >= num_coeffs {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_run_widens_to_full_scale() {
        // One absolute 8-bit sample with a zero delta (alpha stays at
        // the initial 0xFF), a stop bit, then an escaped 11-bit run of
        // 255: bits 1 00000000 0 0000 00011111111.
        let buf = [0x80, 0x00, 0x7F, 0x80];
        let mut br = BitReader::new(&buf);

        let mut dst = [0u16; 256];
        AlphaUnpack::To12.unpack(&mut br, &mut dst, 8);
        assert!(dst.iter().all(|&a| a == 0xFFF));

        let mut br = BitReader::new(&buf);
        let mut dst = [0u16; 256];
        AlphaUnpack::To10.unpack(&mut br, &mut dst, 8);
        assert!(dst.iter().all(|&a| a == 0x3FF));
    }

    #[test]
    fn small_negative_delta() {
        // Delta path: 4 raw bits 0b0011 give magnitude (3+2)>>1 = 2
        // with the sign bit set, so alpha drops from 0xFF to 0xFD; a
        // stop bit and a run of 1 repeat it.
        let buf = [0b0_0011_0_00, 0b01_000000];
        let mut br = BitReader::new(&buf);

        let mut dst = [0u16; 2];
        AlphaUnpack::To12.unpack(&mut br, &mut dst, 8);
        assert_eq!(dst[0], 0xFDF);
        assert_eq!(dst[1], 0xFDF);
    }
}
