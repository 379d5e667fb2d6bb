//! ProRes entropy decoding.
//!
//! Every syntax element outside the headers is coded with a hybrid of
//! Rice and exponential-Golomb codes. The split point between the two
//! and the code orders come from a packed codebook byte, and the
//! codebook switches after each symbol based on the value of the
//! previous one (see [`tables`]).

pub mod bitreader;
pub mod tables;

use crate::error::{Error, Result};

use bitreader::BitReader;
use tables::{DC_CODEBOOK, FIRST_DC_CB, LEV_TO_CB, RUN_TO_CB};

/// Decodes a single codeword with the given codebook descriptor.
///
/// Short symbols take the Rice branch; once the unary prefix exceeds
/// `switch_bits` the code is read as exponential Golomb. A codeword
/// longer than 31 bits cannot occur in a valid stream.
pub fn decode_codeword(br: &mut BitReader, codebook: u8) -> Result<u32> {
    let switch_bits = u32::from(codebook & 3);
    let rice_order = u32::from(codebook >> 5);
    let exp_order = u32::from((codebook >> 2) & 7);

    let window = br.show_bits(32);
    let q = window.leading_zeros();

    if q > switch_bits {
        // exp golomb
        let bits =
            exp_order as i32 - switch_bits as i32 + (q as i32) * 2;
        if bits > 31 {
            return Err(Error::InvalidData(format!(
                "codeword length {} exceeds 31 bits",
                bits
            )));
        }
        let bits = bits as u32;
        let val = br
            .show_bits(bits)
            .wrapping_sub(1 << exp_order)
            .wrapping_add((switch_bits + 1) << rice_order);
        br.skip_bits(bits);
        Ok(val)
    } else if rice_order > 0 {
        br.skip_bits(q + 1);
        let val = (q << rice_order) + br.show_bits(rice_order);
        br.skip_bits(rice_order);
        Ok(val)
    } else {
        br.skip_bits(q + 1);
        Ok(q)
    }
}

/// Maps an unsigned magnitude to a signed value:
/// 0, -1, 1, -2, 2, ...
pub fn to_signed(val: u32) -> i32 {
    ((val >> 1) as i32) ^ -((val & 1) as i32)
}

/// Decodes one DC coefficient per 8x8 block of a slice plane.
///
/// The first DC is coded standalone; the rest are deltas against a
/// running prediction whose sign sticks until an even magnitude or a
/// zero resets it. Each DC lands in the first slot of its block, so
/// the output walks `out` in strides of 64.
pub fn decode_dc_coeffs(
    br: &mut BitReader,
    out: &mut [i16],
    blocks_per_slice: usize,
) -> Result<()> {
    let code = decode_codeword(br, FIRST_DC_CB)?;
    let mut prev_dc = to_signed(code) as i16;
    out[0] = prev_dc;

    let mut code: u32 = 5;
    let mut sign: i32 = 0;
    for i in 1..blocks_per_slice {
        code = decode_codeword(br, DC_CODEBOOK[code.min(6) as usize])?;
        if code != 0 {
            sign ^= -((code & 1) as i32);
        } else {
            sign = 0;
        }
        let magnitude = code as i32;
        let delta =
            ((magnitude.wrapping_add(1) >> 1) ^ sign).wrapping_sub(sign);
        prev_dc = prev_dc.wrapping_add(delta as i16);
        out[i * 64] = prev_dc;
    }
    Ok(())
}

/// Decodes AC run/level pairs into scanned coefficient positions.
///
/// Positions are enumerated across the interleaved blocks of the
/// slice: the low bits select the block, the high bits the coefficient
/// index, which goes through the permuted `scan` table. The loop stops
/// once the remaining bits are exhausted or all zero; advancing past
/// the last coefficient of the slice is a bitstream error.
pub fn decode_ac_coeffs(
    br: &mut BitReader,
    out: &mut [i16],
    blocks_per_slice: usize,
    scan: &[u8; 64],
) -> Result<()> {
    let log2_block_count = blocks_per_slice.trailing_zeros();
    let max_coeffs = 64 << log2_block_count;
    let block_mask = blocks_per_slice - 1;

    let mut run: u32 = 4;
    let mut level: u32 = 2;

    let mut pos = block_mask;
    loop {
        let left = br.bits_left();
        if left <= 0 || (left < 32 && br.show_bits(left as u32) == 0) {
            break;
        }

        run = decode_codeword(br, RUN_TO_CB[run.min(15) as usize])?;
        pos = pos.wrapping_add(run as usize + 1);
        if pos >= max_coeffs {
            return Err(Error::InvalidData(format!(
                "ac coefficient position {} out of {}",
                pos, max_coeffs
            )));
        }

        level =
            decode_codeword(br, LEV_TO_CB[level.min(9) as usize])?
                .wrapping_add(1);

        let sign = br.show_sbits(1);
        br.skip_bits(1);
        let coeff = (level as i32 ^ sign).wrapping_sub(sign);

        let block = pos & block_mask;
        let index = scan[pos >> log2_block_count] as usize;
        out[(block << 6) + index] = coeff as i16;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::bitreader::BitReader;
    use super::*;

    #[test]
    fn rice_branch() {
        // 0xB8: rice order 5, exp order 6, switch bits 0. The value 3
        // codes as a single 1 bit followed by five remainder bits.
        let mut br = BitReader::new(&[0b1_00011_00]);
        assert_eq!(decode_codeword(&mut br, 0xB8).unwrap(), 3);
        assert_eq!(br.bits_left(), 2);
    }

    #[test]
    fn unary_branch() {
        // 0x06: rice order 0 with switch bits 2, so a short unary
        // prefix is the value itself.
        let mut br = BitReader::new(&[0b01_000000]);
        assert_eq!(decode_codeword(&mut br, 0x06).unwrap(), 1);
        assert_eq!(br.bits_left(), 6);
    }

    #[test]
    fn exp_golomb_branch() {
        // 0x04: exp order 1, switch bits 0. Two leading zeros switch
        // to exp golomb with bits = 1 + 2*2 = 5; the window 00110
        // decodes to 6 - 2 + 1 = 5.
        let mut br = BitReader::new(&[0b00110_000]);
        assert_eq!(decode_codeword(&mut br, 0x04).unwrap(), 5);
        assert_eq!(br.bits_left(), 3);
    }

    #[test]
    fn overlong_codeword_is_rejected() {
        // An all-zero window cannot hold a terminating marker bit.
        let mut br = BitReader::new(&[0; 8]);
        assert!(decode_codeword(&mut br, 0xB8).is_err());
    }

    #[test]
    fn signed_mapping() {
        let expect = [0, -1, 1, -2, 2, -3, 3];
        for (val, &sig) in expect.iter().enumerate() {
            assert_eq!(to_signed(val as u32), sig);
        }
    }

    #[test]
    fn dc_first_value() {
        // First DC is zig-zag signed: magnitude 3 means -2.
        let mut br = BitReader::new(&[0b1_00011_00]);
        let mut out = [0i16; 64];
        decode_dc_coeffs(&mut br, &mut out, 1).unwrap();
        assert_eq!(out[0], -2);
    }

    #[test]
    fn ac_empty_payload_is_all_zero() {
        let mut br = BitReader::new(&[0, 0, 0]);
        let mut out = [0i16; 4 * 64];
        let scan = {
            let mut s = [0u8; 64];
            for (i, v) in s.iter_mut().enumerate() {
                *v = i as u8;
            }
            s
        };
        decode_ac_coeffs(&mut br, &mut out, 4, &scan).unwrap();
        assert!(out.iter().all(|&c| c == 0));
    }
}
