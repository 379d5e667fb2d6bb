//! Per-slice decoding.
//!
//! A slice is a run of 1 to 8 macroblocks inside one macroblock row
//! and the unit of parallel decode. Workers share nothing mutable:
//! each one decodes its luma, chroma and alpha payloads into owned
//! tiles which the frame driver commits into the output planes after
//! the dispatch barrier.

use byteorder::{BigEndian, ByteOrder};

use crate::alpha::AlphaUnpack;
use crate::dsp::{ProresDsp, BLOCK_SIZE};
use crate::entropy::bitreader::BitReader;
use crate::entropy::{decode_ac_coeffs, decode_dc_coeffs};
use crate::error::{Error, Result};

/// Largest number of 8x8 blocks a slice plane can hold: 8 macroblocks
/// of 4 luma blocks each.
pub(crate) const MAX_BLOCKS_PER_SLICE: usize = 8 * 4;

/// One entry of the slice table.
#[derive(Debug, Clone, Copy)]
pub struct SliceDescriptor {
    /// Offset of the slice payload inside the picture buffer.
    pub data_offset: usize,
    pub data_size: usize,
    /// Position and length of the slice's macroblock run.
    pub mb_x: usize,
    pub mb_y: usize,
    pub mb_count: usize,
}

/// Frame-constant state borrowed by every worker of one picture.
pub(crate) struct SliceParams<'a> {
    pub dsp: &'a ProresDsp,
    pub scan: &'a [u8; 64],
    pub qmat_luma: &'a [u8; 64],
    pub qmat_chroma: &'a [u8; 64],
    pub chroma_444: bool,
    pub alpha_info: u8,
    pub alpha_unpack: AlphaUnpack,
    pub grayscale: bool,
}

/// Decoded output of one slice: 16 rows per plane, tile stride equal
/// to the tile width.
pub(crate) struct SliceTiles {
    pub luma: Vec<u16>,
    pub chroma_u: Option<Vec<u16>>,
    pub chroma_v: Option<Vec<u16>>,
    pub alpha: Option<Vec<u16>>,
}

/// Coefficient scratch for one slice plane, aligned for SIMD kernels.
#[repr(align(32))]
struct BlockScratch([i16; MAX_BLOCKS_PER_SLICE * BLOCK_SIZE]);

impl BlockScratch {
    fn new() -> Self {
        BlockScratch([0; MAX_BLOCKS_PER_SLICE * BLOCK_SIZE])
    }
}

/// Maps the coded quantiser byte to the effective scale: linear up to
/// 128, then `(qscale - 96) << 2` for the high-quality extension.
fn qscale_curve(qscale: u8) -> i32 {
    let qscale = i32::from(qscale.max(1).min(224));
    if qscale > 128 {
        (qscale - 96) << 2
    } else {
        qscale
    }
}

fn decode_slice_luma(
    params: &SliceParams,
    scratch: &mut BlockScratch,
    data: &[u8],
    mb_count: usize,
    qmat: &[i32; 64],
    dst: &mut [u16],
    dst_stride: usize,
) -> Result<()> {
    let blocks_per_slice = mb_count << 2;
    for block in 0..blocks_per_slice {
        ProresDsp::clear_block(&mut scratch.0[block << 6..]);
    }

    let mut br = BitReader::new(data);
    decode_dc_coeffs(&mut br, &mut scratch.0, blocks_per_slice)?;
    decode_ac_coeffs(&mut br, &mut scratch.0, blocks_per_slice, params.scan)?;

    let dsp = params.dsp;
    let mut block = 0;
    let mut x = 0;
    for _ in 0..mb_count {
        dsp.idct_put(&mut dst[x..], dst_stride, &scratch.0[block..], qmat);
        dsp.idct_put(
            &mut dst[x + 8..],
            dst_stride,
            &scratch.0[block + 64..],
            qmat,
        );
        dsp.idct_put(
            &mut dst[8 * dst_stride + x..],
            dst_stride,
            &scratch.0[block + 128..],
            qmat,
        );
        dsp.idct_put(
            &mut dst[8 * dst_stride + x + 8..],
            dst_stride,
            &scratch.0[block + 192..],
            qmat,
        );
        block += 4 * BLOCK_SIZE;
        x += 16;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn decode_slice_chroma(
    params: &SliceParams,
    scratch: &mut BlockScratch,
    data: &[u8],
    mb_count: usize,
    qmat: &[i32; 64],
    dst: &mut [u16],
    dst_stride: usize,
    log2_blocks_per_mb: usize,
) -> Result<()> {
    let blocks_per_slice = mb_count << log2_blocks_per_mb;
    for block in 0..blocks_per_slice {
        ProresDsp::clear_block(&mut scratch.0[block << 6..]);
    }

    // Some encoders emit empty chroma scans to fake grayscale; those
    // planes reconstruct as all zeros.
    if !data.is_empty() {
        let mut br = BitReader::new(data);
        decode_dc_coeffs(&mut br, &mut scratch.0, blocks_per_slice)?;
        decode_ac_coeffs(
            &mut br,
            &mut scratch.0,
            blocks_per_slice,
            params.scan,
        )?;
    }

    let dsp = params.dsp;
    let mut block = 0;
    let mut x = 0;
    for _ in 0..mb_count {
        for _ in 0..log2_blocks_per_mb {
            dsp.idct_put(
                &mut dst[x..],
                dst_stride,
                &scratch.0[block..],
                qmat,
            );
            dsp.idct_put(
                &mut dst[8 * dst_stride + x..],
                dst_stride,
                &scratch.0[block + 64..],
                qmat,
            );
            block += 2 * BLOCK_SIZE;
            x += 8;
        }
    }
    Ok(())
}

fn decode_slice_alpha(params: &SliceParams, data: &[u8], dst: &mut [u16]) {
    let num_bits = if params.alpha_info == 2 { 16 } else { 8 };
    let mut br = BitReader::new(data);
    params.alpha_unpack.unpack(&mut br, dst, num_bits);
}

/// Decodes one slice into its tiles. `picture` is the buffer the
/// descriptor's payload range points into.
pub(crate) fn decode_slice(
    desc: &SliceDescriptor,
    picture: &[u8],
    params: &SliceParams,
) -> Result<SliceTiles> {
    let data = &picture[desc.data_offset..desc.data_offset + desc.data_size];

    let hdr_size = (data[0] >> 3) as usize;
    if hdr_size < 6 || hdr_size > desc.data_size {
        return Err(Error::InvalidData(format!(
            "wrong slice header size: {}",
            hdr_size
        )));
    }
    let qscale = qscale_curve(data[1]);

    let y_data_size = BigEndian::read_u16(&data[2..]) as i64;
    let u_data_size = BigEndian::read_u16(&data[4..]) as i64;
    let mut v_data_size =
        desc.data_size as i64 - y_data_size - u_data_size - hdr_size as i64;
    if hdr_size > 7 {
        v_data_size = i64::from(BigEndian::read_u16(&data[6..]));
    }
    let a_data_size = desc.data_size as i64
        - y_data_size
        - u_data_size
        - v_data_size
        - hdr_size as i64;

    if v_data_size < 0 || a_data_size < 0 {
        return Err(Error::InvalidData(
            "invalid plane data size".to_owned(),
        ));
    }

    let y_data_size = y_data_size as usize;
    let u_data_size = u_data_size as usize;
    let v_data_size = v_data_size as usize;
    let a_data_size = a_data_size as usize;

    let mut qmat_luma_scaled = [0i32; 64];
    let mut qmat_chroma_scaled = [0i32; 64];
    for i in 0..64 {
        qmat_luma_scaled[i] = i32::from(params.qmat_luma[i]) * qscale;
        qmat_chroma_scaled[i] = i32::from(params.qmat_chroma[i]) * qscale;
    }

    let payload = &data[hdr_size..];
    let (y_data, rest) = payload.split_at(y_data_size);
    let (u_data, rest) = rest.split_at(u_data_size);
    let (v_data, a_data) = rest.split_at(v_data_size);

    let mut scratch = BlockScratch::new();

    let luma_width = desc.mb_count << 4;
    let mut luma = vec![0u16; 16 * luma_width];
    decode_slice_luma(
        params,
        &mut scratch,
        y_data,
        desc.mb_count,
        &qmat_luma_scaled,
        &mut luma,
        luma_width,
    )?;

    let (chroma_u, chroma_v) = if params.grayscale {
        (None, None)
    } else {
        let log2_blocks_per_mb = if params.chroma_444 { 2 } else { 1 };
        let chroma_width = desc.mb_count << (log2_blocks_per_mb + 2);
        let mut u = vec![0u16; 16 * chroma_width];
        decode_slice_chroma(
            params,
            &mut scratch,
            u_data,
            desc.mb_count,
            &qmat_chroma_scaled,
            &mut u,
            chroma_width,
            log2_blocks_per_mb,
        )?;
        let mut v = vec![0u16; 16 * chroma_width];
        decode_slice_chroma(
            params,
            &mut scratch,
            v_data,
            desc.mb_count,
            &qmat_chroma_scaled,
            &mut v,
            chroma_width,
            log2_blocks_per_mb,
        )?;
        (Some(u), Some(v))
    };

    let alpha = if params.alpha_info > 0 && a_data_size > 0 {
        let mut tile = vec![0u16; 16 * luma_width];
        decode_slice_alpha(params, a_data, &mut tile);
        Some(tile)
    } else {
        None
    };

    Ok(SliceTiles {
        luma,
        chroma_u,
        chroma_v,
        alpha,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qscale_is_monotone_with_one_jump() {
        let mut prev = qscale_curve(1);
        for q in 2..=224u8 {
            let cur = qscale_curve(q);
            assert!(cur >= prev, "curve decreases at {}", q);
            prev = cur;
        }

        // Linear region, then the discontinuity at 128.
        assert_eq!(qscale_curve(127), 127);
        assert_eq!(qscale_curve(128), 128);
        assert_eq!(qscale_curve(129), (129 - 96) << 2);
        assert_eq!(qscale_curve(224), 512);
    }

    #[test]
    fn qscale_clamps_reserved_values() {
        assert_eq!(qscale_curve(0), 1);
        assert_eq!(qscale_curve(255), 512);
    }
}
