//! Picture header parsing and slice table construction.
//!
//! A progressive frame holds one picture, an interlaced frame two
//! (one per field). The slice count written by the encoder is ignored
//! and always re-derived from the macroblock geometry: some encoders
//! write a wrong value, and the greedy power-of-two partition below is
//! fully determined by the picture width anyway.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};
use crate::slice::SliceDescriptor;

/// Parses one picture header from `buf`, rebuilding `slices` as the
/// table of payload ranges and macroblock rectangles. Returns the
/// size of the whole picture (header plus slice payloads).
pub fn parse_picture_header(
    buf: &[u8],
    mb_width: usize,
    mb_height: usize,
    slices: &mut Vec<SliceDescriptor>,
) -> Result<usize> {
    if buf.is_empty() {
        return Err(Error::InvalidData("empty picture".to_owned()));
    }

    let hdr_size = (buf[0] >> 3) as usize;
    if hdr_size < 8 || hdr_size > buf.len() {
        return Err(Error::InvalidData(format!(
            "wrong picture header size: {}",
            hdr_size
        )));
    }

    let pic_data_size = BigEndian::read_u32(&buf[1..]) as usize;
    if pic_data_size > buf.len() {
        return Err(Error::InvalidData(format!(
            "wrong picture data size: {}",
            pic_data_size
        )));
    }

    // Bytes 5..7 hold the written slice count, which is not trusted.
    let log2_slice_mb_width = (buf[7] >> 4) as usize;
    let log2_slice_mb_height = (buf[7] & 0xF) as usize;
    if log2_slice_mb_width > 3 || log2_slice_mb_height != 0 {
        return Err(Error::InvalidData(format!(
            "unsupported slice resolution: {}x{}",
            1 << log2_slice_mb_width,
            1 << log2_slice_mb_height
        )));
    }

    let slices_per_row = (mb_width >> log2_slice_mb_width)
        + (mb_width & ((1 << log2_slice_mb_width) - 1)).count_ones() as usize;
    let slice_count = mb_height * slices_per_row;
    if slice_count == 0 {
        return Err(Error::InvalidData(
            "picture has no slices".to_owned(),
        ));
    }

    if hdr_size + slice_count * 2 > buf.len() {
        return Err(Error::InvalidData(format!(
            "wrong slice count: {}",
            slice_count
        )));
    }

    slices.clear();
    slices.reserve(slice_count);

    let index_ptr = hdr_size;
    let mut data_offset = hdr_size + slice_count * 2;

    let mut slice_mb_count = 1 << log2_slice_mb_width;
    let mut mb_x = 0;
    let mut mb_y = 0;

    for i in 0..slice_count {
        let data_size =
            BigEndian::read_u16(&buf[index_ptr + i * 2..]) as usize;
        if data_size < 6 {
            return Err(Error::InvalidData(format!(
                "wrong slice data size: {}",
                data_size
            )));
        }
        if data_offset + data_size > buf.len() {
            return Err(Error::InvalidData(
                "slice out of bounds".to_owned(),
            ));
        }

        while mb_width - mb_x < slice_mb_count {
            slice_mb_count >>= 1;
        }

        slices.push(SliceDescriptor {
            data_offset,
            data_size,
            mb_x,
            mb_y,
            mb_count: slice_mb_count,
        });

        data_offset += data_size;
        mb_x += slice_mb_count;
        if mb_x == mb_width {
            slice_mb_count = 1 << log2_slice_mb_width;
            mb_x = 0;
            mb_y += 1;
        }
    }

    if mb_x != 0 || mb_y != mb_height {
        return Err(Error::InvalidData(format!(
            "wrong macroblock count: y {} of {}",
            mb_y, mb_height
        )));
    }

    Ok(pic_data_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a picture whose every slice is a 6-byte stub.
    fn stub_picture(
        log2_slice_mb_width: u8,
        mb_width: usize,
        mb_height: usize,
    ) -> Vec<u8> {
        let slices_per_row = (mb_width >> log2_slice_mb_width)
            + (mb_width & ((1 << log2_slice_mb_width) - 1)).count_ones()
                as usize;
        let slice_count = mb_height * slices_per_row;

        let mut buf = vec![0u8; 8];
        buf[0] = 8 << 3;
        buf[7] = log2_slice_mb_width << 4;
        for _ in 0..slice_count {
            buf.extend_from_slice(&6u16.to_be_bytes());
        }
        for _ in 0..slice_count {
            buf.extend_from_slice(&[0u8; 6]);
        }
        let total = buf.len() as u32;
        buf[1..5].copy_from_slice(&total.to_be_bytes());
        buf
    }

    fn tiling_is_exact(slices: &[SliceDescriptor], mb_width: usize, mb_height: usize) {
        let mut covered = vec![false; mb_width * mb_height];
        for slice in slices {
            assert!(slice.mb_count.is_power_of_two());
            assert!(slice.mb_x + slice.mb_count <= mb_width);
            assert!(slice.mb_y < mb_height);
            for x in slice.mb_x..slice.mb_x + slice.mb_count {
                let cell = &mut covered[slice.mb_y * mb_width + x];
                assert!(!*cell, "overlap at ({}, {})", x, slice.mb_y);
                *cell = true;
            }
        }
        assert!(covered.iter().all(|&c| c));
    }

    #[test]
    fn greedy_partition_tiles_exactly() {
        // mb_width 5 with 8-wide slices: each row shrinks to 4 + 1.
        let buf = stub_picture(3, 5, 2);
        let mut slices = Vec::new();
        parse_picture_header(&buf, 5, 2, &mut slices).unwrap();

        assert_eq!(slices.len(), 4);
        assert_eq!(
            slices
                .iter()
                .map(|s| (s.mb_x, s.mb_y, s.mb_count))
                .collect::<Vec<_>>(),
            vec![(0, 0, 4), (4, 0, 1), (0, 1, 4), (4, 1, 1)]
        );
        tiling_is_exact(&slices, 5, 2);
    }

    #[test]
    fn ragged_widths_tile_exactly() {
        for &mb_width in &[1usize, 2, 3, 7, 11, 16, 31] {
            for log2 in 0..=3u8 {
                let buf = stub_picture(log2, mb_width, 3);
                let mut slices = Vec::new();
                parse_picture_header(&buf, mb_width, 3, &mut slices)
                    .unwrap();
                tiling_is_exact(&slices, mb_width, 3);
            }
        }
    }

    #[test]
    fn slice_header_below_minimum_is_rejected() {
        let mut buf = stub_picture(0, 2, 1);
        buf[9] = 5; // first slice size -> 5
        let mut slices = Vec::new();
        assert!(
            parse_picture_header(&buf, 2, 1, &mut slices).is_err()
        );
    }

    #[test]
    fn overrunning_slice_is_rejected() {
        let mut buf = stub_picture(0, 2, 1);
        let len = buf.len();
        buf.truncate(len - 3);
        let total = buf.len() as u32;
        buf[1..5].copy_from_slice(&total.to_be_bytes());
        let mut slices = Vec::new();
        assert!(
            parse_picture_header(&buf, 2, 1, &mut slices).is_err()
        );
    }

    #[test]
    fn wide_slice_log2_is_rejected() {
        let mut buf = stub_picture(0, 1, 1);
        buf[7] = 4 << 4;
        let mut slices = Vec::new();
        assert!(
            parse_picture_header(&buf, 1, 1, &mut slices).is_err()
        );
    }
}
