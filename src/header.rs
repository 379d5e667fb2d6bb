//! Frame header parsing.
//!
//! The frame header carries the picture dimensions, the interlace
//! structure, the alpha mode, colour metadata and the optional
//! quantization matrices. See SMPTE RDD 36, frame header syntax.

use byteorder::{BigEndian, ByteOrder};

use crate::dsp::permute_scantable;
use crate::error::{Error, Result};

/// Parsed frame header. The quantization matrices are already
/// permuted into the IDCT's coefficient order.
pub struct FrameHeader {
    pub hdr_size: usize,
    pub width: u16,
    pub height: u16,
    /// 0 progressive, 1 interlaced top field first, 2 interlaced
    /// bottom field first.
    pub frame_type: u8,
    /// True for 4:4:4 chroma sampling, false for 4:2:2.
    pub chroma_444: bool,
    /// 0 no alpha, 1 8-bit alpha, 2 16-bit alpha.
    pub alpha_info: u8,
    pub color_primaries: u8,
    pub color_trc: u8,
    pub color_matrix: u8,
    pub qmat_luma: [u8; 64],
    pub qmat_chroma: [u8; 64],
}

impl FrameHeader {
    pub fn is_interlaced(&self) -> bool {
        self.frame_type > 0
    }

    pub fn is_top_field_first(&self) -> bool {
        self.frame_type == 1
    }
}

/// Parses the frame header at the start of `buf` (the payload after
/// the 8-byte atom prefix).
pub fn parse_frame_header(
    buf: &[u8],
    idct_permutation: &[u8; 64],
) -> Result<FrameHeader> {
    if buf.len() < 20 {
        return Err(Error::InvalidData(format!(
            "frame header truncated: {} bytes",
            buf.len()
        )));
    }

    let hdr_size = BigEndian::read_u16(buf) as usize;
    if hdr_size > buf.len() {
        return Err(Error::InvalidData(format!(
            "wrong frame header size: {}",
            hdr_size
        )));
    }

    let version = BigEndian::read_u16(&buf[2..]);
    if version > 1 {
        return Err(Error::NotImplemented(format!(
            "bitstream version: {}",
            version
        )));
    }

    // Bytes 4..8 are the encoder four-cc, informational only.
    let width = BigEndian::read_u16(&buf[8..]);
    let height = BigEndian::read_u16(&buf[10..]);

    let frame_type = (buf[12] >> 2) & 3;
    let chroma_444 = (buf[12] & 0xC0) == 0xC0;

    let alpha_info = buf[17] & 0xF;
    if alpha_info > 2 {
        return Err(Error::InvalidData(format!(
            "invalid alpha mode: {}",
            alpha_info
        )));
    }

    let flags = buf[19];
    let mut ptr = 20;

    let mut qmat_luma = [4u8; 64];
    if flags & 2 != 0 {
        if buf.len() < ptr + 64 {
            return Err(Error::InvalidData(
                "frame header truncated inside luma matrix".to_owned(),
            ));
        }
        let mut raw = [0u8; 64];
        raw.copy_from_slice(&buf[ptr..ptr + 64]);
        permute_scantable(&mut qmat_luma, idct_permutation, &raw);
        ptr += 64;
    }

    let mut qmat_chroma = qmat_luma;
    if flags & 1 != 0 {
        if buf.len() < ptr + 64 {
            return Err(Error::InvalidData(
                "frame header truncated inside chroma matrix".to_owned(),
            ));
        }
        let mut raw = [0u8; 64];
        raw.copy_from_slice(&buf[ptr..ptr + 64]);
        permute_scantable(&mut qmat_chroma, idct_permutation, &raw);
    }

    Ok(FrameHeader {
        hdr_size,
        width,
        height,
        frame_type,
        chroma_444,
        alpha_info,
        color_primaries: buf[14],
        color_trc: buf[15],
        color_matrix: buf[16],
        qmat_luma,
        qmat_chroma,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_header() -> Vec<u8> {
        let mut buf = vec![0u8; 20];
        BigEndian::write_u16(&mut buf, 20);
        BigEndian::write_u16(&mut buf[2..], 1);
        buf[4..8].copy_from_slice(b"fmpg");
        BigEndian::write_u16(&mut buf[8..], 1920);
        BigEndian::write_u16(&mut buf[10..], 1080);
        buf
    }

    fn identity() -> [u8; 64] {
        let mut p = [0u8; 64];
        for (i, v) in p.iter_mut().enumerate() {
            *v = i as u8;
        }
        p
    }

    #[test]
    fn parses_dimensions_and_defaults() {
        let buf = minimal_header();
        let hdr = parse_frame_header(&buf, &identity()).unwrap();

        assert_eq!(hdr.width, 1920);
        assert_eq!(hdr.height, 1080);
        assert_eq!(hdr.frame_type, 0);
        assert!(!hdr.chroma_444);
        assert_eq!(hdr.alpha_info, 0);
        // Missing matrices: luma defaults to 4, chroma aliases luma.
        assert_eq!(hdr.qmat_luma, [4u8; 64]);
        assert_eq!(hdr.qmat_chroma, hdr.qmat_luma);
    }

    #[test]
    fn oversized_header_is_rejected() {
        let mut buf = minimal_header();
        BigEndian::write_u16(&mut buf, 200);
        assert!(matches!(
            parse_frame_header(&buf, &identity()),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn future_version_is_rejected() {
        let mut buf = minimal_header();
        BigEndian::write_u16(&mut buf[2..], 2);
        assert!(matches!(
            parse_frame_header(&buf, &identity()),
            Err(Error::NotImplemented(_))
        ));
    }

    #[test]
    fn luma_matrix_fills_both_when_chroma_missing() {
        let mut buf = minimal_header();
        buf[19] = 2;
        buf.extend((1..=64).map(|q| q as u8));
        let hdr = parse_frame_header(&buf, &identity()).unwrap();

        assert_eq!(hdr.qmat_luma[0], 1);
        assert_eq!(hdr.qmat_luma[63], 64);
        assert_eq!(hdr.qmat_chroma, hdr.qmat_luma);
    }

    #[test]
    fn invalid_alpha_mode_is_rejected() {
        let mut buf = minimal_header();
        buf[17] = 3;
        assert!(matches!(
            parse_frame_header(&buf, &identity()),
            Err(Error::InvalidData(_))
        ));
    }
}
