//! Frame driver.
//!
//! Drives one compressed frame through header parsing, output
//! allocation and the parallel slice phase. Slices of one picture are
//! independent by construction: they borrow the frame-constant state
//! immutably, own their tiles, and their macroblock rectangles tile
//! the picture exactly, so the commit pass after the dispatch barrier
//! never writes a byte twice.

use log::{debug, warn};
use rayon::prelude::*;

use crate::alpha::AlphaUnpack;
use crate::dsp::{
    permute_scantable, ProresDsp, INTERLACED_SCAN, PROGRESSIVE_SCAN,
};
use crate::error::{Error, Result};
use crate::frame::{Frame, PixelFormat, Plane, Profile};
use crate::header::parse_frame_header;
use crate::picture::parse_picture_header;
use crate::slice::{
    decode_slice, SliceDescriptor, SliceParams, SliceTiles,
};

/// Hardware decoder handoff. When installed, the driver validates the
/// frame, parses its header and then hands the raw packet over with
/// the three calls in order instead of running the software slice
/// path.
pub trait HwAccel {
    fn start_frame(&mut self, packet: &[u8]) -> Result<()>;
    fn decode_slice(&mut self, packet: &[u8]) -> Result<()>;
    fn end_frame(&mut self) -> Result<()>;
}

/// Caller-selected decoding behaviour.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecoderOptions {
    /// Ignore any coded alpha plane.
    pub skip_alpha: bool,
    /// Decode luma only; chroma planes stay zeroed.
    pub grayscale: bool,
}

/// Decoder is a ProRes decoder instance for one stream.
pub struct Decoder {
    profile: Profile,
    bits_per_raw_sample: u8,
    dsp: ProresDsp,
    alpha_unpack: AlphaUnpack,
    progressive_scan: [u8; 64],
    interlaced_scan: [u8; 64],
    options: DecoderOptions,
    hwaccel: Option<Box<dyn HwAccel>>,
    width: u32,
    height: u32,
    slices: Vec<SliceDescriptor>,
}

impl Decoder {
    /// Creates a new decoder instance for the stream identified by
    /// `codec_tag` (the container-level four-cc, e.g. `apch`).
    ///
    /// Unknown tags are tolerated: they decode as 10-bit and report
    /// [`Profile::Unknown`].
    pub fn new(codec_tag: [u8; 4], options: DecoderOptions) -> Self {
        let profile = Profile::from_tag(&codec_tag);
        if profile == Profile::Unknown {
            warn!(
                "unknown prores profile {}",
                String::from_utf8_lossy(&codec_tag)
            );
        }
        let bits_per_raw_sample = profile.bits_per_raw_sample();
        debug!(
            "using {}b decoding based on codec tag",
            bits_per_raw_sample
        );

        let dsp = ProresDsp::new(bits_per_raw_sample);
        let alpha_unpack = if bits_per_raw_sample == 12 {
            AlphaUnpack::To12
        } else {
            AlphaUnpack::To10
        };

        let mut progressive_scan = [0u8; 64];
        let mut interlaced_scan = [0u8; 64];
        permute_scantable(
            &mut progressive_scan,
            &PROGRESSIVE_SCAN,
            &dsp.idct_permutation,
        );
        permute_scantable(
            &mut interlaced_scan,
            &INTERLACED_SCAN,
            &dsp.idct_permutation,
        );

        Self {
            profile,
            bits_per_raw_sample,
            dsp,
            alpha_unpack,
            progressive_scan,
            interlaced_scan,
            options,
            hwaccel: None,
            width: 0,
            height: 0,
            slices: Vec::new(),
        }
    }

    /// The stream's profile, from the codec tag.
    pub fn profile(&self) -> Profile {
        self.profile
    }

    /// Installs a hardware decoder for subsequent frames.
    pub fn set_hwaccel(&mut self, hwaccel: Box<dyn HwAccel>) {
        self.hwaccel = Some(hwaccel);
    }

    /// DecodeFrame takes one compressed frame (the full `icpf` atom)
    /// and decodes it to a [`Frame`].
    ///
    /// Slices are decoded in parallel. A frame in which some slices
    /// fail still decodes, with [`Frame::damaged`] set; only a frame
    /// in which every slice fails is an error.
    pub fn decode_frame(&mut self, packet: &[u8]) -> Result<Frame> {
        if packet.len() < 28 || &packet[4..8] != b"icpf" {
            return Err(Error::InvalidData(
                "invalid frame header".to_owned(),
            ));
        }

        let mut buf = &packet[8..];

        let hdr = parse_frame_header(buf, &self.dsp.idct_permutation)?;
        if (u32::from(hdr.width), u32::from(hdr.height))
            != (self.width, self.height)
            && self.width != 0
        {
            warn!(
                "picture resolution change: {}x{} -> {}x{}",
                self.width, self.height, hdr.width, hdr.height
            );
        }
        self.width = u32::from(hdr.width);
        self.height = u32::from(hdr.height);

        let alpha_info = if self.options.skip_alpha {
            0
        } else {
            hdr.alpha_info
        };
        let pix_fmt = PixelFormat::from_parts(
            self.bits_per_raw_sample,
            hdr.chroma_444,
            alpha_info != 0,
        );

        let interlaced = hdr.is_interlaced();
        let mb_width = (self.width as usize + 15) >> 4;
        let mb_height = if interlaced {
            (self.height as usize + 31) >> 5
        } else {
            (self.height as usize + 15) >> 4
        };

        let scan = if interlaced {
            &self.interlaced_scan
        } else {
            &self.progressive_scan
        };

        let mut frame = Frame::alloc(
            self.width,
            self.height,
            pix_fmt,
            self.profile,
            interlaced,
            hdr.is_top_field_first(),
        );
        frame.color_primaries = hdr.color_primaries;
        frame.color_trc = hdr.color_trc;
        frame.color_matrix = hdr.color_matrix;

        if let Some(hwaccel) = self.hwaccel.as_mut() {
            hwaccel.start_frame(packet)?;
            hwaccel.decode_slice(packet)?;
            hwaccel.end_frame()?;
            return Ok(frame);
        }

        buf = &buf[hdr.hdr_size..];

        let fields = if interlaced { 2 } else { 1 };
        for field in 0..fields {
            if field > 0 && buf.is_empty() {
                break;
            }
            let first_field = field == 0;

            let pic_data_size = parse_picture_header(
                buf,
                mb_width,
                mb_height,
                &mut self.slices,
            )?;

            let params = SliceParams {
                dsp: &self.dsp,
                scan,
                qmat_luma: &hdr.qmat_luma,
                qmat_chroma: &hdr.qmat_chroma,
                chroma_444: hdr.chroma_444,
                alpha_info,
                alpha_unpack: self.alpha_unpack,
                grayscale: self.options.grayscale,
            };

            let picture = buf;
            let results: Vec<Result<SliceTiles>> = self
                .slices
                .par_iter()
                .map(|desc| decode_slice(desc, picture, &params))
                .collect();

            // The bottom field always sits on the odd lines, whichever
            // field was coded first.
            let field_line = if interlaced {
                (first_field ^ hdr.is_top_field_first()) as usize
            } else {
                0
            };
            let stride_mul = if interlaced { 2 } else { 1 };

            let mut failed = 0;
            let mut first_error = None;
            for (desc, result) in self.slices.iter().zip(results) {
                match result {
                    Ok(tiles) => commit_slice(
                        &mut frame, desc, &tiles, stride_mul, field_line,
                    ),
                    Err(err) => {
                        failed += 1;
                        if first_error.is_none() {
                            first_error = Some(err);
                        }
                    }
                }
            }

            if failed > 0 {
                warn!(
                    "{} of {} slices failed to decode",
                    failed,
                    self.slices.len()
                );
                frame.damaged = true;
                if failed == self.slices.len() {
                    return Err(first_error.unwrap());
                }
            }

            buf = &buf[pic_data_size..];
        }

        Ok(frame)
    }
}

/// Copies one slice's tiles into the output planes, spreading the 16
/// tile rows over the field lines for interlaced frames.
fn commit_slice(
    frame: &mut Frame,
    desc: &SliceDescriptor,
    tiles: &SliceTiles,
    stride_mul: usize,
    field_line: usize,
) {
    let chroma_shift = if frame.pix_fmt.is_444() { 4 } else { 3 };

    copy_tile(
        &mut frame.planes[0],
        &tiles.luma,
        desc.mb_count << 4,
        desc.mb_x << 4,
        desc.mb_y,
        stride_mul,
        field_line,
    );
    if let Some(ref chroma_u) = tiles.chroma_u {
        copy_tile(
            &mut frame.planes[1],
            chroma_u,
            desc.mb_count << chroma_shift,
            desc.mb_x << chroma_shift,
            desc.mb_y,
            stride_mul,
            field_line,
        );
    }
    if let Some(ref chroma_v) = tiles.chroma_v {
        copy_tile(
            &mut frame.planes[2],
            chroma_v,
            desc.mb_count << chroma_shift,
            desc.mb_x << chroma_shift,
            desc.mb_y,
            stride_mul,
            field_line,
        );
    }
    if let Some(ref alpha) = tiles.alpha {
        copy_tile(
            &mut frame.planes[3],
            alpha,
            desc.mb_count << 4,
            desc.mb_x << 4,
            desc.mb_y,
            stride_mul,
            field_line,
        );
    }
}

fn copy_tile(
    plane: &mut Plane,
    tile: &[u16],
    tile_width: usize,
    x: usize,
    mb_y: usize,
    stride_mul: usize,
    field_line: usize,
) {
    for row in 0..16 {
        let dst_row = ((mb_y << 4) + row) * stride_mul + field_line;
        let dst = dst_row * plane.stride + x;
        plane.data[dst..dst + tile_width]
            .copy_from_slice(&tile[row * tile_width..(row + 1) * tile_width]);
    }
}
