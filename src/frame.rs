//! Decoded frame model: owned 16-bit planar buffers plus the stream
//! metadata a caller needs to interpret them.

/// ProRes profile, from the codec tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Proxy,
    Lt,
    Standard,
    Hq,
    P4444,
    Xq,
    Unknown,
}

impl Profile {
    /// Maps a codec four-cc to its profile. Tags this decoder does not
    /// know about map to [`Profile::Unknown`].
    pub fn from_tag(tag: &[u8; 4]) -> Self {
        match tag {
            b"apco" => Profile::Proxy,
            b"apcs" => Profile::Lt,
            b"apcn" => Profile::Standard,
            b"apch" => Profile::Hq,
            b"ap4h" => Profile::P4444,
            b"ap4x" => Profile::Xq,
            _ => Profile::Unknown,
        }
    }

    /// Raw sample depth implied by the profile. The 4444 family is
    /// 12-bit, everything else (unknown tags included) 10-bit.
    pub fn bits_per_raw_sample(self) -> u8 {
        match self {
            Profile::P4444 | Profile::Xq => 12,
            _ => 10,
        }
    }
}

/// Output pixel format: the cross product of raw sample depth, chroma
/// sampling and alpha presence. Samples always sit in 16-bit
/// containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Yuv422p10,
    Yuv444p10,
    Yuva422p10,
    Yuva444p10,
    Yuv422p12,
    Yuv444p12,
    Yuva422p12,
    Yuva444p12,
}

impl PixelFormat {
    pub(crate) fn from_parts(
        bit_depth: u8,
        chroma_444: bool,
        alpha: bool,
    ) -> Self {
        match (bit_depth, chroma_444, alpha) {
            (10, false, false) => PixelFormat::Yuv422p10,
            (10, true, false) => PixelFormat::Yuv444p10,
            (10, false, true) => PixelFormat::Yuva422p10,
            (10, true, true) => PixelFormat::Yuva444p10,
            (_, false, false) => PixelFormat::Yuv422p12,
            (_, true, false) => PixelFormat::Yuv444p12,
            (_, false, true) => PixelFormat::Yuva422p12,
            (_, true, true) => PixelFormat::Yuva444p12,
        }
    }

    /// Width of the stored sample values, 10 or 12.
    pub fn bit_depth(self) -> u8 {
        match self {
            PixelFormat::Yuv422p10
            | PixelFormat::Yuv444p10
            | PixelFormat::Yuva422p10
            | PixelFormat::Yuva444p10 => 10,
            _ => 12,
        }
    }

    /// Whether chroma is horizontally cosited with luma (4:4:4).
    pub fn is_444(self) -> bool {
        matches!(
            self,
            PixelFormat::Yuv444p10
                | PixelFormat::Yuva444p10
                | PixelFormat::Yuv444p12
                | PixelFormat::Yuva444p12
        )
    }

    pub fn has_alpha(self) -> bool {
        matches!(
            self,
            PixelFormat::Yuva422p10
                | PixelFormat::Yuva444p10
                | PixelFormat::Yuva422p12
                | PixelFormat::Yuva444p12
        )
    }
}

/// One planar component.
///
/// The buffer is macroblock-aligned: `stride` and the allocated row
/// count cover the padding the slice tiling writes into, while
/// `width` and `height` are the visible extent.
pub struct Plane {
    pub data: Vec<u16>,
    /// Line stride in samples.
    pub stride: usize,
    pub width: usize,
    pub height: usize,
}

impl Plane {
    fn new(stride: usize, rows: usize, width: usize, height: usize) -> Self {
        Self {
            data: vec![0; stride * rows],
            stride,
            width,
            height,
        }
    }
}

/// Frame contains a decoded ProRes frame and relevant data about it.
///
/// Image data consists of three or four planes:
///   - Plane 0 is luma.
///   - Planes 1 and 2 are Cb and Cr, half width for 4:2:2 formats and
///     full width for 4:4:4, always full height.
///   - When the pixel format carries alpha, plane 3 is alpha at full
///     resolution.
pub struct Frame {
    /// Image planes, each of 16-bit samples.
    pub planes: Vec<Plane>,
    /// Width of the frame, in pixels.
    pub width: u32,
    /// Height of the frame, in pixels.
    pub height: u32,
    pub pix_fmt: PixelFormat,
    pub profile: Profile,
    pub interlaced: bool,
    pub top_field_first: bool,
    /// Set when at least one slice failed to decode; the failed
    /// regions hold whatever the allocator put there.
    pub damaged: bool,
    /// Colour primaries, as signalled (ITU-T H.273 code point).
    pub color_primaries: u8,
    /// Transfer characteristic, as signalled.
    pub color_trc: u8,
    /// Matrix coefficients, as signalled. Range is always limited.
    pub color_matrix: u8,
}

impl Frame {
    /// Allocates zeroed, macroblock-aligned planes for one frame.
    pub(crate) fn alloc(
        width: u32,
        height: u32,
        pix_fmt: PixelFormat,
        profile: Profile,
        interlaced: bool,
        top_field_first: bool,
    ) -> Self {
        let mb_width = ((width as usize) + 15) >> 4;
        let rows = if interlaced {
            (((height as usize) + 31) >> 5) << 5
        } else {
            (((height as usize) + 15) >> 4) << 4
        };

        let luma_stride = mb_width << 4;
        let chroma_stride = if pix_fmt.is_444() {
            mb_width << 4
        } else {
            mb_width << 3
        };
        let chroma_width = if pix_fmt.is_444() {
            width as usize
        } else {
            (width as usize + 1) >> 1
        };

        let mut planes = Vec::with_capacity(4);
        planes.push(Plane::new(
            luma_stride,
            rows,
            width as usize,
            height as usize,
        ));
        planes.push(Plane::new(
            chroma_stride,
            rows,
            chroma_width,
            height as usize,
        ));
        planes.push(Plane::new(
            chroma_stride,
            rows,
            chroma_width,
            height as usize,
        ));
        if pix_fmt.has_alpha() {
            planes.push(Plane::new(
                luma_stride,
                rows,
                width as usize,
                height as usize,
            ));
        }

        Self {
            planes,
            width,
            height,
            pix_fmt,
            profile,
            interlaced,
            top_field_first,
            damaged: false,
            color_primaries: 0,
            color_trc: 0,
            color_matrix: 0,
        }
    }
}
