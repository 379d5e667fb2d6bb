pub mod alpha;
pub mod decoder;
pub mod dsp;
pub mod entropy;
pub mod error;
pub mod frame;
pub mod header;
pub mod picture;
pub mod slice;

pub use decoder::{Decoder, DecoderOptions, HwAccel};
pub use error::{Error, Result};
pub use frame::{Frame, PixelFormat, Plane, Profile};
