//! Seam to the external JPEG-R engine.
//!
//! The facade owns state, validation and dispatch; the pixel-level work
//! (tone mapping, gain-map math, JPEG entropy coding) lives behind
//! [`JpegrEngine`]. Engine failures use their own error set and are
//! translated into the public taxonomy in exactly one place, the
//! `From<EngineError> for CodecError` impl.

use thiserror::Error;

use crate::image::{CompressedImage, RawImage};
use crate::types::{CodecError, ColorGamut, ColorTransfer, GainMapMetadata, PixelFormat};

/// Output rendition requested from the engine on decode, selected from the
/// output transfer / pixel format pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// HLG-encoded HDR in RGBA-1010102.
    HdrHlg,
    /// PQ-encoded HDR in RGBA-1010102.
    HdrPq,
    /// Linear HDR in half-float RGBA.
    HdrLinear,
    /// sRGB SDR in RGBA-8888.
    Sdr,
}

impl OutputFormat {
    /// Select the output rendition for a transfer / pixel format pair.
    /// Returns `None` for combinations the engine cannot produce.
    pub fn select(transfer: ColorTransfer, format: PixelFormat) -> Option<Self> {
        match (transfer, format) {
            (ColorTransfer::Hlg, PixelFormat::Rgba1010102) => Some(OutputFormat::HdrHlg),
            (ColorTransfer::Pq, PixelFormat::Rgba1010102) => Some(OutputFormat::HdrPq),
            (ColorTransfer::Linear, PixelFormat::Rgba64Float) => Some(OutputFormat::HdrLinear),
            (ColorTransfer::Srgb, PixelFormat::Rgba8888) => Some(OutputFormat::Sdr),
            _ => None,
        }
    }
}

/// Gain-map generation options forwarded to the engine for the raw-input
/// encode paths.
#[derive(Debug, Clone, Copy)]
pub struct GainMapOptions {
    /// Downscale factor between base image and gain map.
    pub scale_factor: u32,
    /// JPEG quality for the compressed gain map.
    pub quality: u8,
    /// Encode one gain-map channel per color channel instead of luma only.
    pub multi_channel: bool,
}

/// Container-level facts about the primary image.
#[derive(Debug, Clone, Default)]
pub struct PrimaryInfo {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// EXIF payload, empty when absent.
    pub exif: Vec<u8>,
    /// ICC profile, empty when absent.
    pub icc: Vec<u8>,
    /// XMP packet, empty when absent.
    pub xmp: Vec<u8>,
}

/// Container-level facts about the gain-map image.
#[derive(Debug, Clone, Default)]
pub struct GainMapInfo {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// XMP packet carrying the gain-map metadata, empty when absent.
    pub xmp: Vec<u8>,
}

/// Result of probing an Ultra HDR stream.
#[derive(Debug, Clone, Default)]
pub struct JpegrInfo {
    /// Primary image facts.
    pub primary: PrimaryInfo,
    /// Gain-map image facts.
    pub gainmap: GainMapInfo,
}

/// Result of a successful engine encode.
#[derive(Debug, Clone, Copy)]
pub struct EncodeOutput {
    /// Bytes written into the destination buffer.
    pub bytes_written: usize,
    /// Gamut of the encoded stream.
    pub gamut: ColorGamut,
}

/// Failures reported by a [`JpegrEngine`] implementation.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// SDR and HDR intents have different dimensions.
    #[error("resolution mismatch between intents")]
    ResolutionMismatch,

    /// Opaque encoding failure.
    #[error("encoding failed")]
    Encode,

    /// Opaque decoding failure.
    #[error("decoding failed")]
    Decode,

    /// The input stream holds no decodable image.
    #[error("no images found in input")]
    NoImagesFound,

    /// The input stream holds no gain-map image.
    #[error("gain map image not found")]
    GainMapNotFound,

    /// The destination buffer cannot hold the encoded stream.
    #[error("output buffer too small")]
    BufferTooSmall,

    /// EXIF supplied both through the facade and inside the base image.
    #[error("conflicting exif sources")]
    MultipleExifs,

    /// Width and height gain-map scale factors disagree.
    #[error("unsupported map scale factor")]
    UnsupportedMapScaleFactor,

    /// The engine does not implement the requested operation.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Any other engine failure; the detail may be empty.
    #[error("{0}")]
    Other(String),
}

/// Result type for engine operations.
pub type EngineResult<T> = core::result::Result<T, EngineError>;

impl From<EngineError> for CodecError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::ResolutionMismatch => CodecError::invalid_param(
                "dimensions of sdr intent and hdr intent do not match",
            ),
            EngineError::Encode => {
                CodecError::unknown("encountered unknown error during encoding")
            }
            EngineError::Decode => {
                CodecError::unknown("encountered unknown error during decoding")
            }
            EngineError::NoImagesFound => {
                CodecError::unknown("input image does not contain any valid images")
            }
            EngineError::GainMapNotFound => {
                CodecError::unknown("input image does not contain a gainmap image")
            }
            EngineError::BufferTooSmall => {
                CodecError::mem_error("output buffer to store compressed data is too small")
            }
            EngineError::MultipleExifs => CodecError::invalid_operation(
                "received exif through the encoder while the base image intent already contains \
                 exif, unsure which one to use",
            ),
            EngineError::UnsupportedMapScaleFactor => CodecError::unsupported_feature(
                "base image to gain map image width ratio and height ratio do not match",
            ),
            EngineError::Unsupported(detail) => CodecError::unsupported_feature(detail),
            EngineError::Other(detail) => CodecError::unknown(detail),
        }
    }
}

/// Operations the facade requires from a JPEG-R engine implementation.
///
/// Encode operations write the finished stream into `dest` and report the
/// written length; [`EngineError::BufferTooSmall`] signals that the facade's
/// pre-sized buffer did not suffice. `decode` fills the pixel planes of the
/// pre-allocated destination images and reports the decoded gamut.
pub trait JpegrEngine {
    /// Encode from a raw HDR intent alone.
    fn encode_api0(
        &self,
        hdr: &RawImage,
        transfer: ColorTransfer,
        quality: u8,
        exif: Option<&[u8]>,
        options: &GainMapOptions,
        dest: &mut [u8],
    ) -> EngineResult<EncodeOutput>;

    /// Encode from raw HDR and raw SDR intents.
    #[allow(clippy::too_many_arguments)]
    fn encode_api1(
        &self,
        hdr: &RawImage,
        sdr: &RawImage,
        transfer: ColorTransfer,
        quality: u8,
        exif: Option<&[u8]>,
        options: &GainMapOptions,
        dest: &mut [u8],
    ) -> EngineResult<EncodeOutput>;

    /// Encode from raw HDR, raw SDR and compressed SDR intents.
    fn encode_api2(
        &self,
        hdr: &RawImage,
        sdr: &RawImage,
        sdr_compressed: &CompressedImage,
        transfer: ColorTransfer,
        options: &GainMapOptions,
        dest: &mut [u8],
    ) -> EngineResult<EncodeOutput>;

    /// Encode from raw HDR and compressed SDR intents.
    fn encode_api3(
        &self,
        hdr: &RawImage,
        sdr_compressed: &CompressedImage,
        transfer: ColorTransfer,
        options: &GainMapOptions,
        dest: &mut [u8],
    ) -> EngineResult<EncodeOutput>;

    /// Assemble from pre-compressed base and gain-map images.
    fn encode_api4(
        &self,
        base: &CompressedImage,
        gainmap: &CompressedImage,
        metadata: &GainMapMetadata,
        dest: &mut [u8],
    ) -> EngineResult<EncodeOutput>;

    /// Parse container-level information from an Ultra HDR stream.
    fn info(&self, data: &[u8]) -> EngineResult<JpegrInfo>;

    /// Decode the stream into `decoded` and its gain map into `gainmap`,
    /// returning the gamut of the decoded pixels.
    fn decode(
        &self,
        data: &[u8],
        output_format: OutputFormat,
        max_display_boost: f32,
        decoded: &mut RawImage,
        gainmap: &mut RawImage,
    ) -> EngineResult<ColorGamut>;
}
