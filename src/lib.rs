//! Stateful encoder/decoder facade for Ultra HDR (gain-map JPEG) images.
//!
//! Ultra HDR stores HDR content in a backwards-compatible JPEG file: legacy
//! viewers see the SDR base image, HDR-capable displays reconstruct the full
//! dynamic range from an embedded gain map and its metadata descriptor.
//!
//! This crate provides the container-level state machines around that
//! format:
//!
//! - [`Encoder`] collects role-labelled inputs ([`Intent`]), geometric
//!   [`Effect`]s and options, then dispatches one of five encode paths
//!   depending on which intents were supplied, from raw HDR alone up to
//!   pure assembly of pre-compressed base and gain-map images.
//! - [`Decoder`] probes a stream for dimensions, metadata, EXIF, ICC and
//!   XMP, then decodes it into a reconstructed image plus the extracted
//!   gain map, optionally re-shaped by effects.
//!
//! Pixel-level work (tone mapping, gain-map math, JPEG entropy coding) sits
//! behind the [`JpegrEngine`] trait. The bundled [`ContainerEngine`] covers
//! the codec-free operations, probing and assembling containers, so those
//! work out of the box:
//!
//! ```
//! use uhdr_codec::{CompressedImage, ColorGamut, ColorRange, ColorTransfer,
//!                  Encoder, GainMapMetadata, Intent};
//!
//! # fn demo(base_jpeg: &[u8], gainmap_jpeg: &[u8]) -> uhdr_codec::Result<()> {
//! let base = CompressedImage::from_bytes(
//!     base_jpeg, ColorGamut::Bt709, ColorTransfer::Srgb, ColorRange::Full);
//! let gainmap = CompressedImage::from_bytes(
//!     gainmap_jpeg, ColorGamut::Unspecified, ColorTransfer::Unspecified,
//!     ColorRange::Unspecified);
//! let metadata = GainMapMetadata { max_content_boost: 4.0, hdr_capacity_max: 4.0,
//!                                  ..GainMapMetadata::default() };
//!
//! let mut encoder = Encoder::new();
//! encoder.set_compressed_image(&base, Intent::Base)?;
//! encoder.set_gainmap_image(&gainmap, &metadata)?;
//! encoder.encode()?;
//! let stream = encoder.encoded_stream().expect("encode succeeded");
//! # let _ = stream; Ok(())
//! # }
//! ```
//!
//! Every codec instance is single-threaded and non-reentrant; distinct
//! instances are independent. Configuration setters fail with
//! [`CodecError::InvalidOperation`] once an instance has left its
//! configurable state, and the terminal `encode`/`decode`/`probe` statuses
//! are cached and replayed on repeated calls.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod container;
mod decoder;
mod effects;
mod encoder;
mod engine;
mod image;
mod types;

pub use container::ContainerEngine;
pub use decoder::{is_uhdr_image, Decoder, MAX_DISPLAY_BOOST_DEFAULT};
pub use effects::{Effect, MirrorDirection};
pub use encoder::{
    Encoder, BASE_QUALITY_DEFAULT, GAINMAP_QUALITY_DEFAULT, GAINMAP_SCALE_FACTOR_DEFAULT,
    MULTI_CHANNEL_GAINMAP_DEFAULT,
};
pub use engine::{
    EncodeOutput, EngineError, EngineResult, GainMapInfo, GainMapOptions, JpegrEngine, JpegrInfo,
    OutputFormat, PrimaryInfo,
};
pub use image::{
    CompressedImage, Plane, RawImage, RawImageView, DEFAULT_STRIDE_ALIGNMENT,
};
pub use types::{
    CodecError, ColorGamut, ColorRange, ColorTransfer, ErrorKind, GainMapMetadata, Intent,
    OutputCodec, PixelFormat, Result, MAX_DETAIL_LENGTH,
};

/// Dimension limits for raw image intents.
pub mod limits {
    /// Minimum accepted image width.
    pub const MIN_WIDTH: u32 = 8;

    /// Minimum accepted image height.
    pub const MIN_HEIGHT: u32 = 8;

    /// Maximum accepted image width.
    pub const MAX_WIDTH: u32 = 8192;

    /// Maximum accepted image height.
    pub const MAX_HEIGHT: u32 = 8192;
}
