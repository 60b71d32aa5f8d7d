//! Core types for the Ultra HDR codec facade.

use thiserror::Error;

/// Maximum length of an error detail string, in bytes. Longer details are
/// truncated silently.
pub const MAX_DETAIL_LENGTH: usize = 256;

/// Errors that can occur during Ultra HDR encode/decode operations.
///
/// Each variant carries a human-readable detail string bounded to
/// [`MAX_DETAIL_LENGTH`] bytes. Success is the absence of an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum CodecError {
    /// A caller-facing precondition was violated (out-of-range value,
    /// unsupported enumeration, dimension parity, intent/format mismatch, ...).
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// The operation is not legal in the codec's current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// An output buffer was exhausted.
    #[error("memory error: {0}")]
    MemError(String),

    /// The requested feature is not supported.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// An opaque failure reported by the underlying engine. The detail may
    /// be empty when the engine gave no further information.
    #[error("unknown error: {0}")]
    UnknownError(String),
}

/// Classification of a [`CodecError`], mirroring the error taxonomy of the
/// C reference API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`CodecError::InvalidParam`].
    InvalidParam,
    /// See [`CodecError::InvalidOperation`].
    InvalidOperation,
    /// See [`CodecError::MemError`].
    MemError,
    /// See [`CodecError::UnsupportedFeature`].
    UnsupportedFeature,
    /// See [`CodecError::UnknownError`].
    UnknownError,
}

fn bounded(detail: impl Into<String>) -> String {
    let mut s: String = detail.into();
    if s.len() > MAX_DETAIL_LENGTH {
        let mut end = MAX_DETAIL_LENGTH;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
    }
    s
}

impl CodecError {
    /// Invalid-parameter error with a bounded detail string.
    pub fn invalid_param(detail: impl Into<String>) -> Self {
        CodecError::InvalidParam(bounded(detail))
    }

    /// Invalid-operation error with a bounded detail string.
    pub fn invalid_operation(detail: impl Into<String>) -> Self {
        CodecError::InvalidOperation(bounded(detail))
    }

    /// Memory error with a bounded detail string.
    pub fn mem_error(detail: impl Into<String>) -> Self {
        CodecError::MemError(bounded(detail))
    }

    /// Unsupported-feature error with a bounded detail string.
    pub fn unsupported_feature(detail: impl Into<String>) -> Self {
        CodecError::UnsupportedFeature(bounded(detail))
    }

    /// Unknown error with a bounded detail string.
    pub fn unknown(detail: impl Into<String>) -> Self {
        CodecError::UnknownError(bounded(detail))
    }

    /// The error's kind tag.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CodecError::InvalidParam(_) => ErrorKind::InvalidParam,
            CodecError::InvalidOperation(_) => ErrorKind::InvalidOperation,
            CodecError::MemError(_) => ErrorKind::MemError,
            CodecError::UnsupportedFeature(_) => ErrorKind::UnsupportedFeature,
            CodecError::UnknownError(_) => ErrorKind::UnknownError,
        }
    }

    /// The detail string.
    pub fn detail(&self) -> &str {
        match self {
            CodecError::InvalidParam(d)
            | CodecError::InvalidOperation(d)
            | CodecError::MemError(d)
            | CodecError::UnsupportedFeature(d)
            | CodecError::UnknownError(d) => d,
        }
    }

    /// Whether a non-empty detail string is present.
    pub fn has_detail(&self) -> bool {
        !self.detail().is_empty()
    }
}

/// Result type for Ultra HDR codec operations.
pub type Result<T> = core::result::Result<T, CodecError>;

/// Color gamut / primaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorGamut {
    /// Primaries not known.
    #[default]
    Unspecified,
    /// BT.709 / sRGB primaries.
    Bt709,
    /// Display P3 primaries.
    DisplayP3,
    /// BT.2100 / BT.2020 wide gamut primaries.
    Bt2100,
}

/// Electro-optical transfer function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorTransfer {
    /// Transfer not known.
    #[default]
    Unspecified,
    /// Linear (gamma 1.0).
    Linear,
    /// Hybrid Log-Gamma (ITU-R BT.2100).
    Hlg,
    /// Perceptual Quantizer (SMPTE ST 2084).
    Pq,
    /// sRGB transfer function.
    Srgb,
}

/// Color range. The facade does not interpret this; it is carried through
/// to the engine untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorRange {
    /// Range not known.
    #[default]
    Unspecified,
    /// Full range (e.g. Y in [0, 255] for 8-bit).
    Full,
    /// Limited / studio range (e.g. Y in [16, 235] for 8-bit).
    Limited,
}

/// Pixel format of a raw image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 10-bit YCbCr 4:2:0, biplanar, 16-bit storage per sample.
    P010,
    /// 8-bit YCbCr 4:2:0, triplanar.
    Yuv420,
    /// 8-bit packed RGBA.
    Rgba8888,
    /// 10-bit packed RGBA (2-bit alpha).
    Rgba1010102,
    /// Half-float packed RGBA, 64 bits per pixel.
    Rgba64Float,
    /// Single-plane 8-bit luma.
    Y400,
}

impl PixelFormat {
    /// Bytes per sample in the luma / packed plane.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::P010 => 2,
            PixelFormat::Yuv420 | PixelFormat::Y400 => 1,
            PixelFormat::Rgba8888 | PixelFormat::Rgba1010102 => 4,
            PixelFormat::Rgba64Float => 8,
        }
    }

    /// Number of planes the format stores.
    pub fn plane_count(self) -> usize {
        match self {
            PixelFormat::Yuv420 => 3,
            PixelFormat::P010 => 2,
            _ => 1,
        }
    }
}

/// Role of an image inside the codec state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// HDR rendition.
    Hdr,
    /// SDR rendition.
    Sdr,
    /// Base (backwards-compatible) rendition.
    Base,
    /// Gain-map image.
    GainMap,
}

impl Intent {
    pub(crate) fn index(self) -> usize {
        match self {
            Intent::Hdr => 0,
            Intent::Sdr => 1,
            Intent::Base => 2,
            Intent::GainMap => 3,
        }
    }
}

/// Output media type of the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputCodec {
    /// JPEG-based Ultra HDR container.
    #[default]
    Jpeg,
    /// HEIF container. Reserved; the encoder rejects it.
    Heif,
    /// AVIF container. Reserved; the encoder rejects it.
    Avif,
}

/// Fixed-slot table keyed by [`Intent`]. The set of present intents drives
/// the encode path selection, so presence checks must stay cheap.
#[derive(Debug, Clone, Default)]
pub(crate) struct IntentMap<T> {
    slots: [Option<T>; 4],
}

impl<T> IntentMap<T> {
    pub fn new() -> Self {
        IntentMap {
            slots: [None, None, None, None],
        }
    }

    pub fn get(&self, intent: Intent) -> Option<&T> {
        self.slots[intent.index()].as_ref()
    }

    pub fn insert(&mut self, intent: Intent, value: T) {
        self.slots[intent.index()] = Some(value);
    }

    pub fn contains(&self, intent: Intent) -> bool {
        self.slots[intent.index()].is_some()
    }

    pub fn take(&mut self, intent: Intent) -> Option<T> {
        self.slots[intent.index()].take()
    }

    pub fn clear(&mut self) {
        self.slots = [None, None, None, None];
    }
}

/// Gain-map metadata descriptor.
///
/// Describes how the gain map converts between the SDR base rendition and
/// the HDR rendition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainMapMetadata {
    /// Maximum HDR/SDR content boost.
    pub max_content_boost: f32,
    /// Minimum HDR/SDR content boost.
    pub min_content_boost: f32,
    /// Gamma applied to the encoded gain-map values.
    pub gamma: f32,
    /// Offset added to SDR pixel values before the gain computation.
    pub offset_sdr: f32,
    /// Offset added to HDR pixel values before the gain computation.
    pub offset_hdr: f32,
    /// Display boost at which the gain map starts to apply.
    pub hdr_capacity_min: f32,
    /// Display boost at which the gain map applies fully.
    pub hdr_capacity_max: f32,
}

impl Default for GainMapMetadata {
    fn default() -> Self {
        GainMapMetadata {
            max_content_boost: 1.0,
            min_content_boost: 1.0,
            gamma: 1.0,
            offset_sdr: 1.0 / 64.0,
            offset_hdr: 1.0 / 64.0,
            hdr_capacity_min: 1.0,
            hdr_capacity_max: 1.0,
        }
    }
}

impl GainMapMetadata {
    /// Validate the descriptor against the documented invariants.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("max content boost", self.max_content_boost),
            ("min content boost", self.min_content_boost),
            ("gamma", self.gamma),
            ("offset sdr", self.offset_sdr),
            ("offset hdr", self.offset_hdr),
            ("hdr capacity min", self.hdr_capacity_min),
            ("hdr capacity max", self.hdr_capacity_max),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(CodecError::invalid_param(format!(
                    "received non-finite value for {name}: {value}"
                )));
            }
        }
        if self.max_content_boost < self.min_content_boost {
            return Err(CodecError::invalid_param(format!(
                "received bad value for content boost min {} > max {}",
                self.min_content_boost, self.max_content_boost
            )));
        }
        if self.gamma <= 0.0 {
            return Err(CodecError::invalid_param(format!(
                "received bad value for gamma {}, expects > 0.0",
                self.gamma
            )));
        }
        if self.offset_sdr < 0.0 {
            return Err(CodecError::invalid_param(format!(
                "received bad value for offset sdr {}, expects to be >= 0.0",
                self.offset_sdr
            )));
        }
        if self.offset_hdr < 0.0 {
            return Err(CodecError::invalid_param(format!(
                "received bad value for offset hdr {}, expects to be >= 0.0",
                self.offset_hdr
            )));
        }
        if self.hdr_capacity_max < self.hdr_capacity_min {
            return Err(CodecError::invalid_param(format!(
                "received bad value for hdr capacity min {} > max {}",
                self.hdr_capacity_min, self.hdr_capacity_max
            )));
        }
        if self.hdr_capacity_min < 1.0 {
            return Err(CodecError::invalid_param(format!(
                "received bad value for hdr capacity min {}, expects to be >= 1.0",
                self.hdr_capacity_min
            )));
        }
        Ok(())
    }
}
