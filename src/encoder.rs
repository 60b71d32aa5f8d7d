//! Ultra HDR encoder facade.
//!
//! The encoder collects role-labelled inputs (intents), geometric effects
//! and codec options while in its configurable state. The first `encode`
//! call freezes the instance, picks one of five engine paths from the set of
//! supplied intents and caches the outcome; `reset` returns the instance to
//! its configurable state with defaults restored.

use crate::container::ContainerEngine;
use crate::effects::{run_encoder_pipeline, Effect};
use crate::engine::{GainMapOptions, JpegrEngine};
use crate::image::{CompressedImage, RawImage, RawImageView, DEFAULT_STRIDE_ALIGNMENT};
use crate::limits;
use crate::types::{
    CodecError, ColorGamut, ColorRange, ColorTransfer, GainMapMetadata, Intent, IntentMap,
    OutputCodec, PixelFormat, Result,
};

/// Default JPEG quality for the HDR, SDR and base intents.
pub const BASE_QUALITY_DEFAULT: u8 = 95;

/// Default JPEG quality for the compressed gain map.
pub const GAINMAP_QUALITY_DEFAULT: u8 = 85;

/// Default downscale factor between base image and gain map.
pub const GAINMAP_SCALE_FACTOR_DEFAULT: u32 = 4;

/// Default for multi-channel gain-map generation.
pub const MULTI_CHANNEL_GAINMAP_DEFAULT: bool = false;

const SAILED_DETAIL: &str = "an earlier call to encode() has switched the context from \
                             configurable state to end state. The context is no longer \
                             configurable. To reuse, call reset()";

fn default_quality() -> [u8; 4] {
    let mut quality = [BASE_QUALITY_DEFAULT; 4];
    quality[Intent::GainMap.index()] = GAINMAP_QUALITY_DEFAULT;
    quality
}

/// Stateful Ultra HDR encoder.
pub struct Encoder {
    engine: Box<dyn JpegrEngine>,
    raw_images: IntentMap<RawImage>,
    compressed_images: IntentMap<CompressedImage>,
    quality: [u8; 4],
    exif: Vec<u8>,
    output_codec: OutputCodec,
    gainmap_scale_factor: u32,
    multi_channel_gainmap: bool,
    metadata: GainMapMetadata,
    effects: Vec<Effect>,
    output: Option<CompressedImage>,
    sailed: bool,
    encode_status: Result<()>,
}

impl Default for Encoder {
    fn default() -> Self {
        Encoder::new()
    }
}

impl Encoder {
    /// Create an encoder backed by the bundled [`ContainerEngine`].
    ///
    /// The bundled engine supports the compressed-input assembly path only;
    /// use [`Encoder::with_engine`] to wire in a full pixel codec.
    pub fn new() -> Self {
        Encoder::with_engine(Box::new(ContainerEngine::new()))
    }

    /// Create an encoder backed by the given engine.
    pub fn with_engine(engine: Box<dyn JpegrEngine>) -> Self {
        Encoder {
            engine,
            raw_images: IntentMap::new(),
            compressed_images: IntentMap::new(),
            quality: default_quality(),
            exif: Vec::new(),
            output_codec: OutputCodec::Jpeg,
            gainmap_scale_factor: GAINMAP_SCALE_FACTOR_DEFAULT,
            multi_channel_gainmap: MULTI_CHANNEL_GAINMAP_DEFAULT,
            metadata: GainMapMetadata::default(),
            effects: Vec::new(),
            output: None,
            sailed: false,
            encode_status: Ok(()),
        }
    }

    fn guard_configurable(&self) -> Result<()> {
        if self.sailed {
            return Err(CodecError::invalid_operation(SAILED_DETAIL));
        }
        Ok(())
    }

    /// Supply a raw image for the HDR or SDR intent.
    ///
    /// The planes described by `img` are validated against the per-format
    /// rules and copied into an owned planar buffer; the caller's memory is
    /// not referenced after this returns.
    pub fn set_raw_image(&mut self, img: &RawImageView<'_>, intent: Intent) -> Result<()> {
        if intent != Intent::Hdr && intent != Intent::Sdr {
            return Err(CodecError::invalid_param(format!(
                "invalid intent {intent:?}, expects one of {{Hdr, Sdr}}"
            )));
        }
        if intent == Intent::Hdr
            && img.format != PixelFormat::P010
            && img.format != PixelFormat::Rgba1010102
        {
            return Err(CodecError::invalid_param(format!(
                "unsupported input pixel format for hdr intent {:?}, expects one of {{P010, \
                 Rgba1010102}}",
                img.format
            )));
        }
        if intent == Intent::Sdr
            && img.format != PixelFormat::Yuv420
            && img.format != PixelFormat::Rgba8888
        {
            return Err(CodecError::invalid_param(format!(
                "unsupported input pixel format for sdr intent {:?}, expects one of {{Yuv420, \
                 Rgba8888}}",
                img.format
            )));
        }
        if !matches!(
            img.gamut,
            ColorGamut::Bt2100 | ColorGamut::DisplayP3 | ColorGamut::Bt709
        ) {
            return Err(CodecError::invalid_param(format!(
                "invalid input color gamut {:?}, expects one of {{Bt2100, DisplayP3, Bt709}}",
                img.gamut
            )));
        }
        if img.format == PixelFormat::Yuv420 && img.transfer != ColorTransfer::Srgb {
            return Err(CodecError::invalid_param(format!(
                "invalid input color transfer for sdr intent image {:?}, expects Srgb",
                img.transfer
            )));
        }
        if img.format == PixelFormat::P010
            && !matches!(
                img.transfer,
                ColorTransfer::Hlg | ColorTransfer::Linear | ColorTransfer::Pq
            )
        {
            return Err(CodecError::invalid_param(format!(
                "invalid input color transfer for hdr intent image {:?}, expects one of {{Hlg, \
                 Linear, Pq}}",
                img.transfer
            )));
        }
        if img.width % 2 != 0 || img.height % 2 != 0 {
            return Err(CodecError::invalid_param(format!(
                "image dimensions cannot be odd, received image dimensions {}x{}",
                img.width, img.height
            )));
        }
        if img.width < limits::MIN_WIDTH || img.height < limits::MIN_HEIGHT {
            return Err(CodecError::invalid_param(format!(
                "image dimensions cannot be less than {}x{}, received image dimensions {}x{}",
                limits::MIN_WIDTH,
                limits::MIN_HEIGHT,
                img.width,
                img.height
            )));
        }
        if img.width > limits::MAX_WIDTH || img.height > limits::MAX_HEIGHT {
            return Err(CodecError::invalid_param(format!(
                "image dimensions cannot be larger than {}x{}, received image dimensions {}x{}",
                limits::MAX_WIDTH,
                limits::MAX_HEIGHT,
                img.width,
                img.height
            )));
        }
        self.validate_planes(img)?;

        // The two raw intents must agree on resolution.
        let other = match intent {
            Intent::Hdr => Intent::Sdr,
            _ => Intent::Hdr,
        };
        if let Some(existing) = self.raw_images.get(other) {
            if img.width != existing.width() || img.height != existing.height() {
                return Err(CodecError::invalid_param(format!(
                    "image resolutions mismatch: {:?} intent: {}x{}, {:?} intent: {}x{}",
                    intent,
                    img.width,
                    img.height,
                    other,
                    existing.width(),
                    existing.height()
                )));
            }
        }
        self.guard_configurable()?;

        let owned = RawImage::from_view(img, DEFAULT_STRIDE_ALIGNMENT)?;
        self.raw_images.insert(intent, owned);
        Ok(())
    }

    fn validate_planes(&self, img: &RawImageView<'_>) -> Result<()> {
        match img.format {
            PixelFormat::P010 => {
                if img.planes[0].is_none() || img.planes[1].is_none() {
                    return Err(CodecError::invalid_param(
                        "missing data for luma and/or chroma_uv plane",
                    ));
                }
                if img.strides[0] < img.width {
                    return Err(CodecError::invalid_param(format!(
                        "luma stride must not be smaller than width, stride={}, width={}",
                        img.strides[0], img.width
                    )));
                }
                if img.strides[1] < img.width {
                    return Err(CodecError::invalid_param(format!(
                        "chroma_uv stride must not be smaller than width, stride={}, width={}",
                        img.strides[1], img.width
                    )));
                }
            }
            PixelFormat::Yuv420 => {
                if img.planes.iter().any(|plane| plane.is_none()) {
                    return Err(CodecError::invalid_param(
                        "missing data for luma and/or chroma plane(s)",
                    ));
                }
                if img.strides[0] < img.width {
                    return Err(CodecError::invalid_param(format!(
                        "luma stride must not be smaller than width, stride={}, width={}",
                        img.strides[0], img.width
                    )));
                }
                if img.strides[1] < img.width / 2 {
                    return Err(CodecError::invalid_param(format!(
                        "chroma_u stride must not be smaller than width / 2, stride={}, width={}",
                        img.strides[1], img.width
                    )));
                }
                if img.strides[2] < img.width / 2 {
                    return Err(CodecError::invalid_param(format!(
                        "chroma_v stride must not be smaller than width / 2, stride={}, width={}",
                        img.strides[2], img.width
                    )));
                }
            }
            _ => {
                if img.planes[0].is_none() {
                    return Err(CodecError::invalid_param("missing data for pixel plane"));
                }
                if img.strides[0] < img.width {
                    return Err(CodecError::invalid_param(format!(
                        "stride must not be smaller than width, stride={}, width={}",
                        img.strides[0], img.width
                    )));
                }
            }
        }
        Ok(())
    }

    fn set_compressed(&mut self, img: &CompressedImage, intent: Intent) -> Result<()> {
        if img.is_empty() {
            return Err(CodecError::invalid_param(
                "received empty buffer for compressed image",
            ));
        }
        self.guard_configurable()?;
        self.compressed_images.insert(intent, img.clone());
        Ok(())
    }

    /// Supply a compressed image for the HDR, SDR or base intent.
    pub fn set_compressed_image(&mut self, img: &CompressedImage, intent: Intent) -> Result<()> {
        if !matches!(intent, Intent::Hdr | Intent::Sdr | Intent::Base) {
            return Err(CodecError::invalid_param(format!(
                "invalid intent {intent:?}, expects one of {{Hdr, Sdr, Base}}"
            )));
        }
        self.set_compressed(img, intent)
    }

    /// Supply a compressed gain-map image together with its metadata
    /// descriptor.
    pub fn set_gainmap_image(
        &mut self,
        img: &CompressedImage,
        metadata: &GainMapMetadata,
    ) -> Result<()> {
        metadata.validate()?;
        self.set_compressed(img, Intent::GainMap)?;
        self.metadata = *metadata;
        Ok(())
    }

    /// Set the JPEG quality factor for one intent.
    pub fn set_quality(&mut self, quality: u8, intent: Intent) -> Result<()> {
        if quality > 100 {
            return Err(CodecError::invalid_param(format!(
                "invalid quality factor {quality}, expects in range [0-100]"
            )));
        }
        self.guard_configurable()?;
        self.quality[intent.index()] = quality;
        Ok(())
    }

    /// Attach an EXIF payload to the output stream.
    pub fn set_exif_data(&mut self, exif: &[u8]) -> Result<()> {
        if exif.is_empty() {
            return Err(CodecError::invalid_param("received empty exif payload"));
        }
        self.guard_configurable()?;
        self.exif = exif.to_vec();
        Ok(())
    }

    /// Choose the output media type. Only JPEG output is implemented.
    pub fn set_output_format(&mut self, codec: OutputCodec) -> Result<()> {
        if codec != OutputCodec::Jpeg {
            return Err(CodecError::unsupported_feature(format!(
                "invalid output format {codec:?}, expects {{Jpeg}}"
            )));
        }
        self.guard_configurable()?;
        self.output_codec = codec;
        Ok(())
    }

    /// Set the downscale factor between base image and gain map.
    pub fn set_gainmap_scale_factor(&mut self, factor: u32) -> Result<()> {
        if factor == 0 {
            return Err(CodecError::invalid_param(
                "invalid gainmap scale factor 0, expects >= 1",
            ));
        }
        self.guard_configurable()?;
        self.gainmap_scale_factor = factor;
        Ok(())
    }

    /// Encode one gain-map channel per color channel instead of luma only.
    pub fn set_multi_channel_gainmap(&mut self, enabled: bool) -> Result<()> {
        self.guard_configurable()?;
        self.multi_channel_gainmap = enabled;
        Ok(())
    }

    /// Append a geometric effect to the queue.
    pub fn add_effect(&mut self, effect: Effect) -> Result<()> {
        if let Effect::Rotate(degrees) = effect {
            if !matches!(degrees, 90 | 180 | 270) {
                return Err(CodecError::invalid_param(format!(
                    "unsupported rotation degrees {degrees}, expects one of {{90, 180, 270}}"
                )));
            }
        }
        self.guard_configurable()?;
        self.effects.push(effect);
        Ok(())
    }

    /// Run the encode. The first call moves the instance to its end state
    /// and caches the outcome; later calls return the cached status without
    /// touching the engine.
    pub fn encode(&mut self) -> Result<()> {
        if self.sailed {
            return self.encode_status.clone();
        }
        self.sailed = true;

        let status = self.run_encode();
        if status.is_err() {
            self.output = None;
        }
        self.encode_status = status.clone();
        status
    }

    fn run_encode(&mut self) -> Result<()> {
        if self.output_codec != OutputCodec::Jpeg {
            return Err(CodecError::unsupported_feature(format!(
                "invalid output format {:?}, expects {{Jpeg}}",
                self.output_codec
            )));
        }

        // Both base and gain map compressed: pure assembly.
        if let (Some(base), Some(gainmap)) = (
            self.compressed_images.get(Intent::Base),
            self.compressed_images.get(Intent::GainMap),
        ) {
            if !self.effects.is_empty() {
                return Err(CodecError::invalid_operation(
                    "image effects are not enabled for inputs with compressed intent",
                ));
            }
            let size = (8 * 1024).max(2 * (base.data_sz() + gainmap.data_sz()));
            let mut output = CompressedImage::with_capacity(
                size,
                ColorGamut::Unspecified,
                ColorTransfer::Unspecified,
                ColorRange::Unspecified,
            );
            let outcome = self
                .engine
                .encode_api4(base, gainmap, &self.metadata, output.buf_mut())
                .map_err(CodecError::from)?;
            output.set_data_sz(outcome.bytes_written);
            output.set_gamut(outcome.gamut);
            self.output = Some(output);
            return Ok(());
        }

        let Some(mut hdr) = self.raw_images.take(Intent::Hdr) else {
            return Err(CodecError::invalid_operation(
                "resources required for encode operation are not present",
            ));
        };
        let mut sdr_raw = self.raw_images.take(Intent::Sdr);
        let sdr_compressed_present = self.compressed_images.contains(Intent::Sdr);

        if !self.effects.is_empty() {
            if sdr_compressed_present {
                return Err(CodecError::invalid_operation(
                    "image effects are not enabled for inputs with compressed intent",
                ));
            }
            (hdr, sdr_raw) = run_encoder_pipeline(&self.effects, hdr, sdr_raw)?;
        }

        let size = (8 * 1024).max(hdr.width() as usize * hdr.height() as usize * 3 * 2);
        let mut output = CompressedImage::with_capacity(
            size,
            ColorGamut::Unspecified,
            ColorTransfer::Unspecified,
            ColorRange::Unspecified,
        );
        let options = GainMapOptions {
            scale_factor: self.gainmap_scale_factor,
            quality: self.quality[Intent::GainMap.index()],
            multi_channel: self.multi_channel_gainmap,
        };
        let transfer = hdr.transfer();
        let quality = self.quality[Intent::Base.index()];
        let exif = (!self.exif.is_empty()).then_some(self.exif.as_slice());

        let result = match (&sdr_raw, self.compressed_images.get(Intent::Sdr)) {
            (None, None) => self
                .engine
                .encode_api0(&hdr, transfer, quality, exif, &options, output.buf_mut()),
            (None, Some(sdr_jpeg)) => self
                .engine
                .encode_api3(&hdr, sdr_jpeg, transfer, &options, output.buf_mut()),
            (Some(sdr), None) => self.engine.encode_api1(
                &hdr,
                sdr,
                transfer,
                quality,
                exif,
                &options,
                output.buf_mut(),
            ),
            (Some(sdr), Some(sdr_jpeg)) => self.engine.encode_api2(
                &hdr,
                sdr,
                sdr_jpeg,
                transfer,
                &options,
                output.buf_mut(),
            ),
        };

        // The intents stay owned by the instance, post-pipeline shapes
        // included, matching the reference behavior.
        self.raw_images.insert(Intent::Hdr, hdr);
        if let Some(sdr) = sdr_raw {
            self.raw_images.insert(Intent::Sdr, sdr);
        }

        let outcome = result.map_err(CodecError::from)?;
        output.set_data_sz(outcome.bytes_written);
        output.set_gamut(outcome.gamut);
        self.output = Some(output);
        Ok(())
    }

    /// The encoded stream, available once `encode` has succeeded.
    pub fn encoded_stream(&self) -> Option<&CompressedImage> {
        if !self.sailed || self.encode_status.is_err() {
            return None;
        }
        self.output.as_ref()
    }

    /// Clear all state and restore defaults; the instance becomes
    /// configurable again.
    pub fn reset(&mut self) {
        self.raw_images.clear();
        self.compressed_images.clear();
        self.quality = default_quality();
        self.exif.clear();
        self.output_codec = OutputCodec::Jpeg;
        self.gainmap_scale_factor = GAINMAP_SCALE_FACTOR_DEFAULT;
        self.multi_channel_gainmap = MULTI_CHANNEL_GAINMAP_DEFAULT;
        self.metadata = GainMapMetadata::default();
        self.effects.clear();
        self.output = None;
        self.sailed = false;
        self.encode_status = Ok(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoder_defaults() {
        let encoder = Encoder::new();
        assert_eq!(encoder.quality[Intent::Hdr.index()], BASE_QUALITY_DEFAULT);
        assert_eq!(encoder.quality[Intent::Base.index()], BASE_QUALITY_DEFAULT);
        assert_eq!(
            encoder.quality[Intent::GainMap.index()],
            GAINMAP_QUALITY_DEFAULT
        );
        assert_eq!(encoder.gainmap_scale_factor, GAINMAP_SCALE_FACTOR_DEFAULT);
        assert_eq!(
            encoder.multi_channel_gainmap,
            MULTI_CHANNEL_GAINMAP_DEFAULT
        );
        assert_eq!(encoder.output_codec, OutputCodec::Jpeg);
        assert!(!encoder.sailed);
    }

    #[test]
    fn quality_range_is_checked() {
        let mut encoder = Encoder::new();
        assert!(encoder.set_quality(100, Intent::Base).is_ok());
        assert!(encoder.set_quality(0, Intent::GainMap).is_ok());
        let err = encoder.set_quality(101, Intent::Base).unwrap_err();
        assert!(err.detail().contains("quality factor"));
    }

    #[test]
    fn non_jpeg_output_codec_is_unsupported() {
        let mut encoder = Encoder::new();
        let err = encoder.set_output_format(OutputCodec::Avif).unwrap_err();
        assert_eq!(
            err.kind(),
            crate::types::ErrorKind::UnsupportedFeature
        );
    }

    #[test]
    fn scale_factor_must_be_positive() {
        let mut encoder = Encoder::new();
        assert!(encoder.set_gainmap_scale_factor(0).is_err());
        assert!(encoder.set_gainmap_scale_factor(1).is_ok());
    }

    #[test]
    fn rotation_degrees_are_validated_on_append() {
        let mut encoder = Encoder::new();
        assert!(encoder.add_effect(Effect::Rotate(90)).is_ok());
        assert!(encoder.add_effect(Effect::Rotate(45)).is_err());
    }
}
