//! Ultra HDR decoder facade.
//!
//! The decoder walks three states: configurable, probed, end. `probe`
//! parses container-level facts (dimensions, metadata, EXIF, ICC, XMP) and
//! freezes configuration; `decode` implies `probe`, produces the
//! reconstructed image plus the extracted gain map, and is terminal. Both
//! cache their first outcome and replay it on repeated calls.

use crate::container::{xmp, ContainerEngine};
use crate::effects::{run_decoder_pipeline, Effect};
use crate::engine::{JpegrEngine, OutputFormat};
use crate::image::{CompressedImage, RawImage};
use crate::types::{
    CodecError, ColorGamut, ColorRange, ColorTransfer, GainMapMetadata, PixelFormat, Result,
};

/// Default maximum display boost: no clamp.
pub const MAX_DISPLAY_BOOST_DEFAULT: f32 = f32::INFINITY;

const PROBED_DETAIL: &str = "an earlier call to probe() or decode() has switched the context \
                             from configurable state to end state. The context is no longer \
                             configurable. To reuse, call reset()";

/// Stateful Ultra HDR decoder.
pub struct Decoder {
    engine: Box<dyn JpegrEngine>,
    input: Option<CompressedImage>,
    output_format: PixelFormat,
    output_transfer: ColorTransfer,
    max_display_boost: f32,
    effects: Vec<Effect>,
    probed: bool,
    sailed: bool,
    probe_status: Result<()>,
    decode_status: Result<()>,
    image_width: u32,
    image_height: u32,
    gainmap_width: u32,
    gainmap_height: u32,
    exif: Vec<u8>,
    icc: Vec<u8>,
    base_xmp: Vec<u8>,
    gainmap_xmp: Vec<u8>,
    metadata: GainMapMetadata,
    decoded: Option<RawImage>,
    gainmap: Option<RawImage>,
}

impl Default for Decoder {
    fn default() -> Self {
        Decoder::new()
    }
}

impl Decoder {
    /// Create a decoder backed by the bundled [`ContainerEngine`].
    ///
    /// The bundled engine can probe streams but not decode pixels; use
    /// [`Decoder::with_engine`] to wire in a full pixel codec.
    pub fn new() -> Self {
        Decoder::with_engine(Box::new(ContainerEngine::new()))
    }

    /// Create a decoder backed by the given engine.
    pub fn with_engine(engine: Box<dyn JpegrEngine>) -> Self {
        Decoder {
            engine,
            input: None,
            output_format: PixelFormat::Rgba64Float,
            output_transfer: ColorTransfer::Linear,
            max_display_boost: MAX_DISPLAY_BOOST_DEFAULT,
            effects: Vec::new(),
            probed: false,
            sailed: false,
            probe_status: Ok(()),
            decode_status: Ok(()),
            image_width: 0,
            image_height: 0,
            gainmap_width: 0,
            gainmap_height: 0,
            exif: Vec::new(),
            icc: Vec::new(),
            base_xmp: Vec::new(),
            gainmap_xmp: Vec::new(),
            metadata: GainMapMetadata::default(),
            decoded: None,
            gainmap: None,
        }
    }

    fn guard_configurable(&self) -> Result<()> {
        if self.probed {
            return Err(CodecError::invalid_operation(PROBED_DETAIL));
        }
        Ok(())
    }

    /// Supply the compressed Ultra HDR stream to decode. The bytes are
    /// deep-copied; the caller's buffer is not referenced afterwards.
    pub fn set_image(&mut self, img: &CompressedImage) -> Result<()> {
        if img.is_empty() {
            return Err(CodecError::invalid_param(
                "received empty buffer for compressed image",
            ));
        }
        self.guard_configurable()?;
        self.input = Some(img.clone());
        Ok(())
    }

    /// Choose the output pixel format.
    pub fn set_output_format(&mut self, format: PixelFormat) -> Result<()> {
        if !matches!(
            format,
            PixelFormat::Rgba8888 | PixelFormat::Rgba64Float | PixelFormat::Rgba1010102
        ) {
            return Err(CodecError::invalid_param(format!(
                "invalid output format {format:?}, expects one of {{Rgba8888, Rgba64Float, \
                 Rgba1010102}}"
            )));
        }
        self.guard_configurable()?;
        self.output_format = format;
        Ok(())
    }

    /// Choose the output color transfer.
    pub fn set_output_transfer(&mut self, transfer: ColorTransfer) -> Result<()> {
        if !matches!(
            transfer,
            ColorTransfer::Hlg | ColorTransfer::Pq | ColorTransfer::Linear | ColorTransfer::Srgb
        ) {
            return Err(CodecError::invalid_param(format!(
                "invalid output color transfer {transfer:?}, expects one of {{Hlg, Pq, Linear, \
                 Srgb}}"
            )));
        }
        self.guard_configurable()?;
        self.output_transfer = transfer;
        Ok(())
    }

    /// Cap the display boost the reconstruction targets.
    pub fn set_max_display_boost(&mut self, display_boost: f32) -> Result<()> {
        if display_boost.is_nan() || display_boost < 1.0 {
            return Err(CodecError::invalid_param(format!(
                "invalid display boost {display_boost}, expects to be >= 1.0"
            )));
        }
        self.guard_configurable()?;
        self.max_display_boost = display_boost;
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

    /// Parse container-level information from the supplied stream.
    ///
    /// The first call freezes configuration and caches the outcome;
    /// repeated calls replay it without touching the engine.
    pub fn probe(&mut self) -> Result<()> {
        if self.probed {
            return self.probe_status.clone();
        }
        self.probed = true;

        let status = self.run_probe();
        self.probe_status = status.clone();
        status
    }

    fn run_probe(&mut self) -> Result<()> {
        let Some(input) = self.input.as_ref() else {
            return Err(CodecError::invalid_operation(
                "did not receive any image for decoding",
            ));
        };

        let info = self.engine.info(input.data()).map_err(CodecError::from)?;

        let gainmap_xmp = String::from_utf8_lossy(&info.gainmap.xmp);
        let Some(metadata) = xmp::parse_gainmap_xmp(&gainmap_xmp) else {
            return Err(CodecError::unknown("encountered error while parsing metadata"));
        };

        self.metadata = metadata;
        self.image_width = info.primary.width;
        self.image_height = info.primary.height;
        self.gainmap_width = info.gainmap.width;
        self.gainmap_height = info.gainmap.height;
        self.exif = info.primary.exif;
        self.icc = info.primary.icc;
        self.base_xmp = info.primary.xmp;
        self.gainmap_xmp = info.gainmap.xmp;
        Ok(())
    }

    /// Decode the stream into pixels and the extracted gain map. Probes
    /// first when needed. The first call is terminal; repeated calls replay
    /// the cached outcome.
    pub fn decode(&mut self) -> Result<()> {
        if self.sailed {
            return self.decode_status.clone();
        }

        let probe_status = self.probe();
        if probe_status.is_err() {
            self.decode_status = probe_status.clone();
            return probe_status;
        }
        self.sailed = true;

        let status = self.run_decode();
        self.decode_status = status.clone();
        status
    }

    fn run_decode(&mut self) -> Result<()> {
        let Some(output_format) = OutputFormat::select(self.output_transfer, self.output_format)
        else {
            return Err(CodecError::invalid_param(
                "unsupported output pixel format and output color transfer pair",
            ));
        };
        let Some(input) = self.input.as_ref() else {
            return Err(CodecError::invalid_operation(
                "did not receive any image for decoding",
            ));
        };

        let mut decoded = RawImage::new(
            self.output_format,
            ColorGamut::Unspecified,
            self.output_transfer,
            ColorRange::Unspecified,
            self.image_width,
            self.image_height,
            1,
        )?;
        let mut gainmap = RawImage::new(
            PixelFormat::Y400,
            ColorGamut::Unspecified,
            ColorTransfer::Unspecified,
            ColorRange::Unspecified,
            self.gainmap_width,
            self.gainmap_height,
            1,
        )?;

        let gamut = self
            .engine
            .decode(
                input.data(),
                output_format,
                self.max_display_boost,
                &mut decoded,
                &mut gainmap,
            )
            .map_err(CodecError::from)?;
        decoded.set_gamut(gamut);

        if !self.effects.is_empty() {
            (decoded, gainmap) = run_decoder_pipeline(&self.effects, decoded, gainmap)?;
        }

        self.decoded = Some(decoded);
        self.gainmap = Some(gainmap);
        Ok(())
    }

    fn probed_ok(&self) -> bool {
        self.probed && self.probe_status.is_ok()
    }

    fn decoded_ok(&self) -> bool {
        self.sailed && self.decode_status.is_ok()
    }

    /// Width of the primary image, once probed.
    pub fn image_width(&self) -> Option<u32> {
        self.probed_ok().then_some(self.image_width)
    }

    /// Height of the primary image, once probed.
    pub fn image_height(&self) -> Option<u32> {
        self.probed_ok().then_some(self.image_height)
    }

    /// Width of the gain-map image, once probed.
    pub fn gainmap_width(&self) -> Option<u32> {
        self.probed_ok().then_some(self.gainmap_width)
    }

    /// Height of the gain-map image, once probed.
    pub fn gainmap_height(&self) -> Option<u32> {
        self.probed_ok().then_some(self.gainmap_height)
    }

    /// EXIF payload of the primary image, once probed. Empty when the
    /// stream carries none.
    pub fn exif(&self) -> Option<&[u8]> {
        self.probed_ok().then_some(self.exif.as_slice())
    }

    /// ICC profile of the primary image, once probed. Empty when the
    /// stream carries none.
    pub fn icc(&self) -> Option<&[u8]> {
        self.probed_ok().then_some(self.icc.as_slice())
    }

    /// XMP packet of the primary image, once probed.
    pub fn base_xmp(&self) -> Option<&[u8]> {
        self.probed_ok().then_some(self.base_xmp.as_slice())
    }

    /// XMP packet of the gain-map image, once probed.
    pub fn gainmap_xmp(&self) -> Option<&[u8]> {
        self.probed_ok().then_some(self.gainmap_xmp.as_slice())
    }

    /// Gain-map metadata descriptor, once probed.
    pub fn gainmap_metadata(&self) -> Option<&GainMapMetadata> {
        self.probed_ok().then(|| &self.metadata)
    }

    /// The reconstructed image, once decoded.
    pub fn decoded_image(&self) -> Option<&RawImage> {
        if !self.decoded_ok() {
            return None;
        }
        self.decoded.as_ref()
    }

    /// The extracted single-plane gain-map image, once decoded.
    pub fn gainmap_image(&self) -> Option<&RawImage> {
        if !self.decoded_ok() {
            return None;
        }
        self.gainmap.as_ref()
    }

    /// Clear all state and restore defaults; the instance becomes
    /// configurable again.
    pub fn reset(&mut self) {
        self.input = None;
        self.output_format = PixelFormat::Rgba64Float;
        self.output_transfer = ColorTransfer::Linear;
        self.max_display_boost = MAX_DISPLAY_BOOST_DEFAULT;
        self.effects.clear();
        self.probed = false;
        self.sailed = false;
        self.probe_status = Ok(());
        self.decode_status = Ok(());
        self.image_width = 0;
        self.image_height = 0;
        self.gainmap_width = 0;
        self.gainmap_height = 0;
        self.exif.clear();
        self.icc.clear();
        self.base_xmp.clear();
        self.gainmap_xmp.clear();
        self.metadata = GainMapMetadata::default();
        self.decoded = None;
        self.gainmap = None;
    }
}

/// Whether the bytes look like a valid Ultra HDR image: a throwaway decoder
/// is fed the buffer and probed.
pub fn is_uhdr_image(data: &[u8]) -> bool {
    let mut decoder = Decoder::new();
    let img = CompressedImage::from_bytes(
        data,
        ColorGamut::Unspecified,
        ColorTransfer::Unspecified,
        ColorRange::Unspecified,
    );
    if decoder.set_image(&img).is_err() {
        return false;
    }
    decoder.probe().is_ok()
}
