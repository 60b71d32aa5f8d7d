//! Shared fixtures: owned raw-image buffers, synthetic JPEG streams and a
//! scripted engine that records how the facade drives it.

// Each integration test binary compiles its own copy and uses a subset.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use uhdr_codec::{
    ColorGamut, ColorRange, ColorTransfer, CompressedImage, EncodeOutput, EngineError,
    EngineResult, GainMapInfo, GainMapMetadata, GainMapOptions, JpegrEngine, JpegrInfo,
    OutputFormat, Plane, PrimaryInfo, RawImage, RawImageView,
};

/// Minimal JPEG with a real SOF marker: SOI + APP0 + SOF0 + EOI.
pub fn synthetic_jpeg(width: u16, height: u16) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8];
    data.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x07, b'J', b'F', b'I', b'F', 0x00]);
    data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x0B, 0x08]);
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&[0x01, 0x01, 0x11, 0x00]);
    data.extend_from_slice(&[0xFF, 0xD9]);
    data
}

/// Compressed image wrapper around arbitrary bytes.
pub fn compressed(data: &[u8], gamut: ColorGamut) -> CompressedImage {
    CompressedImage::from_bytes(
        data,
        gamut,
        ColorTransfer::Unspecified,
        ColorRange::Unspecified,
    )
}

/// Gain-map metadata with a 4x boost, valid per the setter checks.
pub fn metadata_4x() -> GainMapMetadata {
    GainMapMetadata {
        max_content_boost: 4.0,
        hdr_capacity_max: 4.0,
        ..GainMapMetadata::default()
    }
}

/// Owned backing store for a P010 view.
pub struct P010Buffer {
    pub width: u32,
    pub height: u32,
    pub luma: Vec<u8>,
    pub chroma: Vec<u8>,
}

impl P010Buffer {
    pub fn new(width: u32, height: u32) -> Self {
        P010Buffer {
            width,
            height,
            luma: vec![0u8; (width * height * 2) as usize],
            chroma: vec![0u8; (width * height) as usize],
        }
    }

    pub fn view(&self, gamut: ColorGamut, transfer: ColorTransfer) -> RawImageView<'_> {
        RawImageView::p010(
            gamut,
            transfer,
            ColorRange::Limited,
            self.width,
            self.height,
            &self.luma,
            &self.chroma,
            self.width,
            self.width,
        )
    }

    pub fn hdr_view(&self) -> RawImageView<'_> {
        self.view(ColorGamut::Bt2100, ColorTransfer::Hlg)
    }
}

/// Owned backing store for a YCbCr 4:2:0 view.
pub struct Yuv420Buffer {
    pub width: u32,
    pub height: u32,
    pub luma: Vec<u8>,
    pub chroma_u: Vec<u8>,
    pub chroma_v: Vec<u8>,
}

impl Yuv420Buffer {
    pub fn new(width: u32, height: u32) -> Self {
        Yuv420Buffer {
            width,
            height,
            luma: vec![0u8; (width * height) as usize],
            chroma_u: vec![0u8; (width * height / 4) as usize],
            chroma_v: vec![0u8; (width * height / 4) as usize],
        }
    }

    pub fn sdr_view(&self) -> RawImageView<'_> {
        RawImageView::yuv420(
            ColorGamut::Bt709,
            ColorTransfer::Srgb,
            ColorRange::Full,
            self.width,
            self.height,
            [&self.luma, &self.chroma_u, &self.chroma_v],
            [self.width, self.width / 2, self.width / 2],
        )
    }
}

/// Call log shared between a test and the engine it moved into the codec.
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Scripted engine: records every call, writes a fixed payload on encode,
/// fills planes with a marker byte on decode.
pub struct StubEngine {
    calls: CallLog,
    fail_with: Option<EngineError>,
    payload: Vec<u8>,
    gamut: ColorGamut,
    info: JpegrInfo,
}

impl StubEngine {
    pub fn new() -> (Self, CallLog) {
        let calls: CallLog = Arc::default();
        let engine = StubEngine {
            calls: Arc::clone(&calls),
            fail_with: None,
            payload: b"stub-encoded-stream".to_vec(),
            gamut: ColorGamut::Bt2100,
            info: default_info(),
        };
        (engine, calls)
    }

    /// Engine whose every operation fails with `error`.
    pub fn failing(error: EngineError) -> (Self, CallLog) {
        let (mut engine, calls) = StubEngine::new();
        engine.fail_with = Some(error);
        (engine, calls)
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_info(mut self, info: JpegrInfo) -> Self {
        self.info = info;
        self
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn fail(&self) -> Option<EngineError> {
        self.fail_with.clone()
    }

    fn write_payload(&self, dest: &mut [u8]) -> EngineResult<EncodeOutput> {
        if let Some(err) = self.fail() {
            return Err(err);
        }
        if dest.len() < self.payload.len() {
            return Err(EngineError::BufferTooSmall);
        }
        dest[..self.payload.len()].copy_from_slice(&self.payload);
        Ok(EncodeOutput {
            bytes_written: self.payload.len(),
            gamut: self.gamut,
        })
    }
}

/// Probe facts for a 1920x1080 primary with a quarter-resolution gain map
/// and a valid hdrgm metadata packet.
pub fn default_info() -> JpegrInfo {
    JpegrInfo {
        primary: PrimaryInfo {
            width: 1920,
            height: 1080,
            exif: b"exif-bytes".to_vec(),
            icc: b"icc-bytes".to_vec(),
            xmp: b"<x:xmpmeta/>".to_vec(),
        },
        gainmap: GainMapInfo {
            width: 480,
            height: 270,
            xmp: uhdr_codec::container::xmp::generate_gainmap_xmp(&metadata_4x()).into_bytes(),
        },
    }
}

impl JpegrEngine for StubEngine {
    fn encode_api0(
        &self,
        hdr: &RawImage,
        transfer: ColorTransfer,
        quality: u8,
        exif: Option<&[u8]>,
        _options: &GainMapOptions,
        dest: &mut [u8],
    ) -> EngineResult<EncodeOutput> {
        self.record(format!(
            "api0 hdr={}x{} ct={transfer:?} q={quality} exif={}",
            hdr.width(),
            hdr.height(),
            exif.is_some()
        ));
        self.write_payload(dest)
    }

    fn encode_api1(
        &self,
        hdr: &RawImage,
        sdr: &RawImage,
        transfer: ColorTransfer,
        quality: u8,
        exif: Option<&[u8]>,
        _options: &GainMapOptions,
        dest: &mut [u8],
    ) -> EngineResult<EncodeOutput> {
        self.record(format!(
            "api1 hdr={}x{} sdr={}x{} ct={transfer:?} q={quality} exif={}",
            hdr.width(),
            hdr.height(),
            sdr.width(),
            sdr.height(),
            exif.is_some()
        ));
        self.write_payload(dest)
    }

    fn encode_api2(
        &self,
        hdr: &RawImage,
        sdr: &RawImage,
        sdr_compressed: &CompressedImage,
        transfer: ColorTransfer,
        _options: &GainMapOptions,
        dest: &mut [u8],
    ) -> EngineResult<EncodeOutput> {
        self.record(format!(
            "api2 hdr={}x{} sdr={}x{} sdr_jpeg={}B ct={transfer:?}",
            hdr.width(),
            hdr.height(),
            sdr.width(),
            sdr.height(),
            sdr_compressed.data_sz()
        ));
        self.write_payload(dest)
    }

    fn encode_api3(
        &self,
        hdr: &RawImage,
        sdr_compressed: &CompressedImage,
        transfer: ColorTransfer,
        _options: &GainMapOptions,
        dest: &mut [u8],
    ) -> EngineResult<EncodeOutput> {
        self.record(format!(
            "api3 hdr={}x{} sdr_jpeg={}B ct={transfer:?}",
            hdr.width(),
            hdr.height(),
            sdr_compressed.data_sz()
        ));
        self.write_payload(dest)
    }

    fn encode_api4(
        &self,
        base: &CompressedImage,
        gainmap: &CompressedImage,
        _metadata: &GainMapMetadata,
        dest: &mut [u8],
    ) -> EngineResult<EncodeOutput> {
        self.record(format!(
            "api4 base={}B gainmap={}B",
            base.data_sz(),
            gainmap.data_sz()
        ));
        self.write_payload(dest)
    }

    fn info(&self, data: &[u8]) -> EngineResult<JpegrInfo> {
        self.record(format!("info {}B", data.len()));
        if let Some(err) = self.fail() {
            return Err(err);
        }
        Ok(self.info.clone())
    }

    fn decode(
        &self,
        data: &[u8],
        output_format: OutputFormat,
        max_display_boost: f32,
        decoded: &mut RawImage,
        gainmap: &mut RawImage,
    ) -> EngineResult<ColorGamut> {
        self.record(format!(
            "decode {}B fmt={output_format:?} boost={max_display_boost}",
            data.len()
        ));
        if let Some(err) = self.fail() {
            return Err(err);
        }
        if let Some(pixels) = decoded.plane_data_mut(Plane::Y) {
            pixels.fill(0xAB);
        }
        if let Some(pixels) = gainmap.plane_data_mut(Plane::Y) {
            pixels.fill(0x7F);
        }
        Ok(self.gamut)
    }
}

/// Number of recorded calls whose label starts with `prefix`.
pub fn calls_with_prefix(calls: &CallLog, prefix: &str) -> usize {
    calls
        .lock()
        .unwrap()
        .iter()
        .filter(|call| call.starts_with(prefix))
        .count()
}

/// Clone of the recorded call labels.
pub fn recorded(calls: &CallLog) -> Vec<String> {
    calls.lock().unwrap().clone()
}
