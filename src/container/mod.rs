//! Pure-Rust Ultra HDR container support.
//!
//! [`ContainerEngine`] implements the container-level half of the engine
//! seam without bundling a pixel codec: probing an existing stream
//! ([`JpegrEngine::info`]) and assembling a stream from pre-compressed parts
//! (`encode_api4`). The raw-intent encode paths and pixel decoding need an
//! actual JPEG codec and report [`EngineError::Unsupported`]; wire a full
//! engine through [`crate::Encoder::with_engine`] for those.

pub mod mpf;
pub mod segments;
pub mod xmp;

use crate::engine::{
    EncodeOutput, EngineError, EngineResult, GainMapInfo, GainMapOptions, JpegrEngine, JpegrInfo,
    OutputFormat, PrimaryInfo,
};
use crate::image::{CompressedImage, RawImage};
use crate::types::{ColorGamut, ColorTransfer, GainMapMetadata};

/// Offset at which the MPF APP2 marker is inserted: directly after SOI.
const MPF_INSERT_POS: usize = 2;

fn no_pixel_codec(operation: &str) -> EngineError {
    EngineError::Unsupported(format!(
        "{operation} requires a pixel codec; the bundled container engine only assembles and \
         probes containers"
    ))
}

/// Codec-free engine for container-level operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerEngine;

impl ContainerEngine {
    /// Create the engine.
    pub fn new() -> Self {
        ContainerEngine
    }
}

/// Find the primary and gain-map image ranges, `(offset, length)` each.
///
/// The MPF directory is authoritative; a raw boundary scan covers streams
/// whose writer skipped the directory.
fn locate_images(data: &[u8]) -> Option<((usize, usize), (usize, usize))> {
    let in_bounds =
        |(off, len): (usize, usize)| len >= 4 && off.checked_add(len).is_some_and(|e| e <= data.len());

    if let Some(images) = mpf::parse_mpf(data) {
        if images.len() >= 2 && in_bounds(images[0]) && in_bounds(images[1]) {
            return Some((images[0], images[1]));
        }
    }

    let bounds = mpf::find_jpeg_boundaries(data);
    if bounds.len() >= 2 {
        return Some((bounds[0], bounds[1]));
    }
    None
}

impl JpegrEngine for ContainerEngine {
    fn encode_api0(
        &self,
        _hdr: &RawImage,
        _transfer: ColorTransfer,
        _quality: u8,
        _exif: Option<&[u8]>,
        _options: &GainMapOptions,
        _dest: &mut [u8],
    ) -> EngineResult<EncodeOutput> {
        Err(no_pixel_codec("encoding a raw hdr intent"))
    }

    fn encode_api1(
        &self,
        _hdr: &RawImage,
        _sdr: &RawImage,
        _transfer: ColorTransfer,
        _quality: u8,
        _exif: Option<&[u8]>,
        _options: &GainMapOptions,
        _dest: &mut [u8],
    ) -> EngineResult<EncodeOutput> {
        Err(no_pixel_codec("encoding raw hdr and sdr intents"))
    }

    fn encode_api2(
        &self,
        _hdr: &RawImage,
        _sdr: &RawImage,
        _sdr_compressed: &CompressedImage,
        _transfer: ColorTransfer,
        _options: &GainMapOptions,
        _dest: &mut [u8],
    ) -> EngineResult<EncodeOutput> {
        Err(no_pixel_codec("encoding raw hdr and sdr intents"))
    }

    fn encode_api3(
        &self,
        _hdr: &RawImage,
        _sdr_compressed: &CompressedImage,
        _transfer: ColorTransfer,
        _options: &GainMapOptions,
        _dest: &mut [u8],
    ) -> EngineResult<EncodeOutput> {
        Err(no_pixel_codec("encoding a raw hdr intent"))
    }

    fn encode_api4(
        &self,
        base: &CompressedImage,
        gainmap: &CompressedImage,
        metadata: &GainMapMetadata,
        dest: &mut [u8],
    ) -> EngineResult<EncodeOutput> {
        if !segments::is_jpeg(base.data()) {
            return Err(EngineError::Other(
                "base image intent is not a jpeg stream".into(),
            ));
        }
        if !segments::is_jpeg(gainmap.data()) {
            return Err(EngineError::Other(
                "gainmap image intent is not a jpeg stream".into(),
            ));
        }

        // The gain-map image carries the hdrgm metadata packet; the primary
        // carries the container directory referring to the finished gain map.
        let gm_xmp = xmp::generate_gainmap_xmp(metadata);
        let gm_image =
            segments::insert_after_soi(gainmap.data(), 0xE1, &segments::xmp_payload(&gm_xmp))
                .ok_or(EngineError::Encode)?;

        let container_xmp = xmp::generate_container_xmp(gm_image.len());
        let primary =
            segments::insert_after_soi(base.data(), 0xE1, &segments::xmp_payload(&container_xmp))
                .ok_or(EngineError::Encode)?;

        // The MPF header length does not depend on the sizes it records, so
        // a probe build resolves the self-referential primary length.
        let mpf_len = mpf::create_mpf_header(0, 0, MPF_INSERT_POS).len();
        let primary_total = primary.len() + mpf_len;
        let header = mpf::create_mpf_header(primary_total, gm_image.len(), MPF_INSERT_POS);

        let total = primary_total + gm_image.len();
        if dest.len() < total {
            return Err(EngineError::BufferTooSmall);
        }
        dest[..MPF_INSERT_POS].copy_from_slice(&primary[..MPF_INSERT_POS]);
        let mut at = MPF_INSERT_POS;
        dest[at..at + header.len()].copy_from_slice(&header);
        at += header.len();
        dest[at..at + primary.len() - MPF_INSERT_POS]
            .copy_from_slice(&primary[MPF_INSERT_POS..]);
        at = primary_total;
        dest[at..total].copy_from_slice(&gm_image);

        Ok(EncodeOutput {
            bytes_written: total,
            gamut: base.gamut(),
        })
    }

    fn info(&self, data: &[u8]) -> EngineResult<JpegrInfo> {
        if !segments::is_jpeg(data) {
            return Err(EngineError::NoImagesFound);
        }
        let ((p_off, p_len), (gm_off, gm_len)) =
            locate_images(data).ok_or(EngineError::GainMapNotFound)?;

        let primary_segments = segments::scan_segments(&data[p_off..p_off + p_len]);
        let (width, height) =
            segments::frame_dimensions(&primary_segments).ok_or(EngineError::Decode)?;

        let gm_segments = segments::scan_segments(&data[gm_off..gm_off + gm_len]);
        let (gm_width, gm_height) =
            segments::frame_dimensions(&gm_segments).ok_or(EngineError::Decode)?;

        Ok(JpegrInfo {
            primary: PrimaryInfo {
                width,
                height,
                exif: segments::extract_exif(&primary_segments),
                icc: segments::extract_icc(&primary_segments),
                xmp: segments::extract_xmp(&primary_segments),
            },
            gainmap: GainMapInfo {
                width: gm_width,
                height: gm_height,
                xmp: segments::extract_xmp(&gm_segments),
            },
        })
    }

    fn decode(
        &self,
        _data: &[u8],
        _output_format: OutputFormat,
        _max_display_boost: f32,
        _decoded: &mut RawImage,
        _gainmap: &mut RawImage,
    ) -> EngineResult<ColorGamut> {
        Err(no_pixel_codec("decoding pixels"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColorRange, ColorTransfer};

    fn compressed(data: &[u8], gamut: ColorGamut) -> CompressedImage {
        CompressedImage::from_bytes(data, gamut, ColorTransfer::Unspecified, ColorRange::Unspecified)
    }

    fn metadata() -> GainMapMetadata {
        GainMapMetadata {
            max_content_boost: 4.0,
            hdr_capacity_max: 4.0,
            ..GainMapMetadata::default()
        }
    }

    fn assemble(base_dims: (u16, u16), gm_dims: (u16, u16)) -> Vec<u8> {
        let base = compressed(&segments::synthetic_jpeg(base_dims.0, base_dims.1), ColorGamut::DisplayP3);
        let gm = compressed(&segments::synthetic_jpeg(gm_dims.0, gm_dims.1), ColorGamut::Unspecified);
        let mut dest = vec![0u8; 64 * 1024];
        let out = ContainerEngine::new()
            .encode_api4(&base, &gm, &metadata(), &mut dest)
            .unwrap();
        assert_eq!(out.gamut, ColorGamut::DisplayP3);
        dest.truncate(out.bytes_written);
        dest
    }

    #[test]
    fn api4_then_info_round_trips() {
        let stream = assemble((640, 480), (160, 120));
        let info = ContainerEngine::new().info(&stream).unwrap();
        assert_eq!((info.primary.width, info.primary.height), (640, 480));
        assert_eq!((info.gainmap.width, info.gainmap.height), (160, 120));
        assert!(!info.gainmap.xmp.is_empty());

        let xmp_text = String::from_utf8(info.gainmap.xmp).unwrap();
        let parsed = xmp::parse_gainmap_xmp(&xmp_text).unwrap();
        assert!((parsed.max_content_boost - 4.0).abs() < 1e-3);
    }

    #[test]
    fn api4_respects_destination_capacity() {
        let base = compressed(&segments::synthetic_jpeg(64, 64), ColorGamut::Bt709);
        let gm = compressed(&segments::synthetic_jpeg(16, 16), ColorGamut::Unspecified);
        let mut dest = vec![0u8; 16];
        let err = ContainerEngine::new()
            .encode_api4(&base, &gm, &metadata(), &mut dest)
            .unwrap_err();
        assert!(matches!(err, EngineError::BufferTooSmall));
    }

    #[test]
    fn api4_rejects_non_jpeg_inputs() {
        let base = compressed(b"plainly not a jpeg", ColorGamut::Bt709);
        let gm = compressed(&segments::synthetic_jpeg(16, 16), ColorGamut::Unspecified);
        let mut dest = vec![0u8; 1024];
        assert!(ContainerEngine::new()
            .encode_api4(&base, &gm, &metadata(), &mut dest)
            .is_err());
    }

    #[test]
    fn info_rejects_single_image_stream() {
        let lone = segments::synthetic_jpeg(32, 32);
        let err = ContainerEngine::new().info(&lone).unwrap_err();
        assert!(matches!(err, EngineError::GainMapNotFound));
    }

    #[test]
    fn info_rejects_non_jpeg() {
        let err = ContainerEngine::new().info(b"GIF89a").unwrap_err();
        assert!(matches!(err, EngineError::NoImagesFound));
    }

    #[test]
    fn info_falls_back_to_boundary_scan() {
        // Two bare JPEGs back to back, no MPF directory.
        let mut stream = segments::synthetic_jpeg(100, 50);
        stream.extend_from_slice(&segments::synthetic_jpeg(25, 12));
        let info = ContainerEngine::new().info(&stream).unwrap();
        assert_eq!((info.primary.width, info.primary.height), (100, 50));
        assert_eq!((info.gainmap.width, info.gainmap.height), (25, 12));
    }

    #[test]
    fn pixel_paths_report_missing_codec() {
        let img = RawImage::new(
            crate::types::PixelFormat::P010,
            ColorGamut::Bt2100,
            ColorTransfer::Hlg,
            ColorRange::Full,
            16,
            16,
            1,
        )
        .unwrap();
        let options = GainMapOptions {
            scale_factor: 4,
            quality: 85,
            multi_channel: false,
        };
        let mut dest = vec![0u8; 1024];
        let err = ContainerEngine::new()
            .encode_api0(&img, ColorTransfer::Hlg, 95, None, &options, &mut dest)
            .unwrap_err();
        assert!(matches!(err, EngineError::Unsupported(_)));
    }
}
