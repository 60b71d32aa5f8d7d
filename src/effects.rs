//! Geometric effects and the pipelines that apply them.
//!
//! Effects are queued on a codec instance and consumed in insertion order.
//! The encoder pipeline keeps the HDR and SDR intents dimensionally coherent;
//! the decoder pipeline does the same for the decoded image and its gain map,
//! scaling crop boxes and resize targets by the resolution ratio between the
//! two.

use core::fmt;

use crate::image::RawImage;
use crate::types::{CodecError, Result};

/// Mirror axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorDirection {
    /// Flip left-right, about the vertical axis.
    Horizontal,
    /// Flip top-bottom, about the horizontal axis.
    Vertical,
}

/// A deferred geometric operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Clockwise rotation; only 90, 180 and 270 degrees are accepted.
    Rotate(u32),
    /// Mirror about an axis.
    Mirror(MirrorDirection),
    /// Crop to `[left, right) x [top, bottom)`, clamped into the image.
    Crop {
        /// Left edge, inclusive.
        left: i32,
        /// Right edge, exclusive.
        right: i32,
        /// Top edge, inclusive.
        top: i32,
        /// Bottom edge, exclusive.
        bottom: i32,
    },
    /// Resample to the given dimensions.
    Resize {
        /// Destination width.
        width: u32,
        /// Destination height.
        height: u32,
    },
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Rotate(deg) => write!(f, "rotate {deg}"),
            Effect::Mirror(MirrorDirection::Horizontal) => write!(f, "mirror horizontal"),
            Effect::Mirror(MirrorDirection::Vertical) => write!(f, "mirror vertical"),
            Effect::Crop {
                left,
                right,
                top,
                bottom,
            } => write!(f, "crop left {left} right {right} top {top} bottom {bottom}"),
            Effect::Resize { width, height } => write!(f, "resize {width}x{height}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Kernels
// ---------------------------------------------------------------------------

/// Copy every destination cell from a source cell chosen by `map`, plane by
/// plane. `map` receives `(dst_x, dst_y, dst_w, dst_h, src_w, src_h)` in cell
/// coordinates and returns the source cell.
fn map_cells(
    src: &RawImage,
    mut dst: RawImage,
    map: impl Fn(u32, u32, u32, u32, u32, u32) -> (u32, u32),
) -> RawImage {
    for plane in 0..src.format().plane_count() {
        let s = src.plane_desc(plane).expect("plane in range");
        let d = dst.plane_desc(plane).expect("same format");
        for y in 0..d.cells_h {
            for x in 0..d.cells_w {
                let (sx, sy) = map(x, y, d.cells_w, d.cells_h, s.cells_w, s.cells_h);
                let si = s.offset + sy as usize * s.pitch_bytes + sx as usize * s.cell_bytes;
                let di = d.offset + y as usize * d.pitch_bytes + x as usize * d.cell_bytes;
                let (src_cell, cell_bytes) = (&src.block()[si..si + s.cell_bytes], d.cell_bytes);
                dst.block_mut()[di..di + cell_bytes].copy_from_slice(src_cell);
            }
        }
    }
    dst
}

fn alloc_like(src: &RawImage, width: u32, height: u32) -> Option<RawImage> {
    RawImage::new(
        src.format(),
        src.gamut(),
        src.transfer(),
        src.range(),
        width,
        height,
        1,
    )
    .ok()
}

/// Rotate clockwise by 90, 180 or 270 degrees into a new image.
pub(crate) fn apply_rotate(src: &RawImage, degrees: u32) -> Option<RawImage> {
    match degrees {
        90 => {
            let dst = alloc_like(src, src.height(), src.width())?;
            Some(map_cells(src, dst, |x, y, _, _, _, sh| (y, sh - 1 - x)))
        }
        180 => {
            let dst = alloc_like(src, src.width(), src.height())?;
            Some(map_cells(src, dst, |x, y, _, _, sw, sh| {
                (sw - 1 - x, sh - 1 - y)
            }))
        }
        270 => {
            let dst = alloc_like(src, src.height(), src.width())?;
            Some(map_cells(src, dst, |x, y, _, _, sw, _| (sw - 1 - y, x)))
        }
        _ => None,
    }
}

/// Mirror about an axis into a new image.
pub(crate) fn apply_mirror(src: &RawImage, direction: MirrorDirection) -> Option<RawImage> {
    let dst = alloc_like(src, src.width(), src.height())?;
    Some(match direction {
        MirrorDirection::Horizontal => {
            map_cells(src, dst, |x, y, _, _, sw, _| (sw - 1 - x, y))
        }
        MirrorDirection::Vertical => map_cells(src, dst, |x, y, _, _, _, sh| (x, sh - 1 - y)),
    })
}

/// Nearest-neighbour resample into a new image of `dst_w x dst_h`.
pub(crate) fn apply_resize(src: &RawImage, dst_w: u32, dst_h: u32) -> Option<RawImage> {
    if dst_w == 0 || dst_h == 0 {
        return None;
    }
    let dst = alloc_like(src, dst_w, dst_h)?;
    Some(map_cells(src, dst, |x, y, dw, dh, sw, sh| {
        (
            ((x as u64 * sw as u64) / dw as u64) as u32,
            ((y as u64 * sh as u64) / dh as u64) as u32,
        )
    }))
}

// ---------------------------------------------------------------------------
// Pipelines
// ---------------------------------------------------------------------------

fn effect_failed(effect: &Effect) -> CodecError {
    CodecError::unknown(format!(
        "encountered unknown error while applying effect {effect}"
    ))
}

/// Apply the queued effects to the encoder's raw intents.
///
/// The HDR intent must be present; the SDR intent, when present, receives
/// every effect with identical parameters. If the final effect is a crop and
/// an SDR intent exists, the SDR intent is re-packed into a contiguous
/// buffer, since cropping leaves the 4:2:0 chroma planes detached from luma
/// and the engine requires a single contiguous allocation for that layout.
pub(crate) fn run_encoder_pipeline(
    effects: &[Effect],
    mut hdr: RawImage,
    mut sdr: Option<RawImage>,
) -> Result<(RawImage, Option<RawImage>)> {
    for effect in effects {
        match *effect {
            Effect::Crop {
                left,
                right,
                top,
                bottom,
            } => {
                let l = left.max(0);
                let r = right.min(hdr.width() as i32);
                let crop_w = r - l;
                if crop_w <= 0 || crop_w % 2 != 0 {
                    return Err(CodecError::invalid_param(format!(
                        "unexpected crop dimensions. crop width is expected to be > 0 and even, \
                         crop width is {crop_w}"
                    )));
                }
                let t = top.max(0);
                let b = bottom.min(hdr.height() as i32);
                let crop_h = b - t;
                if crop_h <= 0 || crop_h % 2 != 0 {
                    return Err(CodecError::invalid_param(format!(
                        "unexpected crop dimensions. crop height is expected to be > 0 and even, \
                         crop height is {crop_h}"
                    )));
                }
                hdr.crop(l as u32, t as u32, crop_w as u32, crop_h as u32);
                if let Some(img) = sdr.as_mut() {
                    img.crop(l as u32, t as u32, crop_w as u32, crop_h as u32);
                }
            }
            Effect::Resize { width, height } => {
                if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
                    return Err(CodecError::invalid_param(format!(
                        "destination dimension cannot be zero or odd. dest image width is \
                         {width}, dest image height is {height}"
                    )));
                }
                let new_hdr = apply_resize(&hdr, width, height);
                let new_sdr = sdr.as_ref().map(|img| apply_resize(img, width, height));
                (hdr, sdr) = commit(effect, new_hdr, new_sdr)?;
            }
            Effect::Rotate(degrees) => {
                let new_hdr = apply_rotate(&hdr, degrees);
                let new_sdr = sdr.as_ref().map(|img| apply_rotate(img, degrees));
                (hdr, sdr) = commit(effect, new_hdr, new_sdr)?;
            }
            Effect::Mirror(direction) => {
                let new_hdr = apply_mirror(&hdr, direction);
                let new_sdr = sdr.as_ref().map(|img| apply_mirror(img, direction));
                (hdr, sdr) = commit(effect, new_hdr, new_sdr)?;
            }
        }
    }

    if let Some(Effect::Crop { .. }) = effects.last() {
        if let Some(img) = sdr.take() {
            sdr = Some(img.to_contiguous()?);
        }
    }

    Ok((hdr, sdr))
}

/// Replace both intents, or fail if either kernel came back empty.
fn commit(
    effect: &Effect,
    hdr: Option<RawImage>,
    sdr: Option<Option<RawImage>>,
) -> Result<(RawImage, Option<RawImage>)> {
    let hdr = hdr.ok_or_else(|| effect_failed(effect))?;
    let sdr = sdr
        .map(|inner| inner.ok_or_else(|| effect_failed(effect)))
        .transpose()?;
    Ok((hdr, sdr))
}

/// Apply the queued effects to the decoded image and its gain map.
///
/// Crop boxes and resize targets for the gain map are derived from the
/// decoded-to-gain-map resolution ratio, so the two stay aligned.
pub(crate) fn run_decoder_pipeline(
    effects: &[Effect],
    mut decoded: RawImage,
    mut gainmap: RawImage,
) -> Result<(RawImage, RawImage)> {
    for effect in effects {
        match *effect {
            Effect::Crop {
                left,
                right,
                top,
                bottom,
            } => {
                let l = left.max(0);
                let r = right.min(decoded.width() as i32);
                if r <= l {
                    return Err(CodecError::invalid_param(format!(
                        "unexpected crop dimensions. crop right is <= crop left, after crop \
                         image width is {}",
                        r - l
                    )));
                }
                let t = top.max(0);
                let b = bottom.min(decoded.height() as i32);
                if b <= t {
                    return Err(CodecError::invalid_param(format!(
                        "unexpected crop dimensions. crop bottom is <= crop top, after crop \
                         image height is {}",
                        b - t
                    )));
                }

                let wd_ratio = decoded.width() as f32 / gainmap.width() as f32;
                let ht_ratio = decoded.height() as f32 / gainmap.height() as f32;
                let gm_l = (l as f32 / wd_ratio) as i32;
                let gm_r = (r as f32 / wd_ratio) as i32;
                if gm_r <= gm_l {
                    return Err(CodecError::invalid_param(format!(
                        "unexpected crop dimensions. crop right is <= crop left for gainmap \
                         image, after crop gainmap image width is {}",
                        gm_r - gm_l
                    )));
                }
                let gm_t = (t as f32 / ht_ratio) as i32;
                let gm_b = (b as f32 / ht_ratio) as i32;
                if gm_b <= gm_t {
                    return Err(CodecError::invalid_param(format!(
                        "unexpected crop dimensions. crop bottom is <= crop top for gainmap \
                         image, after crop gainmap image height is {}",
                        gm_b - gm_t
                    )));
                }

                decoded.crop(l as u32, t as u32, (r - l) as u32, (b - t) as u32);
                gainmap.crop(
                    gm_l as u32,
                    gm_t as u32,
                    (gm_r - gm_l) as u32,
                    (gm_b - gm_t) as u32,
                );
            }
            Effect::Resize { width, height } => {
                let wd_ratio = decoded.width() as f32 / gainmap.width() as f32;
                let ht_ratio = decoded.height() as f32 / gainmap.height() as f32;
                let gm_w = (width as f32 / wd_ratio) as u32;
                let gm_h = (height as f32 / ht_ratio) as u32;
                if width == 0 || height == 0 || gm_w == 0 || gm_h == 0 {
                    return Err(CodecError::invalid_param(format!(
                        "destination dimension cannot be zero. dest image width is {width}, \
                         dest image height is {height}, dest gainmap width is {gm_w}, dest \
                         gainmap height is {gm_h}"
                    )));
                }
                let new_decoded = apply_resize(&decoded, width, height);
                let new_gainmap = apply_resize(&gainmap, gm_w, gm_h);
                (decoded, gainmap) = commit_pair(effect, new_decoded, new_gainmap)?;
            }
            Effect::Rotate(degrees) => {
                let new_decoded = apply_rotate(&decoded, degrees);
                let new_gainmap = apply_rotate(&gainmap, degrees);
                (decoded, gainmap) = commit_pair(effect, new_decoded, new_gainmap)?;
            }
            Effect::Mirror(direction) => {
                let new_decoded = apply_mirror(&decoded, direction);
                let new_gainmap = apply_mirror(&gainmap, direction);
                (decoded, gainmap) = commit_pair(effect, new_decoded, new_gainmap)?;
            }
        }
    }

    Ok((decoded, gainmap))
}

fn commit_pair(
    effect: &Effect,
    decoded: Option<RawImage>,
    gainmap: Option<RawImage>,
) -> Result<(RawImage, RawImage)> {
    match (decoded, gainmap) {
        (Some(d), Some(g)) => Ok((d, g)),
        _ => Err(effect_failed(effect)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Plane;
    use crate::types::{ColorGamut, ColorRange, ColorTransfer, ErrorKind, PixelFormat};

    fn gray(w: u32, h: u32) -> RawImage {
        RawImage::new(
            PixelFormat::Y400,
            ColorGamut::Bt709,
            ColorTransfer::Srgb,
            ColorRange::Full,
            w,
            h,
            1,
        )
        .unwrap()
    }

    fn set_px(img: &mut RawImage, x: usize, y: usize, v: u8) {
        let d = img.plane_desc(0).unwrap();
        img.block_mut()[d.offset + y * d.pitch_bytes + x] = v;
    }

    fn get_px(img: &RawImage, x: usize, y: usize) -> u8 {
        let d = img.plane_desc(0).unwrap();
        img.block()[d.offset + y * d.pitch_bytes + x]
    }

    #[test]
    fn rotate_90_moves_top_left_to_top_right() {
        let mut img = gray(4, 2);
        set_px(&mut img, 0, 0, 9);
        let out = apply_rotate(&img, 90).unwrap();
        assert_eq!((out.width(), out.height()), (2, 4));
        assert_eq!(get_px(&out, 1, 0), 9);
    }

    #[test]
    fn rotate_270_moves_top_left_to_bottom_left() {
        let mut img = gray(4, 2);
        set_px(&mut img, 0, 0, 9);
        let out = apply_rotate(&img, 270).unwrap();
        assert_eq!((out.width(), out.height()), (2, 4));
        assert_eq!(get_px(&out, 0, 3), 9);
    }

    #[test]
    fn rotate_180_twice_is_identity() {
        let mut img = gray(4, 4);
        set_px(&mut img, 1, 2, 7);
        let once = apply_rotate(&img, 180).unwrap();
        assert_eq!(get_px(&once, 2, 1), 7);
        let twice = apply_rotate(&once, 180).unwrap();
        assert_eq!(get_px(&twice, 1, 2), 7);
    }

    #[test]
    fn rotate_rejects_unsupported_degrees() {
        assert!(apply_rotate(&gray(4, 4), 45).is_none());
    }

    #[test]
    fn mirror_horizontal_swaps_columns() {
        let mut img = gray(4, 2);
        set_px(&mut img, 0, 1, 5);
        let out = apply_mirror(&img, MirrorDirection::Horizontal).unwrap();
        assert_eq!(get_px(&out, 3, 1), 5);
    }

    #[test]
    fn mirror_vertical_swaps_rows() {
        let mut img = gray(4, 2);
        set_px(&mut img, 2, 0, 5);
        let out = apply_mirror(&img, MirrorDirection::Vertical).unwrap();
        assert_eq!(get_px(&out, 2, 1), 5);
    }

    #[test]
    fn resize_downscales_by_sampling() {
        let mut img = gray(4, 4);
        for y in 0..4 {
            for x in 0..4 {
                set_px(&mut img, x, y, (y * 4 + x) as u8);
            }
        }
        let out = apply_resize(&img, 2, 2).unwrap();
        assert_eq!((out.width(), out.height()), (2, 2));
        assert_eq!(get_px(&out, 0, 0), 0);
        assert_eq!(get_px(&out, 1, 0), 2);
        assert_eq!(get_px(&out, 0, 1), 8);
        assert_eq!(get_px(&out, 1, 1), 10);
    }

    #[test]
    fn rotate_p010_swaps_chroma_grid() {
        let img = RawImage::new(
            PixelFormat::P010,
            ColorGamut::Bt2100,
            ColorTransfer::Hlg,
            ColorRange::Limited,
            6,
            4,
            1,
        )
        .unwrap();
        let out = apply_rotate(&img, 90).unwrap();
        assert_eq!((out.width(), out.height()), (4, 6));
        let uv = out.plane_desc(1).unwrap();
        assert_eq!((uv.cells_w, uv.cells_h), (2, 3));
        assert_eq!(out.transfer(), ColorTransfer::Hlg);
        assert_eq!(out.stride(Plane::Uv), 4);
    }

    #[test]
    fn encoder_pipeline_keeps_intents_same_size() {
        let hdr = RawImage::new(
            PixelFormat::P010,
            ColorGamut::Bt2100,
            ColorTransfer::Hlg,
            ColorRange::Full,
            16,
            8,
            1,
        )
        .unwrap();
        let sdr = RawImage::new(
            PixelFormat::Yuv420,
            ColorGamut::Bt709,
            ColorTransfer::Srgb,
            ColorRange::Full,
            16,
            8,
            1,
        )
        .unwrap();
        let effects = [
            Effect::Rotate(90),
            Effect::Mirror(MirrorDirection::Horizontal),
            Effect::Resize {
                width: 4,
                height: 6,
            },
        ];
        let (hdr, sdr) = run_encoder_pipeline(&effects, hdr, Some(sdr)).unwrap();
        let sdr = sdr.unwrap();
        assert_eq!((hdr.width(), hdr.height()), (4, 6));
        assert_eq!((sdr.width(), sdr.height()), (4, 6));
    }

    #[test]
    fn encoder_pipeline_rejects_odd_crop() {
        let hdr = gray(16, 16);
        let effects = [Effect::Crop {
            left: 0,
            right: 7,
            top: 0,
            bottom: 8,
        }];
        let err = run_encoder_pipeline(&effects, hdr, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParam);
        assert!(err.detail().contains("crop width"));
    }

    #[test]
    fn encoder_pipeline_clamps_crop_into_extent() {
        let hdr = gray(16, 16);
        let effects = [Effect::Crop {
            left: -4,
            right: 100,
            top: 2,
            bottom: 10,
        }];
        let (hdr, _) = run_encoder_pipeline(&effects, hdr, None).unwrap();
        assert_eq!((hdr.width(), hdr.height()), (16, 8));
    }

    #[test]
    fn encoder_pipeline_rejects_odd_resize() {
        let hdr = gray(16, 16);
        let effects = [Effect::Resize {
            width: 10,
            height: 7,
        }];
        let err = run_encoder_pipeline(&effects, hdr, None).unwrap_err();
        assert!(err.detail().contains("zero or odd"));
    }

    #[test]
    fn trailing_crop_repacks_sdr() {
        let hdr = RawImage::new(
            PixelFormat::P010,
            ColorGamut::Bt2100,
            ColorTransfer::Pq,
            ColorRange::Full,
            16,
            16,
            1,
        )
        .unwrap();
        let sdr = RawImage::new(
            PixelFormat::Yuv420,
            ColorGamut::Bt709,
            ColorTransfer::Srgb,
            ColorRange::Full,
            16,
            16,
            1,
        )
        .unwrap();
        let effects = [Effect::Crop {
            left: 4,
            right: 12,
            top: 4,
            bottom: 12,
        }];
        let (hdr, sdr) = run_encoder_pipeline(&effects, hdr, Some(sdr)).unwrap();
        let sdr = sdr.unwrap();
        // SDR got a fresh contiguous block, HDR kept its cropped offsets.
        assert_eq!(sdr.plane_desc(0).unwrap().offset, 0);
        assert_ne!(hdr.plane_desc(0).unwrap().offset, 0);
        assert_eq!((sdr.width(), sdr.height()), (8, 8));
    }

    #[test]
    fn decoder_pipeline_scales_crop_to_gainmap() {
        let decoded = RawImage::new(
            PixelFormat::Rgba8888,
            ColorGamut::Bt709,
            ColorTransfer::Srgb,
            ColorRange::Full,
            16,
            16,
            1,
        )
        .unwrap();
        let gainmap = gray(4, 4); // quarter resolution, ratio 4
        let effects = [Effect::Crop {
            left: 0,
            right: 8,
            top: 0,
            bottom: 8,
        }];
        let (decoded, gainmap) = run_decoder_pipeline(&effects, decoded, gainmap).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 8));
        assert_eq!((gainmap.width(), gainmap.height()), (2, 2));
    }

    #[test]
    fn decoder_pipeline_rejects_degenerate_gainmap_crop() {
        let decoded = RawImage::new(
            PixelFormat::Rgba8888,
            ColorGamut::Bt709,
            ColorTransfer::Srgb,
            ColorRange::Full,
            64,
            64,
            1,
        )
        .unwrap();
        let gainmap = gray(2, 2); // ratio 32: an 8-wide crop collapses to zero
        let effects = [Effect::Crop {
            left: 16,
            right: 24,
            top: 0,
            bottom: 64,
        }];
        let err = run_decoder_pipeline(&effects, decoded, gainmap).unwrap_err();
        assert!(err.detail().contains("gainmap"));
    }

    #[test]
    fn decoder_pipeline_resize_keeps_ratio() {
        let decoded = RawImage::new(
            PixelFormat::Rgba64Float,
            ColorGamut::Bt2100,
            ColorTransfer::Linear,
            ColorRange::Full,
            1920,
            1080,
            1,
        )
        .unwrap();
        let gainmap = gray(480, 270); // ratio 4
        let effects = [Effect::Resize {
            width: 1280,
            height: 720,
        }];
        let (decoded, gainmap) = run_decoder_pipeline(&effects, decoded, gainmap).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1280, 720));
        assert_eq!((gainmap.width(), gainmap.height()), (320, 180));
    }

    #[test]
    fn effect_descriptions_are_readable() {
        assert_eq!(Effect::Rotate(90).to_string(), "rotate 90");
        assert_eq!(
            Effect::Mirror(MirrorDirection::Vertical).to_string(),
            "mirror vertical"
        );
        assert_eq!(
            Effect::Resize {
                width: 64,
                height: 32
            }
            .to_string(),
            "resize 64x32"
        );
    }
}
