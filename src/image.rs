//! Raw and compressed image containers.
//!
//! A [`RawImage`] owns a single backing allocation; planes are views into it
//! described by a byte offset and a stride counted in samples. Cropping is a
//! pure offset adjustment, so a cropped image keeps its backing block and the
//! planes may stop being contiguous. [`RawImage::to_contiguous`] re-packs the
//! planes into a fresh canonical block when contiguity is required again.

use crate::types::{
    CodecError, ColorGamut, ColorRange, ColorTransfer, PixelFormat, Result,
};

/// Stride alignment used for internally allocated planes.
pub const DEFAULT_STRIDE_ALIGNMENT: u32 = 64;

/// Plane selector for [`RawImage`] accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
    /// Luma plane, or the packed pixel plane for interleaved RGBA formats.
    Y,
    /// Interleaved UV plane for P010, or the U plane for YCbCr 4:2:0.
    Uv,
    /// V plane (YCbCr 4:2:0 only).
    V,
}

impl Plane {
    fn index(self) -> usize {
        match self {
            Plane::Y => 0,
            Plane::Uv => 1,
            Plane::V => 2,
        }
    }
}

/// Geometry of one plane: a grid of fixed-size cells over the backing block.
///
/// A cell is the smallest unit the geometric kernels move around: one luma
/// sample, one packed pixel, or one interleaved UV pair.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PlaneDesc {
    pub cells_w: u32,
    pub cells_h: u32,
    pub cell_bytes: usize,
    pub pitch_bytes: usize,
    pub offset: usize,
}

/// Borrowed description of caller-owned raw pixel planes.
///
/// This is what the encoder's raw-image setters validate; accepted views are
/// deep-copied into an owned [`RawImage`], so the facade never aliases caller
/// memory after a setter returns.
#[derive(Debug, Clone, Copy)]
pub struct RawImageView<'a> {
    /// Pixel format of the described planes.
    pub format: PixelFormat,
    /// Color gamut.
    pub gamut: ColorGamut,
    /// Color transfer.
    pub transfer: ColorTransfer,
    /// Color range.
    pub range: ColorRange,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Plane buffers; unused planes are `None`.
    pub planes: [Option<&'a [u8]>; 3],
    /// Per-plane strides, counted in samples.
    pub strides: [u32; 3],
}

impl<'a> RawImageView<'a> {
    /// Describe a packed single-plane buffer (RGBA variants or Y-400).
    #[allow(clippy::too_many_arguments)]
    pub fn packed(
        format: PixelFormat,
        gamut: ColorGamut,
        transfer: ColorTransfer,
        range: ColorRange,
        width: u32,
        height: u32,
        pixels: &'a [u8],
        stride: u32,
    ) -> Self {
        RawImageView {
            format,
            gamut,
            transfer,
            range,
            width,
            height,
            planes: [Some(pixels), None, None],
            strides: [stride, 0, 0],
        }
    }

    /// Describe a biplanar P010 buffer.
    #[allow(clippy::too_many_arguments)]
    pub fn p010(
        gamut: ColorGamut,
        transfer: ColorTransfer,
        range: ColorRange,
        width: u32,
        height: u32,
        luma: &'a [u8],
        chroma_uv: &'a [u8],
        luma_stride: u32,
        chroma_stride: u32,
    ) -> Self {
        RawImageView {
            format: PixelFormat::P010,
            gamut,
            transfer,
            range,
            width,
            height,
            planes: [Some(luma), Some(chroma_uv), None],
            strides: [luma_stride, chroma_stride, 0],
        }
    }

    /// Describe a triplanar YCbCr 4:2:0 buffer.
    #[allow(clippy::too_many_arguments)]
    pub fn yuv420(
        gamut: ColorGamut,
        transfer: ColorTransfer,
        range: ColorRange,
        width: u32,
        height: u32,
        planes: [&'a [u8]; 3],
        strides: [u32; 3],
    ) -> Self {
        RawImageView {
            format: PixelFormat::Yuv420,
            gamut,
            transfer,
            range,
            width,
            height,
            planes: [Some(planes[0]), Some(planes[1]), Some(planes[2])],
            strides,
        }
    }
}

/// Owned multi-plane raw image.
#[derive(Debug, Clone)]
pub struct RawImage {
    format: PixelFormat,
    gamut: ColorGamut,
    transfer: ColorTransfer,
    range: ColorRange,
    width: u32,
    height: u32,
    block: Vec<u8>,
    offsets: [usize; 3],
    strides: [u32; 3],
}

impl RawImage {
    /// Allocate a zero-filled image with canonical plane layout.
    ///
    /// `stride_alignment` rounds the luma/packed stride up to a multiple of
    /// the given sample count; chroma strides follow from it.
    pub fn new(
        format: PixelFormat,
        gamut: ColorGamut,
        transfer: ColorTransfer,
        range: ColorRange,
        width: u32,
        height: u32,
        stride_alignment: u32,
    ) -> Result<Self> {
        let align = stride_alignment.max(1);
        let aligned = width
            .checked_add(align - 1)
            .map(|w| w / align * align)
            .ok_or_else(|| {
                CodecError::invalid_param(format!("stride alignment overflow for width {width}"))
            })?;

        let bpp = format.bytes_per_pixel();
        let plane_1 = (bpp as u64) * (aligned as u64) * (height as u64);
        let (plane_2, plane_3) = match format {
            PixelFormat::P010 => {
                let half = (aligned as u64 / 2) * (height as u64 / 2) * bpp as u64;
                (2 * half, 0)
            }
            PixelFormat::Yuv420 => {
                let half = (aligned as u64 / 2) * (height as u64 / 2) * bpp as u64;
                (half, half)
            }
            _ => (0, 0),
        };
        let total = plane_1 + plane_2 + plane_3;
        if total > isize::MAX as u64 {
            return Err(CodecError::mem_error(format!(
                "image allocation of {total} bytes exceeds address space"
            )));
        }

        let strides = match format {
            PixelFormat::P010 => [aligned, aligned, 0],
            PixelFormat::Yuv420 => [aligned, aligned / 2, aligned / 2],
            _ => [aligned, 0, 0],
        };

        Ok(RawImage {
            format,
            gamut,
            transfer,
            range,
            width,
            height,
            block: vec![0u8; total as usize],
            offsets: [0, plane_1 as usize, (plane_1 + plane_2) as usize],
            strides,
        })
    }

    /// Deep-copy caller planes described by `view` into an owned image with
    /// canonical contiguous layout.
    pub fn from_view(view: &RawImageView<'_>, stride_alignment: u32) -> Result<Self> {
        let mut img = RawImage::new(
            view.format,
            view.gamut,
            view.transfer,
            view.range,
            view.width,
            view.height,
            stride_alignment,
        )?;

        for plane in 0..view.format.plane_count() {
            let src = view.planes[plane].ok_or_else(|| {
                CodecError::invalid_param(format!("missing data for plane {plane}"))
            })?;
            let dst_desc = img
                .plane_desc(plane)
                .expect("plane count checked against format");
            let src_pitch = plane_pitch_bytes(view.format, plane, view.strides[plane]);
            let row_bytes = dst_desc.cells_w as usize * dst_desc.cell_bytes;

            for row in 0..dst_desc.cells_h as usize {
                let src_start = row * src_pitch;
                let src_end = src_start + row_bytes;
                if src_end > src.len() {
                    return Err(CodecError::invalid_param(format!(
                        "plane {plane} buffer too small: need {src_end} bytes, have {}",
                        src.len()
                    )));
                }
                let dst_start = dst_desc.offset + row * dst_desc.pitch_bytes;
                img.block[dst_start..dst_start + row_bytes]
                    .copy_from_slice(&src[src_start..src_end]);
            }
        }

        Ok(img)
    }

    /// Re-pack the planes into a fresh backing block with canonical layout.
    ///
    /// Needed after a crop left the chroma planes non-contiguous with luma.
    pub fn to_contiguous(&self) -> Result<RawImage> {
        let mut img = RawImage::new(
            self.format,
            self.gamut,
            self.transfer,
            self.range,
            self.width,
            self.height,
            DEFAULT_STRIDE_ALIGNMENT,
        )?;

        for plane in 0..self.format.plane_count() {
            let src = self.plane_desc(plane).expect("plane in range");
            let dst = img.plane_desc(plane).expect("plane in range");
            let row_bytes = src.cells_w as usize * src.cell_bytes;
            for row in 0..src.cells_h as usize {
                let s = src.offset + row * src.pitch_bytes;
                let d = dst.offset + row * dst.pitch_bytes;
                img.block[d..d + row_bytes].copy_from_slice(&self.block[s..s + row_bytes]);
            }
        }

        Ok(img)
    }

    /// Pixel format.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Color gamut.
    pub fn gamut(&self) -> ColorGamut {
        self.gamut
    }

    /// Color transfer.
    pub fn transfer(&self) -> ColorTransfer {
        self.transfer
    }

    /// Color range.
    pub fn range(&self) -> ColorRange {
        self.range
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Stride of the given plane, counted in samples.
    pub fn stride(&self, plane: Plane) -> u32 {
        self.strides[plane.index()]
    }

    /// Bytes of the given plane, starting at its current offset and running
    /// to the end of the backing block. Rows are `stride` samples apart.
    pub fn plane_data(&self, plane: Plane) -> Option<&[u8]> {
        let idx = plane.index();
        if idx >= self.format.plane_count() {
            return None;
        }
        Some(&self.block[self.offsets[idx]..])
    }

    /// Mutable bytes of the given plane; see [`RawImage::plane_data`].
    ///
    /// Engine implementations use this to fill the pre-allocated output
    /// images on decode.
    pub fn plane_data_mut(&mut self, plane: Plane) -> Option<&mut [u8]> {
        let idx = plane.index();
        if idx >= self.format.plane_count() {
            return None;
        }
        Some(&mut self.block[self.offsets[idx]..])
    }

    pub(crate) fn set_gamut(&mut self, gamut: ColorGamut) {
        self.gamut = gamut;
    }

    pub(crate) fn block(&self) -> &[u8] {
        &self.block
    }

    pub(crate) fn block_mut(&mut self) -> &mut [u8] {
        &mut self.block
    }

    pub(crate) fn plane_desc(&self, plane: usize) -> Option<PlaneDesc> {
        if plane >= self.format.plane_count() {
            return None;
        }
        let (cells_w, cells_h, cell_bytes) = plane_cells(self.format, plane, self.width, self.height);
        Some(PlaneDesc {
            cells_w,
            cells_h,
            cell_bytes,
            pitch_bytes: plane_pitch_bytes(self.format, plane, self.strides[plane]),
            offset: self.offsets[plane],
        })
    }

    /// Narrow the image to `new_w x new_h` starting at `(left, top)` by
    /// adjusting plane offsets. The backing block is untouched.
    pub(crate) fn crop(&mut self, left: u32, top: u32, new_w: u32, new_h: u32) {
        match self.format {
            PixelFormat::P010 => {
                self.offsets[0] += (top as usize * self.strides[0] as usize + left as usize) * 2;
                self.offsets[1] +=
                    ((top / 2) as usize * self.strides[1] as usize + left as usize) * 2;
            }
            PixelFormat::Yuv420 => {
                self.offsets[0] += top as usize * self.strides[0] as usize + left as usize;
                self.offsets[1] +=
                    (top / 2) as usize * self.strides[1] as usize + (left / 2) as usize;
                self.offsets[2] +=
                    (top / 2) as usize * self.strides[2] as usize + (left / 2) as usize;
            }
            _ => {
                let bpp = self.format.bytes_per_pixel();
                self.offsets[0] +=
                    (top as usize * self.strides[0] as usize + left as usize) * bpp;
            }
        }
        self.width = new_w;
        self.height = new_h;
    }
}

/// Cell grid of `plane` for an image of `w x h` pixels.
fn plane_cells(format: PixelFormat, plane: usize, w: u32, h: u32) -> (u32, u32, usize) {
    match (format, plane) {
        (PixelFormat::P010, 0) => (w, h, 2),
        (PixelFormat::P010, _) => (w / 2, h / 2, 4),
        (PixelFormat::Yuv420, 0) => (w, h, 1),
        (PixelFormat::Yuv420, _) => (w / 2, h / 2, 1),
        (fmt, _) => (w, h, fmt.bytes_per_pixel()),
    }
}

/// Row pitch of `plane` in bytes, for a stride counted in samples.
fn plane_pitch_bytes(format: PixelFormat, plane: usize, stride: u32) -> usize {
    match (format, plane) {
        // The interleaved UV plane shares the luma stride, in 16-bit samples.
        (PixelFormat::P010, _) => stride as usize * 2,
        (PixelFormat::Yuv420, _) => stride as usize,
        (fmt, _) => stride as usize * fmt.bytes_per_pixel(),
    }
}

/// Owned compressed image bytes with color attributes.
///
/// Keeps the capacity/used split of the reference container: the buffer is
/// allocated once at `capacity` and the engine reports how much it filled.
#[derive(Debug, Clone)]
pub struct CompressedImage {
    buf: Vec<u8>,
    used: usize,
    gamut: ColorGamut,
    transfer: ColorTransfer,
    range: ColorRange,
}

impl CompressedImage {
    /// Allocate an empty buffer of the given capacity.
    pub fn with_capacity(
        capacity: usize,
        gamut: ColorGamut,
        transfer: ColorTransfer,
        range: ColorRange,
    ) -> Self {
        CompressedImage {
            buf: vec![0u8; capacity],
            used: 0,
            gamut,
            transfer,
            range,
        }
    }

    /// Deep-copy caller bytes into an owned buffer.
    pub fn from_bytes(
        data: &[u8],
        gamut: ColorGamut,
        transfer: ColorTransfer,
        range: ColorRange,
    ) -> Self {
        CompressedImage {
            buf: data.to_vec(),
            used: data.len(),
            gamut,
            transfer,
            range,
        }
    }

    /// The filled portion of the buffer.
    pub fn data(&self) -> &[u8] {
        &self.buf[..self.used]
    }

    /// Number of valid bytes.
    pub fn data_sz(&self) -> usize {
        self.used
    }

    /// Total buffer capacity.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Whether no valid bytes are present.
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Color gamut attribute.
    pub fn gamut(&self) -> ColorGamut {
        self.gamut
    }

    /// Color transfer attribute.
    pub fn transfer(&self) -> ColorTransfer {
        self.transfer
    }

    /// Color range attribute.
    pub fn range(&self) -> ColorRange {
        self.range
    }

    pub(crate) fn buf_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    pub(crate) fn set_data_sz(&mut self, used: usize) {
        debug_assert!(used <= self.buf.len());
        self.used = used.min(self.buf.len());
    }

    pub(crate) fn set_gamut(&mut self, gamut: ColorGamut) {
        self.gamut = gamut;
    }
}
