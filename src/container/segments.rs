//! JPEG segment walking and marker-level metadata extraction.

/// APP1 namespace header for XMP packets.
pub const XMP_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";

/// APP1 header for EXIF payloads.
pub const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// APP2 header for ICC profile chunks.
pub const ICC_HEADER: &[u8] = b"ICC_PROFILE\0";

/// A marker segment: marker byte plus payload (length field excluded).
#[derive(Debug, Clone)]
pub struct Segment {
    /// Marker byte (e.g. 0xE1 for APP1).
    pub marker: u8,
    /// Payload bytes after the length field.
    pub data: Vec<u8>,
    /// Offset of the 0xFF marker byte in the scanned stream.
    pub offset: usize,
}

impl Segment {
    /// Whether this is an APPn segment whose payload starts with `header`.
    fn is_app_with(&self, app: u8, header: &[u8]) -> bool {
        self.marker == app && self.data.starts_with(header)
    }
}

/// Whether the buffer starts with a JPEG SOI marker.
pub fn is_jpeg(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0xFF && data[1] == 0xD8
}

fn is_sof(marker: u8) -> bool {
    // SOF0-SOF15, minus DHT (C4), JPG (C8) and DAC (CC).
    matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC)
}

/// Walk the marker segments of a JPEG stream up to the start of scan.
///
/// Returns every length-carrying segment in order. Scan data and anything
/// after SOS is not visited; the metadata of interest always precedes it.
pub fn scan_segments(data: &[u8]) -> Vec<Segment> {
    let mut segments = Vec::new();
    if !is_jpeg(data) {
        return segments;
    }

    let mut pos = 2;
    while pos + 3 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }

        // Skip fill bytes.
        while pos + 1 < data.len() && data[pos + 1] == 0xFF {
            pos += 1;
        }
        if pos + 3 >= data.len() {
            break;
        }

        let marker = data[pos + 1];
        if marker == 0xDA || marker == 0xD9 {
            break;
        }
        // Markers without a length field.
        if marker == 0xD8 || (0xD0..=0xD7).contains(&marker) || marker == 0x00 || marker == 0x01 {
            pos += 2;
            continue;
        }

        let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if length < 2 || pos + 2 + length > data.len() {
            break;
        }

        segments.push(Segment {
            marker,
            data: data[pos + 4..pos + 2 + length].to_vec(),
            offset: pos,
        });
        pos += 2 + length;
    }

    segments
}

/// Frame dimensions `(width, height)` from the first SOF segment.
pub fn frame_dimensions(segments: &[Segment]) -> Option<(u32, u32)> {
    let sof = segments.iter().find(|s| is_sof(s.marker))?;
    // SOF payload: precision (1), height (2), width (2), components...
    if sof.data.len() < 5 {
        return None;
    }
    let height = u16::from_be_bytes([sof.data[1], sof.data[2]]) as u32;
    let width = u16::from_be_bytes([sof.data[3], sof.data[4]]) as u32;
    Some((width, height))
}

/// EXIF payload (without the `Exif\0\0` header) from an APP1 segment.
pub fn extract_exif(segments: &[Segment]) -> Vec<u8> {
    segments
        .iter()
        .find(|s| s.is_app_with(0xE1, EXIF_HEADER))
        .map(|s| s.data[EXIF_HEADER.len()..].to_vec())
        .unwrap_or_default()
}

/// XMP packet (without the namespace header) from an APP1 segment.
pub fn extract_xmp(segments: &[Segment]) -> Vec<u8> {
    segments
        .iter()
        .find(|s| s.is_app_with(0xE1, XMP_HEADER))
        .map(|s| s.data[XMP_HEADER.len()..].to_vec())
        .unwrap_or_default()
}

/// ICC profile reassembled from its APP2 chunks, in chunk order.
pub fn extract_icc(segments: &[Segment]) -> Vec<u8> {
    let mut chunks: Vec<(u8, &[u8])> = segments
        .iter()
        .filter(|s| s.is_app_with(0xE2, ICC_HEADER) && s.data.len() > ICC_HEADER.len() + 2)
        .map(|s| {
            let chunk_num = s.data[ICC_HEADER.len()];
            (chunk_num, &s.data[ICC_HEADER.len() + 2..])
        })
        .collect();
    chunks.sort_by_key(|(num, _)| *num);

    let mut profile = Vec::new();
    for (_, chunk) in chunks {
        profile.extend_from_slice(chunk);
    }
    profile
}

/// Insert one marker segment immediately after SOI.
///
/// Returns `None` when the input is not a JPEG stream or the payload exceeds
/// a segment's 16-bit length field.
pub fn insert_after_soi(jpeg: &[u8], marker: u8, payload: &[u8]) -> Option<Vec<u8>> {
    if !is_jpeg(jpeg) || payload.len() + 2 > u16::MAX as usize {
        return None;
    }

    let length = (payload.len() + 2) as u16;
    let mut out = Vec::with_capacity(jpeg.len() + payload.len() + 4);
    out.extend_from_slice(&jpeg[..2]);
    out.push(0xFF);
    out.push(marker);
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(&jpeg[2..]);
    Some(out)
}

/// APP1 payload carrying an XMP packet.
pub fn xmp_payload(xmp: &str) -> Vec<u8> {
    let mut payload = Vec::with_capacity(XMP_HEADER.len() + xmp.len());
    payload.extend_from_slice(XMP_HEADER);
    payload.extend_from_slice(xmp.as_bytes());
    payload
}

/// SOI + APP0 (JFIF) + SOF0 + EOI with the given dimensions.
#[cfg(test)]
pub(crate) fn synthetic_jpeg(width: u16, height: u16) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8];
    data.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x07, b'J', b'F', b'I', b'F', 0x00]);
    data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x0B, 0x08]);
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&[0x01, 0x01, 0x11, 0x00]);
    data.extend_from_slice(&[0xFF, 0xD9]);
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_jpeg() -> Vec<u8> {
        synthetic_jpeg(16, 8)
    }

    #[test]
    fn scans_segments_in_order() {
        let segments = scan_segments(&tiny_jpeg());
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].marker, 0xE0);
        assert_eq!(segments[1].marker, 0xC0);
    }

    #[test]
    fn reads_sof_dimensions() {
        let segments = scan_segments(&tiny_jpeg());
        assert_eq!(frame_dimensions(&segments), Some((16, 8)));
    }

    #[test]
    fn non_jpeg_yields_no_segments() {
        assert!(scan_segments(b"not a jpeg").is_empty());
        assert!(!is_jpeg(b"\x89PNG"));
    }

    #[test]
    fn insert_after_soi_preserves_remainder() {
        let jpeg = tiny_jpeg();
        let out = insert_after_soi(&jpeg, 0xE1, b"test-payload").unwrap();
        assert_eq!(&out[..2], &[0xFF, 0xD8]);
        assert_eq!(out[2], 0xFF);
        assert_eq!(out[3], 0xE1);
        assert_eq!(out.len(), jpeg.len() + 4 + 12);
        assert_eq!(&out[out.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn exif_and_xmp_extraction() {
        let jpeg = tiny_jpeg();
        let mut exif_payload = EXIF_HEADER.to_vec();
        exif_payload.extend_from_slice(b"II*\0rest");
        let jpeg = insert_after_soi(&jpeg, 0xE1, &exif_payload).unwrap();
        let jpeg = insert_after_soi(&jpeg, 0xE1, &xmp_payload("<x:xmpmeta/>")).unwrap();

        let segments = scan_segments(&jpeg);
        assert_eq!(extract_exif(&segments), b"II*\0rest");
        assert_eq!(extract_xmp(&segments), b"<x:xmpmeta/>");
        assert!(extract_icc(&segments).is_empty());
    }

    #[test]
    fn icc_chunks_reassemble_in_order() {
        let jpeg = tiny_jpeg();
        let chunk = |num: u8, body: &[u8]| {
            let mut payload = ICC_HEADER.to_vec();
            payload.push(num);
            payload.push(2); // total chunks
            payload.extend_from_slice(body);
            payload
        };
        // Insert out of order; extraction sorts by chunk number.
        let jpeg = insert_after_soi(&jpeg, 0xE2, &chunk(2, b"world")).unwrap();
        let jpeg = insert_after_soi(&jpeg, 0xE2, &chunk(1, b"hello ")).unwrap();

        let segments = scan_segments(&jpeg);
        assert_eq!(extract_icc(&segments), b"hello world");
    }
}
