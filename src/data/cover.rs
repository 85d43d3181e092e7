use bytes::Bytes;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Raw cover image bytes plus their content type.
///
/// Blobs are immutable; a new track gets a new blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverBlob {
    bytes: Bytes,
    content_type: &'static str,
}

impl CoverBlob {
    /// Wrap thumbnail bytes, sniffing the image format from the header.
    /// Returns `None` for an empty buffer.
    pub fn from_bytes(data: impl Into<Bytes>) -> Option<Self> {
        let bytes = data.into();
        if bytes.is_empty() {
            return None;
        }
        let content_type = detect_content_type(&bytes);
        Some(Self { bytes, content_type })
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Content hash used to skip rewriting an unchanged cover
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.bytes.hash(&mut hasher);
        hasher.finish()
    }
}

/// Detect the MIME type of an image from its first bytes. Unknown data is assumed to be JPEG,
/// which is what media sessions hand out in practice.
pub fn detect_content_type(header: &[u8]) -> &'static str {
    if is_png(header) {
        "image/png"
    } else if is_gif(header) {
        "image/gif"
    } else if is_webp(header) {
        "image/webp"
    } else if is_bmp(header) {
        "image/bmp"
    } else {
        "image/jpeg"
    }
}

pub fn is_jpeg(header: &[u8]) -> bool {
    header.len() >= 2 && header[0] == 0xFF && header[1] == 0xD8
}

fn is_png(header: &[u8]) -> bool {
    header.len() >= 8 && header[0..8] == [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]
}

fn is_gif(header: &[u8]) -> bool {
    header.len() >= 6 && (&header[0..6] == b"GIF87a" || &header[0..6] == b"GIF89a")
}

fn is_webp(header: &[u8]) -> bool {
    header.len() >= 12 && &header[0..4] == b"RIFF" && &header[8..12] == b"WEBP"
}

fn is_bmp(header: &[u8]) -> bool {
    header.len() >= 2 && &header[0..2] == b"BM"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jpeg_detection() {
        let jpeg_header = [0xFF, 0xD8, 0xFF, 0xE0];
        assert!(is_jpeg(&jpeg_header));
        assert_eq!(detect_content_type(&jpeg_header), "image/jpeg");
    }

    #[test]
    fn test_png_detection() {
        let png_header = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00];
        assert_eq!(detect_content_type(&png_header), "image/png");
    }

    #[test]
    fn test_webp_detection() {
        let webp_header = b"RIFF\x00\x00\x00\x00WEBP";
        assert_eq!(detect_content_type(webp_header), "image/webp");
    }

    #[test]
    fn test_empty_blob_rejected() {
        assert!(CoverBlob::from_bytes(Vec::new()).is_none());
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = CoverBlob::from_bytes(vec![0xFF, 0xD8, 1, 2, 3]).unwrap();
        let b = CoverBlob::from_bytes(vec![0xFF, 0xD8, 1, 2, 3]).unwrap();
        let c = CoverBlob::from_bytes(vec![0xFF, 0xD8, 1, 2, 4]).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
