//! Content type of downloaded media, sniffed from its leading bytes.

use crate::protocol::MediaCategory;

/// What the bytes turned out to be.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sniffed {
    pub mime: &'static str,
    /// Usual file extension, without the dot.
    pub extension: &'static str,
}

impl Sniffed {
    pub fn category(&self) -> MediaCategory {
        MediaCategory::from_mime(self.mime)
    }
}

/// Sniff `bytes` by magic number. `None` when nothing matches.
pub fn sniff(bytes: &[u8]) -> Option<Sniffed> {
    infer::get(bytes).map(|kind| Sniffed {
        mime: kind.mime_type(),
        extension: kind.extension(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ftyp(brand: &[u8; 4]) -> Vec<u8> {
        let mut b = vec![0, 0, 0, 0x20];
        b.extend_from_slice(b"ftyp");
        b.extend_from_slice(brand);
        b.extend_from_slice(&[0; 8]);
        b
    }

    #[test]
    fn images() {
        let png = sniff(&[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0]).unwrap();
        assert_eq!(png.mime, "image/png");
        assert_eq!(png.category(), MediaCategory::Image);

        let jpeg = sniff(&[0xff, 0xd8, 0xff, 0xe0, 0, 0x10]).unwrap();
        assert_eq!(jpeg.mime, "image/jpeg");
        assert_eq!(jpeg.extension, "jpg");
    }

    #[test]
    fn video_and_voice_notes() {
        let mp4 = sniff(&ftyp(b"isom")).unwrap();
        assert_eq!(mp4.mime, "video/mp4");
        assert_eq!(mp4.category(), MediaCategory::Video);

        let ogg = sniff(b"OggS\0\x02\0\0\0\0\0\0").unwrap();
        assert_eq!(ogg.mime, "audio/ogg");
        assert_eq!(ogg.category(), MediaCategory::Audio);
    }

    #[test]
    fn anything_else_is_a_document() {
        let pdf = sniff(b"%PDF-1.7\n").unwrap();
        assert_eq!(pdf.mime, "application/pdf");
        assert_eq!(pdf.extension, "pdf");
        assert_eq!(pdf.category(), MediaCategory::Document);
    }

    #[test]
    fn unknown_bytes() {
        assert_eq!(sniff(b"hello world"), None);
        assert_eq!(sniff(&[]), None);
    }
}
