//! Readiness check for a candidate image: is it really the image its name
//! claims to be?

use std::path::Path;

use serde::Serialize;

use crate::view::format_bytes;

const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
const JPEG_MAGIC: &[u8] = &[0xff, 0xd8, 0xff];

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    Png,
    Jpeg,
}

impl ImageKind {
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(PNG_MAGIC) {
            Some(ImageKind::Png)
        } else if bytes.starts_with(JPEG_MAGIC) {
            Some(ImageKind::Jpeg)
        } else {
            None
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(ImageKind::Png),
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProbeReport {
    pub name: String,
    pub size: u64,
    pub size_label: String,
    pub detected: Option<ImageKind>,
    pub ready: bool,
}

/// Inspect downloaded bytes for `name`. Ready means non-empty and the
/// content signature agrees with the extension.
pub fn probe(name: &str, bytes: &[u8]) -> ProbeReport {
    let detected = ImageKind::sniff(bytes);
    let ready = !bytes.is_empty() && detected.is_some() && detected == ImageKind::from_name(name);
    let size = bytes.len() as u64;
    ProbeReport {
        name: name.to_string(),
        size,
        size_label: format_bytes(size),
        detected,
        ready,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes() -> Vec<u8> {
        let mut b = PNG_MAGIC.to_vec();
        b.extend_from_slice(&[0u8; 2040]);
        b
    }

    #[test]
    fn png_named_png_is_ready() {
        let report = probe("me.PNG", &png_bytes());
        assert!(report.ready);
        assert_eq!(report.detected, Some(ImageKind::Png));
        assert_eq!(report.size, 2048);
        assert_eq!(report.size_label, "2 KB");
    }

    #[test]
    fn jpeg_named_png_is_not_ready() {
        let report = probe("me.png", &[0xff, 0xd8, 0xff, 0xe0, 0, 0x10]);
        assert_eq!(report.detected, Some(ImageKind::Jpeg));
        assert!(!report.ready);
    }

    #[test]
    fn html_error_page_is_not_ready() {
        let report = probe("me.jpg", b"<!DOCTYPE html><title>404</title>");
        assert!(report.detected.is_none());
        assert!(!report.ready);
    }

    #[test]
    fn empty_file_is_not_ready() {
        let report = probe("me.jpeg", &[]);
        assert!(!report.ready);
        assert_eq!(report.size_label, "0 Bytes");
    }
}
