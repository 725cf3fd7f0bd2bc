// Image formats and MIME detection
// Author: kelexine (https://github.com/kelexine)

/// Image formats the pipeline recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    WebP,
    Gif,
    Heic,
    Heif,
    Bmp,
    Tiff,
}

impl ImageFormat {
    /// Get MIME type for this format
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Heic => "image/heic",
            ImageFormat::Heif => "image/heif",
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::Tiff => "image/tiff",
        }
    }

    /// Try to detect format from MIME type
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.to_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
            "image/png" => Some(ImageFormat::Png),
            "image/webp" => Some(ImageFormat::WebP),
            "image/gif" => Some(ImageFormat::Gif),
            "image/heic" => Some(ImageFormat::Heic),
            "image/heif" => Some(ImageFormat::Heif),
            "image/bmp" | "image/x-ms-bmp" => Some(ImageFormat::Bmp),
            "image/tiff" => Some(ImageFormat::Tiff),
            _ => None,
        }
    }

    /// Guess format from a file name or URL path extension
    pub fn from_extension(path: &str) -> Option<Self> {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let ext = path.rsplit_once('.')?.1.to_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "webp" => Some(ImageFormat::WebP),
            "gif" => Some(ImageFormat::Gif),
            "heic" => Some(ImageFormat::Heic),
            "heif" => Some(ImageFormat::Heif),
            "bmp" => Some(ImageFormat::Bmp),
            "tif" | "tiff" => Some(ImageFormat::Tiff),
            _ => None,
        }
    }

    /// Detect format from magic bytes at start of image data
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.starts_with(b"\xFF\xD8\xFF") {
            Some(ImageFormat::Jpeg)
        } else if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageFormat::Png)
        } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            Some(ImageFormat::Gif)
        } else if data.len() >= 12 && data.starts_with(b"RIFF") && data[8..12] == *b"WEBP" {
            Some(ImageFormat::WebP)
        } else if data.len() >= 12 && (data[4..12] == *b"ftypheic" || data[4..12] == *b"ftypheix") {
            Some(ImageFormat::Heic)
        } else if data.len() >= 12 && (data[4..12] == *b"ftypmif1" || data[4..12] == *b"ftypheif") {
            Some(ImageFormat::Heif)
        } else if data.starts_with(b"II*\0") || data.starts_with(b"MM\0*") {
            Some(ImageFormat::Tiff)
        } else if data.starts_with(b"BM") {
            Some(ImageFormat::Bmp)
        } else {
            None
        }
    }

    /// Equivalent codec in the `image` crate, when it has one.
    pub fn codec(&self) -> Option<image::ImageFormat> {
        match self {
            ImageFormat::Jpeg => Some(image::ImageFormat::Jpeg),
            ImageFormat::Png => Some(image::ImageFormat::Png),
            ImageFormat::WebP => Some(image::ImageFormat::WebP),
            ImageFormat::Gif => Some(image::ImageFormat::Gif),
            ImageFormat::Bmp => Some(image::ImageFormat::Bmp),
            ImageFormat::Tiff => Some(image::ImageFormat::Tiff),
            ImageFormat::Heic | ImageFormat::Heif => None,
        }
    }

    /// Whether the pipeline can decode this format to inspect or resize it.
    pub fn can_decode(&self) -> bool {
        self.codec().is_some_and(|c| c.reading_enabled())
    }

    /// Whether the pipeline can produce this format when transcoding.
    pub fn can_encode(&self) -> bool {
        self.codec().is_some_and(|c| c.writing_enabled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_magic_bytes() {
        let png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
        assert_eq!(ImageFormat::detect(png), Some(ImageFormat::Png));

        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0];
        assert_eq!(ImageFormat::detect(&jpeg), Some(ImageFormat::Jpeg));

        assert_eq!(ImageFormat::detect(b"GIF89a"), Some(ImageFormat::Gif));

        let mut webp = b"RIFF".to_vec();
        webp.extend_from_slice(&[0, 0, 0, 0]);
        webp.extend_from_slice(b"WEBP");
        assert_eq!(ImageFormat::detect(&webp), Some(ImageFormat::WebP));

        let heic = b"\0\0\0\x18ftypheic";
        assert_eq!(ImageFormat::detect(heic), Some(ImageFormat::Heic));

        assert_eq!(ImageFormat::detect(b"BM\x36\0\0\0"), Some(ImageFormat::Bmp));
        assert_eq!(ImageFormat::detect(b"II*\0\x08\0"), Some(ImageFormat::Tiff));
        assert_eq!(ImageFormat::detect(b"MM\0*\0\0"), Some(ImageFormat::Tiff));

        assert_eq!(ImageFormat::detect(b"<html>"), None);
        assert_eq!(ImageFormat::detect(b""), None);
    }

    #[test]
    fn test_mime_round_trip() {
        for format in [
            ImageFormat::Jpeg,
            ImageFormat::Png,
            ImageFormat::WebP,
            ImageFormat::Gif,
            ImageFormat::Heic,
            ImageFormat::Heif,
            ImageFormat::Bmp,
            ImageFormat::Tiff,
        ] {
            assert_eq!(ImageFormat::from_mime_type(format.mime_type()), Some(format));
        }
        assert_eq!(ImageFormat::from_mime_type("image/jpg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_mime_type("image/x-ms-bmp"), Some(ImageFormat::Bmp));
        assert_eq!(ImageFormat::from_mime_type("image/avif"), None);
    }

    #[test]
    fn test_from_extension() {
        assert_eq!(ImageFormat::from_extension("photo.JPG"), Some(ImageFormat::Jpeg));
        assert_eq!(
            ImageFormat::from_extension("https://cdn.example.com/a/b.png?sig=abc"),
            Some(ImageFormat::Png)
        );
        assert_eq!(ImageFormat::from_extension("scan.TIF"), Some(ImageFormat::Tiff));
        assert_eq!(ImageFormat::from_extension("README"), None);
    }

    #[test]
    fn test_codec_support() {
        assert!(ImageFormat::Png.can_decode());
        assert!(ImageFormat::Png.can_encode());
        assert!(ImageFormat::Jpeg.can_encode());
        assert!(!ImageFormat::Heic.can_decode());
        assert!(!ImageFormat::Heic.can_encode());
        assert!(ImageFormat::Bmp.can_decode());
        assert!(ImageFormat::Tiff.can_decode());
    }
}
