//! MIME type detection utilities

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// MIME used when the bytes are not recognized as an image.
pub const DEFAULT_IMAGE_MIME: &str = "image/png";

/// Guess MIME by inspecting bytes (magic numbers)
pub fn guess_mime_from_bytes(bytes: &[u8]) -> Option<&'static str> {
    infer::get(bytes).map(|k| k.mime_type())
}

/// Image MIME of `bytes`, falling back to PNG for anything unrecognized.
pub fn guess_image_mime(bytes: &[u8]) -> &'static str {
    match guess_mime_from_bytes(bytes) {
        Some(mime) if mime.starts_with("image/") => mime,
        _ => DEFAULT_IMAGE_MIME,
    }
}

/// Standard base64 of `bytes`.
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// `data:<mime>;base64,<payload>` URI for an image.
pub fn image_data_uri(bytes: &[u8]) -> String {
    format!("data:{};base64,{}", guess_image_mime(bytes), encode_base64(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn recognizes_png_and_falls_back() {
        assert_eq!(guess_image_mime(&PNG_MAGIC), "image/png");
        assert_eq!(guess_image_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(guess_image_mime(b"plain text"), DEFAULT_IMAGE_MIME);
    }

    #[test]
    fn data_uri_shape() {
        let uri = image_data_uri(&[1, 2, 3]);
        assert_eq!(uri, "data:image/png;base64,AQID");
    }
}
