use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

// `data:image/jpeg;base64,` as produced by canvas.toDataURL
static DATA_URL_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data:[\w.+-]*(?:/[\w.+-]+)?(?:;[\w.+=-]+)*,").unwrap()
});

#[derive(Debug, Error)]
pub enum ImageDecodeError {
    #[error("no image data")]
    Empty,
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("unrecognised image format")]
    UnsupportedFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

pub fn decode_image(input: &str) -> Result<DecodedImage, ImageDecodeError> {
    let input = input.trim();
    let payload = match DATA_URL_PREFIX.find(input) {
        Some(prefix) => &input[prefix.end()..],
        None => input,
    };
    let payload: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if payload.is_empty() {
        return Err(ImageDecodeError::Empty);
    }

    let bytes = base64::engine::general_purpose::STANDARD.decode(payload)?;
    let mime_type = sniff_mime(&bytes).ok_or(ImageDecodeError::UnsupportedFormat)?;
    Ok(DecodedImage { mime_type, bytes })
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}
