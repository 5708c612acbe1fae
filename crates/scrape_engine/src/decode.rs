use encoding_rs::{Encoding, UTF_8};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub encoding_label: String,
    /// True when invalid sequences were replaced with U+FFFD.
    pub lossy: bool,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("content declared as {encoding} is not valid {encoding}")]
    Malformed { encoding: String },
    #[error("content type {0} is not text")]
    NotText(String),
}

/// Decode raw bytes into UTF-8 using: BOM -> Content-Type charset -> UTF-8.
///
/// A declared, recognised charset is decoded strictly and invalid input is an
/// error. A missing or unrecognised label falls back to UTF-8 with invalid
/// sequences replaced by U+FFFD.
pub fn decode_text(bytes: &[u8], content_type: &str) -> Result<DecodedText, DecodeError> {
    let mime = mime_essence(content_type);
    if is_binary_mime(&mime) {
        return Err(DecodeError::NotText(mime));
    }

    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return decode_strict(bytes, encoding);
    }

    let declared =
        extract_charset(content_type).and_then(|label| Encoding::for_label(label.as_bytes()));
    match declared {
        Some(encoding) => decode_strict(bytes, encoding),
        None => Ok(decode_lossy(bytes, UTF_8)),
    }
}

pub(crate) fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn is_binary_mime(mime: &str) -> bool {
    const BINARY_PREFIXES: &[&str] = &["image/", "audio/", "video/", "font/"];
    const BINARY_TYPES: &[&str] = &[
        "application/octet-stream",
        "application/pdf",
        "application/zip",
        "application/gzip",
    ];
    BINARY_PREFIXES.iter().any(|prefix| mime.starts_with(prefix)) || BINARY_TYPES.contains(&mime)
}

fn extract_charset(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|part| {
            let (key, value) = part.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("charset")
                .then(|| value.trim().trim_matches(['"', '\'']).to_string())
        })
        .find(|label| !label.is_empty())
}

fn decode_strict(bytes: &[u8], encoding: &'static Encoding) -> Result<DecodedText, DecodeError> {
    let (text, actual, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(DecodeError::Malformed {
            encoding: actual.name().to_string(),
        });
    }
    Ok(DecodedText {
        text: text.into_owned(),
        encoding_label: actual.name().to_string(),
        lossy: false,
    })
}

fn decode_lossy(bytes: &[u8], encoding: &'static Encoding) -> DecodedText {
    let (text, actual, had_errors) = encoding.decode(bytes);
    DecodedText {
        text: text.into_owned(),
        encoding_label: actual.name().to_string(),
        lossy: had_errors,
    }
}
