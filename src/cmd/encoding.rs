/*!
encoding.rs - PlantUML text encoding.

PlantUML servers address diagrams as `/<format>/<encoded>` where `<encoded>`
is the source compressed with raw deflate, base64 encoded, and then mapped
onto PlantUML's URL-safe alphabet (`0-9A-Za-z-_`).

Used by `-syntax` (GET `/check/<encoded>`), `-encodeurl` and `-decodeurl`.
*/

use std::io::{Read, Write};

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use flate2::Compression;
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::DeflateEncoder;

use crate::error::{Result, SabacanError};

const BASE64_CHARS: &[u8; 65] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/=";
const PLANTUML_CHARS: &[u8; 65] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz-_?";

const ZLIB_HEADER: [u8; 2] = [0x78, 0x9c];

// No '=' padding: it would map to '?' and end the URL path.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

fn translate(input: &[u8], from: &[u8; 65], to: &[u8; 65]) -> Option<Vec<u8>> {
    input
        .iter()
        .map(|c| from.iter().position(|f| f == c).map(|i| to[i]))
        .collect()
}

/// Encode diagram source into PlantUML text encoding.
pub fn encode(source: &str) -> Result<String> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(source.as_bytes())
        .map_err(|e| SabacanError::input(format!("failed to compress diagram: {e}")))?;
    let compressed = encoder
        .finish()
        .map_err(|e| SabacanError::input(format!("failed to compress diagram: {e}")))?;

    let b64 = BASE64.encode(compressed);
    let mapped = translate(b64.as_bytes(), BASE64_CHARS, PLANTUML_CHARS)
        .ok_or_else(|| SabacanError::input("unexpected base64 output"))?;
    // Both alphabets are ASCII.
    Ok(String::from_utf8_lossy(&mapped).into_owned())
}

/// Decode PlantUML text encoding back into diagram source.
pub fn decode(encoded: &str) -> Result<String> {
    let trimmed = encoded.trim();
    let b64 = translate(trimmed.as_bytes(), PLANTUML_CHARS, BASE64_CHARS).ok_or_else(|| {
        SabacanError::input(format!("'{trimmed}' contains characters outside the PlantUML encoding"))
    })?;
    let compressed = BASE64
        .decode(&b64)
        .map_err(|e| SabacanError::input(format!("invalid encoded diagram '{trimmed}': {e}")))?;

    let mut out = String::new();
    let read = if compressed.starts_with(&ZLIB_HEADER) {
        ZlibDecoder::new(compressed.as_slice()).read_to_string(&mut out)
    } else {
        DeflateDecoder::new(compressed.as_slice()).read_to_string(&mut out)
    };
    read.map_err(|e| SabacanError::input(format!("invalid encoded diagram '{trimmed}': {e}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEQUENCE: &str = "@startuml\nAlice -> Bob: Authentication Request\nBob --> Alice: Authentication Response\n@enduml";

    #[test]
    fn encoded_text_uses_plantuml_alphabet() {
        let encoded = encode(SEQUENCE).unwrap();
        assert!(!encoded.is_empty());
        assert!(
            encoded
                .bytes()
                .all(|c| c.is_ascii_alphanumeric() || c == b'-' || c == b'_')
        );
    }

    #[test]
    fn decode_restores_source() {
        let encoded = encode(SEQUENCE).unwrap();
        assert_eq!(decode(&encoded).unwrap(), SEQUENCE);
    }

    #[test]
    fn decode_accepts_surrounding_whitespace() {
        let encoded = encode("@startuml\nA -> B\n@enduml").unwrap();
        let padded = format!("  {encoded}\n");
        assert_eq!(decode(&padded).unwrap(), "@startuml\nA -> B\n@enduml");
    }

    #[test]
    fn decode_accepts_zlib_wrapped_data() {
        use flate2::write::ZlibEncoder;
        let mut z = ZlibEncoder::new(Vec::new(), Compression::default());
        z.write_all(b"@startuml\nX -> Y\n@enduml").unwrap();
        let b64 = BASE64.encode(z.finish().unwrap());
        let mapped = translate(b64.as_bytes(), BASE64_CHARS, PLANTUML_CHARS).unwrap();
        let encoded = String::from_utf8(mapped).unwrap();
        assert_eq!(decode(&encoded).unwrap(), "@startuml\nX -> Y\n@enduml");
    }

    #[test]
    fn decode_rejects_foreign_characters() {
        let err = decode("abc+def").unwrap_err();
        assert!(matches!(err, SabacanError::Input(_)));
    }
}
