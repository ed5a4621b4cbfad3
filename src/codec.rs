//! Content codec for embedding file bytes in generated source
//!
//! Two modes are available, selected once per generation run:
//!
//! - [`ContentMode::Direct`] writes the bytes as a Rust byte-string literal.
//! - [`ContentMode::Compressed`] deflates the bytes with zlib, encodes the
//!   result with Ascii85 and writes it as a string literal. Generated code
//!   reverses this with [`decompress`] when the box is built.

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

// Ascii85 alphabet bounds ('!' = 0, 'u' = 84)
const A85_FIRST: u8 = b'!';
const A85_LAST: u8 = b'u';
const A85_ZERO_GROUP: u8 = b'z';

/// How file content is represented in generated source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentMode {
    /// Byte-string literal, content untouched
    #[default]
    Direct,
    /// zlib + Ascii85 string literal
    Compressed,
}

impl ContentMode {
    /// Map the build-time compression switch to a mode
    pub fn from_compression(compress: bool) -> Self {
        if compress {
            ContentMode::Compressed
        } else {
            ContentMode::Direct
        }
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, ContentMode::Compressed)
    }

    /// Render `bytes` as a complete Rust literal for this mode
    pub fn literal(&self, bytes: &[u8]) -> Result<String, CodecError> {
        match self {
            ContentMode::Direct => Ok(byte_string_literal(bytes)),
            ContentMode::Compressed => Ok(format!("{:?}", compress(bytes)?)),
        }
    }
}

/// Error type for content encoding and decoding
#[derive(Debug)]
pub enum CodecError {
    /// zlib compression failed
    Compress(std::io::Error),
    /// zlib stream could not be inflated
    Decompress(std::io::Error),
    /// Character outside the Ascii85 alphabet
    InvalidByte { position: usize, byte: u8 },
    /// Group decodes to a value larger than 32 bits
    Overflow { position: usize },
    /// Final group has a single character
    TruncatedGroup,
    /// `z` inside a group
    MisplacedZ { position: usize },
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::Compress(err) => write!(f, "Compression failed: {}", err),
            CodecError::Decompress(err) => write!(f, "Decompression failed: {}", err),
            CodecError::InvalidByte { position, byte } => {
                write!(f, "Invalid ascii85 byte 0x{:02x} at position {}", byte, position)
            }
            CodecError::Overflow { position } => {
                write!(f, "Ascii85 group ending at position {} overflows 32 bits", position)
            }
            CodecError::TruncatedGroup => {
                write!(f, "Ascii85 data ends with a single-character group")
            }
            CodecError::MisplacedZ { position } => {
                write!(f, "Ascii85 'z' inside a group at position {}", position)
            }
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CodecError::Compress(err) | CodecError::Decompress(err) => Some(err),
            _ => None,
        }
    }
}

/// Rust byte-string literal (`b"..."`) holding exactly `bytes`
pub fn byte_string_literal(bytes: &[u8]) -> String {
    format!("b\"{}\"", bytes.escape_ascii())
}

/// Compress with zlib and encode the result as Ascii85 text
pub fn compress(bytes: &[u8]) -> Result<String, CodecError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(bytes).map_err(CodecError::Compress)?;
    let deflated = encoder.finish().map_err(CodecError::Compress)?;
    Ok(ascii85_encode(&deflated))
}

/// Decode Ascii85 text produced by [`compress`] and inflate it
pub fn decompress(text: &str) -> Result<Vec<u8>, CodecError> {
    let deflated = ascii85_decode(text)?;
    let mut decoder = ZlibDecoder::new(deflated.as_slice());
    let mut bytes = Vec::new();
    decoder.read_to_end(&mut bytes).map_err(CodecError::Decompress)?;
    Ok(bytes)
}

/// Ascii85 (btoa flavour, no `<~ ~>` frame); all-zero groups become `z`
pub fn ascii85_encode(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() / 4 * 5 + 5);

    for chunk in bytes.chunks(4) {
        let mut group = [0u8; 4];
        group[..chunk.len()].copy_from_slice(chunk);
        let mut value = u32::from_be_bytes(group);

        if chunk.len() == 4 && value == 0 {
            output.push(A85_ZERO_GROUP as char);
            continue;
        }

        let mut digits = [0u8; 5];
        for digit in digits.iter_mut().rev() {
            *digit = (value % 85) as u8 + A85_FIRST;
            value /= 85;
        }
        // partial group of n bytes keeps n + 1 digits
        for &digit in &digits[..chunk.len() + 1] {
            output.push(digit as char);
        }
    }

    output
}

/// Decode Ascii85 text; ASCII whitespace is skipped
pub fn ascii85_decode(text: &str) -> Result<Vec<u8>, CodecError> {
    let mut output = Vec::with_capacity(text.len() / 5 * 4 + 4);
    let mut group = [0u8; 5];
    let mut filled = 0;

    for (position, byte) in text.bytes().enumerate() {
        if byte.is_ascii_whitespace() {
            continue;
        }
        if byte == A85_ZERO_GROUP {
            if filled != 0 {
                return Err(CodecError::MisplacedZ { position });
            }
            output.extend_from_slice(&[0, 0, 0, 0]);
            continue;
        }
        if !(A85_FIRST..=A85_LAST).contains(&byte) {
            return Err(CodecError::InvalidByte { position, byte });
        }

        group[filled] = byte - A85_FIRST;
        filled += 1;
        if filled == 5 {
            let value = group_value(&group).ok_or(CodecError::Overflow { position })?;
            output.extend_from_slice(&value.to_be_bytes());
            filled = 0;
        }
    }

    match filled {
        0 => {}
        1 => return Err(CodecError::TruncatedGroup),
        n => {
            // pad with the highest digit, keep n - 1 bytes
            for digit in group.iter_mut().skip(n) {
                *digit = A85_LAST - A85_FIRST;
            }
            let value = group_value(&group).ok_or(CodecError::Overflow { position: text.len() })?;
            output.extend_from_slice(&value.to_be_bytes()[..n - 1]);
        }
    }

    Ok(output)
}

fn group_value(digits: &[u8; 5]) -> Option<u32> {
    let value = digits
        .iter()
        .fold(0u64, |acc, &digit| acc * 85 + u64::from(digit));
    u32::try_from(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii85_known_vectors() {
        assert_eq!(ascii85_encode(b""), "");
        assert_eq!(ascii85_encode(b"hello"), "BOu!rDZ");
        assert_eq!(ascii85_encode(&[0, 0, 0, 0]), "z");
        assert_eq!(ascii85_encode(&[0, 0, 0]), "!!!!");
        assert_eq!(ascii85_encode(&[0xff, 0xff, 0xff, 0xff]), "s8W-!");
    }

    #[test]
    fn test_ascii85_decode_known_vectors() {
        assert_eq!(ascii85_decode("BOu!rDZ").unwrap(), b"hello");
        assert_eq!(ascii85_decode("z!!!!").unwrap(), vec![0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(ascii85_decode("BOu!r\nDZ ").unwrap(), b"hello");
    }

    #[test]
    fn test_ascii85_roundtrip_partial_groups() {
        let data: Vec<u8> = (0u8..=255).collect();
        for len in 0..12 {
            let slice = &data[200..200 + len];
            assert_eq!(ascii85_decode(&ascii85_encode(slice)).unwrap(), slice);
        }
    }

    #[test]
    fn test_ascii85_decode_errors() {
        assert!(matches!(
            ascii85_decode("ab~cd"),
            Err(CodecError::InvalidByte { position: 2, byte: b'~' })
        ));
        assert!(matches!(ascii85_decode("B"), Err(CodecError::TruncatedGroup)));
        assert!(matches!(ascii85_decode("BOu!rD"), Err(CodecError::TruncatedGroup)));
        assert!(matches!(ascii85_decode("BOzu"), Err(CodecError::MisplacedZ { position: 2 })));
        assert!(matches!(ascii85_decode("uuuuu"), Err(CodecError::Overflow { .. })));
    }

    #[test]
    fn test_compress_roundtrip_binary() {
        let mut data = Vec::new();
        for i in 0..4096u32 {
            data.extend_from_slice(&i.wrapping_mul(2654435761).to_le_bytes());
        }
        data.extend_from_slice(&[0; 64]);
        data.extend_from_slice(b"{% not a tag %} \"quoted\" \\ $");

        let encoded = compress(&data).unwrap();
        assert!(encoded.bytes().all(|b| (b'!'..=b'u').contains(&b) || b == b'z'));
        assert_eq!(decompress(&encoded).unwrap(), data);
    }

    #[test]
    fn test_compress_roundtrip_empty() {
        let encoded = compress(b"").unwrap();
        assert!(!encoded.is_empty());
        assert_eq!(decompress(&encoded).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_decompress_rejects_garbage() {
        let not_zlib = ascii85_encode(b"definitely not a zlib stream");
        assert!(matches!(decompress(&not_zlib), Err(CodecError::Decompress(_))));
    }

    #[test]
    fn test_direct_literal() {
        let literal = ContentMode::Direct.literal(b"a\"b\\c\n\x00\xff{%").unwrap();
        assert_eq!(literal, r#"b"a\"b\\c\n\x00\xff{%""#);
    }

    #[test]
    fn test_direct_literal_empty() {
        assert_eq!(ContentMode::Direct.literal(b"").unwrap(), "b\"\"");
    }

    #[test]
    fn test_compressed_literal_is_quoted() {
        let literal = ContentMode::Compressed.literal(b"hello hello hello").unwrap();
        assert!(literal.starts_with('"') && literal.ends_with('"'));
        let inner = &literal[1..literal.len() - 1];
        let unquoted = inner.replace("\\\"", "\"").replace("\\\\", "\\");
        assert_eq!(decompress(&unquoted).unwrap(), b"hello hello hello");
    }

    #[test]
    fn test_mode_from_compression() {
        assert_eq!(ContentMode::from_compression(true), ContentMode::Compressed);
        assert_eq!(ContentMode::from_compression(false), ContentMode::Direct);
        assert!(!ContentMode::default().is_compressed());
    }
}
