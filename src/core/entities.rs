//! XML Entity Decoding
//!
//! Handles decoding of XML entities in character data:
//! - Predefined entities: &lt; &gt; &amp; &quot; &apos;
//! - Numeric character references: &#123; &#x7B;
//!
//! Uses Cow for zero-copy when no entities are present.

use memchr::memchr;
use std::borrow::Cow;

/// Decode text content, handling entity references
///
/// Returns Borrowed if no entities present (zero-copy),
/// returns Owned if entities were decoded.
#[inline]
pub fn decode_text(input: &[u8]) -> Cow<'_, [u8]> {
    if memchr(b'&', input).is_none() {
        return Cow::Borrowed(input);
    }
    Cow::Owned(decode_entities(input))
}

/// Decode all entity references in the input.
/// Unknown or unterminated references are kept verbatim.
pub fn decode_entities(input: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let mut pos = 0;

    while pos < input.len() {
        let Some(amp_pos) = memchr(b'&', &input[pos..]) else {
            result.extend_from_slice(&input[pos..]);
            break;
        };
        result.extend_from_slice(&input[pos..pos + amp_pos]);
        pos += amp_pos;

        let decoded = memchr(b';', &input[pos..]).and_then(|semi| {
            decode_entity(&input[pos + 1..pos + semi]).map(|c| (c, semi))
        });
        match decoded {
            Some((c, semi)) => {
                let mut utf8 = [0u8; 4];
                result.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
                pos += semi + 1;
            }
            None => {
                result.push(b'&');
                pos += 1;
            }
        }
    }

    result
}

/// Decode a single entity (without & and ;)
fn decode_entity(entity: &[u8]) -> Option<char> {
    match entity {
        b"lt" => Some('<'),
        b"gt" => Some('>'),
        b"amp" => Some('&'),
        b"quot" => Some('"'),
        b"apos" => Some('\''),
        [b'#', rest @ ..] => decode_numeric_entity(rest),
        _ => None,
    }
}

fn decode_numeric_entity(entity: &[u8]) -> Option<char> {
    let codepoint = match entity {
        [b'x' | b'X', hex @ ..] => u32::from_str_radix(std::str::from_utf8(hex).ok()?, 16).ok()?,
        dec => std::str::from_utf8(dec).ok()?.parse::<u32>().ok()?,
    };
    if !is_valid_xml_char(codepoint) {
        return None;
    }
    char::from_u32(codepoint)
}

/// Char ::= #x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]
#[inline]
pub fn is_valid_xml_char(codepoint: u32) -> bool {
    matches!(codepoint,
        0x9 | 0xA | 0xD |
        0x20..=0xD7FF |
        0xE000..=0xFFFD |
        0x10000..=0x10FFFF
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_entities() {
        let result = decode_text(b"Hello, World!");
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result.as_ref(), b"Hello, World!");
    }

    #[test]
    fn test_basic_entities() {
        let result = decode_text(b"&lt;hello&gt; &amp; &quot;world&quot;");
        assert_eq!(result.as_ref(), b"<hello> & \"world\"");
    }

    #[test]
    fn test_numeric_references() {
        assert_eq!(decode_text(b"&#65;&#x42;&#X43;").as_ref(), b"ABC");
        let smile = decode_text(b"&#x1F600;");
        assert_eq!(std::str::from_utf8(smile.as_ref()).unwrap(), "😀");
    }

    #[test]
    fn test_unknown_and_unterminated_kept() {
        assert_eq!(decode_text(b"&unknown;").as_ref(), b"&unknown;");
        assert_eq!(decode_text(b"a & b").as_ref(), b"a & b");
        assert_eq!(decode_text(b"&#0;").as_ref(), b"&#0;");
    }
}
