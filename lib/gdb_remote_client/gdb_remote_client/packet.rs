// Copyright 2025 The Pigweed Authors
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License. You may obtain a copy of
// the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the
// License for the specific language governing permissions and limitations under
// the License.

//! Framing of GDB remote protocol packets.
//!
//! A packet travels as `$<payload>#<checksum>` where the checksum is the sum
//! of the transmitted payload bytes modulo 256 as two hex digits.

use nom::bytes::complete::{tag, take, take_till};
use nom::combinator::map_res;
use nom::sequence::terminated;
use nom::{IResult, Parser};

use crate::error::PacketError;

const ESCAPE: u8 = b'}';
const RUN_LENGTH: u8 = b'*';
const ESCAPE_XOR: u8 = 0x20;

/// Repeat counts are sent as `count + 29`.
const RUN_LENGTH_BIAS: u8 = 29;

fn needs_escape(byte: u8) -> bool {
    matches!(byte, b'$' | b'#' | b'*' | b'}')
}

/// Escapes `payload` for transmission.
pub fn escape(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len());
    for &byte in payload {
        if needs_escape(byte) {
            out.push(ESCAPE);
            out.push(byte ^ ESCAPE_XOR);
        } else {
            out.push(byte);
        }
    }
    out
}

/// Calculates the GDB checksum for the given data.
///
/// The checksum is the sum of all bytes modulo 256.
pub fn calculate_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, &x| acc.wrapping_add(x))
}

/// Encodes `payload` with GDB framing (start character, escapes, checksum).
///
/// Format: `$<payload>#<checksum>`
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let escaped = escape(payload);
    let checksum = calculate_checksum(&escaped);
    frame(&escaped, checksum)
}

/// Like [`encode`] but with a caller supplied checksum, for checking how a
/// stub reacts to corrupted packets.
pub fn encode_with_checksum(payload: &[u8], checksum: u8) -> Vec<u8> {
    frame(&escape(payload), checksum)
}

fn frame(escaped: &[u8], checksum: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(escaped.len() + 4);
    out.push(b'$');
    out.extend_from_slice(escaped);
    out.push(b'#');
    out.extend_from_slice(format!("{:02x}", checksum).as_bytes());
    out
}

fn start(input: &[u8]) -> IResult<&[u8], &[u8]> {
    tag(&b"$"[..]).parse(input)
}

fn body(input: &[u8]) -> IResult<&[u8], &[u8]> {
    terminated(take_till(|b: u8| b == b'#'), tag(&b"#"[..])).parse(input)
}

fn checksum(input: &[u8]) -> IResult<&[u8], u8> {
    map_res(take(2usize), |digits: &[u8]| {
        let mut out = [0u8; 1];
        hex::decode_to_slice(digits, &mut out).map(|()| out[0])
    })
    .parse(input)
}

/// Decodes a complete frame into its logical payload.
///
/// The checksum is verified over the raw bytes between `$` and `#` before
/// escapes and run-length tokens are expanded.
pub fn decode(input: &[u8]) -> Result<Vec<u8>, PacketError> {
    let (rest, _) = start(input).map_err(|_| PacketError::Malformed("missing '$'"))?;
    let (rest, raw) = body(rest).map_err(|_| PacketError::Malformed("missing '#'"))?;
    let (rest, received) =
        checksum(rest).map_err(|_| PacketError::Malformed("checksum is not two hex digits"))?;
    if !rest.is_empty() {
        return Err(PacketError::Malformed("trailing bytes after checksum"));
    }

    let expected = calculate_checksum(raw);
    if expected != received {
        return Err(PacketError::ChecksumMismatch { expected, received });
    }
    if raw.contains(&b'$') {
        return Err(PacketError::Malformed("unescaped '$' in payload"));
    }
    expand(raw)
}

/// Reverses escaping and run-length encoding of a packet body.
fn expand(raw: &[u8]) -> Result<Vec<u8>, PacketError> {
    let mut out = Vec::with_capacity(raw.len());
    let mut bytes = raw.iter().copied();
    while let Some(byte) = bytes.next() {
        match byte {
            ESCAPE => {
                let escaped = bytes
                    .next()
                    .ok_or(PacketError::Malformed("missing byte after '}'"))?;
                out.push(escaped ^ ESCAPE_XOR);
            }
            RUN_LENGTH => {
                let count = bytes
                    .next()
                    .ok_or(PacketError::Malformed("missing repeat count after '*'"))?;
                // '#' and '$' never reach here: the frame parser stops at
                // '#' and a raw '$' is rejected above.
                if !(32..=126).contains(&count) {
                    return Err(PacketError::Malformed("repeat count must be printable"));
                }
                let repeated = *out
                    .last()
                    .ok_or(PacketError::Malformed("run-length token without preceding byte"))?;
                let extra = usize::from(count - RUN_LENGTH_BIAS);
                out.extend(core::iter::repeat(repeated).take(extra));
            }
            _ => out.push(byte),
        }
    }
    Ok(out)
}

/// Decodes the hex text carried by console output (`O`) packets.
pub fn decode_hex_text(digits: &[u8]) -> Result<String, PacketError> {
    let bytes =
        hex::decode(digits).map_err(|_| PacketError::Malformed("console output is not hex"))?;
    String::from_utf8(bytes)
        .map_err(|_| PacketError::Malformed("console output is not UTF-8 text"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(body: &[u8]) -> Vec<u8> {
        let mut out = vec![b'$'];
        out.extend_from_slice(body);
        out.extend_from_slice(format!("#{:02x}", calculate_checksum(body)).as_bytes());
        out
    }

    #[test]
    fn test_calculate_checksum() {
        assert_eq!(calculate_checksum(b""), 0x00);
        assert_eq!(calculate_checksum(b" "), 0x20);
        assert_eq!(calculate_checksum(b"\x40\x40"), 0x80);
        assert_eq!(calculate_checksum(b"abc"), 0x26);
        assert_eq!(calculate_checksum(&[0xff, 0x02]), 0x01);
    }

    #[test]
    fn test_encode() {
        assert_eq!(encode(b""), b"$#00");
        assert_eq!(encode(b"abc"), b"$abc#26");
        assert_eq!(encode(b"m1000,4"), b"$m1000,4#8e");
    }

    #[test]
    fn test_encode_escapes_special_bytes() {
        let encoded = encode(b"}$#*");
        assert_eq!(encoded, b"$}]}\x04}\x03}\x0a#62");

        let body = &encoded[1..encoded.len() - 3];
        assert!(!body.contains(&b'$'));
        assert!(!body.contains(&b'#'));
        assert!(!body.contains(&b'*'));
        assert!(body.chunks(2).all(|pair| pair[0] == b'}'));
        assert_eq!(decode(&encoded).unwrap(), b"}$#*");
    }

    #[test]
    fn test_encode_with_checksum() {
        assert_eq!(encode_with_checksum(b"abc", 0x11), b"$abc#11");
        assert_eq!(encode_with_checksum(b"", 0xff), b"$#ff");
    }

    #[test]
    fn test_decode_plain() {
        assert_eq!(decode(b"$#00").unwrap(), b"");
        assert_eq!(decode(b"$abc#26").unwrap(), b"abc");
        assert_eq!(decode(&wire(b"def\x8f")).unwrap(), b"def\x8f");
    }

    #[test]
    fn test_decode_accepts_uppercase_checksum() {
        assert_eq!(decode(b"$}]#DA").unwrap(), b"}");
    }

    #[test]
    fn test_decode_escape() {
        assert_eq!(decode(b"$ab}Cd#e7").unwrap(), b"abcd");
        assert_eq!(decode(&wire(b"jkl}d")).unwrap(), b"jklD");
        assert_eq!(decode(&wire(b"}\x03")).unwrap(), b"#");
        assert_eq!(decode(&wire(b"}\x04")).unwrap(), b"$");
        assert_eq!(decode(&wire(b"}\x0a")).unwrap(), b"*");
        assert_eq!(decode(&wire(b"}]")).unwrap(), b"}");
        assert_eq!(
            decode(&wire(b"abc}")),
            Err(PacketError::Malformed("missing byte after '}'"))
        );
    }

    #[test]
    fn test_decode_run_length() {
        assert_eq!(decode(&wire(b"a* ")).unwrap(), b"aaaa");
        assert_eq!(decode(&wire(b"EFGa*!HIJ")).unwrap(), b"EFGaaaaaHIJ");
        assert_eq!(decode(&wire(b"0*\"")).unwrap(), b"000000");
        // The repeated byte is the decoded one, not the escape character.
        assert_eq!(decode(&wire(b"}]* ")).unwrap(), b"}}}}");
    }

    #[test]
    fn test_decode_run_length_errors() {
        assert_eq!(
            decode(&wire(b"pqr*")),
            Err(PacketError::Malformed("missing repeat count after '*'"))
        );
        assert_eq!(
            decode(&wire(b"a*\x1f")),
            Err(PacketError::Malformed("repeat count must be printable"))
        );
        assert_eq!(
            decode(&wire(b"a*\x7f")),
            Err(PacketError::Malformed("repeat count must be printable"))
        );
        assert_eq!(
            decode(&wire(b"* ")),
            Err(PacketError::Malformed("run-length token without preceding byte"))
        );
        assert_eq!(
            decode(&wire(b"a*$")),
            Err(PacketError::Malformed("unescaped '$' in payload"))
        );
    }

    #[test]
    fn test_decode_malformed() {
        assert_eq!(decode(b"abc#26"), Err(PacketError::Malformed("missing '$'")));
        assert_eq!(decode(b"$abc"), Err(PacketError::Malformed("missing '#'")));
        assert_eq!(
            decode(b"$#xx"),
            Err(PacketError::Malformed("checksum is not two hex digits"))
        );
        assert_eq!(
            decode(b"$abc#2"),
            Err(PacketError::Malformed("checksum is not two hex digits"))
        );
        assert_eq!(
            decode(b"$abc#26x"),
            Err(PacketError::Malformed("trailing bytes after checksum"))
        );
        assert_eq!(decode(b""), Err(PacketError::Malformed("missing '$'")));
    }

    #[test]
    fn test_decode_checksum_mismatch() {
        assert_eq!(
            decode(b"$#01"),
            Err(PacketError::ChecksumMismatch {
                expected: 0x00,
                received: 0x01
            })
        );
    }

    #[test]
    fn test_single_bit_flip_is_detected() {
        let encoded = encode(b"vMustReplyEmpty");
        let body_len = encoded.len() - 4;
        for index in 1..=body_len {
            for bit in 0..8 {
                let mut corrupted = encoded.clone();
                corrupted[index] ^= 1 << bit;
                assert!(
                    matches!(decode(&corrupted), Err(PacketError::ChecksumMismatch { .. })),
                    "flip of bit {bit} at {index} went unnoticed"
                );
            }
        }
    }

    #[test]
    fn test_round_trip_every_byte_value() {
        let all: Vec<u8> = (0..=255).collect();
        assert_eq!(decode(&encode(&all)).unwrap(), all);
        for byte in 0..=255u8 {
            let payload = [byte, byte, b'x', byte];
            assert_eq!(decode(&encode(&payload)).unwrap(), payload);
        }
    }

    #[test]
    fn test_decode_hex_text() {
        assert_eq!(decode_hex_text(b"20616263").as_deref(), Ok(" abc"));
        assert_eq!(decode_hex_text(b"").as_deref(), Ok(""));
        assert_eq!(
            decode_hex_text(b"202"),
            Err(PacketError::Malformed("console output is not hex"))
        );
        assert_eq!(
            decode_hex_text(b"zz"),
            Err(PacketError::Malformed("console output is not hex"))
        );
        assert_eq!(
            decode_hex_text(b"ff"),
            Err(PacketError::Malformed("console output is not UTF-8 text"))
        );
    }
}
