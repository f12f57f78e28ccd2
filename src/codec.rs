//! Frame codec
//!
//! One frame is a 2-byte big-endian length followed by that many bytes of
//! "modified UTF-8", the string encoding of `DataOutputStream.writeUTF`:
//! - NUL is written as the two bytes `C0 80`
//! - characters outside the BMP are written as two 3-byte surrogate encodings
//!
//! Plain ASCII and BMP text encode exactly as standard UTF-8, so peers that
//! never send NUL or astral characters see ordinary UTF-8 on the wire.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::FrameError;

/// Size of the length prefix in bytes
pub const LENGTH_PREFIX: usize = 2;

/// Largest encoded payload a single frame can carry
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

/// Length-prefixed modified-UTF-8 codec
///
/// Used with `FramedRead`/`FramedWrite` over each half of a TCP stream.
/// The decoder only yields complete frames; a stream that ends mid-frame
/// surfaces as an error from `decode_eof`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec;

impl FrameCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for FrameCodec {
    type Item = String;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, FrameError> {
        if src.len() < LENGTH_PREFIX {
            return Ok(None);
        }

        let len = u16::from_be_bytes([src[0], src[1]]) as usize;
        let frame_len = LENGTH_PREFIX + len;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX);
        let payload = src.split_to(len);
        decode_modified_utf8(&payload).map(Some)
    }
}

impl<'a> Encoder<&'a str> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &'a str, dst: &mut BytesMut) -> Result<(), FrameError> {
        let len = encoded_len(item);
        if len > MAX_FRAME_LEN {
            return Err(FrameError::TooLong(len));
        }

        dst.reserve(LENGTH_PREFIX + len);
        dst.put_u16(len as u16);
        encode_modified_utf8(item, dst);
        Ok(())
    }
}

impl Encoder<String> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), FrameError> {
        Encoder::<&str>::encode(self, item.as_str(), dst)
    }
}

/// Number of bytes `text` occupies on the wire, excluding the length prefix
pub fn encoded_len(text: &str) -> usize {
    text.encode_utf16()
        .map(|unit| match unit {
            0x0001..=0x007F => 1,
            0x0000 | 0x0080..=0x07FF => 2,
            _ => 3,
        })
        .sum()
}

fn encode_modified_utf8(text: &str, dst: &mut BytesMut) {
    for unit in text.encode_utf16() {
        match unit {
            0x0001..=0x007F => dst.put_u8(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                dst.put_u8((0xC0 | ((unit >> 6) & 0x1F)) as u8);
                dst.put_u8((0x80 | (unit & 0x3F)) as u8);
            }
            _ => {
                dst.put_u8((0xE0 | ((unit >> 12) & 0x0F)) as u8);
                dst.put_u8((0x80 | ((unit >> 6) & 0x3F)) as u8);
                dst.put_u8((0x80 | (unit & 0x3F)) as u8);
            }
        }
    }
}

/// Decode one frame payload
pub fn decode_modified_utf8(bytes: &[u8]) -> Result<String, FrameError> {
    if bytes.is_ascii() {
        return Ok(bytes.iter().map(|&b| b as char).collect());
    }

    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match b >> 4 {
            0x0..=0x7 => {
                units.push(u16::from(b));
                i += 1;
            }
            0xC | 0xD => {
                let b2 = continuation(bytes, i + 1)?;
                units.push((u16::from(b & 0x1F) << 6) | u16::from(b2 & 0x3F));
                i += 2;
            }
            0xE => {
                let b2 = continuation(bytes, i + 1)?;
                let b3 = continuation(bytes, i + 2)?;
                units.push(
                    (u16::from(b & 0x0F) << 12)
                        | (u16::from(b2 & 0x3F) << 6)
                        | u16::from(b3 & 0x3F),
                );
                i += 3;
            }
            _ => return Err(FrameError::Malformed(i)),
        }
    }

    String::from_utf16(&units).map_err(|_| FrameError::UnpairedSurrogate)
}

fn continuation(bytes: &[u8], at: usize) -> Result<u8, FrameError> {
    match bytes.get(at) {
        Some(&b) if b & 0xC0 == 0x80 => Ok(b),
        _ => Err(FrameError::Malformed(at)),
    }
}
