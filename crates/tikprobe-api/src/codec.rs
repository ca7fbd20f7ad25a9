// RouterOS API wire codec
//
// A sentence is a sequence of words terminated by a zero-length word.
// Each word carries a variable-length big-endian length prefix whose
// leading bits select the prefix width (1 to 5 bytes).

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::Error;

/// Upper bound on a single buffered sentence. RouterOS never sends
/// anything close to this; hitting it means the stream is garbage.
const DEFAULT_MAX_SENTENCE_LEN: usize = 8 * 1024 * 1024;

/// Frames RouterOS API sentences as `Vec<String>` words.
#[derive(Debug, Clone)]
pub struct SentenceCodec {
    max_sentence_len: usize,
}

impl Default for SentenceCodec {
    fn default() -> Self {
        Self {
            max_sentence_len: DEFAULT_MAX_SENTENCE_LEN,
        }
    }
}

impl SentenceCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the maximum accepted sentence size.
    pub fn with_max_sentence_len(max_sentence_len: usize) -> Self {
        Self { max_sentence_len }
    }
}

// ── Length prefix ────────────────────────────────────────────────────

/// Append the length prefix for a word of `len` bytes.
fn encode_length(len: usize, dst: &mut BytesMut) -> Result<(), Error> {
    let len = u32::try_from(len)
        .map_err(|_| Error::Protocol(format!("word of {len} bytes exceeds 32-bit length")))?;

    match len {
        0..=0x7F => dst.put_slice(&len.to_be_bytes()[3..]),
        0x80..=0x3FFF => dst.put_slice(&(len | 0x8000).to_be_bytes()[2..]),
        0x4000..=0x001F_FFFF => dst.put_slice(&(len | 0x00C0_0000).to_be_bytes()[1..]),
        0x0020_0000..=0x0FFF_FFFF => dst.put_slice(&(len | 0xE000_0000).to_be_bytes()),
        _ => {
            dst.put_u8(0xF0);
            dst.put_slice(&len.to_be_bytes());
        }
    }
    Ok(())
}

/// Decode a length prefix at the start of `buf`.
///
/// Returns `(prefix_len, word_len)`, or `None` if more bytes are needed.
fn decode_length(buf: &[u8]) -> Result<Option<(usize, usize)>, Error> {
    let Some(&first) = buf.first() else {
        return Ok(None);
    };

    let (prefix_len, mask) = match first {
        b if b & 0x80 == 0x00 => (1, 0x7F),
        b if b & 0xC0 == 0x80 => (2, 0x3F),
        b if b & 0xE0 == 0xC0 => (3, 0x1F),
        b if b & 0xF0 == 0xE0 => (4, 0x0F),
        0xF0 => (5, 0x00),
        other => {
            return Err(Error::Protocol(format!(
                "reserved control byte {other:#04x} in length prefix"
            )));
        }
    };

    let Some(rest) = buf.get(1..prefix_len) else {
        return Ok(None);
    };

    let len = rest
        .iter()
        .fold(u32::from(first & mask), |acc, b| (acc << 8) | u32::from(*b));
    let len = usize::try_from(len)
        .map_err(|_| Error::Protocol(format!("word length {len} does not fit in memory")))?;

    Ok(Some((prefix_len, len)))
}

// ── Codec impls ──────────────────────────────────────────────────────

impl Decoder for SentenceCodec {
    type Item = Vec<String>;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut offset = 0;
        let mut words = Vec::new();

        loop {
            let Some((prefix_len, word_len)) = decode_length(&src[offset..])? else {
                return Ok(None);
            };

            let end = offset + prefix_len + word_len;
            if end > self.max_sentence_len {
                return Err(Error::Protocol(format!(
                    "sentence exceeds {} bytes",
                    self.max_sentence_len
                )));
            }
            if src.len() < end {
                src.reserve(end - src.len());
                return Ok(None);
            }

            if word_len == 0 {
                src.advance(end);
                return Ok(Some(words));
            }

            let word = &src[offset + prefix_len..end];
            words.push(String::from_utf8_lossy(word).into_owned());
            offset = end;
        }
    }
}

impl<'a, S: AsRef<str>> Encoder<&'a [S]> for SentenceCodec {
    type Error = Error;

    fn encode(&mut self, words: &'a [S], dst: &mut BytesMut) -> Result<(), Self::Error> {
        for word in words {
            let word = word.as_ref().as_bytes();
            encode_length(word.len(), dst)?;
            dst.put_slice(word);
        }
        dst.put_u8(0);
        Ok(())
    }
}
