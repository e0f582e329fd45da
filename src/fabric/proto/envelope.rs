#[cfg(test)]
use std::convert::TryInto;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::fabric::common::{Error, ErrorKind, Result};

/// Default cap on `total_len`, matching spec's 10 MiB default.
pub const DEFAULT_MAX_FRAME_LEN: u32 = 10 * 1024 * 1024;

/// `cid_len` is a single byte, so a client_id can never exceed this.
pub const MAX_CLIENT_ID_LEN: usize = 255;

/// encode produces `be_u32(1 + len(client_id) + len(payload)) ∥ u8(len(client_id)) ∥ client_id ∥ payload`.
///
/// Fails with `OversizedField` if the client_id doesn't fit in a u8 length prefix,
/// or `OversizedFrame` if the resulting envelope would exceed `max_len`.
pub fn encode(client_id: &str, payload: &[u8], max_len: u32) -> Result<Bytes> {
    let cid = client_id.as_bytes();
    if cid.len() > MAX_CLIENT_ID_LEN {
        return Err(Error::oversized_field(cid.len()));
    }

    let total_len = 1usize + cid.len() + payload.len();
    if total_len as u64 > max_len as u64 {
        return Err(Error::oversized_frame(total_len as u32, max_len));
    }

    let mut buf = BytesMut::with_capacity(4 + total_len);
    buf.put_u32(total_len as u32);
    buf.put_u8(cid.len() as u8);
    buf.put_slice(cid);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// A single decoded envelope: the embedded client_id and the payload that followed it.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub client_id: String,
    pub payload: Bytes,
}

/// decode reads exactly one envelope from an async byte stream.
///
/// Reads 4 bytes for `total_len`, rejects values above `max_len`, reads `total_len`
/// more bytes, then splits them into `cid_len` / `client_id` / `payload`. A short
/// read (EOF before the frame completes) surfaces as `Truncated`.
pub async fn decode<R: AsyncRead + Unpin>(reader: &mut R, max_len: u32) -> Result<Envelope> {
    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .await
        .map_err(|_| Error::truncated())?;
    let total_len = u32::from_be_bytes(len_buf);
    if total_len > max_len {
        return Err(Error::oversized_frame(total_len, max_len));
    }
    if total_len == 0 {
        return Err(Error::truncated());
    }

    let mut body = BytesMut::zeroed(total_len as usize);
    reader
        .read_exact(&mut body)
        .await
        .map_err(|_| Error::truncated())?;

    parse_body(body.freeze())
}

fn parse_body(mut body: Bytes) -> Result<Envelope> {
    if body.is_empty() {
        return Err(Error::truncated());
    }
    let cid_len = body.get_u8() as usize;
    if cid_len > body.remaining() {
        return Err(Error::truncated());
    }
    let cid_bytes = body.split_to(cid_len);
    let client_id = std::str::from_utf8(&cid_bytes)?.to_string();
    Ok(Envelope {
        client_id,
        payload: body,
    })
}

/// Incremental parser mirroring the teacher's `MessageParser`: feed it bytes
/// as they arrive, and drain complete envelopes with `next()`. Exercised
/// only by this module's own tests below — both production readers
/// (`connector::reader_loop`, `framer_loop::run`) read directly off a socket
/// with `decode`'s `read_exact`-based form instead, so this stays
/// test-only rather than a second, unused public parsing API.
#[cfg(test)]
struct EnvelopeParser {
    data: BytesMut,
    max_len: u32,
}

#[cfg(test)]
impl EnvelopeParser {
    fn new(max_len: u32) -> Self {
        Self {
            data: BytesMut::with_capacity(4096),
            max_len,
        }
    }

    fn bytes_mut(&mut self) -> &mut BytesMut {
        &mut self.data
    }

    /// next returns `Some(Ok(envelope))` if a full envelope is buffered,
    /// `Some(Err(_))` on a framing violation, or `None` if more bytes are needed.
    fn next(&mut self) -> Option<Result<Envelope>> {
        if self.data.len() < 4 {
            return None;
        }
        let total_len = u32::from_be_bytes(self.data[0..4].try_into().unwrap());
        if total_len > self.max_len {
            return Some(Err(Error::oversized_frame(total_len, self.max_len)));
        }
        if total_len == 0 {
            return Some(Err(Error::truncated()));
        }
        let frame_end = 4 + total_len as usize;
        if self.data.len() < frame_end {
            self.data.reserve(frame_end - self.data.len());
            return None;
        }

        self.data.advance(4);
        let body = self.data.split_to(total_len as usize).freeze();
        Some(parse_body(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_cid_and_payload() {
        let enc = encode("abc-123", b"hello", DEFAULT_MAX_FRAME_LEN).unwrap();
        let mut parser = EnvelopeParser::new(DEFAULT_MAX_FRAME_LEN);
        parser.bytes_mut().extend_from_slice(&enc);
        let env = parser.next().unwrap().unwrap();
        assert_eq!(env.client_id, "abc-123");
        assert_eq!(&env.payload[..], b"hello");
        assert!(parser.next().is_none());
    }

    #[test]
    fn round_trips_max_length_client_id() {
        let cid: String = "a".repeat(MAX_CLIENT_ID_LEN);
        let enc = encode(&cid, b"", DEFAULT_MAX_FRAME_LEN).unwrap();
        let mut parser = EnvelopeParser::new(DEFAULT_MAX_FRAME_LEN);
        parser.bytes_mut().extend_from_slice(&enc);
        let env = parser.next().unwrap().unwrap();
        assert_eq!(env.client_id.len(), MAX_CLIENT_ID_LEN);
        assert!(env.payload.is_empty());
    }

    #[test]
    fn rejects_oversized_client_id() {
        let cid: String = "a".repeat(MAX_CLIENT_ID_LEN + 1);
        let err = encode(&cid, b"", DEFAULT_MAX_FRAME_LEN).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::OversizedField { .. }));
    }

    #[test]
    fn rejects_frame_above_cap() {
        let cap = 16;
        let payload = vec![0u8; 32];
        let err = encode("c", &payload, cap).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::OversizedFrame { .. }));
    }

    #[test]
    fn accepts_frame_exactly_at_cap() {
        // total_len = 1 (cid_len byte) + 1 (cid) + payload == cap
        let cap = 10;
        let payload = vec![0u8; 8];
        let enc = encode("x", &payload, cap).unwrap();
        let mut parser = EnvelopeParser::new(cap);
        parser.bytes_mut().extend_from_slice(&enc);
        assert!(parser.next().unwrap().is_ok());
    }

    #[test]
    fn parser_accumulates_partial_frames() {
        let enc = encode("abc", b"hello world", DEFAULT_MAX_FRAME_LEN).unwrap();
        let mut parser = EnvelopeParser::new(DEFAULT_MAX_FRAME_LEN);
        for byte in enc.iter().take(enc.len() - 1) {
            parser.bytes_mut().extend_from_slice(&[*byte]);
            assert!(parser.next().is_none());
        }
        parser.bytes_mut().extend_from_slice(&[*enc.last().unwrap()]);
        let env = parser.next().unwrap().unwrap();
        assert_eq!(env.client_id, "abc");
        assert_eq!(&env.payload[..], b"hello world");
    }

    #[test]
    fn cid_len_zero_is_accepted_by_the_framer() {
        let enc = encode("", b"payload", DEFAULT_MAX_FRAME_LEN).unwrap();
        let mut parser = EnvelopeParser::new(DEFAULT_MAX_FRAME_LEN);
        parser.bytes_mut().extend_from_slice(&enc);
        let env = parser.next().unwrap().unwrap();
        assert_eq!(env.client_id, "");
        assert_eq!(&env.payload[..], b"payload");
    }
}
