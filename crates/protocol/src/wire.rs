//! Cast v2 framing.
//!
//! # Wire format
//!
//! ```text
//! FRAME:   [4 bytes BE: body_len][body_len bytes: CastMessage protobuf]
//!
//! CastMessage fields:
//!   1 protocol_version  varint   (0 = CASTV2_1_0)
//!   2 source_id         string
//!   3 destination_id    string
//!   4 namespace         string
//!   5 payload_type      varint   (0 = STRING)
//!   6 payload_utf8      string
//! ```
//!
//! Only string payloads are produced. Unknown fields are skipped on decode.

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::ProtocolError;
use crate::constants::{
    MAX_MESSAGE_SIZE, Namespace, PAYLOAD_TYPE_STRING, PROTOCOL_VERSION_CASTV2_1_0,
};

const WIRE_VARINT: u8 = 0;
const WIRE_FIXED64: u8 = 1;
const WIRE_LEN: u8 = 2;
const WIRE_FIXED32: u8 = 5;

/// A single Cast v2 message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastMessage {
    pub protocol_version: u64,
    pub source_id: String,
    pub destination_id: String,
    pub namespace: String,
    pub payload_utf8: String,
}

impl CastMessage {
    /// Builds a message with a JSON payload.
    pub fn json<T: Serialize>(
        source_id: impl Into<String>,
        destination_id: impl Into<String>,
        namespace: Namespace,
        payload: &T,
    ) -> Result<Self, ProtocolError> {
        Ok(Self {
            protocol_version: PROTOCOL_VERSION_CASTV2_1_0,
            source_id: source_id.into(),
            destination_id: destination_id.into(),
            namespace: namespace.as_str().to_string(),
            payload_utf8: serde_json::to_string(payload)?,
        })
    }

    /// Parses the namespace into a known [`Namespace`].
    pub fn parsed_namespace(&self) -> Result<Namespace, ProtocolError> {
        self.namespace.parse()
    }

    /// Encodes the protobuf body (without the length prefix).
    pub fn encode_body(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            16 + self.source_id.len()
                + self.destination_id.len()
                + self.namespace.len()
                + self.payload_utf8.len(),
        );
        write_varint_field(&mut out, 1, self.protocol_version);
        write_string_field(&mut out, 2, &self.source_id);
        write_string_field(&mut out, 3, &self.destination_id);
        write_string_field(&mut out, 4, &self.namespace);
        write_varint_field(&mut out, 5, PAYLOAD_TYPE_STRING);
        write_string_field(&mut out, 6, &self.payload_utf8);
        out
    }

    /// Decodes a protobuf body (without the length prefix).
    pub fn decode_body(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut msg = CastMessage {
            protocol_version: PROTOCOL_VERSION_CASTV2_1_0,
            source_id: String::new(),
            destination_id: String::new(),
            namespace: String::new(),
            payload_utf8: String::new(),
        };

        let mut cursor = 0usize;
        while cursor < bytes.len() {
            let tag = read_varint(bytes, &mut cursor)?;
            let field = (tag >> 3) as u32;
            let wire_type = (tag & 0x07) as u8;

            match wire_type {
                WIRE_VARINT => {
                    let value = read_varint(bytes, &mut cursor)?;
                    if field == 1 {
                        msg.protocol_version = value;
                    }
                }
                WIRE_LEN => {
                    let len = read_varint(bytes, &mut cursor)? as usize;
                    let end = cursor
                        .checked_add(len)
                        .filter(|end| *end <= bytes.len())
                        .ok_or(ProtocolError::Truncated("length-delimited field"))?;
                    let raw = &bytes[cursor..end];
                    cursor = end;

                    let target = match field {
                        2 => &mut msg.source_id,
                        3 => &mut msg.destination_id,
                        4 => &mut msg.namespace,
                        6 => &mut msg.payload_utf8,
                        _ => continue,
                    };
                    *target = std::str::from_utf8(raw)
                        .map_err(|_| ProtocolError::InvalidUtf8(field))?
                        .to_string();
                }
                WIRE_FIXED64 => skip(bytes, &mut cursor, 8)?,
                WIRE_FIXED32 => skip(bytes, &mut cursor, 4)?,
                other => {
                    return Err(ProtocolError::UnsupportedWireType {
                        field,
                        wire_type: other,
                    });
                }
            }
        }

        Ok(msg)
    }

    /// Encodes the full frame: length prefix followed by the body.
    pub fn encode_frame(&self) -> Result<Vec<u8>, ProtocolError> {
        let body = self.encode_body();
        if body.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::FrameTooLarge(body.len()));
        }
        let mut frame = Vec::with_capacity(4 + body.len());
        frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
        frame.extend_from_slice(&body);
        Ok(frame)
    }
}

/// Writes one framed message to the stream.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    msg: &CastMessage,
) -> Result<(), ProtocolError> {
    let frame = msg.encode_frame()?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one framed message from the stream.
///
/// Returns `None` on a clean end of stream before a new frame starts.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Option<CastMessage>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::FrameTooLarge(len));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    CastMessage::decode_body(&body).map(Some)
}

fn write_varint_field(out: &mut Vec<u8>, field: u32, value: u64) {
    write_varint(out, u64::from(field << 3) | u64::from(WIRE_VARINT));
    write_varint(out, value);
}

fn write_string_field(out: &mut Vec<u8>, field: u32, value: &str) {
    write_varint(out, u64::from(field << 3) | u64::from(WIRE_LEN));
    write_varint(out, value.len() as u64);
    out.extend_from_slice(value.as_bytes());
}

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

fn read_varint(bytes: &[u8], cursor: &mut usize) -> Result<u64, ProtocolError> {
    let mut value = 0u64;
    for shift in (0..64).step_by(7) {
        let byte = *bytes
            .get(*cursor)
            .ok_or(ProtocolError::Truncated("varint"))?;
        *cursor += 1;
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(ProtocolError::InvalidVarint)
}

fn skip(bytes: &[u8], cursor: &mut usize, n: usize) -> Result<(), ProtocolError> {
    if bytes.len() - *cursor < n {
        return Err(ProtocolError::Truncated("fixed-width field"));
    }
    *cursor += n;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{RECEIVER_ID, SENDER_ID};
    use crate::messages::HeartbeatMessage;

    fn ping() -> CastMessage {
        CastMessage::json(SENDER_ID, RECEIVER_ID, Namespace::Heartbeat, &HeartbeatMessage::Ping)
            .unwrap()
    }

    #[test]
    fn body_layout_matches_protobuf() {
        let body = ping().encode_body();
        // Field 1 (varint) = 0, then field 2 (len) "sender-0".
        assert_eq!(&body[..4], &[0x08, 0x00, 0x12, 0x08]);
        assert_eq!(&body[4..12], b"sender-0");
    }

    #[test]
    fn decode_recovers_all_fields() {
        let msg = ping();
        let decoded = CastMessage::decode_body(&msg.encode_body()).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(decoded.parsed_namespace().unwrap(), Namespace::Heartbeat);
        assert_eq!(decoded.payload_utf8, r#"{"type":"PING"}"#);
    }

    #[test]
    fn decode_skips_unknown_fields() {
        let mut body = ping().encode_body();
        // Field 7 (payload_binary), length 3.
        body.extend_from_slice(&[0x3a, 0x03, 1, 2, 3]);
        // Field 9 (fixed32).
        body.extend_from_slice(&[0x4d, 0, 0, 0, 0]);
        let decoded = CastMessage::decode_body(&body).unwrap();
        assert_eq!(decoded.source_id, SENDER_ID);
    }

    #[test]
    fn decode_rejects_truncated_string() {
        // Field 2, declared length 10 but only 2 bytes follow.
        let body = [0x12, 0x0a, b'a', b'b'];
        assert!(matches!(
            CastMessage::decode_body(&body),
            Err(ProtocolError::Truncated(_))
        ));
    }

    #[test]
    fn decode_rejects_runaway_varint() {
        let body = [0x08, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01];
        assert!(matches!(
            CastMessage::decode_body(&body),
            Err(ProtocolError::InvalidVarint)
        ));
    }

    #[test]
    fn decode_rejects_invalid_utf8() {
        let body = [0x22, 0x02, 0xff, 0xfe];
        assert!(matches!(
            CastMessage::decode_body(&body),
            Err(ProtocolError::InvalidUtf8(4))
        ));
    }

    #[test]
    fn varint_multi_byte() {
        let mut out = Vec::new();
        write_varint(&mut out, 300);
        assert_eq!(out, vec![0xac, 0x02]);
        let mut cursor = 0;
        assert_eq!(read_varint(&out, &mut cursor).unwrap(), 300);
        assert_eq!(cursor, 2);
    }

    #[tokio::test]
    async fn frames_over_stream() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        let msg = ping();
        write_frame(&mut a, &msg).await.unwrap();
        write_frame(&mut a, &msg).await.unwrap();
        drop(a);

        assert_eq!(read_frame(&mut b).await.unwrap(), Some(msg.clone()));
        assert_eq!(read_frame(&mut b).await.unwrap(), Some(msg));
        assert_eq!(read_frame(&mut b).await.unwrap(), None);
    }

    #[tokio::test]
    async fn read_frame_rejects_oversized_length() {
        let len = (MAX_MESSAGE_SIZE as u32 + 1).to_be_bytes();
        let mut cursor = &len[..];
        assert!(matches!(
            read_frame(&mut cursor).await,
            Err(ProtocolError::FrameTooLarge(_))
        ));
    }
}
