//! The binary wire protocol: a fixed-size header plus a length-prefixed
//! sequence of variable-length operation records.
//!
//! The header uses `zerocopy` for a `#[repr(C, packed)]` fixed layout; the
//! per-operation payloads (names, keys, written bytes) are cursor-based
//! since a fixed-layout struct cannot express them.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use static_assertions::assert_eq_size;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

/// Maximum payload a single frame may carry. Guards against a malformed or
/// hostile length prefix forcing an unbounded allocation.
pub const MAX_PAYLOAD: u32 = 64 * 1024 * 1024;

/// Set on a reply; the reply's type equals the request's type with this bit on.
pub const FLAG_REPLY: u32 = 1;
/// Server acknowledges only after fsync.
pub const FLAG_SAFETY_STORAGE: u32 = 2;
/// Server acknowledges once bytes are accepted (not necessarily durable).
pub const FLAG_SAFETY_NETWORK: u32 = 4;

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("unknown message type: {0}")]
    UnknownMessageType(u32),

    #[error("payload of {len} bytes exceeds the {MAX_PAYLOAD} byte limit")]
    PayloadTooLarge { len: u32 },

    #[error("frame truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("string field is not zero-terminated")]
    UnterminatedString,

    #[error("string field is not valid utf-8")]
    InvalidUtf8,

    #[error("op record too short for its fixed fields")]
    OpRecordTooShort,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The 16-byte frame header, written and read via `zerocopy`.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct MessageHeader {
    pub kind: u32,
    pub op_count: u32,
    pub flags: u32,
    pub payload_len: u32,
}
assert_eq_size!(MessageHeader, [u8; 16]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MessageType {
    None = 0,
    ObjectCreate = 1,
    ObjectDelete = 2,
    ObjectRead = 3,
    ObjectWrite = 4,
    ObjectStatus = 5,
    TransformationObjectCreate = 6,
    TransformationObjectDelete = 7,
    TransformationObjectRead = 8,
    TransformationObjectWrite = 9,
    TransformationObjectStatus = 10,
    KvPut = 11,
    KvDelete = 12,
    KvGet = 13,
    KvGetAll = 14,
    KvGetByPrefix = 15,
    Ping = 16,
    Statistics = 17,
}

impl TryFrom<u32> for MessageType {
    type Error = WireError;

    fn try_from(v: u32) -> Result<Self, Self::Error> {
        use MessageType::*;
        Ok(match v {
            0 => None,
            1 => ObjectCreate,
            2 => ObjectDelete,
            3 => ObjectRead,
            4 => ObjectWrite,
            5 => ObjectStatus,
            6 => TransformationObjectCreate,
            7 => TransformationObjectDelete,
            8 => TransformationObjectRead,
            9 => TransformationObjectWrite,
            10 => TransformationObjectStatus,
            11 => KvPut,
            12 => KvDelete,
            13 => KvGet,
            14 => KvGetAll,
            15 => KvGetByPrefix,
            16 => Ping,
            17 => Statistics,
            other => return Err(WireError::UnknownMessageType(other)),
        })
    }
}

/// On-wire form of a `Transformation`: 24 bytes, `(kind, mode)` plus
/// reserved padding for forward compatibility.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct WireTransformation {
    pub kind: u8,
    pub mode: u8,
    pub reserved: [u8; 22],
}
assert_eq_size!(WireTransformation, [u8; 24]);

impl WireTransformation {
    pub fn new(kind: u8, mode: u8) -> Self {
        Self {
            kind,
            mode,
            reserved: [0u8; 22],
        }
    }
}

/// A decoded message: a type, flags, a header payload (e.g. a namespace),
/// and an ordered list of per-operation payload records.
#[derive(Debug, Clone)]
pub struct Message {
    pub kind: MessageType,
    pub flags: u32,
    pub header_payload: Bytes,
    pub ops: Vec<Bytes>,
}

impl Message {
    pub fn new(kind: MessageType, flags: u32, header_payload: Bytes, ops: Vec<Bytes>) -> Self {
        Self {
            kind,
            flags,
            header_payload,
            ops,
        }
    }

    pub fn is_reply(&self) -> bool {
        self.flags & FLAG_REPLY != 0
    }

    pub fn op_count(&self) -> u32 {
        self.ops.len() as u32
    }
}

/// Encode `msg` into a length-prefixed frame: `[u32 frame_len][16B header]
/// [u32 header_payload_len][header_payload][for each op: u32 op_len][op]`.
pub fn encode_message(msg: &Message) -> Result<Bytes, WireError> {
    let mut payload = BytesMut::new();
    payload.put_u32_le(msg.header_payload.len() as u32);
    payload.put_slice(&msg.header_payload);
    for op in &msg.ops {
        payload.put_u32_le(op.len() as u32);
        payload.put_slice(op);
    }

    if payload.len() > MAX_PAYLOAD as usize {
        return Err(WireError::PayloadTooLarge {
            len: payload.len() as u32,
        });
    }

    let header = MessageHeader {
        kind: msg.kind as u32,
        op_count: msg.op_count(),
        flags: msg.flags,
        payload_len: payload.len() as u32,
    };

    let mut frame = BytesMut::with_capacity(4 + 16 + payload.len());
    frame.put_u32_le(16 + payload.len() as u32);
    frame.put_slice(header.as_bytes());
    frame.put_slice(&payload);
    Ok(frame.freeze())
}

/// Decode a single frame (without its outer `frame_len` prefix, which the
/// caller has already consumed to size `frame`).
pub fn decode_message(mut frame: Bytes) -> Result<Message, WireError> {
    if frame.len() < 16 {
        return Err(WireError::Truncated {
            expected: 16,
            actual: frame.len(),
        });
    }
    let header_bytes = frame.split_to(16);
    let header = MessageHeader::read_from(&header_bytes[..]).expect("slice is exactly 16 bytes");

    if header.payload_len > MAX_PAYLOAD {
        return Err(WireError::PayloadTooLarge {
            len: header.payload_len,
        });
    }
    if frame.len() != header.payload_len as usize {
        return Err(WireError::Truncated {
            expected: header.payload_len as usize,
            actual: frame.len(),
        });
    }

    let kind = MessageType::try_from(header.kind)?;

    let header_payload_len = read_u32(&mut frame)? as usize;
    if frame.len() < header_payload_len {
        return Err(WireError::Truncated {
            expected: header_payload_len,
            actual: frame.len(),
        });
    }
    let header_payload = frame.split_to(header_payload_len);

    let mut ops = Vec::with_capacity(header.op_count as usize);
    for _ in 0..header.op_count {
        let op_len = read_u32(&mut frame)? as usize;
        if frame.len() < op_len {
            return Err(WireError::Truncated {
                expected: op_len,
                actual: frame.len(),
            });
        }
        ops.push(frame.split_to(op_len));
    }

    Ok(Message {
        kind,
        flags: header.flags,
        header_payload,
        ops,
    })
}

fn read_u32(buf: &mut Bytes) -> Result<u32, WireError> {
    if buf.len() < 4 {
        return Err(WireError::Truncated {
            expected: 4,
            actual: buf.len(),
        });
    }
    Ok(buf.get_u32_le())
}

/// Write a zero-terminated string into `out`.
pub fn put_cstring(out: &mut BytesMut, s: &str) {
    out.put_slice(s.as_bytes());
    out.put_u8(0);
}

/// Read a zero-terminated string, advancing `buf` past the terminator.
pub fn get_cstring(buf: &mut Bytes) -> Result<String, WireError> {
    let nul = buf
        .iter()
        .position(|&b| b == 0)
        .ok_or(WireError::UnterminatedString)?;
    let s = std::str::from_utf8(&buf[..nul])
        .map_err(|_| WireError::InvalidUtf8)?
        .to_string();
    buf.advance(nul + 1);
    Ok(s)
}

/// Write the frame to `stream`, including the outer length prefix.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    stream: &mut W,
    msg: &Message,
) -> Result<(), WireError> {
    let frame = encode_message(msg)?;
    stream.write_all(&frame).await?;
    Ok(())
}

/// Read one length-prefixed frame from `stream` and decode it.
pub async fn read_frame<R: AsyncReadExt + Unpin>(stream: &mut R) -> Result<Message, WireError> {
    let frame_len = stream.read_u32_le().await?;
    if frame_len < 16 || frame_len - 16 > MAX_PAYLOAD {
        return Err(WireError::PayloadTooLarge { len: frame_len });
    }
    let mut buf = vec![0u8; frame_len as usize];
    stream.read_exact(&mut buf).await?;
    decode_message(Bytes::from(buf))
}

/// Loop reading frames of the same type until `expected_op_count` total
/// sub-replies have been consumed, concatenating their op lists. Mirrors the
/// C original's extra receive loop: "the server might send multiple replies
/// per message".
pub async fn read_reply_until<R: AsyncReadExt + Unpin>(
    stream: &mut R,
    expected_op_count: u32,
) -> Result<Message, WireError> {
    let mut first: Option<Message> = None;
    let mut seen = 0u32;
    while seen < expected_op_count {
        let msg = read_frame(stream).await?;
        seen += msg.op_count();
        match &mut first {
            None => first = Some(msg),
            Some(acc) => acc.ops.extend(msg.ops),
        }
    }
    Ok(first.expect("loop runs at least once when expected_op_count > 0"))
}

pub mod ops {
    //! Per-message-type operation record encode/decode helpers, per the
    //! payload table: each record is a flat cursor over fixed-width fields
    //! plus an optional trailing byte slice.

    use bytes::{Buf, BufMut, Bytes, BytesMut};
    use zerocopy::{AsBytes, FromBytes};

    use super::{get_cstring, put_cstring, WireError, WireTransformation};

    pub fn encode_name(name: &str) -> Bytes {
        let mut out = BytesMut::new();
        put_cstring(&mut out, name);
        out.freeze()
    }

    pub fn decode_name(mut op: Bytes) -> Result<String, WireError> {
        get_cstring(&mut op)
    }

    /// Header payload for `OBJECT_*`/`TRANSFORMATION_OBJECT_*` messages:
    /// `namespace:z, name:z`.
    pub fn encode_object_ref(namespace: &str, name: &str) -> Bytes {
        let mut out = BytesMut::new();
        put_cstring(&mut out, namespace);
        put_cstring(&mut out, name);
        out.freeze()
    }

    pub fn decode_object_ref(mut payload: Bytes) -> Result<(String, String), WireError> {
        let namespace = get_cstring(&mut payload)?;
        let name = get_cstring(&mut payload)?;
        Ok((namespace, name))
    }

    pub fn encode_read(length: u64, offset: u64) -> Bytes {
        let mut out = BytesMut::with_capacity(16);
        out.put_u64_le(length);
        out.put_u64_le(offset);
        out.freeze()
    }

    pub fn decode_read(mut op: Bytes) -> Result<(u64, u64), WireError> {
        if op.len() < 16 {
            return Err(WireError::OpRecordTooShort);
        }
        Ok((op.get_u64_le(), op.get_u64_le()))
    }

    pub fn encode_write(offset: u64, data: &[u8]) -> Bytes {
        let mut out = BytesMut::with_capacity(16 + data.len());
        out.put_u64_le(data.len() as u64);
        out.put_u64_le(offset);
        out.put_slice(data);
        out.freeze()
    }

    pub fn decode_write(mut op: Bytes) -> Result<(u64, Bytes), WireError> {
        if op.len() < 16 {
            return Err(WireError::OpRecordTooShort);
        }
        let length = op.get_u64_le() as usize;
        let offset = op.get_u64_le();
        if op.len() < length {
            return Err(WireError::OpRecordTooShort);
        }
        Ok((offset, op.split_to(length)))
    }

    pub fn encode_transformation_read(
        length: u64,
        offset: u64,
        t: WireTransformation,
        original_size: u64,
        transformed_size: u64,
    ) -> Bytes {
        let mut out = BytesMut::with_capacity(16 + 24 + 16);
        out.put_u64_le(length);
        out.put_u64_le(offset);
        out.put_slice(t.as_bytes());
        out.put_u64_le(original_size);
        out.put_u64_le(transformed_size);
        out.freeze()
    }

    pub fn decode_transformation_read(
        mut op: Bytes,
    ) -> Result<(u64, u64, WireTransformation, u64, u64), WireError> {
        if op.len() < 16 + 24 + 16 {
            return Err(WireError::OpRecordTooShort);
        }
        let length = op.get_u64_le();
        let offset = op.get_u64_le();
        let t_bytes = op.split_to(24);
        let t = WireTransformation::read_from(&t_bytes[..]).expect("slice is exactly 24 bytes");
        let original_size = op.get_u64_le();
        let transformed_size = op.get_u64_le();
        Ok((length, offset, t, original_size, transformed_size))
    }

    pub fn encode_transformation_write(
        offset: u64,
        t: WireTransformation,
        original_size: u64,
        transformed_size: u64,
        data: &[u8],
    ) -> Bytes {
        let mut out = BytesMut::with_capacity(16 + 24 + 16 + data.len());
        out.put_u64_le(data.len() as u64);
        out.put_u64_le(offset);
        out.put_slice(t.as_bytes());
        out.put_u64_le(original_size);
        out.put_u64_le(transformed_size);
        out.put_slice(data);
        out.freeze()
    }

    pub fn decode_transformation_write(
        mut op: Bytes,
    ) -> Result<(u64, WireTransformation, u64, u64, Bytes), WireError> {
        if op.len() < 16 + 24 + 16 {
            return Err(WireError::OpRecordTooShort);
        }
        let length = op.get_u64_le() as usize;
        let offset = op.get_u64_le();
        let t_bytes = op.split_to(24);
        let t = WireTransformation::read_from(&t_bytes[..]).expect("slice is exactly 24 bytes");
        let original_size = op.get_u64_le();
        let transformed_size = op.get_u64_le();
        if op.len() < length {
            return Err(WireError::OpRecordTooShort);
        }
        Ok((offset, t, original_size, transformed_size, op.split_to(length)))
    }

    pub fn encode_kv_put(key: &str, value: &[u8]) -> Bytes {
        let mut out = BytesMut::new();
        put_cstring(&mut out, key);
        out.put_u32_le(value.len() as u32);
        out.put_slice(value);
        out.freeze()
    }

    pub fn decode_kv_put(mut op: Bytes) -> Result<(String, Bytes), WireError> {
        let key = get_cstring(&mut op)?;
        if op.len() < 4 {
            return Err(WireError::OpRecordTooShort);
        }
        let len = op.get_u32_le() as usize;
        if op.len() < len {
            return Err(WireError::OpRecordTooShort);
        }
        Ok((key, op.split_to(len)))
    }

    pub fn encode_kv_get(key: &str) -> Bytes {
        encode_name(key)
    }

    pub fn decode_kv_get(op: Bytes) -> Result<String, WireError> {
        decode_name(op)
    }

    pub fn encode_kv_get_reply(value: Option<&[u8]>) -> Bytes {
        let mut out = BytesMut::new();
        match value {
            Some(bytes) => {
                out.put_u32_le(bytes.len() as u32);
                out.put_slice(bytes);
            }
            None => out.put_u32_le(0),
        }
        out.freeze()
    }

    pub fn decode_kv_get_reply(mut op: Bytes) -> Result<Option<Bytes>, WireError> {
        if op.len() < 4 {
            return Err(WireError::OpRecordTooShort);
        }
        let len = op.get_u32_le() as usize;
        if len == 0 {
            return Ok(None);
        }
        if op.len() < len {
            return Err(WireError::OpRecordTooShort);
        }
        Ok(Some(op.split_to(len)))
    }
}
