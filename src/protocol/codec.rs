//! Protocol codec
//!
//! Tagged binary encoding of every [`Payload`] type.
//!
//! ## Wire Format
//!
//! Every value starts with its registered type code, then its fields in a
//! fixed order. All integers are big-endian.
//! ```text
//! ┌──────────┬─────────────────────────────────────────────┐
//! │ Type (1) │ Fields                                      │
//! └──────────┴─────────────────────────────────────────────┘
//!
//! bytes   = len (4) + raw
//! string  = bytes (UTF-8)
//! list<T> = count (4) + T * count
//!
//! Message      = id:string, content:<tagged Command | Response>
//! Command      = name:string, parameters:list<bytes>
//! Response     = code:i32, result:list<bytes>
//! DatabaseInfo = name:string, partitions:u32, kind:u8, enabled:u8,
//!                clusters:<tagged ClusterInfo>
//! ClusterInfo  = count:u32, (name:string, uris:list<string>) * count
//! ```

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{KvError, Result};
use super::message::{
    ClusterInfo, Command, DatabaseInfo, DatabaseKind, Message, MessageContent, Payload,
    PayloadType, Response, ResponseCode,
};

/// Largest byte array or list accepted while decoding
pub const MAX_FIELD_SIZE: usize = 64 * 1024 * 1024;

// =============================================================================
// Encoding
// =============================================================================

/// Encode any payload, type code first
pub fn encode_payload(payload: &Payload) -> Vec<u8> {
    let mut buf = BytesMut::new();
    put_payload(&mut buf, payload);
    buf.to_vec()
}

pub fn encode_message(message: &Message) -> Vec<u8> {
    let mut buf = BytesMut::new();
    put_message(&mut buf, message);
    buf.to_vec()
}

pub fn encode_database_info(info: &DatabaseInfo) -> Vec<u8> {
    let mut buf = BytesMut::new();
    put_database_info(&mut buf, info);
    buf.to_vec()
}

pub fn encode_cluster_info(info: &ClusterInfo) -> Vec<u8> {
    let mut buf = BytesMut::new();
    put_cluster_info(&mut buf, info);
    buf.to_vec()
}

fn put_payload(buf: &mut BytesMut, payload: &Payload) {
    match payload {
        Payload::Message(m) => put_message(buf, m),
        Payload::Command(c) => put_command(buf, c),
        Payload::Response(r) => put_response(buf, r),
        Payload::DatabaseInfo(d) => put_database_info(buf, d),
        Payload::ClusterInfo(c) => put_cluster_info(buf, c),
    }
}

fn put_message(buf: &mut BytesMut, message: &Message) {
    buf.put_u8(PayloadType::Message as u8);
    put_string(buf, &message.id);
    match &message.content {
        MessageContent::Command(c) => put_command(buf, c),
        MessageContent::Response(r) => put_response(buf, r),
    }
}

fn put_command(buf: &mut BytesMut, command: &Command) {
    buf.put_u8(PayloadType::Command as u8);
    put_string(buf, &command.name);
    put_byte_list(buf, &command.parameters);
}

fn put_response(buf: &mut BytesMut, response: &Response) {
    buf.put_u8(PayloadType::Response as u8);
    buf.put_i32(response.code as i32);
    put_byte_list(buf, &response.result);
}

fn put_database_info(buf: &mut BytesMut, info: &DatabaseInfo) {
    buf.put_u8(PayloadType::DatabaseInfo as u8);
    put_string(buf, &info.name);
    buf.put_u32(info.partitions);
    buf.put_u8(info.kind as u8);
    buf.put_u8(info.enabled as u8);
    put_cluster_info(buf, &info.clusters);
}

fn put_cluster_info(buf: &mut BytesMut, info: &ClusterInfo) {
    buf.put_u8(PayloadType::ClusterInfo as u8);
    buf.put_u32(info.clusters.len() as u32);
    for (name, uris) in &info.clusters {
        put_string(buf, name);
        buf.put_u32(uris.len() as u32);
        for uri in uris {
            put_string(buf, uri);
        }
    }
}

fn put_bytes(buf: &mut BytesMut, bytes: &[u8]) {
    buf.put_u32(bytes.len() as u32);
    buf.put_slice(bytes);
}

fn put_string(buf: &mut BytesMut, s: &str) {
    put_bytes(buf, s.as_bytes());
}

fn put_byte_list(buf: &mut BytesMut, items: &[Vec<u8>]) {
    buf.put_u32(items.len() as u32);
    for item in items {
        put_bytes(buf, item);
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode any payload; trailing bytes are an error
pub fn decode_payload(bytes: &[u8]) -> Result<Payload> {
    let mut reader = bytes;
    let payload = get_payload(&mut reader)?;
    expect_end(reader)?;
    Ok(payload)
}

/// Decode a top-level [`Message`]
pub fn decode_message(bytes: &[u8]) -> Result<Message> {
    match decode_payload(bytes)? {
        Payload::Message(m) => Ok(m),
        other => Err(KvError::Protocol(format!(
            "Expected Message, got {:?}",
            other.payload_type()
        ))),
    }
}

pub fn decode_database_info(bytes: &[u8]) -> Result<DatabaseInfo> {
    match decode_payload(bytes)? {
        Payload::DatabaseInfo(d) => Ok(d),
        other => Err(KvError::Protocol(format!(
            "Expected DatabaseInfo, got {:?}",
            other.payload_type()
        ))),
    }
}

pub fn decode_cluster_info(bytes: &[u8]) -> Result<ClusterInfo> {
    match decode_payload(bytes)? {
        Payload::ClusterInfo(c) => Ok(c),
        other => Err(KvError::Protocol(format!(
            "Expected ClusterInfo, got {:?}",
            other.payload_type()
        ))),
    }
}

fn get_payload(buf: &mut &[u8]) -> Result<Payload> {
    let payload = match PayloadType::from_code(get_u8(buf)?)? {
        PayloadType::Message => Payload::Message(get_message_fields(buf)?),
        PayloadType::Command => Payload::Command(get_command_fields(buf)?),
        PayloadType::Response => Payload::Response(get_response_fields(buf)?),
        PayloadType::DatabaseInfo => Payload::DatabaseInfo(get_database_info_fields(buf)?),
        PayloadType::ClusterInfo => Payload::ClusterInfo(get_cluster_info_fields(buf)?),
    };
    Ok(payload)
}

fn get_message_fields(buf: &mut &[u8]) -> Result<Message> {
    let id = get_string(buf)?;
    // Nested tags are checked before descending, so decoding never recurses
    let content = match PayloadType::from_code(get_u8(buf)?)? {
        PayloadType::Command => MessageContent::Command(get_command_fields(buf)?),
        PayloadType::Response => MessageContent::Response(get_response_fields(buf)?),
        other => {
            return Err(KvError::Protocol(format!(
                "Message content must be Command or Response, got {:?}",
                other
            )))
        }
    };
    Ok(Message { id, content })
}

fn get_command_fields(buf: &mut &[u8]) -> Result<Command> {
    let name = get_string(buf)?;
    let parameters = get_byte_list(buf)?;
    Ok(Command { name, parameters })
}

fn get_response_fields(buf: &mut &[u8]) -> Result<Response> {
    ensure(buf, 4, "response code")?;
    let code = ResponseCode::from_code(buf.get_i32())?;
    let result = get_byte_list(buf)?;
    Ok(Response { code, result })
}

fn get_database_info_fields(buf: &mut &[u8]) -> Result<DatabaseInfo> {
    let name = get_string(buf)?;
    ensure(buf, 6, "database info")?;
    let partitions = buf.get_u32();
    let kind = DatabaseKind::from_code(buf.get_u8())?;
    let enabled = buf.get_u8() != 0;
    let clusters = match PayloadType::from_code(get_u8(buf)?)? {
        PayloadType::ClusterInfo => get_cluster_info_fields(buf)?,
        other => {
            return Err(KvError::Protocol(format!(
                "DatabaseInfo clusters must be ClusterInfo, got {:?}",
                other
            )))
        }
    };
    Ok(DatabaseInfo {
        name,
        partitions,
        kind,
        enabled,
        clusters,
    })
}

fn get_cluster_info_fields(buf: &mut &[u8]) -> Result<ClusterInfo> {
    let count = get_count(buf)?;
    let mut info = ClusterInfo::default();
    for _ in 0..count {
        let name = get_string(buf)?;
        let uri_count = get_count(buf)?;
        let mut uris = Vec::with_capacity(uri_count.min(1024));
        for _ in 0..uri_count {
            uris.push(get_string(buf)?);
        }
        info.clusters.insert(name, uris);
    }
    Ok(info)
}

fn get_u8(buf: &mut &[u8]) -> Result<u8> {
    ensure(buf, 1, "type code")?;
    Ok(buf.get_u8())
}

fn get_count(buf: &mut &[u8]) -> Result<usize> {
    ensure(buf, 4, "length")?;
    let count = buf.get_u32() as usize;
    if count > MAX_FIELD_SIZE {
        return Err(KvError::Protocol(format!(
            "Field too large: {} (max {})",
            count, MAX_FIELD_SIZE
        )));
    }
    Ok(count)
}

fn get_bytes(buf: &mut &[u8]) -> Result<Vec<u8>> {
    let len = get_count(buf)?;
    ensure(buf, len, "byte array")?;
    let bytes = buf[..len].to_vec();
    buf.advance(len);
    Ok(bytes)
}

fn get_string(buf: &mut &[u8]) -> Result<String> {
    String::from_utf8(get_bytes(buf)?)
        .map_err(|e| KvError::Protocol(format!("Invalid UTF-8 string: {}", e)))
}

fn get_byte_list(buf: &mut &[u8]) -> Result<Vec<Vec<u8>>> {
    let count = get_count(buf)?;
    let mut items = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        items.push(get_bytes(buf)?);
    }
    Ok(items)
}

fn ensure(buf: &[u8], needed: usize, what: &str) -> Result<()> {
    if buf.remaining() < needed {
        return Err(KvError::Protocol(format!(
            "Incomplete {}: expected {} bytes, got {}",
            what,
            needed,
            buf.remaining()
        )));
    }
    Ok(())
}

fn expect_end(buf: &[u8]) -> Result<()> {
    if !buf.is_empty() {
        return Err(KvError::Protocol(format!(
            "{} trailing bytes after payload",
            buf.len()
        )));
    }
    Ok(())
}
