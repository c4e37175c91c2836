//! Framing
//!
//! One frame carries one encoded [`Message`]:
//! ```text
//! ┌──────────┬─────────────────────────────┐
//! │ Len (4)  │  Payload (Len bytes)        │
//! └──────────┴─────────────────────────────┘
//! ```
//! Length is big-endian. Frames let the reader assemble complete payloads
//! out of TCP's unframed byte stream before the codec sees them.

use std::io::{Read, Write};

use crate::error::{KvError, Result};
use super::codec::{decode_message, encode_message};
use super::Message;

/// Length prefix size
pub const FRAME_HEADER_SIZE: usize = 4;

/// Maximum frame payload size (64 MB)
pub const MAX_FRAME_SIZE: u32 = 64 * 1024 * 1024;

/// Prefix `payload` with its length
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_FRAME_SIZE as usize {
        return Err(KvError::Protocol(format!(
            "Frame too large: {} bytes (max {})",
            payload.len(),
            MAX_FRAME_SIZE
        )));
    }

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Read one complete frame payload
///
/// Blocks until the whole frame has arrived or an error occurs
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut header = [0u8; FRAME_HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let len = u32::from_be_bytes(header);
    if len > MAX_FRAME_SIZE {
        return Err(KvError::Protocol(format!(
            "Frame too large: {} bytes (max {})",
            len, MAX_FRAME_SIZE
        )));
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;
    Ok(payload)
}

pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let frame = encode_frame(payload)?;
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

/// Read and decode one framed message
pub fn read_message<R: Read>(reader: &mut R) -> Result<Message> {
    let payload = read_frame(reader)?;
    decode_message(&payload)
}

/// Encode and write one framed message
pub fn write_message<W: Write>(writer: &mut W, message: &Message) -> Result<()> {
    write_frame(writer, &encode_message(message))
}
