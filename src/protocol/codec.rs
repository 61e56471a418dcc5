//! Protocol codec
//!
//! Encoding and decoding functions for the frame layout.
//!
//! ## Validation Policy
//! Decoding rejects, it never truncates: a declared size below the header
//! size, above [`MAX_MESSAGE_SIZE`], or different from the number of bytes
//! supplied is an encoding error. The stream reader checks the declared size
//! before allocating the payload buffer.

use std::io::{Read, Write};

use bytes::{Buf, BufMut, Bytes};

use crate::error::{Result, SkirmishError};
use super::{Message, MessageType};

/// Header size: 4 bytes total length + 4 bytes type tag
pub const HEADER_SIZE: usize = 8;

/// Maximum total frame size, header included (16 KB)
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024;

/// Maximum payload size that still fits in one frame
pub const MAX_PAYLOAD_SIZE: usize = MAX_MESSAGE_SIZE - HEADER_SIZE;

// =============================================================================
// Frame Encoding/Decoding
// =============================================================================

/// Encode a frame to bytes
///
/// Format: total_len (4) + type_tag (4) + payload
pub fn encode(message_type: MessageType, payload: &[u8]) -> Result<Vec<u8>> {
    let total_len = HEADER_SIZE + payload.len();
    if total_len > MAX_MESSAGE_SIZE {
        return Err(SkirmishError::Encoding(format!(
            "Frame too large: {} bytes (max {})",
            total_len, MAX_MESSAGE_SIZE
        )));
    }

    let mut frame = Vec::with_capacity(total_len);
    frame.put_i32(total_len as i32);
    frame.put_i32(message_type);
    frame.put_slice(payload);

    Ok(frame)
}

/// Encode a message to bytes (its session id stays local)
pub fn encode_message(message: &Message) -> Result<Vec<u8>> {
    encode(message.message_type, &message.payload)
}

/// Decode a complete frame
///
/// Returns the type tag and a payload buffer independent of `bytes`.
pub fn decode(bytes: &[u8]) -> Result<(MessageType, Bytes)> {
    if bytes.len() < HEADER_SIZE {
        return Err(SkirmishError::Encoding(format!(
            "Incomplete header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let mut header = &bytes[..HEADER_SIZE];
    let declared = header.get_i32();
    let message_type = header.get_i32();

    let total_len = validate_declared_len(declared)?;
    if total_len != bytes.len() {
        return Err(SkirmishError::Encoding(format!(
            "Size mismatch: header declares {} bytes, received {}",
            total_len,
            bytes.len()
        )));
    }

    let payload = Bytes::copy_from_slice(&bytes[HEADER_SIZE..]);
    Ok((message_type, payload))
}

/// Check a declared total length against the header size and the maximum
fn validate_declared_len(declared: i32) -> Result<usize> {
    if declared < HEADER_SIZE as i32 {
        return Err(SkirmishError::Encoding(format!(
            "Declared frame size {} is smaller than the header",
            declared
        )));
    }

    let total_len = declared as usize;
    if total_len > MAX_MESSAGE_SIZE {
        return Err(SkirmishError::Encoding(format!(
            "Frame too large: {} bytes (max {})",
            total_len, MAX_MESSAGE_SIZE
        )));
    }

    Ok(total_len)
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a complete frame from a stream
///
/// Blocks until a complete frame is received or an error occurs
pub fn read_frame<R: Read>(reader: &mut R) -> Result<(MessageType, Bytes)> {
    // Read header first
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let mut fields = &header[..];
    let declared = fields.get_i32();
    let message_type = fields.get_i32();

    // Validate before allocating
    let total_len = validate_declared_len(declared)?;

    // Read payload
    let mut payload = vec![0u8; total_len - HEADER_SIZE];
    if !payload.is_empty() {
        reader.read_exact(&mut payload)?;
    }

    Ok((message_type, Bytes::from(payload)))
}

/// Write a frame to a stream
///
/// Nothing is written if the frame cannot be encoded.
pub fn write_frame<W: Write>(writer: &mut W, message_type: MessageType, payload: &[u8]) -> Result<()> {
    let bytes = encode(message_type, payload)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}
