//! USBTMC message framing
//!
//! A framed transfer is the Bulk-OUT header, the payload, and zero padding
//! up to the next multiple of four bytes:
//!
//! ```text
//! [Header: 12 bytes][Payload: TransferSize bytes][Padding: 0-3 zero bytes]
//! ```

use crate::constants::{ALIGNMENT, HEADER_SIZE, RESERVED, TERMINATOR};
use crate::error::{ProtocolError, Result};
use crate::header::{MsgId, encode_bulk_out_header};
use crate::tag::TagSequence;
use bytes::{BufMut, Bytes, BytesMut};

/// Number of zero bytes needed to align `len` to a multiple of four
#[inline]
pub const fn padding_len(len: usize) -> usize {
    (ALIGNMENT - len % ALIGNMENT) % ALIGNMENT
}

/// Frame a raw payload as one DEV_DEP_MSG_OUT transfer
///
/// The payload is copied verbatim; no terminator is added.
pub fn frame_payload(payload: &[u8], tag: u8, end_of_message: bool) -> Result<Bytes> {
    if payload.is_empty() {
        return Err(ProtocolError::EmptyPayload);
    }

    let transfer_size =
        u32::try_from(payload.len()).map_err(|_| ProtocolError::TransferTooLarge {
            size: payload.len(),
            max: u32::MAX as u64,
        })?;

    let unpadded = HEADER_SIZE + payload.len();
    let padding = padding_len(unpadded);

    let mut frame = BytesMut::with_capacity(unpadded + padding);
    frame.put_slice(&encode_bulk_out_header(
        MsgId::DevDepMsgOut,
        tag,
        transfer_size,
        end_of_message,
    ));
    frame.put_slice(payload);
    frame.put_bytes(RESERVED, padding);

    Ok(frame.freeze())
}

/// Frame an instrument command
///
/// Appends the newline terminator and sends the whole command in a single
/// transfer with EOM set.
///
/// # Example
/// ```
/// use protocol::build_framed_message;
///
/// let framed = build_framed_message("*IDN?", 1).unwrap();
/// assert_eq!(&framed[..4], &[0x01, 0x01, 0xFE, 0x00]);
/// assert_eq!(framed[4], 6); // "*IDN?\n"
/// assert_eq!(framed.len() % 4, 0);
/// ```
pub fn build_framed_message(command: &str, tag: u8) -> Result<Bytes> {
    let mut payload = Vec::with_capacity(command.len() + 1);
    payload.extend_from_slice(command.as_bytes());
    payload.push(TERMINATOR);
    frame_payload(&payload, tag, true)
}

/// Split a message across several transfers
///
/// Each chunk carries at most `max_payload` bytes, takes its own tag from
/// `tags`, and is padded independently. Only the final chunk has EOM set.
pub fn frame_message_chunks(
    payload: &[u8],
    tags: &mut TagSequence,
    max_payload: usize,
) -> Result<Vec<Bytes>> {
    if max_payload == 0 {
        return Err(ProtocolError::InvalidChunkSize(max_payload));
    }
    if payload.is_empty() {
        return Err(ProtocolError::EmptyPayload);
    }

    let count = payload.len().div_ceil(max_payload);
    payload
        .chunks(max_payload)
        .enumerate()
        .map(|(i, chunk)| frame_payload(chunk, tags.next_tag(), i + 1 == count))
        .collect()
}
