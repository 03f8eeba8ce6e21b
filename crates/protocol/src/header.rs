//! USBTMC Bulk-OUT header encoding
//!
//! # Layout
//!
//! ```text
//! offset  size  field
//! 0       1     MsgID
//! 1       1     bTag
//! 2       1     bTagInverse (bTag ^ 0xFF)
//! 3       1     reserved (0x00)
//! 4       4     TransferSize (little-endian, payload bytes only)
//! 8       1     bmTransferAttributes (bit 0 = EOM)
//! 9       3     reserved (0x00)
//! ```

use crate::constants::{
    ATTRIBUTES_OFFSET, EOM_BIT, HEADER_SIZE, RESERVED, TAG_INVERSE_MASK, TRANSFER_SIZE_OFFSET,
};
use crate::error::{ProtocolError, Result};
use byteorder::{ByteOrder, LittleEndian};

/// Bulk-OUT message identifiers this crate can frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MsgId {
    /// DEV_DEP_MSG_OUT: device-dependent command message
    DevDepMsgOut = 1,
}

impl MsgId {
    /// Raw MsgID byte
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MsgId {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(MsgId::DevDepMsgOut),
            other => Err(ProtocolError::UnknownMsgId(other)),
        }
    }
}

/// Bitwise complement of a bTag, written as bTagInverse
#[inline]
pub const fn inverse_tag(tag: u8) -> u8 {
    tag ^ TAG_INVERSE_MASK
}

/// Encode a Bulk-OUT header
///
/// Callers must pass the exact payload length as `transfer_size`; USBTMC
/// requires it to be non-zero, which is not checked here.
///
/// # Example
/// ```
/// use protocol::{MsgId, encode_bulk_out_header};
///
/// let header = encode_bulk_out_header(MsgId::DevDepMsgOut, 1, 4, true);
/// assert_eq!(header, [0x01, 0x01, 0xFE, 0x00, 0x04, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00]);
/// ```
pub fn encode_bulk_out_header(
    msg_id: MsgId,
    tag: u8,
    transfer_size: u32,
    end_of_message: bool,
) -> [u8; HEADER_SIZE] {
    let mut header = [RESERVED; HEADER_SIZE];
    header[0] = msg_id.as_u8();
    header[1] = tag;
    header[2] = inverse_tag(tag);
    LittleEndian::write_u32(
        &mut header[TRANSFER_SIZE_OFFSET..TRANSFER_SIZE_OFFSET + 4],
        transfer_size,
    );
    header[ATTRIBUTES_OFFSET] = if end_of_message { EOM_BIT } else { RESERVED };
    header
}

/// Decoded Bulk-OUT header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkOutHeader {
    pub msg_id: MsgId,
    pub tag: u8,
    pub transfer_size: u32,
    pub end_of_message: bool,
}

impl BulkOutHeader {
    /// Header for a device-dependent command message
    pub fn dev_dep_msg_out(tag: u8, transfer_size: u32, end_of_message: bool) -> Self {
        Self {
            msg_id: MsgId::DevDepMsgOut,
            tag,
            transfer_size,
            end_of_message,
        }
    }

    /// bTagInverse as it appears on the wire
    pub fn tag_inverse(&self) -> u8 {
        inverse_tag(self.tag)
    }

    /// Encode to the 12-byte wire form
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        encode_bulk_out_header(
            self.msg_id,
            self.tag,
            self.transfer_size,
            self.end_of_message,
        )
    }

    /// Decode and validate a header
    ///
    /// `bytes` must be exactly [`HEADER_SIZE`] long. Rejects unknown MsgIDs,
    /// a bTagInverse that does not match bTag, non-zero reserved bytes and
    /// attribute bits other than EOM.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != HEADER_SIZE {
            return Err(ProtocolError::InvalidHeaderLength {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let msg_id = MsgId::try_from(bytes[0])?;
        let tag = bytes[1];
        if bytes[2] != inverse_tag(tag) {
            return Err(ProtocolError::TagMismatch {
                tag,
                inverse: bytes[2],
            });
        }

        for offset in [3, 9, 10, 11] {
            if bytes[offset] != RESERVED {
                return Err(ProtocolError::ReservedNotZero {
                    offset,
                    value: bytes[offset],
                });
            }
        }

        let attributes = bytes[ATTRIBUTES_OFFSET];
        if attributes & !EOM_BIT != 0 {
            return Err(ProtocolError::InvalidAttributes(attributes));
        }

        Ok(Self {
            msg_id,
            tag,
            transfer_size: LittleEndian::read_u32(
                &bytes[TRANSFER_SIZE_OFFSET..TRANSFER_SIZE_OFFSET + 4],
            ),
            end_of_message: attributes & EOM_BIT != 0,
        })
    }
}
