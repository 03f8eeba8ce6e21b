//! USBTMC wire constants
//!
//! Every fixed value of the Bulk-OUT header is defined here and nowhere else.

/// Size in bytes of a USBTMC Bulk-OUT header
pub const HEADER_SIZE: usize = 12;

/// Framed transfers are padded to a multiple of this many bytes
pub const ALIGNMENT: usize = 4;

/// Value of every reserved header byte
pub const RESERVED: u8 = 0x00;

/// XOR mask producing bTagInverse from bTag
pub const TAG_INVERSE_MASK: u8 = 0xFF;

/// bmTransferAttributes bit 0: last byte of the transfer ends the message
pub const EOM_BIT: u8 = 0x01;

/// Terminator appended to every command
pub const TERMINATOR: u8 = b'\n';

/// Offset of the TransferSize field inside the header
pub(crate) const TRANSFER_SIZE_OFFSET: usize = 4;

/// Offset of bmTransferAttributes inside the header
pub(crate) const ATTRIBUTES_OFFSET: usize = 8;

/// Interface class codes identifying a USBTMC interface
pub mod class {
    /// Application-specific interface class
    pub const APPLICATION_SPECIFIC: u8 = 0xFE;
    /// USBTMC subclass
    pub const USBTMC_SUBCLASS: u8 = 0x03;
    /// Plain USBTMC interface protocol
    pub const PROTOCOL_USBTMC: u8 = 0x00;
    /// USB488 subclass protocol
    pub const PROTOCOL_USB488: u8 = 0x01;
}
