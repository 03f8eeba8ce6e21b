//! Protocol error types

use thiserror::Error;

/// USBTMC framing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Payload length does not fit the 32-bit TransferSize field
    #[error("Transfer too large: {size} bytes (max: {max})")]
    TransferTooLarge { size: usize, max: u64 },

    /// TransferSize must be greater than zero
    #[error("Empty payload: USBTMC transfers must carry at least one byte")]
    EmptyPayload,

    /// Chunk size of zero requested when splitting a message
    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(usize),

    /// Header buffer has the wrong length
    #[error("Invalid header length: expected {expected} bytes, got {actual}")]
    InvalidHeaderLength { expected: usize, actual: usize },

    /// MsgID byte is not one this crate can frame
    #[error("Unknown MsgID: {0:#04x}")]
    UnknownMsgId(u8),

    /// bTagInverse is not the complement of bTag
    #[error("Tag mismatch: bTag {tag:#04x}, bTagInverse {inverse:#04x}")]
    TagMismatch { tag: u8, inverse: u8 },

    /// A reserved header byte is not zero
    #[error("Reserved byte at offset {offset} is {value:#04x}, expected 0x00")]
    ReservedNotZero { offset: usize, value: u8 },

    /// bmTransferAttributes has bits set other than EOM
    #[error("Invalid bmTransferAttributes: {0:#04x}")]
    InvalidAttributes(u8),
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;
