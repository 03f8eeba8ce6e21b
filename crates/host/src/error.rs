//! Host-side error types
//!
//! Every low-level [`rusb::Error`] is wrapped with the operation and the
//! device or endpoint it concerns before it leaves this crate.

use protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    /// Context-level or platform failure
    #[error("USB host stack error during {op}: {source}")]
    HostStack {
        op: &'static str,
        #[source]
        source: rusb::Error,
    },

    /// No attached device carries the requested IDs
    #[error("No device found with ID {vendor_id:04x}:{product_id:04x}")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    /// Matching device exists but could not be opened
    #[error("Failed to open device {vendor_id:04x}:{product_id:04x}: {source}")]
    OpenFailed {
        vendor_id: u16,
        product_id: u16,
        #[source]
        source: rusb::Error,
    },

    /// Another claimant holds the interface
    #[error("Interface {interface} is busy")]
    InterfaceBusy { interface: u8 },

    /// Descriptor could not be read or was malformed
    #[error("Failed to read {what}: {source}")]
    DescriptorRead {
        what: String,
        #[source]
        source: rusb::Error,
    },

    /// Transfer did not complete before the timeout
    #[error("Transfer to endpoint {endpoint:#04x} timed out after {timeout_ms} ms")]
    TransferTimeout { endpoint: u8, timeout_ms: u64 },

    /// Transfer failed for any other reason
    #[error("Transfer to endpoint {endpoint:#04x} failed: {source}")]
    Transfer {
        endpoint: u8,
        #[source]
        source: rusb::Error,
    },

    /// Session was closed; only `state()` remains valid
    #[error("Device session is closed")]
    SessionClosed,

    /// Active configuration has no USBTMC interface
    #[error("Device {vendor_id:04x}:{product_id:04x} has no USBTMC interface")]
    NoTmcInterface { vendor_id: u16, product_id: u16 },

    /// Interface has no Bulk-OUT endpoint to send on
    #[error("Interface {interface} has no Bulk-OUT endpoint")]
    NoBulkOutEndpoint { interface: u8 },

    /// bTag 0 is reserved
    #[error("Invalid bTag {0}: must be between 1 and 255")]
    InvalidTag(u8),

    /// Command payload exceeds the configured transfer limit
    #[error("Command payload of {size} bytes exceeds max_transfer_size {max}")]
    PayloadTooLarge { size: usize, max: usize },

    /// Device accepted fewer bytes than were framed
    #[error("Short write to endpoint {endpoint:#04x}: device accepted {written} of {expected} bytes")]
    ShortWrite {
        endpoint: u8,
        written: usize,
        expected: usize,
    },

    /// Framing failed
    #[error("Framing error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl HostError {
    pub(crate) fn host_stack(op: &'static str) -> impl FnOnce(rusb::Error) -> Self {
        move |source| HostError::HostStack { op, source }
    }

    pub(crate) fn descriptor(what: impl Into<String>) -> impl FnOnce(rusb::Error) -> Self {
        let what = what.into();
        move |source| HostError::DescriptorRead { what, source }
    }

    /// Whether retrying the same operation may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            HostError::DeviceNotFound { .. }
                | HostError::OpenFailed { .. }
                | HostError::InterfaceBusy { .. }
                | HostError::TransferTimeout { .. }
        )
    }
}

/// Type alias for host results
pub type Result<T> = std::result::Result<T, HostError>;
