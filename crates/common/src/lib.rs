//! Common utilities for the USBTMC host crates
//!
//! Shared USB descriptor snapshots, device ID parsing, error handling and
//! logging setup.

pub mod error;
pub mod ids;
pub mod logging;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod usb_types;

pub use error::{Error, Result};
pub use ids::{parse_hex_id, parse_vid_pid};
pub use logging::setup_logging;
pub use usb_types::{
    ConfigDescriptor, DeviceDescriptor, DeviceSummary, Direction, EndpointDescriptor,
    InterfaceDescriptor, TransferType,
};
