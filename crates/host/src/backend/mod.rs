//! USB host stack abstraction
//!
//! The session layer talks to the host stack only through these traits.
//! [`native`] implements them over libusb via `rusb`. With the `mock`
//! feature, `mock` provides an in-memory bus for tests.
//!
//! All methods block until the stack answers. Errors are reported in the
//! stack's own vocabulary ([`rusb::Error`]) and wrapped with context by the
//! caller.

use common::{ConfigDescriptor, DeviceDescriptor};
use std::time::Duration;

#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod native;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockBackend, MockDevice};
pub use native::RusbBackend;

/// A USB host stack able to enumerate devices
pub trait UsbBackend {
    type Device: UsbDevice;

    /// Snapshot of the devices attached right now
    fn devices(&self) -> rusb::Result<Vec<Self::Device>>;
}

/// An enumerated, unopened device
pub trait UsbDevice {
    type Handle: UsbHandle;

    fn bus_number(&self) -> u8;

    fn address(&self) -> u8;

    fn device_descriptor(&self) -> rusb::Result<DeviceDescriptor>;

    fn active_config_descriptor(&self) -> rusb::Result<ConfigDescriptor>;

    /// Open the device; dropping the handle closes it
    fn open(&self) -> rusb::Result<Self::Handle>;
}

/// An open device handle
pub trait UsbHandle {
    /// Let the stack detach and reattach kernel drivers around claims
    fn set_auto_detach_kernel_driver(&mut self, enable: bool) -> rusb::Result<()>;

    fn claim_interface(&mut self, interface: u8) -> rusb::Result<()>;

    fn release_interface(&mut self, interface: u8) -> rusb::Result<()>;

    /// One blocking bulk OUT transfer; returns the bytes written
    fn write_bulk(&self, endpoint: u8, data: &[u8], timeout: Duration) -> rusb::Result<usize>;

    /// String descriptor `index` in the device's first language, as ASCII
    fn read_string_descriptor_ascii(&self, index: u8) -> rusb::Result<String>;
}
