//! USB host context, device enumeration and selection

use crate::backend::{RusbBackend, UsbBackend, UsbDevice};
use crate::error::{HostError, Result};
use crate::session::OpenDeviceSession;
use common::{DeviceDescriptor, DeviceSummary};
use std::fmt;
use tracing::{debug, warn};

/// Process-wide handle to a USB host stack
///
/// Sessions opened through it borrow it, so it cannot be dropped while a
/// device is still open.
pub struct UsbHost<B: UsbBackend = RusbBackend> {
    backend: B,
}

impl UsbHost<RusbBackend> {
    /// Initialize libusb
    pub fn new() -> Result<Self> {
        let backend = RusbBackend::new().map_err(HostError::host_stack("context initialization"))?;
        debug!("USB host context initialized");
        Ok(Self::with_backend(backend))
    }
}

impl<B: UsbBackend> UsbHost<B> {
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Enumerate attached devices
    ///
    /// Devices whose descriptor cannot be read are logged and skipped. The
    /// order is whatever the host stack reports.
    pub fn list_devices(&self) -> Result<Vec<DeviceEntry<B::Device>>> {
        let devices = self
            .backend
            .devices()
            .map_err(HostError::host_stack("device enumeration"))?;

        let mut entries = Vec::with_capacity(devices.len());
        for device in devices {
            match device.device_descriptor() {
                Ok(descriptor) => entries.push(DeviceEntry { device, descriptor }),
                Err(e) => warn!(
                    "Skipping device at bus {} address {}: {}",
                    device.bus_number(),
                    device.address(),
                    e
                ),
            }
        }

        debug!("Enumerated {} devices", entries.len());
        Ok(entries)
    }

    /// Open an enumerated device
    pub fn open(&self, entry: DeviceEntry<B::Device>) -> Result<OpenDeviceSession<'_, B::Device>> {
        let DeviceEntry { device, descriptor } = entry;
        let handle = device.open().map_err(|source| {
            warn!("Failed to open device {}: {}", descriptor_id(&descriptor), source);
            HostError::OpenFailed {
                vendor_id: descriptor.vendor_id,
                product_id: descriptor.product_id,
                source,
            }
        })?;

        Ok(OpenDeviceSession::new(device, handle, descriptor))
    }

    /// Open the first device carrying both IDs
    pub fn open_by_vendor_product(
        &self,
        vendor_id: u16,
        product_id: u16,
    ) -> Result<OpenDeviceSession<'_, B::Device>> {
        let entry = self
            .list_devices()?
            .into_iter()
            .find(|entry| entry.descriptor.matches(vendor_id, product_id))
            .ok_or(HostError::DeviceNotFound {
                vendor_id,
                product_id,
            })?;

        self.open(entry)
    }

    /// Summarize every attached device
    ///
    /// Each device is opened just long enough to read its strings. Devices
    /// that cannot be opened are still reported, without strings.
    pub fn describe_all(&self) -> Result<Vec<DeviceSummary>> {
        let entries = self.list_devices()?;
        let mut summaries = Vec::with_capacity(entries.len());

        for entry in entries {
            let fallback = entry.summary_without_strings();
            match self.open(entry) {
                Ok(session) => summaries.push(session.summary()?),
                Err(e) => {
                    debug!("Listing {} without strings: {}", fallback.id_string(), e);
                    summaries.push(fallback);
                }
            }
        }

        Ok(summaries)
    }
}

impl<B: UsbBackend> fmt::Debug for UsbHost<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsbHost").finish_non_exhaustive()
    }
}

/// One enumerated, unopened device
pub struct DeviceEntry<D: UsbDevice> {
    device: D,
    descriptor: DeviceDescriptor,
}

impl<D: UsbDevice> DeviceEntry<D> {
    pub fn bus_number(&self) -> u8 {
        self.device.bus_number()
    }

    pub fn address(&self) -> u8 {
        self.device.address()
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn vendor_id(&self) -> u16 {
        self.descriptor.vendor_id
    }

    pub fn product_id(&self) -> u16 {
        self.descriptor.product_id
    }

    /// Summary from the descriptors alone; needs no open handle
    ///
    /// An unreadable configuration is logged and left `None`.
    pub fn summary_without_strings(&self) -> DeviceSummary {
        let mut summary =
            DeviceSummary::from_descriptor(self.bus_number(), self.address(), &self.descriptor);
        summary.config = match self.device.active_config_descriptor() {
            Ok(config) => Some(config),
            Err(e) => {
                warn!("{}: {}", summary.id_string(), e);
                None
            }
        };
        summary
    }
}

impl<D: UsbDevice> fmt::Debug for DeviceEntry<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceEntry")
            .field("bus_number", &self.bus_number())
            .field("address", &self.address())
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

fn descriptor_id(descriptor: &DeviceDescriptor) -> String {
    format!("{:04x}:{:04x}", descriptor.vendor_id, descriptor.product_id)
}
