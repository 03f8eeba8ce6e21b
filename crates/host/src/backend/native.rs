//! libusb backend via `rusb`

use super::{UsbBackend, UsbDevice, UsbHandle};
use common::{ConfigDescriptor, DeviceDescriptor, EndpointDescriptor, InterfaceDescriptor};
use rusb::{Context, Device, DeviceHandle, SyncType, UsageType, UsbContext};
use std::time::Duration;

/// Host stack backed by a dedicated libusb context
///
/// Dropping the backend releases the context once every device and handle
/// created from it is gone.
pub struct RusbBackend {
    context: Context,
}

impl RusbBackend {
    /// Create a new libusb context
    pub fn new() -> rusb::Result<Self> {
        Ok(Self {
            context: Context::new()?,
        })
    }
}

impl UsbBackend for RusbBackend {
    type Device = RusbDevice;

    fn devices(&self) -> rusb::Result<Vec<RusbDevice>> {
        Ok(self.context.devices()?.iter().map(RusbDevice).collect())
    }
}

/// libusb version string, e.g. `1.0.27.11882`
pub fn libusb_version() -> String {
    let version = rusb::version();
    format!(
        "{}.{}.{}.{}{}",
        version.major(),
        version.minor(),
        version.micro(),
        version.nano(),
        version.rc().unwrap_or("")
    )
}

/// Enumerated libusb device
pub struct RusbDevice(Device<Context>);

impl UsbDevice for RusbDevice {
    type Handle = RusbHandle;

    fn bus_number(&self) -> u8 {
        self.0.bus_number()
    }

    fn address(&self) -> u8 {
        self.0.address()
    }

    fn device_descriptor(&self) -> rusb::Result<DeviceDescriptor> {
        let desc = self.0.device_descriptor()?;
        let version = desc.usb_version();

        Ok(DeviceDescriptor {
            vendor_id: desc.vendor_id(),
            product_id: desc.product_id(),
            class_code: desc.class_code(),
            sub_class_code: desc.sub_class_code(),
            protocol_code: desc.protocol_code(),
            usb_version: (version.major(), version.minor(), version.sub_minor()),
            manufacturer_string_index: desc.manufacturer_string_index().unwrap_or(0),
            product_string_index: desc.product_string_index().unwrap_or(0),
            serial_number_string_index: desc.serial_number_string_index().unwrap_or(0),
            num_configurations: desc.num_configurations(),
        })
    }

    fn active_config_descriptor(&self) -> rusb::Result<ConfigDescriptor> {
        let config = self.0.active_config_descriptor()?;

        let mut interfaces = Vec::new();
        for interface in config.interfaces() {
            for desc in interface.descriptors() {
                interfaces.push(InterfaceDescriptor {
                    number: desc.interface_number(),
                    alternate_setting: desc.setting_number(),
                    class_code: desc.class_code(),
                    sub_class_code: desc.sub_class_code(),
                    protocol_code: desc.protocol_code(),
                    endpoints: desc
                        .endpoint_descriptors()
                        .map(|ep| {
                            EndpointDescriptor::new(
                                ep.address(),
                                raw_attributes(&ep),
                                ep.max_packet_size(),
                            )
                        })
                        .collect(),
                });
            }
        }

        Ok(ConfigDescriptor {
            number: config.number(),
            max_power_ma: config.max_power(),
            interfaces,
        })
    }

    fn open(&self) -> rusb::Result<RusbHandle> {
        Ok(RusbHandle(self.0.open()?))
    }
}

/// Rebuild `bmAttributes` from the fields rusb decodes it into
fn raw_attributes(ep: &rusb::EndpointDescriptor) -> u8 {
    let transfer = match ep.transfer_type() {
        rusb::TransferType::Control => 0,
        rusb::TransferType::Isochronous => 1,
        rusb::TransferType::Bulk => 2,
        rusb::TransferType::Interrupt => 3,
    };
    let sync = match ep.sync_type() {
        SyncType::NoSync => 0,
        SyncType::Asynchronous => 1,
        SyncType::Adaptive => 2,
        SyncType::Synchronous => 3,
    };
    let usage = match ep.usage_type() {
        UsageType::Data => 0,
        UsageType::Feedback => 1,
        UsageType::FeedbackData => 2,
        UsageType::Reserved => 3,
    };
    transfer | (sync << 2) | (usage << 4)
}

/// Open libusb device handle; closed on drop
pub struct RusbHandle(DeviceHandle<Context>);

impl UsbHandle for RusbHandle {
    fn set_auto_detach_kernel_driver(&mut self, enable: bool) -> rusb::Result<()> {
        self.0.set_auto_detach_kernel_driver(enable)
    }

    fn claim_interface(&mut self, interface: u8) -> rusb::Result<()> {
        self.0.claim_interface(interface)
    }

    fn release_interface(&mut self, interface: u8) -> rusb::Result<()> {
        self.0.release_interface(interface)
    }

    fn write_bulk(&self, endpoint: u8, data: &[u8], timeout: Duration) -> rusb::Result<usize> {
        self.0.write_bulk(endpoint, data, timeout)
    }

    fn read_string_descriptor_ascii(&self, index: u8) -> rusb::Result<String> {
        self.0.read_string_descriptor_ascii(index)
    }
}
