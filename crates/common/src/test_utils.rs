//! Test utilities for the USBTMC host crates
//!
//! Descriptor fixtures shaped like real instruments, shared by unit and
//! integration tests across crates.
//!
//! # Example
//!
//! ```
//! use common::test_utils::{create_mock_device_descriptor, create_mock_tmc_config};
//!
//! let desc = create_mock_device_descriptor(0x0957, 0x0407);
//! assert_eq!(desc.vendor_id, 0x0957);
//!
//! let config = create_mock_tmc_config();
//! assert!(config.interfaces[0].is_usbtmc());
//! ```

use crate::usb_types::{ConfigDescriptor, DeviceDescriptor, EndpointDescriptor, InterfaceDescriptor};
use protocol::constants::class;

/// Bulk-OUT endpoint address used by [`create_mock_tmc_config`]
pub const MOCK_BULK_OUT: u8 = 0x02;
/// Bulk-IN endpoint address used by [`create_mock_tmc_config`]
pub const MOCK_BULK_IN: u8 = 0x86;
/// Interrupt-IN endpoint address used by [`create_mock_tmc_config`]
pub const MOCK_INTERRUPT_IN: u8 = 0x87;

/// Create a device descriptor with manufacturer/product/serial strings at
/// indexes 1, 2 and 3
pub fn create_mock_device_descriptor(vendor_id: u16, product_id: u16) -> DeviceDescriptor {
    DeviceDescriptor {
        vendor_id,
        product_id,
        class_code: 0x00,
        sub_class_code: 0x00,
        protocol_code: 0x00,
        usb_version: (2, 0, 0),
        manufacturer_string_index: 1,
        product_string_index: 2,
        serial_number_string_index: 3,
        num_configurations: 1,
    }
}

/// Create a device descriptor that provides no strings
pub fn create_mock_device_descriptor_without_strings(
    vendor_id: u16,
    product_id: u16,
) -> DeviceDescriptor {
    DeviceDescriptor {
        manufacturer_string_index: 0,
        product_string_index: 0,
        serial_number_string_index: 0,
        ..create_mock_device_descriptor(vendor_id, product_id)
    }
}

/// Create an interface descriptor
pub fn create_mock_interface(
    number: u8,
    class_code: u8,
    sub_class_code: u8,
    protocol_code: u8,
    endpoints: Vec<EndpointDescriptor>,
) -> InterfaceDescriptor {
    InterfaceDescriptor {
        number,
        alternate_setting: 0,
        class_code,
        sub_class_code,
        protocol_code,
        endpoints,
    }
}

/// Create a USB488 instrument configuration
///
/// One interface (0) with Bulk-OUT [`MOCK_BULK_OUT`], Bulk-IN
/// [`MOCK_BULK_IN`] and Interrupt-IN [`MOCK_INTERRUPT_IN`].
pub fn create_mock_tmc_config() -> ConfigDescriptor {
    ConfigDescriptor {
        number: 1,
        max_power_ma: 100,
        interfaces: vec![create_mock_interface(
            0,
            class::APPLICATION_SPECIFIC,
            class::USBTMC_SUBCLASS,
            class::PROTOCOL_USB488,
            vec![
                EndpointDescriptor::new(MOCK_BULK_OUT, 0x02, 512),
                EndpointDescriptor::new(MOCK_BULK_IN, 0x02, 512),
                EndpointDescriptor::new(MOCK_INTERRUPT_IN, 0x03, 2),
            ],
        )],
    }
}

/// Create a HID-only configuration with no USBTMC interface
pub fn create_mock_hid_config() -> ConfigDescriptor {
    ConfigDescriptor {
        number: 1,
        max_power_ma: 98,
        interfaces: vec![create_mock_interface(
            0,
            0x03,
            0x01,
            0x02,
            vec![EndpointDescriptor::new(0x81, 0x03, 8)],
        )],
    }
}
