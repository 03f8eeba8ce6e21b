//! USB descriptor snapshots
//!
//! Plain-data copies of the descriptors read from a device. They are
//! independent of the host stack that produced them, so they can be
//! inspected, printed and serialized after the device handle is gone.
//!
//! Endpoint number, direction and transfer type are always derived from
//! the raw `bEndpointAddress` / `bmAttributes` bytes on demand.

use protocol::constants::class;
use serde::{Deserialize, Serialize};

/// Endpoint direction bit of `bEndpointAddress`
pub const ENDPOINT_DIRECTION_MASK: u8 = 0x80;

/// Endpoint number bits of `bEndpointAddress`
pub const ENDPOINT_NUMBER_MASK: u8 = 0x7F;

/// Transfer type bits of `bmAttributes`
pub const TRANSFER_TYPE_MASK: u8 = 0x03;

/// Endpoint data direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Device to host
    In,
    /// Host to device
    Out,
}

impl Direction {
    /// Direction encoded in an endpoint address
    pub fn from_address(address: u8) -> Self {
        if address & ENDPOINT_DIRECTION_MASK != 0 {
            Direction::In
        } else {
            Direction::Out
        }
    }
}

/// Endpoint transfer type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferType {
    Control,
    Isochronous,
    Bulk,
    Interrupt,
}

impl TransferType {
    /// Transfer type encoded in `bmAttributes`
    pub fn from_attributes(attributes: u8) -> Self {
        match attributes & TRANSFER_TYPE_MASK {
            0 => TransferType::Control,
            1 => TransferType::Isochronous,
            2 => TransferType::Bulk,
            _ => TransferType::Interrupt,
        }
    }
}

/// Endpoint descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    /// Raw `bEndpointAddress`
    pub address: u8,
    /// Raw `bmAttributes`
    pub attributes: u8,
    /// `wMaxPacketSize`
    pub max_packet_size: u16,
}

impl EndpointDescriptor {
    pub fn new(address: u8, attributes: u8, max_packet_size: u16) -> Self {
        Self {
            address,
            attributes,
            max_packet_size,
        }
    }

    /// Endpoint number (address bits 0..7)
    pub fn number(&self) -> u8 {
        self.address & ENDPOINT_NUMBER_MASK
    }

    pub fn direction(&self) -> Direction {
        Direction::from_address(self.address)
    }

    pub fn transfer_type(&self) -> TransferType {
        TransferType::from_attributes(self.attributes)
    }

    /// True for a host-to-device bulk endpoint
    pub fn is_bulk_out(&self) -> bool {
        self.transfer_type() == TransferType::Bulk && self.direction() == Direction::Out
    }

    /// True for a device-to-host bulk endpoint
    pub fn is_bulk_in(&self) -> bool {
        self.transfer_type() == TransferType::Bulk && self.direction() == Direction::In
    }
}

/// One alternate setting of an interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceDescriptor {
    /// `bInterfaceNumber`
    pub number: u8,
    /// `bAlternateSetting`
    pub alternate_setting: u8,
    pub class_code: u8,
    pub sub_class_code: u8,
    pub protocol_code: u8,
    /// Endpoints in descriptor order
    pub endpoints: Vec<EndpointDescriptor>,
}

impl InterfaceDescriptor {
    /// Whether this interface speaks USBTMC (class 0xFE, subclass 0x03)
    pub fn is_usbtmc(&self) -> bool {
        self.class_code == class::APPLICATION_SPECIFIC
            && self.sub_class_code == class::USBTMC_SUBCLASS
    }

    /// Whether this interface also implements the USB488 subclass
    pub fn is_usb488(&self) -> bool {
        self.is_usbtmc() && self.protocol_code == class::PROTOCOL_USB488
    }

    /// First endpoint matching `predicate`
    pub fn find_endpoint(
        &self,
        predicate: impl Fn(&EndpointDescriptor) -> bool,
    ) -> Option<&EndpointDescriptor> {
        self.endpoints.iter().find(|&ep| predicate(ep))
    }
}

/// Configuration descriptor snapshot
///
/// `interfaces` holds every alternate setting in descriptor order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigDescriptor {
    /// `bConfigurationValue`
    pub number: u8,
    /// Maximum power draw in milliamps
    pub max_power_ma: u16,
    pub interfaces: Vec<InterfaceDescriptor>,
}

impl ConfigDescriptor {
    /// Number of distinct interface numbers
    pub fn num_interfaces(&self) -> usize {
        let mut numbers: Vec<u8> = self.interfaces.iter().map(|i| i.number).collect();
        numbers.sort_unstable();
        numbers.dedup();
        numbers.len()
    }

    /// Alternate settings of interface `number`
    pub fn alt_settings(&self, number: u8) -> impl Iterator<Item = &InterfaceDescriptor> {
        self.interfaces.iter().filter(move |i| i.number == number)
    }
}

/// Device descriptor snapshot
///
/// String indexes of 0 mean the device provides no such string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub vendor_id: u16,
    pub product_id: u16,
    pub class_code: u8,
    pub sub_class_code: u8,
    pub protocol_code: u8,
    /// USB specification release (major, minor, sub-minor)
    pub usb_version: (u8, u8, u8),
    pub manufacturer_string_index: u8,
    pub product_string_index: u8,
    pub serial_number_string_index: u8,
    pub num_configurations: u8,
}

impl DeviceDescriptor {
    /// True if the descriptor carries the given vendor/product pair
    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id == vendor_id && self.product_id == product_id
    }
}

/// What a device scan reports about one device
///
/// String fields and the configuration are `None` when they could not be
/// read (device not openable, descriptor error, or absent string).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub bus_number: u8,
    pub address: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub class_code: u8,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    pub config: Option<ConfigDescriptor>,
}

impl DeviceSummary {
    /// Summary carrying only what the device descriptor provides
    pub fn from_descriptor(bus_number: u8, address: u8, descriptor: &DeviceDescriptor) -> Self {
        Self {
            bus_number,
            address,
            vendor_id: descriptor.vendor_id,
            product_id: descriptor.product_id,
            class_code: descriptor.class_code,
            manufacturer: None,
            product: None,
            serial_number: None,
            config: None,
        }
    }

    /// `VID:PID` in lowercase hex
    pub fn id_string(&self) -> String {
        format!("{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_fields_are_derived() {
        let ep = EndpointDescriptor::new(0x82, 0x02, 512);
        assert_eq!(ep.number(), 2);
        assert_eq!(ep.direction(), Direction::In);
        assert_eq!(ep.transfer_type(), TransferType::Bulk);
        assert!(ep.is_bulk_in());
        assert!(!ep.is_bulk_out());
    }

    #[test]
    fn test_transfer_type_ignores_upper_bits() {
        // Isochronous with sync/usage bits set
        assert_eq!(TransferType::from_attributes(0x0D), TransferType::Isochronous);
        assert_eq!(TransferType::from_attributes(0x03), TransferType::Interrupt);
        assert_eq!(TransferType::from_attributes(0x00), TransferType::Control);
    }

    #[test]
    fn test_direction_from_address() {
        assert_eq!(Direction::from_address(0x01), Direction::Out);
        assert_eq!(Direction::from_address(0x81), Direction::In);
        assert_eq!(Direction::from_address(0x7F), Direction::Out);
    }

    #[test]
    fn test_num_interfaces_counts_distinct_numbers() {
        let iface = |number, alt| InterfaceDescriptor {
            number,
            alternate_setting: alt,
            class_code: 0xFF,
            sub_class_code: 0,
            protocol_code: 0,
            endpoints: Vec::new(),
        };
        let config = ConfigDescriptor {
            number: 1,
            max_power_ma: 100,
            interfaces: vec![iface(0, 0), iface(0, 1), iface(1, 0)],
        };
        assert_eq!(config.num_interfaces(), 2);
        assert_eq!(config.alt_settings(0).count(), 2);
    }
}
