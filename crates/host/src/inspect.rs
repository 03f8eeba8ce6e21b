//! Descriptor inspection
//!
//! Read-only queries on an open session, USBTMC interface discovery and the
//! topology report printed by `usbtmc info`.

use crate::backend::{UsbDevice, UsbHandle};
use crate::error::{HostError, Result};
use crate::session::OpenDeviceSession;
use common::{ConfigDescriptor, DeviceSummary, Direction, EndpointDescriptor, TransferType};
use serde::Serialize;
use std::fmt;
use tracing::warn;

impl<D: UsbDevice> OpenDeviceSession<'_, D> {
    /// Snapshot of the active configuration
    pub fn active_config(&self) -> Result<ConfigDescriptor> {
        self.handle()?;
        self.device
            .active_config_descriptor()
            .map_err(HostError::descriptor("active configuration descriptor"))
    }

    /// String descriptor `index` as ASCII
    ///
    /// Index 0 means the device provides no such string and yields `None`.
    pub fn read_string_descriptor(&self, index: u8) -> Result<Option<String>> {
        let handle = self.handle()?;
        if index == 0 {
            return Ok(None);
        }
        handle
            .read_string_descriptor_ascii(index)
            .map(Some)
            .map_err(HostError::descriptor(format!("string descriptor {}", index)))
    }

    /// Identity strings and topology of the device
    ///
    /// Unreadable strings and configuration are logged and left `None`.
    pub fn summary(&self) -> Result<DeviceSummary> {
        self.handle()?;

        let mut summary =
            DeviceSummary::from_descriptor(self.bus_number(), self.address(), &self.descriptor);
        summary.manufacturer = self.optional_string(self.descriptor.manufacturer_string_index)?;
        summary.product = self.optional_string(self.descriptor.product_string_index)?;
        summary.serial_number = self.optional_string(self.descriptor.serial_number_string_index)?;
        summary.config = match self.active_config() {
            Ok(config) => Some(config),
            Err(e) => {
                warn!("{}: {}", summary.id_string(), e);
                None
            }
        };

        Ok(summary)
    }

    fn optional_string(&self, index: u8) -> Result<Option<String>> {
        match self.read_string_descriptor(index) {
            Ok(value) => Ok(value),
            Err(HostError::SessionClosed) => Err(HostError::SessionClosed),
            Err(e) => {
                warn!(
                    "Device {:04x}:{:04x}: {}",
                    self.descriptor.vendor_id, self.descriptor.product_id, e
                );
                Ok(None)
            }
        }
    }

    /// The device's USBTMC interface
    pub fn tmc_interface(&self) -> Result<TmcInterface> {
        let config = self.active_config()?;
        find_tmc_interface(&config).ok_or(HostError::NoTmcInterface {
            vendor_id: self.descriptor.vendor_id,
            product_id: self.descriptor.product_id,
        })
    }
}

/// Endpoints of a USBTMC interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TmcInterface {
    pub interface: u8,
    pub alternate_setting: u8,
    /// Interface protocol also implements USB488
    pub usb488: bool,
    pub bulk_out: Option<u8>,
    pub bulk_in: Option<u8>,
    pub interrupt_in: Option<u8>,
}

impl TmcInterface {
    /// Bulk-OUT endpoint address, required for sending
    pub fn require_bulk_out(&self) -> Result<u8> {
        self.bulk_out.ok_or(HostError::NoBulkOutEndpoint {
            interface: self.interface,
        })
    }
}

/// First interface with class 0xFE / subclass 0x03
pub fn find_tmc_interface(config: &ConfigDescriptor) -> Option<TmcInterface> {
    let iface = config.interfaces.iter().find(|i| i.is_usbtmc())?;

    Some(TmcInterface {
        interface: iface.number,
        alternate_setting: iface.alternate_setting,
        usb488: iface.is_usb488(),
        bulk_out: iface.find_endpoint(EndpointDescriptor::is_bulk_out).map(|ep| ep.address),
        bulk_in: iface.find_endpoint(EndpointDescriptor::is_bulk_in).map(|ep| ep.address),
        interrupt_in: iface
            .find_endpoint(|ep| {
                ep.transfer_type() == TransferType::Interrupt && ep.direction() == Direction::In
            })
            .map(|ep| ep.address),
    })
}

/// Human-readable report of a device and its active configuration
pub fn render_topology(summary: &DeviceSummary) -> String {
    Topology(summary).to_string()
}

struct Topology<'a>(&'a DeviceSummary);

impl fmt::Display for Topology<'_> {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_topology(out, self.0)
    }
}

fn write_topology(out: &mut fmt::Formatter<'_>, summary: &DeviceSummary) -> fmt::Result {
    let text = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());

    writeln!(
        out,
        "{} {} S/N {} (ID {}, bus {} address {})",
        text(&summary.manufacturer),
        text(&summary.product),
        text(&summary.serial_number),
        summary.id_string(),
        summary.bus_number,
        summary.address
    )?;

    let Some(config) = &summary.config else {
        return writeln!(out, "=> No active configuration");
    };

    let count = config.num_interfaces();
    writeln!(out, "=> Configuration {}", config.number)?;
    writeln!(out, "=> Max Power = {} mA", config.max_power_ma)?;
    writeln!(
        out,
        "=> Found {} {}",
        count,
        if count == 1 { "interface" } else { "interfaces" }
    )?;

    for iface in &config.interfaces {
        writeln!(
            out,
            "=> Interface {} alt {}: {} endpoint(s), class {:#04x} subclass {:#04x} protocol {:#04x}{}",
            iface.number,
            iface.alternate_setting,
            iface.endpoints.len(),
            iface.class_code,
            iface.sub_class_code,
            iface.protocol_code,
            if iface.is_usb488() {
                " (USBTMC USB488)"
            } else if iface.is_usbtmc() {
                " (USBTMC)"
            } else {
                ""
            }
        )?;

        for (i, ep) in iface.endpoints.iter().enumerate() {
            writeln!(out, "   => Endpoint index {}:", i)?;
            writeln!(out, "     => Address: {:#04x} (b{:08b})", ep.address, ep.address)?;
            writeln!(out, "       => Endpoint #: {}", ep.number())?;
            writeln!(out, "       => Direction: {:?}", ep.direction())?;
            writeln!(
                out,
                "     => Attributes: {:#04x} (b{:08b})",
                ep.attributes, ep.attributes
            )?;
            writeln!(out, "       => Transfer Type: {:?}", ep.transfer_type())?;
            writeln!(out, "     => Max packet size: {}", ep.max_packet_size)?;
        }
    }

    Ok(())
}
