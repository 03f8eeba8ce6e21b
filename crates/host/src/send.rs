//! One-shot command delivery
//!
//! Opens a device, picks the interface and its Bulk-OUT endpoint, sends one
//! framed command and closes the device again. This is the flow behind
//! `usbtmc send`.

use crate::backend::UsbBackend;
use crate::config::HostConfig;
use crate::context::UsbHost;
use crate::error::{HostError, Result};
use crate::inspect::find_tmc_interface;
use common::EndpointDescriptor;
use protocol::{TagSequence, build_framed_message};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

/// How a command is delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOptions {
    /// Interface to claim; `None` picks the first USBTMC interface
    pub interface: Option<u8>,
    pub timeout: Duration,
    /// bTag of the message (1-255)
    pub tag: u8,
    /// Largest payload, command plus newline, accepted for one transfer
    pub max_transfer_size: usize,
}

impl SendOptions {
    /// Options from the `[device]` and `[transfer]` sections
    pub fn from_config(config: &HostConfig) -> Self {
        Self {
            interface: config.device.interface,
            timeout: config.transfer.timeout(),
            tag: 1,
            max_transfer_size: config.transfer.max_transfer_size,
        }
    }
}

/// Outcome of a delivered command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SendReport {
    pub interface: u8,
    pub endpoint: u8,
    /// Bytes the device accepted
    pub written: usize,
    /// Length of the framed message
    pub expected: usize,
}

impl<B: UsbBackend> UsbHost<B> {
    /// Frame `command` and write it to the Bulk-OUT endpoint of a device
    ///
    /// The device is released and closed before returning on every path. A
    /// short write is reported as [`HostError::ShortWrite`].
    pub fn send_to(
        &self,
        vendor_id: u16,
        product_id: u16,
        options: &SendOptions,
        command: &str,
    ) -> Result<SendReport> {
        if options.tag == 0 {
            return Err(HostError::InvalidTag(options.tag));
        }
        let payload_len = command.len() + 1;
        if payload_len > options.max_transfer_size {
            return Err(HostError::PayloadTooLarge {
                size: payload_len,
                max: options.max_transfer_size,
            });
        }
        let expected = build_framed_message(command, options.tag)?.len();

        let mut session = self.open_by_vendor_product(vendor_id, product_id)?;
        let active = session.active_config()?;

        let (interface, endpoint) = match options.interface {
            Some(number) => {
                let endpoint = active
                    .alt_settings(number)
                    .find_map(|iface| iface.find_endpoint(EndpointDescriptor::is_bulk_out))
                    .map(|ep| ep.address)
                    .ok_or(HostError::NoBulkOutEndpoint { interface: number })?;
                (number, endpoint)
            }
            None => {
                let tmc = find_tmc_interface(&active).ok_or(HostError::NoTmcInterface {
                    vendor_id,
                    product_id,
                })?;
                (tmc.interface, tmc.require_bulk_out()?)
            }
        };
        debug!("Using interface {} endpoint {:#04x}", interface, endpoint);

        let claim = session.claim(interface)?;
        let mut tags = TagSequence::starting_at(options.tag);
        let written = claim.send_command(endpoint, command, &mut tags, options.timeout)?;
        claim.release();
        session.close()?;

        if written < expected {
            return Err(HostError::ShortWrite {
                endpoint,
                written,
                expected,
            });
        }

        info!(
            "Sent {} bytes to endpoint {:#04x} on interface {}",
            written, endpoint, interface
        );
        Ok(SendReport {
            interface,
            endpoint,
            written,
            expected,
        })
    }
}
