//! Open device sessions and interface claims
//!
//! An [`OpenDeviceSession`] owns the host handle of one device. Claiming an
//! interface yields a [`ClaimedInterface`] that mutably borrows the session,
//! so a session has at most one live claim and no claim outlives it.
//! Interfaces and handles are released on every exit path through `Drop`.

use crate::backend::{UsbDevice, UsbHandle};
use crate::error::{HostError, Result};
use common::{DeviceDescriptor, Direction};
use protocol::{TagSequence, build_framed_message};
use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::{debug, warn};

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Handle open, no interface claimed
    Open,
    /// Handle open and the interface is claimed
    InterfaceClaimed(u8),
    /// Handle released; only `state()` remains valid
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Open => write!(f, "open"),
            SessionState::InterfaceClaimed(n) => write!(f, "interface {} claimed", n),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// An opened device
///
/// Borrows the [`UsbHost`](crate::UsbHost) it came from for `'ctx`.
pub struct OpenDeviceSession<'ctx, D: UsbDevice> {
    pub(crate) device: D,
    pub(crate) handle: Option<D::Handle>,
    pub(crate) descriptor: DeviceDescriptor,
    claimed: Option<u8>,
    _host: PhantomData<&'ctx ()>,
}

impl<'ctx, D: UsbDevice> OpenDeviceSession<'ctx, D> {
    pub(crate) fn new(device: D, handle: D::Handle, descriptor: DeviceDescriptor) -> Self {
        debug!(
            "Opened device {:04x}:{:04x} at bus {} address {}",
            descriptor.vendor_id,
            descriptor.product_id,
            device.bus_number(),
            device.address()
        );

        Self {
            device,
            handle: Some(handle),
            descriptor,
            claimed: None,
            _host: PhantomData,
        }
    }

    pub fn state(&self) -> SessionState {
        match (&self.handle, self.claimed) {
            (None, _) => SessionState::Closed,
            (Some(_), Some(interface)) => SessionState::InterfaceClaimed(interface),
            (Some(_), None) => SessionState::Open,
        }
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub fn vendor_id(&self) -> u16 {
        self.descriptor.vendor_id
    }

    pub fn product_id(&self) -> u16 {
        self.descriptor.product_id
    }

    pub fn bus_number(&self) -> u8 {
        self.device.bus_number()
    }

    pub fn address(&self) -> u8 {
        self.device.address()
    }

    /// Device descriptor captured at enumeration
    pub fn device_descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub(crate) fn handle(&self) -> Result<&D::Handle> {
        self.handle.as_ref().ok_or(HostError::SessionClosed)
    }

    fn handle_mut(&mut self) -> Result<&mut D::Handle> {
        self.handle.as_mut().ok_or(HostError::SessionClosed)
    }

    /// Release the host handle
    ///
    /// Fails with [`HostError::SessionClosed`] if the session is already
    /// closed.
    pub fn close(&mut self) -> Result<()> {
        let mut handle = self.handle.take().ok_or(HostError::SessionClosed)?;

        // Only reachable if a claim token was leaked
        if let Some(interface) = self.claimed.take() {
            if let Err(e) = handle.release_interface(interface) {
                warn!("Failed to release interface {} on close: {}", interface, e);
            }
        }

        drop(handle);
        debug!(
            "Closed device {:04x}:{:04x}",
            self.descriptor.vendor_id, self.descriptor.product_id
        );
        Ok(())
    }

    /// Claim `interface` for exclusive use
    ///
    /// Kernel driver auto-detach is requested first where the platform
    /// supports it.
    pub fn claim(&mut self, interface: u8) -> Result<ClaimedInterface<'_, 'ctx, D>> {
        let handle = self.handle_mut()?;

        if let Err(e) = handle.set_auto_detach_kernel_driver(true) {
            debug!("Kernel driver auto-detach unavailable: {}", e);
        }

        handle.claim_interface(interface).map_err(|e| match e {
            rusb::Error::Busy => HostError::InterfaceBusy { interface },
            source => HostError::HostStack {
                op: "interface claim",
                source,
            },
        })?;

        debug!(
            "Claimed interface {} on device {:04x}:{:04x}",
            interface, self.descriptor.vendor_id, self.descriptor.product_id
        );
        self.claimed = Some(interface);

        Ok(ClaimedInterface {
            session: self,
            interface,
            released: false,
        })
    }
}

impl<D: UsbDevice> Drop for OpenDeviceSession<'_, D> {
    fn drop(&mut self) {
        if self.handle.is_some() {
            if let Err(e) = self.close() {
                warn!("Failed to close device session: {}", e);
            }
        }
    }
}

impl<D: UsbDevice> fmt::Debug for OpenDeviceSession<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenDeviceSession")
            .field("vendor_id", &format_args!("{:04x}", self.descriptor.vendor_id))
            .field("product_id", &format_args!("{:04x}", self.descriptor.product_id))
            .field("bus_number", &self.device.bus_number())
            .field("address", &self.device.address())
            .field("state", &self.state())
            .finish()
    }
}

/// Exclusive claim on one interface of a session
///
/// Released by [`release`](Self::release) or when dropped.
pub struct ClaimedInterface<'s, 'ctx, D: UsbDevice> {
    session: &'s mut OpenDeviceSession<'ctx, D>,
    interface: u8,
    released: bool,
}

impl<'s, 'ctx, D: UsbDevice> ClaimedInterface<'s, 'ctx, D> {
    pub fn interface(&self) -> u8 {
        self.interface
    }

    /// The session this claim belongs to
    pub fn session(&self) -> &OpenDeviceSession<'ctx, D> {
        &*self.session
    }

    /// Release the interface
    ///
    /// A failing release is logged; the claim is gone either way.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.session.claimed = None;

        let interface = self.interface;
        match self.session.handle_mut() {
            Ok(handle) => match handle.release_interface(interface) {
                Ok(()) => debug!("Released interface {}", interface),
                Err(e) => warn!("Failed to release interface {}: {}", interface, e),
            },
            Err(e) => warn!("Failed to release interface {}: {}", interface, e),
        }
    }

    /// Write an already framed message to a Bulk-OUT endpoint
    ///
    /// Returns the number of bytes the device accepted. A short write is
    /// returned as is and logged. Endpoint addresses with the IN direction
    /// bit set are rejected without touching the device.
    pub fn send_framed_message(
        &self,
        endpoint: u8,
        bytes: &[u8],
        timeout: Duration,
    ) -> Result<usize> {
        if Direction::from_address(endpoint) != Direction::Out {
            return Err(HostError::Transfer {
                endpoint,
                source: rusb::Error::InvalidParam,
            });
        }

        let handle = self.session.handle()?;
        let written = handle
            .write_bulk(endpoint, bytes, timeout)
            .map_err(|e| match e {
                rusb::Error::Timeout => HostError::TransferTimeout {
                    endpoint,
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                },
                source => HostError::Transfer { endpoint, source },
            })?;

        if written < bytes.len() {
            warn!(
                "Short write to endpoint {:#04x}: {} of {} bytes",
                endpoint,
                written,
                bytes.len()
            );
        } else {
            debug!("Wrote {} bytes to endpoint {:#04x}", written, endpoint);
        }

        Ok(written)
    }

    /// Frame `command` with the next tag from `tags` and send it
    pub fn send_command(
        &self,
        endpoint: u8,
        command: &str,
        tags: &mut TagSequence,
        timeout: Duration,
    ) -> Result<usize> {
        let tag = tags.next_tag();
        let framed = build_framed_message(command, tag)?;
        debug!("Sending {:?} with tag {}", command, tag);
        self.send_framed_message(endpoint, &framed, timeout)
    }
}

impl<D: UsbDevice> Drop for ClaimedInterface<'_, '_, D> {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl<D: UsbDevice> fmt::Debug for ClaimedInterface<'_, '_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimedInterface")
            .field("interface", &self.interface)
            .field("session", &self.session)
            .finish()
    }
}
