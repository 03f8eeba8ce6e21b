//! In-memory USB bus
//!
//! Models the parts of a host stack the session layer depends on: device
//! enumeration, opening, exclusive interface claims, string descriptors and
//! bulk OUT writes. Faults (busy interfaces, short writes, timeouts,
//! unreadable descriptors) are injected through [`MockBackend`].
//!
//! # Example
//!
//! ```
//! use host::backend::{MockBackend, MockDevice};
//! use host::UsbHost;
//!
//! let backend = MockBackend::new();
//! backend.add_device(MockDevice::new(0x0957, 0x0407));
//!
//! let host = UsbHost::with_backend(backend);
//! let session = host.open_by_vendor_product(0x0957, 0x0407).unwrap();
//! assert!(session.is_open());
//! ```

use super::{UsbBackend, UsbDevice, UsbHandle};
use common::test_utils::{create_mock_device_descriptor, create_mock_tmc_config};
use common::{ConfigDescriptor, DeviceDescriptor, Direction};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Position of a device on the mock bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BusAddress {
    pub bus_number: u8,
    pub address: u8,
}

/// One bulk OUT write accepted by the mock bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenTransfer {
    pub device: BusAddress,
    pub endpoint: u8,
    /// Bytes the device accepted (truncated on short writes)
    pub data: Vec<u8>,
    pub timeout: Duration,
}

/// Device to attach to a [`MockBackend`]
///
/// Defaults to a USB488 instrument with manufacturer, product and serial
/// strings.
#[derive(Debug, Clone)]
pub struct MockDevice {
    descriptor: DeviceDescriptor,
    config: Option<ConfigDescriptor>,
    strings: HashMap<u8, String>,
    openable: bool,
    descriptor_readable: bool,
}

impl MockDevice {
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        let descriptor = create_mock_device_descriptor(vendor_id, product_id);
        let strings = HashMap::from([
            (descriptor.manufacturer_string_index, "Mock Instruments".to_string()),
            (descriptor.product_string_index, "Waveform Generator".to_string()),
            (descriptor.serial_number_string_index, "MY00000001".to_string()),
        ]);

        Self {
            descriptor,
            config: Some(create_mock_tmc_config()),
            strings,
            openable: true,
            descriptor_readable: true,
        }
    }

    pub fn with_descriptor(mut self, descriptor: DeviceDescriptor) -> Self {
        self.descriptor = descriptor;
        self
    }

    pub fn with_config(mut self, config: ConfigDescriptor) -> Self {
        self.config = Some(config);
        self
    }

    /// Device in the unconfigured state
    pub fn without_config(mut self) -> Self {
        self.config = None;
        self
    }

    pub fn with_string(mut self, index: u8, value: impl Into<String>) -> Self {
        self.strings.insert(index, value.into());
        self
    }

    /// Drop every string descriptor; reads then stall
    pub fn without_strings(mut self) -> Self {
        self.strings.clear();
        self
    }

    /// Opening fails with `Access`
    pub fn unopenable(mut self) -> Self {
        self.openable = false;
        self
    }

    /// Reading the device descriptor fails with `Io`
    pub fn with_unreadable_descriptor(mut self) -> Self {
        self.descriptor_readable = false;
        self
    }
}

/// Highest device address on one bus
const MAX_ADDRESS: u32 = 127;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Claimant {
    Handle(u64),
    External,
}

#[derive(Debug, Default)]
struct MockBus {
    devices: Vec<(BusAddress, MockDevice)>,
    claims: HashMap<(BusAddress, u8), Claimant>,
    written: Vec<WrittenTransfer>,
    open_handles: usize,
    next_handle_id: u64,
    attached: u32,
    enumeration_error: Option<rusb::Error>,
    write_limit: Option<usize>,
    write_errors: HashMap<u8, rusb::Error>,
    failing_releases: HashSet<u8>,
    auto_detach_supported: bool,
}

impl MockBus {
    fn device(&self, at: BusAddress) -> rusb::Result<&MockDevice> {
        self.devices
            .iter()
            .find(|(addr, _)| *addr == at)
            .map(|(_, device)| device)
            .ok_or(rusb::Error::NoDevice)
    }
}

/// Shared in-memory bus; clones observe the same state
#[derive(Debug, Clone)]
pub struct MockBackend {
    bus: Arc<Mutex<MockBus>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Empty bus with kernel driver auto-detach supported
    pub fn new() -> Self {
        let bus = MockBus {
            auto_detach_supported: true,
            ..MockBus::default()
        };
        Self {
            bus: Arc::new(Mutex::new(bus)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockBus> {
        lock_bus(&self.bus)
    }

    /// Attach a device at a fresh address
    ///
    /// Addresses are never reused. Bus 1 takes addresses 1 to 127, further
    /// devices continue on bus 2 and so on.
    pub fn add_device(&self, device: MockDevice) -> BusAddress {
        let mut bus = self.lock();
        let slot = bus.attached;
        bus.attached += 1;
        let at = BusAddress {
            bus_number: u8::try_from(slot / MAX_ADDRESS + 1).unwrap_or(u8::MAX),
            address: (slot % MAX_ADDRESS + 1) as u8,
        };
        bus.devices.push((at, device));
        at
    }

    /// Detach the device at `at`
    pub fn remove_device(&self, at: BusAddress) {
        self.lock().devices.retain(|(addr, _)| *addr != at);
    }

    /// Make enumeration fail with `error`
    pub fn fail_enumeration(&self, error: rusb::Error) {
        self.lock().enumeration_error = Some(error);
    }

    /// Claim `interface` on behalf of another process
    pub fn hold_interface(&self, at: BusAddress, interface: u8) {
        self.lock().claims.insert((at, interface), Claimant::External);
    }

    /// Accept at most `limit` bytes per bulk write
    pub fn set_write_limit(&self, limit: Option<usize>) {
        self.lock().write_limit = limit;
    }

    /// Fail every write to `endpoint` with `error`
    pub fn fail_writes(&self, endpoint: u8, error: rusb::Error) {
        self.lock().write_errors.insert(endpoint, error);
    }

    /// Fail releases of `interface` with `Io`; the claim is dropped anyway
    pub fn fail_release(&self, interface: u8) {
        self.lock().failing_releases.insert(interface);
    }

    /// Report kernel driver auto-detach as unsupported
    pub fn disable_auto_detach(&self) {
        self.lock().auto_detach_supported = false;
    }

    /// Every write accepted so far, oldest first
    pub fn written(&self) -> Vec<WrittenTransfer> {
        self.lock().written.clone()
    }

    /// Interfaces currently claimed by any handle or external holder
    pub fn claimed_interfaces(&self, at: BusAddress) -> Vec<u8> {
        let bus = self.lock();
        let mut claimed: Vec<u8> = bus
            .claims
            .keys()
            .filter(|(addr, _)| *addr == at)
            .map(|(_, interface)| *interface)
            .collect();
        claimed.sort_unstable();
        claimed
    }

    /// Number of handles not yet closed
    pub fn open_handles(&self) -> usize {
        self.lock().open_handles
    }
}

fn lock_bus(bus: &Mutex<MockBus>) -> MutexGuard<'_, MockBus> {
    // Every mutation leaves the bus consistent, so a poisoned lock is usable
    bus.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl UsbBackend for MockBackend {
    type Device = MockAttached;

    fn devices(&self) -> rusb::Result<Vec<MockAttached>> {
        let bus = self.lock();
        if let Some(error) = bus.enumeration_error {
            return Err(error);
        }
        Ok(bus
            .devices
            .iter()
            .map(|(at, _)| MockAttached {
                bus: Arc::clone(&self.bus),
                at: *at,
            })
            .collect())
    }
}

/// Device as enumerated from a [`MockBackend`]
#[derive(Debug, Clone)]
pub struct MockAttached {
    bus: Arc<Mutex<MockBus>>,
    at: BusAddress,
}

impl UsbDevice for MockAttached {
    type Handle = MockHandle;

    fn bus_number(&self) -> u8 {
        self.at.bus_number
    }

    fn address(&self) -> u8 {
        self.at.address
    }

    fn device_descriptor(&self) -> rusb::Result<DeviceDescriptor> {
        let bus = lock_bus(&self.bus);
        let device = bus.device(self.at)?;
        if !device.descriptor_readable {
            return Err(rusb::Error::Io);
        }
        Ok(device.descriptor.clone())
    }

    fn active_config_descriptor(&self) -> rusb::Result<ConfigDescriptor> {
        let bus = lock_bus(&self.bus);
        bus.device(self.at)?
            .config
            .clone()
            .ok_or(rusb::Error::NotFound)
    }

    fn open(&self) -> rusb::Result<MockHandle> {
        let mut bus = lock_bus(&self.bus);
        if !bus.device(self.at)?.openable {
            return Err(rusb::Error::Access);
        }
        bus.open_handles += 1;
        bus.next_handle_id += 1;
        Ok(MockHandle {
            bus: Arc::clone(&self.bus),
            at: self.at,
            id: bus.next_handle_id,
            auto_detach: false,
        })
    }
}

/// Open handle on the mock bus; dropping it releases its claims
#[derive(Debug)]
pub struct MockHandle {
    bus: Arc<Mutex<MockBus>>,
    at: BusAddress,
    id: u64,
    auto_detach: bool,
}

impl MockHandle {
    /// Whether kernel driver auto-detach was enabled on this handle
    pub fn auto_detach(&self) -> bool {
        self.auto_detach
    }
}

impl UsbHandle for MockHandle {
    fn set_auto_detach_kernel_driver(&mut self, enable: bool) -> rusb::Result<()> {
        if !lock_bus(&self.bus).auto_detach_supported {
            return Err(rusb::Error::NotSupported);
        }
        self.auto_detach = enable;
        Ok(())
    }

    fn claim_interface(&mut self, interface: u8) -> rusb::Result<()> {
        let mut bus = lock_bus(&self.bus);
        let exists = bus
            .device(self.at)?
            .config
            .as_ref()
            .is_some_and(|config| config.interfaces.iter().any(|i| i.number == interface));
        if !exists {
            return Err(rusb::Error::NotFound);
        }

        match bus.claims.get(&(self.at, interface)).copied() {
            Some(Claimant::Handle(id)) if id == self.id => Ok(()),
            Some(_) => Err(rusb::Error::Busy),
            None => {
                bus.claims
                    .insert((self.at, interface), Claimant::Handle(self.id));
                Ok(())
            }
        }
    }

    fn release_interface(&mut self, interface: u8) -> rusb::Result<()> {
        let mut bus = lock_bus(&self.bus);
        match bus.claims.get(&(self.at, interface)).copied() {
            Some(Claimant::Handle(id)) if id == self.id => {
                bus.claims.remove(&(self.at, interface));
                if bus.failing_releases.contains(&interface) {
                    Err(rusb::Error::Io)
                } else {
                    Ok(())
                }
            }
            _ => Err(rusb::Error::NotFound),
        }
    }

    fn write_bulk(&self, endpoint: u8, data: &[u8], timeout: Duration) -> rusb::Result<usize> {
        let mut bus = lock_bus(&self.bus);
        let device = bus.device(self.at)?;

        let known_out = device.config.as_ref().is_some_and(|config| {
            config
                .interfaces
                .iter()
                .flat_map(|i| i.endpoints.iter())
                .any(|ep| ep.address == endpoint && ep.direction() == Direction::Out)
        });
        if !known_out {
            return Err(rusb::Error::NotFound);
        }
        if let Some(error) = bus.write_errors.get(&endpoint) {
            return Err(*error);
        }

        let accepted = bus.write_limit.map_or(data.len(), |limit| data.len().min(limit));
        bus.written.push(WrittenTransfer {
            device: self.at,
            endpoint,
            data: data[..accepted].to_vec(),
            timeout,
        });
        Ok(accepted)
    }

    fn read_string_descriptor_ascii(&self, index: u8) -> rusb::Result<String> {
        if index == 0 {
            return Err(rusb::Error::InvalidParam);
        }
        let bus = lock_bus(&self.bus);
        bus.device(self.at)?
            .strings
            .get(&index)
            .cloned()
            .ok_or(rusb::Error::Pipe)
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        let mut bus = lock_bus(&self.bus);
        let (at, id) = (self.at, self.id);
        bus.claims
            .retain(|(addr, _), claimant| !(*addr == at && *claimant == Claimant::Handle(id)));
        bus.open_handles = bus.open_handles.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::test_utils::{MOCK_BULK_IN, MOCK_BULK_OUT};

    fn open_first(backend: &MockBackend) -> MockHandle {
        backend.devices().unwrap()[0].open().unwrap()
    }

    #[test]
    fn test_claim_is_exclusive_between_handles() {
        let backend = MockBackend::new();
        backend.add_device(MockDevice::new(0x1234, 0x5678));

        let mut first = open_first(&backend);
        let mut second = open_first(&backend);

        first.claim_interface(0).unwrap();
        assert_eq!(second.claim_interface(0), Err(rusb::Error::Busy));

        // Re-claim by the owner is a no-op
        first.claim_interface(0).unwrap();
    }

    #[test]
    fn test_addresses_are_not_reused() {
        let backend = MockBackend::new();
        let first = backend.add_device(MockDevice::new(0x1111, 0x0001));
        let second = backend.add_device(MockDevice::new(0x2222, 0x0002));
        backend.remove_device(first);
        let third = backend.add_device(MockDevice::new(0x3333, 0x0003));

        assert_ne!(third, second);
        assert_ne!(third, first);

        let vendors: Vec<u16> = backend
            .devices()
            .unwrap()
            .iter()
            .map(|d| d.device_descriptor().unwrap().vendor_id)
            .collect();
        assert_eq!(vendors, vec![0x2222, 0x3333]);
    }

    #[test]
    fn test_full_bus_continues_on_next_bus() {
        let backend = MockBackend::new();
        let mut last = None;
        for _ in 0..=MAX_ADDRESS {
            last = Some(backend.add_device(MockDevice::new(0x1234, 0x5678)));
        }
        assert_eq!(
            last,
            Some(BusAddress {
                bus_number: 2,
                address: 1
            })
        );
        assert_eq!(backend.devices().unwrap().len(), 128);
    }

    #[test]
    fn test_drop_releases_claims() {
        let backend = MockBackend::new();
        let at = backend.add_device(MockDevice::new(0x1234, 0x5678));

        let mut handle = open_first(&backend);
        handle.claim_interface(0).unwrap();
        assert_eq!(backend.claimed_interfaces(at), vec![0]);
        assert_eq!(backend.open_handles(), 1);

        drop(handle);
        assert!(backend.claimed_interfaces(at).is_empty());
        assert_eq!(backend.open_handles(), 0);
    }

    #[test]
    fn test_write_limit_truncates() {
        let backend = MockBackend::new();
        backend.add_device(MockDevice::new(0x1234, 0x5678));
        backend.set_write_limit(Some(8));

        let handle = open_first(&backend);
        let n = handle
            .write_bulk(MOCK_BULK_OUT, &[0xAA; 16], Duration::from_millis(100))
            .unwrap();
        assert_eq!(n, 8);
        assert_eq!(backend.written()[0].data.len(), 8);
    }

    #[test]
    fn test_write_to_in_endpoint_is_rejected() {
        let backend = MockBackend::new();
        backend.add_device(MockDevice::new(0x1234, 0x5678));

        let handle = open_first(&backend);
        let result = handle.write_bulk(MOCK_BULK_IN, &[0; 4], Duration::from_millis(100));
        assert_eq!(result, Err(rusb::Error::NotFound));
        assert!(backend.written().is_empty());
    }

    #[test]
    fn test_missing_string_stalls() {
        let backend = MockBackend::new();
        backend.add_device(MockDevice::new(0x1234, 0x5678).without_strings());

        let handle = open_first(&backend);
        assert_eq!(handle.read_string_descriptor_ascii(1), Err(rusb::Error::Pipe));
        assert_eq!(
            handle.read_string_descriptor_ascii(0),
            Err(rusb::Error::InvalidParam)
        );
    }
}
