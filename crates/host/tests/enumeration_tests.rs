//! Device enumeration and listing tests

use common::test_utils::create_mock_hid_config;
use host::backend::{MockBackend, MockDevice};
use host::{HostError, UsbHost, find_tmc_interface};

#[test]
fn test_list_devices_reports_all() {
    let backend = MockBackend::new();
    backend.add_device(MockDevice::new(0x0957, 0x0407));
    backend.add_device(MockDevice::new(0x046d, 0xc52b).with_config(create_mock_hid_config()));
    let host = UsbHost::with_backend(backend);

    let entries = host.list_devices().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].vendor_id(), 0x0957);
    assert_eq!(entries[1].product_id(), 0xc52b);
    assert_eq!(entries[1].bus_number(), 1);
    assert_eq!(entries[1].address(), 2);
}

#[test]
fn test_list_devices_empty_bus() {
    let host = UsbHost::with_backend(MockBackend::new());
    assert!(host.list_devices().unwrap().is_empty());
}

#[test]
fn test_enumeration_failure() {
    let backend = MockBackend::new();
    backend.fail_enumeration(rusb::Error::NoMem);
    let host = UsbHost::with_backend(backend);

    let err = host.list_devices().unwrap_err();
    assert!(matches!(
        err,
        HostError::HostStack {
            op: "device enumeration",
            source: rusb::Error::NoMem
        }
    ));
}

#[test]
fn test_describe_all_skips_and_continues() {
    let backend = MockBackend::new();
    backend.add_device(MockDevice::new(0x0957, 0x0407).unopenable());
    backend.add_device(MockDevice::new(0x1234, 0x0001).with_unreadable_descriptor());
    backend.add_device(MockDevice::new(0x046d, 0xc52b).with_config(create_mock_hid_config()));
    let host = UsbHost::with_backend(backend);

    let summaries = host.describe_all().unwrap();
    assert_eq!(summaries.len(), 2);

    // Unopenable: no strings, topology still known
    assert_eq!(summaries[0].id_string(), "0957:0407");
    assert!(summaries[0].manufacturer.is_none());
    assert!(find_tmc_interface(summaries[0].config.as_ref().unwrap()).is_some());

    assert_eq!(summaries[1].manufacturer.as_deref(), Some("Mock Instruments"));
    assert!(find_tmc_interface(summaries[1].config.as_ref().unwrap()).is_none());

    // Every handle opened for the listing is closed again
    assert_eq!(host.backend().open_handles(), 0);
}

#[test]
fn test_removed_device_is_not_listed() {
    let backend = MockBackend::new();
    let at = backend.add_device(MockDevice::new(0x0957, 0x0407));
    backend.remove_device(at);
    let host = UsbHost::with_backend(backend);

    assert!(matches!(
        host.open_by_vendor_product(0x0957, 0x0407),
        Err(HostError::DeviceNotFound { .. })
    ));
}

#[test]
fn test_summary_serializes_to_json() {
    let backend = MockBackend::new();
    backend.add_device(MockDevice::new(0x0957, 0x0407).with_string(3, "SN-42"));
    let host = UsbHost::with_backend(backend);

    let summaries = host.describe_all().unwrap();
    let json = serde_json::to_value(&summaries).unwrap();
    assert_eq!(json[0]["vendor_id"], 0x0957);
    assert_eq!(json[0]["serial_number"], "SN-42");
}

#[test]
fn test_describe_all_unopenable_without_config() {
    let backend = MockBackend::new();
    backend.add_device(MockDevice::new(0x0957, 0x0407).unopenable().without_config());
    let host = UsbHost::with_backend(backend);

    let summaries = host.describe_all().unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].id_string(), "0957:0407");
    assert!(summaries[0].config.is_none());
    assert!(summaries[0].manufacturer.is_none());
    assert_eq!(host.backend().open_handles(), 0);
}

#[test]
fn test_readded_device_gets_its_own_address() {
    let backend = MockBackend::new();
    let first = backend.add_device(MockDevice::new(0x1111, 0x0001));
    backend.add_device(MockDevice::new(0x2222, 0x0002));
    backend.remove_device(first);
    backend.add_device(MockDevice::new(0x3333, 0x0003));
    let host = UsbHost::with_backend(backend);

    let vendors: Vec<u16> = host
        .list_devices()
        .unwrap()
        .iter()
        .map(|entry| entry.vendor_id())
        .collect();
    assert_eq!(vendors, vec![0x2222, 0x3333]);

    let session = host.open_by_vendor_product(0x3333, 0x0003).unwrap();
    assert_eq!(session.vendor_id(), 0x3333);
    assert_eq!(session.product_id(), 0x0003);
}
