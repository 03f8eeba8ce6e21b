//! Integration tests for descriptor snapshots
//!
//! Tests the USBTMC interface predicates, derived endpoint fields and
//! the serialized form used by `usbtmc list --json`.

use common::test_utils::{
    MOCK_BULK_IN, MOCK_BULK_OUT, MOCK_INTERRUPT_IN, create_mock_device_descriptor,
    create_mock_hid_config, create_mock_tmc_config,
};
use common::{DeviceSummary, Direction, EndpointDescriptor, TransferType};

mod interfaces {
    use super::*;

    #[test]
    fn test_tmc_config_is_usb488() {
        let config = create_mock_tmc_config();
        let iface = &config.interfaces[0];
        assert!(iface.is_usbtmc());
        assert!(iface.is_usb488());
    }

    #[test]
    fn test_hid_config_is_not_usbtmc() {
        let config = create_mock_hid_config();
        assert!(config.interfaces.iter().all(|i| !i.is_usbtmc()));
    }

    #[test]
    fn test_find_endpoints_by_role() {
        let config = create_mock_tmc_config();
        let iface = &config.interfaces[0];

        let out = iface.find_endpoint(EndpointDescriptor::is_bulk_out).unwrap();
        assert_eq!(out.address, MOCK_BULK_OUT);

        let bulk_in = iface.find_endpoint(EndpointDescriptor::is_bulk_in).unwrap();
        assert_eq!(bulk_in.address, MOCK_BULK_IN);

        let intr = iface
            .find_endpoint(|ep| {
                ep.transfer_type() == TransferType::Interrupt && ep.direction() == Direction::In
            })
            .unwrap();
        assert_eq!(intr.address, MOCK_INTERRUPT_IN);
    }
}

mod endpoints {
    use super::*;

    #[test]
    fn test_all_address_bytes() {
        for address in 0..=u8::MAX {
            let ep = EndpointDescriptor::new(address, 0x02, 64);
            assert_eq!(ep.number(), address & 0x7F);
            let expected = if address >= 0x80 {
                Direction::In
            } else {
                Direction::Out
            };
            assert_eq!(ep.direction(), expected);
        }
    }

    #[test]
    fn test_transfer_type_mapping() {
        let types: Vec<TransferType> = (0..4)
            .map(|attr| EndpointDescriptor::new(0x01, attr, 64).transfer_type())
            .collect();
        assert_eq!(
            types,
            vec![
                TransferType::Control,
                TransferType::Isochronous,
                TransferType::Bulk,
                TransferType::Interrupt
            ]
        );
    }
}

mod summaries {
    use super::*;

    #[test]
    fn test_summary_from_descriptor_has_absent_fields() {
        let desc = create_mock_device_descriptor(0x0957, 0x0407);
        let summary = DeviceSummary::from_descriptor(3, 7, &desc);

        assert_eq!(summary.id_string(), "0957:0407");
        assert_eq!(summary.bus_number, 3);
        assert!(summary.manufacturer.is_none());
        assert!(summary.config.is_none());
    }

    #[test]
    fn test_summary_json_roundtrip() {
        let desc = create_mock_device_descriptor(0x2b29, 0x0055);
        let mut summary = DeviceSummary::from_descriptor(1, 4, &desc);
        summary.product = Some("Lezyne GPS".to_string());
        summary.config = Some(create_mock_tmc_config());

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"product\":\"Lezyne GPS\""));

        let parsed: DeviceSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, summary);
    }
}
