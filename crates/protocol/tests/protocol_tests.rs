//! Integration tests for USBTMC Bulk-OUT framing
//!
//! Covers header layout, framing alignment and the properties every
//! encoder output must satisfy for any tag, size and command.

use byteorder::{ByteOrder, LittleEndian};
use proptest::prelude::*;
use protocol::{
    BulkOutHeader, HEADER_SIZE, MsgId, TagSequence, build_framed_message, encode_bulk_out_header,
    frame_message_chunks, inverse_tag, padding_len,
};

mod scenarios {
    use super::*;

    #[test]
    fn test_tag_one_header_prefix() {
        let framed = build_framed_message("*RST", 1).unwrap();
        assert_eq!(&framed[..4], &[0x01, 0x01, 0xFE, 0x00]);
        assert_eq!(LittleEndian::read_u32(&framed[4..8]), 5);
        assert_eq!(&framed[8..12], &[0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_sinusoid_frame_layout() {
        let command = "apply:sinusoid 2340, 0.1, 0.0";
        let framed = build_framed_message(command, 1).unwrap();

        // 29 characters plus the newline
        assert_eq!(LittleEndian::read_u32(&framed[4..8]), 30);
        assert_eq!(framed.len(), 44);
        assert_eq!(&framed[42..], &[0x00, 0x00]);
    }

    #[test]
    fn test_header_is_deterministic() {
        let a = encode_bulk_out_header(MsgId::DevDepMsgOut, 0x7E, 512, false);
        let b = encode_bulk_out_header(MsgId::DevDepMsgOut, 0x7E, 512, false);
        assert_eq!(a, b);
    }

    #[test]
    fn test_padding_boundaries() {
        // 12 + len + 1: len 3 -> 16 (no padding), len 2 -> 15 (one byte)
        assert_eq!(build_framed_message("abc", 1).unwrap().len(), 16);
        assert_eq!(build_framed_message("ab", 1).unwrap().len(), 16);
        assert_eq!(build_framed_message("a", 1).unwrap().len(), 16);
        assert_eq!(build_framed_message("abcd", 1).unwrap().len(), 20);
    }

    #[test]
    fn test_sequenced_commands_use_distinct_tags() {
        let mut tags = TagSequence::new();
        let first = build_framed_message("*CLS", tags.next_tag()).unwrap();
        let second = build_framed_message("*CLS", tags.next_tag()).unwrap();

        assert_eq!(first[1], 1);
        assert_eq!(second[1], 2);
        assert_eq!(&first[4..], &second[4..]);
    }
}

proptest! {
    #[test]
    fn prop_inverse_tag_complements(tag in any::<u8>()) {
        prop_assert_eq!(inverse_tag(tag) ^ tag, 0xFF);
    }

    #[test]
    fn prop_header_layout(tag in any::<u8>(), size in 1u32..=u32::MAX, eom in any::<bool>()) {
        let header = encode_bulk_out_header(MsgId::DevDepMsgOut, tag, size, eom);

        prop_assert_eq!(header.len(), HEADER_SIZE);
        prop_assert_eq!(header[0], 0x01);
        prop_assert_eq!(header[1], tag);
        prop_assert_eq!(header[2], inverse_tag(header[1]));
        prop_assert_eq!(header[3], 0);
        prop_assert_eq!(LittleEndian::read_u32(&header[4..8]), size);
        prop_assert_eq!(header[8], eom as u8);
        prop_assert_eq!(&header[9..12], &[0u8, 0, 0]);
    }

    #[test]
    fn prop_header_decodes_back(tag in any::<u8>(), size in 1u32..=u32::MAX, eom in any::<bool>()) {
        let bytes = encode_bulk_out_header(MsgId::DevDepMsgOut, tag, size, eom);
        let header = BulkOutHeader::decode(&bytes).unwrap();
        prop_assert_eq!(header, BulkOutHeader::dev_dep_msg_out(tag, size, eom));
    }

    #[test]
    fn prop_framed_message_alignment(command in "\\PC{0,200}", tag in any::<u8>()) {
        let framed = build_framed_message(&command, tag).unwrap();
        let payload_len = command.len() + 1;

        prop_assert_eq!(framed.len() % 4, 0);
        prop_assert_eq!(framed.len(), HEADER_SIZE + payload_len + padding_len(HEADER_SIZE + payload_len));
        prop_assert_eq!(
            &framed[..HEADER_SIZE],
            &encode_bulk_out_header(MsgId::DevDepMsgOut, tag, payload_len as u32, true)[..]
        );
        prop_assert_eq!(framed[HEADER_SIZE + command.len()], b'\n');
        prop_assert!(framed[HEADER_SIZE + payload_len..].iter().all(|&b| b == 0));
    }

    #[test]
    fn prop_padding_formula(len in 0usize..10_000) {
        prop_assert_eq!(padding_len(len), (4 - (len % 4)) % 4);
        prop_assert!(padding_len(len) < 4);
    }

    #[test]
    fn prop_chunks_reassemble(
        payload in proptest::collection::vec(any::<u8>(), 1..2048),
        max_payload in 1usize..600,
    ) {
        let mut tags = TagSequence::new();
        let frames = frame_message_chunks(&payload, &mut tags, max_payload).unwrap();

        let mut reassembled = Vec::new();
        for (i, frame) in frames.iter().enumerate() {
            prop_assert_eq!(frame.len() % 4, 0);
            let header = BulkOutHeader::decode(&frame[..HEADER_SIZE]).unwrap();
            prop_assert_eq!(header.end_of_message, i + 1 == frames.len());
            prop_assert!(header.tag != 0);
            let size = header.transfer_size as usize;
            prop_assert!(size <= max_payload);
            reassembled.extend_from_slice(&frame[HEADER_SIZE..HEADER_SIZE + size]);
        }
        prop_assert_eq!(reassembled, payload);
    }
}
