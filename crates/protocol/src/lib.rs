//! USBTMC Bulk-OUT framing
//!
//! This crate encodes instrument commands into the USB Test and Measurement
//! Class wire format: a fixed 12-byte Bulk-OUT header, the command payload,
//! and zero padding to a 4-byte boundary. It performs no I/O.
//!
//! # Example
//!
//! ```
//! use protocol::{BulkOutHeader, HEADER_SIZE, build_framed_message};
//!
//! let framed = build_framed_message("apply:sinusoid 2340, 0.1, 0.0", 1).unwrap();
//! assert_eq!(framed.len(), 44);
//!
//! let header = BulkOutHeader::decode(&framed[..HEADER_SIZE]).unwrap();
//! assert_eq!(header.tag, 1);
//! assert!(header.end_of_message);
//! ```
//!
//! # Multi-transfer messages
//!
//! Messages larger than the device's transfer size are split with
//! [`frame_message_chunks`], one tag per transfer and EOM on the last:
//!
//! ```
//! use protocol::{TagSequence, frame_message_chunks};
//!
//! let mut tags = TagSequence::new();
//! let frames = frame_message_chunks(b":DATA 0,1,2,3,4,5,6,7\n", &mut tags, 8).unwrap();
//! assert_eq!(frames.len(), 3);
//! ```

pub mod codec;
pub mod constants;
pub mod error;
pub mod header;
pub mod tag;

pub use codec::{build_framed_message, frame_message_chunks, frame_payload, padding_len};
pub use constants::{ALIGNMENT, HEADER_SIZE};
pub use error::{ProtocolError, Result};
pub use header::{BulkOutHeader, MsgId, encode_bulk_out_header, inverse_tag};
pub use tag::TagSequence;
