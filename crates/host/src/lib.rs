//! USBTMC host library
//!
//! Enumerates USB devices, opens one by vendor/product ID, inspects its
//! descriptors and sends USBTMC-framed commands to a Bulk-OUT endpoint of
//! a claimed interface.
//!
//! # Example
//!
//! ```no_run
//! use host::UsbHost;
//! use protocol::TagSequence;
//! use std::time::Duration;
//!
//! # fn main() -> host::Result<()> {
//! let host = UsbHost::new()?;
//! let mut session = host.open_by_vendor_product(0x0957, 0x0407)?;
//! let tmc = session.tmc_interface()?;
//! let endpoint = tmc.require_bulk_out()?;
//!
//! let claim = session.claim(tmc.interface)?;
//! let mut tags = TagSequence::new();
//! claim.send_command(endpoint, "*RST", &mut tags, Duration::from_secs(5))?;
//! claim.release();
//! session.close()?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod inspect;
pub mod send;
pub mod session;

pub use config::HostConfig;
pub use context::{DeviceEntry, UsbHost};
pub use error::{HostError, Result};
pub use inspect::{TmcInterface, find_tmc_interface, render_topology};
pub use send::{SendOptions, SendReport};
pub use session::{ClaimedInterface, OpenDeviceSession, SessionState};
