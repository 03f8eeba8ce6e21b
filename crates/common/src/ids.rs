//! Vendor/product ID parsing
//!
//! IDs are written in hex, with or without a `0x` prefix: `0957`,
//! `0x0957`, and the pair form `0957:0407`.

use crate::{Error, Result};

/// Parse a single 16-bit hex ID
pub fn parse_hex_id(input: &str) -> Result<u16> {
    let trimmed = input.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if hex.is_empty() || hex.len() > 4 {
        return Err(Error::InvalidDeviceId {
            input: input.to_string(),
            reason: "hex part must be 1-4 digits".to_string(),
        });
    }

    u16::from_str_radix(hex, 16).map_err(|_| Error::InvalidDeviceId {
        input: input.to_string(),
        reason: "not a valid hex number".to_string(),
    })
}

/// Parse a `VID:PID` pair
pub fn parse_vid_pid(input: &str) -> Result<(u16, u16)> {
    let (vid, pid) = input.split_once(':').ok_or_else(|| Error::InvalidDeviceId {
        input: input.to_string(),
        reason: "expected VID:PID (e.g. '0957:0407')".to_string(),
    })?;

    Ok((parse_hex_id(vid)?, parse_hex_id(pid)?))
}
