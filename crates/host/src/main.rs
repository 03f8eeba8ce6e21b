//! usbtmc
//!
//! Command-line front end for the USBTMC host library: list devices, show
//! an instrument's descriptor topology, and send framed commands.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use common::{parse_vid_pid, setup_logging};
use host::backend::native::libusb_version;
use host::{HostConfig, HostError, SendOptions, UsbHost, find_tmc_interface, render_topology};
use protocol::{BulkOutHeader, HEADER_SIZE, TagSequence, build_framed_message, frame_message_chunks};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "usbtmc")]
#[command(
    author,
    version,
    about = "USBTMC host tool - frame and send commands to USB instruments"
)]
#[command(long_about = "
Talks to USB Test and Measurement Class instruments through libusb.
Commands are wrapped in a USBTMC Bulk-OUT header, padded to a 4-byte
boundary and written to the instrument's Bulk-OUT endpoint.

EXAMPLES:
    # List attached devices
    usbtmc list

    # Show the descriptor topology of an instrument
    usbtmc info --device 0957:0407

    # Send a command
    usbtmc send --device 0957:0407 apply:sinusoid 2340, 0.1, 0.0

    # Show the framed bytes without touching USB
    usbtmc frame '*IDN?'

CONFIGURATION:
    The tool looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/usbtmc/host.toml
    3. /etc/usbtmc/host.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List attached USB devices
    List {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show identity strings and endpoint topology of a device
    Info {
        /// Device as VID:PID in hex; defaults to the configured device
        #[arg(short, long, value_name = "VID:PID")]
        device: Option<String>,
    },

    /// Frame a command and send it to the device's Bulk-OUT endpoint
    Send {
        /// Device as VID:PID in hex; defaults to the configured device
        #[arg(short, long, value_name = "VID:PID")]
        device: Option<String>,

        /// Interface to claim; defaults to the first USBTMC interface
        #[arg(short, long)]
        interface: Option<u8>,

        /// Transfer timeout in milliseconds
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,

        /// bTag of the message (1-255)
        #[arg(long, default_value_t = 1)]
        tag: u8,

        /// Command text; words are joined with spaces
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Print the framed bytes of a command without touching USB
    Frame {
        /// bTag of the first transfer (1-255)
        #[arg(long, default_value_t = 1)]
        tag: u8,

        /// Split into transfers carrying at most this many payload bytes
        #[arg(long, value_name = "BYTES")]
        max_payload: Option<usize>,

        /// Command text; words are joined with spaces
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Save the default configuration and exit
    SaveConfig {
        /// Destination; defaults to the standard location
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Command::SaveConfig { path } = &args.command {
        let config = HostConfig::default();
        let path = path.clone().unwrap_or_else(HostConfig::default_path);
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if let Some(ref path) = args.config {
        HostConfig::load(Some(path.clone())).context("Failed to load configuration")?
    } else {
        HostConfig::load_or_default()
    };

    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.general.log_level);
    setup_logging(log_level).context("Failed to setup logging")?;

    info!("usbtmc v{}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::List { json } => list_devices(json),
        Command::Info { device } => show_info(&config, device.as_deref()),
        Command::Send {
            device,
            interface,
            timeout_ms,
            tag,
            command,
        } => {
            let timeout = timeout_ms.map_or_else(|| config.transfer.timeout(), Duration::from_millis);
            send_command(
                &config,
                device.as_deref(),
                interface,
                timeout,
                tag,
                &command.join(" "),
            )
        }
        Command::Frame {
            tag,
            max_payload,
            command,
        } => print_frames(&command.join(" "), tag, max_payload),
        Command::SaveConfig { .. } => Ok(()),
    }
}

/// Resolve the target device from the command line or the config file
fn resolve_target(config: &HostConfig, device: Option<&str>) -> Result<(u16, u16)> {
    if let Some(device) = device {
        return Ok(parse_vid_pid(device)?);
    }
    config
        .device
        .target()?
        .ok_or_else(|| anyhow!("No device given; use --device VID:PID or set [device] in the config"))
}

fn open_host() -> Result<UsbHost> {
    let host = UsbHost::new().context("Failed to initialize USB")?;
    info!("libusb v{}", libusb_version());
    Ok(host)
}

fn list_devices(json: bool) -> Result<()> {
    let host = open_host()?;
    let devices = host.describe_all().context("Failed to enumerate devices")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    if devices.is_empty() {
        println!("No USB devices found.");
        return Ok(());
    }

    println!("Found {} USB device(s):\n", devices.len());
    for device in &devices {
        let tmc = device
            .config
            .as_ref()
            .and_then(find_tmc_interface)
            .map(|tmc| format!(" [USBTMC interface {}]", tmc.interface))
            .unwrap_or_default();
        println!(
            "  {} - {} {}{}",
            device.id_string(),
            device.manufacturer.as_deref().unwrap_or("Unknown Manufacturer"),
            device.product.as_deref().unwrap_or("Unknown Product"),
            tmc
        );
        println!(
            "      Bus {:03} Device {:03} Class {:#04x}",
            device.bus_number, device.address, device.class_code
        );
        if let Some(serial) = &device.serial_number {
            println!("      Serial: {}", serial);
        }
        println!();
    }

    Ok(())
}

fn show_info(config: &HostConfig, device: Option<&str>) -> Result<()> {
    let (vendor_id, product_id) = resolve_target(config, device)?;
    let host = open_host()?;

    let mut session = host
        .open_by_vendor_product(vendor_id, product_id)
        .context("Failed to open device")?;
    let summary = session.summary()?;
    print!("{}", render_topology(&summary));

    match session.tmc_interface() {
        Ok(tmc) => println!(
            "=> USBTMC interface {}: Bulk-OUT {}, Bulk-IN {}, Interrupt-IN {}",
            tmc.interface,
            endpoint_text(tmc.bulk_out),
            endpoint_text(tmc.bulk_in),
            endpoint_text(tmc.interrupt_in)
        ),
        Err(HostError::NoTmcInterface { .. }) => println!("=> No USBTMC interface"),
        Err(e) => warn!("{}", e),
    }

    session.close()?;
    Ok(())
}

fn endpoint_text(endpoint: Option<u8>) -> String {
    endpoint.map_or_else(|| "none".to_string(), |ep| format!("{:#04x}", ep))
}

fn send_command(
    config: &HostConfig,
    device: Option<&str>,
    interface: Option<u8>,
    timeout: Duration,
    tag: u8,
    command: &str,
) -> Result<()> {
    let (vendor_id, product_id) = resolve_target(config, device)?;
    let options = SendOptions {
        interface: interface.or(config.device.interface),
        timeout,
        tag,
        ..SendOptions::from_config(config)
    };

    let host = open_host()?;
    let report = host
        .send_to(vendor_id, product_id, &options, command)
        .context("Failed to send command")?;
    println!(
        "Sent {} of {} bytes to endpoint {:#04x} on interface {}",
        report.written, report.expected, report.endpoint, report.interface
    );
    Ok(())
}

fn print_frames(command: &str, tag: u8, max_payload: Option<usize>) -> Result<()> {
    if tag == 0 {
        return Err(anyhow!("bTag must be between 1 and 255"));
    }

    let frames = match max_payload {
        Some(max) => {
            let mut payload = command.as_bytes().to_vec();
            payload.push(protocol::constants::TERMINATOR);
            frame_message_chunks(&payload, &mut TagSequence::starting_at(tag), max)?
        }
        None => vec![build_framed_message(command, tag)?],
    };

    for (i, frame) in frames.iter().enumerate() {
        let header = BulkOutHeader::decode(&frame[..HEADER_SIZE])?;
        println!(
            "Transfer {}: tag {} size {} EOM {} ({} bytes framed)",
            i + 1,
            header.tag,
            header.transfer_size,
            header.end_of_message,
            frame.len()
        );
        print!("{}", hex_dump(frame));
    }

    Ok(())
}

fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::new();
    for (row, chunk) in bytes.chunks(16).enumerate() {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        out.push_str(&format!("  {:04x}: {:<47}  {}\n", row * 16, hex.join(" "), ascii));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_dump_layout() {
        let framed = build_framed_message("*IDN?", 1).unwrap();
        let dump = hex_dump(&framed);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("  0000: 01 01 fe 00 06 00 00 00 01 00 00 00 2a 49 44 4e"));
        assert!(lines[1].starts_with("  0010: 3f 0a 00 00"));
    }

    #[test]
    fn test_resolve_target_prefers_argument() {
        let mut config = HostConfig::default();
        config.device.vendor_id = Some("0x1234".to_string());
        config.device.product_id = Some("0x5678".to_string());

        assert_eq!(resolve_target(&config, Some("0957:0407")).unwrap(), (0x0957, 0x0407));
        assert_eq!(resolve_target(&config, None).unwrap(), (0x1234, 0x5678));
        assert!(resolve_target(&HostConfig::default(), None).is_err());
    }

    #[test]
    fn test_cli_parses_send() {
        let args = Args::try_parse_from([
            "usbtmc",
            "send",
            "--device",
            "0957:0407",
            "apply:sinusoid",
            "2340,",
            "0.1,",
            "0.0",
        ])
        .unwrap();

        match args.command {
            Command::Send { device, command, tag, .. } => {
                assert_eq!(device.as_deref(), Some("0957:0407"));
                assert_eq!(command.join(" "), "apply:sinusoid 2340, 0.1, 0.0");
                assert_eq!(tag, 1);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
