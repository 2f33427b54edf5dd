//! Application-wide constants and compile-time configuration.
//!
//! Peer identity, UUIDs, timing parameters, and the deployment variant
//! live here so they can be tuned in one place.

use crate::command::InputFormat;
use crate::packet::PacketLayout;

// Upstream source (central role)

/// Fixed address of the source, written most-significant byte first
/// (`1C:69:20:E2:6D:2A`).
pub const SOURCE_ADDRESS: [u8; 6] = [0x1C, 0x69, 0x20, 0xE2, 0x6D, 0x2A];

// The GATT clients in `ble/source.rs` spell these UUIDs as macro
// literals and assert at compile time that they match.

/// Source service (Heart Rate, 0x180D).
pub const SOURCE_SERVICE_UUID: u16 = 0x180D;

/// Notifying sensor characteristic (Heart Rate Measurement, 0x2A37).
pub const SOURCE_SENSOR_UUID: u16 = 0x2A37;

/// Optional control characteristic for outbound writes (0x2A56).
pub const SOURCE_CONTROL_UUID: u16 = 0x2A56;

/// Byte of each sensor notification that is cached as the primary reading.
pub const SOURCE_SENSOR_OFFSET: usize = 0;

/// Seconds between upstream connect attempts while disconnected.
pub const UPSTREAM_RETRY_SECS: u64 = 5;

/// BLE connection interval range (in 1.25 ms units).
/// 6 = 7.5 ms.
pub const BLE_CONN_INTERVAL_MIN: u16 = 6;
pub const BLE_CONN_INTERVAL_MAX: u16 = 12;

/// BLE slave latency (number of connection events the peripheral can skip).
pub const BLE_SLAVE_LATENCY: u16 = 0;

/// BLE supervision timeout (in 10 ms units). 400 = 4 s.
pub const BLE_SUP_TIMEOUT: u16 = 400;

/// Depth of the transport -> link manager event channel.
pub const SOURCE_EVENT_DEPTH: usize = 8;

/// Largest sensor notification payload we keep.
pub const NOTIFICATION_MAX: usize = 20;

// Downstream sink (peripheral role)

/// Advertised device name.
pub const DEVICE_NAME: &str = "BPM_Relay";

/// Relay service exposed to the sink.
pub const RELAY_SERVICE_UUID: &str = "12345678-1234-5678-1234-56789abcdef0";

/// Notify-only relay characteristic.
pub const RELAY_CHAR_UUID: &str = "abcdefab-cdef-1234-5678-1234567890ab";

/// Relay service UUID as little-endian bytes, for advertisement data.
pub const RELAY_SERVICE_UUID_LE: [u8; 16] = [
    0xf0, 0xde, 0xbc, 0x9a, 0x78, 0x56, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12,
];

/// Milliseconds between relay packets while a sink is attached.
pub const RELAY_PERIOD_MS: u64 = 1000;

/// Advertising interval (in 0.625 ms units). 160 = 100 ms.
pub const ADV_INTERVAL: u32 = 160;

/// Pause before advertising again after the SoftDevice refused to start.
pub const ADVERTISE_RETRY_MS: u64 = 500;

// External input (UART)

/// UART line speed.
pub const UART_BAUD: u32 = 115_200;

/// Longest accepted input line, terminator excluded.
pub const INPUT_LINE_MAX: usize = 32;

// Deployment variant

/// Relay packet width expected by this deployment's sink.
pub const PACKET_LAYOUT: PacketLayout = PacketLayout::Pair;

/// Shape of the external input records.
pub const INPUT_FORMAT: InputFormat = InputFormat::Single;

/// Wire contract of one deployment: what the sink receives and what the
/// input line carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Variant {
    pub layout: PacketLayout,
    pub input: InputFormat,
}

impl Variant {
    /// Variant selected by the constants above.
    pub const fn from_config() -> Self {
        Self {
            layout: PACKET_LAYOUT,
            input: INPUT_FORMAT,
        }
    }
}
