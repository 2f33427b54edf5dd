//! Dual-role BLE relay core.
//!
//! The relay sits between a fixed BLE source (central role) and one
//! downstream subscriber (peripheral role). Source notifications and
//! UART command records land in a shared reading cache; a periodic loop
//! republishes the cache to the subscriber as a small fixed-layout packet.
//!
//! Everything here is transport-agnostic and builds for the host, so
//! `cargo test` runs the whole core without hardware. The nRF52840
//! firmware in `main.rs` (feature `embedded`) plugs the SoftDevice and
//! UARTE into the traits defined here.
//!
//! Logging goes through `defmt` (feature `defmt`) or the `log` facade
//! (feature `log`); with neither enabled it compiles away.

#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible to every module.
mod fmt;

pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod link;
pub mod packet;
pub mod reading;
pub mod relay;
pub mod schedule;

pub use command::{parse_record, Command, CommandPath, InputFormat, LineBuffer};
pub use context::RelayContext;
pub use error::{Error, InputError, LinkFault, SinkError};
pub use events::{Advertiser, ConnectionEvents, SinkEvent, SinkSession};
pub use link::{LinkState, SourceCentral, SourceEvent, SourceProfile, UpstreamLink};
pub use packet::{PacketLayout, RelayPacket};
pub use reading::{Field, Reading, ReadingCache};
pub use relay::{RelayLoop, SinkNotifier, TickOutcome};
pub use schedule::Cadence;
