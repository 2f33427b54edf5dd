//! Unified error types for ble-relay.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.
//!
//! None of these are fatal. Every loop logs the error and carries on
//! with its next period.

/// Top-level error type used across the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Upstream (central role) link failure.
    Link(LinkFault),

    /// External input record was rejected.
    Input(InputError),

    /// Downstream (peripheral role) publish failure.
    Sink(SinkError),
}

/// Transient failures of the link to the source.
///
/// All of them are recovered by the periodic reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkFault {
    /// The source did not answer at its fixed address.
    ConnectFailed,
    /// The source service is absent.
    ServiceNotFound,
    /// A required characteristic is absent.
    CharacteristicNotFound,
    /// The sensor characteristic exists but cannot notify.
    NotifyUnsupported,
    /// Enabling notifications (CCCD write) failed.
    SubscribeFailed,
    /// GATT write to the control characteristic failed.
    WriteFailed,
    /// Operation needs a live link (or a control characteristic) and there is none.
    NotConnected,
    /// Service discovery aborted by a GATT or stack error.
    DiscoveryFailed,
}

/// Reasons an external input record is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputError {
    /// Blank line.
    Empty,
    /// A field is not an unsigned decimal integer.
    NotANumber,
    /// A field does not fit in one byte.
    OutOfRange,
    /// Two-field record without a comma.
    MissingSeparator,
    /// More fields than the input format carries.
    TooManyFields,
    /// Line exceeded the input buffer and was discarded.
    LineTooLong,
}

/// Failures of the downstream "set value + notify" primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SinkError {
    /// The stack refused to queue the notification.
    NotifyFailed,
    /// The sink is attached but has not enabled notifications.
    NotSubscribed,
    /// Packet wider than the relay characteristic.
    PacketTooLarge,
}

// Convenience conversions

impl From<LinkFault> for Error {
    fn from(e: LinkFault) -> Self {
        Error::Link(e)
    }
}

impl From<InputError> for Error {
    fn from(e: InputError) -> Self {
        Error::Input(e)
    }
}

impl From<SinkError> for Error {
    fn from(e: SinkError) -> Self {
        Error::Sink(e)
    }
}
