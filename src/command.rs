//! Downstream command path - external input records.
//!
//! Records arrive one per line from the UART. Depending on the deployment
//! a record is a single integer (a control value for the source) or two
//! comma-separated integers (posture, movement). A valid record updates the
//! reading cache and, while the upstream link is connected, is handed to
//! the link manager as a control write. A malformed record changes nothing.

use embassy_sync::blocking_mutex::raw::RawMutex;
use heapless::Vec;

use crate::context::RelayContext;
use crate::error::InputError;
use crate::link::{ControlWrite, LinkState};
use crate::reading::Field;

/// Shape of the records this deployment accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputFormat {
    /// `"<value>"`
    Single,
    /// `"<posture>,<movement>"`
    Pair,
}

/// A validated input record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    Value(u8),
    Posture { posture: u8, movement: u8 },
}

impl Command {
    /// Cache fields this record sets.
    pub fn fields(&self) -> Vec<(Field, u8), 2> {
        let mut fields = Vec::new();
        match *self {
            Command::Value(v) => {
                let _ = fields.push((Field::Secondary, v));
            }
            Command::Posture { posture, movement } => {
                let _ = fields.push((Field::Secondary, posture));
                let _ = fields.push((Field::Tertiary, movement));
            }
        }
        fields
    }

    /// Bytes forwarded to the source's control characteristic.
    pub fn payload(&self) -> ControlWrite {
        let mut payload = ControlWrite::new();
        match *self {
            Command::Value(v) => {
                let _ = payload.push(v);
            }
            Command::Posture { posture, movement } => {
                let _ = payload.push(posture);
                let _ = payload.push(movement);
            }
        }
        payload
    }
}

/// Validate one record.
///
/// Fields are unsigned decimal integers that fit in a byte; surrounding
/// whitespace is ignored.
pub fn parse_record(record: &str, format: InputFormat) -> Result<Command, InputError> {
    let record = record.trim();
    if record.is_empty() {
        return Err(InputError::Empty);
    }

    match format {
        InputFormat::Single => {
            if record.contains(',') {
                return Err(InputError::TooManyFields);
            }
            parse_field(record).map(Command::Value)
        }
        InputFormat::Pair => {
            let (posture, movement) = record
                .split_once(',')
                .ok_or(InputError::MissingSeparator)?;
            if movement.contains(',') {
                return Err(InputError::TooManyFields);
            }
            Ok(Command::Posture {
                posture: parse_field(posture)?,
                movement: parse_field(movement)?,
            })
        }
    }
}

fn parse_field(field: &str) -> Result<u8, InputError> {
    let field = field.trim();
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(InputError::NotANumber);
    }
    // All digits, so the only possible parse failure is overflow.
    let value: u32 = field.parse().map_err(|_| InputError::OutOfRange)?;
    u8::try_from(value).map_err(|_| InputError::OutOfRange)
}

/// Applies input records to the shared state.
pub struct CommandPath<'a, M: RawMutex> {
    ctx: &'a RelayContext<M>,
    format: InputFormat,
    last: Option<Command>,
}

impl<'a, M: RawMutex> CommandPath<'a, M> {
    pub fn new(ctx: &'a RelayContext<M>, format: InputFormat) -> Self {
        Self {
            ctx,
            format,
            last: None,
        }
    }

    /// Most recent accepted record.
    pub fn last(&self) -> Option<Command> {
        self.last
    }

    /// Handle one record: validate, cache, forward if the source is up.
    pub async fn handle_record(&mut self, record: &str) -> Result<Command, InputError> {
        let command = match parse_record(record, self.format) {
            Ok(command) => command,
            Err(e) => {
                debug!("input: record dropped: {:?}", e);
                return Err(e);
            }
        };

        self.ctx.cache.update_many(&command.fields()).await;
        self.last = Some(command);

        if self.ctx.link_state() == LinkState::Connected {
            self.ctx.control.signal(command.payload());
            info!("input: {:?} forwarded to source", command);
        } else {
            info!("input: {:?} kept locally, source not connected", command);
        }
        Ok(command)
    }
}

/// Accumulates input bytes into newline-terminated records.
///
/// `\r` is ignored. A line longer than `N` bytes is discarded whole and
/// reported once its terminator arrives.
pub struct LineBuffer<const N: usize> {
    buf: Vec<u8, N>,
    overflowed: bool,
    complete: bool,
}

impl<const N: usize> LineBuffer<N> {
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            overflowed: false,
            complete: false,
        }
    }

    /// Feed one byte; returns the finished line when `byte` ends one.
    pub fn push(&mut self, byte: u8) -> Option<Result<&str, InputError>> {
        if self.complete {
            self.buf.clear();
            self.complete = false;
        }

        match byte {
            b'\r' => None,
            b'\n' => {
                self.complete = true;
                if self.overflowed {
                    self.overflowed = false;
                    return Some(Err(InputError::LineTooLong));
                }
                Some(core::str::from_utf8(&self.buf).map_err(|_| InputError::NotANumber))
            }
            _ => {
                if !self.overflowed && self.buf.push(byte).is_err() {
                    self.overflowed = true;
                }
                None
            }
        }
    }
}

impl<const N: usize> Default for LineBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
