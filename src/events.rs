//! Downstream connection events.
//!
//! Keeps the sink attachment flag in step with the peripheral role and
//! restarts advertising whenever the sink goes away.

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::context::RelayContext;
use crate::error::SinkError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SinkEvent {
    Attached,
    Detached,
}

/// Makes the relay discoverable to sinks again.
pub trait Advertiser {
    fn start_advertising(&mut self);
}

pub struct ConnectionEvents<'a, M: RawMutex, A: Advertiser> {
    ctx: &'a RelayContext<M>,
    advertiser: A,
}

impl<'a, M: RawMutex, A: Advertiser> ConnectionEvents<'a, M, A> {
    pub fn new(ctx: &'a RelayContext<M>, advertiser: A) -> Self {
        Self { ctx, advertiser }
    }

    pub fn advertiser(&self) -> &A {
        &self.advertiser
    }

    /// Apply one event. Repeats are applied as-is.
    pub fn handle(&mut self, event: SinkEvent) {
        match event {
            SinkEvent::Attached => {
                self.ctx.set_sink_attached(true);
                info!("sink: attached");
            }
            SinkEvent::Detached => {
                self.ctx.set_sink_attached(false);
                info!("sink: detached, advertising again");
                self.advertiser.start_advertising();
            }
        }
    }
}

/// The attached sink's connection and whether it has enabled
/// notifications on the relay characteristic.
///
/// Generic over the transport's connection handle. Detaching always
/// clears the subscription; a fresh connection starts unsubscribed.
pub struct SinkSession<C> {
    conn: Option<C>,
    notifications: bool,
}

impl<C> SinkSession<C> {
    pub const fn new() -> Self {
        Self {
            conn: None,
            notifications: false,
        }
    }

    pub fn attach(&mut self, conn: C) {
        self.conn = Some(conn);
        self.notifications = false;
    }

    pub fn detach(&mut self) -> Option<C> {
        self.notifications = false;
        self.conn.take()
    }

    /// CCCD write from the sink. Ignored while nothing is attached.
    pub fn set_notifications(&mut self, enabled: bool) {
        self.notifications = enabled && self.conn.is_some();
    }

    pub fn is_attached(&self) -> bool {
        self.conn.is_some()
    }

    /// Connection to notify on, or `None` if nobody is subscribed.
    pub fn subscriber(&self) -> Option<&C> {
        if self.notifications {
            self.conn.as_ref()
        } else {
            None
        }
    }

    /// Store a packet as the characteristic value, then notify the
    /// subscriber if there is one.
    ///
    /// A failed store is reported even when nobody is subscribed.
    pub fn publish<E>(
        &self,
        set_value: impl FnOnce() -> Result<(), E>,
        notify: impl FnOnce(&C) -> Result<(), E>,
    ) -> Result<(), SinkError> {
        set_value().map_err(|_| SinkError::NotifyFailed)?;
        match self.subscriber() {
            Some(conn) => notify(conn).map_err(|_| SinkError::NotifyFailed),
            None => Ok(()),
        }
    }
}

impl<C> Default for SinkSession<C> {
    fn default() -> Self {
        Self::new()
    }
}
