//! Upstream link manager - central-role connection to the source.
//!
//! Owns the whole lifecycle of the one link this device keeps as a BLE
//! central:
//!
//! 1. **Connect** to the source's fixed address.
//! 2. **Discover** the fixed service, the sensor characteristic and
//!    (optionally) the control characteristic.
//! 3. **Subscribe** to sensor notifications.
//! 4. **Route** each notification into the shared reading cache.
//! 5. **Detect** link loss and retry on a fixed cadence, forever.
//!
//! The transport sits behind [`SourceCentral`]. Notifications and link-loss
//! events come back through the context's bounded `source_events` channel
//! rather than callbacks, so only this module ever sees them.

use core::sync::atomic::{AtomicU8, Ordering};

use embassy_futures::select::{select3, Either3};
use embassy_sync::blocking_mutex::raw::RawMutex;
use heapless::Vec;

use crate::config::{
    NOTIFICATION_MAX, SOURCE_ADDRESS, SOURCE_CONTROL_UUID, SOURCE_SENSOR_OFFSET,
    SOURCE_SENSOR_UUID, SOURCE_SERVICE_UUID,
};
use crate::context::RelayContext;
use crate::error::LinkFault;
use crate::reading::Field;
use crate::schedule::Cadence;

/// Widest control write forwarded to the source.
pub const CONTROL_MAX: usize = 2;

/// Bytes queued for the source's control characteristic.
pub type ControlWrite = Vec<u8, CONTROL_MAX>;

/// Upstream link state. Only [`UpstreamLink`] moves it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum LinkState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

/// Single-writer atomic cell holding a [`LinkState`].
pub struct LinkStatus(AtomicU8);

impl LinkStatus {
    pub const fn new() -> Self {
        Self(AtomicU8::new(LinkState::Disconnected as u8))
    }

    pub fn get(&self) -> LinkState {
        match self.0.load(Ordering::Acquire) {
            2 => LinkState::Connected,
            1 => LinkState::Connecting,
            _ => LinkState::Disconnected,
        }
    }

    pub fn set(&self, state: LinkState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

impl Default for LinkStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed identity of the source. Configuration, never discovered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SourceProfile {
    /// Peer address, most-significant byte first.
    pub address: [u8; 6],
    pub service: u16,
    /// Notifying characteristic carrying the sensor reading.
    pub sensor: u16,
    /// Writable characteristic for outbound control values.
    pub control: Option<u16>,
    /// Payload byte routed into the primary reading.
    pub sensor_offset: usize,
}

impl SourceProfile {
    pub const fn from_config() -> Self {
        Self {
            address: SOURCE_ADDRESS,
            service: SOURCE_SERVICE_UUID,
            sensor: SOURCE_SENSOR_UUID,
            control: Some(SOURCE_CONTROL_UUID),
            sensor_offset: SOURCE_SENSOR_OFFSET,
        }
    }
}

/// A characteristic resolved on the connected source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RemoteCharacteristic {
    pub uuid: u16,
    /// Value handle on the peer's attribute table.
    pub handle: u16,
    pub can_notify: bool,
    pub can_write: bool,
}

/// Data pushed by the source on a subscribed characteristic.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Notification {
    /// UUID of the notifying characteristic.
    pub characteristic: u16,
    pub payload: Vec<u8, NOTIFICATION_MAX>,
}

impl Notification {
    /// Copy `data`, keeping at most `NOTIFICATION_MAX` bytes.
    pub fn new(characteristic: u16, data: &[u8]) -> Self {
        let keep = data.len().min(NOTIFICATION_MAX);
        let mut payload = Vec::new();
        let _ = payload.extend_from_slice(&data[..keep]);
        Self {
            characteristic,
            payload,
        }
    }
}

/// Events the transport delivers to the link manager.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SourceEvent {
    Notification(Notification),
    /// The transport saw the connection drop.
    LinkLost,
}

/// Central-role transport primitives the link manager drives.
///
/// Each call may block on radio I/O; only the link manager's own task
/// ever awaits them.
#[allow(async_fn_in_trait)]
pub trait SourceCentral {
    /// Open a connection to `address`. Timeout is the transport's own.
    async fn connect(&mut self, address: &[u8; 6]) -> Result<(), LinkFault>;

    /// Resolve the service on the open connection.
    async fn discover_service(&mut self, uuid: u16) -> Result<(), LinkFault>;

    /// Resolve one characteristic of the discovered service.
    async fn discover_characteristic(&mut self, uuid: u16)
        -> Result<RemoteCharacteristic, LinkFault>;

    /// Enable notifications; they arrive later as [`SourceEvent`]s.
    async fn subscribe(&mut self, characteristic: &RemoteCharacteristic) -> Result<(), LinkFault>;

    async fn write(
        &mut self,
        characteristic: &RemoteCharacteristic,
        data: &[u8],
    ) -> Result<(), LinkFault>;

    /// Tear down whatever part of the connection exists. Never fails.
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;
}

/// The upstream link manager.
pub struct UpstreamLink<'a, M: RawMutex, C: SourceCentral> {
    ctx: &'a RelayContext<M>,
    central: C,
    profile: SourceProfile,
    sensor: Option<RemoteCharacteristic>,
    control: Option<RemoteCharacteristic>,
    failed_attempts: u32,
}

impl<'a, M: RawMutex, C: SourceCentral> UpstreamLink<'a, M, C> {
    pub fn new(ctx: &'a RelayContext<M>, central: C, profile: SourceProfile) -> Self {
        Self {
            ctx,
            central,
            profile,
            sensor: None,
            control: None,
            failed_attempts: 0,
        }
    }

    pub fn state(&self) -> LinkState {
        self.ctx.link_state()
    }

    pub fn central(&self) -> &C {
        &self.central
    }

    pub fn central_mut(&mut self) -> &mut C {
        &mut self.central
    }

    /// Consecutive failed connect attempts since the last success.
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Run one full connect sequence if currently disconnected.
    ///
    /// A failure tears down any partial connection and leaves the link
    /// `Disconnected`; the caller retries on its next period.
    pub async fn ensure_connected(&mut self) -> Result<(), LinkFault> {
        if self.state() != LinkState::Disconnected {
            return Ok(());
        }

        self.ctx.set_link_state(LinkState::Connecting);
        info!(
            "upstream: connecting (attempt {})",
            self.failed_attempts.saturating_add(1)
        );

        match self.connect_sequence().await {
            Ok(()) => {
                self.ctx.set_link_state(LinkState::Connected);
                self.failed_attempts = 0;
                info!(
                    "upstream: connected (control characteristic: {})",
                    self.control.is_some()
                );
                Ok(())
            }
            Err(fault) => {
                self.central.disconnect();
                self.sensor = None;
                self.control = None;
                self.ctx.set_link_state(LinkState::Disconnected);
                self.failed_attempts = self.failed_attempts.saturating_add(1);
                warn!(
                    "upstream: connect attempt {} failed: {:?}",
                    self.failed_attempts, fault
                );
                Err(fault)
            }
        }
    }

    async fn connect_sequence(&mut self) -> Result<(), LinkFault> {
        self.central.connect(&self.profile.address).await?;
        self.central.discover_service(self.profile.service).await?;

        let sensor = self
            .central
            .discover_characteristic(self.profile.sensor)
            .await?;
        if !sensor.can_notify {
            return Err(LinkFault::NotifyUnsupported);
        }

        let control = match self.profile.control {
            Some(uuid) => match self.central.discover_characteristic(uuid).await {
                Ok(c) if c.can_write => Some(c),
                Ok(_) => {
                    warn!("upstream: control characteristic is not writable");
                    None
                }
                Err(LinkFault::CharacteristicNotFound) => {
                    warn!("upstream: control characteristic not found");
                    None
                }
                Err(fault) => return Err(fault),
            },
            None => None,
        };

        self.central.subscribe(&sensor).await?;

        self.sensor = Some(sensor);
        self.control = control;
        Ok(())
    }

    /// Cache the sensor byte of a notification.
    pub async fn on_notification(&self, notification: &Notification) {
        let Some(sensor) = self.sensor else {
            trace!("upstream: notification while not subscribed");
            return;
        };
        if notification.characteristic != sensor.uuid {
            trace!(
                "upstream: ignoring notification from {}",
                notification.characteristic
            );
            return;
        }
        let Some(&value) = notification.payload.get(self.profile.sensor_offset) else {
            debug!(
                "upstream: notification too short ({} bytes)",
                notification.payload.len()
            );
            return;
        };

        self.ctx.cache.update(Field::Primary, value).await;
        debug!("upstream: reading {}", value);
    }

    /// Write to the control characteristic. Only valid while connected.
    pub async fn write_to_source(&mut self, data: &[u8]) -> Result<(), LinkFault> {
        let control = match (self.state(), self.control) {
            (LinkState::Connected, Some(control)) => control,
            _ => {
                warn!("upstream: not connected, control write dropped");
                return Err(LinkFault::NotConnected);
            }
        };

        match self.central.write(&control, data).await {
            Ok(()) => {
                debug!("upstream: wrote {} bytes to control", data.len());
                Ok(())
            }
            Err(fault) => {
                warn!("upstream: control write failed: {:?}", fault);
                Err(fault)
            }
        }
    }

    pub async fn handle_event(&mut self, event: SourceEvent) {
        match event {
            SourceEvent::Notification(notification) => self.on_notification(&notification).await,
            SourceEvent::LinkLost => self.on_link_lost(),
        }
    }

    fn on_link_lost(&mut self) {
        if self.state() == LinkState::Disconnected {
            return;
        }
        // A loss report from an earlier session can arrive after a reconnect.
        if self.state() == LinkState::Connected && self.central.is_connected() {
            debug!("upstream: stale link-lost event ignored");
            return;
        }
        self.mark_disconnected();
    }

    fn mark_disconnected(&mut self) {
        self.central.disconnect();
        self.sensor = None;
        self.control = None;
        self.ctx.set_link_state(LinkState::Disconnected);
        warn!("upstream: link lost");
    }

    /// One retry period: notice a dropped link, reconnect if needed.
    pub async fn step(&mut self) -> LinkState {
        if self.state() == LinkState::Connected && !self.central.is_connected() {
            self.mark_disconnected();
        }
        if self.state() == LinkState::Disconnected {
            let _ = self.ensure_connected().await;
        }
        self.state()
    }

    /// Drive the link forever.
    ///
    /// Retries every period with no backoff and no attempt cap; the source
    /// sits at a fixed address and is assumed to come back eventually.
    pub async fn run(&mut self, cadence: &mut impl Cadence) -> ! {
        let ctx = self.ctx;
        loop {
            self.step().await;
            loop {
                match select3(cadence.wait(), ctx.source_events.receive(), ctx.control.wait()).await
                {
                    Either3::First(()) => break,
                    Either3::Second(event) => self.handle_event(event).await,
                    Either3::Third(write) => {
                        let _ = self.write_to_source(&write).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Ticks;
    use embassy_futures::block_on;
    use embassy_futures::select::select;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use std::vec::Vec as StdVec;

    const SENSOR: RemoteCharacteristic = RemoteCharacteristic {
        uuid: SOURCE_SENSOR_UUID,
        handle: 0x0010,
        can_notify: true,
        can_write: false,
    };

    const CONTROL: RemoteCharacteristic = RemoteCharacteristic {
        uuid: SOURCE_CONTROL_UUID,
        handle: 0x0014,
        can_notify: false,
        can_write: true,
    };

    struct MockCentral {
        connect_failures: usize,
        connects: usize,
        disconnects: usize,
        connected: bool,
        service_present: bool,
        discovery_fault: Option<LinkFault>,
        sensor: Option<RemoteCharacteristic>,
        control: Option<RemoteCharacteristic>,
        subscribe_ok: bool,
        subscribed: bool,
        write_ok: bool,
        writes: StdVec<StdVec<u8>>,
    }

    impl MockCentral {
        fn healthy() -> Self {
            Self {
                connect_failures: 0,
                connects: 0,
                disconnects: 0,
                connected: false,
                service_present: true,
                discovery_fault: None,
                sensor: Some(SENSOR),
                control: Some(CONTROL),
                subscribe_ok: true,
                subscribed: false,
                write_ok: true,
                writes: StdVec::new(),
            }
        }
    }

    impl SourceCentral for MockCentral {
        async fn connect(&mut self, address: &[u8; 6]) -> Result<(), LinkFault> {
            assert_eq!(address, &SOURCE_ADDRESS);
            self.connects += 1;
            if self.connect_failures > 0 {
                self.connect_failures -= 1;
                return Err(LinkFault::ConnectFailed);
            }
            self.connected = true;
            Ok(())
        }

        async fn discover_service(&mut self, uuid: u16) -> Result<(), LinkFault> {
            assert_eq!(uuid, SOURCE_SERVICE_UUID);
            if let Some(fault) = self.discovery_fault {
                return Err(fault);
            }
            if self.service_present {
                Ok(())
            } else {
                Err(LinkFault::ServiceNotFound)
            }
        }

        async fn discover_characteristic(
            &mut self,
            uuid: u16,
        ) -> Result<RemoteCharacteristic, LinkFault> {
            [self.sensor, self.control]
                .into_iter()
                .flatten()
                .find(|c| c.uuid == uuid)
                .ok_or(LinkFault::CharacteristicNotFound)
        }

        async fn subscribe(&mut self, characteristic: &RemoteCharacteristic) -> Result<(), LinkFault> {
            assert_eq!(characteristic.uuid, SOURCE_SENSOR_UUID);
            if self.subscribe_ok {
                self.subscribed = true;
                Ok(())
            } else {
                Err(LinkFault::SubscribeFailed)
            }
        }

        async fn write(
            &mut self,
            characteristic: &RemoteCharacteristic,
            data: &[u8],
        ) -> Result<(), LinkFault> {
            assert_eq!(characteristic.uuid, SOURCE_CONTROL_UUID);
            if !self.write_ok {
                return Err(LinkFault::WriteFailed);
            }
            self.writes.push(data.to_vec());
            Ok(())
        }

        fn disconnect(&mut self) {
            self.disconnects += 1;
            self.connected = false;
            self.subscribed = false;
        }

        fn is_connected(&self) -> bool {
            self.connected
        }
    }

    fn link<'a>(
        ctx: &'a RelayContext<NoopRawMutex>,
        central: MockCentral,
    ) -> UpstreamLink<'a, NoopRawMutex, MockCentral> {
        UpstreamLink::new(ctx, central, SourceProfile::from_config())
    }

    #[test]
    fn connects_on_first_attempt() {
        let ctx: RelayContext<NoopRawMutex> = RelayContext::new();
        let mut link = link(&ctx, MockCentral::healthy());

        assert_eq!(block_on(link.ensure_connected()), Ok(()));
        assert_eq!(ctx.link_state(), LinkState::Connected);
        assert!(link.central().subscribed);
        assert_eq!(link.failed_attempts(), 0);
    }

    #[test]
    fn ensure_connected_is_a_no_op_when_connected() {
        let ctx: RelayContext<NoopRawMutex> = RelayContext::new();
        let mut link = link(&ctx, MockCentral::healthy());

        block_on(link.ensure_connected()).unwrap();
        block_on(link.ensure_connected()).unwrap();
        assert_eq!(link.central().connects, 1);
    }

    #[test]
    fn unreachable_source_stays_disconnected() {
        let ctx: RelayContext<NoopRawMutex> = RelayContext::new();
        let mut central = MockCentral::healthy();
        central.connect_failures = 1;
        let mut link = link(&ctx, central);

        assert_eq!(
            block_on(link.ensure_connected()),
            Err(LinkFault::ConnectFailed)
        );
        assert_eq!(ctx.link_state(), LinkState::Disconnected);
        assert_eq!(link.failed_attempts(), 1);
    }

    #[test]
    fn missing_service_tears_down_partial_link() {
        let ctx: RelayContext<NoopRawMutex> = RelayContext::new();
        let mut central = MockCentral::healthy();
        central.service_present = false;
        let mut link = link(&ctx, central);

        assert_eq!(
            block_on(link.ensure_connected()),
            Err(LinkFault::ServiceNotFound)
        );
        assert_eq!(ctx.link_state(), LinkState::Disconnected);
        assert!(!link.central().connected);
        assert_eq!(link.central().disconnects, 1);
    }

    #[test]
    fn discovery_error_is_not_reported_as_missing_service() {
        let ctx: RelayContext<NoopRawMutex> = RelayContext::new();
        let mut central = MockCentral::healthy();
        central.discovery_fault = Some(LinkFault::DiscoveryFailed);
        let mut link = link(&ctx, central);

        assert_eq!(
            block_on(link.ensure_connected()),
            Err(LinkFault::DiscoveryFailed)
        );
        assert_eq!(ctx.link_state(), LinkState::Disconnected);
        assert_eq!(link.central().disconnects, 1);

        // Transient: the next period connects.
        link.central_mut().discovery_fault = None;
        assert_eq!(block_on(link.step()), LinkState::Connected);
    }

    #[test]
    fn missing_sensor_characteristic_aborts() {
        let ctx: RelayContext<NoopRawMutex> = RelayContext::new();
        let mut central = MockCentral::healthy();
        central.sensor = None;
        let mut link = link(&ctx, central);

        assert_eq!(
            block_on(link.ensure_connected()),
            Err(LinkFault::CharacteristicNotFound)
        );
        assert_eq!(ctx.link_state(), LinkState::Disconnected);
        assert!(!link.central().connected);
    }

    #[test]
    fn non_notifying_sensor_aborts() {
        let ctx: RelayContext<NoopRawMutex> = RelayContext::new();
        let mut central = MockCentral::healthy();
        central.sensor = Some(RemoteCharacteristic {
            can_notify: false,
            ..SENSOR
        });
        let mut link = link(&ctx, central);

        assert_eq!(
            block_on(link.ensure_connected()),
            Err(LinkFault::NotifyUnsupported)
        );
        assert_eq!(ctx.link_state(), LinkState::Disconnected);
    }

    #[test]
    fn subscribe_failure_aborts() {
        let ctx: RelayContext<NoopRawMutex> = RelayContext::new();
        let mut central = MockCentral::healthy();
        central.subscribe_ok = false;
        let mut link = link(&ctx, central);

        assert_eq!(
            block_on(link.ensure_connected()),
            Err(LinkFault::SubscribeFailed)
        );
        assert_eq!(ctx.link_state(), LinkState::Disconnected);
        assert!(!link.central().connected);
    }

    #[test]
    fn missing_control_characteristic_still_connects() {
        let ctx: RelayContext<NoopRawMutex> = RelayContext::new();
        let mut central = MockCentral::healthy();
        central.control = None;
        let mut link = link(&ctx, central);

        block_on(link.ensure_connected()).unwrap();
        assert_eq!(ctx.link_state(), LinkState::Connected);
        assert_eq!(
            block_on(link.write_to_source(&[1])),
            Err(LinkFault::NotConnected)
        );
    }

    #[test]
    fn notification_updates_primary_reading() {
        let ctx: RelayContext<NoopRawMutex> = RelayContext::new();
        let mut link = link(&ctx, MockCentral::healthy());
        block_on(link.ensure_connected()).unwrap();

        block_on(link.on_notification(&Notification::new(SOURCE_SENSOR_UUID, &[72, 0xFF])));
        assert_eq!(block_on(ctx.cache.snapshot()).primary, 72);

        block_on(link.on_notification(&Notification::new(SOURCE_SENSOR_UUID, &[75])));
        assert_eq!(block_on(ctx.cache.snapshot()).primary, 75);
    }

    #[test]
    fn notification_offset_selects_payload_byte() {
        let ctx: RelayContext<NoopRawMutex> = RelayContext::new();
        let profile = SourceProfile {
            sensor_offset: 1,
            ..SourceProfile::from_config()
        };
        let mut link = UpstreamLink::new(&ctx, MockCentral::healthy(), profile);
        block_on(link.ensure_connected()).unwrap();

        block_on(link.on_notification(&Notification::new(SOURCE_SENSOR_UUID, &[0x00, 64])));
        assert_eq!(block_on(ctx.cache.snapshot()).primary, 64);

        // Too short for the offset: ignored.
        block_on(link.on_notification(&Notification::new(SOURCE_SENSOR_UUID, &[9])));
        assert_eq!(block_on(ctx.cache.snapshot()).primary, 64);
    }

    #[test]
    fn empty_or_foreign_notifications_are_ignored() {
        let ctx: RelayContext<NoopRawMutex> = RelayContext::new();
        let mut link = link(&ctx, MockCentral::healthy());
        block_on(link.ensure_connected()).unwrap();

        block_on(link.on_notification(&Notification::new(SOURCE_SENSOR_UUID, &[])));
        block_on(link.on_notification(&Notification::new(0x2A19, &[55])));
        assert_eq!(block_on(ctx.cache.snapshot()).primary, 0);
    }

    #[test]
    fn notification_payload_is_capped() {
        let data = [7u8; 64];
        let n = Notification::new(SOURCE_SENSOR_UUID, &data);
        assert_eq!(n.payload.len(), NOTIFICATION_MAX);
    }

    #[test]
    fn write_to_source_requires_connection() {
        let ctx: RelayContext<NoopRawMutex> = RelayContext::new();
        let mut link = link(&ctx, MockCentral::healthy());

        assert_eq!(
            block_on(link.write_to_source(&[5])),
            Err(LinkFault::NotConnected)
        );
        assert!(link.central().writes.is_empty());

        block_on(link.ensure_connected()).unwrap();
        assert_eq!(block_on(link.write_to_source(&[5])), Ok(()));
        assert_eq!(link.central().writes, [[5u8].to_vec()]);
    }

    #[test]
    fn write_failure_is_reported_not_fatal() {
        let ctx: RelayContext<NoopRawMutex> = RelayContext::new();
        let mut central = MockCentral::healthy();
        central.write_ok = false;
        let mut link = link(&ctx, central);
        block_on(link.ensure_connected()).unwrap();

        assert_eq!(
            block_on(link.write_to_source(&[5])),
            Err(LinkFault::WriteFailed)
        );
        assert_eq!(ctx.link_state(), LinkState::Connected);
    }

    #[test]
    fn link_lost_event_disconnects() {
        let ctx: RelayContext<NoopRawMutex> = RelayContext::new();
        let mut link = link(&ctx, MockCentral::healthy());
        block_on(link.ensure_connected()).unwrap();

        link.central.connected = false;
        block_on(link.handle_event(SourceEvent::LinkLost));
        assert_eq!(ctx.link_state(), LinkState::Disconnected);
    }

    #[test]
    fn stale_link_lost_event_is_ignored() {
        let ctx: RelayContext<NoopRawMutex> = RelayContext::new();
        let mut link = link(&ctx, MockCentral::healthy());
        block_on(link.ensure_connected()).unwrap();

        block_on(link.handle_event(SourceEvent::LinkLost));
        assert_eq!(ctx.link_state(), LinkState::Connected);
    }

    #[test]
    fn step_detects_drop_and_reconnects() {
        let ctx: RelayContext<NoopRawMutex> = RelayContext::new();
        let mut link = link(&ctx, MockCentral::healthy());
        assert_eq!(block_on(link.step()), LinkState::Connected);

        link.central.connected = false;
        assert_eq!(block_on(link.step()), LinkState::Connected);
        assert_eq!(link.central().connects, 2);
    }

    #[test]
    fn reaches_connected_after_k_failures_within_k_plus_one_periods() {
        const K: usize = 4;
        let ctx: RelayContext<NoopRawMutex> = RelayContext::new();
        let mut central = MockCentral::healthy();
        central.connect_failures = K;
        let mut link = link(&ctx, central);
        // Initial attempt plus one per period.
        let mut ticks = Ticks(K);

        block_on(select(link.run(&mut ticks), core::future::ready(())));

        assert_eq!(ctx.link_state(), LinkState::Connected);
        assert_eq!(link.central().connects, K + 1);
        assert_eq!(link.failed_attempts(), 0);
    }

    #[test]
    fn at_most_one_attempt_per_period() {
        let ctx: RelayContext<NoopRawMutex> = RelayContext::new();
        let mut central = MockCentral::healthy();
        central.connect_failures = usize::MAX;
        let mut link = link(&ctx, central);
        let mut ticks = Ticks(9);

        block_on(select(link.run(&mut ticks), core::future::ready(())));

        assert_eq!(ctx.link_state(), LinkState::Disconnected);
        assert_eq!(link.central().connects, 10);
        assert_eq!(link.failed_attempts(), 10);
    }

    #[test]
    fn run_routes_queued_events_and_control_writes() {
        let ctx: RelayContext<NoopRawMutex> = RelayContext::new();
        let mut link = link(&ctx, MockCentral::healthy());

        ctx.source_events
            .try_send(SourceEvent::Notification(Notification::new(
                SOURCE_SENSOR_UUID,
                &[88],
            )))
            .unwrap();
        ctx.control.signal(ControlWrite::from_slice(&[3]).unwrap());

        let mut ticks = Ticks(0);
        block_on(select(link.run(&mut ticks), core::future::ready(())));

        assert_eq!(block_on(ctx.cache.snapshot()).primary, 88);
        assert_eq!(link.central().writes, [[3u8].to_vec()]);
    }
}
