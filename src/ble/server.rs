//! Peripheral-role transport for the downstream sink.
//!
//! Exposes the relay service with a single notify characteristic and
//! runs the advertise / serve cycle. Attachment changes are reported to
//! [`ConnectionEvents`]; the relay loop publishes through
//! [`SoftdeviceSink`].

use core::cell::RefCell;

use ble_relay::config;
use ble_relay::error::SinkError;
use ble_relay::events::{Advertiser, ConnectionEvents, SinkEvent, SinkSession};
use ble_relay::packet::MAX_PACKET_LEN;
use ble_relay::relay::SinkNotifier;
use ble_relay::RelayContext;
use defmt::{info, warn};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};
use nrf_softdevice::ble::advertisement_builder::{
    Flag, LegacyAdvertisementBuilder, LegacyAdvertisementPayload, ServiceList,
};
use nrf_softdevice::ble::{gatt_server, peripheral, Connection};
use nrf_softdevice::Softdevice;

#[nrf_softdevice::gatt_service(uuid = "12345678-1234-5678-1234-56789abcdef0")]
pub struct RelayService {
    #[characteristic(uuid = "abcdefab-cdef-1234-5678-1234567890ab", notify)]
    pub packet: heapless::Vec<u8, MAX_PACKET_LEN>,
}

#[nrf_softdevice::gatt_server]
pub struct Server {
    pub relay: RelayService,
}

/// The attached sink, if any, and its notification subscription.
pub type SinkConnection = Mutex<CriticalSectionRawMutex, RefCell<SinkSession<Connection>>>;

/// Raised whenever advertising should (re)start.
pub type AdvertiseSignal = Signal<CriticalSectionRawMutex, ()>;

/// [`SinkNotifier`] over the GATT server.
pub struct SoftdeviceSink {
    server: &'static Server,
    conn: &'static SinkConnection,
}

impl SoftdeviceSink {
    pub fn new(server: &'static Server, conn: &'static SinkConnection) -> Self {
        Self { server, conn }
    }
}

impl SinkNotifier for SoftdeviceSink {
    fn publish(&mut self, data: &[u8]) -> Result<(), SinkError> {
        let value = heapless::Vec::from_slice(data).map_err(|_| SinkError::PacketTooLarge)?;
        let relay = &self.server.relay;

        self.conn.lock(|session| {
            session.borrow().publish(
                || relay.packet_set(&value).map_err(|e| warn!("packet set: {:?}", e)),
                |conn| {
                    relay
                        .packet_notify(conn, &value)
                        .map_err(|e| warn!("packet notify: {:?}", e))
                },
            )
        })
    }
}

/// [`Advertiser`] that wakes [`sink_task`].
pub struct SignalAdvertiser {
    signal: &'static AdvertiseSignal,
}

impl SignalAdvertiser {
    pub fn new(signal: &'static AdvertiseSignal) -> Self {
        Self { signal }
    }
}

impl Advertiser for SignalAdvertiser {
    fn start_advertising(&mut self) {
        self.signal.signal(());
    }
}

static ADV_DATA: LegacyAdvertisementPayload = LegacyAdvertisementBuilder::new()
    .flags(&[Flag::GeneralDiscovery, Flag::LE_Only])
    .full_name(config::DEVICE_NAME)
    .build();

static SCAN_DATA: LegacyAdvertisementPayload = LegacyAdvertisementBuilder::new()
    .services_128(ServiceList::Complete, &[config::RELAY_SERVICE_UUID_LE])
    .build();

/// Advertise, serve one sink until it leaves, repeat.
#[embassy_executor::task]
pub async fn sink_task(
    sd: &'static Softdevice,
    server: &'static Server,
    ctx: &'static RelayContext<CriticalSectionRawMutex>,
    conn_slot: &'static SinkConnection,
    advertise: &'static AdvertiseSignal,
) -> ! {
    let mut events = ConnectionEvents::new(ctx, SignalAdvertiser::new(advertise));

    loop {
        advertise.wait().await;
        info!("advertising as {}", config::DEVICE_NAME);

        let adv = peripheral::ConnectableAdvertisement::ScannableUndirected {
            adv_data: &ADV_DATA,
            scan_data: &SCAN_DATA,
        };
        let adv_config = peripheral::Config {
            interval: config::ADV_INTERVAL,
            ..Default::default()
        };

        let conn = match peripheral::advertise_connectable(sd, adv, &adv_config).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("advertising failed: {:?}", e);
                Timer::after(Duration::from_millis(config::ADVERTISE_RETRY_MS)).await;
                advertise.signal(());
                continue;
            }
        };

        conn_slot.lock(|slot| slot.borrow_mut().attach(conn.clone()));
        events.handle(SinkEvent::Attached);

        let reason = gatt_server::run(&conn, server, |e| match e {
            ServerEvent::Relay(RelayServiceEvent::PacketCccdWrite { notifications }) => {
                info!("sink notifications: {}", notifications);
                conn_slot.lock(|slot| slot.borrow_mut().set_notifications(notifications));
            }
        })
        .await;
        info!("sink gatt server ended: {:?}", reason);

        conn_slot.lock(|slot| slot.borrow_mut().detach());
        events.handle(SinkEvent::Detached);
    }
}
