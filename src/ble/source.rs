//! Central-role transport for the upstream source.
//!
//! The sensor and control characteristics are discovered through two
//! separate GATT clients on the same service so a source without the
//! control characteristic still connects. Once subscribed, the sensor
//! client is handed to [`source_notify_task`], which pumps notifications
//! into the relay context until the connection drops.

use ble_relay::config;
use ble_relay::error::LinkFault;
use ble_relay::link::{Notification, RemoteCharacteristic, SourceCentral, SourceEvent};
use ble_relay::RelayContext;
use defmt::{debug, info, warn};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use nrf_softdevice::ble::gatt_client::{self, DiscoverError};
use nrf_softdevice::ble::{central, Address, AddressType, Connection};
use nrf_softdevice::{raw, Softdevice};

// The client macros only take literals; keep them in step with `config`.
const _: () = assert!(
    config::SOURCE_SERVICE_UUID == 0x180D
        && config::SOURCE_SENSOR_UUID == 0x2A37
        && config::SOURCE_CONTROL_UUID == 0x2A56
);

/// Measurement side of the source service.
#[nrf_softdevice::gatt_client(uuid = "180d")]
pub struct SensorClient {
    #[characteristic(uuid = "2a37", notify)]
    pub sensor: heapless::Vec<u8, { config::NOTIFICATION_MAX }>,
}

/// Control side of the source service.
#[nrf_softdevice::gatt_client(uuid = "180d")]
pub struct ControlClient {
    #[characteristic(uuid = "2a56", write)]
    pub control: heapless::Vec<u8, { ble_relay::link::CONTROL_MAX }>,
}

/// Subscribed sensor link, handed from the link manager to the pump task.
pub type SensorLink = Signal<CriticalSectionRawMutex, (Connection, SensorClient)>;

/// [`SourceCentral`] over the SoftDevice.
pub struct SoftdeviceCentral {
    sd: &'static Softdevice,
    pump: &'static SensorLink,
    conn: Option<Connection>,
    sensor: Option<SensorClient>,
    control: Option<ControlClient>,
}

impl SoftdeviceCentral {
    pub fn new(sd: &'static Softdevice, pump: &'static SensorLink) -> Self {
        Self {
            sd,
            pump,
            conn: None,
            sensor: None,
            control: None,
        }
    }

    fn connection(&self) -> Result<&Connection, LinkFault> {
        self.conn.as_ref().ok_or(LinkFault::NotConnected)
    }
}

fn discover_fault(e: DiscoverError) -> Option<LinkFault> {
    match e {
        DiscoverError::ServiceNotFound => Some(LinkFault::ServiceNotFound),
        // Service present but this client's characteristic is not.
        DiscoverError::ServiceIncomplete => None,
        _ => Some(LinkFault::DiscoveryFailed),
    }
}

impl SourceCentral for SoftdeviceCentral {
    async fn connect(&mut self, address: &[u8; 6]) -> Result<(), LinkFault> {
        // SoftDevice addresses are little-endian.
        let mut bytes = *address;
        bytes.reverse();
        let address = Address::new(AddressType::Public, bytes);

        let whitelist = [&address];
        let conn_cfg = central::ConnectConfig {
            scan_config: central::ScanConfig {
                whitelist: Some(&whitelist),
                ..Default::default()
            },
            conn_params: raw::ble_gap_conn_params_t {
                min_conn_interval: config::BLE_CONN_INTERVAL_MIN,
                max_conn_interval: config::BLE_CONN_INTERVAL_MAX,
                slave_latency: config::BLE_SLAVE_LATENCY,
                conn_sup_timeout: config::BLE_SUP_TIMEOUT,
            },
            ..Default::default()
        };

        let conn = central::connect(self.sd, &conn_cfg).await.map_err(|e| {
            warn!("central connect error: {:?}", e);
            LinkFault::ConnectFailed
        })?;
        self.conn = Some(conn);
        Ok(())
    }

    async fn discover_service(&mut self, uuid: u16) -> Result<(), LinkFault> {
        debug!("discovering service {:#x}", uuid);
        if uuid != config::SOURCE_SERVICE_UUID {
            return Err(LinkFault::ServiceNotFound);
        }
        let conn = self.connection()?.clone();

        self.sensor = match gatt_client::discover::<SensorClient>(&conn).await {
            Ok(client) => Some(client),
            Err(e) => match discover_fault(e) {
                Some(fault) => return Err(fault),
                None => None,
            },
        };
        self.control = match gatt_client::discover::<ControlClient>(&conn).await {
            Ok(client) => Some(client),
            Err(e) => match discover_fault(e) {
                Some(fault) => return Err(fault),
                None => None,
            },
        };
        Ok(())
    }

    async fn discover_characteristic(
        &mut self,
        uuid: u16,
    ) -> Result<RemoteCharacteristic, LinkFault> {
        // The generated clients do not expose handles; 0 marks "resolved".
        match uuid {
            config::SOURCE_SENSOR_UUID if self.sensor.is_some() => Ok(RemoteCharacteristic {
                uuid,
                handle: 0,
                can_notify: true,
                can_write: false,
            }),
            config::SOURCE_CONTROL_UUID if self.control.is_some() => Ok(RemoteCharacteristic {
                uuid,
                handle: 0,
                can_notify: false,
                can_write: true,
            }),
            _ => Err(LinkFault::CharacteristicNotFound),
        }
    }

    async fn subscribe(&mut self, characteristic: &RemoteCharacteristic) -> Result<(), LinkFault> {
        if characteristic.uuid != config::SOURCE_SENSOR_UUID {
            return Err(LinkFault::NotifyUnsupported);
        }
        let conn = self.connection()?.clone();
        let client = self
            .sensor
            .take()
            .ok_or(LinkFault::CharacteristicNotFound)?;

        client
            .sensor_cccd_write(true)
            .await
            .map_err(|_| LinkFault::SubscribeFailed)?;

        info!("subscribed to source notifications");
        self.pump.signal((conn, client));
        Ok(())
    }

    async fn write(
        &mut self,
        characteristic: &RemoteCharacteristic,
        data: &[u8],
    ) -> Result<(), LinkFault> {
        if characteristic.uuid != config::SOURCE_CONTROL_UUID {
            return Err(LinkFault::WriteFailed);
        }
        let client = self.control.as_ref().ok_or(LinkFault::NotConnected)?;
        let value = heapless::Vec::from_slice(data).map_err(|_| LinkFault::WriteFailed)?;

        client.control_write(&value).await.map_err(|e| {
            warn!("control write error: {:?}", e);
            LinkFault::WriteFailed
        })
    }

    fn disconnect(&mut self) {
        self.sensor = None;
        self.control = None;
        if let Some(conn) = self.conn.take() {
            let _ = conn.disconnect();
        }
    }

    fn is_connected(&self) -> bool {
        self.conn.as_ref().is_some_and(|c| c.handle().is_some())
    }
}

/// Forward source notifications into the relay context.
///
/// Runs one `gatt_client::run` per subscribed connection. A full event
/// channel drops the notification; the next one carries a fresher value.
#[embassy_executor::task]
pub async fn source_notify_task(
    ctx: &'static RelayContext<CriticalSectionRawMutex>,
    link: &'static SensorLink,
) -> ! {
    loop {
        let (conn, client) = link.wait().await;
        info!("source notification pump started");

        let _ = gatt_client::run(&conn, &client, |event| match event {
            SensorClientEvent::SensorNotification(data) => {
                let event = SourceEvent::Notification(Notification::new(
                    config::SOURCE_SENSOR_UUID,
                    &data,
                ));
                if ctx.source_events.try_send(event).is_err() {
                    warn!("source event channel full - dropping notification");
                }
            }
        })
        .await;

        info!("source notification pump ended (connection closed)");
        if ctx.source_events.try_send(SourceEvent::LinkLost).is_err() {
            // The link manager also polls the connection every period.
            warn!("source event channel full - link loss not queued");
        }
    }
}
