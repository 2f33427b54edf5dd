//! ble-relay firmware for the nRF52840.
//!
//! Task layout:
//! - `softdevice_task` - SoftDevice event pump
//! - `sink_task` - advertise + GATT server for the downstream sink
//! - `relay_task` - periodic packet publishing
//! - `upstream_task` - source connection manager
//! - `source_notify_task` - source notification pump
//! - `uart_task` - command input

#![no_std]
#![no_main]

mod ble;
mod uart;

use ble_relay::config::{self, Variant};
use ble_relay::events::SinkSession;
use ble_relay::link::{SourceProfile, UpstreamLink};
use ble_relay::relay::RelayLoop;
use ble_relay::RelayContext;
use defmt::{info, unwrap};
use embassy_executor::Spawner;
use embassy_nrf::interrupt::{self, InterruptExt, Priority};
use embassy_nrf::{bind_interrupts, peripherals, uarte};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Ticker};
use nrf_softdevice::{raw, Softdevice};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use crate::ble::server::{AdvertiseSignal, Server, SinkConnection, SoftdeviceSink};
use crate::ble::source::{SensorLink, SoftdeviceCentral};

bind_interrupts!(struct Irqs {
    UARTE0_UART0 => uarte::InterruptHandler<peripherals::UARTE0>;
});

static CONTEXT: StaticCell<RelayContext<CriticalSectionRawMutex>> = StaticCell::new();
static SERVER: StaticCell<Server> = StaticCell::new();
static SINK_CONN: SinkConnection = Mutex::new(core::cell::RefCell::new(SinkSession::new()));
static ADVERTISE: AdvertiseSignal = Signal::new();
static SENSOR_LINK: SensorLink = Signal::new();

#[embassy_executor::task]
async fn relay_task(
    ctx: &'static RelayContext<CriticalSectionRawMutex>,
    sink: SoftdeviceSink,
) -> ! {
    let mut relay = RelayLoop::new(ctx, sink, Variant::from_config().layout);
    let mut ticker = Ticker::every(Duration::from_millis(config::RELAY_PERIOD_MS));
    relay.run(&mut ticker).await
}

#[embassy_executor::task]
async fn upstream_task(
    ctx: &'static RelayContext<CriticalSectionRawMutex>,
    central: SoftdeviceCentral,
) -> ! {
    let mut link = UpstreamLink::new(ctx, central, SourceProfile::from_config());
    let mut ticker = Ticker::every(Duration::from_secs(config::UPSTREAM_RETRY_SECS));
    link.run(&mut ticker).await
}

fn softdevice_config() -> nrf_softdevice::Config {
    nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_XTAL as u8,
            rc_ctiv: 0,
            rc_temp_ctiv: 0,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_20_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 2,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 128 }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
            central_role_count: 1,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: config::DEVICE_NAME.as_ptr() as _,
            current_len: config::DEVICE_NAME.len() as u16,
            max_len: config::DEVICE_NAME.len() as u16,
            write_perm: unsafe { core::mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        common_vs_uuid: Some(raw::ble_common_cfg_vs_uuid_t { vs_uuid_count: 4 }),
        ..Default::default()
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("ble-relay starting");

    // SoftDevice reserves interrupt priorities 0, 1 and 4.
    let mut nrf_config = embassy_nrf::config::Config::default();
    nrf_config.gpiote_interrupt_priority = Priority::P2;
    nrf_config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(nrf_config);
    interrupt::UARTE0_UART0.set_priority(Priority::P3);

    let ctx: &'static RelayContext<CriticalSectionRawMutex> = CONTEXT.init(RelayContext::new());

    let sd = Softdevice::enable(&softdevice_config());
    let server = SERVER.init(unwrap!(Server::new(sd)));
    let sd: &'static Softdevice = sd;
    unwrap!(spawner.spawn(ble::softdevice_task(sd)));
    info!("softdevice enabled");

    // Sink side first: advertise as soon as the server task is up.
    ADVERTISE.signal(());
    unwrap!(spawner.spawn(ble::server::sink_task(
        sd,
        server,
        ctx,
        &SINK_CONN,
        &ADVERTISE
    )));
    unwrap!(spawner.spawn(relay_task(
        ctx,
        SoftdeviceSink::new(server, &SINK_CONN)
    )));

    // Then the upstream connect loop.
    unwrap!(spawner.spawn(ble::source::source_notify_task(ctx, &SENSOR_LINK)));
    unwrap!(spawner.spawn(upstream_task(
        ctx,
        SoftdeviceCentral::new(sd, &SENSOR_LINK)
    )));

    let uart = uarte::Uarte::new(p.UARTE0, Irqs, p.P0_08, p.P0_06, uart::uart_config());
    unwrap!(spawner.spawn(uart::uart_task(uart, ctx)));
}
