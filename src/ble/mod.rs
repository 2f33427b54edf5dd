//! Bluetooth Low Energy subsystem.
//!
//! The SoftDevice S140 runs both roles at once:
//!
//! 1. **Source** (central) - connects to the fixed sensor, subscribes to
//!    its measurement characteristic and writes control values back.
//! 2. **Server** (peripheral) - advertises the relay service and notifies
//!    the attached sink with relay packets.
//!
//! Both halves only implement the transport traits of the `ble_relay`
//! core; all policy lives there.

pub mod server;
pub mod source;

use nrf_softdevice::Softdevice;

#[embassy_executor::task]
pub async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}
