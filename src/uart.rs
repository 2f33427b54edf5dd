//! UART command input.
//!
//! Reads bytes from UARTE0 one at a time, splits them into lines and hands
//! each line to the command path.

use ble_relay::command::{CommandPath, LineBuffer};
use ble_relay::config;
use ble_relay::RelayContext;
use defmt::{info, warn};
use embassy_nrf::peripherals;
use embassy_nrf::uarte::{self, Uarte};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

#[embassy_executor::task]
pub async fn uart_task(
    mut uart: Uarte<'static, peripherals::UARTE0>,
    ctx: &'static RelayContext<CriticalSectionRawMutex>,
) -> ! {
    let mut path = CommandPath::new(ctx, config::INPUT_FORMAT);
    let mut lines: LineBuffer<{ config::INPUT_LINE_MAX }> = LineBuffer::new();
    let mut byte = [0u8; 1];

    info!("uart input ready ({} baud)", config::UART_BAUD);
    loop {
        if let Err(e) = uart.read(&mut byte).await {
            warn!("uart read error: {:?}", e);
            continue;
        }
        match lines.push(byte[0]) {
            Some(Ok(line)) => {
                let _ = path.handle_record(line).await;
            }
            Some(Err(e)) => warn!("uart line dropped: {:?}", e),
            None => {}
        }
    }
}

/// UARTE settings for the command input.
pub fn uart_config() -> uarte::Config {
    let mut config = uarte::Config::default();
    config.parity = uarte::Parity::EXCLUDED;
    config.baudrate = match config::UART_BAUD {
        9_600 => uarte::Baudrate::BAUD9600,
        57_600 => uarte::Baudrate::BAUD57600,
        _ => uarte::Baudrate::BAUD115200,
    };
    config
}
