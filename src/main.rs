// wristhub — Firmware Entry Point
//
// Boot sequence:
//   1. Bring up logging, the I2C bus and the MPU6050.
//   2. Build the hub around the board drivers.
//   3. Spawn the poll task, then run the idle loop on the main thread.
//
// The single user button on the Xiao is wired as BTN1.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use esp_idf_hal::gpio::{AnyInputPin, Input, InputPin, PinDriver};
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::prelude::*;

use wristhub::config::*;
use wristhub::drivers::board::{AdcBattery, EspBoard};
use wristhub::drivers::imu::Mpu6050;
use wristhub::drivers::{Drivers, SystemClock};
use wristhub::tasks::{idle::run_idle_loop, sensor::spawn_poll_task};
use wristhub::{LogSink, SensorHub, Settings};

/// Milliseconds since boot.
fn now_ms() -> u64 {
    unsafe { (esp_idf_sys::esp_timer_get_time() / 1000) as u64 }
}

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    log::info!("wristhub firmware starting…");

    // ---- Peripherals ------------------------------------------------------
    let peripherals = Peripherals::take()?;

    let button = PinDriver::input(peripherals.pins.gpio3.downgrade_input())?;
    configure_pullup(&button);

    let i2c_config = I2cConfig::new().baudrate(I2C_BAUDRATE_HZ.Hz());
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio6, // SDA
        peripherals.pins.gpio7, // SCL
        &i2c_config,
    )?;

    // ---- Hub --------------------------------------------------------------
    let drivers = Drivers {
        accel: Some(Box::new(Mpu6050::new(i2c))),
        ..Drivers::default()
    };

    let mut builder = SensorHub::builder()
        .drivers(drivers)
        .board(EspBoard)
        .clock(SystemClock::default())
        .settings(Settings::default());
    match AdcBattery::new() {
        Ok(battery) => builder = builder.battery(battery),
        Err(e) => log::warn!("Battery ADC unavailable: {e:?}"),
    }
    let (mut hub, poller, mut input) = builder.build();

    let running = Arc::new(AtomicBool::new(true));
    let _poll = spawn_poll_task(poller, Arc::clone(&running))?;
    log::info!("Poll task spawned");

    // ---- Idle loop --------------------------------------------------------
    let mut sink = LogSink;
    let mut last_battery_check = 0u64;
    run_idle_loop(&mut hub, &mut sink, &running, |hub| {
        let now = now_ms();
        input.button(1, button.is_low(), now);

        if now.saturating_sub(last_battery_check) >= BATTERY_CHECK_INTERVAL_MS {
            last_battery_check = now;
            if let Some(percent) = hub.battery_percent() {
                log::info!("Battery: {percent}%");
            }
        }
    });

    Ok(())
}

fn configure_pullup(_pin: &PinDriver<'_, AnyInputPin, Input>) {
    // The generic input driver cannot set pulls on an AnyInputPin; go through
    // the raw GPIO API instead.
    unsafe {
        esp_idf_sys::gpio_set_pull_mode(PIN_BUTTON, esp_idf_sys::gpio_pull_mode_t_GPIO_PULLUP_ONLY);
    }
}
