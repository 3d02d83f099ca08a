// wristhub — End-to-end scenarios on simulated hardware
//
// Each test drives the three contexts by hand: `Poller::tick` for the poll
// timer, `InputManager` for interrupts and `SensorHub::idle` for the drain.

use std::sync::mpsc;

use serde_json::json;

use wristhub::config::*;
use wristhub::drivers::sim::{RecordingSink, ScriptedSensor, SimBoard, SimClock, SimPanel, SimPower};
use wristhub::drivers::{AccelReading, Drivers, PressureReading, RawTap, Vector3};
use wristhub::{HealthRange, InputManager, Peripheral, PressureEvent, Requester, SensorHub};

// 2024-03-01T23:40:00Z, on a bucket boundary.
const T0: i64 = 1_709_336_400_000;

// Lying on its edge: never face-up, so no stray faceUp events.
const EDGE: Vector3 = Vector3::new(8192, 0, 0);
const FLAT: Vector3 = Vector3::new(0, 0, -8192);

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn reading(xyz: Vector3) -> AccelReading {
    AccelReading { xyz, tap: None }
}

fn with_accel(accel: &ScriptedSensor<AccelReading>) -> Drivers {
    Drivers {
        accel: Some(Box::new(accel.clone())),
        ..Drivers::default()
    }
}

#[test]
fn inactivity_turns_display_off_then_button_wakes_it() {
    init_logging();
    let panel = SimPanel::new();
    let (mut hub, mut poller, mut input) = SensorHub::builder().panel(panel.clone()).build();
    hub.set_lcd_timeout(400);

    let mut sink = RecordingSink::new();
    for _ in 0..4 {
        poller.tick();
    }
    assert_eq!(hub.idle(&mut sink), 0);

    poller.tick();
    hub.idle(&mut sink);
    assert_eq!(sink.names(), vec!["lcdPower", "backlight", "lock"]);
    assert_eq!(sink.payloads("lock"), vec![&json!({ "locked": true, "reason": "timeout" })]);
    assert!(!hub.is_lcd_on());
    assert!(!hub.is_backlight_on());
    assert!(hub.is_locked());
    assert_eq!(panel.calls(), vec![("lcd", false), ("backlight", false)]);

    // Already asleep: further ticks queue nothing.
    sink.clear();
    poller.tick();
    assert_eq!(hub.idle(&mut sink), 0);

    assert!(input.button(1, true, 1000));
    hub.idle(&mut sink);
    assert_eq!(sink.names(), vec!["lcdPower", "backlight", "lock"]);
    assert_eq!(sink.payloads("lock"), vec![&json!({ "locked": false, "reason": "button" })]);
    assert!(hub.is_lcd_on());
    assert!(!hub.is_locked());
    assert!(hub.shared().pending.peek().is_empty());
}

#[test]
fn twist_fires_once_and_wakes_the_display() {
    init_logging();
    let accel = ScriptedSensor::new();
    let (mut hub, mut poller, _input) = SensorHub::builder()
        .drivers(with_accel(&accel))
        .clock(SimClock::at(T0))
        .build();

    let mut sink = RecordingSink::new();
    hub.set_lcd_power(false);
    hub.set_backlight(false);
    hub.idle(&mut sink);
    assert!(hub.is_locked());
    sink.clear();

    accel.extend([
        reading(FLAT),
        reading(Vector3::new(0, 1000, -8192)),
        reading(Vector3::new(0, -1000, -8192)),
        reading(Vector3::new(0, -1000, -8192)),
    ]);
    for _ in 0..4 {
        assert!(poller.tick());
    }
    assert_eq!(accel.queued(), 0);

    hub.idle(&mut sink);
    assert_eq!(sink.names(), vec!["lcdPower", "backlight", "lock", "twist"]);
    assert_eq!(sink.payloads("lock"), vec![&json!({ "locked": false, "reason": "twist" })]);
    assert!(hub.is_lcd_on());
}

fn asleep(hub: &mut SensorHub, sink: &mut RecordingSink) {
    hub.set_lcd_power(false);
    hub.set_backlight(false);
    hub.idle(sink);
    assert!(hub.is_locked());
    sink.clear();
}

#[test]
fn double_tap_wakes_a_locked_display() {
    init_logging();
    let accel = ScriptedSensor::new();
    let (mut hub, mut poller, _input) = SensorHub::builder()
        .drivers(with_accel(&accel))
        .clock(SimClock::at(T0))
        .build();
    let mut sink = RecordingSink::new();
    hub.set_options(json!({ "wakeOnDoubleTap": true })).unwrap();
    asleep(&mut hub, &mut sink);

    accel.push(AccelReading {
        xyz: EDGE,
        tap: Some(RawTap { direction_bits: 1, double: true }),
    });
    assert!(poller.tick());

    hub.idle(&mut sink);
    assert_eq!(sink.names(), vec!["lcdPower", "backlight", "lock", "tap"]);
    assert_eq!(sink.payloads("lock"), vec![&json!({ "locked": false, "reason": "doubleTap" })]);
    assert_eq!(
        sink.payloads("tap"),
        vec![&json!({ "dir": "front", "double": true, "x": 8192, "y": 0, "z": 0 })]
    );
    assert!(hub.is_lcd_on());
    assert!(!hub.is_locked());
}

#[test]
fn single_tap_reports_without_waking() {
    init_logging();
    let accel = ScriptedSensor::new();
    let (mut hub, mut poller, _input) = SensorHub::builder()
        .drivers(with_accel(&accel))
        .clock(SimClock::at(T0))
        .build();
    let mut sink = RecordingSink::new();
    hub.set_options(json!({ "wakeOnDoubleTap": true })).unwrap();
    asleep(&mut hub, &mut sink);

    accel.push(AccelReading {
        xyz: EDGE,
        tap: Some(RawTap { direction_bits: 16, double: false }),
    });
    poller.tick();

    hub.idle(&mut sink);
    assert_eq!(sink.names(), vec!["tap"]);
    assert_eq!(sink.payloads("tap")[0]["dir"], json!("right"));
    assert!(hub.is_locked());
}

#[test]
fn settling_face_up_reports_and_wakes() {
    init_logging();
    let accel = ScriptedSensor::new();
    let (mut hub, mut poller, _input) = SensorHub::builder()
        .drivers(with_accel(&accel))
        .clock(SimClock::at(T0))
        .build();
    let mut sink = RecordingSink::new();
    hub.set_options(json!({ "wakeOnFaceUp": true })).unwrap();
    asleep(&mut hub, &mut sink);

    // First flat sample starts the settle window; 300 ms later it reports.
    accel.extend((0..5).map(|_| reading(FLAT)));
    for _ in 0..4 {
        poller.tick();
    }
    assert_eq!(hub.idle(&mut sink), 0);

    poller.tick();
    hub.idle(&mut sink);
    assert_eq!(sink.names(), vec!["lcdPower", "backlight", "lock", "faceUp"]);
    assert_eq!(sink.payloads("lock"), vec![&json!({ "locked": false, "reason": "faceUp" })]);
    assert_eq!(sink.payloads("faceUp"), vec![&json!(true)]);
    assert!(hub.is_lcd_on());
}

#[test]
fn gesture_is_delivered_without_its_quiet_tail() {
    init_logging();
    let accel = ScriptedSensor::new();
    let (mut hub, mut poller, _input) = SensorHub::builder()
        .drivers(with_accel(&accel))
        .clock(SimClock::at(T0))
        .build();

    accel.push(reading(EDGE));
    for i in 0..12 {
        let z = if i % 2 == 0 { 3000 } else { -3000 };
        accel.push(reading(Vector3::new(8192, 0, z)));
    }
    for _ in 0..4 {
        accel.push(reading(Vector3::new(8192, 0, -3000)));
    }
    for _ in 0..17 {
        poller.tick();
    }

    let mut sink = RecordingSink::new();
    hub.idle(&mut sink);
    assert_eq!(sink.names(), vec!["gesture"]);

    let payload = sink.payloads("gesture")[0].as_array().unwrap().clone();
    assert_eq!(payload.len(), 12 * 3);
    assert_eq!(&payload[..3], &[json!(64), json!(0), json!(23)]);
}

#[test]
fn health_buckets_roll_and_midnight_closes_the_day() {
    init_logging();
    let accel = ScriptedSensor::new();
    let clock = SimClock::at(T0);
    let (mut hub, mut poller, _input) = SensorHub::builder()
        .drivers(with_accel(&accel))
        .clock(clock.clone())
        .build();
    let mut sink = RecordingSink::new();

    accel.push(reading(EDGE));
    poller.tick();
    assert_eq!(hub.idle(&mut sink), 0);

    clock.advance(HEALTH_INTERVAL_MS);
    accel.push(reading(EDGE));
    poller.tick();
    hub.idle(&mut sink);
    assert_eq!(sink.names(), vec!["health"]);
    assert_eq!(hub.health_status(HealthRange::Last).movement_samples, 1);

    // 00:00 local on the next day.
    sink.clear();
    clock.advance(HEALTH_INTERVAL_MS);
    accel.push(reading(EDGE));
    poller.tick();
    hub.idle(&mut sink);
    assert_eq!(sink.names(), vec!["health", "midnight"]);
    assert_eq!(sink.payloads("midnight")[0]["steps"], json!(0));
    assert_eq!(hub.health_status(HealthRange::Day).movement_samples, 1);
}

#[test]
fn gps_lines_flow_while_powered_and_flag_drops() {
    init_logging();
    let gps = SimPower::new();
    let (mut hub, _poller, mut input) = SensorHub::builder()
        .drivers(Drivers { gps: Some(Box::new(gps.clone())), ..Drivers::default() })
        .build();
    let mut sink = RecordingSink::new();

    let feed = |input: &mut InputManager, text: &str| {
        for b in text.bytes() {
            input.gps_byte(b);
        }
    };

    // Not powered: ignored.
    feed(&mut input, "$GPGGA,0\r\n");
    assert_eq!(hub.idle(&mut sink), 0);

    assert!(hub.set_power(Peripheral::Gps, &Requester::from("A"), true).unwrap());
    assert!(hub.set_power(Peripheral::Gps, &Requester::from("B"), true).unwrap());
    assert_eq!(gps.inits(), 1);

    feed(&mut input, "$GPGGA,1\r\n");
    hub.idle(&mut sink);
    assert_eq!(sink.payloads("GPS-raw"), vec![&json!({ "line": "$GPGGA,1", "lost": false })]);

    sink.clear();
    feed(&mut input, "$GPGGA,2\r\n$GPGGA,3\r\n");
    hub.idle(&mut sink);
    assert_eq!(sink.payloads("GPS-raw"), vec![&json!({ "line": "$GPGGA,3", "lost": true })]);

    assert!(hub.set_power(Peripheral::Gps, &Requester::from("A"), false).unwrap());
    assert!(!hub.set_power(Peripheral::Gps, &Requester::from("B"), false).unwrap());
    assert_eq!(gps.offs(), 1);

    sink.clear();
    feed(&mut input, "$GPGGA,4\r\n");
    assert_eq!(hub.idle(&mut sink), 0);
}

#[test]
fn busy_bus_skips_the_sensor_phase() {
    init_logging();
    let accel = ScriptedSensor::new();
    let (hub, mut poller, _input) = SensorHub::builder().drivers(with_accel(&accel)).build();
    accel.push(reading(EDGE));

    let guard = hub.shared().bus.acquire();
    assert!(!poller.tick());
    assert_eq!(accel.queued(), 1);
    drop(guard);

    assert!(poller.tick());
    assert_eq!(accel.queued(), 0);
}

#[test]
fn reset_buttons_starve_the_watchdog() {
    init_logging();
    let board = SimBoard::new();
    let (_hub, mut poller, mut input) = SensorHub::builder().board(board.clone()).build();

    poller.tick();
    assert_eq!(board.watchdog_kicks(), 1);

    input.button(1, true, 0);
    input.button(2, true, 0);
    poller.tick();
    poller.tick();
    assert_eq!(board.watchdog_kicks(), 1);

    input.button(2, false, 100);
    poller.tick();
    assert_eq!(board.watchdog_kicks(), 2);
}

#[test]
fn holding_home_requests_reload() {
    init_logging();
    let (mut hub, mut poller, mut input) = SensorHub::builder().build();
    let mut sink = RecordingSink::new();

    input.button(HOME_BUTTON, true, 0);
    let ticks = DEFAULT_BTN_LOAD_TIMEOUT_MS.div_ceil(DEFAULT_POLL_INTERVAL_MS);
    for _ in 1..ticks {
        poller.tick();
    }
    assert_eq!(hub.idle(&mut sink), 0);

    poller.tick();
    poller.tick();
    hub.idle(&mut sink);
    assert_eq!(sink.names(), vec!["reload"]);
}

#[test]
fn stillness_enters_power_save_and_movement_leaves_it() {
    init_logging();
    let accel = ScriptedSensor::new();
    let (mut hub, mut poller, _input) = SensorHub::builder()
        .drivers(with_accel(&accel))
        .clock(SimClock::at(T0))
        .build();
    let mut sink = RecordingSink::new();

    let still_ticks = POWER_SAVE_TIMEOUT_MS / DEFAULT_POLL_INTERVAL_MS;
    accel.extend((0..still_ticks).map(|_| reading(EDGE)));
    for _ in 0..still_ticks {
        poller.tick();
    }
    hub.idle(&mut sink);
    assert_eq!(sink.payloads("pollInterval"), vec![&json!(POWER_SAVE_POLL_INTERVAL_MS)]);
    assert_eq!(poller.interval_ms(), POWER_SAVE_POLL_INTERVAL_MS);

    sink.clear();
    accel.push(reading(Vector3::new(8192, 0, 5000)));
    poller.tick();
    hub.idle(&mut sink);
    assert_eq!(sink.payloads("pollInterval"), vec![&json!(DEFAULT_POLL_INTERVAL_MS)]);
    assert_eq!(hub.poll_interval_ms(), DEFAULT_POLL_INTERVAL_MS);
}

#[test]
fn one_shot_pressure_resolves_and_releases_the_barometer() {
    init_logging();
    let baro = ScriptedSensor::<PressureReading>::new();
    let (mut hub, mut poller, _input) = SensorHub::builder()
        .drivers(Drivers { barometer: Some(Box::new(baro.clone())), ..Drivers::default() })
        .build();

    let (tx, rx) = mpsc::channel();
    let started = hub
        .get_pressure(Box::new(move |ev: PressureEvent| {
            let _ = tx.send(ev);
        }))
        .unwrap();
    assert!(started);
    assert!(hub.is_on(Peripheral::Barometer));
    assert!(hub.query_power("Barom"));

    baro.push(PressureReading { pressure_hpa: SEA_LEVEL_HPA, temperature_c: 21.5 });
    poller.tick();

    let mut sink = RecordingSink::new();
    hub.idle(&mut sink);
    assert_eq!(sink.names(), vec!["pressure"]);

    let ev = rx.try_recv().unwrap();
    assert_eq!(ev.temperature_c, 21.5);
    assert!(ev.altitude_m.abs() < 1e-6);

    assert!(!hub.is_on(Peripheral::Barometer));
    assert!(!hub.query_power("Barom"));
    assert_eq!(baro.offs(), 1);
}

#[test]
fn pressure_without_barometer_is_declined() {
    init_logging();
    let (mut hub, _poller, _input) = SensorHub::builder().build();
    assert!(!hub.get_pressure(Box::new(|_: PressureEvent| {})).unwrap());
}

#[test]
fn charger_change_is_reported_once_settled() {
    init_logging();
    let board = SimBoard::new();
    let (mut hub, mut poller, _input) = SensorHub::builder().board(board.clone()).build();
    let mut sink = RecordingSink::new();

    board.set_charging(true);
    poller.tick();
    poller.tick();
    assert!(!hub.is_charging());

    poller.tick();
    assert!(hub.is_charging());
    hub.idle(&mut sink);
    assert_eq!(sink.payloads("charging"), vec![&json!(true)]);
}

#[test]
fn accel_listener_streams_samples_in_g() {
    init_logging();
    let accel = ScriptedSensor::new();
    let (mut hub, mut poller, _input) = SensorHub::builder()
        .drivers(with_accel(&accel))
        .clock(SimClock::at(T0))
        .build();
    let mut sink = RecordingSink::new();

    accel.push(reading(EDGE));
    poller.tick();
    assert_eq!(hub.idle(&mut sink), 0);

    hub.set_accel_listener(true);
    accel.push(reading(EDGE));
    poller.tick();
    hub.idle(&mut sink);
    let accel_ev = sink.payloads("accel")[0];
    assert_eq!(accel_ev["x"], json!(1.0));
    assert_eq!(accel_ev["diff"], json!(0.0));
}
