//! ESP32 motor controller board firmware.
//!
//! This is the main entry point for the physical board. It:
//! - Brings up the TMC4671 motion controller and TMC6200 gate driver and
//!   verifies their configuration
//! - Starts the periodic motor task
//! - Dispatches received CAN frames to their handlers
//!
//! # Build
//!
//! ```bash
//! cargo build --release --features esp32 --bin esp32_main
//! ```

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use esp_idf_hal::peripherals::Peripherals;
use rs_motorboard::can::{CanDispatcher, HandlerContext};
use rs_motorboard::hal::esp32::Esp32Board;
use rs_motorboard::hal::LogSink;
use rs_motorboard::init::{validate_link, MotorInitializer};
use rs_motorboard::{BoardConfig, MotorTask, RegisterTransport, SharedDatastore, SharedRegisterBus};

/// CAN receive poll interval in milliseconds
const CAN_POLL_INTERVAL_MS: u64 = 5;

fn main() -> anyhow::Result<()> {
    // Initialize ESP-IDF
    esp_idf_hal::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    println!();
    println!("================================");
    println!("  rs-motorboard Controller");
    println!("================================");
    println!();

    let config = BoardConfig::default();
    let datastore = Arc::new(SharedDatastore::new());

    let peripherals = Peripherals::take()?;
    let Esp32Board {
        spi,
        chip_selects,
        mut enable,
        mut can,
    } = Esp32Board::new(peripherals)?;
    println!("[OK] SPI, chip selects and CAN initialized");

    // =========================================================================
    // Motor bring-up
    // =========================================================================
    let mut bus = SharedRegisterBus::new(
        RegisterTransport::new(spi, chip_selects, Arc::clone(&datastore), LogSink)
            .with_config(&config.transport),
    );

    let report = MotorInitializer::new(&config).run(&mut bus, &mut enable, &LogSink);
    if report.is_ready() {
        println!("[OK] Motor initialized");
    } else {
        println!(
            "[FAIL] Motor initialization: {:?} ({} write faults)",
            report.state, report.write_faults
        );
    }

    // =========================================================================
    // Motor task
    // =========================================================================
    let stop = Arc::new(AtomicBool::new(false));
    let mut task_bus = bus.clone();
    let task_config = config.clone();
    let _motor = MotorTask::new(&config.task).spawn(LogSink, stop, move |_| {
        if !validate_link(&mut task_bus, &task_config) {
            log::warn!("SPI link check failed");
        }
    })?;
    println!("[OK] Motor task started ({} ms)", config.task.period_ms);

    // =========================================================================
    // CAN receive loop
    // =========================================================================
    let dispatcher = CanDispatcher::new();
    let ctx = HandlerContext::new(&*datastore, &LogSink);
    println!("[OK] Listening for CAN frames");

    loop {
        dispatcher.dispatch_pending(&mut can, &ctx);
        thread::sleep(Duration::from_millis(CAN_POLL_INTERVAL_MS));
    }
}
