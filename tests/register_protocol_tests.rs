//! Integration tests for the SPI register protocol and chip-select sequencing.

use rs_motorboard::hal::{BusEvent, MockBoard, MockDatastore, MockDebugSink};
use rs_motorboard::registers::{tmc4671, tmc6200, Chip, RegisterAccess, DATAGRAM_LEN};
use rs_motorboard::traits::{ChipSelectLine, Datastore, PinLevel};
use rs_motorboard::transport::{RegisterTransport, TransportError};

#[test]
fn write_then_read_returns_value_on_both_chips() {
    let board = MockBoard::new();
    let datastore = MockDatastore::new();
    let sink = MockDebugSink::new();
    let mut bus = RegisterTransport::new(board.spi(), board.chip_selects(), &datastore, &sink);

    let cases = [
        (Chip::MotionController, tmc4671::PWM_MAXCNT, 0x0000_0F9F),
        (Chip::MotionController, tmc4671::PID_TORQUE_FLUX_TARGET, 0x8000_0001),
        (Chip::GateDriver, tmc6200::GCONF, 0x0000_0010),
        (Chip::GateDriver, tmc6200::SHORT_CONF, 0xFFFF_FFFF),
    ];
    for (chip, address, value) in cases {
        bus.write_register(chip, address, value).unwrap();
        assert_eq!(bus.read_register(chip, address), Ok(value));
    }
    assert!(!datastore.spi_fault());
}

#[test]
fn corrupted_readback_is_visible() {
    let board = MockBoard::new();
    board.override_readback(Chip::GateDriver, tmc6200::DRV_CONF, 0x0008_0001);
    let datastore = MockDatastore::new();
    let sink = MockDebugSink::new();
    let mut bus = RegisterTransport::new(board.spi(), board.chip_selects(), &datastore, &sink);

    bus.write_register(Chip::GateDriver, tmc6200::DRV_CONF, 0x0008_0000)
        .unwrap();

    assert_eq!(
        bus.read_register(Chip::GateDriver, tmc6200::DRV_CONF),
        Ok(0x0008_0001)
    );
}

#[test]
fn chip_select_wraps_each_datagram_exactly_once() {
    let board = MockBoard::new();
    let datastore = MockDatastore::new();
    let sink = MockDebugSink::new();
    let mut bus = RegisterTransport::new(board.spi(), board.chip_selects(), &datastore, &sink);

    bus.write_register(Chip::MotionController, tmc4671::HALL_MODE, 0)
        .unwrap();
    bus.read_register(Chip::GateDriver, tmc6200::GSTAT).unwrap();

    let line_of = |chip: Chip| chip.chip_select();
    let mc = line_of(Chip::MotionController);
    let gd = line_of(Chip::GateDriver);
    let events = board.events();
    let datagram = |line| {
        let mut v = vec![BusEvent::Select(line)];
        v.extend((0..DATAGRAM_LEN).map(|_| BusEvent::Byte {
            line: Some(line),
            out: 0,
        }));
        v.push(BusEvent::Deselect(line));
        v
    };
    // Compare shapes, ignoring MOSI contents.
    let shape: Vec<BusEvent> = events
        .iter()
        .map(|e| match *e {
            BusEvent::Byte { line, .. } => BusEvent::Byte { line, out: 0 },
            other => other,
        })
        .collect();
    let mut expected = datagram(mc);
    expected.extend(datagram(gd));
    assert_eq!(shape, expected);
}

#[test]
fn timeout_sets_fault_once_per_failed_byte_and_releases_line() {
    let board = MockBoard::new();
    board.fail_exchange(1, TransportError::Timeout);
    board.fail_exchange(3, TransportError::Timeout);
    let datastore = MockDatastore::new();
    let sink = MockDebugSink::new();
    let mut bus = RegisterTransport::new(board.spi(), board.chip_selects(), &datastore, &sink);

    let result = bus.read_register(Chip::MotionController, tmc4671::MOTOR_TYPE_N_POLE_PAIRS);

    assert_eq!(result, Err(TransportError::Timeout));
    assert_eq!(datastore.spi_fault_sets(), 2);
    assert_eq!(sink.count_containing("SPI Timeout"), 2);
    assert_eq!(board.exchange_count(), DATAGRAM_LEN);
    assert_eq!(board.select_count(ChipSelectLine::MotionController), 1);
    assert_eq!(board.deselect_count(ChipSelectLine::MotionController), 1);
    assert_eq!(board.cs_level(ChipSelectLine::MotionController), PinLevel::High);
}

#[test]
fn bus_recovers_after_fault() {
    let board = MockBoard::new();
    let datastore = MockDatastore::new();
    let sink = MockDebugSink::new();
    let mut bus = RegisterTransport::new(board.spi(), board.chip_selects(), &datastore, &sink);

    board.fail_all(TransportError::BusBusy);
    assert_eq!(
        bus.write_register(Chip::GateDriver, tmc6200::GCONF, 0x10),
        Err(TransportError::BusBusy)
    );
    assert_eq!(datastore.spi_fault_sets(), DATAGRAM_LEN);

    board.heal();
    bus.write_register(Chip::GateDriver, tmc6200::GCONF, 0x10)
        .unwrap();
    assert_eq!(bus.read_register(Chip::GateDriver, tmc6200::GCONF), Ok(0x10));
    assert_eq!(bus.asserted_line(), None);
}

#[test]
fn configured_timeout_reaches_peripheral() {
    let board = MockBoard::new();
    let datastore = MockDatastore::new();
    let sink = MockDebugSink::new();
    let mut bus = RegisterTransport::new(board.spi(), board.chip_selects(), &datastore, &sink)
        .with_timeout_ms(5);

    bus.read_register(Chip::GateDriver, tmc6200::GSTAT).unwrap();

    assert_eq!(board.last_timeout_ms(), Some(5));
}

#[test]
fn stuck_chip_select_never_clocks_unselected_bytes() {
    let board = MockBoard::new();
    let datastore = MockDatastore::new();
    let sink = MockDebugSink::new();
    let mut bus = RegisterTransport::new(board.spi(), board.chip_selects(), &datastore, &sink);

    board.fail_chip_selects(TransportError::Bus);
    assert_eq!(
        bus.read_register(Chip::MotionController, tmc4671::MOTOR_TYPE_N_POLE_PAIRS),
        Err(TransportError::Bus)
    );
    assert_eq!(board.exchange_count(), 0);
    assert_eq!(datastore.spi_fault_sets(), DATAGRAM_LEN);
    assert_eq!(sink.count_containing("during select"), DATAGRAM_LEN);

    board.heal();
    board.clear_events();
    bus.write_register(Chip::GateDriver, tmc6200::GCONF, 0x10).unwrap();
    let events = board.events();
    assert_eq!(events.len(), DATAGRAM_LEN + 2);
    assert_eq!(events[0], BusEvent::Select(ChipSelectLine::GateDriver));
    assert_eq!(events[DATAGRAM_LEN + 1], BusEvent::Deselect(ChipSelectLine::GateDriver));
}
