//! Integration tests for CAN frame dispatch.

use rs_motorboard::can::{
    can_ids, encode_throttle, CanDispatcher, CanFrame, DecodeError, DispatchOutcome,
    HandlerContext, MessageIndex, CAN_MESSAGE_TABLE,
};
use rs_motorboard::hal::{MockCan, MockDatastore, MockDebugSink};
use rs_motorboard::traits::Datastore;

fn is_known(id: u16) -> bool {
    CAN_MESSAGE_TABLE.iter().any(|entry| entry.id == id)
}

#[test]
fn unknown_ids_have_no_effect() {
    let datastore = MockDatastore::new();
    let sink = MockDebugSink::new();
    let ctx = HandlerContext::new(&datastore, &sink);
    let dispatcher = CanDispatcher::new();

    for id in (0..=u16::MAX).filter(|id| !is_known(*id)) {
        let frame = CanFrame::new(id, &[0x64, 0x00]).unwrap();
        assert_eq!(dispatcher.dispatch(&frame, &ctx), DispatchOutcome::Ignored);
    }

    assert!(datastore.throttle_history().is_empty());
    assert_eq!(datastore.spi_fault_sets(), 0);
    assert!(sink.is_empty());
}

#[test]
fn throttle_reaches_datastore_unchanged() {
    let dispatcher = CanDispatcher::new();

    for percentage in [0u16, 1, 50, 99, 100, 0x1234, u16::MAX] {
        let datastore = MockDatastore::new();
        let sink = MockDebugSink::new();
        let ctx = HandlerContext::new(&datastore, &sink);
        let frame = CanFrame::new(can_ids::THROTTLE_DATA, &encode_throttle(percentage)).unwrap();

        let outcome = dispatcher.dispatch(&frame, &ctx);

        assert_eq!(outcome, DispatchOutcome::Handled(MessageIndex::ThrottleData));
        assert_eq!(datastore.throttle_history(), vec![u32::from(percentage)]);
    }
}

#[test]
fn wrong_length_is_rejected() {
    let datastore = MockDatastore::new();
    let sink = MockDebugSink::new();
    let ctx = HandlerContext::new(&datastore, &sink);
    let dispatcher = CanDispatcher::new();

    let long = CanFrame::new(can_ids::THROTTLE_DATA, &[0x10, 0x00, 0xFF]).unwrap();
    let empty = CanFrame::new(can_ids::MOTOR_TEMPERATURE, &[]).unwrap();

    assert_eq!(
        dispatcher.dispatch(&long, &ctx),
        DispatchOutcome::Rejected(
            MessageIndex::ThrottleData,
            DecodeError::PayloadLengthMismatch {
                expected: 2,
                actual: 3
            }
        )
    );
    assert_eq!(
        dispatcher.dispatch(&empty, &ctx),
        DispatchOutcome::Rejected(
            MessageIndex::MotorTemperature,
            DecodeError::PayloadLengthMismatch {
                expected: 2,
                actual: 0
            }
        )
    );
    assert!(datastore.throttle_history().is_empty());
}

#[test]
fn reports_are_handled_without_state_change() {
    let datastore = MockDatastore::new();
    let sink = MockDebugSink::new();
    let ctx = HandlerContext::new(&datastore, &sink);
    let dispatcher = CanDispatcher::new();

    let speed = CanFrame::new(can_ids::SPEED_DATA, &[0x10, 0x27]).unwrap();
    let temperature = CanFrame::new(can_ids::MOTOR_TEMPERATURE, &[0x41, 0x00]).unwrap();

    assert_eq!(
        dispatcher.dispatch(&speed, &ctx),
        DispatchOutcome::Handled(MessageIndex::SpeedData)
    );
    assert_eq!(
        dispatcher.dispatch(&temperature, &ctx),
        DispatchOutcome::Handled(MessageIndex::MotorTemperature)
    );
    assert!(datastore.throttle_history().is_empty());
    assert!(sink.contains("SpeedData"));
}

#[test]
fn dispatch_pending_drains_receiver() {
    let datastore = MockDatastore::new();
    let sink = MockDebugSink::new();
    let ctx = HandlerContext::new(&datastore, &sink);
    let mut can = MockCan::new();
    can.push(can_ids::THROTTLE_DATA, &encode_throttle(10));
    can.push(0x0200, &[0xFF, 0xFF]);
    can.push(can_ids::THROTTLE_DATA, &encode_throttle(30));

    let count = CanDispatcher::new().dispatch_pending(&mut can, &ctx);

    assert_eq!(count, 3);
    assert!(can.incoming.is_empty());
    assert_eq!(datastore.throttle_history(), vec![10, 30]);
    assert_eq!(datastore.throttle_percentage(), 30);
}
