//! Payload decoders for the entries of the CAN message table.
//!
//! Every handler checks the received length against its table entry before
//! touching the payload.

use super::frame::{CanFrame, DecodeError};
use super::table::{CanMessageDescriptor, HandlerContext};
use crate::traits::Severity;

/// Encodes a throttle percentage the way the handlebar controller sends it.
///
/// ```rust
/// use rs_motorboard::can::{decode_throttle, encode_throttle};
///
/// assert_eq!(encode_throttle(0x1234), [0x34, 0x12]);
/// assert_eq!(decode_throttle([0x34, 0x12]), 0x1234);
/// ```
pub const fn encode_throttle(percentage: u16) -> [u8; 2] {
    percentage.to_le_bytes()
}

/// Decodes a little-endian throttle payload.
pub const fn decode_throttle(payload: [u8; 2]) -> u16 {
    u16::from_le_bytes(payload)
}

fn checked_payload<'f>(
    entry: &CanMessageDescriptor,
    frame: &'f CanFrame,
    ctx: &HandlerContext<'_>,
) -> Result<&'f [u8], DecodeError> {
    if frame.len() != entry.length {
        let err = DecodeError::PayloadLengthMismatch {
            expected: entry.length,
            actual: frame.len(),
        };
        ctx.sink.emit(
            Severity::Warning,
            format_args!("CAN {:#06x} ({:?}): {}", entry.id, entry.index, err),
        );
        return Err(err);
    }
    Ok(frame.payload())
}

/// Throttle command: forwards the percentage to the datastore unchanged.
pub fn throttle_data(
    entry: &CanMessageDescriptor,
    frame: &CanFrame,
    ctx: &HandlerContext<'_>,
) -> Result<(), DecodeError> {
    let payload = checked_payload(entry, frame, ctx)?;
    let raw: [u8; 2] = payload
        .try_into()
        .map_err(|_| DecodeError::PayloadLengthMismatch {
            expected: 2,
            actual: frame.len(),
        })?;
    ctx.sink.emit(
        Severity::Debug,
        format_args!("ThrottleData: {:02x} {:02x}", raw[1], raw[0]),
    );
    let percentage = u32::from(decode_throttle(raw));
    ctx.sink.emit(
        Severity::Debug,
        format_args!("CAN Throttle percentage received: {}", percentage),
    );
    ctx.datastore.set_throttle_percentage(percentage);
    Ok(())
}

/// Speed report. Logged only.
pub fn speed_data(
    entry: &CanMessageDescriptor,
    frame: &CanFrame,
    ctx: &HandlerContext<'_>,
) -> Result<(), DecodeError> {
    checked_payload(entry, frame, ctx)?;
    ctx.sink
        .emit(Severity::Debug, format_args!("SpeedData: id {:#06x}", frame.id()));
    Ok(())
}

/// Motor temperature report. Logged only.
pub fn motor_temperature(
    entry: &CanMessageDescriptor,
    frame: &CanFrame,
    ctx: &HandlerContext<'_>,
) -> Result<(), DecodeError> {
    checked_payload(entry, frame, ctx)?;
    ctx.sink.emit(
        Severity::Debug,
        format_args!("MotorTemperature: id {:#06x}", frame.id()),
    );
    Ok(())
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::can::table::CAN_MESSAGE_TABLE;
    use crate::hal::{MockDatastore, MockDebugSink};
    use crate::traits::Datastore;

    #[test]
    fn throttle_is_little_endian() {
        let datastore = MockDatastore::new();
        let sink = MockDebugSink::new();
        let ctx = HandlerContext::new(&datastore, &sink);
        let frame = CanFrame::new(0x0001, &[0x2C, 0x01]).unwrap();

        throttle_data(&CAN_MESSAGE_TABLE[0], &frame, &ctx).unwrap();

        assert_eq!(datastore.throttle_percentage(), 300);
        assert!(sink.contains("ThrottleData: 01 2c"));
        assert!(sink.contains("CAN Throttle percentage received: 300"));
    }

    #[test]
    fn throttle_is_not_clamped() {
        let datastore = MockDatastore::new();
        let sink = MockDebugSink::new();
        let ctx = HandlerContext::new(&datastore, &sink);
        let frame = CanFrame::new(0x0001, &encode_throttle(u16::MAX)).unwrap();

        throttle_data(&CAN_MESSAGE_TABLE[0], &frame, &ctx).unwrap();

        assert_eq!(datastore.throttle_percentage(), 65535);
    }

    #[test]
    fn short_throttle_is_rejected_without_side_effects() {
        let datastore = MockDatastore::new();
        let sink = MockDebugSink::new();
        let ctx = HandlerContext::new(&datastore, &sink);
        let frame = CanFrame::new(0x0001, &[0x50]).unwrap();

        let result = throttle_data(&CAN_MESSAGE_TABLE[0], &frame, &ctx);

        assert_eq!(
            result,
            Err(DecodeError::PayloadLengthMismatch {
                expected: 2,
                actual: 1
            })
        );
        assert!(datastore.throttle_history().is_empty());
        assert_eq!(sink.count_with(Severity::Warning), 1);
    }

    #[test]
    fn reports_validate_length() {
        let datastore = MockDatastore::new();
        let sink = MockDebugSink::new();
        let ctx = HandlerContext::new(&datastore, &sink);
        let long = CanFrame::new(0x0400, &[1, 2, 3]).unwrap();
        let ok = CanFrame::new(0x0401, &[0x40, 0x00]).unwrap();

        assert!(speed_data(&CAN_MESSAGE_TABLE[1], &long, &ctx).is_err());
        assert!(motor_temperature(&CAN_MESSAGE_TABLE[2], &ok, &ctx).is_ok());
        assert!(sink.contains("MotorTemperature: id 0x0401"));
        assert!(datastore.throttle_history().is_empty());
    }
}
