//! Static CAN message table and the dispatcher that walks it.

use core::fmt;

use super::frame::{CanFrame, DecodeError};
use super::handlers;
use crate::traits::{CanReceiver, Datastore, DebugSink};

/// CAN identifiers understood by the board.
pub mod can_ids {
    /// Throttle command from the handlebar controller.
    pub const THROTTLE_DATA: u16 = 0x0001;
    /// Vehicle speed report.
    pub const SPEED_DATA: u16 = 0x0400;
    /// Motor temperature report.
    pub const MOTOR_TEMPERATURE: u16 = 0x0401;
}

/// Number of entries in [`CAN_MESSAGE_TABLE`].
pub const NUMBER_CAN_MESSAGE_IDS: usize = 3;

/// Stable index of each message kind in the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageIndex {
    /// [`can_ids::THROTTLE_DATA`]
    ThrottleData = 0,
    /// [`can_ids::SPEED_DATA`]
    SpeedData = 1,
    /// [`can_ids::MOTOR_TEMPERATURE`]
    MotorTemperature = 2,
}

/// Collaborators a handler may act on.
#[derive(Clone, Copy)]
pub struct HandlerContext<'a> {
    /// Firmware datastore
    pub datastore: &'a dyn Datastore,
    /// Debug port
    pub sink: &'a dyn DebugSink,
}

impl<'a> HandlerContext<'a> {
    /// Bundles the datastore and debug sink for one dispatch.
    pub fn new(datastore: &'a dyn Datastore, sink: &'a dyn DebugSink) -> Self {
        Self { datastore, sink }
    }
}

/// Handler invoked for a matching frame.
pub type CanHandler =
    fn(&CanMessageDescriptor, &CanFrame, &HandlerContext<'_>) -> Result<(), DecodeError>;

/// One row of the dispatch table.
#[derive(Clone, Copy)]
pub struct CanMessageDescriptor {
    /// Position in the table
    pub index: MessageIndex,
    /// Identifier matched exactly against received frames
    pub id: u16,
    /// Expected payload length in bytes
    pub length: u8,
    /// Decoder for the payload
    pub handler: CanHandler,
}

impl fmt::Debug for CanMessageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanMessageDescriptor")
            .field("index", &self.index)
            .field("id", &format_args!("{:#06x}", self.id))
            .field("length", &self.length)
            .finish()
    }
}

const TABLE: [CanMessageDescriptor; NUMBER_CAN_MESSAGE_IDS] = [
    CanMessageDescriptor {
        index: MessageIndex::ThrottleData,
        id: can_ids::THROTTLE_DATA,
        length: 2,
        handler: handlers::throttle_data,
    },
    CanMessageDescriptor {
        index: MessageIndex::SpeedData,
        id: can_ids::SPEED_DATA,
        length: 2,
        handler: handlers::speed_data,
    },
    CanMessageDescriptor {
        index: MessageIndex::MotorTemperature,
        id: can_ids::MOTOR_TEMPERATURE,
        length: 2,
        handler: handlers::motor_temperature,
    },
];

/// Returns `true` when no identifier appears twice and every entry sits at
/// its own index.
pub const fn table_is_well_formed(table: &[CanMessageDescriptor]) -> bool {
    let mut i = 0;
    while i < table.len() {
        if table[i].index as usize != i {
            return false;
        }
        let mut j = i + 1;
        while j < table.len() {
            if table[i].id == table[j].id {
                return false;
            }
            j += 1;
        }
        i += 1;
    }
    true
}

const _: () = assert!(
    table_is_well_formed(&TABLE),
    "CAN message table has duplicate ids or misplaced entries"
);

/// Every message the board reacts to.
pub static CAN_MESSAGE_TABLE: [CanMessageDescriptor; NUMBER_CAN_MESSAGE_IDS] = TABLE;

/// Result of dispatching one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A handler consumed the frame.
    Handled(MessageIndex),
    /// A handler matched but rejected the payload.
    Rejected(MessageIndex, DecodeError),
    /// No table entry for the identifier. Nothing happened.
    Ignored,
}

/// Routes frames to handlers by exact identifier match.
///
/// # Example
///
/// ```rust
/// use rs_motorboard::can::{encode_throttle, CanDispatcher, CanFrame, DispatchOutcome, HandlerContext, MessageIndex};
/// use rs_motorboard::hal::NullSink;
/// use rs_motorboard::traits::Datastore;
/// use rs_motorboard::SharedDatastore;
///
/// let datastore = SharedDatastore::new();
/// let ctx = HandlerContext::new(&datastore, &NullSink);
/// let dispatcher = CanDispatcher::new();
///
/// let frame = CanFrame::new(0x0001, &encode_throttle(80)).unwrap();
/// assert_eq!(dispatcher.dispatch(&frame, &ctx), DispatchOutcome::Handled(MessageIndex::ThrottleData));
/// assert_eq!(datastore.throttle_percentage(), 80);
///
/// let unknown = CanFrame::new(0x0123, &[1, 2]).unwrap();
/// assert_eq!(dispatcher.dispatch(&unknown, &ctx), DispatchOutcome::Ignored);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct CanDispatcher<'t> {
    table: &'t [CanMessageDescriptor],
}

impl CanDispatcher<'static> {
    /// Dispatcher over [`CAN_MESSAGE_TABLE`].
    pub fn new() -> Self {
        Self {
            table: &CAN_MESSAGE_TABLE,
        }
    }
}

impl Default for CanDispatcher<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'t> CanDispatcher<'t> {
    /// Dispatcher over a caller-supplied table.
    pub fn with_table(table: &'t [CanMessageDescriptor]) -> Self {
        Self { table }
    }

    /// Table entry for `id`, if any.
    pub fn lookup(&self, id: u16) -> Option<&'t CanMessageDescriptor> {
        self.table.iter().find(|entry| entry.id == id)
    }

    /// Hands `frame` to its handler. Unknown identifiers are dropped silently.
    pub fn dispatch(&self, frame: &CanFrame, ctx: &HandlerContext<'_>) -> DispatchOutcome {
        let Some(entry) = self.lookup(frame.id()) else {
            return DispatchOutcome::Ignored;
        };
        match (entry.handler)(entry, frame, ctx) {
            Ok(()) => DispatchOutcome::Handled(entry.index),
            Err(err) => DispatchOutcome::Rejected(entry.index, err),
        }
    }

    /// Dispatches every frame waiting in `rx`. Returns how many were read.
    pub fn dispatch_pending<R: CanReceiver>(
        &self,
        rx: &mut R,
        ctx: &HandlerContext<'_>,
    ) -> usize {
        let mut count = 0;
        while let Some(frame) = rx.try_receive() {
            self.dispatch(&frame, ctx);
            count += 1;
        }
        count
    }
}
