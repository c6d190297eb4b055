//! CAN message dispatch.
//!
//! Received frames are matched by exact identifier against a static table.
//! Each entry names the expected payload length and the handler that decodes
//! it. Frames with an identifier that is not in the table are dropped without
//! any side effect.
//!
//! | Id | Message | Length | Action |
//! |----|---------|--------|--------|
//! | `0x0001` | Throttle | 2 | little-endian percentage to the datastore |
//! | `0x0400` | Speed | 2 | logged |
//! | `0x0401` | Motor temperature | 2 | logged |

pub mod frame;
pub mod handlers;
pub mod table;

pub use frame::{CanFrame, DecodeError, MAX_PAYLOAD};
pub use handlers::{decode_throttle, encode_throttle};
pub use table::{
    can_ids, CanDispatcher, CanHandler, CanMessageDescriptor, DispatchOutcome, HandlerContext,
    MessageIndex, CAN_MESSAGE_TABLE, NUMBER_CAN_MESSAGE_IDS,
};
