//! The change-record data model (§3) and the Record Converter (§4.1).
//!
//! Everything here is pure and synchronous: no I/O, no async, no knowledge
//! of DynamoDB Streams or NATS. `cdc-source` and `cdc-sink` build on top of
//! these types.

mod attribute;
mod event;
mod record;
mod shard;

pub use attribute::{convert, AttributeMap, AttributeValue};
pub use event::PublishedEvent;
pub use record::{EventName, StreamRecord};
pub use shard::{Shard, StartPolicy};
