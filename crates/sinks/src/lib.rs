//! `MessageSink` implementations.
//!
//! The stdout sink is the tap's wire output: one JSON line per message,
//! flushed eagerly so a downstream target sees state checkpoints as soon
//! as they happen. The buffer sink captures messages in memory for tests.

mod buffer;
mod stdout;

pub use buffer::BufferSink;
pub use stdout::StdoutSink;
