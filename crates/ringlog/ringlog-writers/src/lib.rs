//! `ringlog-writers`: the downstream `Writer` contract `ConsumerCore`
//! dispatches decoded records to, plus two reference implementations and
//! the decode policy that turns a raw slot record into a `DecodedRecord`.
//!
//! Neither reference writer is load-bearing for the transport itself —
//! any `Writer` impl works — but they let `ringlog-consumer` be exercised
//! end to end without pulling in an external logging façade.

mod console;
mod decode;
mod rotating;
mod vec_writer;
mod writer;

pub use console::ConsoleWriter;
pub use decode::{DecodedRecord, decode};
pub use rotating::{RotatingFileWriter, RotatingWriterError};
pub use vec_writer::VecWriter;
pub use writer::Writer;
