pub mod codec;
pub mod header;
mod message;

pub use header::{HEADER_SIZE, Header, Lane};
pub use message::{BenchMessage, Message};
