//! Tokio-based Unix domain sockets. Must be used inside a Tokio runtime with
//! I/O enabled.

mod datagram;
mod listener;
mod stream;

pub use datagram::UdDatagram;
pub use listener::UdStreamListener;
pub use stream::{ReadHalf, UdStream, WriteHalf};
