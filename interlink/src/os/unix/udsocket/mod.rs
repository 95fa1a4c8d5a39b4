//! Unix domain sockets.
//!
//! [`UdStreamListener`] and [`UdStream`] provide connection-oriented byte
//! streams, [`UdDatagram`] provides message-oriented sockets. All of them can
//! exchange control messages through the [`cmsg`] module, which is how file
//! descriptors and credentials are passed between processes.
//!
//! Sockets are addressed by [`UdSocketPath`]: a file in the filesystem or, on
//! Linux and Android, a name in the abstract namespace (written with a leading
//! `@`).
//!
//! # Example
//! ```no_run
//! use interlink::os::unix::udsocket::{UdStream, UdStreamListener};
//! use std::io::{Read, Write};
//!
//! let listener = UdStreamListener::bind_with_drop_guard("/tmp/example.sock")?;
//! let mut client = UdStream::connect("/tmp/example.sock")?;
//! let mut server = listener.accept()?;
//!
//! client.write_all(b"ping")?;
//! let mut buf = [0; 4];
//! server.read_exact(&mut buf)?;
//! assert_eq!(&buf, b"ping");
//! # Ok::<(), std::io::Error>(())
//! ```

mod ancwrap;
pub mod cmsg;
mod credentials;
mod datagram;
mod listener;
mod path;
mod stream;
#[cfg(feature = "tokio")]
pub mod tokio;

pub use credentials::PeerCredentials;
pub use datagram::UdDatagram;
pub use listener::{Incoming, UdStreamListener, UdStreamListenerOptions, DEFAULT_BACKLOG};
pub use path::{ToUdSocketPath, UdSocketPath, MAX_UDSOCKET_PATH_LEN, NAMESPACE_SUPPORTED};
pub use stream::UdStream;

pub(crate) use path::{PathDropGuard, SockAddr};

/// Byte counts of a successful receive with ancillary data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ReadAncillarySuccess {
    /// Bytes written into the main (payload) buffers.
    pub main: usize,
    /// Bytes of control messages written into the [`CmsgBuffer`](cmsg::CmsgBuffer).
    pub ancillary: usize,
}
