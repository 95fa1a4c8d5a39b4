//! Local sockets: named, connection-oriented byte streams between processes
//! on the same machine.
//!
//! On Unix a local socket is a Unix domain stream socket, on Windows it is a
//! byte-mode named pipe. The name decides where it lives, see
//! [`ToLocalSocketName`] and [`NameTypeSupport`].
//!
//! # Example
//! ```no_run
//! use interlink::local_socket::{LocalSocketListener, LocalSocketStream};
//! use std::io::{BufRead, BufReader, Write};
//!
//! let listener = LocalSocketListener::bind("@example.sock")?;
//! std::thread::spawn(move || {
//!     for conn in listener.incoming().filter_map(Result::ok) {
//!         let mut conn = BufReader::new(conn);
//!         let mut line = String::new();
//!         if conn.read_line(&mut line).is_ok() {
//!             let _ = conn.get_mut().write_all(line.as_bytes());
//!         }
//!     }
//! });
//!
//! let mut stream = LocalSocketStream::connect("@example.sock")?;
//! stream.write_all(b"hello\n")?;
//! # Ok::<(), std::io::Error>(())
//! ```

mod listener;
mod name;
mod stream;
#[cfg(feature = "tokio")]
pub mod tokio;

pub use listener::{Incoming, ListenerOptions, LocalSocketListener};
pub use name::{LocalSocketName, NameTypeSupport, ToLocalSocketName};
pub use stream::LocalSocketStream;

#[cfg(unix)]
pub(crate) use crate::os::unix::local_socket as imp;
#[cfg(windows)]
pub(crate) use crate::os::windows::local_socket as imp;
