use std::fmt::{self, Debug, Formatter};
use std::io;
use std::iter::FusedIterator;
use std::os::unix::io::{AsFd, BorrowedFd, OwnedFd};

use libc::SOCK_STREAM;
use tracing::debug;

use super::{PathDropGuard, ToUdSocketPath, UdSocketPath, UdStream};
use crate::os::unix::{c_wrappers, FdOps};
use crate::TryClone;

/// Backlog passed to `listen` unless overridden. Matches the usual `SOMAXCONN`.
pub const DEFAULT_BACKLOG: i32 = 128;

/// How [`UdStreamListener::bind_with_options`] sets up the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdStreamListenerOptions {
    /// Maximum length of the queue of pending connections.
    pub backlog: i32,
    /// Start the listener in nonblocking mode.
    pub nonblocking: bool,
    /// Remove the socket file when the listener is dropped.
    pub drop_guard: bool,
}

impl Default for UdStreamListenerOptions {
    fn default() -> Self {
        Self {
            backlog: DEFAULT_BACKLOG,
            nonblocking: false,
            drop_guard: false,
        }
    }
}

/// A Unix domain stream socket listening for connections.
///
/// A listener bound without a drop guard leaves its socket file behind when
/// dropped, and a later bind to the same path fails with
/// [`AddrInUse`](io::ErrorKind::AddrInUse) until the file is removed.
pub struct UdStreamListener {
    fd: FdOps,
    drop_guard: PathDropGuard,
}

impl UdStreamListener {
    /// Binds to `path` and starts listening.
    ///
    /// # Example
    /// ```no_run
    /// use interlink::os::unix::udsocket::UdStreamListener;
    ///
    /// let listener = UdStreamListener::bind("/tmp/example.sock")?;
    /// for conn in listener.incoming() {
    ///     match conn {
    ///         Ok(conn) => println!("New client: {conn:?}"),
    ///         Err(e) => eprintln!("Incoming connection failed: {e}"),
    ///     }
    /// }
    /// # Ok::<(), std::io::Error>(())
    /// ```
    pub fn bind<'a>(path: impl ToUdSocketPath<'a>) -> io::Result<Self> {
        Self::bind_with_options(path, UdStreamListenerOptions::default())
    }

    /// Like [`bind`](Self::bind), and removes the socket file once the
    /// listener is dropped, including during unwinding.
    pub fn bind_with_drop_guard<'a>(path: impl ToUdSocketPath<'a>) -> io::Result<Self> {
        Self::bind_with_options(
            path,
            UdStreamListenerOptions {
                drop_guard: true,
                ..UdStreamListenerOptions::default()
            },
        )
    }

    pub fn bind_with_options<'a>(
        path: impl ToUdSocketPath<'a>,
        options: UdStreamListenerOptions,
    ) -> io::Result<Self> {
        let path = path.to_socket_path()?;
        let addr = path.to_sockaddr()?;
        let fd = c_wrappers::create_uds(SOCK_STREAM, options.nonblocking)?;
        c_wrappers::bind(fd.as_fd(), &addr)?;
        // Armed before listen so a failure there still cleans up
        let drop_guard = if options.drop_guard {
            PathDropGuard::new(&path)
        } else {
            PathDropGuard::dummy()
        };
        c_wrappers::listen(fd.as_fd(), options.backlog)?;
        debug!(
            %path,
            fd = fd.as_raw(),
            backlog = options.backlog,
            drop_guard = options.drop_guard,
            "Listening on Unix stream socket"
        );
        Ok(Self { fd, drop_guard })
    }

    /// Waits for a client to connect. In nonblocking mode fails with
    /// [`WouldBlock`](io::ErrorKind::WouldBlock) if none is pending.
    pub fn accept(&self) -> io::Result<UdStream> {
        c_wrappers::accept(self.fd.as_fd()).map(UdStream)
    }

    /// An endless iterator calling [`accept`](Self::accept).
    pub fn incoming(&self) -> Incoming<'_> {
        Incoming { listener: self }
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        c_wrappers::set_nonblocking(self.fd.as_fd(), nonblocking)
    }

    pub fn is_nonblocking(&self) -> io::Result<bool> {
        c_wrappers::get_nonblocking(self.fd.as_fd())
    }

    /// The address the listener is bound to, as reported by the kernel.
    pub fn local_path(&self) -> io::Result<UdSocketPath<'static>> {
        let addr = c_wrappers::local_addr(self.fd.as_fd())?;
        Ok(UdSocketPath::from_sockaddr(&addr))
    }

    pub(crate) fn has_drop_guard(&self) -> bool {
        self.drop_guard.enabled()
    }

    #[cfg(feature = "tokio")]
    pub(crate) fn into_parts(self) -> (FdOps, PathDropGuard) {
        (self.fd, self.drop_guard)
    }
}

impl Debug for UdStreamListener {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("UdStreamListener")
            .field("fd", &self.fd.as_raw())
            .field("has_drop_guard", &self.has_drop_guard())
            .finish()
    }
}

/// Clones share the socket but never the drop guard: only the original
/// listener unlinks the socket file, and it does so even while clones are
/// still accepting.
impl TryClone for UdStreamListener {
    /// The clone has no drop guard. Only the original unlinks the path.
    fn try_clone(&self) -> io::Result<Self> {
        Ok(Self {
            fd: self.fd.try_clone()?,
            drop_guard: PathDropGuard::dummy(),
        })
    }
}

impl AsFd for UdStreamListener {
    #[inline]
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

/// The socket file outlives the conversion; whoever holds the descriptor now
/// owns the cleanup.
impl From<UdStreamListener> for OwnedFd {
    fn from(mut x: UdStreamListener) -> Self {
        x.drop_guard.disarm();
        x.fd.0
    }
}

impl From<OwnedFd> for UdStreamListener {
    fn from(fd: OwnedFd) -> Self {
        Self {
            fd: FdOps(fd),
            drop_guard: PathDropGuard::dummy(),
        }
    }
}

derive_raw_fd!(UdStreamListener);

/// Iterator returned by [`UdStreamListener::incoming`]. Never yields `None`.
#[derive(Debug)]
pub struct Incoming<'a> {
    listener: &'a UdStreamListener,
}

impl Iterator for Incoming<'_> {
    type Item = io::Result<UdStream>;
    fn next(&mut self) -> Option<Self::Item> {
        Some(self.listener.accept())
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}

impl FusedIterator for Incoming<'_> {}
