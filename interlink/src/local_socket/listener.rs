use std::fmt::{self, Debug, Formatter};
use std::io;
use std::iter::FusedIterator;

use super::{imp, LocalSocketName, LocalSocketStream, ToLocalSocketName};
use crate::NameError;

/// Builder for [`LocalSocketListener::bind_with_options`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenerOptions<'a> {
    pub(crate) name: Option<LocalSocketName<'a>>,
    pub(crate) nonblocking: bool,
    pub(crate) reclaim_name: bool,
    #[cfg_attr(windows, allow(dead_code))]
    pub(crate) backlog: i32,
}

impl<'a> ListenerOptions<'a> {
    /// No name yet, blocking, reclaiming the name on drop, backlog of 128.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: None,
            nonblocking: false,
            reclaim_name: true,
            backlog: 128,
        }
    }

    #[must_use]
    pub fn name(mut self, name: LocalSocketName<'a>) -> Self {
        self.name = Some(name);
        self
    }

    /// Ignored by the Tokio listener, which never blocks a thread.
    #[must_use]
    pub fn nonblocking(mut self, nonblocking: bool) -> Self {
        self.nonblocking = nonblocking;
        self
    }

    /// Remove the socket file when the listener is dropped. Only meaningful
    /// for file paths on Unix; namespaced names vanish with their last handle.
    #[must_use]
    pub fn reclaim_name(mut self, reclaim_name: bool) -> Self {
        self.reclaim_name = reclaim_name;
        self
    }

    /// Length of the pending-connection queue. Ignored on Windows.
    #[must_use]
    pub fn backlog(mut self, backlog: i32) -> Self {
        self.backlog = backlog;
        self
    }

    pub(crate) fn name_ref(&self) -> io::Result<&LocalSocketName<'a>> {
        self.name.as_ref().ok_or_else(|| NameError::Empty.into())
    }
}

impl Default for ListenerOptions<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// A local socket server, listening for connections.
pub struct LocalSocketListener(pub(crate) imp::ListenerImpl);

impl LocalSocketListener {
    /// Binds with default [`ListenerOptions`].
    ///
    /// Fails with [`AddrInUse`](io::ErrorKind::AddrInUse) if another
    /// listener holds the name. On Windows this only applies while the other
    /// listener is alive.
    pub fn bind<'a>(name: impl ToLocalSocketName<'a>) -> io::Result<Self> {
        Self::bind_with_options(ListenerOptions::new().name(name.to_local_socket_name()?))
    }

    pub fn bind_with_options(options: ListenerOptions<'_>) -> io::Result<Self> {
        imp::bind(&options).map(Self)
    }

    /// Waits for a client. In nonblocking mode fails with
    /// [`WouldBlock`](io::ErrorKind::WouldBlock) if none is pending.
    pub fn accept(&self) -> io::Result<LocalSocketStream> {
        self.0.accept().map(LocalSocketStream)
    }

    /// An endless iterator calling [`accept`](Self::accept).
    pub fn incoming(&self) -> Incoming<'_> {
        Incoming { listener: self }
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        self.0.set_nonblocking(nonblocking)
    }
}

impl Debug for LocalSocketListener {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

// A Windows listener juggles several pipe instances, so it has no single
// handle to expose.
#[cfg(unix)]
forward_as_fd!(LocalSocketListener);
#[cfg(unix)]
forward_from_fd!(LocalSocketListener);
#[cfg(unix)]
derive_raw_fd!(LocalSocketListener);

/// Iterator returned by [`LocalSocketListener::incoming`]. Never yields `None`.
#[derive(Debug)]
pub struct Incoming<'a> {
    listener: &'a LocalSocketListener,
}

impl Iterator for Incoming<'_> {
    type Item = io::Result<LocalSocketStream>;
    fn next(&mut self) -> Option<Self::Item> {
        Some(self.listener.accept())
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}

impl FusedIterator for Incoming<'_> {}
