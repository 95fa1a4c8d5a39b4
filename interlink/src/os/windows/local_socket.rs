//! Local sockets on Windows are byte-mode named pipes.

use std::io;

use super::named_pipe::{PipeListener, PipeListenerOptions, PipeStream};
use crate::local_socket::{ListenerOptions, LocalSocketName};

pub(crate) type ListenerImpl = PipeListener;
pub(crate) type StreamImpl = PipeStream;

pub(crate) fn bind(options: &ListenerOptions<'_>) -> io::Result<ListenerImpl> {
    let name = options.name_ref()?;
    PipeListenerOptions::new()
        .name(name.inner())
        .nonblocking(options.nonblocking)
        .create()
}

pub(crate) fn connect(name: &LocalSocketName<'_>) -> io::Result<StreamImpl> {
    PipeStream::connect(name.inner())
}

#[cfg(feature = "tokio")]
pub(crate) mod tokio {
    use std::ffi::OsString;
    use std::fmt::{self, Debug, Formatter};
    use std::io;
    use std::mem;
    use std::os::windows::io::{AsHandle, BorrowedHandle};
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;

    use ::tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
    use ::tokio::net::windows::named_pipe::{
        ClientOptions, NamedPipeClient, NamedPipeServer, ServerOptions,
    };
    use ::tokio::sync::Mutex;
    use tracing::debug;
    use windows_sys::Win32::Foundation::ERROR_PIPE_BUSY;

    use super::super::named_pipe::{
        client_process_id, first_instance_error, pipe_path, server_process_id,
    };
    use crate::local_socket::{ListenerOptions, LocalSocketName};
    use crate::ReuniteError;

    /// Pause between attempts while every instance of the pipe is busy.
    const BUSY_RETRY_DELAY: Duration = Duration::from_millis(50);

    /// `nonblocking` has no meaning for an async listener, and pipe names are
    /// not files, so `reclaim_name` has nothing to reclaim. Both are ignored,
    /// as `backlog` is.
    pub(crate) fn bind(options: &ListenerOptions<'_>) -> io::Result<ListenerImpl> {
        let path = pipe_path(options.name_ref()?.inner());
        let first = server_options()
            .first_pipe_instance(true)
            .create(&path)
            .map_err(first_instance_error)?;
        debug!(path = ?path, "Created Tokio named pipe listener");
        Ok(ListenerImpl {
            path,
            stored: Mutex::new(first),
        })
    }

    fn server_options() -> ServerOptions {
        let mut options = ServerOptions::new();
        options.reject_remote_clients(true);
        options
    }

    pub(crate) async fn connect(name: &LocalSocketName<'_>) -> io::Result<StreamImpl> {
        let path = pipe_path(name.inner());
        loop {
            match ClientOptions::new().open(&path) {
                Ok(client) => {
                    debug!(path = ?path, "Connected to Tokio named pipe");
                    return Ok(StreamImpl(PipeEnd::Client(client)));
                }
                Err(e) if e.raw_os_error() == Some(ERROR_PIPE_BUSY as i32) => {}
                Err(e) => return Err(e),
            }
            ::tokio::time::sleep(BUSY_RETRY_DELAY).await;
        }
    }

    pub(crate) struct ListenerImpl {
        path: OsString,
        stored: Mutex<NamedPipeServer>,
    }

    impl ListenerImpl {
        pub(crate) async fn accept(&self) -> io::Result<StreamImpl> {
            let mut stored = self.stored.lock().await;
            stored.connect().await?;
            let fresh = server_options().create(&self.path)?;
            let connected = mem::replace(&mut *stored, fresh);
            Ok(StreamImpl(PipeEnd::Server(connected)))
        }
    }

    impl Debug for ListenerImpl {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            f.debug_struct("LocalSocketListener")
                .field("path", &self.path)
                .finish_non_exhaustive()
        }
    }

    #[derive(Debug)]
    pub(crate) enum PipeEnd {
        Server(NamedPipeServer),
        Client(NamedPipeClient),
    }

    impl AsyncRead for PipeEnd {
        fn poll_read(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            match self.get_mut() {
                Self::Server(s) => Pin::new(s).poll_read(cx, buf),
                Self::Client(c) => Pin::new(c).poll_read(cx, buf),
            }
        }
    }

    impl AsyncWrite for PipeEnd {
        fn poll_write(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            match self.get_mut() {
                Self::Server(s) => Pin::new(s).poll_write(cx, buf),
                Self::Client(c) => Pin::new(c).poll_write(cx, buf),
            }
        }
        fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            match self.get_mut() {
                Self::Server(s) => Pin::new(s).poll_flush(cx),
                Self::Client(c) => Pin::new(c).poll_flush(cx),
            }
        }
        fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            match self.get_mut() {
                Self::Server(s) => Pin::new(s).poll_shutdown(cx),
                Self::Client(c) => Pin::new(c).poll_shutdown(cx),
            }
        }
    }

    #[derive(Debug)]
    pub(crate) struct StreamImpl(PipeEnd);

    impl StreamImpl {
        pub(crate) fn into_split(self) -> (ReadHalfImpl, WriteHalfImpl) {
            let (read, write) = ::tokio::io::split(self.0);
            (ReadHalfImpl(read), WriteHalfImpl(write))
        }

        pub(crate) fn reunite(
            read: ReadHalfImpl,
            write: WriteHalfImpl,
        ) -> Result<Self, ReuniteError<ReadHalfImpl, WriteHalfImpl>> {
            if read.0.is_pair_of(&write.0) {
                Ok(Self(read.0.unsplit(write.0)))
            } else {
                Err(ReuniteError {
                    read_half: read,
                    write_half: write,
                })
            }
        }

        pub(crate) fn as_handle(&self) -> BorrowedHandle<'_> {
            match &self.0 {
                PipeEnd::Server(s) => s.as_handle(),
                PipeEnd::Client(c) => c.as_handle(),
            }
        }

        pub(crate) fn peer_process_id(&self) -> io::Result<u32> {
            match &self.0 {
                PipeEnd::Server(s) => client_process_id(s.as_handle()),
                PipeEnd::Client(c) => server_process_id(c.as_handle()),
            }
        }
    }

    forward_tokio_read!(StreamImpl);
    forward_tokio_write!(StreamImpl);

    #[derive(Debug)]
    pub(crate) struct ReadHalfImpl(::tokio::io::ReadHalf<PipeEnd>);
    forward_tokio_read!(ReadHalfImpl);

    #[derive(Debug)]
    pub(crate) struct WriteHalfImpl(::tokio::io::WriteHalf<PipeEnd>);
    forward_tokio_write!(WriteHalfImpl);
}
