//! Byte-mode duplex named pipes.
//!
//! A named pipe lives under `\\.\pipe\` and exists while at least one
//! instance of it is open. A [`PipeListener`] always keeps one spare
//! instance waiting, so clients arriving between two `accept` calls are not
//! turned away.

use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::fmt::{self, Debug, Formatter};
use std::io::{self, IoSlice, IoSliceMut, Read, Write};
use std::iter::FusedIterator;
use std::mem;
use std::num::NonZeroU8;
use std::os::windows::io::{AsHandle, AsRawHandle, BorrowedHandle, OwnedHandle};
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::debug;
use windows_sys::Win32::Foundation::{
    ERROR_ACCESS_DENIED, ERROR_NO_DATA, ERROR_PIPE_BUSY, ERROR_PIPE_CONNECTED,
    ERROR_PIPE_LISTENING, GENERIC_READ, GENERIC_WRITE,
};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, FILE_FLAG_FIRST_PIPE_INSTANCE, OPEN_EXISTING, PIPE_ACCESS_DUPLEX,
};
use windows_sys::Win32::System::Pipes::{
    ConnectNamedPipe, CreateNamedPipeW, DisconnectNamedPipe, GetNamedPipeClientProcessId,
    GetNamedPipeInfo, GetNamedPipeServerProcessId, SetNamedPipeHandleState, WaitNamedPipeW,
    PIPE_NOWAIT, PIPE_READMODE_BYTE, PIPE_REJECT_REMOTE_CLIENTS, PIPE_SERVER_END, PIPE_TYPE_BYTE,
    PIPE_UNLIMITED_INSTANCES, PIPE_WAIT,
};

use super::c_wrappers::{self, cvt, to_wide_null};
use super::FileHandle;
use crate::TryClone;

/// Prefix of every named pipe path.
pub const PIPE_PREFIX: &str = r"\\.\pipe\";

/// `NMPWAIT_WAIT_FOREVER`.
const WAIT_FOREVER: u32 = u32::MAX;

/// Full path of the pipe called `name`.
#[must_use]
pub fn pipe_path(name: &OsStr) -> OsString {
    let mut path = OsString::from(PIPE_PREFIX);
    path.push(name);
    path
}

/// Builder for [`PipeListener`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipeListenerOptions<'a> {
    /// Name of the pipe, without the `\\.\pipe\` prefix.
    pub name: Cow<'a, OsStr>,
    pub nonblocking: bool,
    /// Maximum number of simultaneously open instances, unlimited if `None`.
    pub instance_limit: Option<NonZeroU8>,
    /// Advisory size of the inbound buffer, in bytes.
    pub input_buffer_size_hint: u32,
    /// Advisory size of the outbound buffer, in bytes.
    pub output_buffer_size_hint: u32,
}

impl<'a> PipeListenerOptions<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: Cow::Borrowed(OsStr::new("")),
            nonblocking: false,
            instance_limit: None,
            input_buffer_size_hint: 0,
            output_buffer_size_hint: 0,
        }
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<Cow<'a, OsStr>>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn nonblocking(mut self, nonblocking: bool) -> Self {
        self.nonblocking = nonblocking;
        self
    }

    #[must_use]
    pub fn instance_limit(mut self, limit: Option<NonZeroU8>) -> Self {
        self.instance_limit = limit;
        self
    }

    #[must_use]
    pub fn input_buffer_size_hint(mut self, size: u32) -> Self {
        self.input_buffer_size_hint = size;
        self
    }

    #[must_use]
    pub fn output_buffer_size_hint(mut self, size: u32) -> Self {
        self.output_buffer_size_hint = size;
        self
    }

    /// Creates the first instance of the pipe and wraps it in a listener.
    ///
    /// Fails with [`AddrInUse`](io::ErrorKind::AddrInUse) if a pipe with
    /// this name already exists.
    pub fn create(self) -> io::Result<PipeListener> {
        if self.name.is_empty() {
            return Err(crate::NameError::Empty.into());
        }
        let path = to_wide_null(&pipe_path(&self.name))?;
        let config = PipeListenerOptions {
            name: Cow::Owned(self.name.into_owned()),
            nonblocking: self.nonblocking,
            instance_limit: self.instance_limit,
            input_buffer_size_hint: self.input_buffer_size_hint,
            output_buffer_size_hint: self.output_buffer_size_hint,
        };
        let first = config.create_instance(&path, true)?;
        debug!(
            name = ?config.name,
            nonblocking = config.nonblocking,
            "Created named pipe listener"
        );
        Ok(PipeListener {
            nonblocking: AtomicBool::new(config.nonblocking),
            config,
            path,
            stored: Mutex::new(first),
        })
    }

    fn create_instance(&self, path: &[u16], first: bool) -> io::Result<PipeStream> {
        let mut open_mode = PIPE_ACCESS_DUPLEX;
        if first {
            open_mode |= FILE_FLAG_FIRST_PIPE_INSTANCE;
        }
        let max_instances = self
            .instance_limit
            .map_or(PIPE_UNLIMITED_INSTANCES, |n| u32::from(n.get()));
        let handle = unsafe {
            CreateNamedPipeW(
                path.as_ptr(),
                open_mode,
                PIPE_TYPE_BYTE
                    | PIPE_READMODE_BYTE
                    | wait_mode(self.nonblocking)
                    | PIPE_REJECT_REMOTE_CLIENTS,
                max_instances,
                self.output_buffer_size_hint,
                self.input_buffer_size_hint,
                0,
                ptr::null(),
            )
        };
        let handle = c_wrappers::owned_handle(handle).map_err(|e| {
            if first {
                first_instance_error(e)
            } else {
                e
            }
        })?;
        Ok(PipeStream {
            handle: FileHandle::from(handle),
            is_server: true,
        })
    }
}

impl Default for PipeListenerOptions<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Creating the first instance of a name someone else holds fails with
/// `ERROR_ACCESS_DENIED`; report it the way a taken socket address would be.
pub(crate) fn first_instance_error(e: io::Error) -> io::Error {
    if e.raw_os_error() == Some(ERROR_ACCESS_DENIED as i32) {
        io::Error::new(
            io::ErrorKind::AddrInUse,
            "a pipe with this name already exists",
        )
    } else {
        e
    }
}

fn wait_mode(nonblocking: bool) -> u32 {
    if nonblocking {
        PIPE_NOWAIT
    } else {
        PIPE_WAIT
    }
}

/// A named pipe server handing out one [`PipeStream`] per client.
pub struct PipeListener {
    config: PipeListenerOptions<'static>,
    path: Vec<u16>,
    nonblocking: AtomicBool,
    stored: Mutex<PipeStream>,
}

impl PipeListener {
    /// Waits for a client to connect to the spare instance, replaces it
    /// with a fresh one and returns the connected one. In nonblocking mode
    /// fails with [`WouldBlock`](io::ErrorKind::WouldBlock) if no client is
    /// waiting.
    pub fn accept(&self) -> io::Result<PipeStream> {
        let mut stored = self.stored.lock().unwrap_or_else(PoisonError::into_inner);
        connect_server(&stored)?;
        let nonblocking = self.nonblocking.load(Ordering::Acquire);
        let fresh = PipeListenerOptions {
            nonblocking,
            ..self.config.clone()
        }
        .create_instance(&self.path, false)?;
        let connected = mem::replace(&mut *stored, fresh);
        drop(stored);
        if nonblocking {
            connected.set_nonblocking(false)?;
        }
        debug!(name = ?self.config.name, "Accepted named pipe client");
        Ok(connected)
    }

    /// An endless iterator calling [`accept`](Self::accept).
    pub fn incoming(&self) -> Incoming<'_> {
        Incoming { listener: self }
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        let stored = self.stored.lock().unwrap_or_else(PoisonError::into_inner);
        stored.set_nonblocking(nonblocking)?;
        self.nonblocking.store(nonblocking, Ordering::Release);
        Ok(())
    }
}

fn connect_server(instance: &PipeStream) -> io::Result<()> {
    let handle = instance.handle.0.as_raw_handle();
    if unsafe { ConnectNamedPipe(handle, ptr::null_mut()) } != 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    match err.raw_os_error().map(|code| code as u32) {
        // The client connected between CreateNamedPipeW and ConnectNamedPipe
        Some(ERROR_PIPE_CONNECTED) => Ok(()),
        Some(ERROR_PIPE_LISTENING) => Err(io::ErrorKind::WouldBlock.into()),
        // A client came and went; recycle the instance
        Some(ERROR_NO_DATA) => {
            cvt(unsafe { DisconnectNamedPipe(handle) })?;
            Err(io::ErrorKind::WouldBlock.into())
        }
        _ => Err(err),
    }
}

impl Debug for PipeListener {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipeListener")
            .field("name", &self.config.name)
            .field("nonblocking", &self.nonblocking.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Iterator returned by [`PipeListener::incoming`]. Never yields `None`.
#[derive(Debug)]
pub struct Incoming<'a> {
    listener: &'a PipeListener,
}

impl Iterator for Incoming<'_> {
    type Item = io::Result<PipeStream>;
    fn next(&mut self) -> Option<Self::Item> {
        Some(self.listener.accept())
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}

impl FusedIterator for Incoming<'_> {}

/// One end of a byte-mode duplex named pipe.
pub struct PipeStream {
    handle: FileHandle,
    is_server: bool,
}

impl PipeStream {
    /// Connects to the pipe called `name`, waiting while all of its
    /// instances are busy.
    ///
    /// Fails with [`NotFound`](io::ErrorKind::NotFound) if no such pipe
    /// exists.
    pub fn connect(name: &OsStr) -> io::Result<Self> {
        let path = to_wide_null(&pipe_path(name))?;
        loop {
            let handle = unsafe {
                CreateFileW(
                    path.as_ptr(),
                    GENERIC_READ | GENERIC_WRITE,
                    0,
                    ptr::null(),
                    OPEN_EXISTING,
                    0,
                    ptr::null_mut(),
                )
            };
            match c_wrappers::owned_handle(handle) {
                Ok(handle) => {
                    debug!(?name, "Connected to named pipe");
                    return Ok(Self {
                        handle: FileHandle::from(handle),
                        is_server: false,
                    });
                }
                Err(e) if e.raw_os_error() == Some(ERROR_PIPE_BUSY as i32) => {
                    // Fails if the pipe vanished meanwhile; the next CreateFileW reports why
                    unsafe { WaitNamedPipeW(path.as_ptr(), WAIT_FOREVER) };
                }
                Err(e) => return Err(e),
            }
        }
    }

    #[must_use]
    pub fn is_server(&self) -> bool {
        self.is_server
    }

    pub fn client_process_id(&self) -> io::Result<u32> {
        client_process_id(self.as_handle())
    }

    pub fn server_process_id(&self) -> io::Result<u32> {
        server_process_id(self.as_handle())
    }

    /// The process ID of the other end.
    pub fn peer_process_id(&self) -> io::Result<u32> {
        if self.is_server {
            self.client_process_id()
        } else {
            self.server_process_id()
        }
    }

    /// In nonblocking mode reads with no data available fail with
    /// [`WouldBlock`](io::ErrorKind::WouldBlock).
    pub fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        let mode = PIPE_READMODE_BYTE | wait_mode(nonblocking);
        cvt(unsafe {
            SetNamedPipeHandleState(
                self.handle.0.as_raw_handle(),
                &mode,
                ptr::null(),
                ptr::null(),
            )
        })
    }
}

pub(crate) fn client_process_id(handle: BorrowedHandle<'_>) -> io::Result<u32> {
    let mut pid = 0;
    cvt(unsafe { GetNamedPipeClientProcessId(handle.as_raw_handle(), &mut pid) })?;
    Ok(pid)
}

pub(crate) fn server_process_id(handle: BorrowedHandle<'_>) -> io::Result<u32> {
    let mut pid = 0;
    cvt(unsafe { GetNamedPipeServerProcessId(handle.as_raw_handle(), &mut pid) })?;
    Ok(pid)
}

fn is_server_end(handle: BorrowedHandle<'_>) -> io::Result<bool> {
    let mut flags = 0;
    cvt(unsafe {
        GetNamedPipeInfo(
            handle.as_raw_handle(),
            &mut flags,
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
        )
    })?;
    Ok(flags & PIPE_SERVER_END != 0)
}

/// `PIPE_NOWAIT` reads report an empty pipe as `ERROR_NO_DATA`.
fn map_empty(result: io::Result<usize>) -> io::Result<usize> {
    match result {
        Err(e) if e.raw_os_error() == Some(ERROR_NO_DATA as i32) => {
            Err(io::ErrorKind::WouldBlock.into())
        }
        other => other,
    }
}

impl Read for &PipeStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        map_empty((&self.handle).read(buf))
    }
    fn read_vectored(&mut self, bufs: &mut [IoSliceMut<'_>]) -> io::Result<usize> {
        map_empty((&self.handle).read_vectored(bufs))
    }
}

impl Write for &PipeStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&self.handle).write(buf)
    }
    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        (&self.handle).write_vectored(bufs)
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for PipeStream {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (&*self).read(buf)
    }
    #[inline]
    fn read_vectored(&mut self, bufs: &mut [IoSliceMut<'_>]) -> io::Result<usize> {
        (&*self).read_vectored(bufs)
    }
}

impl Write for PipeStream {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&*self).write(buf)
    }
    #[inline]
    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        (&*self).write_vectored(bufs)
    }
    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl TryClone for PipeStream {
    fn try_clone(&self) -> io::Result<Self> {
        Ok(Self {
            handle: self.handle.try_clone()?,
            is_server: self.is_server,
        })
    }
}

impl Debug for PipeStream {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipeStream")
            .field("handle", &self.handle.0.as_raw_handle())
            .field("is_server", &self.is_server)
            .finish()
    }
}

impl AsHandle for PipeStream {
    #[inline]
    fn as_handle(&self) -> BorrowedHandle<'_> {
        self.handle.as_handle()
    }
}

impl From<PipeStream> for OwnedHandle {
    #[inline]
    fn from(x: PipeStream) -> Self {
        x.handle.into()
    }
}

/// Which end the handle belongs to is asked of the system; a handle that is
/// not a named pipe is treated as a client end.
impl From<OwnedHandle> for PipeStream {
    fn from(handle: OwnedHandle) -> Self {
        let is_server = is_server_end(handle.as_handle()).unwrap_or(false);
        Self {
            handle: FileHandle::from(handle),
            is_server,
        }
    }
}

derive_raw_handle!(PipeStream);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn unique_name(tag: &str) -> OsString {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        OsString::from(format!("interlink-{tag}-{}-{n}", std::process::id()))
    }

    #[test]
    fn accept_and_exchange() {
        let name = unique_name("exchange");
        let listener = PipeListenerOptions::new().name(name.as_os_str()).create().unwrap();
        let client_name = name.clone();
        let client = std::thread::spawn(move || {
            let mut client = PipeStream::connect(&client_name).unwrap();
            assert!(!client.is_server());
            client.write_all(b"ping").unwrap();
            let mut buf = [0; 4];
            client.read_exact(&mut buf).unwrap();
            buf
        });
        let mut server = listener.accept().unwrap();
        assert!(server.is_server());
        assert_eq!(server.client_process_id().unwrap(), std::process::id());
        let mut buf = [0; 4];
        server.read_exact(&mut buf).unwrap();
        server.write_all(b"pong").unwrap();
        assert_eq!(&client.join().unwrap(), b"pong");
    }

    #[test]
    fn second_listener_on_same_name_fails() {
        let name = unique_name("dup");
        let _first = PipeListenerOptions::new().name(name.as_os_str()).create().unwrap();
        let err = PipeListenerOptions::new()
            .name(name.as_os_str())
            .create()
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AddrInUse);
    }

    #[test]
    fn connect_to_missing_pipe_is_not_found() {
        let err = PipeStream::connect(&unique_name("missing")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn nonblocking_accept_would_block() {
        let name = unique_name("nb");
        let listener = PipeListenerOptions::new()
            .name(name.as_os_str())
            .nonblocking(true)
            .create()
            .unwrap();
        let err = listener.accept().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn handle_round_trip_keeps_end() {
        let name = unique_name("handle");
        let listener = PipeListenerOptions::new().name(name.as_os_str()).create().unwrap();
        let client = PipeStream::connect(&name).unwrap();
        let server = listener.accept().unwrap();
        let server = PipeStream::from(OwnedHandle::from(server));
        assert!(server.is_server());
        let client = PipeStream::from(OwnedHandle::from(client));
        assert!(!client.is_server());
    }
}
