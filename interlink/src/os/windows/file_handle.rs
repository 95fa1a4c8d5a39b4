use std::fmt::{self, Debug, Formatter};
use std::fs::File;
use std::io::{self, IoSlice, IoSliceMut, Read, Write};
use std::os::windows::io::{AsHandle, AsRawHandle, BorrowedHandle, OwnedHandle};

use super::c_wrappers;
use crate::TryClone;

/// A pipe handle with file-style I/O. `&FileHandle` implements the I/O
/// traits too, as `ReadFile`/`WriteFile` need no exclusive access.
pub(crate) struct FileHandle(pub(crate) File);

impl Read for &FileHandle {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.0).read(buf)
    }
    #[inline]
    fn read_vectored(&mut self, bufs: &mut [IoSliceMut<'_>]) -> io::Result<usize> {
        (&self.0).read_vectored(bufs)
    }
}

impl Write for &FileHandle {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&self.0).write(buf)
    }
    #[inline]
    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        (&self.0).write_vectored(bufs)
    }
    /// Pipe writes are not buffered on our side.
    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for FileHandle {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (&*self).read(buf)
    }
    #[inline]
    fn read_vectored(&mut self, bufs: &mut [IoSliceMut<'_>]) -> io::Result<usize> {
        (&*self).read_vectored(bufs)
    }
}

impl Write for FileHandle {
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

impl TryClone for FileHandle {
    fn try_clone(&self) -> io::Result<Self> {
        let handle = c_wrappers::duplicate_handle(self.0.as_handle())?;
        Ok(Self(File::from(handle)))
    }
}

impl Debug for FileHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("handle", &self.0.as_raw_handle())
            .finish()
    }
}

impl AsHandle for FileHandle {
    #[inline]
    fn as_handle(&self) -> BorrowedHandle<'_> {
        self.0.as_handle()
    }
}

impl From<FileHandle> for OwnedHandle {
    #[inline]
    fn from(x: FileHandle) -> Self {
        x.0.into()
    }
}

impl From<OwnedHandle> for FileHandle {
    #[inline]
    fn from(handle: OwnedHandle) -> Self {
        Self(File::from(handle))
    }
}
