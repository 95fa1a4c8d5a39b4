//! Unnamed pipes: a one-way byte channel known only by its two handles.
//!
//! Both ends can be handed to a child process. On Unix, that happens through
//! `fork` or by passing the descriptor over a Unix domain socket; on Windows
//! the handles are created inheritable.
//!
//! # Example
//! ```
//! use interlink::unnamed_pipe::pipe;
//! use std::io::{Read, Write};
//!
//! let (mut writer, mut reader) = pipe()?;
//! writer.write_all(b"hello")?;
//! drop(writer);
//! let mut out = String::new();
//! reader.read_to_string(&mut out)?;
//! assert_eq!(out, "hello");
//! # Ok::<(), std::io::Error>(())
//! ```

#[cfg(all(unix, feature = "tokio"))]
pub mod tokio;

use std::fmt::{self, Debug, Formatter};
use std::io::{self, IoSlice, IoSliceMut, Read, Write};

#[cfg(unix)]
use crate::os::unix::{unnamed_pipe as imp, FdOps as PipeEnd};
#[cfg(windows)]
use crate::os::windows::{unnamed_pipe as imp, FileHandle as PipeEnd};

/// Creates a pipe and returns its writing end, then its reading end.
pub fn pipe() -> io::Result<(UnnamedPipeWriter, UnnamedPipeReader)> {
    let (writer, reader) = imp::pipe()?;
    Ok((UnnamedPipeWriter(writer), UnnamedPipeReader(reader)))
}

/// The reading end of an unnamed pipe. Reads return `Ok(0)` once every
/// writer is gone and the buffered data has been consumed.
pub struct UnnamedPipeReader(PipeEnd);

impl Read for UnnamedPipeReader {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
    #[inline]
    fn read_vectored(&mut self, bufs: &mut [IoSliceMut<'_>]) -> io::Result<usize> {
        self.0.read_vectored(bufs)
    }
}

impl Debug for UnnamedPipeReader {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UnnamedPipeReader").field(&self.0).finish()
    }
}

forward_handle!(UnnamedPipeReader);
forward_try_clone!(UnnamedPipeReader);

/// The writing end of an unnamed pipe. Writes are unbuffered, so
/// [`flush`](Write::flush) does nothing.
pub struct UnnamedPipeWriter(PipeEnd);

impl Write for UnnamedPipeWriter {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }
    #[inline]
    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        self.0.write_vectored(bufs)
    }
    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Debug for UnnamedPipeWriter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UnnamedPipeWriter").field(&self.0).finish()
    }
}

forward_handle!(UnnamedPipeWriter);
forward_try_clone!(UnnamedPipeWriter);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TryClone;

    #[test]
    fn eof_after_writer_dropped() {
        let (mut writer, mut reader) = pipe().unwrap();
        writer.write_all(b"abc").unwrap();
        writer.flush().unwrap();
        drop(writer);
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"abc");
        assert_eq!(reader.read(&mut [0; 4]).unwrap(), 0);
    }

    #[test]
    fn cloned_writer_keeps_pipe_open() {
        let (writer, mut reader) = pipe().unwrap();
        let mut clone = writer.try_clone().unwrap();
        drop(writer);
        clone.write_all(b"x").unwrap();
        let mut buf = [0; 1];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"x");
    }

    #[test]
    fn writer_from_another_thread() {
        let (mut writer, mut reader) = pipe().unwrap();
        let handle = std::thread::spawn(move || {
            for chunk in [&b"one "[..], b"two ", b"three"] {
                writer.write_all(chunk).unwrap();
            }
        });
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        handle.join().unwrap();
        assert_eq!(out, "one two three");
    }
}
