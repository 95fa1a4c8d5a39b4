use std::io;
use std::os::windows::io::AsRawHandle;
use std::ptr;

use tracing::debug;
use windows_sys::Win32::Foundation::HANDLE;
use windows_sys::Win32::System::Pipes::CreatePipe;

use super::c_wrappers::{self, cvt};
use super::FileHandle;

/// Creates an anonymous pipe with inheritable handles, returning
/// `(write end, read end)`.
pub(crate) fn pipe() -> io::Result<(FileHandle, FileHandle)> {
    let attributes = c_wrappers::inheritable_security_attributes();
    let mut read: HANDLE = ptr::null_mut();
    let mut write: HANDLE = ptr::null_mut();
    // Buffer size 0 selects the system default
    cvt(unsafe { CreatePipe(&mut read, &mut write, &attributes, 0) })?;
    let read = FileHandle::from(c_wrappers::owned_handle(read)?);
    let write = FileHandle::from(c_wrappers::owned_handle(write)?);
    debug!(
        read_handle = ?read.0.as_raw_handle(),
        write_handle = ?write.0.as_raw_handle(),
        "Created unnamed pipe"
    );
    Ok((write, read))
}
