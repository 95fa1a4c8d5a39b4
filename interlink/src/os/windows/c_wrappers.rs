//! `io::Result` wrappers over the Win32 calls shared by the pipe types.

use std::ffi::OsStr;
use std::io;
use std::mem::size_of;
use std::os::windows::ffi::OsStrExt;
use std::os::windows::io::{AsRawHandle, BorrowedHandle, FromRawHandle, OwnedHandle};
use std::ptr;

use windows_sys::Win32::Foundation::{
    DuplicateHandle, BOOL, DUPLICATE_SAME_ACCESS, HANDLE, INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::Security::SECURITY_ATTRIBUTES;
use windows_sys::Win32::System::Threading::GetCurrentProcess;

use crate::NameError;

/// Maps a Win32 `BOOL` result to `io::Result`.
pub(crate) fn cvt(ok: BOOL) -> io::Result<()> {
    if ok == 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Takes ownership of a handle returned by a `Create*` call.
pub(crate) fn owned_handle(handle: HANDLE) -> io::Result<OwnedHandle> {
    if handle == INVALID_HANDLE_VALUE || handle.is_null() {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: the handle is valid and nobody else owns it yet
    Ok(unsafe { OwnedHandle::from_raw_handle(handle) })
}

/// Duplicates a handle within the current process, keeping its access rights.
/// The duplicate is not inheritable.
pub(crate) fn duplicate_handle(handle: BorrowedHandle<'_>) -> io::Result<OwnedHandle> {
    let mut new: HANDLE = ptr::null_mut();
    cvt(unsafe {
        let process = GetCurrentProcess();
        DuplicateHandle(
            process,
            handle.as_raw_handle(),
            process,
            &mut new,
            0,
            0,
            DUPLICATE_SAME_ACCESS,
        )
    })?;
    owned_handle(new)
}

/// Security attributes with default security and inheritable handles.
pub(crate) fn inheritable_security_attributes() -> SECURITY_ATTRIBUTES {
    SECURITY_ATTRIBUTES {
        nLength: size_of::<SECURITY_ATTRIBUTES>() as u32,
        lpSecurityDescriptor: ptr::null_mut(),
        bInheritHandle: 1,
    }
}

/// NUL-terminated UTF-16, rejecting interior NULs.
pub(crate) fn to_wide_null(value: &OsStr) -> io::Result<Vec<u16>> {
    let mut wide: Vec<u16> = value.encode_wide().collect();
    if wide.contains(&0) {
        return Err(NameError::InteriorNul.into());
    }
    wide.push(0);
    Ok(wide)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::windows::io::AsHandle;

    #[test]
    fn wide_strings_are_terminated() {
        assert_eq!(to_wide_null(OsStr::new("ab")).unwrap(), [97, 98, 0]);
        assert!(to_wide_null(OsStr::new("a\0b")).is_err());
    }

    #[test]
    fn duplicate_gives_distinct_handle() {
        let file = tempfile::tempfile().unwrap();
        let dup = duplicate_handle(file.as_handle()).unwrap();
        assert_ne!(dup.as_raw_handle(), file.as_raw_handle());
    }
}
