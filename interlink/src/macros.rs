// Handle-trait plumbing shared by every public pipe and socket type.
//
// The owned-handle traits (`AsFd`, `From<T> for OwnedFd`, `From<OwnedFd>`) are
// the source of truth; the raw-handle traits are derived from them.

/// `AsFd` and `From<$ty> for OwnedFd` by forwarding to a field.
#[cfg(unix)]
macro_rules! forward_as_fd {
    ($ty:ident, $field:tt) => {
        impl ::std::os::unix::io::AsFd for $ty {
            #[inline]
            fn as_fd(&self) -> ::std::os::unix::io::BorrowedFd<'_> {
                ::std::os::unix::io::AsFd::as_fd(&self.$field)
            }
        }
        impl ::std::convert::From<$ty> for ::std::os::unix::io::OwnedFd {
            #[inline]
            fn from(x: $ty) -> Self {
                ::std::convert::From::from(x.$field)
            }
        }
    };
    ($ty:ident) => {
        forward_as_fd!($ty, 0);
    };
}

/// `From<OwnedFd>` for a single-field tuple struct.
#[cfg(unix)]
macro_rules! forward_from_fd {
    ($ty:ident) => {
        impl ::std::convert::From<::std::os::unix::io::OwnedFd> for $ty {
            #[inline]
            fn from(fd: ::std::os::unix::io::OwnedFd) -> Self {
                Self(::std::convert::From::from(fd))
            }
        }
    };
}

/// `AsRawFd`, `IntoRawFd` and `FromRawFd` in terms of the owned-handle traits.
#[cfg(unix)]
macro_rules! derive_raw_fd {
    ($ty:ident) => {
        impl ::std::os::unix::io::AsRawFd for $ty {
            #[inline]
            fn as_raw_fd(&self) -> ::std::os::unix::io::RawFd {
                ::std::os::unix::io::AsRawFd::as_raw_fd(
                    &::std::os::unix::io::AsFd::as_fd(self),
                )
            }
        }
        impl ::std::os::unix::io::IntoRawFd for $ty {
            #[inline]
            fn into_raw_fd(self) -> ::std::os::unix::io::RawFd {
                let fd: ::std::os::unix::io::OwnedFd = ::std::convert::From::from(self);
                ::std::os::unix::io::IntoRawFd::into_raw_fd(fd)
            }
        }
        impl ::std::os::unix::io::FromRawFd for $ty {
            #[inline]
            unsafe fn from_raw_fd(fd: ::std::os::unix::io::RawFd) -> Self {
                let fd =
                    <::std::os::unix::io::OwnedFd as ::std::os::unix::io::FromRawFd>::from_raw_fd(
                        fd,
                    );
                ::std::convert::From::from(fd)
            }
        }
    };
}

/// `AsHandle` and `From<$ty> for OwnedHandle` by forwarding to a field.
#[cfg(windows)]
macro_rules! forward_as_handle {
    ($ty:ident, $field:tt) => {
        impl ::std::os::windows::io::AsHandle for $ty {
            #[inline]
            fn as_handle(&self) -> ::std::os::windows::io::BorrowedHandle<'_> {
                ::std::os::windows::io::AsHandle::as_handle(&self.$field)
            }
        }
        impl ::std::convert::From<$ty> for ::std::os::windows::io::OwnedHandle {
            #[inline]
            fn from(x: $ty) -> Self {
                ::std::convert::From::from(x.$field)
            }
        }
    };
    ($ty:ident) => {
        forward_as_handle!($ty, 0);
    };
}

/// `From<OwnedHandle>` for a single-field tuple struct.
#[cfg(windows)]
macro_rules! forward_from_handle {
    ($ty:ident) => {
        impl ::std::convert::From<::std::os::windows::io::OwnedHandle> for $ty {
            #[inline]
            fn from(handle: ::std::os::windows::io::OwnedHandle) -> Self {
                Self(::std::convert::From::from(handle))
            }
        }
    };
}

/// `AsRawHandle`, `IntoRawHandle` and `FromRawHandle` in terms of the
/// owned-handle traits.
#[cfg(windows)]
macro_rules! derive_raw_handle {
    ($ty:ident) => {
        impl ::std::os::windows::io::AsRawHandle for $ty {
            #[inline]
            fn as_raw_handle(&self) -> ::std::os::windows::io::RawHandle {
                ::std::os::windows::io::AsRawHandle::as_raw_handle(
                    &::std::os::windows::io::AsHandle::as_handle(self),
                )
            }
        }
        impl ::std::os::windows::io::IntoRawHandle for $ty {
            #[inline]
            fn into_raw_handle(self) -> ::std::os::windows::io::RawHandle {
                let handle: ::std::os::windows::io::OwnedHandle =
                    ::std::convert::From::from(self);
                ::std::os::windows::io::IntoRawHandle::into_raw_handle(handle)
            }
        }
        impl ::std::os::windows::io::FromRawHandle for $ty {
            #[inline]
            unsafe fn from_raw_handle(handle: ::std::os::windows::io::RawHandle) -> Self {
                let handle = <::std::os::windows::io::OwnedHandle as
                    ::std::os::windows::io::FromRawHandle>::from_raw_handle(handle);
                ::std::convert::From::from(handle)
            }
        }
    };
}

/// Cross-platform handle plumbing: picks the fd or handle flavor per target.
macro_rules! forward_handle {
    ($ty:ident) => {
        #[cfg(unix)]
        forward_as_fd!($ty);
        #[cfg(unix)]
        forward_from_fd!($ty);
        #[cfg(unix)]
        derive_raw_fd!($ty);
        #[cfg(windows)]
        forward_as_handle!($ty);
        #[cfg(windows)]
        forward_from_handle!($ty);
        #[cfg(windows)]
        derive_raw_handle!($ty);
    };
}

/// Borrowed-fd traits and fallible `OwnedFd` conversions for a single-field
/// tuple struct over a Tokio type. Registering with (or leaving) the reactor
/// can fail, hence `TryFrom` rather than `From`.
#[cfg(all(unix, feature = "tokio"))]
macro_rules! forward_tokio_fd {
    ($ty:ident) => {
        impl ::std::os::unix::io::AsFd for $ty {
            #[inline]
            fn as_fd(&self) -> ::std::os::unix::io::BorrowedFd<'_> {
                ::std::os::unix::io::AsFd::as_fd(&self.0)
            }
        }
        impl ::std::os::unix::io::AsRawFd for $ty {
            #[inline]
            fn as_raw_fd(&self) -> ::std::os::unix::io::RawFd {
                ::std::os::unix::io::AsRawFd::as_raw_fd(&self.0)
            }
        }
        impl ::std::convert::TryFrom<::std::os::unix::io::OwnedFd> for $ty {
            type Error = ::std::io::Error;
            fn try_from(fd: ::std::os::unix::io::OwnedFd) -> ::std::io::Result<Self> {
                ::std::convert::TryFrom::try_from(fd).map(Self)
            }
        }
        impl ::std::convert::TryFrom<$ty> for ::std::os::unix::io::OwnedFd {
            type Error = ::std::io::Error;
            fn try_from(x: $ty) -> ::std::io::Result<Self> {
                ::std::convert::TryFrom::try_from(x.0)
            }
        }
    };
}

/// `TryClone` for a single-field tuple struct whose field implements it.
macro_rules! forward_try_clone {
    ($ty:ident) => {
        impl $crate::TryClone for $ty {
            #[inline]
            fn try_clone(&self) -> ::std::io::Result<Self> {
                Ok(Self($crate::TryClone::try_clone(&self.0)?))
            }
        }
    };
}

/// Tokio `AsyncRead` for a single-field tuple struct over an `Unpin` reader.
#[cfg(feature = "tokio")]
macro_rules! forward_tokio_read {
    ($ty:ident) => {
        impl ::tokio::io::AsyncRead for $ty {
            #[inline]
            fn poll_read(
                mut self: ::std::pin::Pin<&mut Self>,
                cx: &mut ::std::task::Context<'_>,
                buf: &mut ::tokio::io::ReadBuf<'_>,
            ) -> ::std::task::Poll<::std::io::Result<()>> {
                ::tokio::io::AsyncRead::poll_read(::std::pin::Pin::new(&mut self.0), cx, buf)
            }
        }
    };
}

/// Tokio `AsyncWrite` for a single-field tuple struct over an `Unpin` writer.
#[cfg(feature = "tokio")]
macro_rules! forward_tokio_write {
    ($ty:ident) => {
        impl ::tokio::io::AsyncWrite for $ty {
            #[inline]
            fn poll_write(
                mut self: ::std::pin::Pin<&mut Self>,
                cx: &mut ::std::task::Context<'_>,
                buf: &[u8],
            ) -> ::std::task::Poll<::std::io::Result<usize>> {
                ::tokio::io::AsyncWrite::poll_write(::std::pin::Pin::new(&mut self.0), cx, buf)
            }
            #[inline]
            fn poll_write_vectored(
                mut self: ::std::pin::Pin<&mut Self>,
                cx: &mut ::std::task::Context<'_>,
                bufs: &[::std::io::IoSlice<'_>],
            ) -> ::std::task::Poll<::std::io::Result<usize>> {
                ::tokio::io::AsyncWrite::poll_write_vectored(
                    ::std::pin::Pin::new(&mut self.0),
                    cx,
                    bufs,
                )
            }
            #[inline]
            fn is_write_vectored(&self) -> bool {
                ::tokio::io::AsyncWrite::is_write_vectored(&self.0)
            }
            #[inline]
            fn poll_flush(
                mut self: ::std::pin::Pin<&mut Self>,
                cx: &mut ::std::task::Context<'_>,
            ) -> ::std::task::Poll<::std::io::Result<()>> {
                ::tokio::io::AsyncWrite::poll_flush(::std::pin::Pin::new(&mut self.0), cx)
            }
            #[inline]
            fn poll_shutdown(
                mut self: ::std::pin::Pin<&mut Self>,
                cx: &mut ::std::task::Context<'_>,
            ) -> ::std::task::Poll<::std::io::Result<()>> {
                ::tokio::io::AsyncWrite::poll_shutdown(::std::pin::Pin::new(&mut self.0), cx)
            }
        }
    };
}
