//! Receiving whole datagrams without knowing their size in advance.
//!
//! A plain `recv` into a buffer that is too small drops the rest of the
//! datagram. [`ReliableRecvMsg`] peeks at the size first and only consumes
//! the message once it fits.
//!
//! # Example
//! ```
//! use interlink::os::unix::udsocket::UdDatagram;
//! use interlink::reliable_recv_msg::ReliableRecvMsg;
//!
//! let (a, mut b) = UdDatagram::pair()?;
//! a.send(&[1; 1000])?;
//!
//! let mut small = [0; 16];
//! let result = b.try_recv(&mut small)?;
//! assert!(!result.fit);
//! assert_eq!(result.size, 1000);
//!
//! let mut buf = Vec::new();
//! assert_eq!(ReliableRecvMsg::recv(&mut b, &mut buf)?, 1000);
//! assert_eq!(buf.len(), 1000);
//! # Ok::<(), std::io::Error>(())
//! ```

use std::io;

use crate::os::unix::udsocket::UdDatagram;
use crate::Sealed;

/// Outcome of [`ReliableRecvMsg::try_recv`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TryRecvResult {
    /// Size of the message. When `fit` is false this is how large the buffer
    /// has to be.
    pub size: usize,
    /// Whether the message was received. If not, it is still queued.
    pub fit: bool,
}

/// Message-oriented sockets whose messages can be received without
/// truncation.
pub trait ReliableRecvMsg: Sealed {
    /// Receives the next message if it fits into `buf`, otherwise leaves it
    /// queued and reports its size.
    ///
    /// The peek and the receive are separate calls. With several readers on
    /// one socket, a different message can be taken than the one peeked; if
    /// that one does not fit, it is lost and the result has `fit` false with
    /// the lost message's size.
    fn try_recv(&mut self, buf: &mut [u8]) -> io::Result<TryRecvResult>;

    /// Receives the next message into `buf`, resizing it as needed. The
    /// vector's current length is the first attempt's buffer size; on
    /// success its length equals the message size.
    fn recv(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        loop {
            let result = self.try_recv(buf.as_mut_slice())?;
            if result.fit {
                buf.truncate(result.size);
                return Ok(result.size);
            }
            // Another reader may have taken the message; the loop re-peeks
            buf.resize(result.size, 0);
        }
    }
}

impl Sealed for UdDatagram {}

impl ReliableRecvMsg for UdDatagram {
    fn try_recv(&mut self, buf: &mut [u8]) -> io::Result<TryRecvResult> {
        let size = self.peek_msg_size()?;
        if size > buf.len() {
            return Ok(TryRecvResult { size, fit: false });
        }
        let size = self.recv_reporting_truncation(buf)?;
        Ok(TryRecvResult {
            size,
            fit: size <= buf.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_fit_counts_as_fit() {
        let (a, mut b) = UdDatagram::pair().unwrap();
        a.send(&[9; 8]).unwrap();
        let mut buf = [0; 8];
        let result = b.try_recv(&mut buf).unwrap();
        assert_eq!(result, TryRecvResult { size: 8, fit: true });
    }

    #[test]
    fn too_small_leaves_message_queued() {
        let (a, mut b) = UdDatagram::pair().unwrap();
        a.send(b"longer than four").unwrap();
        let mut buf = [0; 4];
        let result = b.try_recv(&mut buf).unwrap();
        assert!(!result.fit);
        assert_eq!(result.size, 16);

        let mut buf = vec![0; 64];
        assert_eq!(ReliableRecvMsg::recv(&mut b, &mut buf).unwrap(), 16);
        assert_eq!(buf, b"longer than four");
    }

    #[test]
    fn recv_grows_and_shrinks_vector() {
        let (a, mut b) = UdDatagram::pair().unwrap();
        a.send(&[1; 500]).unwrap();
        a.send(&[2; 3]).unwrap();

        let mut buf = vec![0; 10];
        assert_eq!(ReliableRecvMsg::recv(&mut b, &mut buf).unwrap(), 500);
        assert!(buf.iter().all(|&x| x == 1));
        assert_eq!(ReliableRecvMsg::recv(&mut b, &mut buf).unwrap(), 3);
        assert_eq!(buf, [2, 2, 2]);
    }

    #[test]
    fn truncated_receive_reports_full_length() {
        let (a, b) = UdDatagram::pair().unwrap();
        a.send(&[7; 100]).unwrap();
        let mut buf = [0; 10];
        assert_eq!(b.recv_reporting_truncation(&mut buf).unwrap(), 100);
        assert_eq!(buf, [7; 10]);
    }

    #[test]
    fn empty_datagram_fits_empty_buffer() {
        let (a, mut b) = UdDatagram::pair().unwrap();
        a.send(&[]).unwrap();
        let mut buf = Vec::new();
        assert_eq!(ReliableRecvMsg::recv(&mut b, &mut buf).unwrap(), 0);
    }
}
