//! Socket control messages.
//!
//! Control messages (also called ancillary data) travel alongside the main
//! data of a `sendmsg`/`recvmsg` call and carry things the byte stream cannot:
//! open file descriptors, or the credentials of the sending process.
//!
//! [`CmsgBuffer`] is the only way to build a control buffer. It keeps the
//! storage aligned for `cmsghdr`, so any [`CmsgRef`] handed to the kernel is
//! well-formed. Messages are added through the typed wrappers in
//! [`ancillary`], which cannot express an invalid payload; [`CmsgBuffer::add_raw`]
//! is the unsafe escape hatch for message types not covered there.
//!
//! Received buffers are turned back into typed values with
//! [`CmsgBuffer::decode`]. Decoding transfers ownership of any received file
//! descriptors to the caller and empties the buffer, so a descriptor can never
//! be claimed twice.

pub mod ancillary;

use std::fmt::{self, Debug, Formatter};
use std::mem::{align_of, size_of};
use std::ptr;
use std::slice;

use libc::{c_int, c_uint, cmsghdr};

use ancillary::Ancillary;

const WORD: usize = size_of::<usize>();

/// A control message: level, type and payload.
///
/// Deliberately neither `Copy` nor `Clone`. Some control messages transfer
/// ownership of resources (see [`ancillary::FileDescriptors`]), so only move
/// semantics are provided.
#[derive(Debug, PartialEq, Eq)]
pub struct Cmsg<'a> {
    cmsg_level: c_int,
    cmsg_type: c_int,
    data: &'a [u8],
}

impl<'a> Cmsg<'a> {
    /// Constructs a control message with the given level, type and payload.
    ///
    /// # Safety
    /// The payload is not checked against `cmsg_level` and `cmsg_type`. Some
    /// message types carry resources the kernel will act on; `SCM_RIGHTS`,
    /// for example, duplicates every descriptor number in the payload into
    /// the receiving process, which must match what the receiver is told it
    /// owns.
    ///
    /// # Panics
    /// If the payload length does not fit in `c_uint`.
    #[must_use]
    pub unsafe fn new(cmsg_level: c_int, cmsg_type: c_int, data: &'a [u8]) -> Self {
        assert!(
            c_uint::try_from(data.len()).is_ok(),
            "length of payload does not fit in c_uint"
        );
        Self {
            cmsg_level,
            cmsg_type,
            data,
        }
    }

    /// The `cmsg_len` of a message with a payload of the given size.
    #[must_use]
    pub fn cmsg_len_for_payload_size(payload_size: usize) -> usize {
        unsafe { libc::CMSG_LEN(payload_size as c_uint) as usize }
    }

    /// The buffer space a message with a payload of the given size occupies,
    /// including its header and trailing padding.
    #[must_use]
    pub fn space_for_payload(payload_size: usize) -> usize {
        unsafe { libc::CMSG_SPACE(payload_size as c_uint) as usize }
    }

    #[inline]
    #[must_use]
    pub fn cmsg_len(&self) -> usize {
        Self::cmsg_len_for_payload_size(self.data.len())
    }

    #[inline]
    #[must_use]
    pub fn space_occupied(&self) -> usize {
        Self::space_for_payload(self.data.len())
    }

    #[inline]
    #[must_use]
    pub fn cmsg_level(&self) -> c_int {
        self.cmsg_level
    }

    #[inline]
    #[must_use]
    pub fn cmsg_type(&self) -> c_int {
        self.cmsg_type
    }

    #[inline]
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}

/// The offset of the payload from the start of its header.
fn header_space() -> usize {
    Cmsg::cmsg_len_for_payload_size(0)
}

/// An owned buffer of control messages, aligned for `cmsghdr`.
///
/// Used both to assemble outgoing ancillary data and as the receive target of
/// `recv_ancillary`. A receive replaces the previous contents.
///
/// Received file descriptors that are never [decoded](Self::decode) are
/// leaked rather than closed. Only data written by the kernel is treated as
/// owning descriptors; adding a message to a received buffer forfeits them.
pub struct CmsgBuffer {
    words: Vec<usize>,
    len: usize,
    truncated: bool,
    received: bool,
}

impl CmsgBuffer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            words: Vec::new(),
            len: 0,
            truncated: false,
            received: false,
        }
    }

    /// Creates a buffer able to hold `bytes` bytes of control data without
    /// reallocating.
    #[must_use]
    pub fn with_capacity(bytes: usize) -> Self {
        let mut buf = Self::new();
        buf.reserve(bytes);
        buf
    }

    /// Total space in bytes, which is also the most a single receive can fill.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.words.len() * WORD
    }

    /// Bytes of control data currently held.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the last receive had to discard control data for lack of space.
    ///
    /// Descriptors in discarded messages are closed by the kernel.
    #[inline]
    #[must_use]
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn clear(&mut self) {
        self.len = 0;
        self.truncated = false;
        self.received = false;
    }

    /// Ensures room for at least `additional` more bytes.
    pub fn reserve(&mut self, additional: usize) {
        let needed = self.len.saturating_add(additional);
        if needed > self.capacity() {
            self.words.resize((needed + WORD - 1) / WORD, 0);
        }
    }

    /// Appends a typed control message.
    pub fn add_message(&mut self, msg: &impl ancillary::EncodeAncillary) {
        let payload = msg.payload();
        // SAFETY: the sealed EncodeAncillary implementations produce payloads
        // matching their level and type
        unsafe {
            self.add_raw(&Cmsg::new(msg.cmsg_level(), msg.cmsg_type(), &payload));
        }
    }

    /// Appends a raw control message.
    ///
    /// # Safety
    /// The message must be valid for its level and type; see [`Cmsg::new`].
    pub unsafe fn add_raw(&mut self, msg: &Cmsg<'_>) {
        debug_assert!(align_of::<cmsghdr>() <= align_of::<usize>());
        let space = msg.space_occupied();
        self.reserve(space);
        self.received = false;
        let base = self.words.as_mut_ptr().cast::<u8>().add(self.len);
        ptr::write_bytes(base, 0, space);
        let hdr = base.cast::<cmsghdr>();
        (*hdr).cmsg_len = msg.cmsg_len() as _;
        (*hdr).cmsg_level = msg.cmsg_level;
        (*hdr).cmsg_type = msg.cmsg_type;
        ptr::copy_nonoverlapping(msg.data.as_ptr(), libc::CMSG_DATA(hdr), msg.data.len());
        self.len += space;
    }

    /// A read-only view for sending.
    #[inline]
    #[must_use]
    pub fn as_cmsg_ref(&self) -> CmsgRef<'_> {
        CmsgRef {
            buf: self.bytes(),
        }
    }

    /// Iterates over the raw messages in the buffer.
    #[must_use]
    pub fn messages(&self) -> Cmsgs<'_> {
        Cmsgs {
            buf: self.bytes(),
            offset: 0,
        }
    }

    /// Parses every message and empties the buffer.
    ///
    /// For data written by a receive, ownership of carried resources (such as
    /// file descriptors) passes to the returned values. A buffer assembled
    /// locally does not own the descriptors it names, so its messages are
    /// returned as [`Ancillary::Unknown`].
    pub fn decode(&mut self) -> Vec<Ancillary> {
        let received = self.received;
        let decoded = self
            .messages()
            .map(|cmsg| {
                if received {
                    // SAFETY: the kernel wrote this buffer, so each message matches
                    // its level and type and the descriptors in it are new to this
                    // process; clearing below guarantees nothing is decoded twice
                    unsafe { Ancillary::decode(cmsg) }
                } else {
                    Ancillary::unknown(&cmsg)
                }
            })
            .collect();
        self.clear();
        decoded
    }

    fn bytes(&self) -> &[u8] {
        // SAFETY: the words are initialized and len never exceeds capacity
        unsafe { slice::from_raw_parts(self.words.as_ptr().cast::<u8>(), self.len) }
    }

    /// The whole allocation as a receive target.
    pub(crate) fn recv_target(&mut self) -> (*mut u8, usize) {
        self.clear();
        (self.words.as_mut_ptr().cast::<u8>(), self.capacity())
    }

    /// Records the outcome of a receive into [`recv_target`](Self::recv_target).
    ///
    /// # Safety
    /// The kernel must have written `len` bytes of control messages.
    pub(crate) unsafe fn set_received(&mut self, len: usize, truncated: bool) {
        self.len = len.min(self.capacity());
        self.truncated = truncated;
        self.received = true;
    }
}

impl Default for CmsgBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for CmsgBuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CmsgBuffer")
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .field("truncated", &self.truncated)
            .field("received", &self.received)
            .finish()
    }
}

/// A borrowed, well-formed control message buffer ready to be sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CmsgRef<'a> {
    buf: &'a [u8],
}

impl<'a> CmsgRef<'a> {
    /// No ancillary data.
    #[must_use]
    pub const fn empty() -> Self {
        Self { buf: &[] }
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.buf
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[must_use]
    pub fn messages(&self) -> Cmsgs<'a> {
        Cmsgs {
            buf: self.buf,
            offset: 0,
        }
    }
}

impl Default for CmsgRef<'_> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Iterator over the control messages in a buffer.
///
/// Stops at the first malformed header.
#[derive(Debug, Clone)]
pub struct Cmsgs<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for Cmsgs<'a> {
    type Item = Cmsg<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let hdr_space = header_space();
        let rest = self.buf.get(self.offset..)?;
        if rest.len() < hdr_space.max(size_of::<cmsghdr>()) {
            return None;
        }
        // SAFETY: at least a full header's worth of bytes is left
        let hdr = unsafe { ptr::read_unaligned(rest.as_ptr().cast::<cmsghdr>()) };
        let cmsg_len = hdr.cmsg_len as usize;
        if cmsg_len < hdr_space || cmsg_len > rest.len() {
            return None;
        }
        let data = &rest[hdr_space..cmsg_len];
        self.offset += Cmsg::space_for_payload(data.len()).min(rest.len());
        Some(Cmsg {
            cmsg_level: hdr.cmsg_level,
            cmsg_type: hdr.cmsg_type,
            data,
        })
    }
}

impl std::iter::FusedIterator for Cmsgs<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    const LEVEL: c_int = 0x7e57;

    fn raw(buf: &mut CmsgBuffer, ty: c_int, data: &[u8]) {
        // SAFETY: test-only level, nothing interprets it
        unsafe { buf.add_raw(&Cmsg::new(LEVEL, ty, data)) };
    }

    #[test]
    fn empty_buffer_has_no_messages() {
        let buf = CmsgBuffer::new();
        assert!(buf.is_empty());
        assert_eq!(buf.messages().count(), 0);
        assert!(buf.as_cmsg_ref().is_empty());
    }

    #[test]
    fn messages_come_back_in_order() {
        let mut buf = CmsgBuffer::new();
        raw(&mut buf, 1, b"abc");
        raw(&mut buf, 2, b"");
        raw(&mut buf, 3, &[9; 17]);

        let msgs: Vec<_> = buf.messages().collect();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].cmsg_type(), 1);
        assert_eq!(msgs[0].data(), b"abc");
        assert_eq!(msgs[1].data(), b"");
        assert_eq!(msgs[2].cmsg_level(), LEVEL);
        assert_eq!(msgs[2].data(), &[9; 17]);
    }

    #[test]
    fn length_is_sum_of_spaces() {
        let mut buf = CmsgBuffer::new();
        raw(&mut buf, 1, b"abc");
        raw(&mut buf, 1, b"defgh");
        assert_eq!(
            buf.len(),
            Cmsg::space_for_payload(3) + Cmsg::space_for_payload(5)
        );
        assert!(buf.capacity() >= buf.len());
    }

    #[test]
    fn with_capacity_preallocates() {
        let buf = CmsgBuffer::with_capacity(100);
        assert!(buf.capacity() >= 100);
        assert!(buf.is_empty());
    }

    #[test]
    fn clear_resets_contents() {
        let mut buf = CmsgBuffer::new();
        raw(&mut buf, 1, b"x");
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.messages().count(), 0);
    }

    #[test]
    fn malformed_header_stops_iteration() {
        let mut buf = CmsgBuffer::new();
        raw(&mut buf, 1, b"abcd");
        // Claim a length past the end of the buffer
        unsafe {
            let hdr = buf.words.as_mut_ptr().cast::<cmsghdr>();
            (*hdr).cmsg_len = (buf.len() + 64) as _;
        }
        assert_eq!(buf.messages().count(), 0);
    }

    #[test]
    fn unknown_messages_decode_verbatim() {
        let mut buf = CmsgBuffer::new();
        raw(&mut buf, 42, b"payload");
        let decoded = buf.decode();
        assert!(buf.is_empty());
        match decoded.as_slice() {
            [Ancillary::Unknown { level, kind, data }] => {
                assert_eq!(*level, LEVEL);
                assert_eq!(*kind, 42);
                assert_eq!(data, b"payload");
            }
            other => panic!("unexpected decode result: {other:?}"),
        }
    }
}
