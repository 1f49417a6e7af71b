//! Byte-codec primitives shared by the DNS and NTP wire formats (§4.A).
//!
//! Big-endian primitive reads are provided directly by [`byteorder`]; this
//! module supplies the two things byteorder doesn't: a zero-copy sub-stream
//! view of `[start, len)` of a parent cursor, and a fixed-capacity FIFO byte
//! queue used by the TCP client/server/stream layers.

use std::collections::VecDeque;
use std::io;
use std::io::Cursor;
use std::io::SeekFrom;

use crate::util::clamp;

pub trait SeekExt: io::Seek {
    /// Returns the number of bytes remaining to be consumed.
    /// This is used as a way to check for malformed input.
    fn remaining(&mut self) -> io::Result<u64> {
        let pos = self.stream_position()?;
        let len = self.seek(SeekFrom::End(0))?;

        // reset position
        self.seek(SeekFrom::Start(pos))?;

        Ok(len - pos)
    }
}

impl<'a> SeekExt for Cursor<&'a [u8]> {}

pub trait CursorExt<T> {
    /// Return a cursor that is bounded over the original cursor by start-end.
    ///
    /// The returned cursor contains all values with start <= x < end. It is empty if start >= end.
    ///
    /// Similar to `Take` but allows the start-end range to be specified, instead of just the next
    /// N values.
    fn sub_cursor(&mut self, start: usize, end: usize) -> io::Result<std::io::Cursor<T>>;
}

impl<'a> CursorExt<&'a [u8]> for Cursor<&'a [u8]> {
    fn sub_cursor(&mut self, start: usize, end: usize) -> io::Result<std::io::Cursor<&'a [u8]>> {
        let buf = self.get_ref();

        let start = clamp(start, 0, buf.len());
        let end = clamp(end, start, buf.len());

        let record = Cursor::new(&buf[start..end]);
        Ok(record)
    }
}

/// A single-reader/single-writer byte FIFO, guarded externally by a mutex
/// wherever it is shared between an I/O completion task and user code (see
/// the TCP client's receive buffer, §4.G, and the buffered stream's send
/// buffer, §4.I).
///
/// `enqueue`/`dequeue`/`peek` are amortised O(1); `contains_byte` is O(n) by
/// design — it exists so the buffered stream can implement "read until
/// delimiter" without callers hand-rolling a scan.
#[derive(Debug, Default)]
pub struct Fifo {
    buf: VecDeque<u8>,
}

impl Fifo {
    pub fn new() -> Self {
        Fifo {
            buf: VecDeque::new(),
        }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Fifo {
            buf: VecDeque::with_capacity(cap),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Appends `data` to the tail of the FIFO.
    pub fn enqueue(&mut self, data: &[u8]) {
        self.buf.extend(data.iter().copied());
    }

    /// Removes and returns up to `max` bytes from the head of the FIFO.
    pub fn dequeue(&mut self, max: usize) -> Vec<u8> {
        let n = max.min(self.buf.len());
        self.buf.drain(..n).collect()
    }

    /// Removes and returns every byte currently queued.
    pub fn drain_all(&mut self) -> Vec<u8> {
        self.buf.drain(..).collect()
    }

    /// Returns up to `max` bytes from the head without removing them.
    pub fn peek(&self, max: usize) -> Vec<u8> {
        self.buf.iter().take(max).copied().collect()
    }

    /// `true` iff `byte` appears anywhere in the queue. O(n) by design.
    pub fn contains_byte(&self, byte: u8) -> bool {
        self.buf.contains(&byte)
    }

    /// Returns the offset of the first occurrence of `byte`, if any.
    pub fn position_of(&self, byte: u8) -> Option<usize> {
        self.buf.iter().position(|&b| b == byte)
    }

    /// Copies the entire queue contents into a new `Vec<u8>` without
    /// consuming them.
    pub fn snapshot(&self) -> Vec<u8> {
        self.buf.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_enqueue_dequeue_is_fifo_order() {
        let mut f = Fifo::new();
        f.enqueue(b"hello");
        f.enqueue(b" world");
        assert_eq!(f.len(), 11);

        let head = f.dequeue(5);
        assert_eq!(head, b"hello");
        assert_eq!(f.len(), 6);

        let rest = f.dequeue(100);
        assert_eq!(rest, b" world");
        assert!(f.is_empty());
    }

    #[test]
    fn fifo_contains_byte_and_position() {
        let mut f = Fifo::new();
        f.enqueue(b"abc\r\ndef");
        assert!(f.contains_byte(b'\n'));
        assert_eq!(f.position_of(b'\r'), Some(3));
        assert!(!f.contains_byte(b'x'));
    }

    #[test]
    fn fifo_peek_does_not_consume() {
        let mut f = Fifo::new();
        f.enqueue(b"12345");
        assert_eq!(f.peek(3), b"123");
        assert_eq!(f.len(), 5);
    }

    #[test]
    fn sub_cursor_clamps_to_buffer_bounds() {
        let buf = [1u8, 2, 3, 4, 5];
        let mut cur = Cursor::new(&buf[..]);
        let sub = cur.sub_cursor(2, 100).unwrap();
        assert_eq!(sub.get_ref(), &[3, 4, 5]);
    }
}
