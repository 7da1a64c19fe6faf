//! Decoding of the byte stream read from an inotify descriptor.
//!
//! One `read(2)` on an inotify descriptor returns zero or more `struct inotify_event` records
//! packed back to back, in native byte order:
//!
//! ```text
//! offset 0  : i32 wd
//! offset 4  : u32 mask
//! offset 8  : u32 cookie
//! offset 12 : u32 len       length of the name field, padding included
//! offset 16 : [u8; len]     name, NUL padded
//! ```
//!
//! The kernel never splits a record across reads, so [`parse_events`] treats a buffer that does
//! not frame exactly as an error. [`Decoder`] is the restartable variant for sources that may
//! deliver partial records, such as pipes replaying a recorded stream.

use crate::{Error, Result};
use inotify_simple_types::event::Event;
use std::{
    ffi::OsString,
    mem,
    os::unix::ffi::{OsStrExt, OsStringExt},
};

/// Size of the fixed part of a record.
pub const EVENT_HEADER_SIZE: usize = 16;

/// Largest name field [`Decoder`] is willing to wait for.
///
/// The kernel pads names of at most `NAME_MAX` bytes, so anything beyond `PATH_MAX` is corrupt.
pub const MAX_NAME_LEN: usize = 4096;

struct Header {
    wd: i32,
    mask: u32,
    cookie: u32,
    len: u32,
}

impl Header {
    fn parse(bytes: &[u8; EVENT_HEADER_SIZE]) -> Self {
        let field = |at: usize| [bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]];
        Header {
            wd: i32::from_ne_bytes(field(0)),
            mask: u32::from_ne_bytes(field(4)),
            cookie: u32::from_ne_bytes(field(8)),
            len: u32::from_ne_bytes(field(12)),
        }
    }

    fn record_size(&self) -> usize {
        EVENT_HEADER_SIZE.saturating_add(self.len as usize)
    }
}

enum Record {
    Complete { event: Event, size: usize },
    Truncated { needed: usize },
}

fn next_record(rest: &[u8]) -> Record {
    let Some(header) = rest.first_chunk::<EVENT_HEADER_SIZE>() else {
        return Record::Truncated {
            needed: EVENT_HEADER_SIZE,
        };
    };
    let header = Header::parse(header);
    let size = header.record_size();

    let Some(field) = rest.get(EVENT_HEADER_SIZE..size) else {
        return Record::Truncated { needed: size };
    };
    let name = match field.iter().position(|&b| b == 0) {
        Some(end) => &field[..end],
        None => field,
    };

    Record::Complete {
        event: Event {
            wd: header.wd,
            mask: header.mask,
            cookie: header.cookie,
            name: OsString::from_vec(name.to_vec()),
        },
        size,
    }
}

/// Decodes the bytes returned by one read of an inotify descriptor.
///
/// Events are returned in the order they appear in `buffer`, which is the order the kernel
/// queued them. Names are copied, so `buffer` can be reused as soon as this returns.
///
/// An empty buffer yields no events.
///
/// # Errors
///
/// Returns [`ErrorKind::MalformedStream`](crate::ErrorKind::MalformedStream) if fewer than
/// [`EVENT_HEADER_SIZE`] bytes remain for a header, or if a name length runs past the end of the
/// buffer. No events are returned in that case, not even the ones decoded before the bad record.
///
/// # Examples
///
/// ```
/// use inotify_simple::parse_events;
///
/// let mut buffer = Vec::new();
/// buffer.extend_from_slice(&1i32.to_ne_bytes());
/// buffer.extend_from_slice(&0x100u32.to_ne_bytes());
/// buffer.extend_from_slice(&0u32.to_ne_bytes());
/// buffer.extend_from_slice(&4u32.to_ne_bytes());
/// buffer.extend_from_slice(b"foo\0");
///
/// let events = parse_events(&buffer).unwrap();
/// assert_eq!(events.len(), 1);
/// assert_eq!(events[0].wd, 1);
/// assert_eq!(events[0].mask, 256);
/// assert_eq!(events[0].name, "foo");
/// ```
pub fn parse_events(buffer: &[u8]) -> Result<Vec<Event>> {
    let mut events = Vec::new();
    let mut offset = 0;

    while offset < buffer.len() {
        let rest = &buffer[offset..];
        match next_record(rest) {
            Record::Complete { event, size } => {
                events.push(event);
                offset += size;
            }
            Record::Truncated { needed } => {
                log::debug!(
                    "malformed inotify buffer: {} bytes at offset {offset}, record needs {needed}",
                    rest.len()
                );
                return Err(Error::malformed_stream(offset, rest.len(), needed));
            }
        }
    }

    Ok(events)
}

/// Restartable event decoder.
///
/// Accepts input in arbitrary chunks. Complete records are decoded as soon as they are
/// available; a trailing partial record is kept and prefixed to the next chunk.
///
/// A decoder handles one stream. Feeding it chunks of two different streams interleaves their
/// bytes and corrupts both.
///
/// ```
/// use inotify_simple::{encode_event, Decoder, Event};
///
/// let mut bytes = Vec::new();
/// encode_event(&Event::new(1, 0x100, 0, "foo"), &mut bytes);
///
/// let mut decoder = Decoder::new();
/// assert!(decoder.decode(&bytes[..10]).unwrap().is_empty());
/// assert_eq!(decoder.pending(), 10);
///
/// let events = decoder.decode(&bytes[10..]).unwrap();
/// assert_eq!(events, vec![Event::new(1, 0x100, 0, "foo")]);
/// decoder.finish().unwrap();
/// ```
#[derive(Clone, Debug, Default)]
pub struct Decoder {
    pending: Vec<u8>,
}

impl Decoder {
    /// Creates a decoder with no retained bytes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes every complete record available after appending `chunk`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::MalformedStream`](crate::ErrorKind::MalformedStream) if a record
    /// claims a name longer than [`MAX_NAME_LEN`], whether or not its name bytes are all present.
    /// The retained bytes are dropped in that case.
    pub fn decode(&mut self, chunk: &[u8]) -> Result<Vec<Event>> {
        let mut retained = mem::take(&mut self.pending);
        let data: &[u8] = if retained.is_empty() {
            chunk
        } else {
            retained.extend_from_slice(chunk);
            &retained
        };

        let mut events = Vec::new();
        let mut offset = 0;
        while offset < data.len() {
            let rest = &data[offset..];
            match next_record(rest) {
                // oversized records fail whether or not they are complete
                Record::Complete { size, .. } | Record::Truncated { needed: size }
                    if size > EVENT_HEADER_SIZE + MAX_NAME_LEN =>
                {
                    log::debug!("inotify record at offset {offset} claims {size} bytes");
                    return Err(Error::malformed_stream(offset, rest.len(), size));
                }
                Record::Complete { event, size } => {
                    events.push(event);
                    offset += size;
                }
                Record::Truncated { .. } => break,
            }
        }

        self.pending = data[offset..].to_vec();
        Ok(events)
    }

    /// Number of bytes retained from an incomplete record.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Drops any retained bytes.
    pub fn reset(&mut self) {
        self.pending.clear();
    }

    /// Ends the stream.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::MalformedStream`](crate::ErrorKind::MalformedStream) if an incomplete
    /// record is still retained.
    pub fn finish(self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let needed = match next_record(&self.pending) {
            Record::Truncated { needed } => needed,
            Record::Complete { size, .. } => size,
        };
        Err(Error::malformed_stream(0, self.pending.len(), needed))
    }
}

/// Appends the wire record of `event` to `out`, laid out the way the kernel does.
///
/// The name is followed by at least one NUL and padded to a multiple of [`EVENT_HEADER_SIZE`];
/// an empty name produces no name field at all. A name containing a NUL byte decodes to its part
/// before that byte.
pub fn encode_event(event: &Event, out: &mut Vec<u8>) {
    let name = event.name.as_bytes();
    let len = if name.is_empty() {
        0
    } else {
        (name.len() + 1).next_multiple_of(EVENT_HEADER_SIZE)
    };

    out.reserve(EVENT_HEADER_SIZE + len);
    out.extend_from_slice(&event.wd.to_ne_bytes());
    out.extend_from_slice(&event.mask.to_ne_bytes());
    out.extend_from_slice(&event.cookie.to_ne_bytes());
    out.extend_from_slice(&(len as u32).to_ne_bytes());
    out.extend_from_slice(name);
    out.resize(out.len() + (len - name.len()), 0);
}

/// Encodes a sequence of events into one buffer, as a single read would return them.
pub fn encode_events<'a>(events: impl IntoIterator<Item = &'a Event>) -> Vec<u8> {
    let mut out = Vec::new();
    for event in events {
        encode_event(event, &mut out);
    }
    out
}
