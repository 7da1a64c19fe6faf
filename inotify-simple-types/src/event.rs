//! The `Event` type.

use crate::flags::{EventMask, Flag};
use std::{ffi::OsString, fmt};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One change reported by the kernel.
///
/// This is a direct image of a `struct inotify_event` record: the watch descriptor, the raw mask,
/// the rename cookie and the name. Nothing is interpreted; the mask can be decomposed on demand
/// with [`Event::flags`].
///
/// The fields are public for pattern matching and are not meant to be changed. Decoded events
/// are owned copies of the kernel's record, so nothing in this crate touches them afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Event {
    /// Watch descriptor of the watch that produced this event.
    ///
    /// This is the value returned when the watch was added, or `-1` for a queue overflow.
    pub wd: i32,

    /// Raw bitmask describing what happened.
    ///
    /// May combine several bits, e.g. `CREATE | ISDIR`, and may carry bits unknown to
    /// [`Flag`].
    pub mask: u32,

    /// Cookie associating the `MOVED_FROM` and `MOVED_TO` halves of a rename.
    ///
    /// Zero for every other event.
    pub cookie: u32,

    /// Name of the affected entry, relative to the watched directory.
    ///
    /// Empty for events about the watched object itself.
    pub name: OsString,
}

impl Event {
    /// Creates an event from its raw parts.
    pub fn new(wd: i32, mask: u32, cookie: u32, name: impl Into<OsString>) -> Self {
        Event {
            wd,
            mask,
            cookie,
            name: name.into(),
        }
    }

    /// Decomposes the mask into known flags, in declaration order.
    pub fn flags(&self) -> Vec<Flag> {
        Flag::from_mask(self.mask)
    }

    /// The mask as a typed [`EventMask`], unknown bits included.
    pub fn event_mask(&self) -> EventMask {
        EventMask::from_bits_retain(self.mask)
    }

    /// Whether the subject of this event is a directory.
    pub fn is_dir(&self) -> bool {
        self.event_mask().contains(EventMask::ISDIR)
    }

    /// Whether this is the synthetic queue overflow event.
    ///
    /// Events were dropped by the kernel before this one; callers usually need to rescan.
    pub fn is_overflow(&self) -> bool {
        self.event_mask().contains(EventMask::Q_OVERFLOW)
    }

    /// Whether the watch that produced this event has been removed.
    pub fn is_ignored(&self) -> bool {
        self.event_mask().contains(EventMask::IGNORED)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wd={} mask=", self.wd)?;

        let flags = self.flags();
        let unknown = self.event_mask().unknown_bits();
        if flags.is_empty() && unknown == 0 {
            f.write_str("0")?;
        }
        for (i, flag) in flags.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            f.write_str(flag.name())?;
        }
        if unknown != 0 {
            if !flags.is_empty() {
                f.write_str("|")?;
            }
            write!(f, "{unknown:#x}")?;
        }

        write!(f, " cookie={} name={:?}", self.cookie, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn event_flags() {
        let event = Event::new(1, 0x4000_0100, 0, "foo");
        assert_eq!(event.flags(), vec![Flag::Create, Flag::IsDir]);
        assert!(event.is_dir());
        assert!(!event.is_overflow());
        assert!(!event.is_ignored());
    }

    #[test]
    fn overflow_event() {
        let event = Event::new(-1, Flag::QOverflow.bits(), 0, "");
        assert!(event.is_overflow());
        assert!(event.name.is_empty());
    }

    #[test]
    fn name_compares_with_str() {
        let event = Event::new(1, 0x100, 0, "test.txt");
        assert_eq!(event.name, "test.txt");
    }

    #[test]
    fn display_known_flags() {
        let event = Event::new(1, 0x4000_0100, 0, "foo");
        assert_eq!(
            event.to_string(),
            r#"wd=1 mask=CREATE|ISDIR cookie=0 name="foo""#
        );
    }

    #[test]
    fn display_unknown_bits() {
        let event = Event::new(3, 0x0800_0200, 7, "");
        assert_eq!(
            event.to_string(),
            r#"wd=3 mask=DELETE|0x8000000 cookie=7 name="""#
        );
    }

    #[test]
    fn display_zero_mask() {
        let event = Event::new(2, 0, 0, "");
        assert_eq!(event.to_string(), r#"wd=2 mask=0 cookie=0 name="""#);
    }
}
