//! Symbolic names for inotify mask bits.
//!
//! [`Flag`] is the closed set of single bits the kernel understands, either in a mask passed to
//! `inotify_add_watch(2)` or in the mask of a reported event. Every flag has a fixed [`Usage`]
//! class. [`EventMask`] is the typed mask built from them.
//!
//! Bit values are kernel ABI and taken from `<sys/inotify.h>`.

use bitflags::bitflags;
use std::{fmt, ops::BitOr, str::FromStr};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Where a flag may legitimately appear.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Usage {
    /// Only meaningful when requesting a watch.
    Watch,

    /// Only ever set by the kernel in a reported event mask.
    Event,

    /// Valid when requesting a watch and in a reported event mask.
    Both,
}

impl Usage {
    /// Whether a flag of this class may be passed when adding a watch.
    pub fn is_requestable(self) -> bool {
        matches!(self, Usage::Watch | Usage::Both)
    }

    /// Whether a flag of this class may show up in an event mask.
    pub fn is_reportable(self) -> bool {
        matches!(self, Usage::Event | Usage::Both)
    }
}

/// A single named inotify bit.
///
/// Variants are declared in ascending bit order, which is also the canonical order used by
/// [`Flag::from_mask`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
#[repr(u32)]
pub enum Flag {
    /// File was accessed.
    ///
    /// When monitoring a directory, the event may occur both for the directory itself and the
    /// files within.
    Access = 0x0000_0001,

    /// File was modified.
    ///
    /// When monitoring a directory, the event may occur *only* for the files within, not the
    /// directory itself.
    Modify = 0x0000_0002,

    /// Metadata changed: permissions, timestamps, extended attributes, link count, owner.
    Attrib = 0x0000_0004,

    /// File opened for writing was closed.
    CloseWrite = 0x0000_0008,

    /// File not opened for writing was closed.
    CloseNowrite = 0x0000_0010,

    /// File was opened.
    Open = 0x0000_0020,

    /// File or directory was moved out of the watched directory.
    MovedFrom = 0x0000_0040,

    /// File or directory was moved into the watched directory.
    MovedTo = 0x0000_0080,

    /// File or directory was created in the watched directory.
    ///
    /// This may also include hard links, symlinks, and UNIX sockets.
    Create = 0x0000_0100,

    /// File or directory was deleted from the watched directory.
    Delete = 0x0000_0200,

    /// Watched file or directory was deleted.
    ///
    /// An [`Flag::Ignored`] event is generated right after.
    DeleteSelf = 0x0000_0400,

    /// Watched file or directory was moved.
    MoveSelf = 0x0000_0800,

    /// Filesystem containing the watched object was unmounted.
    ///
    /// An [`Flag::Ignored`] event is generated right after.
    Unmount = 0x0000_2000,

    /// Event queue overflowed. The event carries `wd == -1`.
    #[cfg_attr(feature = "serde", serde(rename = "Q_OVERFLOW"))]
    QOverflow = 0x0000_4000,

    /// Watch was removed, explicitly or because the object is gone.
    Ignored = 0x0000_8000,

    /// Only watch the path if it is a directory.
    #[cfg_attr(feature = "serde", serde(rename = "ONLYDIR"))]
    OnlyDir = 0x0100_0000,

    /// Don't dereference the path if it is a symlink.
    DontFollow = 0x0200_0000,

    /// Don't generate events for children after they have been unlinked.
    ExclUnlink = 0x0400_0000,

    /// Fail with `EEXIST` if the path is already watched.
    MaskCreate = 0x1000_0000,

    /// Add to the mask of an existing watch instead of replacing it.
    MaskAdd = 0x2000_0000,

    /// Subject of the event is a directory.
    #[cfg_attr(feature = "serde", serde(rename = "ISDIR"))]
    IsDir = 0x4000_0000,

    /// Report one event, then remove the watch.
    Oneshot = 0x8000_0000,
}

impl Flag {
    /// Every known flag, in declaration order.
    pub const ALL: [Flag; 22] = [
        Flag::Access,
        Flag::Modify,
        Flag::Attrib,
        Flag::CloseWrite,
        Flag::CloseNowrite,
        Flag::Open,
        Flag::MovedFrom,
        Flag::MovedTo,
        Flag::Create,
        Flag::Delete,
        Flag::DeleteSelf,
        Flag::MoveSelf,
        Flag::Unmount,
        Flag::QOverflow,
        Flag::Ignored,
        Flag::OnlyDir,
        Flag::DontFollow,
        Flag::ExclUnlink,
        Flag::MaskCreate,
        Flag::MaskAdd,
        Flag::IsDir,
        Flag::Oneshot,
    ];

    /// The bit value of this flag.
    pub const fn bits(self) -> u32 {
        self as u32
    }

    /// The kernel name of this flag without the `IN_` prefix.
    pub const fn name(self) -> &'static str {
        match self {
            Flag::Access => "ACCESS",
            Flag::Modify => "MODIFY",
            Flag::Attrib => "ATTRIB",
            Flag::CloseWrite => "CLOSE_WRITE",
            Flag::CloseNowrite => "CLOSE_NOWRITE",
            Flag::Open => "OPEN",
            Flag::MovedFrom => "MOVED_FROM",
            Flag::MovedTo => "MOVED_TO",
            Flag::Create => "CREATE",
            Flag::Delete => "DELETE",
            Flag::DeleteSelf => "DELETE_SELF",
            Flag::MoveSelf => "MOVE_SELF",
            Flag::Unmount => "UNMOUNT",
            Flag::QOverflow => "Q_OVERFLOW",
            Flag::Ignored => "IGNORED",
            Flag::OnlyDir => "ONLYDIR",
            Flag::DontFollow => "DONT_FOLLOW",
            Flag::ExclUnlink => "EXCL_UNLINK",
            Flag::MaskCreate => "MASK_CREATE",
            Flag::MaskAdd => "MASK_ADD",
            Flag::IsDir => "ISDIR",
            Flag::Oneshot => "ONESHOT",
        }
    }

    /// Where this flag may appear.
    pub const fn usage(self) -> Usage {
        match self {
            Flag::Access
            | Flag::Modify
            | Flag::Attrib
            | Flag::CloseWrite
            | Flag::CloseNowrite
            | Flag::Open
            | Flag::MovedFrom
            | Flag::MovedTo
            | Flag::Create
            | Flag::Delete
            | Flag::DeleteSelf
            | Flag::MoveSelf => Usage::Both,
            Flag::Unmount | Flag::QOverflow | Flag::Ignored | Flag::IsDir => Usage::Event,
            Flag::OnlyDir
            | Flag::DontFollow
            | Flag::ExclUnlink
            | Flag::MaskCreate
            | Flag::MaskAdd
            | Flag::Oneshot => Usage::Watch,
        }
    }

    /// Returns every flag set in `mask`, in declaration order.
    ///
    /// Bits that don't correspond to a known flag are skipped, so masks produced by newer kernels
    /// still decompose.
    pub fn from_mask(mask: u32) -> Vec<Flag> {
        Flag::ALL
            .iter()
            .copied()
            .filter(|flag| mask & flag.bits() != 0)
            .collect()
    }
}

/// Returns every flag set in `mask`, in declaration order.
///
/// Same as [`Flag::from_mask`].
pub fn decompose(mask: u32) -> Vec<Flag> {
    Flag::from_mask(mask)
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown flag name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseFlagError(String);

impl fmt::Display for ParseFlagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown inotify flag: {:?}", self.0)
    }
}

impl std::error::Error for ParseFlagError {}

impl FromStr for Flag {
    type Err = ParseFlagError;

    /// Parses a kernel flag name, with or without the `IN_` prefix, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let name = upper.strip_prefix("IN_").unwrap_or(&upper);
        Flag::ALL
            .iter()
            .copied()
            .find(|flag| flag.name() == name)
            .ok_or_else(|| ParseFlagError(s.to_owned()))
    }
}

const fn union_of_both() -> u32 {
    let mut bits = 0;
    let mut i = 0;
    while i < Flag::ALL.len() {
        let flag = Flag::ALL[i];
        if matches!(flag.usage(), Usage::Both) {
            bits |= flag.bits();
        }
        i += 1;
    }
    bits
}

bitflags! {
    /// A typed inotify mask.
    ///
    /// Used both for the mask passed when adding a watch and as a view over a reported mask.
    /// Bits that are not named here are retained, never truncated.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct EventMask: u32 {
        const ACCESS = Flag::Access.bits();
        const MODIFY = Flag::Modify.bits();
        const ATTRIB = Flag::Attrib.bits();
        const CLOSE_WRITE = Flag::CloseWrite.bits();
        const CLOSE_NOWRITE = Flag::CloseNowrite.bits();
        const OPEN = Flag::Open.bits();
        const MOVED_FROM = Flag::MovedFrom.bits();
        const MOVED_TO = Flag::MovedTo.bits();
        const CREATE = Flag::Create.bits();
        const DELETE = Flag::Delete.bits();
        const DELETE_SELF = Flag::DeleteSelf.bits();
        const MOVE_SELF = Flag::MoveSelf.bits();
        const UNMOUNT = Flag::Unmount.bits();
        const Q_OVERFLOW = Flag::QOverflow.bits();
        const IGNORED = Flag::Ignored.bits();
        const ONLYDIR = Flag::OnlyDir.bits();
        const DONT_FOLLOW = Flag::DontFollow.bits();
        const EXCL_UNLINK = Flag::ExclUnlink.bits();
        const MASK_CREATE = Flag::MaskCreate.bits();
        const MASK_ADD = Flag::MaskAdd.bits();
        const ISDIR = Flag::IsDir.bits();
        const ONESHOT = Flag::Oneshot.bits();

        /// `CLOSE_WRITE | CLOSE_NOWRITE`
        const CLOSE = Self::CLOSE_WRITE.bits() | Self::CLOSE_NOWRITE.bits();

        /// `MOVED_FROM | MOVED_TO`
        const MOVE = Self::MOVED_FROM.bits() | Self::MOVED_TO.bits();

        /// Every event that can be both requested and reported.
        const ALL_EVENTS = union_of_both();

        const _ = !0;
    }
}

impl EventMask {
    /// Decomposes this mask into its known flags, in declaration order.
    pub fn flags(&self) -> Vec<Flag> {
        Flag::from_mask(self.bits())
    }

    /// Bits of this mask with no named [`Flag`].
    pub fn unknown_bits(&self) -> u32 {
        Flag::ALL
            .iter()
            .fold(self.bits(), |rest, flag| rest & !flag.bits())
    }
}

impl From<Flag> for EventMask {
    fn from(flag: Flag) -> Self {
        EventMask::from_bits_retain(flag.bits())
    }
}

impl BitOr for Flag {
    type Output = EventMask;

    fn bitor(self, rhs: Flag) -> EventMask {
        EventMask::from(self) | EventMask::from(rhs)
    }
}

impl BitOr<Flag> for EventMask {
    type Output = EventMask;

    fn bitor(self, rhs: Flag) -> EventMask {
        self | EventMask::from(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn decompose_zero_is_empty() {
        assert!(decompose(0).is_empty());
        assert!(EventMask::empty().flags().is_empty());
    }

    #[test]
    fn decompose_uses_declaration_order() {
        // ISDIR is numerically larger than CREATE either way round
        assert_eq!(
            decompose(0x4000_0100),
            vec![Flag::Create, Flag::IsDir]
        );
        assert_eq!(
            Flag::from_mask((Flag::IsDir | Flag::Create).bits()),
            vec![Flag::Create, Flag::IsDir]
        );
    }

    #[test]
    fn decompose_single_create() {
        assert_eq!(decompose(256), vec![Flag::Create]);
    }

    #[test]
    fn unknown_bits_are_skipped() {
        let unknown = 0x0000_1000 | 0x0800_0000;
        assert!(decompose(unknown).is_empty());
        assert_eq!(decompose(unknown | 0x200), vec![Flag::Delete]);
        assert_eq!(
            EventMask::from_bits_retain(unknown | 0x200).unknown_bits(),
            unknown
        );
    }

    #[test]
    fn decompose_everything_returns_the_table() {
        assert_eq!(decompose(u32::MAX), Flag::ALL.to_vec());
    }

    #[test]
    fn table_is_in_ascending_bit_order() {
        for pair in Flag::ALL.windows(2) {
            assert!(pair[0].bits() < pair[1].bits(), "{pair:?}");
        }
    }

    #[test]
    fn every_flag_is_a_single_bit() {
        for flag in Flag::ALL {
            assert_eq!(flag.bits().count_ones(), 1, "{flag}");
        }
    }

    #[test]
    fn all_events_is_derived_from_both_class() {
        assert_eq!(EventMask::ALL_EVENTS.bits(), 0x0000_0fff);
        for flag in EventMask::ALL_EVENTS.flags() {
            assert_eq!(flag.usage(), Usage::Both);
        }
    }

    #[test]
    fn helper_masks() {
        assert_eq!(
            EventMask::CLOSE.flags(),
            vec![Flag::CloseWrite, Flag::CloseNowrite]
        );
        assert_eq!(EventMask::MOVE.flags(), vec![Flag::MovedFrom, Flag::MovedTo]);
    }

    #[test]
    fn usage_classes() {
        assert!(Flag::Create.usage().is_requestable());
        assert!(Flag::Create.usage().is_reportable());
        assert!(!Flag::IsDir.usage().is_requestable());
        assert!(Flag::IsDir.usage().is_reportable());
        assert!(Flag::Oneshot.usage().is_requestable());
        assert!(!Flag::Oneshot.usage().is_reportable());
    }

    #[test]
    fn combine_flags_into_mask() {
        let mask = Flag::Create | Flag::Delete | Flag::Modify;
        assert_eq!(mask.bits(), 0x302);
        assert_eq!(
            (mask | Flag::DeleteSelf).flags(),
            vec![Flag::Modify, Flag::Create, Flag::Delete, Flag::DeleteSelf]
        );
    }

    #[rstest]
    #[case("CREATE", Flag::Create)]
    #[case("IN_CREATE", Flag::Create)]
    #[case("close_nowrite", Flag::CloseNowrite)]
    #[case(" q_overflow ", Flag::QOverflow)]
    #[case("ISDIR", Flag::IsDir)]
    fn parse_flag_names(#[case] input: &str, #[case] expected: Flag) {
        assert_eq!(input.parse::<Flag>(), Ok(expected));
    }

    #[test]
    fn parse_unknown_flag_name() {
        let err = "CLOSE".parse::<Flag>().unwrap_err();
        assert_eq!(err.to_string(), "unknown inotify flag: \"CLOSE\"");
    }

    #[test]
    fn names_round_trip_through_display() {
        for flag in Flag::ALL {
            assert_eq!(flag.to_string().parse::<Flag>(), Ok(flag));
        }
    }
}

#[cfg(all(test, feature = "serde"))]
mod serde_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn flags_serialize_as_kernel_names() {
        let json = serde_json::to_string(&Flag::from_mask(0x4000_4100)).unwrap();
        assert_eq!(json, r#"["CREATE","Q_OVERFLOW","ISDIR"]"#);
    }

    #[test]
    fn flags_deserialize_from_kernel_names() {
        for flag in Flag::ALL {
            let json = format!("\"{}\"", flag.name());
            assert_eq!(serde_json::from_str::<Flag>(&json).unwrap(), flag);
        }
    }
}
