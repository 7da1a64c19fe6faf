//! A simple wrapper around Linux's inotify
//!
//! # Installation
//!
//! ```toml
//! [dependencies]
//! inotify-simple = "0.1.0"
//! ```
//!
//! This crate passes inotify through as it is. [`INotify`] adds and removes watches by path and
//! returns the kernel's records decoded into [`Event`]s, with a timeout and an optional delay to
//! let the kernel coalesce bursts. It does not track which path a watch descriptor belongs to,
//! recurse into directories, or turn records into higher level events.
//!
//! The decoding part ([`parse_events`], [`Decoder`]) and the flag vocabulary ([`Flag`],
//! [`EventMask`]) work on any Unix and can be used on buffers obtained elsewhere.
//!
//! ## Features
//!
//! - `serde` for serialization of events and flags
//!
//! # Examples
//!
//! ```no_run
//! use inotify_simple::{EventMask, INotify};
//! use std::time::Duration;
//!
//! # fn main() -> inotify_simple::Result<()> {
//! let inotify = INotify::new()?;
//! inotify.add_watch("/tmp", EventMask::CREATE | EventMask::DELETE | EventMask::MOVE)?;
//!
//! loop {
//!     // wait at most a second, then give the kernel 100ms to merge a burst
//!     let events = inotify.read(
//!         Some(Duration::from_secs(1)),
//!         Some(Duration::from_millis(100)),
//!     )?;
//!     for event in events {
//!         println!("{event}: {:?}", event.flags());
//!     }
//! }
//! # }
//! ```
//!
//! # Known Problems
//!
//! ### Linux: No space left on device
//!
//! [`INotify::add_watch`] fails with [`ErrorKind::MaxFilesWatch`] once the per-user watch limit
//! is reached. It can be raised via
//! ```sh
//! sudo sysctl fs.inotify.max_user_watches=524288 # example number
//! sudo sysctl -p
//! ```
//!
//! ### Queue overflow
//!
//! When the kernel queue fills up, events are dropped and a single record with
//! [`Flag::QOverflow`] and `wd == -1` is queued instead. A long `read_delay` makes this more
//! likely.

#![deny(missing_docs)]

pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use inotify_simple_types::event::{self, Event};
pub use inotify_simple_types::flags::{self, decompose, EventMask, Flag, ParseFlagError, Usage};

#[cfg(unix)]
pub use decoder::{
    encode_event, encode_events, parse_events, Decoder, EVENT_HEADER_SIZE, MAX_NAME_LEN,
};

#[cfg(any(target_os = "linux", target_os = "android"))]
pub use crate::inotify::{INotify, InterruptHandle, WatchDescriptor};

mod config;
#[cfg(unix)]
pub mod decoder;
mod error;
#[cfg(any(target_os = "linux", target_os = "android"))]
mod inotify;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_safe() {
        fn check<T: Send + Sync + 'static>() {}
        check::<Error>();
        check::<Config>();
        check::<Event>();
    }

    #[test]
    fn test_debug_impl() {
        macro_rules! assert_debug_impl {
            ($t:ty) => {{
                #[allow(dead_code)]
                trait NeedsDebug: std::fmt::Debug {}
                impl NeedsDebug for $t {}
            }};
        }

        assert_debug_impl!(Config);
        assert_debug_impl!(Error);
        assert_debug_impl!(ErrorKind);
        assert_debug_impl!(Event);
        assert_debug_impl!(EventMask);
        assert_debug_impl!(Flag);
    }

    #[cfg(unix)]
    #[test]
    fn reexported_decoder_reads_encoded_events() {
        let events = vec![
            Event::new(1, (Flag::Create | Flag::IsDir).bits(), 0, "dir"),
            Event::new(-1, Flag::QOverflow.bits(), 0, ""),
        ];
        let decoded = parse_events(&encode_events(&events)).unwrap();
        assert_eq!(decoded, events);
    }
}
