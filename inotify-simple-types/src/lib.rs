//! Types shared by the `inotify-simple` crate.
//!
//! These carry no platform code and can be used to inspect or build events anywhere, for instance
//! when replaying a recorded event stream.

pub mod event;
pub mod flags;
