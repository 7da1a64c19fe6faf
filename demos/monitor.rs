//! Prints every event below a directory.
//!
//! ```sh
//! cargo run --example monitor -- /tmp CREATE DELETE MODIFY MOVED_FROM MOVED_TO
//! ```
//!
//! Without flag arguments all events are watched.

use inotify_simple::{EventMask, Flag, INotify};
use std::path::Path;
use std::time::Duration;

fn watch<P: AsRef<Path>>(path: P, mask: EventMask) -> inotify_simple::Result<()> {
    let inotify = INotify::new()?;
    let wd = inotify.add_watch(path.as_ref(), mask)?;
    log::info!("watching {} as {:?}", path.as_ref().display(), wd);

    loop {
        // give the kernel a moment to merge bursts of identical events
        for event in inotify.read(None, Some(Duration::from_millis(100)))? {
            println!("{event}");
            for flag in event.flags() {
                println!("    {flag}");
            }
            if event.is_overflow() {
                log::warn!("event queue overflowed, events were lost");
            }
            if event.wd == wd.get() && event.is_ignored() {
                println!("watch removed, exiting");
                return Ok(());
            }
        }
    }
}

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let path = args.next().expect("Argument 1 needs to be a path");

    let mut mask = EventMask::empty();
    for arg in args {
        match arg.parse::<Flag>() {
            Ok(flag) if flag.usage().is_requestable() => mask |= EventMask::from(flag),
            Ok(flag) => log::error!("{flag} can only be reported, not watched"),
            Err(e) => log::error!("{e}"),
        }
    }
    if mask.is_empty() {
        mask = EventMask::ALL_EVENTS;
    }

    log::info!("Watching {path} for {mask:?}");
    if let Err(error) = watch(path, mask) {
        log::error!("Error: {error:?}");
    }
}
