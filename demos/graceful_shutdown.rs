//! Reads events on a background thread and stops it from the main thread.

use inotify_simple::{EventMask, INotify};
use std::{fs, sync::Arc, thread, time::Duration};

fn main() -> inotify_simple::Result<()> {
    env_logger::init();

    let dir = tempfile::tempdir()?;
    let inotify = Arc::new(INotify::new()?);
    inotify.add_watch(dir.path(), EventMask::CREATE | EventMask::DELETE)?;
    let interrupt = inotify.interrupt_handle();

    let reader = {
        let inotify = Arc::clone(&inotify);
        thread::spawn(move || -> inotify_simple::Result<usize> {
            let mut seen = 0;
            loop {
                let events = inotify.read(None, None)?;
                if events.is_empty() {
                    // only an interrupt ends a read without timeout empty-handed
                    return Ok(seen);
                }
                for event in events {
                    log::info!("{event}");
                    seen += 1;
                }
            }
        })
    };

    for i in 0..3 {
        let path = dir.path().join(format!("file{i}"));
        fs::write(&path, b"hello")?;
        fs::remove_file(&path)?;
        thread::sleep(Duration::from_millis(100));
    }

    interrupt.interrupt()?;
    match reader.join() {
        Ok(seen) => println!("reader stopped after {} events", seen?),
        Err(_) => log::error!("reader thread panicked"),
    }
    Ok(())
}
