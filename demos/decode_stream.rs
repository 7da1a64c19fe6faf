//! Decodes a recorded inotify byte stream that arrives in arbitrary chunks.
//!
//! The stream is read from the file given as the first argument. Without an argument a small
//! stream describing a mkdir, a create and a rename is decoded.

use inotify_simple::{encode_events, Decoder, Event, Flag};
use std::{env, fs, io::Read};

fn recorded() -> Vec<u8> {
    encode_events(&[
        Event::new(1, (Flag::Create | Flag::IsDir).bits(), 0, "foo"),
        Event::new(1, Flag::Create.bits(), 0, "test.txt"),
        Event::new(1, Flag::MovedFrom.bits(), 7, "test.txt"),
        Event::new(1, Flag::MovedTo.bits(), 7, "renamed.txt"),
        Event::new(1, Flag::DeleteSelf.bits(), 0, ""),
        Event::new(1, Flag::Ignored.bits(), 0, ""),
    ])
}

fn main() -> inotify_simple::Result<()> {
    env_logger::init();

    let mut source: Box<dyn Read> = match env::args().nth(1) {
        Some(path) => Box::new(fs::File::open(path)?),
        None => Box::new(std::io::Cursor::new(recorded())),
    };

    let mut decoder = Decoder::new();
    // deliberately smaller than most records
    let mut chunk = [0u8; 7];
    loop {
        let read = source.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        for event in decoder.decode(&chunk[..read])? {
            println!("{event}");
        }
        log::debug!("{} bytes pending", decoder.pending());
    }
    decoder.finish()?;
    Ok(())
}
