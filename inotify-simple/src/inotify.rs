//! The inotify descriptor.
//!
//! [`INotify`] owns one inotify instance and passes the kernel calls through as they are: adding
//! a watch returns the kernel's watch descriptor, removing one takes it back, and reading returns
//! the decoded records. It keeps no record of what is watched.
//!
//! Waiting for events is done with a `mio::Poll` that watches the inotify descriptor and a
//! `mio::Waker`, so a blocked [`INotify::read`] can be woken from another thread through an
//! [`InterruptHandle`].

use crate::{decoder::parse_events, Config, Error, ErrorKind, Result};
use inotify_simple_types::{event::Event, flags::EventMask};
use mio::{unix::SourceFd, Interest};
use parking_lot::Mutex;
use std::{
    ffi::CString,
    io, mem,
    os::unix::{
        ffi::OsStrExt,
        io::{AsFd, AsRawFd, BorrowedFd, IntoRawFd, RawFd},
    },
    path::Path,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

const INOTIFY: mio::Token = mio::Token(0);
const WAKER: mio::Token = mio::Token(1);

/// Identifies one watch of an [`INotify`] instance.
///
/// Returned by [`INotify::add_watch`]; events produced by the watch carry the same value in
/// [`Event::wd`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WatchDescriptor(i32);

impl WatchDescriptor {
    /// The raw watch descriptor.
    pub fn get(self) -> i32 {
        self.0
    }
}

impl From<WatchDescriptor> for i32 {
    fn from(wd: WatchDescriptor) -> Self {
        wd.0
    }
}

impl PartialEq<i32> for WatchDescriptor {
    fn eq(&self, other: &i32) -> bool {
        self.0 == *other
    }
}

/// Wakes a thread blocked in [`INotify::read`].
///
/// The woken `read` returns no events. If no read is waiting, the next wait returns immediately
/// instead.
#[derive(Clone, Debug)]
pub struct InterruptHandle(Arc<mio::Waker>);

impl InterruptHandle {
    /// Wakes the reader.
    ///
    /// The wake stays pending until a `read` waits. A `read` that finds events already queued
    /// returns them without consuming it, so the next wait on the same instance returns empty.
    pub fn interrupt(&self) -> Result<()> {
        log::debug!("interrupting inotify reader");
        self.0.wake().map_err(Error::io)
    }
}

#[derive(Debug)]
struct Reader {
    poll: mio::Poll,
    events: mio::Events,
    buffer: Vec<u8>,
}

enum Wait {
    Readable,
    TimedOut,
    Interrupted,
}

impl Reader {
    fn wait(&mut self, timeout: Option<Duration>) -> Result<Wait> {
        match self.poll.poll(&mut self.events, timeout) {
            // Treated as a spurious wake-up; the caller re-checks and waits again.
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => return Ok(Wait::Readable),
            Err(e) => return Err(Error::io(e)),
            Ok(()) => {}
        }

        let mut wait = Wait::TimedOut;
        for event in &self.events {
            match event.token() {
                WAKER => return Ok(Wait::Interrupted),
                INOTIFY => wait = Wait::Readable,
                _ => unreachable!(),
            }
        }
        Ok(wait)
    }
}

/// An inotify instance.
///
/// Safe to share between threads: concurrent calls to [`read`](INotify::read) are serialized and
/// never return the same event twice.
///
/// # Examples
///
/// ```no_run
/// use inotify_simple::{Flag, INotify};
///
/// # fn main() -> inotify_simple::Result<()> {
/// let inotify = INotify::new()?;
/// let wd = inotify.add_watch("/tmp", Flag::Create | Flag::Delete | Flag::Modify)?;
///
/// for event in inotify.read(None, None)? {
///     assert_eq!(wd, event.wd);
///     println!("{event}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct INotify {
    fd: RawFd,
    close_on_drop: bool,
    reader: Mutex<Reader>,
    waker: Arc<mio::Waker>,
}

impl INotify {
    /// Creates an inotify instance with the default [`Config`].
    pub fn new() -> Result<Self> {
        Self::with_config(Config::default())
    }

    /// Creates an inotify instance.
    pub fn with_config(config: Config) -> Result<Self> {
        let mut flags = 0;
        if !config.inheritable() {
            flags |= libc::IN_CLOEXEC;
        }
        if config.nonblocking() {
            flags |= libc::IN_NONBLOCK;
        }

        let fd = retry(|| unsafe { libc::inotify_init1(flags) })?;
        log::trace!("created inotify instance on fd {fd}");

        let setup = || -> io::Result<(mio::Poll, mio::Waker)> {
            let poll = mio::Poll::new()?;
            poll.registry()
                .register(&mut SourceFd(&fd), INOTIFY, Interest::READABLE)?;
            let waker = mio::Waker::new(poll.registry(), WAKER)?;
            Ok((poll, waker))
        };
        let (poll, waker) = match setup() {
            Ok(parts) => parts,
            Err(e) => {
                unsafe {
                    libc::close(fd);
                }
                return Err(Error::io(e));
            }
        };

        Ok(INotify {
            fd,
            close_on_drop: config.close_on_drop(),
            reader: Mutex::new(Reader {
                poll,
                events: mio::Events::with_capacity(2),
                buffer: Vec::new(),
            }),
            waker: Arc::new(waker),
        })
    }

    /// Adds a watch for `path`, or changes the mask of the existing one.
    ///
    /// Watching the same path twice returns the same descriptor; without
    /// [`EventMask::MASK_ADD`] the new mask replaces the old one.
    ///
    /// Events already queued under the old mask may still be delivered after the mask changed.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::PathNotFound`] if `path` doesn't exist.
    /// - [`ErrorKind::MaxFilesWatch`] if the per-user watch limit is reached.
    /// - [`ErrorKind::Io`] for any other failure of `inotify_add_watch(2)`.
    ///
    /// The path is attached to the error.
    pub fn add_watch<P: AsRef<Path>>(
        &self,
        path: P,
        mask: impl Into<EventMask>,
    ) -> Result<WatchDescriptor> {
        let path = path.as_ref();
        let mask = mask.into();
        let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| {
            Error::generic("path contains a NUL byte").add_path(path.to_owned())
        })?;

        log::trace!("adding inotify watch: {} {mask:?}", path.display());

        let wd = retry(|| unsafe {
            libc::inotify_add_watch(self.fd, c_path.as_ptr(), mask.bits())
        })
        .map_err(|e| {
            if e.raw_os_error() == Some(libc::ENOSPC) {
                // do not report inotify limits as "no more space"
                Error::new(ErrorKind::MaxFilesWatch)
            } else if e.kind() == io::ErrorKind::NotFound {
                Error::path_not_found()
            } else {
                Error::io(e)
            }
            .add_path(path.to_owned())
        })?;

        Ok(WatchDescriptor(wd))
    }

    /// Removes a watch.
    ///
    /// The kernel then queues an `IGNORED` event for `wd`. Events of the watch that were queued
    /// earlier are still delivered.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::WatchNotFound`] if `wd` is not a watch of this instance.
    /// - [`ErrorKind::Io`] for any other failure of `inotify_rm_watch(2)`.
    pub fn rm_watch(&self, wd: WatchDescriptor) -> Result<()> {
        log::trace!("removing inotify watch {}", wd.0);

        retry(|| unsafe { libc::inotify_rm_watch(self.fd, wd.0) }).map_err(|e| {
            if e.raw_os_error() == Some(libc::EINVAL) {
                Error::watch_not_found()
            } else {
                Error::io(e)
            }
        })?;
        Ok(())
    }

    /// Waits for events and returns them.
    ///
    /// - `timeout`: `None` blocks until events arrive. `Some(Duration::ZERO)` returns at once
    ///   when nothing is queued. Otherwise waits at most that long. Time spent waiting for
    ///   another thread's `read` to finish counts against the timeout.
    /// - `read_delay`: once events are available, sleep this long before reading them. This lets
    ///   further events accumulate so the kernel can merge identical consecutive ones, at the
    ///   risk of overflowing the queue.
    ///
    /// Returns an empty vector on timeout or when woken through an [`InterruptHandle`].
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::Io`] if polling or reading the descriptor fails, e.g. `EBADF` after the
    ///   descriptor was closed behind this instance's back.
    /// - [`ErrorKind::MalformedStream`] if the bytes read don't frame into whole records.
    pub fn read(
        &self,
        timeout: Option<Duration>,
        read_delay: Option<Duration>,
    ) -> Result<Vec<Event>> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let mut reader = match deadline {
            Some(deadline) => match self.reader.try_lock_until(deadline) {
                Some(reader) => reader,
                None => {
                    log::debug!("inotify read timed out waiting for another reader");
                    return Ok(Vec::new());
                }
            },
            None => self.reader.lock(),
        };

        while self.bytes_available()? == 0 {
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            match reader.wait(remaining)? {
                Wait::Readable => {}
                Wait::TimedOut => return Ok(Vec::new()),
                Wait::Interrupted => {
                    log::debug!("inotify read interrupted");
                    return Ok(Vec::new());
                }
            }
        }

        if let Some(delay) = read_delay {
            thread::sleep(delay);
        }

        self.read_available(&mut reader)
    }

    /// Returns a handle that wakes a blocked [`read`](INotify::read).
    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle(Arc::clone(&self.waker))
    }

    /// Closes the inotify descriptor.
    ///
    /// Dropping an instance closes it as well (unless [`Config::with_close_on_drop`] was turned
    /// off) but ignores errors.
    pub fn close(mut self) -> Result<()> {
        let fd = mem::replace(&mut self.fd, -1);
        log::trace!("closing inotify fd {fd}");

        // close(2) must not be retried on EINTR, the descriptor is released either way
        if unsafe { libc::close(fd) } == -1 {
            return Err(Error::io(io::Error::last_os_error()));
        }
        Ok(())
    }

    fn bytes_available(&self) -> Result<usize> {
        let mut available: libc::c_int = 0;
        retry(|| unsafe {
            libc::ioctl(self.fd, libc::FIONREAD, &mut available as *mut libc::c_int)
        })?;
        Ok(available.max(0) as usize)
    }

    fn read_available(&self, reader: &mut Reader) -> Result<Vec<Event>> {
        let available = self.bytes_available()?;
        if available == 0 {
            log::debug!("inotify descriptor readable without pending bytes");
            return Ok(Vec::new());
        }

        reader.buffer.resize(available, 0);
        let buffer = &mut reader.buffer;
        let read = retry(|| unsafe {
            libc::read(self.fd, buffer.as_mut_ptr().cast(), buffer.len())
        })?;
        log::trace!("read {read} of {available} bytes from inotify");

        parse_events(&buffer[..read.max(0) as usize])
    }
}

impl AsRawFd for INotify {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl AsFd for INotify {
    fn as_fd(&self) -> BorrowedFd<'_> {
        // SAFETY: the descriptor stays open for as long as `self` is borrowed
        unsafe { BorrowedFd::borrow_raw(self.fd) }
    }
}

impl IntoRawFd for INotify {
    fn into_raw_fd(mut self) -> RawFd {
        mem::replace(&mut self.fd, -1)
    }
}

impl Drop for INotify {
    fn drop(&mut self) {
        if self.fd != -1 && self.close_on_drop {
            unsafe {
                libc::close(self.fd);
            }
        }
    }
}

/// Runs a raw call until it doesn't fail with `EINTR`.
fn retry<T, F>(mut call: F) -> io::Result<T>
where
    T: Copy + PartialEq + From<i8>,
    F: FnMut() -> T,
{
    loop {
        let rc = call();
        if rc != T::from(-1) {
            return Ok(rc);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inotify_simple_types::flags::Flag;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn inotify_is_send_and_sync() {
        fn check<T: Send + Sync>() {}
        check::<INotify>();
        check::<InterruptHandle>();
    }

    #[rstest]
    #[case(Flag::Access, libc::IN_ACCESS)]
    #[case(Flag::Modify, libc::IN_MODIFY)]
    #[case(Flag::Attrib, libc::IN_ATTRIB)]
    #[case(Flag::CloseWrite, libc::IN_CLOSE_WRITE)]
    #[case(Flag::CloseNowrite, libc::IN_CLOSE_NOWRITE)]
    #[case(Flag::Open, libc::IN_OPEN)]
    #[case(Flag::MovedFrom, libc::IN_MOVED_FROM)]
    #[case(Flag::MovedTo, libc::IN_MOVED_TO)]
    #[case(Flag::Create, libc::IN_CREATE)]
    #[case(Flag::Delete, libc::IN_DELETE)]
    #[case(Flag::DeleteSelf, libc::IN_DELETE_SELF)]
    #[case(Flag::MoveSelf, libc::IN_MOVE_SELF)]
    #[case(Flag::Unmount, libc::IN_UNMOUNT)]
    #[case(Flag::QOverflow, libc::IN_Q_OVERFLOW)]
    #[case(Flag::Ignored, libc::IN_IGNORED)]
    #[case(Flag::OnlyDir, libc::IN_ONLYDIR)]
    #[case(Flag::DontFollow, libc::IN_DONT_FOLLOW)]
    #[case(Flag::ExclUnlink, libc::IN_EXCL_UNLINK)]
    #[case(Flag::MaskAdd, libc::IN_MASK_ADD)]
    #[case(Flag::IsDir, libc::IN_ISDIR)]
    #[case(Flag::Oneshot, libc::IN_ONESHOT)]
    fn flag_values_match_libc(#[case] flag: Flag, #[case] expected: u32) {
        assert_eq!(flag.bits(), expected);
    }

    #[test]
    fn all_events_matches_libc() {
        assert_eq!(EventMask::ALL_EVENTS.bits(), libc::IN_ALL_EVENTS);
        assert_eq!(
            EventMask::CLOSE.bits(),
            libc::IN_CLOSE_WRITE | libc::IN_CLOSE_NOWRITE
        );
        assert_eq!(
            EventMask::MOVE.bits(),
            libc::IN_MOVED_FROM | libc::IN_MOVED_TO
        );
    }

    #[test]
    fn missing_path_is_path_not_found() {
        let inotify = INotify::new().unwrap();
        let result = inotify.add_watch("/some/non/existant/path", Flag::Create);

        assert!(matches!(
            result,
            Err(Error {
                paths: _,
                kind: ErrorKind::PathNotFound
            })
        ));
    }

    #[test]
    fn nul_in_path_is_rejected() {
        let inotify = INotify::new().unwrap();
        let result = inotify.add_watch("/tmp/a\0b", Flag::Create);
        assert!(matches!(
            result,
            Err(Error {
                kind: ErrorKind::Generic(_),
                ..
            })
        ));
    }

    #[test]
    fn unknown_watch_is_watch_not_found() {
        let inotify = INotify::new().unwrap();
        let result = inotify.rm_watch(WatchDescriptor(4242));
        assert!(matches!(
            result,
            Err(Error {
                kind: ErrorKind::WatchNotFound,
                ..
            })
        ));
    }

    #[test]
    fn same_path_same_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let inotify = INotify::new().unwrap();
        let first = inotify.add_watch(dir.path(), Flag::Create).unwrap();
        let second = inotify.add_watch(dir.path(), Flag::Delete).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn zero_timeout_without_events() {
        let dir = tempfile::tempdir().unwrap();
        let inotify = INotify::new().unwrap();
        inotify.add_watch(dir.path(), Flag::Create).unwrap();
        assert!(inotify.read(Some(Duration::ZERO), None).unwrap().is_empty());
    }

    #[test]
    fn pending_interrupt_ends_next_wait() {
        let inotify = INotify::new().unwrap();
        inotify.interrupt_handle().interrupt().unwrap();
        assert!(inotify.read(None, None).unwrap().is_empty());
    }

    #[test]
    fn close_reports_success() {
        let inotify = INotify::new().unwrap();
        inotify.close().unwrap();
    }

    #[test]
    fn cloexec_follows_config() {
        let fd_flags =
            |inotify: &INotify| unsafe { libc::fcntl(inotify.as_raw_fd(), libc::F_GETFD) };

        let inotify = INotify::new().unwrap();
        assert_ne!(fd_flags(&inotify) & libc::FD_CLOEXEC, 0);

        let inotify = INotify::with_config(Config::default().with_inheritable(true)).unwrap();
        assert_eq!(fd_flags(&inotify) & libc::FD_CLOEXEC, 0);
    }

    #[test]
    fn nonblocking_follows_config() {
        let fl_flags =
            |inotify: &INotify| unsafe { libc::fcntl(inotify.as_raw_fd(), libc::F_GETFL) };

        let inotify = INotify::new().unwrap();
        assert_eq!(fl_flags(&inotify) & libc::O_NONBLOCK, 0);

        let inotify = INotify::with_config(Config::default().with_nonblocking(true)).unwrap();
        assert_ne!(fl_flags(&inotify) & libc::O_NONBLOCK, 0);
    }
}
