//! Error types

use std::{error::Error as StdError, fmt, io, path::PathBuf, result::Result as StdResult};

/// Type alias to use this library's [`Error`] type in a Result
pub type Result<T> = StdResult<T, Error>;

/// Error kinds
#[derive(Debug)]
pub enum ErrorKind {
    /// Generic error
    ///
    /// May be used in cases where a platform specific error is mapped to this type, or for opaque
    /// internal errors.
    Generic(String),

    /// I/O errors.
    ///
    /// Returned when one of the inotify system calls fails; the `errno` is preserved.
    Io(io::Error),

    /// A buffer read from an inotify descriptor does not frame into whole event records.
    ///
    /// `offset` is the position of the record that could not be decoded, `remaining` the number
    /// of bytes left from that position and `needed` the number of bytes the record claims.
    ///
    /// The kernel never produces such a buffer, so this points to a bug in buffer delivery or to
    /// an incompatible source. It should be treated as fatal for the current read.
    MalformedStream {
        /// Position of the offending record in the buffer.
        offset: usize,
        /// Bytes available from `offset` onwards.
        remaining: usize,
        /// Bytes the record needs.
        needed: usize,
    },

    /// The provided path does not exist.
    PathNotFound,

    /// Attempted to remove a watch that does not exist.
    WatchNotFound,

    /// Can't watch (more) files, limit on the total number of inotify watches reached
    MaxFilesWatch,
}

/// Notify error type.
///
/// Errors are emitted either at creation time of an [`INotify`](crate::INotify), when adding or
/// removing watches, or while reading and decoding events.
#[derive(Debug)]
pub struct Error {
    /// Kind of the error.
    pub kind: ErrorKind,

    /// Relevant paths to the error, if any.
    pub paths: Vec<PathBuf>,
}

impl Error {
    /// Adds a path to the error.
    pub fn add_path(mut self, path: PathBuf) -> Self {
        self.paths.push(path);
        self
    }

    /// Replaces the paths for the error.
    pub fn set_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.paths = paths;
        self
    }

    /// Creates a new Error with empty paths given its kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            paths: Vec::new(),
        }
    }

    /// Creates a new generic Error from a message.
    pub fn generic(msg: &str) -> Self {
        Self::new(ErrorKind::Generic(msg.into()))
    }

    /// Creates a new i/o Error from a stdlib `io::Error`.
    pub fn io(err: io::Error) -> Self {
        Self::new(ErrorKind::Io(err))
    }

    /// Creates a new "path not found" error.
    pub fn path_not_found() -> Self {
        Self::new(ErrorKind::PathNotFound)
    }

    /// Creates a new "watch not found" error.
    pub fn watch_not_found() -> Self {
        Self::new(ErrorKind::WatchNotFound)
    }

    /// Creates a new "malformed stream" error.
    pub fn malformed_stream(offset: usize, remaining: usize, needed: usize) -> Self {
        Self::new(ErrorKind::MalformedStream {
            offset,
            remaining,
            needed,
        })
    }

    /// Whether this error reports a framing inconsistency in an event buffer.
    pub fn is_malformed_stream(&self) -> bool {
        matches!(self.kind, ErrorKind::MalformedStream { .. })
    }

    /// The raw OS error code, if this error came from a system call.
    pub fn raw_os_error(&self) -> Option<i32> {
        match &self.kind {
            ErrorKind::Io(err) => err.raw_os_error(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let error = match self.kind {
            ErrorKind::PathNotFound => "No path was found.".into(),
            ErrorKind::WatchNotFound => "No watch was found.".into(),
            ErrorKind::MaxFilesWatch => "inotify watch limit reached".into(),
            ErrorKind::Generic(ref err) => err.clone(),
            ErrorKind::Io(ref err) => err.to_string(),
            ErrorKind::MalformedStream {
                offset,
                remaining,
                needed,
            } => format!(
                "malformed inotify event stream: record at offset {offset} needs {needed} bytes, {remaining} remain"
            ),
        };

        if self.paths.is_empty() {
            write!(f, "{error}")
        } else {
            write!(f, "{} about {:?}", error, self.paths)
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self.kind {
            ErrorKind::Io(ref cause) => Some(cause),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err)
    }
}

#[test]
fn display_with_paths() {
    let err = Error::path_not_found().add_path(PathBuf::from("/tmp/missing"));
    assert_eq!(err.to_string(), r#"No path was found. about ["/tmp/missing"]"#);
}

#[test]
fn display_malformed_stream() {
    let err = Error::malformed_stream(16, 7, 16);
    assert!(err.is_malformed_stream());
    assert_eq!(
        err.to_string(),
        "malformed inotify event stream: record at offset 16 needs 16 bytes, 7 remain"
    );
}

#[test]
fn io_error_keeps_errno_and_source() {
    let err = Error::from(io::Error::from_raw_os_error(9));
    assert_eq!(err.raw_os_error(), Some(9));
    assert!(err.source().is_some());
    assert!(Error::watch_not_found().source().is_none());
}
