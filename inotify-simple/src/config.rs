//! Configuration types

/// Options for creating an [`INotify`](crate::INotify) instance.
///
/// ```rust
/// # use inotify_simple::Config;
/// let config = Config::default()
///     .with_nonblocking(true)
///     .with_inheritable(false);
/// ```
///
/// None of these can be changed after the descriptor has been created.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct Config {
    /// See [Config::with_inheritable]
    inheritable: bool,

    /// See [Config::with_nonblocking]
    nonblocking: bool,

    /// See [Config::with_close_on_drop]
    close_on_drop: bool,
}

impl Config {
    /// Whether child processes inherit the inotify descriptor.
    ///
    /// When off, the descriptor is created with `IN_CLOEXEC`. Off by default.
    pub fn with_inheritable(mut self, inheritable: bool) -> Self {
        self.inheritable = inheritable;
        self
    }

    /// Returns current setting
    pub fn inheritable(&self) -> bool {
        self.inheritable
    }

    /// Create the descriptor with `IN_NONBLOCK`.
    ///
    /// This doesn't change [`INotify::read`](crate::INotify::read), which waits according to its
    /// timeout either way, but makes raw reads of the descriptor fail with `EAGAIN` instead of
    /// blocking when nothing is queued. Off by default.
    pub fn with_nonblocking(mut self, nonblocking: bool) -> Self {
        self.nonblocking = nonblocking;
        self
    }

    /// Returns current setting
    pub fn nonblocking(&self) -> bool {
        self.nonblocking
    }

    /// Close the descriptor when the [`INotify`](crate::INotify) is dropped.
    ///
    /// Turn this off to hand the descriptor to other code that outlives the instance. On by
    /// default.
    pub fn with_close_on_drop(mut self, close_on_drop: bool) -> Self {
        self.close_on_drop = close_on_drop;
        self
    }

    /// Returns current setting
    pub fn close_on_drop(&self) -> bool {
        self.close_on_drop
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inheritable: false,
            nonblocking: false,
            close_on_drop: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = Config::default();
        assert!(!config.inheritable());
        assert!(!config.nonblocking());
        assert!(config.close_on_drop());
    }

    #[test]
    fn config_builder() {
        let config = Config::default()
            .with_inheritable(true)
            .with_nonblocking(true)
            .with_close_on_drop(false);
        assert!(config.inheritable());
        assert!(config.nonblocking());
        assert!(!config.close_on_drop());
    }
}
