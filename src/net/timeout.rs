use std::collections::HashMap;
use std::os::unix::io::RawFd;
use std::time::{Duration, Instant};

/// Idle connections are dropped after this much time with no activity.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Tracks last-activity timestamps per connection fd and reports which
/// ones have gone idle past `CLIENT_TIMEOUT`.
pub struct TimeoutTracker {
    last_activity: HashMap<RawFd, Instant>,
}

impl TimeoutTracker {
    pub fn new() -> Self {
        TimeoutTracker {
            last_activity: HashMap::new(),
        }
    }

    pub fn track(&mut self, fd: RawFd) {
        self.last_activity.insert(fd, Instant::now());
    }

    pub fn touch(&mut self, fd: RawFd) {
        if let Some(t) = self.last_activity.get_mut(&fd) {
            *t = Instant::now();
        }
    }

    pub fn untrack(&mut self, fd: RawFd) {
        self.last_activity.remove(&fd);
    }

    /// Returns the fds that have been idle for longer than `CLIENT_TIMEOUT`.
    pub fn expired(&self) -> Vec<RawFd> {
        let now = Instant::now();
        self.last_activity
            .iter()
            .filter(|(_, t)| now.duration_since(**t) > CLIENT_TIMEOUT)
            .map(|(fd, _)| *fd)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.last_activity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_activity.is_empty()
    }
}

impl Default for TimeoutTracker {
    fn default() -> Self {
        Self::new()
    }
}
