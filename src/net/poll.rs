use std::io;
use std::os::unix::io::RawFd;

/// Flat `pollfd` table with O(1) swap-remove, driving `libc::poll(2)`
/// directly rather than an edge-triggered readiness API.
pub struct PollSet {
    fds: Vec<libc::pollfd>,
}

impl PollSet {
    pub fn new() -> Self {
        PollSet { fds: Vec::new() }
    }

    /// Registers `fd` for `events`, or updates its interest set if already present.
    pub fn add(&mut self, fd: RawFd, events: i16) {
        if let Some(entry) = self.fds.iter_mut().find(|p| p.fd == fd) {
            entry.events = events;
            entry.revents = 0;
            return;
        }
        self.fds.push(libc::pollfd {
            fd,
            events,
            revents: 0,
        });
    }

    /// Removes `fd` by swapping it with the last entry, same as the
    /// reference `PollManager::removeFd`.
    pub fn remove(&mut self, fd: RawFd) {
        if let Some(index) = self.fds.iter().position(|p| p.fd == fd) {
            let last = self.fds.len() - 1;
            self.fds.swap(index, last);
            self.fds.pop();
        }
    }

    pub fn len(&self) -> usize {
        self.fds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fds.is_empty()
    }

    /// Blocks for up to `timeout_ms` waiting for readiness, returning the
    /// number of fds with events set. Clears stale `revents` first.
    pub fn poll(&mut self, timeout_ms: i32) -> io::Result<usize> {
        if self.fds.is_empty() {
            return Ok(0);
        }
        for entry in &mut self.fds {
            entry.revents = 0;
        }
        let ret = unsafe {
            libc::poll(self.fds.as_mut_ptr(), self.fds.len() as libc::nfds_t, timeout_ms)
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(ret as usize)
    }

    pub fn readable(&self, fd: RawFd) -> bool {
        self.has_event(fd, libc::POLLIN)
    }

    pub fn writable(&self, fd: RawFd) -> bool {
        self.has_event(fd, libc::POLLOUT)
    }

    pub fn errored(&self, fd: RawFd) -> bool {
        self.has_event(fd, libc::POLLERR | libc::POLLHUP | libc::POLLNVAL)
    }

    fn has_event(&self, fd: RawFd, mask: i16) -> bool {
        self.fds
            .iter()
            .find(|p| p.fd == fd)
            .map(|p| p.revents & mask != 0)
            .unwrap_or(false)
    }

    /// Snapshot of registered fds, for iterating readiness without holding a
    /// borrow on `self` across mutation (accept/close during the same pass).
    pub fn fds(&self) -> Vec<RawFd> {
        self.fds.iter().map(|p| p.fd).collect()
    }
}

impl Default for PollSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::io::AsRawFd;

    #[test]
    fn add_then_remove_shrinks_the_set() {
        let (a, b) = std::net::TcpListener::bind("127.0.0.1:0")
            .map(|l| (l.as_raw_fd(), l))
            .unwrap();
        let mut set = PollSet::new();
        set.add(a, libc::POLLIN);
        assert_eq!(set.len(), 1);
        set.remove(a);
        assert!(set.is_empty());
        drop(b);
    }

    #[test]
    fn adding_same_fd_twice_updates_in_place() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let fd = listener.as_raw_fd();
        let mut set = PollSet::new();
        set.add(fd, libc::POLLIN);
        set.add(fd, libc::POLLOUT);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn remove_swaps_with_last_entry() {
        let l1 = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let l2 = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let l3 = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut set = PollSet::new();
        set.add(l1.as_raw_fd(), libc::POLLIN);
        set.add(l2.as_raw_fd(), libc::POLLIN);
        set.add(l3.as_raw_fd(), libc::POLLIN);
        set.remove(l1.as_raw_fd());
        assert_eq!(set.len(), 2);
        assert!(set.fds().contains(&l2.as_raw_fd()));
        assert!(set.fds().contains(&l3.as_raw_fd()));
    }

    #[test]
    fn empty_set_polls_without_blocking() {
        let mut set = PollSet::new();
        assert_eq!(set.poll(0).unwrap(), 0);
    }

    #[test]
    fn listening_socket_is_readable_once_a_peer_connects() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        listener.set_nonblocking(true).unwrap();
        let mut set = PollSet::new();
        set.add(listener.as_raw_fd(), libc::POLLIN);

        let _client = std::net::TcpStream::connect(addr).unwrap();
        let n = set.poll(1000).unwrap();
        assert_eq!(n, 1);
        assert!(set.readable(listener.as_raw_fd()));
    }
}
