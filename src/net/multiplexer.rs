use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, TcpListener, TcpStream};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::cgi;
use crate::config::model::HttpConfig;
use crate::errors::{DirectoryListing, ErrorPageConfig, ErrorPageGenerator};
use crate::fs::static_files;
use crate::http::parse::{self, ParseOutcome};
use crate::http::response::Response;
use crate::net::connection::{ConnState, Connection, ReadOutcome};
use crate::net::poll::PollSet;
use crate::net::timeout::TimeoutTracker;
use crate::routing::router::{self, RouteDecision, RouteMode};
use crate::upload;

/// How long a `poll(2)` call blocks before the multiplexer re-checks the
/// shutdown flag and sweeps idle connections.
const POLL_TIMEOUT_MS: i32 = 1000;

/// Owns every listening socket and every live connection, driving them
/// through accept → read → parse → route → respond → close on a single
/// thread over `libc::poll`. Grounded on the reference `MultiServer`'s
/// listener bookkeeping, rebuilt around the `PollSet`/`Connection`
/// primitives instead of a placeholder event loop.
pub struct Multiplexer {
    config: HttpConfig,
    poll: PollSet,
    listeners: HashMap<RawFd, (TcpListener, u16)>,
    connections: HashMap<RawFd, Connection>,
    timeouts: TimeoutTracker,
}

impl Multiplexer {
    /// Binds one listener per distinct `(interface, port)` pair across all
    /// configured servers.
    pub fn new(config: HttpConfig) -> io::Result<Self> {
        let mut listeners = HashMap::new();
        let mut poll = PollSet::new();
        let mut seen: Vec<(IpAddr, u16)> = Vec::new();

        for server in &config.servers {
            for &(addr, port) in &server.listen {
                if seen.contains(&(addr, port)) {
                    continue;
                }
                seen.push((addr, port));

                let listener = TcpListener::bind((addr, port))?;
                listener.set_nonblocking(true)?;
                let fd = listener.as_raw_fd();
                poll.add(fd, libc::POLLIN);
                listeners.insert(fd, (listener, port));
                log::info!("listening on {addr}:{port}");
            }
        }

        Ok(Multiplexer {
            config,
            poll,
            listeners,
            connections: HashMap::new(),
            timeouts: TimeoutTracker::new(),
        })
    }

    /// Runs until `shutdown` is set, then returns once every connection has
    /// drained or been closed.
    pub fn run(&mut self, shutdown: &AtomicBool) -> io::Result<()> {
        while !shutdown.load(Ordering::Relaxed) {
            self.evict_idle_connections();
            self.poll.poll(POLL_TIMEOUT_MS)?;

            for fd in self.poll.fds() {
                if self.listeners.contains_key(&fd) {
                    if self.poll.readable(fd) {
                        self.accept_all(fd);
                    }
                    continue;
                }

                if self.poll.errored(fd) {
                    self.close_connection(fd);
                    continue;
                }

                let is_readable = self.poll.readable(fd);
                let is_writable = self.poll.writable(fd);

                if is_readable {
                    self.drive_read(fd);
                }
                if is_writable && self.connections.contains_key(&fd) {
                    self.drive_write(fd);
                }
            }
        }
        Ok(())
    }

    fn evict_idle_connections(&mut self) {
        for fd in self.timeouts.expired() {
            log::warn!("closing connection fd={fd} after idle timeout");
            self.close_connection(fd);
        }
    }

    fn accept_all(&mut self, listener_fd: RawFd) {
        let port = self.listeners.get(&listener_fd).map(|(_, port)| *port).unwrap();
        loop {
            let accepted = {
                let (listener, _) = self.listeners.get(&listener_fd).unwrap();
                listener.accept()
            };
            match accepted {
                Ok((stream, addr)) => self.register_connection(stream, addr, port),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    log::error!("accept failed on port {port}: {e}");
                    break;
                }
            }
        }
    }

    fn register_connection(&mut self, stream: TcpStream, addr: std::net::SocketAddr, port: u16) {
        if let Err(e) = stream.set_nonblocking(true) {
            log::error!("failed to set nonblocking on accepted connection: {e}");
            return;
        }
        let fd = stream.as_raw_fd();
        let conn = Connection::new(stream, addr, port);
        self.poll.add(fd, libc::POLLIN);
        self.timeouts.track(fd);
        self.connections.insert(fd, conn);
    }

    fn drive_read(&mut self, fd: RawFd) {
        let outcome = match self.connections.get_mut(&fd) {
            Some(conn) => conn.read_more(),
            None => return,
        };

        match outcome {
            Ok(ReadOutcome::WouldBlock) => {}
            Ok(ReadOutcome::Eof) => {
                self.close_connection(fd);
                return;
            }
            Err(e) => {
                log::warn!("read error on fd={fd}: {e}");
                self.close_connection(fd);
                return;
            }
        }

        self.timeouts.touch(fd);
        self.try_parse_and_route(fd);
    }

    fn try_parse_and_route(&mut self, fd: RawFd) {
        let port = match self.connections.get(&fd) {
            Some(conn) => conn.listening_port(),
            None => return,
        };

        let parsed = match self.connections.get(&fd) {
            Some(conn) => parse::parse(conn.buffered()),
            None => return,
        };

        match parsed {
            Ok(ParseOutcome::NeedMore) => {}
            Ok(ParseOutcome::Complete(request)) => {
                if let Some(conn) = self.connections.get_mut(&fd) {
                    conn.clear_read_buffer();
                    conn.set_state(ConnState::Routing);
                }
                let is_directory = |p: &str| Path::new(p).is_dir();
                let decision = router::route(&self.config, &request, port, is_directory);
                let method = request.method;
                let response = self.handle_decision(&decision, &request);
                self.finish_response(fd, response, decision.status, &decision, method);
            }
            Err(status) => {
                let response = Response::error(status, "request could not be parsed");
                if let Some(conn) = self.connections.get_mut(&fd) {
                    conn.queue_response(response.to_bytes());
                }
                self.poll.add(fd, libc::POLLOUT);
                log::warn!("fd={fd} rejected with status {status}");
            }
        }
    }

    fn handle_decision(&self, decision: &RouteDecision, request: &crate::http::request::Request) -> Response {
        if let Some(message) = &decision.error_message {
            return self.error_response(decision, decision.status, message);
        }

        let server = &self.config.servers[decision.server_index];
        let location = &server.locations[decision.location_index];

        match &decision.mode {
            RouteMode::Static => {
                let root = location.effective_root(server);
                let indexes = location.effective_indexes(server);
                static_files::serve(Path::new(&decision.resolved_path), root, indexes)
            }
            RouteMode::DirectoryListing => {
                let listing = DirectoryListing::default();
                match listing.generate_listing(Path::new(&decision.resolved_path), &request.path) {
                    Ok(html) => {
                        let mut response = Response::ok();
                        response.set_header("Content-Type", "text/html; charset=utf-8");
                        response.set_body(html.into_bytes());
                        response
                    }
                    Err(e) => self.error_response(decision, 500, &e.to_string()),
                }
            }
            RouteMode::Redirect(status, url) => {
                let mut response = Response::new(*status);
                response.set_header("Location", url);
                response.set_body(Vec::new());
                response
            }
            RouteMode::Cgi(interpreter) => {
                let root = location.effective_root(server);
                let server_name = server.server_names.first().map(String::as_str).unwrap_or("localhost");
                match cgi::execute(interpreter, Path::new(&decision.resolved_path), request, root, server_name, request.port) {
                    Ok(response) => response,
                    Err(e) => self.error_response(decision, 502, &format!("CGI execution failed: {e}")),
                }
            }
            RouteMode::Upload(upload_dir) => upload::handle(upload_dir, request),
        }
    }

    fn error_response(&self, decision: &RouteDecision, status: u16, message: &str) -> Response {
        let server = match self.config.servers.get(decision.server_index) {
            Some(server) => server,
            None => return Response::error(status, message),
        };

        let config = ErrorPageConfig {
            custom_pages: server.error_pages.clone(),
            error_dir: None,
            show_details: false,
            server_name: server.server_names.first().cloned().unwrap_or_else(|| "webserv".to_string()),
        };
        ErrorPageGenerator::new(config).generate_error_response(status, Some(message), None)
    }

    fn finish_response(
        &mut self,
        fd: RawFd,
        mut response: Response,
        status: u16,
        decision: &RouteDecision,
        method: crate::http::request::Method,
    ) {
        if method == crate::http::request::Method::HEAD {
            response.body.clear();
        }

        let byte_count = response.body.len();
        log::info!(
            "{method:?} {path} -> {status} ({byte_count} bytes)",
            method = method,
            path = decision.matched_path,
        );

        if let Some(conn) = self.connections.get_mut(&fd) {
            conn.queue_response(response.to_bytes());
        }
        self.poll.add(fd, libc::POLLOUT);
    }

    fn drive_write(&mut self, fd: RawFd) {
        let done = match self.connections.get_mut(&fd) {
            Some(conn) => conn.flush(),
            None => return,
        };

        match done {
            Ok(true) => {
                self.timeouts.touch(fd);
                self.close_connection(fd);
            }
            Ok(false) => {
                self.timeouts.touch(fd);
            }
            Err(e) => {
                log::warn!("write error on fd={fd}: {e}");
                self.close_connection(fd);
            }
        }
    }

    fn close_connection(&mut self, fd: RawFd) {
        self.connections.remove(&fd);
        self.timeouts.untrack(fd);
        self.poll.remove(fd);
    }
}
