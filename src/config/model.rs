use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;

/// HTTP method recognised anywhere in a location's `methods` directive.
pub use crate::http::request::Method;

/// Tri-state directive: explicitly set, or left to its default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoIndex {
    On,
    Off,
    #[default]
    Unset,
}

impl AutoIndex {
    pub fn is_on(self) -> bool {
        matches!(self, AutoIndex::On)
    }
}

/// A redirect target attached to a location via `return`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub status: u16,
    pub url: String,
}

/// The top-level configuration tree produced by the Config Parser.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Default body-size ceiling for servers that don't set their own.
    pub client_max_body_size: Option<u64>,
    pub servers: Vec<ServerBlock>,
}

/// One `server { }` block.
#[derive(Debug, Clone)]
pub struct ServerBlock {
    /// `(interface, port)` pairs this server listens on.
    pub listen: Vec<(IpAddr, u16)>,
    pub server_names: Vec<String>,
    pub root: Option<PathBuf>,
    pub indexes: Vec<String>,
    pub client_max_body_size: Option<u64>,
    /// status code -> path to a custom error page.
    pub error_pages: HashMap<u16, PathBuf>,
    pub locations: Vec<LocationBlock>,
}

impl ServerBlock {
    pub fn listens_on(&self, port: u16) -> bool {
        self.listen.iter().any(|(_, p)| *p == port)
    }

    pub fn matches_host(&self, host: &str) -> bool {
        self.server_names.iter().any(|name| name == host)
    }
}

/// One `location { }` block nested inside a server.
#[derive(Debug, Clone)]
pub struct LocationBlock {
    pub path: String,
    pub root: Option<PathBuf>,
    pub autoindex: AutoIndex,
    pub indexes: Vec<String>,
    pub upload_dir: Option<PathBuf>,
    /// file extension (leading dot) -> absolute interpreter path.
    pub cgi_pass: HashMap<String, PathBuf>,
    pub redirect: Option<Redirect>,
    pub client_max_body_size: Option<u64>,
    pub allowed_methods: Vec<Method>,
}

impl LocationBlock {
    pub fn allows(&self, method: Method) -> bool {
        self.allowed_methods.contains(&method)
    }

    /// Effective root after inheriting from the owning server; panics if
    /// neither is set, which the defaulting pass guarantees can't happen
    /// on a validated config.
    pub fn effective_root<'a>(&'a self, server: &'a ServerBlock) -> &'a PathBuf {
        self.root.as_ref().or(server.root.as_ref()).expect(
            "config defaulting guarantees every location has a root by the time it is routed",
        )
    }

    pub fn effective_indexes<'a>(&'a self, server: &'a ServerBlock) -> &'a [String] {
        if self.indexes.is_empty() {
            &server.indexes
        } else {
            &self.indexes
        }
    }

    pub fn effective_max_body_size(&self, server: &ServerBlock, http: &HttpConfig) -> u64 {
        self.client_max_body_size
            .or(server.client_max_body_size)
            .or(http.client_max_body_size)
            .unwrap_or(DEFAULT_CLIENT_MAX_BODY_SIZE)
    }

    pub fn cgi_interpreter_for(&self, resolved_path: &str) -> Option<&PathBuf> {
        let ext = resolved_path.rsplit_once('.').map(|(_, ext)| ext)?;
        self.cgi_pass.get(&format!(".{ext}"))
    }
}

/// 1 MiB, the HTTP block's default when no `client_max_body_size` is set anywhere.
pub const DEFAULT_CLIENT_MAX_BODY_SIZE: u64 = 1024 * 1024;
