use std::path::{Path, PathBuf};

use crate::config::model::{HttpConfig, LocationBlock, ServerBlock};
use crate::http::request::{Method, Request};
use crate::routing::location;
use crate::util::normalize_path;

/// How a `RouteDecision` should be carried out by the (external) handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteMode {
    Static,
    DirectoryListing,
    Redirect(u16, String),
    Cgi(PathBuf),
    Upload(PathBuf),
}

/// Everything the multiplexer needs to dispatch a parsed request, as a
/// self-contained value: no trait objects, no callbacks back into the
/// router. `server_index`/`location_index` point into the `HttpConfig`
/// that produced this decision.
#[derive(Debug, Clone)]
pub struct RouteDecision {
    pub server_index: usize,
    pub location_index: usize,
    pub resolved_path: String,
    pub matched_path: String,
    pub remaining_path: String,
    pub mode: RouteMode,
    pub status: u16,
    pub error_message: Option<String>,
}

impl RouteDecision {
    fn error(status: u16, message: &str) -> Self {
        RouteDecision {
            server_index: 0,
            location_index: 0,
            resolved_path: String::new(),
            matched_path: String::new(),
            remaining_path: String::new(),
            mode: RouteMode::Static,
            status,
            error_message: Some(message.to_string()),
        }
    }
}

/// Routes one request, in-memory only: server selection, location
/// selection, policy checks, path resolution, mode selection.
///
/// `is_directory` lets callers decide how the "does resolved_path name a
/// directory" check is performed; production code passes something
/// backed by `std::fs::metadata`, tests can stub it out.
pub fn route(
    config: &HttpConfig,
    request: &Request,
    port: u16,
    is_directory: impl Fn(&str) -> bool,
) -> RouteDecision {
    let server_index = match select_server(config, request.host.as_str(), port) {
        Some(idx) => idx,
        None => return RouteDecision::error(500, "No server configured for this port"),
    };
    let server = &config.servers[server_index];

    let uri = normalize_path(&request.path);
    let location_index = match location::best_match(
        server.locations.iter().map(|l| l.path.as_str()),
        &uri,
    ) {
        Some(idx) => idx,
        None => return RouteDecision::error(404, "No location matches this URI"),
    };
    let loc = &server.locations[location_index];

    if let Some(redirect) = &loc.redirect {
        return RouteDecision {
            server_index,
            location_index,
            resolved_path: String::new(),
            matched_path: loc.path.clone(),
            remaining_path: remaining(&loc.path, &uri),
            mode: RouteMode::Redirect(redirect.status, redirect.url.clone()),
            status: redirect.status,
            error_message: None,
        };
    }

    if !loc.allows(request.method) {
        return RouteDecision::error(405, "Method not allowed at this location");
    }

    if request.content_length > 0 {
        let limit = loc.effective_max_body_size(server, config);
        if request.content_length as u64 > limit {
            return RouteDecision::error(413, "Body exceeds this location's size limit");
        }
    }

    let resolved_path = resolve_path(loc, server, &uri);
    let mode = select_mode(loc, request.method, &resolved_path, &is_directory);

    RouteDecision {
        server_index,
        location_index,
        resolved_path,
        matched_path: loc.path.clone(),
        remaining_path: remaining(&loc.path, &uri),
        mode,
        status: 200,
        error_message: None,
    }
}

fn select_server(config: &HttpConfig, host: &str, port: u16) -> Option<usize> {
    let candidates: Vec<usize> = config
        .servers
        .iter()
        .enumerate()
        .filter(|(_, s)| s.listens_on(port))
        .map(|(idx, _)| idx)
        .collect();

    candidates
        .iter()
        .copied()
        .find(|&idx| config.servers[idx].matches_host(host))
        .or_else(|| candidates.first().copied())
}

fn remaining(location_path: &str, uri: &str) -> String {
    if uri == location_path {
        String::new()
    } else {
        uri.strip_prefix(location_path).unwrap_or("").to_string()
    }
}

fn resolve_path(loc: &LocationBlock, server: &ServerBlock, uri: &str) -> String {
    let root = loc.effective_root(server);
    let root = root.to_string_lossy();
    let root = root.trim_end_matches('/');

    if loc.path == "/" {
        format!("{root}{uri}")
    } else if uri == loc.path {
        root.to_string()
    } else {
        let suffix = uri.strip_prefix(&loc.path).unwrap_or("");
        let suffix = if suffix.starts_with('/') {
            suffix.to_string()
        } else {
            format!("/{suffix}")
        };
        format!("{root}{suffix}")
    }
}

fn select_mode(
    loc: &LocationBlock,
    method: Method,
    resolved_path: &str,
    is_directory: &impl Fn(&str) -> bool,
) -> RouteMode {
    if let Some(interpreter) = loc.cgi_interpreter_for(resolved_path) {
        return RouteMode::Cgi(interpreter.clone());
    }
    if method == Method::POST {
        if let Some(upload_dir) = &loc.upload_dir {
            return RouteMode::Upload(upload_dir.clone());
        }
    }
    if is_directory(resolved_path) && loc.autoindex.is_on() {
        return RouteMode::DirectoryListing;
    }
    RouteMode::Static
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::{AutoIndex, Redirect};
    use std::collections::HashMap;

    fn location(path: &str) -> LocationBlock {
        LocationBlock {
            path: path.to_string(),
            root: None,
            autoindex: AutoIndex::Unset,
            indexes: vec![],
            upload_dir: None,
            cgi_pass: HashMap::new(),
            redirect: None,
            client_max_body_size: None,
            allowed_methods: vec![Method::GET, Method::HEAD],
        }
    }

    fn server(locations: Vec<LocationBlock>) -> ServerBlock {
        ServerBlock {
            listen: vec![("127.0.0.1".parse().unwrap(), 8080)],
            server_names: vec!["example.com".to_string()],
            root: Some(PathBuf::from("/var/www")),
            indexes: vec!["index.html".to_string()],
            client_max_body_size: None,
            error_pages: HashMap::new(),
            locations,
        }
    }

    fn config(servers: Vec<ServerBlock>) -> HttpConfig {
        HttpConfig {
            client_max_body_size: None,
            servers,
        }
    }

    fn request(method: Method, path: &str) -> Request {
        Request {
            method,
            path: path.to_string(),
            query: String::new(),
            fragment: String::new(),
            version: "HTTP/1.1".to_string(),
            headers: HashMap::new(),
            cookies: HashMap::new(),
            body: Vec::new(),
            content_length: 0,
            host: "example.com".to_string(),
            port: 8080,
        }
    }

    fn never_a_directory(_: &str) -> bool {
        false
    }

    #[test]
    fn no_server_listens_on_port_is_500() {
        let cfg = config(vec![server(vec![location("/")])]);
        let req = request(Method::GET, "/");
        let decision = route(&cfg, &req, 9999, never_a_directory);
        assert_eq!(decision.status, 500);
    }

    #[test]
    fn unmatched_location_is_404() {
        let mut srv = server(vec![location("/api")]);
        srv.locations[0].root = Some(PathBuf::from("/var/www/api"));
        let cfg = config(vec![srv]);
        let req = request(Method::GET, "/elsewhere");
        let decision = route(&cfg, &req, 8080, never_a_directory);
        assert_eq!(decision.status, 404);
    }

    #[test]
    fn method_not_allowed_is_405() {
        let cfg = config(vec![server(vec![location("/")])]);
        let req = request(Method::DELETE, "/");
        let decision = route(&cfg, &req, 8080, never_a_directory);
        assert_eq!(decision.status, 405);
    }

    #[test]
    fn body_over_limit_is_413() {
        let mut loc = location("/upload");
        loc.root = Some(PathBuf::from("/var/www/upload"));
        loc.allowed_methods = vec![Method::POST];
        loc.client_max_body_size = Some(10);
        let cfg = config(vec![server(vec![loc])]);
        let mut req = request(Method::POST, "/upload/f");
        req.content_length = 20;
        let decision = route(&cfg, &req, 8080, never_a_directory);
        assert_eq!(decision.status, 413);
    }

    #[test]
    fn redirect_location_short_circuits_other_checks() {
        let mut loc = location("/old");
        loc.redirect = Some(Redirect {
            status: 301,
            url: "/new".to_string(),
        });
        loc.allowed_methods = vec![];
        let cfg = config(vec![server(vec![loc])]);
        let req = request(Method::GET, "/old");
        let decision = route(&cfg, &req, 8080, never_a_directory);
        assert_eq!(decision.status, 301);
        assert_eq!(decision.mode, RouteMode::Redirect(301, "/new".to_string()));
    }

    #[test]
    fn static_mode_resolves_path_under_root() {
        let mut loc = location("/images");
        loc.root = Some(PathBuf::from("/var/www/images"));
        let cfg = config(vec![server(vec![loc])]);
        let req = request(Method::GET, "/images/cat.jpg");
        let decision = route(&cfg, &req, 8080, never_a_directory);
        assert_eq!(decision.status, 200);
        assert_eq!(decision.mode, RouteMode::Static);
        assert_eq!(decision.resolved_path, "/var/www/images/cat.jpg");
        assert_eq!(decision.matched_path, "/images");
        assert_eq!(decision.remaining_path, "/cat.jpg");
    }

    #[test]
    fn root_location_appends_full_uri() {
        let cfg = config(vec![server(vec![location("/")])]);
        let req = request(Method::GET, "/index.html");
        let decision = route(&cfg, &req, 8080, never_a_directory);
        assert_eq!(decision.resolved_path, "/var/www/index.html");
    }

    #[test]
    fn cgi_extension_match_selects_cgi_mode() {
        let mut loc = location("/cgi-bin");
        loc.root = Some(PathBuf::from("/var/www/cgi-bin"));
        loc.cgi_pass.insert(".py".to_string(), PathBuf::from("/usr/bin/python3"));
        let cfg = config(vec![server(vec![loc])]);
        let req = request(Method::GET, "/cgi-bin/hello.py");
        let decision = route(&cfg, &req, 8080, never_a_directory);
        assert_eq!(decision.mode, RouteMode::Cgi(PathBuf::from("/usr/bin/python3")));
    }

    #[test]
    fn post_with_upload_dir_selects_upload_mode() {
        let mut loc = location("/upload");
        loc.root = Some(PathBuf::from("/var/www/upload"));
        loc.allowed_methods = vec![Method::POST];
        loc.upload_dir = Some(PathBuf::from("/var/uploads"));
        let cfg = config(vec![server(vec![loc])]);
        let req = request(Method::POST, "/upload");
        let decision = route(&cfg, &req, 8080, never_a_directory);
        assert_eq!(decision.mode, RouteMode::Upload(PathBuf::from("/var/uploads")));
    }

    #[test]
    fn directory_with_autoindex_on_selects_directory_listing() {
        let mut loc = location("/files");
        loc.root = Some(PathBuf::from("/var/www/files"));
        loc.autoindex = AutoIndex::On;
        let cfg = config(vec![server(vec![loc])]);
        let req = request(Method::GET, "/files");
        let decision = route(&cfg, &req, 8080, |_| true);
        assert_eq!(decision.mode, RouteMode::DirectoryListing);
    }

    #[test]
    fn host_header_selects_matching_server_over_default() {
        let mut default_srv = server(vec![location("/")]);
        default_srv.server_names = vec!["default.test".to_string()];
        let mut named_srv = server(vec![location("/")]);
        named_srv.server_names = vec!["named.test".to_string()];
        let cfg = config(vec![default_srv, named_srv]);

        let mut req = request(Method::GET, "/");
        req.host = "named.test".to_string();
        let decision = route(&cfg, &req, 8080, never_a_directory);
        assert_eq!(decision.server_index, 1);
    }
}
