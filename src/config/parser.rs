use std::collections::HashMap;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use crate::config::error::{ConfigError, ConfigResult};
use crate::config::model::{
    AutoIndex, HttpConfig, LocationBlock, Redirect, ServerBlock, DEFAULT_CLIENT_MAX_BODY_SIZE,
};
use crate::config::size::parse_size;
use crate::http::request::Method;

#[derive(Debug, Clone)]
enum Token {
    Open(Vec<String>),
    Close,
    Directive(Vec<String>),
}

/// Parses a config file at `path` into a fully validated, defaulted `HttpConfig`.
pub fn parse_file<P: AsRef<Path>>(path: P) -> ConfigResult<HttpConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_str(&content)
}

/// Parses config source text directly; exposed mainly for tests.
pub fn parse_str(content: &str) -> ConfigResult<HttpConfig> {
    let tokens = tokenize(content)?;
    let mut pos = 0;
    let http_tokens = expect_single_http_block(&tokens, &mut pos)?;

    let mut inner_pos = 0;
    let mut config = parse_http_scope(http_tokens, &mut inner_pos)?;
    apply_defaults(&mut config);
    validate_roots(&config)?;
    Ok(config)
}

/// Every location must resolve a root, own or inherited, once defaulting
/// has run; a location with neither is a configuration error, not a
/// deferred runtime panic.
fn validate_roots(config: &HttpConfig) -> ConfigResult<()> {
    for server in &config.servers {
        for location in &server.locations {
            if location.root.is_none() && server.root.is_none() {
                return Err(ConfigError::MissingRoot {
                    path: location.path.clone(),
                });
            }
        }
    }
    Ok(())
}

fn strip_comments(content: &str) -> String {
    content
        .lines()
        .map(|line| match line.find('#') {
            Some(i) => &line[..i],
            None => line,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn tokenize(content: &str) -> ConfigResult<Vec<Token>> {
    let content = strip_comments(content);
    let mut tokens = Vec::new();
    let mut buf = String::new();

    for ch in content.chars() {
        match ch {
            '{' => {
                let words: Vec<String> = buf.split_whitespace().map(str::to_string).collect();
                tokens.push(Token::Open(words));
                buf.clear();
            }
            '}' => {
                if !buf.trim().is_empty() {
                    return Err(ConfigError::MalformedStatement {
                        text: buf.trim().to_string(),
                    });
                }
                tokens.push(Token::Close);
                buf.clear();
            }
            ';' => {
                let words: Vec<String> = buf.split_whitespace().map(str::to_string).collect();
                if !words.is_empty() {
                    tokens.push(Token::Directive(words));
                }
                buf.clear();
            }
            _ => buf.push(ch),
        }
    }

    if !buf.trim().is_empty() {
        return Err(ConfigError::MalformedStatement {
            text: buf.trim().to_string(),
        });
    }

    Ok(tokens)
}

/// Consumes the single top-level `http { ... }` block and returns the tokens
/// strictly inside it (the matching `Close` is not included).
fn expect_single_http_block<'a>(
    tokens: &'a [Token],
    pos: &mut usize,
) -> ConfigResult<&'a [Token]> {
    let open = tokens.get(*pos).ok_or(ConfigError::MissingHttpBlock)?;
    match open {
        Token::Open(words) if words.first().map(String::as_str) == Some("http") => {
            *pos += 1;
        }
        _ => return Err(ConfigError::MissingHttpBlock),
    }

    let start = *pos;
    let mut depth = 1;
    while *pos < tokens.len() {
        match &tokens[*pos] {
            Token::Open(_) => depth += 1,
            Token::Close => {
                depth -= 1;
                if depth == 0 {
                    let inner = &tokens[start..*pos];
                    *pos += 1;
                    if *pos != tokens.len() {
                        return Err(ConfigError::MultipleHttpBlocks);
                    }
                    return Ok(inner);
                }
            }
            Token::Directive(_) => {}
        }
        *pos += 1;
    }
    Err(ConfigError::UnclosedScope)
}

/// Finds the matching `Close` for the scope opened just before `start`,
/// returning the inner token slice and the index just past the `Close`.
fn scope_body(tokens: &[Token], start: usize) -> ConfigResult<(&[Token], usize)> {
    let mut depth = 1;
    let mut i = start;
    while i < tokens.len() {
        match &tokens[i] {
            Token::Open(_) => depth += 1,
            Token::Close => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&tokens[start..i], i + 1));
                }
            }
            Token::Directive(_) => {}
        }
        i += 1;
    }
    Err(ConfigError::UnclosedScope)
}

fn parse_http_scope(tokens: &[Token], pos: &mut usize) -> ConfigResult<HttpConfig> {
    let mut client_max_body_size = None;
    let mut client_max_body_size_seen = false;
    let mut servers = Vec::new();

    while *pos < tokens.len() {
        match &tokens[*pos] {
            Token::Directive(words) => {
                let directive = words[0].as_str();
                match directive {
                    "client_max_body_size" => {
                        if client_max_body_size_seen {
                            return Err(ConfigError::DuplicateDirective {
                                scope: "http",
                                directive: directive.to_string(),
                            });
                        }
                        client_max_body_size_seen = true;
                        client_max_body_size = Some(parse_size_arg(words, directive)?);
                    }
                    other => {
                        return Err(ConfigError::UnknownDirective {
                            scope: "http",
                            directive: other.to_string(),
                        })
                    }
                }
                *pos += 1;
            }
            Token::Open(words) if words.first().map(String::as_str) == Some("server") => {
                *pos += 1;
                let (inner, next) = scope_body(tokens, *pos)?;
                let mut inner_pos = 0;
                servers.push(parse_server_scope(inner, &mut inner_pos)?);
                *pos = next;
            }
            Token::Open(words) => {
                return Err(ConfigError::UnknownDirective {
                    scope: "http",
                    directive: words.first().cloned().unwrap_or_default(),
                })
            }
            Token::Close => return Err(ConfigError::UnmatchedClose),
        }
    }

    if servers.is_empty() {
        return Err(ConfigError::NoServers);
    }

    Ok(HttpConfig {
        client_max_body_size,
        servers,
    })
}

fn parse_server_scope(tokens: &[Token], pos: &mut usize) -> ConfigResult<ServerBlock> {
    let mut listen: Vec<(IpAddr, u16)> = Vec::new();
    let mut server_names = Vec::new();
    let mut root: Option<PathBuf> = None;
    let mut root_seen = false;
    let mut indexes = Vec::new();
    let mut client_max_body_size = None;
    let mut client_max_body_size_seen = false;
    let mut error_pages = HashMap::new();
    let mut locations = Vec::new();

    while *pos < tokens.len() {
        match &tokens[*pos] {
            Token::Directive(words) => {
                let directive = words[0].as_str();
                match directive {
                    "listen" => {
                        let value = require_single_arg(words, directive)?;
                        let (iface, port) = parse_listen(value)?;
                        if listen.iter().any(|(i, p)| *i == iface && *p == port) {
                            return Err(ConfigError::DuplicateListen {
                                interface: iface.to_string(),
                                port,
                            });
                        }
                        listen.push((iface, port));
                    }
                    "server_name" => server_names.extend(words[1..].iter().cloned()),
                    "root" => {
                        if root_seen {
                            return Err(ConfigError::DuplicateDirective {
                                scope: "server",
                                directive: directive.to_string(),
                            });
                        }
                        root_seen = true;
                        root = Some(strip_trailing_slash(require_single_arg(words, directive)?));
                    }
                    "index" => indexes.extend(words[1..].iter().cloned()),
                    "client_max_body_size" => {
                        if client_max_body_size_seen {
                            return Err(ConfigError::DuplicateDirective {
                                scope: "server",
                                directive: directive.to_string(),
                            });
                        }
                        client_max_body_size_seen = true;
                        client_max_body_size = Some(parse_size_arg(words, directive)?);
                    }
                    "error_page" => {
                        let (codes, path) = parse_error_page(words)?;
                        for code in codes {
                            error_pages.insert(code, path.clone());
                        }
                    }
                    other => {
                        return Err(ConfigError::UnknownDirective {
                            scope: "server",
                            directive: other.to_string(),
                        })
                    }
                }
                *pos += 1;
            }
            Token::Open(words) if words.first().map(String::as_str) == Some("location") => {
                let path = words.get(1).cloned().ok_or_else(|| ConfigError::MissingArgument {
                    directive: "location".to_string(),
                })?;
                if !path.starts_with('/') {
                    return Err(ConfigError::InvalidLocationPath { value: path });
                }
                if locations.iter().any(|l: &LocationBlock| l.path == path) {
                    return Err(ConfigError::DuplicatePath { path });
                }
                *pos += 1;
                let (inner, next) = scope_body(tokens, *pos)?;
                let mut inner_pos = 0;
                locations.push(parse_location_scope(inner, &mut inner_pos, path)?);
                *pos = next;
            }
            Token::Open(words) => {
                return Err(ConfigError::UnknownDirective {
                    scope: "server",
                    directive: words.first().cloned().unwrap_or_default(),
                })
            }
            Token::Close => return Err(ConfigError::UnmatchedClose),
        }
    }

    if listen.is_empty() {
        return Err(ConfigError::MissingListen);
    }
    if locations.is_empty() {
        return Err(ConfigError::NoLocations);
    }
    if indexes.is_empty() {
        indexes.push("index.html".to_string());
    }

    Ok(ServerBlock {
        listen,
        server_names,
        root,
        indexes,
        client_max_body_size,
        error_pages,
        locations,
    })
}

fn parse_location_scope(
    tokens: &[Token],
    pos: &mut usize,
    path: String,
) -> ConfigResult<LocationBlock> {
    let mut root: Option<PathBuf> = None;
    let mut root_seen = false;
    let mut autoindex = AutoIndex::Unset;
    let mut autoindex_seen = false;
    let mut indexes = Vec::new();
    let mut upload_dir = None;
    let mut cgi_pass = HashMap::new();
    let mut redirect = None;
    let mut client_max_body_size = None;
    let mut client_max_body_size_seen = false;
    let mut allowed_methods: Vec<Method> = Vec::new();

    while *pos < tokens.len() {
        match &tokens[*pos] {
            Token::Directive(words) => {
                let directive = words[0].as_str();
                match directive {
                    "root" => {
                        if root_seen {
                            return Err(ConfigError::DuplicateDirective {
                                scope: "location",
                                directive: directive.to_string(),
                            });
                        }
                        root_seen = true;
                        root = Some(strip_trailing_slash(require_single_arg(words, directive)?));
                    }
                    "autoindex" => {
                        if autoindex_seen {
                            return Err(ConfigError::DuplicateDirective {
                                scope: "location",
                                directive: directive.to_string(),
                            });
                        }
                        autoindex_seen = true;
                        let value = require_single_arg(words, directive)?;
                        autoindex = match value {
                            "on" => AutoIndex::On,
                            "off" => AutoIndex::Off,
                            other => {
                                return Err(ConfigError::InvalidAutoindexValue {
                                    value: other.to_string(),
                                })
                            }
                        };
                    }
                    "index" => indexes.extend(words[1..].iter().cloned()),
                    "client_max_body_size" => {
                        if client_max_body_size_seen {
                            return Err(ConfigError::DuplicateDirective {
                                scope: "location",
                                directive: directive.to_string(),
                            });
                        }
                        client_max_body_size_seen = true;
                        client_max_body_size = Some(parse_size_arg(words, directive)?);
                    }
                    "methods" => {
                        for token in &words[1..] {
                            let method = Method::from_token(&token.to_ascii_uppercase())
                                .ok_or_else(|| ConfigError::UnknownMethod {
                                    value: token.clone(),
                                })?;
                            if !allowed_methods.contains(&method) {
                                allowed_methods.push(method);
                            }
                        }
                    }
                    "return" => redirect = Some(parse_return(words)?),
                    "cgi_pass" => {
                        let value = require_single_arg(words, directive)?;
                        let (ext, interpreter) = parse_cgi_pass(value)?;
                        cgi_pass.insert(ext, interpreter);
                    }
                    "upload_dir" => {
                        let value = require_single_arg(words, directive)?;
                        let dir = PathBuf::from(value);
                        if !dir.is_absolute() {
                            return Err(ConfigError::UploadDirNotAbsolute {
                                value: value.to_string(),
                            });
                        }
                        upload_dir = Some(dir);
                    }
                    other => {
                        return Err(ConfigError::UnknownDirective {
                            scope: "location",
                            directive: other.to_string(),
                        })
                    }
                }
                *pos += 1;
            }
            Token::Open(words) => {
                return Err(ConfigError::UnknownDirective {
                    scope: "location",
                    directive: words.first().cloned().unwrap_or_default(),
                })
            }
            Token::Close => return Err(ConfigError::UnmatchedClose),
        }
    }

    if allowed_methods.is_empty() {
        allowed_methods.push(Method::GET);
    }

    Ok(LocationBlock {
        path,
        root,
        autoindex,
        indexes,
        upload_dir,
        cgi_pass,
        redirect,
        client_max_body_size,
        allowed_methods,
    })
}

fn require_single_arg<'a>(words: &'a [String], directive: &str) -> ConfigResult<&'a str> {
    words
        .get(1)
        .map(String::as_str)
        .ok_or_else(|| ConfigError::MissingArgument {
            directive: directive.to_string(),
        })
}

fn parse_size_arg(words: &[String], directive: &str) -> ConfigResult<u64> {
    let value = require_single_arg(words, directive)?;
    parse_size(value).ok_or_else(|| ConfigError::InvalidSize {
        value: value.to_string(),
    })
}

fn parse_listen(value: &str) -> ConfigResult<(IpAddr, u16)> {
    let (iface, port) = value.split_once(':').ok_or_else(|| ConfigError::InvalidListen {
        value: value.to_string(),
    })?;
    let iface: IpAddr = iface.parse().map_err(|_| ConfigError::InvalidListen {
        value: value.to_string(),
    })?;
    let port: u16 = port.parse().map_err(|_| ConfigError::ListenPortOutOfRange {
        value: value.to_string(),
    })?;
    if port == 0 {
        return Err(ConfigError::ListenPortOutOfRange {
            value: value.to_string(),
        });
    }
    Ok((iface, port))
}

fn parse_error_page(words: &[String]) -> ConfigResult<(Vec<u16>, PathBuf)> {
    if words.len() < 3 {
        return Err(ConfigError::MissingArgument {
            directive: "error_page".to_string(),
        });
    }
    let path = PathBuf::from(words.last().unwrap());
    let mut codes = Vec::new();
    for code_str in &words[1..words.len() - 1] {
        let code: u16 = code_str.parse().map_err(|_| ConfigError::InvalidErrorPageStatus {
            value: code_str.clone(),
        })?;
        if !(100..=599).contains(&code) {
            return Err(ConfigError::InvalidErrorPageStatus {
                value: code_str.clone(),
            });
        }
        codes.push(code);
    }
    Ok((codes, path))
}

fn parse_cgi_pass(value: &str) -> ConfigResult<(String, PathBuf)> {
    let (ext, interpreter) = value.split_once(':').ok_or_else(|| ConfigError::MalformedCgiPass {
        value: value.to_string(),
    })?;
    if !ext.starts_with('.') {
        return Err(ConfigError::CgiExtensionMissingDot {
            value: ext.to_string(),
        });
    }
    let interpreter = PathBuf::from(interpreter);
    if !interpreter.is_absolute() {
        return Err(ConfigError::CgiInterpreterNotAbsolute {
            value: interpreter.to_string_lossy().to_string(),
        });
    }
    Ok((ext.to_string(), interpreter))
}

const VALID_REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];

fn parse_return(words: &[String]) -> ConfigResult<Redirect> {
    match words.len() {
        2 => {
            let url = words[1].clone();
            if !url.starts_with('/') {
                return Err(ConfigError::InvalidRedirectUrl { value: url });
            }
            Ok(Redirect { status: 302, url })
        }
        3 => {
            let status: u16 = words[1].parse().map_err(|_| ConfigError::InvalidRedirectStatus {
                status: 0,
            })?;
            if !VALID_REDIRECT_STATUSES.contains(&status) {
                return Err(ConfigError::InvalidRedirectStatus { status });
            }
            let url = words[2].clone();
            if !url.starts_with('/') {
                return Err(ConfigError::InvalidRedirectUrl { value: url });
            }
            Ok(Redirect { status, url })
        }
        _ => Err(ConfigError::MissingArgument {
            directive: "return".to_string(),
        }),
    }
}

fn strip_trailing_slash(value: &str) -> PathBuf {
    if value.len() > 1 {
        PathBuf::from(value.trim_end_matches('/'))
    } else {
        PathBuf::from(value)
    }
}

fn apply_defaults(config: &mut HttpConfig) {
    let http_default = config
        .client_max_body_size
        .unwrap_or(DEFAULT_CLIENT_MAX_BODY_SIZE);

    for server in &mut config.servers {
        let server_default = server.client_max_body_size.unwrap_or(http_default);
        server.client_max_body_size = Some(server_default);
        for location in &mut server.locations {
            if location.client_max_body_size.is_none() {
                location.client_max_body_size = Some(server_default);
            }
            if location.indexes.is_empty() {
                location.indexes = server.indexes.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> &'static str {
        "http {\n  server {\n    listen 127.0.0.1:8080;\n    root /var/www;\n    location / {\n      methods GET;\n    }\n  }\n}\n"
    }

    #[test]
    fn parses_minimal_config() {
        let config = parse_str(minimal()).unwrap();
        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.servers[0].listen, vec![("127.0.0.1".parse().unwrap(), 8080)]);
        assert_eq!(config.servers[0].locations[0].path, "/");
    }

    #[test]
    fn comments_are_stripped() {
        let src = "http { # top comment\n  server {\n    listen 127.0.0.1:80; # listener\n    root /var/www;\n    location / { methods GET; }\n  }\n}\n";
        assert!(parse_str(src).is_ok());
    }

    #[test]
    fn rejects_second_http_block() {
        let src = "http { server { listen 127.0.0.1:80; root /a; location / {} } }\nhttp { server { listen 127.0.0.1:81; root /a; location / {} } }\n";
        assert!(matches!(parse_str(src), Err(ConfigError::MultipleHttpBlocks)));
    }

    #[test]
    fn rejects_missing_closing_brace() {
        let src = "http { server { listen 127.0.0.1:80; root /a; location / { methods GET; }\n";
        assert!(matches!(parse_str(src), Err(ConfigError::UnclosedScope)));
    }

    #[test]
    fn rejects_invalid_listen_port() {
        let src = "http { server { listen 127.0.0.1:notaport; root /a; location / { methods GET; } } }\n";
        assert!(matches!(parse_str(src), Err(ConfigError::ListenPortOutOfRange { .. })));
    }

    #[test]
    fn rejects_duplicate_listen_pair() {
        let src = "http { server { listen 127.0.0.1:80; listen 127.0.0.1:80; root /a; location / { methods GET; } } }\n";
        assert!(matches!(parse_str(src), Err(ConfigError::DuplicateListen { .. })));
    }

    #[test]
    fn rejects_duplicate_location_path() {
        let src = "http { server { listen 127.0.0.1:80; root /a; location / { methods GET; } location / { methods POST; } } }\n";
        assert!(matches!(parse_str(src), Err(ConfigError::DuplicatePath { .. })));
    }

    #[test]
    fn rejects_cgi_pass_without_leading_dot() {
        let src = "http { server { listen 127.0.0.1:80; root /a; location / { methods GET; cgi_pass py:/usr/bin/python3; } } }\n";
        assert!(matches!(parse_str(src), Err(ConfigError::CgiExtensionMissingDot { .. })));
    }

    #[test]
    fn rejects_relative_cgi_interpreter() {
        let src = "http { server { listen 127.0.0.1:80; root /a; location / { methods GET; cgi_pass .py:python3; } } }\n";
        assert!(matches!(parse_str(src), Err(ConfigError::CgiInterpreterNotAbsolute { .. })));
    }

    #[test]
    fn rejects_relative_upload_dir() {
        let src = "http { server { listen 127.0.0.1:80; root /a; location / { methods POST; upload_dir uploads; } } }\n";
        assert!(matches!(parse_str(src), Err(ConfigError::UploadDirNotAbsolute { .. })));
    }

    #[test]
    fn rejects_unknown_redirect_status() {
        let src = "http { server { listen 127.0.0.1:80; root /a; location / { return 201 /new; } } }\n";
        assert!(matches!(parse_str(src), Err(ConfigError::InvalidRedirectStatus { .. })));
    }

    #[test]
    fn return_without_status_defaults_to_302() {
        let src = "http { server { listen 127.0.0.1:80; root /a; location /old { return /new; } } }\n";
        let config = parse_str(src).unwrap();
        let redirect = config.servers[0].locations[0].redirect.clone().unwrap();
        assert_eq!(redirect.status, 302);
        assert_eq!(redirect.url, "/new");
    }

    #[test]
    fn rejects_unknown_method() {
        let src = "http { server { listen 127.0.0.1:80; root /a; location / { methods FETCH; } } }\n";
        assert!(matches!(parse_str(src), Err(ConfigError::UnknownMethod { .. })));
    }

    #[test]
    fn missing_root_everywhere_is_rejected_at_parse_time() {
        let src = "http { server { listen 127.0.0.1:80; location / { methods GET; } } }\n";
        assert!(matches!(
            parse_str(src),
            Err(ConfigError::MissingRoot { path }) if path == "/"
        ));
    }

    #[test]
    fn root_inherited_from_server_satisfies_the_location() {
        let src = "http { server { listen 127.0.0.1:80; root /a; location / { methods GET; } } }\n";
        assert!(parse_str(src).is_ok());
    }

    #[test]
    fn root_set_only_on_location_satisfies_the_server() {
        let src = "http { server { listen 127.0.0.1:80; location / { root /a; methods GET; } } }\n";
        assert!(parse_str(src).is_ok());
    }

    #[test]
    fn client_max_body_size_cascades_from_http_to_location() {
        let src = "http { client_max_body_size 2M; server { listen 127.0.0.1:80; root /a; location / { methods GET; } } }\n";
        let config = parse_str(src).unwrap();
        assert_eq!(
            config.servers[0].locations[0].client_max_body_size,
            Some(2 * 1024 * 1024)
        );
    }

    #[test]
    fn location_level_body_size_overrides_cascade() {
        let src = "http { client_max_body_size 2M; server { listen 127.0.0.1:80; root /a; location / { methods GET; client_max_body_size 10K; } } }\n";
        let config = parse_str(src).unwrap();
        assert_eq!(config.servers[0].locations[0].client_max_body_size, Some(10 * 1024));
    }

    #[test]
    fn unset_body_size_defaults_to_one_mebibyte() {
        let config = parse_str(minimal()).unwrap();
        assert_eq!(
            config.servers[0].locations[0].client_max_body_size,
            Some(DEFAULT_CLIENT_MAX_BODY_SIZE)
        );
    }

    #[test]
    fn trailing_slash_on_root_is_stripped() {
        let src = "http { server { listen 127.0.0.1:80; root /var/www/; location / { methods GET; } } }\n";
        let config = parse_str(src).unwrap();
        assert_eq!(config.servers[0].root, Some(PathBuf::from("/var/www")));
    }

    #[test]
    fn duplicate_directive_in_same_scope_is_rejected() {
        let src = "http { server { listen 127.0.0.1:80; root /a; root /b; location / { methods GET; } } }\n";
        assert!(matches!(
            parse_str(src),
            Err(ConfigError::DuplicateDirective { .. })
        ));
    }

    #[test]
    fn empty_methods_defaults_to_get() {
        let src = "http { server { listen 127.0.0.1:80; root /a; location / {} } }\n";
        let config = parse_str(src).unwrap();
        assert_eq!(config.servers[0].locations[0].allowed_methods, vec![Method::GET]);
    }
}
