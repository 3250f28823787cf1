use std::collections::HashMap;

use crate::http::request::{Method, Request};
use crate::util::normalize_path;

/// Largest request-target this server accepts, in bytes. Requests over this
/// are a 414 rather than being allowed to grow the read buffer unbounded.
const MAX_URI_LENGTH: usize = 8192;

/// Result of feeding another chunk of bytes to the parser.
pub enum ParseOutcome {
    /// The header terminator hasn't arrived yet, or the declared body is
    /// still incomplete. Caller should read more and try again.
    NeedMore,
    Complete(Request),
}

/// Attempts to parse one full request out of `buf`.
///
/// `buf` holds everything read from the client so far for the current
/// request; it is not consumed. On `Err`, the status code is what the
/// caller should send back before closing the connection.
pub fn parse(buf: &[u8]) -> Result<ParseOutcome, u16> {
    let header_end = match find_header_terminator(buf) {
        Some(i) => i,
        None => return Ok(ParseOutcome::NeedMore),
    };

    let header_bytes = &buf[..header_end];
    let body_available = &buf[header_end + 4..];

    let text = String::from_utf8_lossy(header_bytes);
    let mut lines = text.split("\r\n");

    let request_line = lines.next().unwrap_or("");
    let mut parts = request_line.split(' ').filter(|s| !s.is_empty());
    let (method_token, target, version) = match (parts.next(), parts.next(), parts.next()) {
        (Some(m), Some(t), Some(v)) if parts.next().is_none() => (m, t, v),
        _ => return Err(400),
    };

    let method = Method::from_token(&method_token.to_ascii_uppercase()).ok_or(501)?;

    if version != "HTTP/1.0" && version != "HTTP/1.1" {
        return Err(505);
    }

    if target.len() > MAX_URI_LENGTH {
        return Err(414);
    }
    if target.is_empty() {
        return Err(400);
    }

    let (target, fragment) = match target.split_once('#') {
        Some((left, frag)) => (left, frag.to_string()),
        None => (target, String::new()),
    };
    let (raw_path, query) = match target.split_once('?') {
        Some((left, q)) => (left, q.to_string()),
        None => (target, String::new()),
    };
    let path = normalize_path(raw_path);

    let mut headers: HashMap<String, String> = HashMap::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let (name, value) = line.split_once(':').ok_or(400)?;
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim().to_string();
        if name.is_empty() {
            return Err(400);
        }
        headers
            .entry(name)
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }

    let (host, port) = match headers.get("host") {
        Some(value) if !value.is_empty() => match value.split_once(':') {
            Some((h, p)) => (h.to_string(), p.parse::<u16>().map_err(|_| 400)?),
            None => (value.clone(), 80),
        },
        Some(_) => return Err(400),
        None if version == "HTTP/1.1" => return Err(400),
        None => (String::new(), 80),
    };

    let content_length = match headers.get("content-length") {
        Some(value) => {
            if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
                return Err(400);
            }
            Some(value.parse::<usize>().map_err(|_| 400)?)
        }
        None => None,
    };

    let content_length = match content_length {
        Some(len) => len,
        None => {
            if !body_available.is_empty() {
                if method.allows_bodyless_content_length() {
                    return Err(411);
                }
                return Err(400);
            }
            0
        }
    };

    if body_available.len() < content_length {
        return Ok(ParseOutcome::NeedMore);
    }
    if body_available.len() > content_length {
        return Err(400);
    }

    let cookies = headers
        .get("cookie")
        .map(|raw| parse_cookie_header(raw))
        .unwrap_or_default();

    Ok(ParseOutcome::Complete(Request {
        method,
        path,
        query,
        fragment,
        version: version.to_string(),
        headers,
        cookies,
        body: body_available.to_vec(),
        content_length,
        host,
        port,
    }))
}

fn find_header_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn parse_cookie_header(raw: &str) -> HashMap<String, String> {
    raw.split(';')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(buf: &[u8]) -> Result<Option<Request>, u16> {
        match parse(buf)? {
            ParseOutcome::NeedMore => Ok(None),
            ParseOutcome::Complete(req) => Ok(Some(req)),
        }
    }

    #[test]
    fn needs_more_until_header_terminator_arrives() {
        let partial = b"GET / HTTP/1.1\r\nHost: example.com\r\n";
        assert!(matches!(parse(partial), Ok(ParseOutcome::NeedMore)));
    }

    #[test]
    fn parses_simple_get() {
        let buf = b"GET /index.html?x=1#frag HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let req = outcome(buf).unwrap().unwrap();
        assert_eq!(req.method, Method::GET);
        assert_eq!(req.path, "/index.html");
        assert_eq!(req.query, "x=1");
        assert_eq!(req.fragment, "frag");
        assert_eq!(req.host, "example.com");
        assert_eq!(req.port, 80);
    }

    #[test]
    fn host_header_is_required_on_http_1_1() {
        let buf = b"GET / HTTP/1.1\r\n\r\n";
        assert_eq!(outcome(buf).unwrap_err(), 400);
    }

    #[test]
    fn host_header_optional_on_http_1_0() {
        let buf = b"GET / HTTP/1.0\r\n\r\n";
        let req = outcome(buf).unwrap().unwrap();
        assert_eq!(req.host, "");
    }

    #[test]
    fn unrecognized_method_is_501() {
        let buf = b"BREW / HTTP/1.1\r\nHost: a\r\n\r\n";
        assert_eq!(outcome(buf).unwrap_err(), 501);
    }

    #[test]
    fn bad_version_is_505() {
        let buf = b"GET / HTTP/2.0\r\nHost: a\r\n\r\n";
        assert_eq!(outcome(buf).unwrap_err(), 505);
    }

    #[test]
    fn oversized_uri_is_414() {
        let target = "/".to_string() + &"a".repeat(MAX_URI_LENGTH);
        let buf = format!("GET {target} HTTP/1.1\r\nHost: a\r\n\r\n");
        assert_eq!(outcome(buf.as_bytes()).unwrap_err(), 414);
    }

    #[test]
    fn malformed_request_line_is_400() {
        let buf = b"GET /\r\nHost: a\r\n\r\n";
        assert_eq!(outcome(buf).unwrap_err(), 400);
    }

    #[test]
    fn post_without_content_length_but_with_body_is_411() {
        let buf = b"POST /upload HTTP/1.1\r\nHost: a\r\n\r\nbody";
        assert_eq!(outcome(buf).unwrap_err(), 411);
    }

    #[test]
    fn get_without_content_length_but_with_body_is_400() {
        let buf = b"GET / HTTP/1.1\r\nHost: a\r\n\r\nbody";
        assert_eq!(outcome(buf).unwrap_err(), 400);
    }

    #[test]
    fn non_digit_content_length_is_400() {
        let buf = b"POST / HTTP/1.1\r\nHost: a\r\nContent-Length: 4x\r\n\r\nbody";
        assert_eq!(outcome(buf).unwrap_err(), 400);
    }

    #[test]
    fn incomplete_body_is_need_more() {
        let buf = b"POST / HTTP/1.1\r\nHost: a\r\nContent-Length: 10\r\n\r\nshort";
        assert!(matches!(parse(buf), Ok(ParseOutcome::NeedMore)));
    }

    #[test]
    fn excess_body_bytes_are_400() {
        let buf = b"POST / HTTP/1.1\r\nHost: a\r\nContent-Length: 2\r\n\r\ntoolong";
        assert_eq!(outcome(buf).unwrap_err(), 400);
    }

    #[test]
    fn repeated_headers_are_joined_with_comma_space() {
        let buf = b"GET / HTTP/1.1\r\nHost: a\r\nX-Tag: one\r\nX-Tag: two\r\n\r\n";
        let req = outcome(buf).unwrap().unwrap();
        assert_eq!(req.header("x-tag"), Some("one, two"));
    }

    #[test]
    fn cookies_are_parsed_from_cookie_header() {
        let buf = b"GET / HTTP/1.1\r\nHost: a\r\nCookie: session=abc; theme=dark\r\n\r\n";
        let req = outcome(buf).unwrap().unwrap();
        assert_eq!(req.cookies.get("session"), Some(&"abc".to_string()));
        assert_eq!(req.cookies.get("theme"), Some(&"dark".to_string()));
    }

    #[test]
    fn path_is_normalized_during_parse() {
        let buf = b"GET //images//cat.jpg HTTP/1.1\r\nHost: a\r\n\r\n";
        let req = outcome(buf).unwrap().unwrap();
        assert_eq!(req.path, "/images/cat.jpg");
    }
}
