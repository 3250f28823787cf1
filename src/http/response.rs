use std::collections::HashMap;
use std::fmt;

/// Full status-reason table this server can emit, including the §7 error taxonomy.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        411 => "Length Required",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        505 => "HTTP Version Not Supported",
        _ => "Unknown",
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub version: String,
}

impl Response {
    pub fn new(status: u16) -> Self {
        let mut headers = HashMap::new();
        headers.insert("Server".to_string(), "webserv".to_string());
        Response {
            status,
            headers,
            body: Vec::new(),
            version: "HTTP/1.1".to_string(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    /// Minimal built-in error page, used when no custom `error_page` is configured
    /// for the status, or the configured page can't be read.
    pub fn error(status: u16, message: &str) -> Self {
        let mut response = Self::new(status);
        let body = format!(
            "<!DOCTYPE html>\n<html><head><title>{status} {reason}</title></head>\n<body><h1>{status} {reason}</h1><p>{message}</p></body></html>",
            status = status,
            reason = reason_phrase(status),
            message = html_escape(message),
        );
        response.set_header("Content-Type", "text/html");
        response.set_body(body.into_bytes());
        response
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.insert(name.to_string(), value.to_string());
    }

    pub fn set_body(&mut self, body: Vec<u8>) {
        self.set_header("Content-Length", &body.len().to_string());
        self.body = body;
    }

    pub fn set_body_str(&mut self, body: &str) {
        self.set_body(body.as_bytes().to_vec());
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.body.len() + 256);
        let status_line = format!(
            "{} {} {}\r\n",
            self.version,
            self.status,
            reason_phrase(self.status)
        );
        out.extend_from_slice(status_line.as_bytes());
        for (name, value) in &self.headers {
            out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.version, self.status, reason_phrase(self.status))
    }
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
