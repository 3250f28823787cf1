use crate::http::response::Response;
use std::collections::HashMap;
use std::io;

/// Parsed CGI/1.1 script output, ready to become an HTTP response.
#[derive(Debug, Clone)]
pub struct CgiResponse {
    pub status: Option<u16>,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl CgiResponse {
    pub fn new() -> Self {
        CgiResponse {
            status: None,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn to_response(self) -> Response {
        let status = self.status.unwrap_or(200);
        let mut response = Response::new(status);
        for (name, value) in self.headers {
            response.set_header(&name, &value);
        }
        response.set_body(self.body);
        response
    }
}

impl Default for CgiResponse {
    fn default() -> Self {
        Self::new()
    }
}

/// Parser for CGI/1.1 script output: a header block (CGI headers, not HTTP
/// status line), a blank line, then the body.
#[derive(Debug)]
pub struct CgiResponseParser {
    state: ParseState,
    headers: HashMap<String, String>,
    body: Vec<u8>,
    current_header: String,
    status: Option<u16>,
}

#[derive(Debug, PartialEq)]
enum ParseState {
    Headers,
    Body,
}

impl CgiResponseParser {
    pub fn new() -> Self {
        CgiResponseParser {
            state: ParseState::Headers,
            headers: HashMap::new(),
            body: Vec::new(),
            current_header: String::new(),
            status: None,
        }
    }

    pub fn parse(&mut self, data: &[u8]) -> io::Result<CgiResponse> {
        let mut i = 0;

        while i < data.len() {
            match self.state {
                ParseState::Headers => {
                    i = self.parse_headers(data, i)?;
                }
                ParseState::Body => {
                    self.body.extend_from_slice(&data[i..]);
                    break;
                }
            }
        }

        Ok(self.build_response())
    }

    fn parse_headers(&mut self, data: &[u8], mut start: usize) -> io::Result<usize> {
        let mut i = start;

        while i < data.len() {
            if data[i] == b'\n' {
                let line = String::from_utf8_lossy(&data[start..i]);
                let line = line.trim_end_matches('\r');

                if line.is_empty() {
                    self.state = ParseState::Body;
                    return Ok(i + 1);
                }

                self.parse_header_line(line)?;
                start = i + 1;
            }
            i += 1;
        }

        if start < data.len() {
            self.current_header.push_str(&String::from_utf8_lossy(&data[start..]));
        }

        Ok(data.len())
    }

    /// Handles RFC 822 continuation lines (leading space or tab).
    fn parse_header_line(&mut self, line: &str) -> io::Result<()> {
        if line.starts_with(' ') || line.starts_with('\t') {
            self.current_header.push(' ');
            self.current_header.push_str(line.trim());
            return Ok(());
        }

        if !self.current_header.is_empty() {
            let header_to_process = self.current_header.clone();
            self.current_header.clear();
            self.process_header(&header_to_process)?;
        }

        self.current_header = line.to_string();
        Ok(())
    }

    fn process_header(&mut self, header: &str) -> io::Result<()> {
        let colon_pos = header.find(':').ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, format!("invalid header format: {}", header))
        })?;
        let name = header[..colon_pos].trim().to_string();
        let value = header[colon_pos + 1..].trim().to_string();

        match name.to_lowercase().as_str() {
            "status" => {
                let code = value.split_whitespace().next().and_then(|tok| tok.parse::<u16>().ok());
                match code {
                    Some(code) => self.status = Some(code),
                    // Not a recognizable "NNN reason" value; keep it as a regular header.
                    None => {
                        self.headers.insert(name, value);
                    }
                }
            }
            _ => {
                self.headers.insert(name, value);
            }
        }

        Ok(())
    }

    /// Explicit `Status:` wins; a bare `Location:` implies a 302; otherwise 200.
    fn build_response(&mut self) -> CgiResponse {
        if !self.current_header.is_empty() {
            let header_to_process = self.current_header.clone();
            let _ = self.process_header(&header_to_process);
        }

        let status = self.status.or_else(|| {
            if self.headers.contains_key("Location") {
                Some(302)
            } else {
                None
            }
        });

        CgiResponse {
            status,
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }

    pub fn parse_complete(data: &[u8]) -> io::Result<CgiResponse> {
        let mut parser = CgiResponseParser::new();
        parser.parse(data)
    }
}

impl Default for CgiResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_response_has_no_status_or_headers() {
        let response = CgiResponse::new();
        assert!(response.status.is_none());
        assert!(response.headers.is_empty());
        assert!(response.body.is_empty());
    }

    #[test]
    fn cgi_response_converts_to_http_response() {
        let mut cgi_response = CgiResponse::new();
        cgi_response.status = Some(404);
        cgi_response.headers.insert("Content-Type".to_string(), "text/plain".to_string());
        cgi_response.body = b"Not Found".to_vec();

        let response = cgi_response.to_response();
        assert_eq!(response.status, 404);
        assert_eq!(response.headers.get("Content-Type"), Some(&"text/plain".to_string()));
        assert_eq!(response.body, b"Not Found");
    }

    #[test]
    fn simple_response_with_no_status_header_defaults_to_200() {
        let cgi_output = b"Content-Type: text/html\r\n\r\n<html><body>Hello World</body></html>";
        let response = CgiResponseParser::parse_complete(cgi_output).unwrap();

        assert_eq!(response.status, None);
        assert_eq!(response.headers.get("Content-Type"), Some(&"text/html".to_string()));
        assert_eq!(response.body, b"<html><body>Hello World</body></html>");
    }

    #[test]
    fn explicit_status_header_is_applied() {
        let cgi_output = b"Status: 404 Not Found\r\nContent-Type: text/plain\r\n\r\nPage not found";
        let response = CgiResponseParser::parse_complete(cgi_output).unwrap();

        assert_eq!(response.status, Some(404));
        assert_eq!(response.headers.get("Content-Type"), Some(&"text/plain".to_string()));
        assert_eq!(response.body, b"Page not found");
    }

    #[test]
    fn location_with_no_status_header_implies_redirect() {
        let cgi_output = b"Location: http://example.com/new-page\r\n\r\n";
        let response = CgiResponseParser::parse_complete(cgi_output).unwrap();

        assert_eq!(response.status, Some(302));
        assert_eq!(response.headers.get("Location"), Some(&"http://example.com/new-page".to_string()));
        assert!(response.body.is_empty());
    }

    #[test]
    fn explicit_status_wins_over_location_implied_redirect() {
        let cgi_output = b"Status: 301 Moved Permanently\r\nLocation: http://example.com/new-page\r\n\r\n";
        let response = CgiResponseParser::parse_complete(cgi_output).unwrap();
        assert_eq!(response.status, Some(301));
    }

    #[test]
    fn multiline_headers_are_combined() {
        let cgi_output = b"Content-Type: text/html\r\nSet-Cookie: session=abc123;\r\n expires=Wed, 09 Jun 2021 10:18:14 GMT\r\n\r\n<html></html>";
        let response = CgiResponseParser::parse_complete(cgi_output).unwrap();

        assert_eq!(response.headers.get("Content-Type"), Some(&"text/html".to_string()));
        assert!(response.headers.get("Set-Cookie").is_some());
    }

    #[test]
    fn empty_body_is_allowed() {
        let cgi_output = b"Content-Type: text/plain\r\n\r\n";
        let response = CgiResponseParser::parse_complete(cgi_output).unwrap();

        assert_eq!(response.headers.get("Content-Type"), Some(&"text/plain".to_string()));
        assert!(response.body.is_empty());
    }

    #[test]
    fn output_with_no_headers_is_all_body() {
        let cgi_output = b"\r\nJust body content";
        let response = CgiResponseParser::parse_complete(cgi_output).unwrap();

        assert!(response.headers.is_empty());
        assert_eq!(response.body, b"Just body content");
    }
}
