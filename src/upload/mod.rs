pub mod multipart;
pub mod form_data;
pub mod file_storage;

pub use multipart::{MultipartParser, MultipartField, FieldType};
pub use form_data::{FormData, FormField};
pub use file_storage::{FileStorage, UploadedFile, StorageConfig};

use crate::http::request::Request;
use crate::http::response::Response;
use std::path::Path;

/// Writes a request body under `upload_dir`, dispatching on `Content-Type`:
/// `multipart/form-data` stores each file field, `application/x-www-form-urlencoded`
/// is stored as a single text file, anything else is stored raw.
pub fn handle(upload_dir: &Path, request: &Request) -> Response {
    let storage = match FileStorage::new(StorageConfig {
        upload_dir: upload_dir.to_path_buf(),
        ..StorageConfig::default()
    }) {
        Ok(storage) => storage,
        Err(e) => return Response::error(500, &format!("could not prepare upload directory: {e}")),
    };

    let content_type = request.content_type();

    if let Some(boundary) = multipart_boundary(content_type) {
        return handle_multipart(&storage, &boundary, &request.body);
    }

    if content_type.starts_with("application/x-www-form-urlencoded") {
        return handle_urlencoded(&storage, &request.body);
    }

    handle_raw(&storage, &request.body, content_type)
}

fn multipart_boundary(content_type: &str) -> Option<String> {
    if !content_type.starts_with("multipart/form-data") {
        return None;
    }
    content_type
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("boundary="))
        .map(|b| b.trim_matches('"').to_string())
}

fn handle_multipart(storage: &FileStorage, boundary: &str, body: &[u8]) -> Response {
    let parser = MultipartParser::new(boundary.to_string(), 10 * 1024 * 1024, 50 * 1024 * 1024);
    let fields = match parser.parse(body) {
        Ok(fields) => fields,
        Err(e) => return Response::error(400, &format!("invalid multipart body: {e}")),
    };

    let mut stored = Vec::new();
    for field in fields {
        if let FieldType::File { filename, content_type, data } = field.field_type {
            match storage.store_file(&data, filename, content_type) {
                Ok(uploaded) => stored.push(uploaded.stored_filename),
                Err(e) => return Response::error(500, &format!("failed to store upload: {e}")),
            }
        }
    }

    describe_stored(&stored)
}

fn handle_urlencoded(storage: &FileStorage, body: &[u8]) -> Response {
    match storage.store_file(body, None, Some("application/x-www-form-urlencoded".to_string())) {
        Ok(uploaded) => describe_stored(&[uploaded.stored_filename]),
        Err(e) => Response::error(500, &format!("failed to store upload: {e}")),
    }
}

fn handle_raw(storage: &FileStorage, body: &[u8], content_type: &str) -> Response {
    let content_type = if content_type.is_empty() {
        None
    } else {
        Some(content_type.to_string())
    };
    match storage.store_file(body, None, content_type) {
        Ok(uploaded) => describe_stored(&[uploaded.stored_filename]),
        Err(e) => Response::error(500, &format!("failed to store upload: {e}")),
    }
}

fn describe_stored(filenames: &[String]) -> Response {
    let mut response = Response::new(201);
    let body = if filenames.is_empty() {
        "no files were uploaded".to_string()
    } else {
        format!("stored: {}", filenames.join(", "))
    };
    response.set_header("Content-Type", "text/plain");
    response.set_body(body.into_bytes());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::Method;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn request(content_type: &str, body: Vec<u8>) -> Request {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), content_type.to_string());
        Request {
            method: Method::POST,
            path: "/upload".to_string(),
            query: String::new(),
            fragment: String::new(),
            version: "HTTP/1.1".to_string(),
            headers,
            cookies: HashMap::new(),
            content_length: body.len(),
            body,
            host: "example.com".to_string(),
            port: 8080,
        }
    }

    #[test]
    fn raw_body_is_stored_as_a_single_file() {
        let dir = TempDir::new().unwrap();
        let req = request("application/octet-stream", b"raw bytes".to_vec());
        let response = handle(dir.path(), &req);
        assert_eq!(response.status, 201);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn urlencoded_body_is_stored() {
        let dir = TempDir::new().unwrap();
        let req = request("application/x-www-form-urlencoded", b"a=1&b=2".to_vec());
        let response = handle(dir.path(), &req);
        assert_eq!(response.status, 201);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn multipart_file_field_is_stored() {
        let dir = TempDir::new().unwrap();
        let body = b"--XYZ\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\nContent-Type: text/plain\r\n\r\nhello\r\n--XYZ--\r\n".to_vec();
        let req = request("multipart/form-data; boundary=XYZ", body);
        let response = handle(dir.path(), &req);
        assert_eq!(response.status, 201);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn multipart_with_no_file_fields_reports_nothing_stored() {
        let dir = TempDir::new().unwrap();
        let body = b"--XYZ\r\nContent-Disposition: form-data; name=\"text\"\r\n\r\nhello\r\n--XYZ--\r\n".to_vec();
        let req = request("multipart/form-data; boundary=XYZ", body);
        let response = handle(dir.path(), &req);
        assert_eq!(response.status, 201);
        assert_eq!(String::from_utf8(response.body).unwrap(), "no files were uploaded");
    }
}
