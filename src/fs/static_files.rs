use crate::fs::path_utils::safe_path_join;
use crate::http::response::Response;
use crate::mime::MimeTypes;
use std::fs::{self, File, Metadata};
use std::io::{self, Read};
use std::path::Path;
use std::time::SystemTime;

const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Serves `resolved_path` as a static file under `root`, trying `indexes`
/// in order when it names a directory. Re-validates the path against
/// `root` so a crafted `resolved_path` can never escape the location root,
/// even though the router already concatenated it from trusted config.
pub fn serve(resolved_path: &Path, root: &Path, indexes: &[String]) -> Response {
    let relative = match resolved_path.strip_prefix(root) {
        Ok(rel) => rel,
        Err(_) => return Response::error(403, "path escapes location root"),
    };
    let request_path = format!("/{}", relative.to_string_lossy());

    let safe_path = match safe_path_join(root, &request_path) {
        Ok(path) => path,
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            return Response::error(403, "path escapes location root")
        }
        Err(e) => return Response::error(404, &e.to_string()),
    };

    let final_path = if safe_path.is_dir() {
        match find_index(&safe_path, indexes) {
            Some(path) => path,
            None => return Response::error(404, "directory has no index file"),
        }
    } else {
        safe_path
    };

    match read_file(&final_path) {
        Ok((content, metadata)) => {
            let mut response = Response::ok();
            response.set_header("Content-Type", MimeTypes::new().get_mime_type(&final_path));

            if let Ok(modified) = metadata.modified() {
                if let Ok(duration) = modified.duration_since(SystemTime::UNIX_EPOCH) {
                    response.set_header("Last-Modified", &duration.as_secs().to_string());
                }
            }

            if is_cacheable_asset(&final_path) {
                response.set_header("Cache-Control", "public, max-age=3600");
            }

            response.set_body(content);
            response
        }
        Err(e) => match e.kind() {
            io::ErrorKind::NotFound => Response::error(404, "not found"),
            io::ErrorKind::PermissionDenied => Response::error(403, "forbidden"),
            _ => Response::error(500, "failed to read file"),
        },
    }
}

fn find_index(dir: &Path, indexes: &[String]) -> Option<std::path::PathBuf> {
    indexes
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

fn read_file(path: &Path) -> io::Result<(Vec<u8>, Metadata)> {
    let mut file = File::open(path)?;
    let metadata = file.metadata()?;

    if metadata.len() > MAX_FILE_SIZE {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "file too large to serve"));
    }

    let mut content = Vec::with_capacity(metadata.len() as usize);
    file.read_to_end(&mut content)?;
    Ok((content, metadata))
}

fn is_cacheable_asset(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .is_some_and(|ext| {
            matches!(
                ext.as_str(),
                "css" | "js" | "png" | "jpg" | "jpeg" | "gif" | "svg" | "ico" | "woff" | "woff2" | "ttf" | "otf"
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn indexes() -> Vec<String> {
        vec!["index.html".to_string()]
    }

    #[test]
    fn serves_an_existing_file_with_its_mime_type() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("test.txt"), "Hello, World!").unwrap();

        let response = serve(&dir.path().join("test.txt"), dir.path(), &indexes());
        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"Hello, World!");
        assert_eq!(response.headers.get("Content-Type"), Some(&"text/plain".to_string()));
    }

    #[test]
    fn missing_file_is_404() {
        let dir = TempDir::new().unwrap();
        let response = serve(&dir.path().join("nonexistent.txt"), dir.path(), &indexes());
        assert_eq!(response.status, 404);
    }

    #[test]
    fn directory_serves_configured_index() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "<html>hi</html>").unwrap();

        let response = serve(dir.path(), dir.path(), &indexes());
        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"<html>hi</html>");
    }

    #[test]
    fn directory_with_no_index_is_404() {
        let dir = TempDir::new().unwrap();
        let response = serve(dir.path(), dir.path(), &indexes());
        assert_eq!(response.status, 404);
    }

    #[test]
    fn path_outside_root_is_rejected() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let escaping = outside.path().join("secret.txt");
        fs::write(&escaping, "nope").unwrap();

        let response = serve(&escaping, dir.path(), &indexes());
        assert_eq!(response.status, 403);
    }

    #[test]
    fn cacheable_asset_gets_cache_control_header() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("style.css"), "body{}").unwrap();

        let response = serve(&dir.path().join("style.css"), dir.path(), &indexes());
        assert_eq!(response.headers.get("Cache-Control"), Some(&"public, max-age=3600".to_string()));
    }
}
