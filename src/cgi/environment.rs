use crate::http::request::Request;
use std::collections::HashMap;
use std::path::Path;

/// CGI environment variable manager
#[derive(Debug, Clone)]
pub struct CgiEnvironment {
    variables: HashMap<String, String>,
}

impl CgiEnvironment {
    pub fn new() -> Self {
        CgiEnvironment {
            variables: HashMap::new(),
        }
    }

    /// Build the CGI/1.1 environment for one request against one resolved script.
    pub fn from_request(
        request: &Request,
        script_path: &Path,
        document_root: &Path,
        server_name: &str,
        server_port: u16,
    ) -> Self {
        let mut env = CgiEnvironment::new();

        env.set("REQUEST_METHOD", request.method.as_str());
        env.set("SERVER_NAME", server_name);
        env.set("SERVER_PORT", &server_port.to_string());
        env.set("SERVER_SOFTWARE", "localhost/1.0");
        env.set("GATEWAY_INTERFACE", "CGI/1.1");
        env.set("SERVER_PROTOCOL", "HTTP/1.1");

        let request_uri = &request.path;
        env.set("REQUEST_URI", request_uri);

        if let Ok(script_relative) = script_path.strip_prefix(document_root) {
            let script_name = format!("/{}", script_relative.to_string_lossy());
            env.set("SCRIPT_NAME", &script_name);

            if let Some(path_info) = request_uri.strip_prefix(&script_name) {
                if !path_info.is_empty() {
                    env.set("PATH_INFO", path_info);

                    let translated_path = document_root.join(path_info.trim_start_matches('/'));
                    env.set("PATH_TRANSLATED", &translated_path.to_string_lossy());
                }
            }
        }

        env.set("SCRIPT_FILENAME", &script_path.to_string_lossy());
        env.set("QUERY_STRING", &request.query);

        if let Some(content_type) = request.content_type() {
            env.set("CONTENT_TYPE", content_type);
        }
        env.set("CONTENT_LENGTH", &request.body.len().to_string());

        // Every request header becomes HTTP_<NAME> with dashes turned to
        // underscores, per CGI/1.1 (RFC 3875 §4.1.18).
        for (name, value) in &request.headers {
            let var_name = format!(
                "HTTP_{}",
                name.to_uppercase().replace('-', "_")
            );
            env.set(&var_name, value);
        }

        env.set("REMOTE_ADDR", "127.0.0.1");
        env.set("REMOTE_HOST", "localhost");
        env.set("DOCUMENT_ROOT", &document_root.to_string_lossy());

        env
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.variables.insert(name.to_string(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(|s| s.as_str())
    }

    pub fn variables(&self) -> &HashMap<String, String> {
        &self.variables
    }

    /// Convert to vector of "KEY=VALUE" strings for process execution
    pub fn to_env_strings(&self) -> Vec<String> {
        self.variables
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect()
    }

    /// Add system environment variables that should be passed through
    pub fn add_system_env(&mut self) {
        if let Ok(path) = std::env::var("PATH") {
            self.set("PATH", &path);
        }
        if let Ok(home) = std::env::var("HOME") {
            self.set("HOME", &home);
        }
        if let Ok(user) = std::env::var("USER") {
            self.set("USER", &user);
        }
        if let Ok(shell) = std::env::var("SHELL") {
            self.set("SHELL", &shell);
        }
    }
}

impl Default for CgiEnvironment {
    fn default() -> Self {
        Self::new()
    }
}
