use crate::cgi::environment::CgiEnvironment;
use crate::cgi::response::CgiResponseParser;
use crate::http::request::Request;
use crate::http::response::Response;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// CGI execution is always bounded by this wall-clock timeout, matching the
/// default timeout of the teacher's own executor.
const CGI_TIMEOUT: Duration = Duration::from_secs(30);

/// CGI output larger than this kills the child rather than buffering forever.
const MAX_CGI_OUTPUT: usize = 1024 * 1024;

/// Runs one CGI/1.1 script to completion against an already-routed request.
/// The interpreter and script path are resolved by `routing::router` from
/// the location's `cgi_pass` map before this is called; this module owns
/// nothing about extension-to-interpreter mapping or script discovery.
pub fn execute(
    interpreter: &Path,
    script_path: &Path,
    request: &Request,
    document_root: &Path,
    server_name: &str,
    server_port: u16,
) -> io::Result<Response> {
    if !script_path.exists() {
        return Err(io::Error::new(io::ErrorKind::NotFound, "CGI script not found"));
    }

    let mut env = CgiEnvironment::from_request(request, script_path, document_root, server_name, server_port);
    env.add_system_env();

    let output = run_script(interpreter, script_path, &env, &request.body)?;
    let cgi_response = CgiResponseParser::parse_complete(&output)?;
    Ok(cgi_response.to_response())
}

fn run_script(
    interpreter: &Path,
    script_path: &Path,
    environment: &CgiEnvironment,
    request_body: &[u8],
) -> io::Result<Vec<u8>> {
    let mut child = Command::new(interpreter)
        .arg(script_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .envs(environment.variables())
        .spawn()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("failed to spawn CGI process: {}", e)))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(request_body)
            .map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, format!("failed to write to CGI stdin: {}", e)))?;
    }

    let start_time = Instant::now();
    let mut output = Vec::new();
    let mut stderr_output = Vec::new();

    loop {
        if start_time.elapsed() > CGI_TIMEOUT {
            let _ = child.kill();
            return Err(io::Error::new(io::ErrorKind::TimedOut, "CGI script execution timed out"));
        }

        if let Some(mut stdout) = child.stdout.take() {
            let mut buffer = [0; 4096];
            match stdout.read(&mut buffer) {
                Ok(0) => {
                    child.stdout = Some(stdout);
                }
                Ok(n) => {
                    output.extend_from_slice(&buffer[..n]);
                    if output.len() > MAX_CGI_OUTPUT {
                        let _ = child.kill();
                        return Err(io::Error::new(io::ErrorKind::Other, "CGI output too large"));
                    }
                    child.stdout = Some(stdout);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    child.stdout = Some(stdout);
                    std::thread::sleep(Duration::from_millis(10));
                    continue;
                }
                Err(e) => {
                    child.stdout = Some(stdout);
                    return Err(e);
                }
            }
        }

        match child.try_wait() {
            Ok(Some(status)) => {
                if let Some(mut stdout) = child.stdout.take() {
                    let _ = stdout.read_to_end(&mut output);
                }
                if let Some(mut stderr) = child.stderr.take() {
                    let _ = stderr.read_to_end(&mut stderr_output);
                }

                if !status.success() {
                    let stderr_str = String::from_utf8_lossy(&stderr_output);
                    return Err(io::Error::new(
                        io::ErrorKind::Other,
                        format!("CGI script failed with status {}: {}", status, stderr_str),
                    ));
                }
                break;
            }
            Ok(None) => {
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(e) => {
                let _ = child.kill();
                return Err(e);
            }
        }
    }

    Ok(output)
}
