use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong turning a config file into an `HttpConfig`.
/// Each variant names the offending directive/value, per the one-line
/// message contract the parser promises its callers.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected end of file: scope left unclosed")]
    UnclosedScope,

    #[error("unexpected '}}' with no matching open scope")]
    UnmatchedClose,

    #[error("unknown directive '{directive}' in {scope} scope")]
    UnknownDirective { scope: &'static str, directive: String },

    #[error("directive '{directive}' given twice in the same {scope} scope")]
    DuplicateDirective { scope: &'static str, directive: String },

    #[error("invalid listen value '{value}': expected <interface>:<port>")]
    InvalidListen { value: String },

    #[error("listen port out of range in '{value}': must be 1..65535")]
    ListenPortOutOfRange { value: String },

    #[error("duplicate listen address {interface}:{port} within one server")]
    DuplicateListen { interface: String, port: u16 },

    #[error("duplicate location path '{path}' within one server")]
    DuplicatePath { path: String },

    #[error("invalid size value '{value}'")]
    InvalidSize { value: String },

    #[error("invalid error_page status '{value}': must be 100..599")]
    InvalidErrorPageStatus { value: String },

    #[error("cgi_pass extension '{value}' must start with '.'")]
    CgiExtensionMissingDot { value: String },

    #[error("cgi_pass interpreter path '{value}' must be absolute")]
    CgiInterpreterNotAbsolute { value: String },

    #[error("malformed cgi_pass directive '{value}': expected '<.ext>:<path>'")]
    MalformedCgiPass { value: String },

    #[error("upload_dir '{value}' must be an absolute path")]
    UploadDirNotAbsolute { value: String },

    #[error("return status {status} is not one of 301,302,303,307,308")]
    InvalidRedirectStatus { status: u16 },

    #[error("return url '{value}' must begin with '/'")]
    InvalidRedirectUrl { value: String },

    #[error("unknown method '{value}' in methods directive")]
    UnknownMethod { value: String },

    #[error("location '{path}' has no root and neither does its server")]
    MissingRoot { path: String },

    #[error("http block must contain at least one server")]
    NoServers,

    #[error("server has no 'listen' directive")]
    MissingListen,

    #[error("server has no locations")]
    NoLocations,

    #[error("directive '{directive}' requires at least one argument")]
    MissingArgument { directive: String },

    #[error("statement '{text}' not terminated with ';' before '}}'")]
    MalformedStatement { text: String },

    #[error("only one http block is allowed per file")]
    MultipleHttpBlocks,

    #[error("expected a top-level 'http {{' block")]
    MissingHttpBlock,

    #[error("autoindex value '{value}' must be 'on' or 'off'")]
    InvalidAutoindexValue { value: String },

    #[error("location path '{value}' must begin with '/'")]
    InvalidLocationPath { value: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_offending_value() {
        let err = ConfigError::InvalidListen {
            value: "bogus".to_string(),
        };
        assert!(err.to_string().contains("bogus"));
    }
}
