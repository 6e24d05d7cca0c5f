use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Download of {url} failed: {message}")]
    Download { url: String, message: String },

    #[error("Package not found: {0}")]
    PackageNotFound(String),

    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Length mismatch for '{}'. Has {actual}, want {expected}", .path.display())]
    LengthMismatch {
        path: PathBuf,
        actual: u64,
        expected: u64,
    },

    #[error("SHA512/256 mismatch for '{}'. Has {actual}, want {expected}", .path.display())]
    DigestMismatch {
        path: PathBuf,
        actual: String,
        expected: String,
    },

    /// Unsafe or unrecognized archive content. The run must not continue past this.
    #[error("Fatal: {0}")]
    Fatal(String),

    #[error("Target directory '{}' already exists. Aborting.", .0.display())]
    TargetExists(PathBuf),

    #[error("Post-install script '{}' failed: {message}", .script.display())]
    PostInstall { script: PathBuf, message: String },

    #[error("Invalid configuration: {0}\n\n\
             Hint: run with --help to see the accepted flags and their defaults.")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the process must terminate immediately instead of unwinding normally.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Fatal(_))
    }

    /// Whether a different mirror might succeed where this attempt failed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Http(_)
                | Error::Download { .. }
                | Error::LengthMismatch { .. }
                | Error::DigestMismatch { .. }
        )
    }

    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            line,
            message: message.into(),
        }
    }
}
