//! Error types for `pathsift`

use std::fmt::Display;
use std::path::PathBuf;

use arrayvec::ArrayString;
use thiserror::Error;
use tracing::{error, warn};

/// Maximum length of candidate failure messages
pub const MAX_ERROR_LENGTH: usize = 256;

/// Custom result type for `pathsift` operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for `pathsift`
///
/// Variants fall into three groups:
/// - validation errors (bad kind code, bad pattern, missing `-exec` command), surfaced
///   immediately
/// - item errors (one file or stream failed), routed through [`ErrorPolicy`]
/// - [`Error::Interrupted`], raised when the run is cancelled from outside
#[derive(Debug, Error)]
pub enum Error {
    /// IO operation failed
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// A kind code outside the known set
    #[error("{code} is not a valid file type. It should be one of {valid}")]
    InvalidKind {
        /// The rejected code
        code:  char,
        /// Human readable list of the accepted codes
        valid: String,
    },

    /// A regular expression failed to compile
    #[error("Failed to compile regex: {pattern} ; due to error: {source}")]
    InvalidPattern {
        /// The pattern as given
        pattern: String,
        /// Compiler diagnostic
        #[source]
        source:  regex::Error,
    },

    /// `-exec` was given without a command
    #[error("At least one command is required for -exec")]
    MissingExecCommand,

    /// Path does not exist
    #[error("{} does not exist.", .0.display())]
    NotFound(PathBuf),

    /// None of the path kind predicates hold
    #[error("Cannot decide type of {}", .0.display())]
    Unclassifiable(PathBuf),

    /// Input path is neither a regular file nor a directory
    #[error("Unhandled file path: {} of type {kind}", path.display())]
    UnsupportedInput {
        /// Offending path
        path: PathBuf,
        /// Kind code of the path
        kind: char,
    },

    /// A pattern file could not be read
    #[error("Failed to read patterns from file: {} ; due to error: {source}", path.display())]
    PatternFile {
        /// Pattern file path
        path:   PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// Content could not be decoded with the detected codec
    #[error("Cannot decode {name} as {codec}")]
    Undecodable {
        /// Display name of the input
        name:  String,
        /// Codec reported by the sniffer
        codec: String,
    },

    /// The sniffing service returned something other than `type; encoding`
    #[error("Unexpected sniff result for {}: {raw}", path.display())]
    MalformedSniff {
        /// Sniffed path
        path: PathBuf,
        /// Raw sniff string
        raw:  String,
    },

    /// A single candidate failed during content search
    #[error("{0}")]
    Candidate(Box<ArrayString<MAX_ERROR_LENGTH>>),

    /// The run was interrupted
    #[error("Interrupted")]
    Interrupted,
}

impl Error {
    /// Create a candidate failure error
    ///
    /// The message buffer is fixed-size (`MAX_ERROR_LENGTH`); longer text is truncated at a
    /// character boundary.
    #[must_use]
    pub fn candidate(name: &str, cause: &Self) -> Self {
        let msg = format!("Failed to handle file {name} ; due to error {cause}");
        let mut buf = ArrayString::new();
        for ch in msg.chars() {
            if buf.try_push(ch).is_err() {
                break;
            }
        }
        Self::Candidate(Box::new(buf))
    }

    /// Whether this error stems from invalid user input rather than a failing item
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidKind { .. } | Self::InvalidPattern { .. } | Self::MissingExecCommand)
    }

    /// Process exit code for this error
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Interrupted => 1,
            _ => 2,
        }
    }
}

/// How per-item failures are treated
///
/// Consulted by every component that can fail on a single file, stream, or pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorPolicy {
    /// Suppress diagnostics
    pub no_message:    bool,
    /// Escalate the first item failure and stop
    pub quit_on_error: bool,
}

impl ErrorPolicy {
    /// Create a policy from its two flags
    #[must_use]
    pub const fn new(no_message: bool, quit_on_error: bool) -> Self {
        Self { no_message, quit_on_error }
    }

    /// Report an item failure
    ///
    /// # Errors
    /// Returns `err` back when `quit_on_error` is set, so the caller can abort.
    pub fn report(&self, err: Error) -> Result<()> {
        if !self.no_message {
            error!("{err}");
        }
        if self.quit_on_error { Err(err) } else { Ok(()) }
    }

    /// Whether `err`, ending a search run under this policy, still has to be logged
    ///
    /// Escalated failures were already logged by [`report`](Self::report). Only output
    /// failures end a run without passing through it; interrupts are not logged.
    #[must_use]
    pub const fn needs_logging(&self, err: &Error) -> bool {
        !self.no_message && matches!(err, Error::Io(_))
    }

    /// Emit a warning unless diagnostics are suppressed
    pub fn warn(&self, msg: impl Display) {
        if !self.no_message {
            warn!("{msg}");
        }
    }
}
