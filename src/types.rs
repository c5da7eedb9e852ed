//! Common types and constants for `pathsift`

/// Number of leading bytes inspected when sniffing a file
pub const SNIFF_SAMPLE_SIZE: usize = 4096;

/// Codec reported for content that is not text
pub const CODEC_BINARY: &str = "binary";

/// Separator between type and codec in a sniff result
pub const SNIFF_SEPARATOR: char = ';';

/// Placeholder token substituted with the matched path in a command template
pub const EXEC_PLACEHOLDER: &str = "{}";

/// Tokens that split a command template into sub-commands
pub const EXEC_SEPARATORS: [&str; 2] = [";", "\\;"];

/// Display name for standard input
pub const STDIN_NAME: &str = "(standard input)";

/// Outcome of searching one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// Display form of the candidate
    pub name:    String,
    /// Whether any line matched
    pub matched: bool,
}

impl SearchResult {
    /// A negative result for `name`
    #[must_use]
    pub fn miss(name: impl Into<String>) -> Self {
        Self { name: name.into(), matched: false }
    }
}

const _: () = {
    assert!(SNIFF_SAMPLE_SIZE > 0);
    assert!(EXEC_SEPARATORS.len() == 2);
};
