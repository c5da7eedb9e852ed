//! Ordered registry of content readers
//!
//! Each entry pairs a predicate with a handler that opens a path as a sequence of text lines.
//! [`ReaderRegistry::open`] asks the entries in registration order and uses the first whose
//! predicate holds. The default registry has a single entry, the text reader.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::classify::TypeClassifier;
use crate::error::{Error, Result};
use crate::kind;
use crate::text::{Lines, Sniffer};

/// Lazily produced lines or text runs
pub type LineIter = Box<dyn Iterator<Item = Result<String>>>;

type Predicate = Box<dyn Fn(&Path, &dyn Sniffer) -> Result<bool> + Send + Sync>;
type Handler = Box<dyn Fn(&Path, &mut TypeClassifier) -> Result<LineIter> + Send + Sync>;

/// Extracts text from a document format that is not plain text
pub trait DocumentTextExtractor: Send + Sync {
    /// The document's text runs, in reading order
    ///
    /// # Errors
    /// Returns error if the document cannot be opened or parsed.
    fn text_runs(&self, path: &Path) -> Result<LineIter>;
}

struct Entry {
    label:   String,
    accepts: Predicate,
    open:    Handler,
}

/// Ordered `(predicate, handler)` pairs, resolved by first match
pub struct ReaderRegistry {
    entries: Vec<Entry>,
}

impl std::fmt::Debug for ReaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderRegistry").field("entries", &self.labels()).finish()
    }
}

impl Default for ReaderRegistry {
    fn default() -> Self {
        Self::new().with_text_reader()
    }
}

impl ReaderRegistry {
    /// An empty registry that accepts nothing
    #[must_use]
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Append an entry
    #[must_use]
    pub fn register<P, H>(mut self, label: impl Into<String>, accepts: P, open: H) -> Self
    where
        P: Fn(&Path, &dyn Sniffer) -> Result<bool> + Send + Sync + 'static,
        H: Fn(&Path, &mut TypeClassifier) -> Result<LineIter> + Send + Sync + 'static,
    {
        self.entries.push(Entry {
            label:   label.into(),
            accepts: Box::new(accepts),
            open:    Box::new(open),
        });
        self
    }

    /// Append an entry for documents whose sniffed MIME type equals `mime`
    #[must_use]
    pub fn register_document(
        self,
        mime: &str,
        extractor: impl DocumentTextExtractor + 'static,
    ) -> Self {
        let wanted = mime.to_owned();
        self.register(
            mime,
            move |path, sniffer| Ok(kind::mime_type(sniffer, path)? == wanted),
            move |path, _| extractor.text_runs(path),
        )
    }

    /// Append the plain text reader
    #[must_use]
    pub fn with_text_reader(self) -> Self {
        self.register("text", |path, sniffer| kind::is_text_file(sniffer, path), read_text)
    }

    /// Labels of the entries, in resolution order
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.label.as_str()).collect()
    }

    /// Open `path` with the first accepting entry
    ///
    /// Returns `None` when no entry accepts the path.
    ///
    /// # Errors
    /// Returns error if a predicate or the chosen handler fails.
    pub fn open(
        &self,
        path: &Path,
        sniffer: &dyn Sniffer,
        classifier: &mut TypeClassifier,
    ) -> Result<Option<LineIter>> {
        for entry in &self.entries {
            if (entry.accepts)(path, sniffer)? {
                return (entry.open)(path, classifier).map(Some);
            }
        }
        Ok(None)
    }
}

/// Open a text file as decoded lines, using the codec the classifier reports
///
/// # Errors
/// Returns error if the file is missing or cannot be opened.
pub fn read_text(path: &Path, classifier: &mut TypeClassifier) -> Result<LineIter> {
    let codec = classifier.get_codec(path)?.ok_or_else(|| Error::NotFound(path.to_path_buf()))?;
    let file = File::open(path)?;
    Ok(Box::new(Lines::new(BufReader::new(file), codec, path.display().to_string())))
}
