//! Memoizing MIME type and codec classification
//!
//! The cache is keyed by canonical path and lives as long as its [`TypeClassifier`]. It only
//! grows; nothing is evicted until [`TypeClassifier::reset_history`] is called. A classifier is
//! meant to be owned by a single worker, so parallel workers each build their own and
//! classification work is not deduplicated between them.

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::text::Sniffer;
use crate::types::{CODEC_BINARY, SNIFF_SEPARATOR};

/// A cached `(type, codec)` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// MIME type
    pub mime:  String,
    /// Character encoding, or `binary`
    pub codec: String,
}

impl Classification {
    /// Split a raw sniff result on its first separator
    ///
    /// A leading `encoding=` or `charset=` is removed from the codec field.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let (mime, codec) = raw.split_once(SNIFF_SEPARATOR)?;
        let codec = codec.trim();
        let codec = codec
            .strip_prefix("encoding=")
            .or_else(|| codec.strip_prefix("charset="))
            .unwrap_or(codec);
        Some(Self { mime: mime.trim().to_owned(), codec: codec.trim().to_owned() })
    }

    /// Returns true if the codec marks binary content
    #[must_use]
    pub fn is_binary(&self) -> bool {
        self.codec == CODEC_BINARY
    }
}

/// Occurrence counters for sniff results
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SniffStats {
    /// Raw sniff strings
    pub type_codec: BTreeMap<String, usize>,
    /// MIME types
    pub types:      BTreeMap<String, usize>,
    /// Codecs
    pub codecs:     BTreeMap<String, usize>,
}

impl SniffStats {
    /// Returns true if nothing has been counted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.type_codec.is_empty() && self.types.is_empty() && self.codecs.is_empty()
    }

    /// Clear all counters
    pub fn clear(&mut self) {
        self.type_codec.clear();
        self.types.clear();
        self.codecs.clear();
    }

    /// Log the counters at info level
    pub fn log_summary(&self) {
        info!("Type codec stat: {:?}", self.type_codec);
        info!("Type stat: {:?}", self.types);
        info!("Codec stat: {:?}", self.codecs);
    }

    fn record(&mut self, raw: &str, classification: &Classification) {
        *self.type_codec.entry(raw.to_owned()).or_default() += 1;
        *self.types.entry(classification.mime.clone()).or_default() += 1;
        *self.codecs.entry(classification.codec.clone()).or_default() += 1;
    }
}

/// Classifies paths by MIME type and codec, memoizing every answer
pub struct TypeClassifier {
    sniffer: Arc<dyn Sniffer>,
    history: HashMap<PathBuf, Classification>,
    stats:   SniffStats,
}

impl std::fmt::Debug for TypeClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeClassifier")
            .field("history", &self.history.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl TypeClassifier {
    /// Create a classifier backed by `sniffer`
    #[must_use]
    pub fn new(sniffer: Arc<dyn Sniffer>) -> Self {
        Self { sniffer, history: HashMap::new(), stats: SniffStats::default() }
    }

    /// Classify `path`
    ///
    /// Returns `None` only when the path does not exist. The first answer for a canonical path
    /// is cached and returned unchanged afterwards.
    ///
    /// # Errors
    /// Returns error if the path cannot be resolved for a reason other than not existing, or if
    /// the sniffing service fails or answers in an unexpected form.
    pub fn classify(&mut self, path: &Path) -> Result<Option<Classification>> {
        let resolved = match path.canonicalize() {
            Ok(resolved) => resolved,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if let Some(hit) = self.history.get(&resolved) {
            return Ok(Some(hit.clone()));
        }

        let raw = self.sniffer.sniff(&resolved)?;
        let classification = Classification::parse(&raw)
            .ok_or_else(|| Error::MalformedSniff { path: resolved.clone(), raw: raw.clone() })?;
        debug!("{} -> {raw}", resolved.display());

        self.stats.record(&raw, &classification);
        self.history.insert(resolved, classification.clone());
        Ok(Some(classification))
    }

    /// Whether `path` holds binary content
    ///
    /// # Errors
    /// Returns error if classification fails.
    pub fn is_binary(&mut self, path: &Path) -> Result<Option<bool>> {
        Ok(self.classify(path)?.map(|c| c.is_binary()))
    }

    /// Whether `path` holds text content
    ///
    /// # Errors
    /// Returns error if classification fails.
    pub fn is_text(&mut self, path: &Path) -> Result<Option<bool>> {
        Ok(self.is_binary(path)?.map(|binary| !binary))
    }

    /// Codec of `path`
    ///
    /// # Errors
    /// Returns error if classification fails.
    pub fn get_codec(&mut self, path: &Path) -> Result<Option<String>> {
        Ok(self.classify(path)?.map(|c| c.codec))
    }

    /// MIME type of `path`
    ///
    /// # Errors
    /// Returns error if classification fails.
    pub fn get_type(&mut self, path: &Path) -> Result<Option<String>> {
        Ok(self.classify(path)?.map(|c| c.mime))
    }

    /// Counters accumulated since the last [`reset_stats`](Self::reset_stats)
    #[must_use]
    pub const fn stats(&self) -> &SniffStats {
        &self.stats
    }

    /// Number of cached classifications
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Clear the counters
    pub fn reset_stats(&mut self) {
        self.stats.clear();
    }

    /// Clear the classification cache
    pub fn reset_history(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tempfile::TempDir;

    use super::*;
    use crate::text::ContentSniffer;

    /// Sniffer that counts its invocations
    struct CountingSniffer {
        calls: Arc<AtomicUsize>,
        reply: &'static str,
    }

    impl Sniffer for CountingSniffer {
        fn sniff(&self, _path: &Path) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.to_owned())
        }
    }

    fn counting(reply: &'static str) -> (TypeClassifier, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let sniffer = CountingSniffer { calls: Arc::clone(&calls), reply };
        (TypeClassifier::new(Arc::new(sniffer)), calls)
    }

    #[test]
    fn test_parse_strips_prefixes() {
        let c = Classification::parse("text/plain; charset=us-ascii").unwrap();
        assert_eq!(c.mime, "text/plain");
        assert_eq!(c.codec, "us-ascii");

        let c = Classification::parse("text/x-c; encoding=utf-8").unwrap();
        assert_eq!(c.codec, "utf-8");

        let c = Classification::parse("application/zip; binary").unwrap();
        assert!(c.is_binary());

        assert!(Classification::parse("text/plain").is_none());
    }

    #[test]
    fn test_memoization() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.txt");
        fs::write(&file, "hello\n").unwrap();

        let (mut classifier, calls) = counting("text/plain; charset=us-ascii");
        let first = classifier.classify(&file).unwrap();
        let second = classifier.classify(&file).unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cache_keyed_by_resolved_path() {
        let temp_dir = TempDir::new().unwrap();
        let sub = temp_dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        let file = temp_dir.path().join("a.txt");
        fs::write(&file, "hello\n").unwrap();

        let (mut classifier, calls) = counting("text/plain; charset=us-ascii");
        classifier.classify(&file).unwrap();
        classifier.classify(&sub.join("..").join("a.txt")).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(classifier.history_len(), 1);
    }

    #[test]
    fn test_missing_path_is_absent() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");

        let (mut classifier, calls) = counting("text/plain; charset=us-ascii");
        assert_eq!(classifier.classify(&missing).unwrap(), None);
        assert_eq!(classifier.is_binary(&missing).unwrap(), None);
        assert_eq!(classifier.is_text(&missing).unwrap(), None);
        assert_eq!(classifier.get_codec(&missing).unwrap(), None);
        assert_eq!(classifier.get_type(&missing).unwrap(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_unresolvable_path_is_an_error() {
        use std::os::unix::fs::symlink;

        let temp_dir = TempDir::new().unwrap();
        let looped = temp_dir.path().join("loop");
        symlink(&looped, &looped).unwrap();

        let (mut classifier, calls) = counting("text/plain; charset=us-ascii");
        assert!(matches!(classifier.classify(&looped), Err(Error::Io(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(classifier.history_len(), 0);
    }

    #[test]
    fn test_reset_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.txt");
        fs::write(&file, "hello\n").unwrap();

        let (mut classifier, calls) = counting("text/plain; charset=us-ascii");
        classifier.classify(&file).unwrap();
        assert!(!classifier.stats().is_empty());

        classifier.reset_history();
        classifier.reset_stats();
        assert_eq!(classifier.history_len(), 0);
        assert!(classifier.stats().is_empty());

        classifier.classify(&file).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(classifier.history_len(), 1);
        assert_eq!(classifier.stats().types.get("text/plain"), Some(&1));
        assert_eq!(classifier.stats().codecs.get("us-ascii"), Some(&1));
        assert_eq!(classifier.stats().type_codec.get("text/plain; charset=us-ascii"), Some(&1));
    }

    #[test]
    fn test_derived_queries_with_content_sniffer() {
        let temp_dir = TempDir::new().unwrap();
        let text = temp_dir.path().join("a.txt");
        let binary = temp_dir.path().join("b.bin");
        fs::write(&text, "hello\nworld\n").unwrap();
        fs::write(&binary, b"\x7FELF\x02\x01\x01\x00").unwrap();

        let mut classifier = TypeClassifier::new(Arc::new(ContentSniffer::new()));
        assert_eq!(classifier.is_text(&text).unwrap(), Some(true));
        assert_eq!(classifier.get_codec(&text).unwrap().as_deref(), Some("us-ascii"));
        assert_eq!(classifier.is_binary(&binary).unwrap(), Some(true));
        assert_eq!(
            classifier.get_type(&binary).unwrap().as_deref(),
            Some("application/x-executable")
        );
    }

    #[test]
    fn test_malformed_sniff() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.txt");
        fs::write(&file, "hello\n").unwrap();

        let (mut classifier, _) = counting("garbage");
        assert!(matches!(classifier.classify(&file), Err(Error::MalformedSniff { .. })));
        assert_eq!(classifier.history_len(), 0);
    }
}
