//! Content search over files, directory trees and streams
//!
//! A [`ContentSearcher`] expands its inputs into candidates, opens each one through the
//! [`ReaderRegistry`] and reports whether any line matches any pattern. Candidates are searched
//! either one after another on the calling thread, or by a pool of workers fed through a
//! channel. In the pool, results are printed in the order they arrive.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use regex::Regex;
use tracing::{debug, warn};

use crate::classify::TypeClassifier;
use crate::crawler::{Crawler, Find, TraversalSpec};
use crate::error::{Error, ErrorPolicy, Result};
use crate::kind::{self, PathKind};
use crate::reader::ReaderRegistry;
use crate::text::{ContentSniffer, Lines, Sniffer};
use crate::types::{STDIN_NAME, SearchResult};

/// Workers used for `hw` hardware threads
#[must_use]
pub fn worker_count(hw: usize) -> usize {
    (hw / 2).max(1)
}

/// Where patterns come from
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PatternSources {
    /// Regular expressions
    pub regex:       Vec<String>,
    /// Fixed strings
    pub fixed:       Vec<String>,
    /// Files holding one regular expression per line
    pub regex_files: Vec<PathBuf>,
    /// Files holding one fixed string per line
    pub fixed_files: Vec<PathBuf>,
}

/// Compiled patterns
///
/// A line matches if any regular expression is found anywhere in it, or if it contains any of
/// the fixed strings.
#[derive(Debug, Default, Clone)]
pub struct PatternSet {
    regexes: Vec<Regex>,
    fixed:   Vec<String>,
}

impl PatternSet {
    /// Compile all sources
    ///
    /// An expression that does not compile, or a pattern file that cannot be read, is reported
    /// through `policy` and left out.
    ///
    /// # Errors
    /// Returns the first such failure when `policy` escalates.
    pub fn build(sources: &PatternSources, policy: ErrorPolicy) -> Result<Self> {
        let mut set = Self::default();

        for pattern in &sources.regex {
            set.push_regex(pattern, policy)?;
        }
        for path in &sources.regex_files {
            match read_pattern_file(path) {
                Ok(patterns) => {
                    for pattern in &patterns {
                        set.push_regex(pattern, policy)?;
                    }
                },
                Err(e) => policy.report(e)?,
            }
        }

        set.fixed.extend(sources.fixed.iter().cloned());
        for path in &sources.fixed_files {
            match read_pattern_file(path) {
                Ok(patterns) => set.fixed.extend(patterns),
                Err(e) => policy.report(e)?,
            }
        }

        debug!("Compiled {} regex and {} fixed patterns", set.regexes.len(), set.fixed.len());
        Ok(set)
    }

    fn push_regex(&mut self, pattern: &str, policy: ErrorPolicy) -> Result<()> {
        match Regex::new(pattern) {
            Ok(re) => self.regexes.push(re),
            Err(source) => {
                policy.report(Error::InvalidPattern { pattern: pattern.to_owned(), source })?;
            },
        }
        Ok(())
    }

    /// Whether `line` matches any pattern
    #[must_use]
    pub fn is_match(&self, line: &str) -> bool {
        self.regexes.iter().any(|re| re.is_match(line))
            || self.fixed.iter().any(|fixed| line.contains(fixed.as_str()))
    }

    /// Number of compiled regular expressions
    #[must_use]
    pub const fn regex_count(&self) -> usize {
        self.regexes.len()
    }

    /// Number of fixed strings
    #[must_use]
    pub const fn fixed_count(&self) -> usize {
        self.fixed.len()
    }

    /// Returns true if no pattern survived compilation
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.regexes.is_empty() && self.fixed.is_empty()
    }
}

fn read_pattern_file(path: &Path) -> Result<Vec<String>> {
    let pattern_file = |source| Error::PatternFile { path: path.to_path_buf(), source };
    let file = File::open(path).map_err(pattern_file)?;
    BufReader::new(file).lines().collect::<io::Result<_>>().map_err(pattern_file)
}

/// A readable stream with a display name
pub struct NamedStream {
    name:   String,
    reader: Box<dyn BufRead + Send>,
}

impl fmt::Debug for NamedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedStream").field("name", &self.name).finish_non_exhaustive()
    }
}

impl NamedStream {
    /// Wrap `reader` under `name`
    pub fn new(name: impl Into<String>, reader: impl BufRead + Send + 'static) -> Self {
        Self { name: name.into(), reader: Box::new(reader) }
    }

    /// Standard input
    #[must_use]
    pub fn stdin() -> Self {
        Self::new(STDIN_NAME, BufReader::new(io::stdin()))
    }

    /// Display name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One unit of search work
#[derive(Debug)]
pub enum Candidate {
    /// A path on disk
    Path(PathBuf),
    /// An already open stream
    Stream(NamedStream),
}

impl Candidate {
    /// Name printed for a match
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Stream(stream) => stream.name.clone(),
        }
    }
}

impl From<PathBuf> for Candidate {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<NamedStream> for Candidate {
    fn from(stream: NamedStream) -> Self {
        Self::Stream(stream)
    }
}

/// Search behaviour switches
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    /// Never start workers
    pub sequential: bool,
    /// Log the MIME type of every searched path
    pub debug_info: bool,
    /// Handling of per-candidate failures
    pub policy:     ErrorPolicy,
}

/// Decides, per candidate, whether any line matches any pattern
pub struct ContentSearcher {
    patterns:  PatternSet,
    options:   SearchOptions,
    sniffer:   Arc<dyn Sniffer>,
    readers:   ReaderRegistry,
    interrupt: Option<Arc<AtomicBool>>,
}

impl fmt::Debug for ContentSearcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentSearcher")
            .field("patterns", &self.patterns)
            .field("options", &self.options)
            .field("readers", &self.readers)
            .finish_non_exhaustive()
    }
}

impl ContentSearcher {
    /// Compile `sources` into a searcher with the default sniffer and readers
    ///
    /// # Errors
    /// Returns error if a pattern fails and `options.policy` escalates.
    pub fn new(sources: &PatternSources, options: SearchOptions) -> Result<Self> {
        let patterns = PatternSet::build(sources, options.policy)?;
        Ok(Self::with_patterns(patterns, options))
    }

    /// Create a searcher from compiled patterns
    #[must_use]
    pub fn with_patterns(patterns: PatternSet, options: SearchOptions) -> Self {
        Self {
            patterns,
            options,
            sniffer: Arc::new(ContentSniffer::new()),
            readers: ReaderRegistry::default(),
            interrupt: None,
        }
    }

    /// Replace the sniffing service
    #[must_use]
    pub fn with_sniffer(mut self, sniffer: Arc<dyn Sniffer>) -> Self {
        self.sniffer = sniffer;
        self
    }

    /// Replace the reader registry
    #[must_use]
    pub fn with_readers(mut self, readers: ReaderRegistry) -> Self {
        self.readers = readers;
        self
    }

    /// Stop once `flag` is set
    #[must_use]
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    /// The compiled patterns
    #[must_use]
    pub const fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    /// A classifier sharing this searcher's sniffer
    #[must_use]
    pub fn classifier(&self) -> TypeClassifier {
        TypeClassifier::new(Arc::clone(&self.sniffer))
    }

    fn interrupted(&self) -> bool {
        self.interrupt.as_ref().is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn check_interrupt(&self) -> Result<()> {
        if self.interrupted() { Err(Error::Interrupted) } else { Ok(()) }
    }

    /// Expand inputs into searchable candidates, lazily
    ///
    /// Regular files and streams pass through. Directories are replaced by every
    /// non-directory below them. Anything else is reported and skipped.
    #[must_use]
    pub fn expand(&self, inputs: Vec<Candidate>) -> Expand<'_> {
        Expand { searcher: self, inputs: inputs.into_iter(), walk: None, done: false }
    }

    /// Search one candidate
    ///
    /// A path that no reader accepts is skipped with a warning and never matches. Scanning
    /// stops at the first matching line, so later lines are never decoded.
    ///
    /// # Errors
    /// Returns error if the candidate cannot be opened, sniffed or decoded up to the first
    /// match.
    pub fn search_file(
        &self,
        candidate: Candidate,
        classifier: &mut TypeClassifier,
    ) -> Result<SearchResult> {
        match candidate {
            Candidate::Path(path) => {
                let name = path.display().to_string();
                if self.options.debug_info {
                    debug!("{name}: {}", kind::mime_type(self.sniffer.as_ref(), &path)?);
                }
                let Some(lines) = self.readers.open(&path, self.sniffer.as_ref(), classifier)?
                else {
                    self.options.policy.warn(format_args!("Ignoring non-text file: {name}"));
                    return Ok(SearchResult::miss(name));
                };
                self.scan(name, lines)
            },
            Candidate::Stream(stream) => {
                let lines = Lines::new(stream.reader, "utf-8", stream.name.as_str());
                self.scan(stream.name, lines)
            },
        }
    }

    fn scan(
        &self,
        name: String,
        lines: impl Iterator<Item = Result<String>>,
    ) -> Result<SearchResult> {
        for line in lines {
            if self.patterns.is_match(&line?) {
                return Ok(SearchResult { name, matched: true });
            }
        }
        Ok(SearchResult::miss(name))
    }

    /// Search one candidate, routing failures through the error policy
    ///
    /// # Errors
    /// Returns the wrapped failure when the policy escalates.
    pub fn search_candidate(
        &self,
        candidate: Candidate,
        classifier: &mut TypeClassifier,
    ) -> Result<SearchResult> {
        let name = candidate.name();
        match self.search_file(candidate, classifier) {
            Ok(result) => Ok(result),
            Err(e) => {
                self.options.policy.report(Error::candidate(&name, &e))?;
                Ok(SearchResult::miss(name))
            },
        }
    }

    /// Search all inputs, writing the name of every match to `out`
    ///
    /// Uses a worker pool unless sequential processing was requested or the hardware
    /// concurrency is unknown. Returns the number of matches written.
    ///
    /// # Errors
    /// Returns error on an escalated failure, an interrupt, or a failed write.
    pub fn search_files(&self, inputs: Vec<Candidate>, out: &mut dyn Write) -> Result<usize> {
        match thread::available_parallelism() {
            Ok(hw) if !self.options.sequential => {
                self.search_parallel(inputs, worker_count(hw.get()), out)
            },
            Ok(_) => self.search_sequential(inputs, out),
            Err(e) => {
                warn!("Unknown hardware concurrency ({e}), searching sequentially");
                self.search_sequential(inputs, out)
            },
        }
    }

    /// Search inputs one after another, printing matches in input order
    ///
    /// # Errors
    /// Returns error on an escalated failure, an interrupt, or a failed write.
    pub fn search_sequential(&self, inputs: Vec<Candidate>, out: &mut dyn Write) -> Result<usize> {
        let mut classifier = self.classifier();
        let mut printed = 0;
        for candidate in self.expand(inputs) {
            let candidate = candidate?;
            self.check_interrupt()?;
            let result = self.search_candidate(candidate, &mut classifier)?;
            emit(out, &result, &mut printed)?;
        }
        debug!("Searched sequentially, {} paths classified", classifier.history_len());
        Ok(printed)
    }

    /// Search inputs with `workers` threads, printing matches as they complete
    ///
    /// Each worker owns its classifier. Expansion happens on the calling thread, which also
    /// drains finished results between submissions.
    ///
    /// # Errors
    /// Returns error on an escalated failure, an interrupt, or a failed write.
    pub fn search_parallel(
        &self,
        inputs: Vec<Candidate>,
        workers: usize,
        out: &mut dyn Write,
    ) -> Result<usize> {
        let workers = workers.max(1);
        let halt = AtomicBool::new(false);
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<Candidate>();
        let (result_tx, result_rx) = crossbeam_channel::unbounded::<Result<SearchResult>>();
        debug!("Searching with {workers} workers");

        thread::scope(|scope| {
            for id in 0..workers {
                let jobs = job_rx.clone();
                let results = result_tx.clone();
                let halt = &halt;
                scope.spawn(move || {
                    let mut classifier = self.classifier();
                    for candidate in jobs {
                        if halt.load(Ordering::SeqCst) || self.interrupted() {
                            break;
                        }
                        if results.send(self.search_candidate(candidate, &mut classifier)).is_err()
                        {
                            break;
                        }
                    }
                    debug!("Worker {id} done, {} paths classified", classifier.history_len());
                });
            }
            drop(job_rx);
            drop(result_tx);

            let outcome = self.feed(inputs, job_tx, &result_rx, out);
            if outcome.is_err() {
                halt.store(true, Ordering::SeqCst);
            }
            outcome
        })
    }

    fn feed(
        &self,
        inputs: Vec<Candidate>,
        jobs: Sender<Candidate>,
        results: &Receiver<Result<SearchResult>>,
        out: &mut dyn Write,
    ) -> Result<usize> {
        let mut printed = 0;
        for candidate in self.expand(inputs) {
            let candidate = candidate?;
            self.check_interrupt()?;
            if jobs.send(candidate).is_err() {
                break;
            }
            while let Ok(result) = results.try_recv() {
                emit(out, &result?, &mut printed)?;
            }
        }
        drop(jobs);

        for result in results {
            emit(out, &result?, &mut printed)?;
        }
        self.check_interrupt()?;
        Ok(printed)
    }
}

fn emit(out: &mut dyn Write, result: &SearchResult, printed: &mut usize) -> Result<()> {
    if result.matched {
        writeln!(out, "{}", result.name)?;
        *printed += 1;
    }
    Ok(())
}

/// Lazy candidate expansion, see [`ContentSearcher::expand`]
#[derive(Debug)]
pub struct Expand<'a> {
    searcher: &'a ContentSearcher,
    inputs:   std::vec::IntoIter<Candidate>,
    walk:     Option<Find<Crawler>>,
    done:     bool,
}

impl Expand<'_> {
    /// Report `err`; yields it if the policy escalates
    fn absorb(&mut self, err: Error) -> Option<Result<Candidate>> {
        match self.searcher.options.policy.report(err) {
            Ok(()) => None,
            Err(e) => {
                self.done = true;
                Some(Err(e))
            },
        }
    }

    fn resolve(&mut self, path: PathBuf) -> Option<Result<Candidate>> {
        if fs::metadata(&path).is_err() {
            return self.absorb(Error::NotFound(path));
        }
        match PathKind::of(&path) {
            Ok(PathKind::RegularFile) => Some(Ok(Candidate::Path(path))),
            Ok(PathKind::Directory) => {
                self.walk = Some(Crawler::new(TraversalSpec::new(path)).into_iter());
                None
            },
            Ok(other) => self.absorb(Error::UnsupportedInput { path, kind: other.code() }),
            Err(e) => self.absorb(e),
        }
    }
}

impl Iterator for Expand<'_> {
    type Item = Result<Candidate>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            if self.searcher.interrupted() {
                self.done = true;
                return Some(Err(Error::Interrupted));
            }

            if let Some(walk) = self.walk.as_mut() {
                match walk.next() {
                    Some(Ok(path)) if path.is_dir() => {},
                    Some(Ok(path)) => return Some(Ok(Candidate::Path(path))),
                    Some(Err(e)) => {
                        if let Some(escalated) = self.absorb(e) {
                            return Some(escalated);
                        }
                    },
                    None => self.walk = None,
                }
                continue;
            }

            let produced = match self.inputs.next()? {
                Candidate::Path(path) => self.resolve(path),
                stream @ Candidate::Stream(_) => Some(Ok(stream)),
            };
            if produced.is_some() {
                return produced;
            }
        }
    }
}
