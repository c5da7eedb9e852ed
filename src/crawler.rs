//! Depth-bounded directory traversal with kind and name filters
//!
//! Depth counts path components below the root plus one, so the root itself is at depth 1
//! and `root/a.txt` at depth 2. Depth bounds only decide which entries are reported; the
//! walk always descends into every subdirectory.

use std::borrow::Borrow;
use std::collections::{BTreeSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use regex::Regex;
use tracing::debug;

use crate::action::ActionExecutor;
use crate::error::{Error, Result};
use crate::kind::PathKind;

/// Depth of `path` below `root`, with the root at depth 1
#[must_use]
pub fn depth(root: &Path, path: &Path) -> usize {
    1 + path.strip_prefix(root).map_or(0, |rel| rel.components().count())
}

/// Base-name filter built from regular expressions
///
/// A name passes when any pattern matches starting at its first character. The match does not
/// have to cover the whole name.
#[derive(Debug, Clone)]
pub struct NameFilter {
    patterns: Vec<Regex>,
}

impl NameFilter {
    /// Compile `patterns`
    ///
    /// # Errors
    /// Returns [`Error::InvalidPattern`] for the first pattern that does not compile.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                let p = p.as_ref();
                Regex::new(p)
                    .map_err(|source| Error::InvalidPattern { pattern: p.to_owned(), source })
            })
            .collect::<Result<_>>()?;
        Ok(Self { patterns })
    }

    /// Returns true if any pattern matches at the start of `name`
    #[must_use]
    pub fn is_match(&self, name: &str) -> bool {
        self.patterns.iter().any(|re| re.find(name).is_some_and(|m| m.start() == 0))
    }
}

/// What to walk and which entries to report
#[derive(Debug, Clone, Default)]
pub struct TraversalSpec {
    /// Starting point
    pub root:      PathBuf,
    /// Largest reported depth, inclusive
    pub max_depth: Option<usize>,
    /// Smallest reported depth, inclusive
    pub min_depth: Option<usize>,
    /// Accepted kinds; `None` accepts all
    pub kinds:     Option<BTreeSet<PathKind>>,
    /// Accepted names; `None` accepts all
    pub names:     Option<NameFilter>,
}

impl TraversalSpec {
    /// Unfiltered walk of `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), ..Self::default() }
    }

    /// Set the largest reported depth
    #[must_use]
    pub const fn max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set the smallest reported depth
    #[must_use]
    pub const fn min_depth(mut self, depth: Option<usize>) -> Self {
        self.min_depth = depth;
        self
    }

    /// Restrict reported kinds
    #[must_use]
    pub fn kinds(mut self, kinds: Option<BTreeSet<PathKind>>) -> Self {
        self.kinds = kinds;
        self
    }

    /// Restrict reported names
    #[must_use]
    pub fn names(mut self, names: Option<NameFilter>) -> Self {
        self.names = names;
        self
    }

    /// Depth bound from a command-line value, where negative means unbounded
    #[must_use]
    pub fn depth_arg(value: i64) -> Option<usize> {
        usize::try_from(value).ok()
    }

    fn accepts(&self, path: &Path) -> Result<bool> {
        let depth = depth(&self.root, path);
        if self.max_depth.is_some_and(|max| depth > max)
            || self.min_depth.is_some_and(|min| depth < min)
        {
            return Ok(false);
        }
        if let Some(kinds) = &self.kinds
            && !kinds.contains(&PathKind::of(path)?)
        {
            return Ok(false);
        }
        if let Some(names) = &self.names {
            let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
            if !names.is_match(&name) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Walks a [`TraversalSpec`], yielding matches or running an action on each
#[derive(Debug)]
pub struct Crawler {
    spec:      TraversalSpec,
    action:    Option<ActionExecutor>,
    interrupt: Option<Arc<AtomicBool>>,
}

impl Crawler {
    /// Create a crawler for `spec`
    #[must_use]
    pub const fn new(spec: TraversalSpec) -> Self {
        Self { spec, action: None, interrupt: None }
    }

    /// Run `action` on every match instead of yielding it
    #[must_use]
    pub fn with_action(mut self, action: ActionExecutor) -> Self {
        self.action = Some(action);
        self
    }

    /// Stop with [`Error::Interrupted`] once `flag` is set
    #[must_use]
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    /// The traversal being performed
    #[must_use]
    pub const fn spec(&self) -> &TraversalSpec {
        &self.spec
    }

    /// Start a walk
    ///
    /// The returned iterator is lazy and one-shot. With an action attached it yields no paths;
    /// driving it runs the action on each match instead. A root that is not a directory is
    /// checked as a single entry; a missing root yields nothing.
    #[must_use]
    pub fn find(&self) -> Find<&Self> {
        Find::new(self)
    }

    fn interrupted(&self) -> bool {
        self.interrupt.as_ref().is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

impl IntoIterator for Crawler {
    type IntoIter = Find<Self>;
    type Item = Result<PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        Find::new(self)
    }
}

/// Lazy walk over a [`Crawler`]'s tree
///
/// Directories are visited top-down: a directory, then its non-directory entries sorted by
/// name, then each subdirectory in name order.
#[derive(Debug)]
pub struct Find<C> {
    crawler: C,
    /// Directories still to expand, last is next
    dirs:    Vec<PathBuf>,
    /// Entries of the current directory still to check
    pending: VecDeque<PathBuf>,
}

impl<C: Borrow<Crawler>> Find<C> {
    fn new(crawler: C) -> Self {
        let root = crawler.borrow().spec.root.clone();
        let mut find = Self { crawler, dirs: Vec::new(), pending: VecDeque::new() };
        if fs::metadata(&root).is_ok_and(|m| m.is_dir()) {
            find.dirs.push(root);
        } else if fs::symlink_metadata(&root).is_ok() {
            find.pending.push_back(root);
        } else {
            debug!("{} does not exist", root.display());
        }
        find
    }

    fn expand(&mut self, dir: PathBuf) {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cannot read {}: {e}", dir.display());
                self.pending.push_back(dir);
                return;
            },
        };

        let mut files = Vec::new();
        let mut subdirs = Vec::new();
        for entry in entries.flatten() {
            if entry.file_type().is_ok_and(|t| t.is_dir()) {
                subdirs.push(entry.path());
            } else {
                files.push(entry.path());
            }
        }
        files.sort();
        subdirs.sort();

        self.pending.push_back(dir);
        self.pending.extend(files);
        self.dirs.extend(subdirs.into_iter().rev());
    }
}

impl<C: Borrow<Crawler>> Iterator for Find<C> {
    type Item = Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let crawler = self.crawler.borrow();
            if crawler.interrupted() {
                self.dirs.clear();
                self.pending.clear();
                return Some(Err(Error::Interrupted));
            }

            let Some(path) = self.pending.pop_front() else {
                let dir = self.dirs.pop()?;
                self.expand(dir);
                continue;
            };

            match crawler.spec.accepts(&path) {
                Ok(true) => match &crawler.action {
                    Some(action) => action.execute(&path),
                    None => return Some(Ok(path)),
                },
                Ok(false) => {},
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
