//! `PathSift` - find, classify and grep files by what they contain.

#![deny(
    warnings,
    missing_debug_implementations,
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]

pub mod action;
pub mod classify;
pub mod crawler;
pub mod error;
pub mod kind;
pub mod reader;
pub mod search;
pub mod text;
pub mod types;

#[cfg(feature = "cli")]
pub mod args;
#[cfg(feature = "cli")]
pub mod interrupt;
#[cfg(feature = "cli")]
pub mod logging;

pub use action::{ActionExecutor, CommandTemplate};
pub use classify::{Classification, TypeClassifier};
pub use crawler::{Crawler, NameFilter, TraversalSpec};
pub use error::{Error, ErrorPolicy, Result};
pub use kind::PathKind;
pub use reader::ReaderRegistry;
pub use search::{Candidate, ContentSearcher, NamedStream, PatternSources, SearchOptions};
pub use text::{ContentSniffer, Sniffer};
