//! `sift-grep` - report which files contain a line matching any pattern.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use clap::{Parser, ValueEnum};
use clap_cargo::style::CLAP_STYLING;
use pathsift::{
    Candidate, ContentSearcher, ErrorPolicy, NamedStream, PatternSources, Result,
    SearchOptions, args, interrupt, logging,
};
use tracing::{debug, error};

/// Value of `--color`
#[derive(ValueEnum, Clone, Copy, Debug)]
enum ColorWhen {
    Never,
    Always,
    Auto,
}

/// CLI arguments for `sift-grep`
#[derive(Parser, Debug)]
#[command(author, version, about = "A grep that understands file content.", styles = CLAP_STYLING)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Interpret PATTERN as a regular expression
    #[arg(short = 'e', long = "regexp", value_name = "PATTERN", help_heading = "Specify patterns")]
    regexp:              Vec<String>,
    /// Interpret PATTERN as a fixed string
    #[arg(short = 'f', long, value_name = "PATTERN", help_heading = "Specify patterns")]
    fixed_string:        Vec<String>,
    /// Obtain regular expressions from FILE, one per line
    #[arg(long, value_name = "FILE", help_heading = "Specify patterns")]
    file_regex:          Vec<PathBuf>,
    /// Obtain fixed strings from FILE, one per line
    #[arg(long, value_name = "FILE", help_heading = "Specify patterns")]
    file_fixed_string:   Vec<PathBuf>,

    /// Files or directories to search; `-` or nothing reads standard input
    file: Vec<String>,

    /// Accepted, not applied
    #[arg(short = 'i', long, help_heading = "Match control")]
    ignore_case:         bool,
    /// Accepted, not applied
    #[arg(short = 'v', long, help_heading = "Match control")]
    invert_match:        bool,

    /// Accepted, not applied
    #[arg(short = 'c', long, help_heading = "Output control")]
    count:               bool,
    /// Accepted, not applied
    #[arg(long, alias = "colour", value_name = "WHEN", help_heading = "Output control")]
    color:               Option<ColorWhen>,
    /// Accepted, not applied
    #[arg(short = 'L', long, help_heading = "Output control")]
    files_without_match: bool,
    /// Accepted, not applied; only file names are ever printed
    #[arg(short = 'l', long, help_heading = "Output control")]
    files_with_match:    bool,
    /// Accepted, not applied
    #[arg(
        short = 'm',
        long,
        value_name = "NUM",
        allow_negative_numbers = true,
        help_heading = "Output control"
    )]
    max_count:           Option<i64>,
    /// Accepted, not applied
    #[arg(short = 'o', long, help_heading = "Output control")]
    only_matching:       bool,
    /// Accepted, not applied
    #[arg(short = 'q', long, alias = "silent", help_heading = "Output control")]
    quiet:               bool,
    /// Suppress error messages about nonexistent or unreadable files
    #[arg(short = 's', long, help_heading = "Output control")]
    no_message:          bool,
    /// Stop at the first error
    #[arg(long, help_heading = "Output control")]
    quit_on_error:       bool,

    /// Enable debug logs
    #[arg(long)]
    debug_info:            bool,
    /// Search files one after another on a single thread
    #[arg(long)]
    sequential_processing: bool,
}

impl Cli {
    /// Compatibility flags that were given
    fn ignored_flags(&self) -> Vec<&'static str> {
        [
            (self.ignore_case, "--ignore-case"),
            (self.invert_match, "--invert-match"),
            (self.count, "--count"),
            (self.color.is_some(), "--color"),
            (self.files_without_match, "--files-without-match"),
            (self.files_with_match, "--files-with-match"),
            (self.max_count.is_some(), "--max-count"),
            (self.only_matching, "--only-matching"),
            (self.quiet, "--quiet"),
        ]
        .into_iter()
        .filter_map(|(given, flag)| given.then_some(flag))
        .collect()
    }

    fn sources(&self) -> PatternSources {
        PatternSources {
            regex:       self.regexp.clone(),
            fixed:       self.fixed_string.clone(),
            regex_files: self.file_regex.clone(),
            fixed_files: self.file_fixed_string.clone(),
        }
    }

    fn inputs(&self) -> Vec<Candidate> {
        if self.file.is_empty() {
            return vec![NamedStream::stdin().into()];
        }
        self.file
            .iter()
            .map(|file| {
                if file == "-" { NamedStream::stdin().into() } else { PathBuf::from(file).into() }
            })
            .collect()
    }
}

fn run(cli: &Cli, policy: ErrorPolicy, flag: Arc<AtomicBool>, out: &mut impl Write) -> Result<()> {
    let options = SearchOptions {
        sequential: cli.sequential_processing,
        debug_info: cli.debug_info,
        policy,
    };
    let searcher = ContentSearcher::new(&cli.sources(), options)?.with_interrupt(flag);
    let printed = searcher.search_files(cli.inputs(), out)?;
    debug!("{printed} files matched");
    out.flush()?;
    Ok(())
}

fn main() {
    let cli = Cli::parse_from(args::normalize(
        std::env::args_os().map(|arg| arg.to_string_lossy().into_owned()),
    ));
    logging::init(cli.debug_info);
    debug!("{cli:?}");

    let policy = ErrorPolicy::new(cli.no_message, cli.quit_on_error);
    let ignored = cli.ignored_flags();
    if !ignored.is_empty() {
        policy.warn(format_args!("Ignoring unsupported options: {}", ignored.join(", ")));
    }

    let flag = interrupt::install();
    if let Err(e) = run(&cli, policy, flag, &mut io::stdout().lock()) {
        if policy.needs_logging(&e) {
            error!("{e}");
        }
        std::process::exit(e.exit_code());
    }
}
