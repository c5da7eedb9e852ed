//! `sift-type` - print the MIME type and codec of files.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use clap_cargo::style::CLAP_STYLING;
use pathsift::classify::Classification;
use pathsift::{
    ContentSniffer, Crawler, Error, ErrorPolicy, Result, TraversalSpec, TypeClassifier, args,
    interrupt, logging,
};
use tracing::{debug, error};

/// CLI arguments for `sift-type`
#[derive(Parser, Debug)]
#[command(author, version, about = "Guess file type and codec.", styles = CLAP_STYLING)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Files or directories to check; directories are searched recursively
    #[arg(required = true)]
    targets:     Vec<PathBuf>,
    /// Print type of file
    #[arg(short = 't', long = "type")]
    print_type:  bool,
    /// Print codec of file
    #[arg(short = 'c', long = "codec")]
    print_codec: bool,
    /// Print path of file
    #[arg(short = 'p', long = "path")]
    print_path:  bool,
    /// Report entries at most this deep (the starting point is 1); negative means unbounded
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    maxdepth:    i64,
    /// Report entries at least this deep (the starting point is 1); negative means unbounded
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    mindepth:    i64,
    /// Enable debug logs
    #[arg(long)]
    debug_info:  bool,
}

impl Cli {
    /// One output line for a classified path
    fn describe(&self, path: &Path, classification: &Classification) -> String {
        let prefix = if self.print_path { format!("{}: ", path.display()) } else { String::new() };
        match (self.print_type, self.print_codec) {
            (true, false) => format!("{prefix}{}", classification.mime),
            (false, true) => format!("{prefix}{}", classification.codec),
            _ => format!("{prefix}{}; {}", classification.mime, classification.codec),
        }
    }
}

/// Classify one path and print the result
fn report(
    cli: &Cli,
    path: &Path,
    classifier: &mut TypeClassifier,
    out: &mut impl Write,
) -> Result<()> {
    match classifier.classify(path) {
        Ok(Some(classification)) => writeln!(out, "{}", cli.describe(path, &classification))?,
        Ok(None) => error!("Cannot decide type and codec of file: {}", path.display()),
        Err(e) => ErrorPolicy::default().report(e)?,
    }
    Ok(())
}

fn run(
    cli: &Cli,
    flag: &Arc<AtomicBool>,
    classifier: &mut TypeClassifier,
    out: &mut impl Write,
) -> Result<()> {
    for target in &cli.targets {
        let Ok(target) = target.canonicalize() else {
            debug!("Skipping missing target: {}", target.display());
            continue;
        };
        debug!("Processing target: {}", target.display());

        if target.is_file() {
            report(cli, &target, classifier, out)?;
        } else if target.is_dir() {
            let spec = TraversalSpec::new(&target)
                .max_depth(TraversalSpec::depth_arg(cli.maxdepth))
                .min_depth(TraversalSpec::depth_arg(cli.mindepth));
            for path in Crawler::new(spec).with_interrupt(Arc::clone(flag)) {
                let path = path?;
                if path.is_dir() || !path.exists() {
                    continue;
                }
                report(cli, &path, classifier, out)?;
            }
        }

        if flag.load(Ordering::SeqCst) {
            return Err(Error::Interrupted);
        }
    }
    out.flush()?;
    Ok(())
}

fn main() {
    let cli = Cli::parse_from(args::normalize(
        std::env::args_os().map(|arg| arg.to_string_lossy().into_owned()),
    ));
    logging::init(cli.debug_info);
    let flag = interrupt::install();

    let mut classifier = TypeClassifier::new(Arc::new(ContentSniffer::new()));
    let result = run(&cli, &flag, &mut classifier, &mut io::stdout().lock());
    classifier.stats().log_summary();

    if let Err(e) = result {
        if !matches!(e, Error::Interrupted) {
            error!("{e}");
        }
        std::process::exit(e.exit_code());
    }
}
