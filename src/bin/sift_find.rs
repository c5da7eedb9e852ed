//! `sift-find` - walk directory trees and report or act on matching entries.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use clap::Parser;
use clap_cargo::style::CLAP_STYLING;
use pathsift::{
    ActionExecutor, CommandTemplate, Crawler, Error, NameFilter, PathKind, Result, TraversalSpec,
    args, interrupt, logging,
};
use tracing::{error, warn};

/// CLI arguments for `sift-find`
///
/// Everything after `-exec` is the command template and is split off before parsing.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Same as find in bash.",
    after_help = "-exec CMD...  Run CMD for every match; {} is the path, ; or \\; ends a command",
    styles = CLAP_STYLING
)]
struct Cli {
    /// Roots of the directory trees to search
    #[arg(required = true)]
    roots:      Vec<PathBuf>,
    #[arg(short = 't', long = "type", value_name = "CODES", help = kinds_help())]
    kinds:      Option<String>,
    /// Regexes matched at the start of the entry name; any match is a match
    #[arg(short = 'n', long, num_args = 1.., value_name = "REGEX")]
    name:       Vec<String>,
    /// Report entries at most this deep (the starting point is 1); negative means unbounded
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    maxdepth:   i64,
    /// Report entries at least this deep (the starting point is 1); negative means unbounded
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    mindepth:   i64,
    /// Enable debug logs
    #[arg(long)]
    debug_info: bool,
}

fn kinds_help() -> String {
    format!("Kinds to report, as a string of codes: {}", PathKind::hint())
}

fn run(
    cli: &Cli,
    exec: Option<Vec<String>>,
    flag: &Arc<AtomicBool>,
    out: &mut impl Write,
) -> Result<()> {
    let kinds = cli.kinds.as_deref().map(PathKind::parse_codes).transpose()?;
    let names = if cli.name.is_empty() { None } else { Some(NameFilter::new(&cli.name)?) };
    let template = exec.map(CommandTemplate::new).transpose()?;

    for root in &cli.roots {
        let spec = TraversalSpec::new(root)
            .max_depth(TraversalSpec::depth_arg(cli.maxdepth))
            .min_depth(TraversalSpec::depth_arg(cli.mindepth))
            .kinds(kinds.clone())
            .names(names.clone());
        let mut crawler = Crawler::new(spec).with_interrupt(Arc::clone(flag));
        if let Some(template) = &template {
            crawler = crawler.with_action(ActionExecutor::new(template.clone()));
        }

        for path in crawler {
            match path {
                Ok(path) => writeln!(out, "{}", path.display())?,
                Err(Error::Interrupted) => return Err(Error::Interrupted),
                Err(e) => warn!("{e}"),
            }
        }
    }
    out.flush()?;
    Ok(())
}

fn exit_with(err: &Error) -> ! {
    if !matches!(err, Error::Interrupted) {
        error!("{err}");
    }
    std::process::exit(err.exit_code())
}

fn main() {
    let raw: Vec<String> =
        std::env::args_os().map(|arg| arg.to_string_lossy().into_owned()).collect();
    let (rest, exec) = match args::split_exec(raw) {
        Ok(split) => split,
        Err(e) => {
            logging::init(false);
            exit_with(&e);
        },
    };

    let cli = Cli::parse_from(args::normalize(rest));
    logging::init(cli.debug_info);
    let flag = interrupt::install();

    if let Err(e) = run(&cli, exec, &flag, &mut io::stdout().lock()) {
        exit_with(&e);
    }
}
