//! Command line preprocessing shared by the binaries
//!
//! The tools accept `find`-style single-dash long flags (`-maxdepth 2`, `-name foo`) next to the
//! usual `--maxdepth 2`. [`normalize`] rewrites the former so clap only sees the latter.

use crate::error::{Error, Result};

/// Token that starts a `-exec` command template
pub const EXEC_FLAG: &str = "-exec";

/// Single-dash long flags and their clap spelling
pub const LONG_FLAGS: [(&str, &str); 7] = [
    ("-maxdepth", "--maxdepth"),
    ("-mindepth", "--mindepth"),
    ("-type", "--type"),
    ("-name", "--name"),
    ("-codec", "--codec"),
    ("-fr", "--file-regex"),
    ("-ff", "--file-fixed-string"),
];

/// Rewrite single-dash long flags into their double-dash form
///
/// Tokens after a bare `--` are left alone.
pub fn normalize<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut literal = false;
    args.into_iter()
        .map(|arg| {
            if literal {
                return arg;
            }
            if arg == "--" {
                literal = true;
                return arg;
            }
            LONG_FLAGS
                .iter()
                .find(|(short, _)| *short == arg)
                .map_or(arg, |(_, long)| (*long).to_owned())
        })
        .collect()
}

/// Split off `-exec` and every token after it
///
/// Returns the remaining arguments and, if `-exec` was present, its command tokens.
///
/// # Errors
/// Returns [`Error::MissingExecCommand`] if `-exec` is the last token.
pub fn split_exec(mut args: Vec<String>) -> Result<(Vec<String>, Option<Vec<String>>)> {
    let Some(idx) = args.iter().position(|arg| arg == EXEC_FLAG) else {
        return Ok((args, None));
    };
    let tokens = args.split_off(idx + 1);
    args.pop();
    if tokens.is_empty() {
        return Err(Error::MissingExecCommand);
    }
    Ok((args, Some(tokens)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_normalize_long_flags() {
        let args = normalize(strings(&["sift-find", ".", "-maxdepth", "2", "-name", "a", "-t", "f"]));
        assert_eq!(args, strings(&["sift-find", ".", "--maxdepth", "2", "--name", "a", "-t", "f"]));

        let args = normalize(strings(&["sift-grep", "-fr", "p.txt", "-ff", "q.txt", "-f", "x"]));
        assert_eq!(
            args,
            strings(&["sift-grep", "--file-regex", "p.txt", "--file-fixed-string", "q.txt", "-f", "x"])
        );
    }

    #[test]
    fn test_normalize_stops_at_double_dash() {
        let args = normalize(strings(&["sift-type", "-codec", "--", "-codec"]));
        assert_eq!(args, strings(&["sift-type", "--codec", "--", "-codec"]));
    }

    #[test]
    fn test_split_exec() {
        let (rest, exec) =
            split_exec(strings(&["sift-find", ".", "-exec", "echo", "{}", ";", "-name"])).unwrap();
        assert_eq!(rest, strings(&["sift-find", "."]));
        assert_eq!(exec.unwrap(), strings(&["echo", "{}", ";", "-name"]));

        let (rest, exec) = split_exec(strings(&["sift-find", "."])).unwrap();
        assert_eq!(rest, strings(&["sift-find", "."]));
        assert!(exec.is_none());
    }

    #[test]
    fn test_split_exec_requires_command() {
        assert!(matches!(
            split_exec(strings(&["sift-find", ".", "-exec"])),
            Err(Error::MissingExecCommand)
        ));
    }
}
