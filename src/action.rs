//! Per-match command execution

use std::path::Path;
use std::process::Command;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::{EXEC_PLACEHOLDER, EXEC_SEPARATORS};

/// Token template for the commands run on each matched path
///
/// `{}` tokens are replaced with the path; `;` and `\;` tokens end a sub-command. A trailing
/// group without a separator is still a sub-command. Empty groups are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    tokens: Vec<String>,
}

impl CommandTemplate {
    /// Create a template from raw tokens
    ///
    /// # Errors
    /// Returns [`Error::MissingExecCommand`] if `tokens` is empty.
    pub fn new(tokens: Vec<String>) -> Result<Self> {
        if tokens.is_empty() {
            return Err(Error::MissingExecCommand);
        }
        Ok(Self { tokens })
    }

    /// The raw tokens
    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Expand the template for `path` into concrete commands, in declaration order
    #[must_use]
    pub fn expand(&self, path: &Path) -> Vec<Vec<String>> {
        let path = path.to_string_lossy();
        let mut commands = Vec::new();
        let mut current = Vec::new();
        for token in &self.tokens {
            if token == EXEC_PLACEHOLDER {
                current.push(path.clone().into_owned());
            } else if EXEC_SEPARATORS.contains(&token.as_str()) {
                if !current.is_empty() {
                    commands.push(std::mem::take(&mut current));
                }
            } else {
                current.push(token.clone());
            }
        }
        if !current.is_empty() {
            commands.push(current);
        }
        commands
    }
}

/// Runs one concrete command to completion
pub trait CommandRunner: Send + Sync {
    /// Run `argv`, where `argv[0]` is the program
    ///
    /// Failures are the runner's business; they never reach the traversal.
    fn run(&self, argv: &[String]);
}

/// Runs commands as child processes, waiting for each
///
/// Standard streams are inherited; the exit status is only logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, argv: &[String]) {
        let Some((program, rest)) = argv.split_first() else {
            return;
        };
        match Command::new(program).args(rest).status() {
            Ok(status) => debug!("{argv:?} exited with {status}"),
            Err(e) => warn!("Failed to run {program}: {e}"),
        }
    }
}

/// Expands a template per matched path and runs the resulting commands synchronously
pub struct ActionExecutor {
    template: CommandTemplate,
    runner:   Box<dyn CommandRunner>,
}

impl std::fmt::Debug for ActionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionExecutor").field("template", &self.template).finish_non_exhaustive()
    }
}

impl ActionExecutor {
    /// Create an executor that spawns processes
    #[must_use]
    pub fn new(template: CommandTemplate) -> Self {
        Self::with_runner(template, ProcessRunner)
    }

    /// Create an executor with a custom runner
    #[must_use]
    pub fn with_runner(template: CommandTemplate, runner: impl CommandRunner + 'static) -> Self {
        Self { template, runner: Box::new(runner) }
    }

    /// Run every sub-command for `path`, in order
    pub fn execute(&self, path: &Path) {
        for argv in self.template.expand(path) {
            self.runner.run(&argv);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Runner that records commands instead of running them
    #[derive(Debug, Default, Clone)]
    pub(crate) struct Recorder(pub Arc<Mutex<Vec<Vec<String>>>>);

    impl CommandRunner for Recorder {
        fn run(&self, argv: &[String]) {
            self.0.lock().unwrap().push(argv.to_vec());
        }
    }

    fn template(tokens: &[&str]) -> CommandTemplate {
        CommandTemplate::new(tokens.iter().map(ToString::to_string).collect()).unwrap()
    }

    #[test]
    fn test_expand_two_commands() {
        let commands = template(&["echo", "{}", ";", "ls", "{}"]).expand(Path::new("/tmp/x"));
        assert_eq!(commands, vec![vec!["echo", "/tmp/x"], vec!["ls", "/tmp/x"]]);
    }

    #[test]
    fn test_expand_escaped_separator_and_empty_groups() {
        let commands = template(&[";", "wc", "-l", "{}", "\\;", ";"]).expand(Path::new("a b"));
        assert_eq!(commands, vec![vec!["wc", "-l", "a b"]]);
    }

    #[test]
    fn test_empty_template_rejected() {
        assert!(matches!(CommandTemplate::new(Vec::new()), Err(Error::MissingExecCommand)));
    }

    #[test]
    fn test_execute_runs_in_order() {
        let recorder = Recorder::default();
        let executor =
            ActionExecutor::with_runner(template(&["a", "{}", ";", "b", "{}"]), recorder.clone());
        executor.execute(Path::new("p"));
        executor.execute(Path::new("q"));

        let seen = recorder.0.lock().unwrap().clone();
        assert_eq!(seen, vec![vec!["a", "p"], vec!["b", "p"], vec!["a", "q"], vec!["b", "q"]]);
    }

    #[cfg(unix)]
    #[test]
    fn test_process_failures_are_absorbed() {
        let executor = ActionExecutor::new(template(&["false", ";", "no-such-program-xyz", "{}"]));
        executor.execute(Path::new("/tmp"));
    }
}
