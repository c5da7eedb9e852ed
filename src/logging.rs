//! Diagnostic output setup for the binaries

use std::io;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Filter used when `RUST_LOG` is unset and verbose output was not requested
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Filter used for verbose output
pub const VERBOSE_LOG_FILTER: &str = "debug";

/// Filter directives for a run
///
/// `RUST_LOG` wins over `verbose`.
#[must_use]
pub fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback_filter(verbose))
}

fn fallback_filter(verbose: bool) -> EnvFilter {
    EnvFilter::new(if verbose { VERBOSE_LOG_FILTER } else { DEFAULT_LOG_FILTER })
}

fn subscriber<W>(writer: W, filter: EnvFilter) -> impl tracing::Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(writer).with_target(false))
        .with(filter)
}

/// Send diagnostics to stderr
///
/// Does nothing if a subscriber is already installed.
pub fn init(verbose: bool) {
    let _ = subscriber(io::stderr, filter(verbose)).try_init();
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tracing::{debug, info};

    use super::*;
    use crate::classify::SniffStats;

    /// Writer collecting formatted events in memory
    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn captured(verbose: bool, emit: impl FnOnce()) -> String {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = subscriber(move || writer.clone(), fallback_filter(verbose));
        tracing::subscriber::with_default(subscriber, emit);
        capture.text()
    }

    #[test]
    fn test_default_filter_shows_sniff_summary() {
        let mut stats = SniffStats::default();
        stats.types.insert("text/plain".to_owned(), 2);

        let output = captured(false, || stats.log_summary());
        assert!(output.contains("Type codec stat"));
        assert!(output.contains("Type stat: {\"text/plain\": 2}"));
        assert!(output.contains("Codec stat"));
    }

    #[test]
    fn test_verbose_filter_shows_debug() {
        let quiet = captured(false, || debug!("hidden detail"));
        assert!(!quiet.contains("hidden detail"));

        let verbose = captured(true, || {
            debug!("shown detail");
            info!("always shown");
        });
        assert!(verbose.contains("shown detail"));
        assert!(verbose.contains("always shown"));
    }
}
