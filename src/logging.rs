//! Tracing initialisation for the `confwatch` binary.

use std::fs::OpenOptions;
use std::path::PathBuf;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Where log output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Off,
    Stdout,
    Stderr,
    /// Appended to, without ANSI colours.
    File(PathBuf),
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to open log file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Install(#[from] tracing::subscriber::SetGlobalDefaultError),
}

impl LogTarget {
    /// Parse a `--log` value: `0`/`off`, `1`/`stdout`, `2`/`stderr`, or a filename.
    pub fn parse(s: &str) -> Self {
        match s {
            "0" | "off" => LogTarget::Off,
            "1" | "stdout" => LogTarget::Stdout,
            "2" | "stderr" => LogTarget::Stderr,
            filename => LogTarget::File(PathBuf::from(filename)),
        }
    }
}

/// Filter from `RUST_LOG`, else `info` (or `debug` when verbose).
fn env_filter(verbose: bool) -> EnvFilter {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Install the global subscriber. Call once, before any provider is built.
pub fn init_tracing(target: &LogTarget, verbose: bool) -> Result<(), LoggingError> {
    match target {
        LogTarget::Off => {}
        LogTarget::Stdout => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(env_filter(verbose))
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogTarget::Stderr => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(env_filter(verbose))
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogTarget::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LoggingError::Open {
                    path: path.clone(),
                    source,
                })?;
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(env_filter(verbose))
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_targets() {
        assert_eq!(LogTarget::parse("0"), LogTarget::Off);
        assert_eq!(LogTarget::parse("off"), LogTarget::Off);
        assert_eq!(LogTarget::parse("1"), LogTarget::Stdout);
        assert_eq!(LogTarget::parse("stderr"), LogTarget::Stderr);
        assert_eq!(
            LogTarget::parse("/tmp/confwatch.log"),
            LogTarget::File(PathBuf::from("/tmp/confwatch.log"))
        );
    }

    #[test]
    fn test_off_installs_nothing() {
        assert!(init_tracing(&LogTarget::Off, true).is_ok());
    }

    #[test]
    fn test_unwritable_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = LogTarget::File(dir.path().join("missing").join("out.log"));
        assert!(matches!(
            init_tracing(&target, false),
            Err(LoggingError::Open { .. })
        ));
    }
}
