use crate::error::{CliError, Result};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, Layer,
    filter::LevelFilter,
    fmt::{self},
    prelude::*,
    registry::LookupSpan,
};

/// Overrides the verbosity flags with `tracing` filter directives,
/// e.g. `HYDROCORR_LOG=hydrocorr::core::io=trace,warn`.
pub const LOG_ENV_VAR: &str = "HYDROCORR_LOG";

#[derive(Debug, Clone, PartialEq)]
pub struct LogSettings {
    pub level: LevelFilter,
    /// Appended to rather than truncated, so one file can collect a whole campaign.
    pub log_file: Option<PathBuf>,
}

impl LogSettings {
    pub fn from_flags(verbosity: u8, quiet: bool, log_file: Option<PathBuf>) -> Self {
        let level = match (quiet, verbosity) {
            (true, _) => LevelFilter::OFF,
            (false, 0) => LevelFilter::WARN,
            (false, 1) => LevelFilter::INFO,
            (false, 2) => LevelFilter::DEBUG,
            (false, _) => LevelFilter::TRACE,
        };
        Self { level, log_file }
    }

    fn filter(&self, directives: Option<&str>) -> Result<EnvFilter> {
        let builder = EnvFilter::builder().with_default_directive(self.level.into());
        match directives {
            Some(d) if !d.trim().is_empty() => builder
                .parse(d)
                .map_err(|e| CliError::Config(format!("Invalid {} directives: {}", LOG_ENV_VAR, e))),
            _ => Ok(builder.parse_lossy("")),
        }
    }
}

fn stderr_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .compact()
}

fn file_layer<S>(file: File) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_target(true)
}

fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(CliError::Io)
}

pub fn setup_logging(settings: &LogSettings) -> Result<()> {
    let directives = std::env::var(LOG_ENV_VAR).ok();
    let filter = settings.filter(directives.as_deref())?;
    let file = settings.log_file.as_deref().map(open_log_file).transpose()?;

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer())
        .with(file.map(file_layer))
        .init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::sync::Once;
    use tracing::{debug, error, info, trace, warn};

    static INIT: Once = Once::new();

    fn ensure_global_logger_is_set() {
        INIT.call_once(|| {
            setup_logging(&LogSettings::from_flags(3, false, None))
                .expect("Failed to set up global logger for tests");
        });
    }

    #[test]
    fn flags_map_to_level_filters() {
        let level = |v, q| LogSettings::from_flags(v, q, None).level;
        assert_eq!(level(0, false), LevelFilter::WARN);
        assert_eq!(level(1, false), LevelFilter::INFO);
        assert_eq!(level(2, false), LevelFilter::DEBUG);
        assert_eq!(level(7, false), LevelFilter::TRACE);
        assert_eq!(level(2, true), LevelFilter::OFF);
    }

    #[test]
    fn env_directives_are_validated() {
        let settings = LogSettings::from_flags(0, false, None);
        assert!(settings.filter(None).is_ok());
        assert!(settings.filter(Some("")).is_ok());
        assert!(settings.filter(Some("hydrocorr::core::io=trace,warn")).is_ok());
        assert!(matches!(
            settings.filter(Some("hydrocorr=loud")),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    #[serial]
    fn global_logger_accepts_structured_events() {
        ensure_global_logger_is_set();

        error!(input = "simu_1.xc.xyz", "Analysis failed");
        warn!(frames = 3, "Stopped reading trajectory");
        info!(analyses = 6, "Starting batch analysis.");
        debug!("Discovered files.");
        trace!("Parsed frame");
    }

    #[test]
    #[serial]
    fn log_file_is_appended_with_level_and_thread() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("analysis.log");
        std::fs::write(&log_path, "earlier run\n").unwrap();

        let subscriber =
            tracing_subscriber::registry().with(file_layer(open_log_file(&log_path).unwrap()));
        tracing::subscriber::with_default(subscriber, || {
            debug!(frames = 5, "Snapshot reused for simu_1.xc.xyz");
        });

        let content = std::fs::read_to_string(log_path).unwrap();
        assert!(content.starts_with("earlier run\n"));
        assert!(content.contains("Snapshot reused for simu_1.xc.xyz"));
        assert!(content.contains("frames=5"));
        assert!(content.contains("DEBUG"));
        assert!(content.contains("ThreadId"));
    }

    #[test]
    #[serial]
    fn unopenable_log_file_propagates_error() {
        let invalid_path = PathBuf::from("/");

        if cfg!(unix) && invalid_path.is_dir() {
            let result = setup_logging(&LogSettings::from_flags(0, false, Some(invalid_path)));
            assert!(matches!(result, Err(CliError::Io(_))));
        }
    }
}
