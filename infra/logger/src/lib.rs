//! # Logger
//!
//! Installs the global `tracing` subscriber for Herald binaries.
//!
//! * Console output (compact, ANSI colored) or JSON lines.
//! * Optional non-blocking rolling file output via `tracing-appender`.
//! * Level filtering through [`LoggerBuilder::level`], an explicit
//!   [`LoggerBuilder::env_filter`] directive, or `RUST_LOG`.
//!
//! Libraries in the workspace only emit events through `tracing` macros; picking
//! sinks is the application's job.
//!
//! ## Example
//!
//! ```rust
//! # use herald_logger::{Logger, LevelFilter};
//!
//! let _logger = Logger::builder()
//!     .name("my-app")
//!     .console(true)
//!     .level(LevelFilter::DEBUG)
//!     .init()
//!     .unwrap();
//! ```

mod error;

pub use crate::error::{LoggerError, LoggerErrorExt};
pub use tracing::level_filters::LevelFilter;
pub use tracing_appender::rolling::Rotation;

use private::Sealed;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

const DEFAULT_MAX_FILES: usize = 10;
const LOG_FILE_SUFFIX: &str = "log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Debug)]
struct FileSink {
    dir: PathBuf,
    rotation: Rotation,
    max_files: usize,
}

#[derive(Debug)]
struct LoggerConfig {
    console: bool,
    json: bool,
    level: LevelFilter,
    env_filter: Option<String>,
    file: Option<FileSink>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self { console: true, json: false, level: LevelFilter::INFO, env_filter: None, file: None }
    }
}

#[derive(Debug)]
pub struct Unnamed;
#[derive(Debug)]
pub struct Named(String);

mod private {
    pub trait Sealed {}
}
impl Sealed for Unnamed {}
impl Sealed for Named {}

/// Configures and installs the global tracing subscriber.
///
/// A name is required before [`LoggerBuilder::init`] becomes available; it prefixes
/// rolling log files.
#[derive(Debug)]
pub struct LoggerBuilder<N: Sealed = Unnamed> {
    name: N,
    config: LoggerConfig,
}

impl LoggerBuilder<Unnamed> {
    pub fn name(self, name: impl Into<String>) -> LoggerBuilder<Named> {
        LoggerBuilder { name: Named(name.into()), config: self.config }
    }
}

impl<N: Sealed> LoggerBuilder<N> {
    /// Minimum level emitted when neither `env_filter` nor `RUST_LOG` say otherwise.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn level(mut self, level: LevelFilter) -> Self {
        self.config.level = level;
        self
    }

    /// Explicit filter directives, e.g. `herald_dispatcher=trace,info`.
    ///
    /// Takes precedence over `RUST_LOG`. Invalid directives make
    /// [`LoggerBuilder::init`] fail.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn env_filter(mut self, filter: impl Into<String>) -> Self {
        self.config.env_filter = Some(filter.into());
        self
    }

    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn console(mut self, enabled: bool) -> Self {
        self.config.console = enabled;
        self
    }

    /// Emits JSON lines instead of the compact text format, on every sink.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn json(mut self, enabled: bool) -> Self {
        self.config.json = enabled;
        self
    }

    /// Also writes logs to rolling files inside `dir`, created if missing.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn path(mut self, dir: impl Into<PathBuf>) -> Self {
        let sink = self.config.file.take().unwrap_or_else(|| FileSink {
            dir: PathBuf::new(),
            rotation: Rotation::DAILY,
            max_files: DEFAULT_MAX_FILES,
        });
        self.config.file = Some(FileSink { dir: dir.into(), ..sink });
        self
    }

    /// Rotation of the file sink. Ignored without [`LoggerBuilder::path`].
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn rotation(mut self, rotation: Rotation) -> Self {
        if let Some(sink) = self.config.file.as_mut() {
            sink.rotation = rotation;
        }
        self
    }

    /// Number of rotated files kept. Ignored without [`LoggerBuilder::path`].
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn max_files(mut self, max: usize) -> Self {
        if let Some(sink) = self.config.file.as_mut() {
            sink.max_files = max;
        }
        self
    }
}

impl LoggerBuilder<Named> {
    /// Installs the subscriber.
    ///
    /// The returned [`Logger`] owns the file writer's worker guard and must stay
    /// alive until shutdown, or buffered file output is lost.
    ///
    /// # Errors
    /// Returns [`LoggerError::InvalidConfiguration`] for a blank name, a bad filter,
    /// zero `max_files`, or when no sink is enabled; [`LoggerError::Io`] or
    /// [`LoggerError::Appender`] when the file sink cannot be set up; and
    /// [`LoggerError::Subscriber`] if a global subscriber is already installed.
    pub fn init(self) -> Result<Logger, LoggerError> {
        let Self { name: Named(name), config } = self;
        validate(&name, &config)?;

        let filter = env_filter(&config)?;
        let mut layers: Vec<BoxedLayer> = Vec::new();

        if config.console {
            layers.push(if config.json {
                fmt::layer().json().boxed()
            } else {
                fmt::layer().compact().with_ansi(true).boxed()
            });
        }

        let guard = match &config.file {
            Some(sink) => {
                let (layer, guard) = file_layer(&name, sink, config.json)?;
                layers.push(layer);
                Some(guard)
            },
            None => None,
        };

        tracing_subscriber::registry().with(layers).with(filter).try_init()?;
        tracing::debug!(logger = %name, console = config.console, json = config.json, "Logger initialized");

        Ok(Logger { guard })
    }
}

/// Handle to the installed logging system.
#[must_use = "Dropping this handle stops the background file writer."]
#[derive(Debug)]
pub struct Logger {
    guard: Option<WorkerGuard>,
}

impl Logger {
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder { name: Unnamed, config: LoggerConfig::default() }
    }

    /// Whether a file sink is attached.
    #[must_use]
    pub const fn has_file_sink(&self) -> bool {
        self.guard.is_some()
    }
}

fn validate(name: &str, config: &LoggerConfig) -> Result<(), LoggerError> {
    let invalid = |message: &'static str| {
        Err(LoggerError::InvalidConfiguration { message: message.into(), context: None })
    };

    if name.trim().is_empty() {
        return invalid("Logger name cannot be empty");
    }
    if !config.console && config.file.is_none() {
        return invalid("No logging sink enabled. Enable console or file output.");
    }
    if config.file.as_ref().is_some_and(|sink| sink.max_files == 0) {
        return invalid("max_files must be greater than zero");
    }
    Ok(())
}

fn env_filter(config: &LoggerConfig) -> Result<EnvFilter, LoggerError> {
    let builder = EnvFilter::builder().with_default_directive(config.level.into());
    match &config.env_filter {
        Some(directives) => builder.parse(directives).map_err(|e| {
            LoggerError::InvalidConfiguration {
                message: format!("Invalid env filter '{directives}': {e}").into(),
                context: None,
            }
        }),
        None => Ok(builder.from_env_lossy()),
    }
}

fn file_layer(
    name: &str,
    sink: &FileSink,
    json: bool,
) -> Result<(BoxedLayer, WorkerGuard), LoggerError> {
    std::fs::create_dir_all(&sink.dir)
        .context(format!("Creating log directory {}", sink.dir.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(sink.rotation.clone())
        .filename_prefix(name)
        .filename_suffix(LOG_FILE_SUFFIX)
        .max_log_files(sink.max_files)
        .build(&sink.dir)?;

    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer = fmt::layer().with_writer(writer).with_ansi(false);
    let layer = if json { layer.json().boxed() } else { layer.boxed() };
    Ok((layer, guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = Logger::builder().name("test-app");
        assert!(builder.config.console);
        assert!(!builder.config.json);
        assert_eq!(builder.config.level, LevelFilter::INFO);
        assert!(builder.config.file.is_none());
    }

    #[test]
    fn test_file_settings_apply_after_path() {
        let builder = Logger::builder()
            .name("test-app")
            .max_files(3)
            .path("/tmp/herald-logs")
            .rotation(Rotation::HOURLY)
            .max_files(5);

        let sink = builder.config.file.as_ref().unwrap();
        assert_eq!(sink.dir, PathBuf::from("/tmp/herald-logs"));
        assert_eq!(sink.rotation, Rotation::HOURLY);
        assert_eq!(sink.max_files, 5);
    }

    #[test]
    fn test_blank_name_is_rejected() {
        let err = Logger::builder().name("  ").init().unwrap_err();
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_no_sink_is_rejected() {
        let err = Logger::builder().name("silent").console(false).init().unwrap_err();
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_zero_max_files_is_rejected() {
        let err = Logger::builder().name("files").path("logs").max_files(0).init().unwrap_err();
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_invalid_filter_is_rejected() {
        let err = Logger::builder().name("filter").env_filter("herald=verbose").init().unwrap_err();
        assert!(
            matches!(&err, LoggerError::InvalidConfiguration { message, .. } if message.contains("herald=verbose")),
            "unexpected error: {err}"
        );
    }
}
