//! Logging setup for the agent.
//!
//! [`SkeinAgent`](crate::SkeinAgent) installs a `tracing-subscriber` pipeline
//! from the `[logging]` section while attaching. Installation never replaces
//! a subscriber the host already set up.
//!
//! The agent opens three spans worth watching with `span_events`:
//! `boot` and `shutdown` around the service phases, and `transform` (with a
//! `unit` field) around every unit handed to the pipeline.
//!
//! ```toml
//! [logging]
//! level = "info"
//! filters = { skein_loader = "debug" }
//! span_events = { new = true, close = true }
//! ```
//!
//! `RUST_LOG`, when set, replaces the configured base level; `filters` are
//! added on top of it.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::warn;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogFormat, LogOutput, LogRotation, LoggingConfig, SpanEventConfig};

/// Initializes logging from a [`LoggingConfig`].
///
/// Does nothing if a global subscriber is already installed.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

fn fmt_span(events: &SpanEventConfig) -> FmtSpan {
    [
        (events.new, FmtSpan::NEW),
        (events.enter, FmtSpan::ENTER),
        (events.exit, FmtSpan::EXIT),
        (events.close, FmtSpan::CLOSE),
    ]
    .into_iter()
    .filter(|(enabled, _)| *enabled)
    .fold(FmtSpan::NONE, |span, (_, flag)| span | flag)
}

// =============================================================================
// LoggingBuilder
// =============================================================================

/// Subscriber settings resolved from a [`LoggingConfig`].
pub struct LoggingBuilder {
    level: tracing::Level,
    directives: Vec<String>,
    format: LogFormat,
    output: LogOutput,
    file_path: Option<PathBuf>,
    rotation: LogRotation,
    span_events: FmtSpan,
    thread_ids: bool,
    file_location: bool,
}

impl LoggingBuilder {
    pub fn from_config(config: &LoggingConfig) -> Self {
        Self {
            level: config.level.to_tracing_level(),
            directives: config
                .filters
                .iter()
                .map(|(module, level)| format!("{}={}", module, level.as_str()))
                .collect(),
            format: config.format,
            output: config.output,
            file_path: config.file_path.clone(),
            rotation: config.rotation,
            span_events: fmt_span(&config.span_events),
            thread_ids: config.thread_ids,
            file_location: config.file_location,
        }
    }

    /// Adds a filter directive such as `skein_framework=trace`.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    fn build_filter(&self) -> EnvFilter {
        let base = self.level.to_string().to_lowercase();
        let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&base));
        for directive in &self.directives {
            if let Ok(d) = directive.parse() {
                filter = filter.add_directive(d);
            }
        }
        filter
    }

    /// The writer for the configured output, and whether a file output fell
    /// back to stderr for lack of a path.
    fn writer(&self) -> (BoxMakeWriter, bool) {
        match (self.output, self.file_path.as_deref()) {
            (LogOutput::Stdout, _) => (BoxMakeWriter::new(std::io::stdout), false),
            (LogOutput::Stderr, _) => (BoxMakeWriter::new(std::io::stderr), false),
            (LogOutput::File, Some(path)) => (BoxMakeWriter::new(self.file_appender(path)), false),
            (LogOutput::File, None) => (BoxMakeWriter::new(std::io::stderr), true),
        }
    }

    fn file_appender(&self, path: &Path) -> tracing_appender::rolling::RollingFileAppender {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let name = path.file_name().unwrap_or_else(|| OsStr::new("skein.log"));
        match self.rotation {
            LogRotation::Never => tracing_appender::rolling::never(dir, name),
            LogRotation::Hourly => tracing_appender::rolling::hourly(dir, name),
            LogRotation::Daily => tracing_appender::rolling::daily(dir, name),
        }
    }

    /// Installs the subscriber globally.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let filter = self.build_filter();
        let (writer, fell_back) = self.writer();

        macro_rules! install {
            ($layer:expr) => {
                tracing_subscriber::registry()
                    .with(
                        $layer
                            .with_span_events(self.span_events.clone())
                            .with_thread_ids(self.thread_ids)
                            .with_file(self.file_location)
                            .with_line_number(self.file_location)
                            .with_writer(writer),
                    )
                    .with(filter)
                    .try_init()
            };
        }

        let installed = match self.format {
            #[cfg(feature = "json-log")]
            LogFormat::Json => install!(fmt::layer().json()),
            LogFormat::Compact => install!(fmt::layer().compact()),
            LogFormat::Full => install!(fmt::layer()),
            LogFormat::Pretty => install!(fmt::layer().pretty()),
        };
        installed?;

        if fell_back {
            warn!("File output requested but no file path configured, logging to stderr");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_from_config() {
        let config = LoggingConfig {
            level: LogLevel::Debug,
            output: LogOutput::File,
            file_path: Some(PathBuf::from("logs/agent.log")),
            rotation: LogRotation::Daily,
            thread_ids: true,
            file_location: true,
            span_events: SpanEventConfig {
                new: true,
                close: true,
                ..Default::default()
            },
            filters: BTreeMap::from([("skein_loader".to_string(), LogLevel::Trace)]),
            ..Default::default()
        };

        let builder = LoggingBuilder::from_config(&config).directive("skein_framework=warn");
        assert_eq!(builder.level, tracing::Level::DEBUG);
        assert_eq!(builder.output, LogOutput::File);
        assert_eq!(builder.rotation, LogRotation::Daily);
        assert_eq!(builder.span_events, FmtSpan::NEW | FmtSpan::CLOSE);
        assert!(builder.thread_ids && builder.file_location);
        assert_eq!(builder.directives, ["skein_loader=trace", "skein_framework=warn"]);
    }

    #[test]
    fn test_span_events() {
        assert_eq!(fmt_span(&SpanEventConfig::default()), FmtSpan::NONE);
        let all = SpanEventConfig {
            new: true,
            enter: true,
            exit: true,
            close: true,
        };
        assert_eq!(fmt_span(&all), FmtSpan::FULL);
        let active = SpanEventConfig {
            enter: true,
            exit: true,
            ..Default::default()
        };
        assert_eq!(fmt_span(&active), FmtSpan::ACTIVE);
    }

    #[test]
    fn test_file_output_without_path_falls_back() {
        let config = LoggingConfig {
            output: LogOutput::File,
            ..Default::default()
        };
        assert!(LoggingBuilder::from_config(&config).writer().1);
    }
}
