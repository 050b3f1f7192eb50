use std::path::PathBuf;

use snafu::{ResultExt as _, Snafu};
use tracing::{level_filters::LevelFilter, subscriber::SetGlobalDefaultError};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt};

type Result<T, E = Error> = std::result::Result<T, E>;
type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to open rolling log files in {}", directory.display()))]
    InitRollingFileAppender {
        source: InitError,
        directory: PathBuf,
    },

    #[snafu(display("unable to set the global default subscriber"))]
    SetGlobalDefaultSubscriber { source: SetGlobalDefaultError },
}

/// Where log events go, and how they are filtered.
///
/// Each sink reads its level filter from its own environment variable
/// ([`Tracing::CONSOLE_LOG_LEVEL`], [`Tracing::FILE_LOG_LEVEL`]) and falls
/// back to `INFO`.
///
/// Keep the value returned by [`Tracing::init`] alive for as long as logs
/// should be written.
///
/// ```
/// # use converge_telemetry::{TelemetryOptions, Tracing};
/// let _tracing = Tracing::pre_configured("converge-operator", TelemetryOptions::default());
/// ```
#[derive(Debug, PartialEq, Eq)]
pub struct Tracing {
    service_name: &'static str,
    console: Option<LogFormat>,
    file: Option<FileSink>,
}

#[derive(Debug, PartialEq, Eq)]
struct FileSink {
    directory: PathBuf,
    rotation: RotationPeriod,
    max_files: Option<usize>,
}

impl Tracing {
    pub const CONSOLE_LOG_LEVEL: &str = "CONSOLE_LOG_LEVEL";
    pub const FILE_LOG_LEVEL: &str = "FILE_LOG_LEVEL";
    /// Appended to the service name to form rolling log file names.
    pub const FILE_LOG_SUFFIX: &str = "tracing-rs.json";

    pub fn pre_configured(service_name: &'static str, options: TelemetryOptions) -> Self {
        let TelemetryOptions {
            console_log_disabled,
            console_log_format,
            file_log_directory,
            file_log_rotation_period,
            file_log_max_files,
        } = options;

        Self {
            service_name,
            console: (!console_log_disabled).then_some(console_log_format),
            file: file_log_directory.map(|directory| FileSink {
                directory,
                rotation: file_log_rotation_period.unwrap_or_default(),
                max_files: file_log_max_files,
            }),
        }
    }

    pub fn init(self) -> Result<Self> {
        let mut layers: Vec<BoxedLayer> = Vec::new();

        if let Some(format) = self.console {
            let filter = level_filter(Self::CONSOLE_LOG_LEVEL);
            layers.push(match format {
                LogFormat::Plain => tracing_subscriber::fmt::layer().with_filter(filter).boxed(),
                LogFormat::Json => tracing_subscriber::fmt::layer()
                    .json()
                    .with_filter(filter)
                    .boxed(),
            });
        }

        if let Some(sink) = &self.file {
            let mut appender = RollingFileAppender::builder()
                .rotation(sink.rotation.into())
                .filename_prefix(self.service_name)
                .filename_suffix(Self::FILE_LOG_SUFFIX);
            if let Some(max_files) = sink.max_files {
                appender = appender.max_log_files(max_files);
            }
            let appender =
                appender
                    .build(&sink.directory)
                    .context(InitRollingFileAppenderSnafu {
                        directory: &sink.directory,
                    })?;

            layers.push(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(appender)
                    .with_filter(level_filter(Self::FILE_LOG_LEVEL))
                    .boxed(),
            );
        }

        if !layers.is_empty() {
            tracing::subscriber::set_global_default(tracing_subscriber::registry().with(layers))
                .context(SetGlobalDefaultSubscriberSnafu)?;
        }

        if let Some(sink) = &self.file {
            tracing::info!(directory = %sink.directory.display(), "file logging enabled");
        }

        Ok(self)
    }
}

fn level_filter(env_var: &str) -> EnvFilter {
    EnvFilter::builder()
        .with_env_var(env_var)
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy()
}

/// Logging options, flattened into the operator's `run` command.
#[cfg_attr(feature = "clap", derive(clap::Args))]
#[cfg_attr(feature = "clap", command(next_help_heading = "Logging Options"))]
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TelemetryOptions {
    /// Disable console logs.
    #[cfg_attr(feature = "clap", arg(long, env))]
    pub console_log_disabled: bool,

    /// Output format of console logs.
    #[cfg_attr(feature = "clap", arg(long, env, value_enum, default_value_t))]
    pub console_log_format: LogFormat,

    /// Also write JSON logs to rolling files in this directory.
    #[cfg_attr(
        feature = "clap",
        arg(long, env, value_name = "DIRECTORY", group = "file_log")
    )]
    pub file_log_directory: Option<PathBuf>,

    /// How often log files are rolled over.
    #[cfg_attr(
        feature = "clap",
        arg(long, env, value_enum, value_name = "PERIOD", requires = "file_log")
    )]
    pub file_log_rotation_period: Option<RotationPeriod>,

    /// Number of rolled over log files to keep.
    #[cfg_attr(
        feature = "clap",
        arg(long, env, value_name = "COUNT", requires = "file_log")
    )]
    pub file_log_max_files: Option<usize>,
}

#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "PascalCase")]
pub enum RotationPeriod {
    Minutely,
    Hourly,
    Daily,
    #[default]
    Never,
}

impl From<RotationPeriod> for Rotation {
    fn from(value: RotationPeriod) -> Self {
        match value {
            RotationPeriod::Minutely => Self::MINUTELY,
            RotationPeriod::Hourly => Self::HOURLY,
            RotationPeriod::Daily => Self::DAILY,
            RotationPeriod::Never => Self::NEVER,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults_to_plain_console_only() {
        let tracing = Tracing::pre_configured("test", TelemetryOptions::default());

        assert_eq!(tracing.console, Some(LogFormat::Plain));
        assert_eq!(tracing.file, None);
    }

    #[rstest]
    #[case(false, Some(LogFormat::Json))]
    #[case(true, None)]
    fn console_can_be_disabled(#[case] disabled: bool, #[case] expected: Option<LogFormat>) {
        let tracing = Tracing::pre_configured(
            "test",
            TelemetryOptions {
                console_log_disabled: disabled,
                console_log_format: LogFormat::Json,
                ..TelemetryOptions::default()
            },
        );

        assert_eq!(tracing.console, expected);
    }

    #[test]
    fn file_sink_defaults_to_never_rotating() {
        let tracing = Tracing::pre_configured(
            "test",
            TelemetryOptions {
                file_log_directory: Some(PathBuf::from("/logs")),
                file_log_max_files: Some(6),
                ..TelemetryOptions::default()
            },
        );

        assert_eq!(
            tracing.file,
            Some(FileSink {
                directory: PathBuf::from("/logs"),
                rotation: RotationPeriod::Never,
                max_files: Some(6),
            })
        );
    }

    #[rstest]
    #[case("Hourly", RotationPeriod::Hourly)]
    #[case("Never", RotationPeriod::Never)]
    fn parses_rotation_period(#[case] input: &str, #[case] expected: RotationPeriod) {
        assert_eq!(input.parse::<RotationPeriod>(), Ok(expected));
    }
}
