//! Command line interface of the operator.
//!
//! ```rust
//! use clap::Parser;
//! use converge_operator::cli::Command;
//!
//! let command: Command = Command::parse_from(["converge-operator", "run", "--requeue-interval", "5m"]);
//! assert!(matches!(command, Command::Run(_)));
//! ```
use std::time::Duration;

use clap::{Args, Parser};
use converge_telemetry::tracing::TelemetryOptions;

use crate::namespace::WatchNamespace;

/// The commands of the operator.
///
/// This enum is generic over the arguments available to the [`Command::Run`] subcommand. By
/// default, [`RunArguments`] is used, but a custom type can be used.
#[derive(Debug, PartialEq, Eq, Parser)]
pub enum Command<Run: Args = RunArguments> {
    /// Print CRD objects.
    Crd,

    /// Run the operator.
    Run(Run),
}

#[derive(Debug, PartialEq, Eq, Parser)]
#[command(long_about = "")]
pub struct RunArguments {
    /// Provides a specific namespace to watch (instead of watching all namespaces)
    #[arg(long, env, default_value = "")]
    pub watch_namespace: WatchNamespace,

    /// Maximum number of topics reconciled at the same time.
    #[arg(long, env, default_value_t = 4)]
    pub max_concurrent_reconciles: u16,

    /// Time after which a topic is observed again when nothing changed.
    #[arg(long, env, default_value = "1m", value_parser = humantime::parse_duration)]
    pub requeue_interval: Duration,

    /// Time after which a failed pass is retried.
    #[arg(long, env, default_value = "10s", value_parser = humantime::parse_duration)]
    pub error_requeue_interval: Duration,

    /// Maximum duration of a single call to the remote topic API.
    #[arg(long, env, default_value = "30s", value_parser = humantime::parse_duration)]
    pub external_call_timeout: Duration,

    // IMPORTANT: All (flattened) sub structs should be placed at the end to ensure the help
    // headings are correct.
    #[command(flatten)]
    pub telemetry: TelemetryOptions,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn verify_cli() {
        RunArguments::command().debug_assert();
        Command::<RunArguments>::command().debug_assert();
    }

    #[test]
    fn parses_run_arguments() {
        let command = Command::<RunArguments>::parse_from([
            "converge-operator",
            "run",
            "--watch-namespace",
            "messaging",
            "--max-concurrent-reconciles",
            "8",
            "--external-call-timeout",
            "2s",
        ]);

        let Command::Run(arguments) = command else {
            unreachable!("run subcommand was given");
        };
        assert_eq!(
            arguments.watch_namespace,
            WatchNamespace::One("messaging".to_owned())
        );
        assert_eq!(arguments.max_concurrent_reconciles, 8);
        assert_eq!(arguments.requeue_interval, Duration::from_secs(60));
        assert_eq!(arguments.error_requeue_interval, Duration::from_secs(10));
        assert_eq!(arguments.external_call_timeout, Duration::from_secs(2));
        assert!(!arguments.telemetry.console_log_disabled);
    }

    #[test]
    fn parses_crd() {
        assert_eq!(
            Command::<RunArguments>::parse_from(["converge-operator", "crd"]),
            Command::Crd
        );
    }
}
