//! Entry point for binaries embedding the operator with their own [`Connector`].
use converge_telemetry::Tracing;
use snafu::{ResultExt, Snafu};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    cli::Command,
    client::Connector,
    controller::{self, ControllerOptions},
    crd::{Topic, yaml},
};

pub const OPERATOR_NAME: &str = "converge-operator";

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to print the CustomResourceDefinition"))]
    PrintCrd { source: yaml::Error },

    #[snafu(display("failed to initialize tracing"))]
    InitTracing {
        source: converge_telemetry::Error,
    },

    #[snafu(display("failed to create the Kubernetes client"))]
    CreateClient { source: kube::Error },
}

/// Executes `command`, running the controller until the process receives Ctrl-C.
pub async fn execute<K>(command: Command, connector: K) -> Result<()>
where
    K: Connector + 'static,
{
    match command {
        Command::Crd => {
            yaml::write_crd::<Topic>(std::io::stdout().lock()).context(PrintCrdSnafu)
        }
        Command::Run(arguments) => {
            let options = ControllerOptions::from(&arguments);
            let _tracing_guard = Tracing::pre_configured(OPERATOR_NAME, arguments.telemetry)
                .init()
                .context(InitTracingSnafu)?;

            let client = kube::Client::try_default()
                .await
                .context(CreateClientSnafu)?;

            let cancellation = CancellationToken::new();
            let shutdown = cancellation.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        info!("received Ctrl-C, shutting down");
                        shutdown.cancel();
                    }
                    Err(error) => warn!(
                        error = &error as &dyn std::error::Error,
                        "failed to listen for Ctrl-C"
                    ),
                }
            });

            controller::run(
                client,
                &arguments.watch_namespace,
                connector,
                options,
                cancellation,
            )
            .await;
            Ok(())
        }
    }
}
