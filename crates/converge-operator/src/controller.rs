//! Runs the topic lifecycle for every watched `Topic` through the kube controller runtime.
use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use kube::{
    Api, ResourceExt,
    runtime::{
        Controller,
        controller::{self, Action},
        finalizer::{self, finalizer},
        watcher,
    },
};
use snafu::{OptionExt, ResultExt, Snafu};
use strum::{EnumDiscriminants, IntoStaticStr};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    cli::RunArguments,
    client::{self, Connector},
    crd::Topic,
    external::{self, DEFAULT_CALL_TIMEOUT, Lifecycle},
    logging::{ReconcilerError, report_reconciled},
    namespace::WatchNamespace,
    store::KubeTopicStore,
};

pub const CONTROLLER_NAME: &str = "topic";
pub const FIELD_MANAGER: &str = "converge-operator";
pub const FINALIZER: &str = "sns.converge.dev/finalizer";

#[derive(Debug, EnumDiscriminants, Snafu)]
#[strum_discriminants(derive(IntoStaticStr))]
pub enum Error {
    #[snafu(display("object has no namespace"))]
    ObjectHasNoNamespace,

    #[snafu(display("failed to connect to the topic API in region {region:?}"))]
    Connect {
        source: client::Error,
        region: String,
    },

    #[snafu(display("failed to reconcile topic"))]
    Finalizer {
        #[snafu(source(from(finalizer::Error<external::Error>, Box::new)))]
        source: Box<finalizer::Error<external::Error>>,
    },
}

impl ReconcilerError for Error {
    fn category(&self) -> &'static str {
        match self {
            Self::Finalizer { source } => match source.as_ref() {
                finalizer::Error::ApplyFailed(error) | finalizer::Error::CleanupFailed(error) => {
                    error.category()
                }
                _ => ErrorDiscriminants::from(self).into(),
            },
            _ => ErrorDiscriminants::from(self).into(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ControllerOptions {
    pub max_concurrent_reconciles: u16,
    /// Requeue delay after a successful pass.
    pub requeue_interval: Duration,
    /// Requeue delay after a failed pass.
    pub error_requeue_interval: Duration,
    pub external_call_timeout: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            max_concurrent_reconciles: 4,
            requeue_interval: Duration::from_secs(60),
            error_requeue_interval: Duration::from_secs(10),
            external_call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

impl From<&RunArguments> for ControllerOptions {
    fn from(arguments: &RunArguments) -> Self {
        Self {
            max_concurrent_reconciles: arguments.max_concurrent_reconciles,
            requeue_interval: arguments.requeue_interval,
            error_requeue_interval: arguments.error_requeue_interval,
            external_call_timeout: arguments.external_call_timeout,
        }
    }
}

struct Ctx<K> {
    client: kube::Client,
    connector: K,
    options: ControllerOptions,
    cancellation: CancellationToken,
}

/// Reconciles topics until `cancellation` fires. Passes in flight are cancelled at their next
/// remote call.
pub async fn run<K>(
    client: kube::Client,
    watch_namespace: &WatchNamespace,
    connector: K,
    options: ControllerOptions,
    cancellation: CancellationToken,
) where
    K: Connector + 'static,
{
    let topics = watch_namespace.topics(client.clone());
    let shutdown = cancellation.clone();
    let config = controller::Config::default().concurrency(options.max_concurrent_reconciles);

    info!(
        controller.name = CONTROLLER_NAME,
        %watch_namespace,
        ?options,
        "starting controller"
    );

    let ctx = Arc::new(Ctx {
        client,
        connector,
        options,
        cancellation,
    });

    Controller::new(topics, watcher::Config::default())
        .with_config(config)
        .graceful_shutdown_on(async move { shutdown.cancelled().await })
        .run(reconcile::<K>, error_policy::<K>, ctx)
        .for_each(|result| async move {
            report_reconciled(&result);
        })
        .await;
}

async fn reconcile<K>(topic: Arc<Topic>, ctx: Arc<Ctx<K>>) -> Result<Action, Error>
where
    K: Connector,
{
    let namespace = topic.namespace().context(ObjectHasNoNamespaceSnafu)?;
    let api: Api<Topic> = Api::namespaced(ctx.client.clone(), &namespace);

    let region = topic.spec.for_provider.region.clone();
    let client = ctx
        .connector
        .connect(&region)
        .context(ConnectSnafu { region })?;
    let store = KubeTopicStore::new(ctx.client.clone(), FIELD_MANAGER);
    let lifecycle = Lifecycle::new(&client, &store)
        .with_call_timeout(ctx.options.external_call_timeout)
        .with_cancellation(ctx.cancellation.child_token());
    let lifecycle = &lifecycle;
    let requeue_interval = ctx.options.requeue_interval;

    finalizer(&api, FINALIZER, topic, |event| async move {
        match event {
            finalizer::Event::Apply(topic) => lifecycle
                .reconcile(&mut Topic::clone(&topic))
                .await
                .map(|outcome| {
                    debug!(?outcome, "pass finished");
                    Action::requeue(requeue_interval)
                }),
            finalizer::Event::Cleanup(topic) => lifecycle
                .cleanup(&mut Topic::clone(&topic))
                .await
                .map(|_| Action::await_change()),
        }
    })
    .await
    .context(FinalizerSnafu)
}

fn error_policy<K>(_topic: Arc<Topic>, _error: &Error, ctx: Arc<Ctx<K>>) -> Action {
    Action::requeue(ctx.options.error_requeue_interval)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::apply(finalizer::Error::ApplyFailed(external::Error::AddTags {
        source: client::Error::NotFound { identity: "arn".to_owned() },
    }), "AddTags")]
    #[case::cleanup(finalizer::Error::CleanupFailed(external::Error::Cancelled {
        operation: "DeleteTopic",
    }), "Cancelled")]
    #[case::unnamed(finalizer::Error::UnnamedObject, "Finalizer")]
    fn category_of_lifecycle_errors(
        #[case] source: finalizer::Error<external::Error>,
        #[case] expected: &str,
    ) {
        let error = Error::Finalizer {
            source: Box::new(source),
        };

        assert_eq!(error.category(), expected);
    }

    #[test]
    fn options_from_arguments() {
        use clap::Parser;

        use crate::cli::Command;

        let Command::Run(arguments) =
            Command::<RunArguments>::parse_from(["converge-operator", "run"])
        else {
            unreachable!("run subcommand was given");
        };

        assert_eq!(
            ControllerOptions::from(&arguments),
            ControllerOptions::default()
        );
    }
}
