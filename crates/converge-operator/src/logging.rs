//! Error categories and per-object reporting for the topic controller.
use kube::runtime::{
    controller::{self, Action},
    reflector::ObjectRef,
};

use crate::{controller::CONTROLLER_NAME, crd::Topic};

/// Errors that can fail a reconciliation pass.
pub trait ReconcilerError: std::error::Error {
    /// Stable `PascalCase` label for the failure, such as `UpdateAttribute`.
    ///
    /// Usually the [`strum::IntoStaticStr`] name of the error's discriminant.
    fn category(&self) -> &'static str;
}

/// Logs the result of one reconciliation pass emitted by the controller stream.
pub fn report_reconciled<E, Q>(result: &Result<(ObjectRef<Topic>, Action), controller::Error<E, Q>>)
where
    E: ReconcilerError + 'static,
    Q: std::error::Error + 'static,
{
    match result {
        Ok((topic, action)) => {
            tracing::info!(controller.name = CONTROLLER_NAME, %topic, "reconciled topic");
            tracing::debug!(%topic, ?action, "next pass scheduled");
        }
        Err(controller::Error::ReconcilerFailed(error, topic)) => tracing::error!(
            controller.name = CONTROLLER_NAME,
            %topic,
            error.category = error.category(),
            error = error as &dyn std::error::Error,
            "failed to reconcile topic",
        ),
        Err(controller::Error::QueueError(error)) => tracing::warn!(
            controller.name = CONTROLLER_NAME,
            error = error as &dyn std::error::Error,
            "topic watch stream failed",
        ),
        Err(error) => tracing::error!(
            controller.name = CONTROLLER_NAME,
            error = error as &dyn std::error::Error,
            "controller failed",
        ),
    }
}
