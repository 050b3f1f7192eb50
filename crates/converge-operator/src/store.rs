//! Persistence of the `Topic` record: late-initialized parameters, the external identity and
//! the status.
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use kube::{
    Api, ResourceExt,
    api::{Patch, PatchParams},
};
use serde_json::json;
use snafu::{OptionExt, ResultExt, Snafu};

use crate::crd::{
    EXTERNAL_NAME_ANNOTATION, Topic, TopicObservation, TopicParameters, TopicStatus,
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("object has no namespace"))]
    ObjectHasNoNamespace,

    #[snafu(display("failed to patch the parameters of topic {name:?}"))]
    PatchParameters { source: kube::Error, name: String },

    #[snafu(display("failed to patch the external name of topic {name:?}"))]
    PatchExternalName { source: kube::Error, name: String },

    #[snafu(display("failed to patch the status of topic {name:?}"))]
    PatchStatus { source: kube::Error, name: String },
}

/// Writes back what a reconciliation pass learned about a topic.
#[async_trait]
pub trait TopicStore: Send + Sync {
    /// Persists `spec.forProvider` of `topic`.
    async fn update_parameters(&self, topic: &Topic) -> Result<()>;

    /// Persists the identity the remote system assigned to `topic`.
    async fn set_external_name(&self, topic: &Topic, identity: &str) -> Result<()>;

    async fn update_status(&self, topic: &Topic, status: &TopicStatus) -> Result<()>;
}

/// A [`TopicStore`] writing JSON merge patches through the Kubernetes API.
pub struct KubeTopicStore {
    client: kube::Client,
    field_manager: String,
}

impl KubeTopicStore {
    pub fn new(client: kube::Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn api(&self, topic: &Topic) -> Result<Api<Topic>> {
        let namespace = topic.namespace().context(ObjectHasNoNamespaceSnafu)?;
        Ok(Api::namespaced(self.client.clone(), &namespace))
    }

    fn patch_params(&self) -> PatchParams {
        PatchParams::apply(&self.field_manager)
    }
}

#[async_trait]
impl TopicStore for KubeTopicStore {
    async fn update_parameters(&self, topic: &Topic) -> Result<()> {
        let name = topic.name_any();
        let patch = json!({ "spec": { "forProvider": topic.spec.for_provider } });

        self.api(topic)?
            .patch(&name, &self.patch_params(), &Patch::Merge(&patch))
            .await
            .context(PatchParametersSnafu { name: name.clone() })?;
        Ok(())
    }

    async fn set_external_name(&self, topic: &Topic, identity: &str) -> Result<()> {
        let name = topic.name_any();
        let patch = json!({
            "metadata": { "annotations": { EXTERNAL_NAME_ANNOTATION: identity } }
        });

        self.api(topic)?
            .patch(&name, &self.patch_params(), &Patch::Merge(&patch))
            .await
            .context(PatchExternalNameSnafu { name: name.clone() })?;
        Ok(())
    }

    async fn update_status(&self, topic: &Topic, status: &TopicStatus) -> Result<()> {
        let name = topic.name_any();
        let patch = status_patch(status);

        self.api(topic)?
            .patch_status(&name, &self.patch_params(), &Patch::Merge(&patch))
            .await
            .context(PatchStatusSnafu { name: name.clone() })?;
        Ok(())
    }
}

/// Builds the merge patch replacing the whole status.
///
/// Unset observation fields are sent as `null`, so values from an earlier pass are removed
/// rather than kept by the merge.
fn status_patch(status: &TopicStatus) -> serde_json::Value {
    let TopicObservation {
        topic_arn,
        subscriptions_confirmed,
        subscriptions_pending,
        subscriptions_deleted,
        effective_delivery_policy,
    } = &status.at_provider;

    json!({
        "status": {
            "conditions": status.conditions,
            "atProvider": {
                "topicArn": topic_arn,
                "subscriptionsConfirmed": subscriptions_confirmed,
                "subscriptionsPending": subscriptions_pending,
                "subscriptionsDeleted": subscriptions_deleted,
                "effectiveDeliveryPolicy": effective_delivery_policy,
            }
        }
    })
}

/// A write received by an [`InMemoryTopicStore`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StoreWrite {
    Parameters(TopicParameters),
    ExternalName(String),
    Status(TopicStatus),
}

/// A [`TopicStore`] that only records what was written.
#[derive(Debug, Default)]
pub struct InMemoryTopicStore {
    writes: Mutex<Vec<StoreWrite>>,
}

impl InMemoryTopicStore {
    pub fn writes(&self) -> Vec<StoreWrite> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn last_status(&self) -> Option<TopicStatus> {
        self.lock().iter().rev().find_map(|write| match write {
            StoreWrite::Status(status) => Some(status.clone()),
            _ => None,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Vec<StoreWrite>> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TopicStore for InMemoryTopicStore {
    async fn update_parameters(&self, topic: &Topic) -> Result<()> {
        self.lock()
            .push(StoreWrite::Parameters(topic.spec.for_provider.clone()));
        Ok(())
    }

    async fn set_external_name(&self, _topic: &Topic, identity: &str) -> Result<()> {
        self.lock().push(StoreWrite::ExternalName(identity.to_owned()));
        Ok(())
    }

    async fn update_status(&self, _topic: &Topic, status: &TopicStatus) -> Result<()> {
        self.lock().push(StoreWrite::Status(status.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::status::condition::TopicCondition;

    /// Applies `patch` to `target` with JSON merge patch semantics (RFC 7386).
    fn apply_merge_patch(target: &mut Value, patch: &Value) {
        let Value::Object(patch) = patch else {
            *target = patch.clone();
            return;
        };
        if !target.is_object() {
            *target = Value::Object(serde_json::Map::new());
        }
        if let Value::Object(target) = target {
            for (key, value) in patch {
                if value.is_null() {
                    target.remove(key);
                } else {
                    apply_merge_patch(target.entry(key.clone()).or_insert(Value::Null), value);
                }
            }
        }
    }

    #[test]
    fn status_patch_clears_vanished_observations() {
        let previous = TopicStatus {
            conditions: vec![TopicCondition::available()],
            at_provider: TopicObservation {
                topic_arn: Some("arn:aws:sns:us-east-1:000000000000:orders".to_owned()),
                subscriptions_confirmed: Some(1),
                subscriptions_pending: Some(3),
                subscriptions_deleted: Some(0),
                effective_delivery_policy: Some(r#"{"http":{}}"#.to_owned()),
            },
        };
        let current = TopicStatus {
            at_provider: TopicObservation {
                subscriptions_pending: None,
                effective_delivery_policy: None,
                ..previous.at_provider.clone()
            },
            ..previous.clone()
        };
        let mut stored = json!({ "status": previous });

        apply_merge_patch(&mut stored, &status_patch(&current));

        let stored: TopicStatus =
            serde_json::from_value(stored["status"].clone()).expect("status must deserialize");
        assert_eq!(stored, current);
    }

    #[test]
    fn status_patch_replaces_conditions() {
        let status = TopicStatus {
            conditions: vec![TopicCondition::reconcile_success()],
            ..TopicStatus::default()
        };
        let patch = status_patch(&status);

        assert_eq!(patch["status"]["conditions"].as_array().map(Vec::len), Some(1));
        assert!(patch["status"]["atProvider"]["topicArn"].is_null());
    }
}
