//! The `Topic` custom resource.
//!
//! `spec.forProvider` holds the desired state of the remote topic, `status.atProvider` the
//! read-only values the remote system computed on the last pass. The identity of the remote
//! topic is kept in the [`EXTERNAL_NAME_ANNOTATION`] annotation.
use std::collections::BTreeMap;

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::status::condition::TopicCondition;

pub mod yaml;

/// Annotation recording the identity (ARN) the remote system assigned on creation.
pub const EXTERNAL_NAME_ANNOTATION: &str = "converge.dev/external-name";

/// A notification topic managed in a remote pub/sub service.
#[derive(Clone, CustomResource, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "sns.converge.dev",
    version = "v1alpha1",
    kind = "Topic",
    plural = "topics",
    status = "TopicStatus",
    derive = "PartialEq",
    crates(
        kube_core = "kube::core",
        k8s_openapi = "k8s_openapi",
        schemars = "schemars"
    ),
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Synced","type":"string","jsonPath":".status.conditions[?(@.type==\"Synced\")].status"}"#,
    printcolumn = r#"{"name":"External-Name","type":"string","jsonPath":".metadata.annotations.converge\\.dev/external-name"}"#,
    printcolumn = r#"{"name":"ARN","type":"string","jsonPath":".status.atProvider.topicArn","priority":1}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct TopicSpec {
    /// Desired state of the remote topic.
    pub for_provider: TopicParameters,
}

/// Desired state of a topic.
///
/// Every attribute is optional. Unset attributes are filled from the remote topic on the first
/// pass that observes it, attributes set here always win.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicParameters {
    /// Region the topic lives in.
    pub region: String,

    /// The policy that defines how the service retries failed deliveries to HTTP/S endpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_policy: Option<String>,

    /// The display name to use for a topic with SMS subscriptions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// The policy that defines who can access the topic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,

    /// Whether this is a FIFO topic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fifo_topic: Option<bool>,

    /// Enables content-based deduplication for FIFO topics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_based_deduplication: Option<bool>,

    /// The ID of a managed customer master key used for server-side encryption.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_master_key_id: Option<String>,

    /// Tags attached to the topic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
}

/// Values computed by the remote system, refreshed on every pass.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicObservation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_arn: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscriptions_confirmed: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscriptions_pending: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscriptions_deleted: Option<i64>,

    /// The delivery policy after defaults were applied by the remote system.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_delivery_policy: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicStatus {
    #[serde(default)]
    pub conditions: Vec<TopicCondition>,

    #[serde(default)]
    pub at_provider: TopicObservation,
}

impl Topic {
    /// The identity of the remote topic, if one has been assigned.
    ///
    /// An empty annotation, or one still equal to the object's own name, is a placeholder and
    /// never refers to a remote topic.
    pub fn external_name(&self) -> Option<&str> {
        self.annotations()
            .get(EXTERNAL_NAME_ANNOTATION)
            .map(String::as_str)
            .filter(|name| !name.is_empty() && Some(*name) != self.metadata.name.as_deref())
    }

    pub fn set_external_name(&mut self, identity: impl Into<String>) {
        self.annotations_mut()
            .insert(EXTERNAL_NAME_ANNOTATION.to_owned(), identity.into());
    }

    pub fn conditions(&self) -> &[TopicCondition] {
        self.status
            .as_ref()
            .map(|status| status.conditions.as_slice())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn topic_with_annotation(annotation: Option<&str>) -> Topic {
        let mut topic = Topic::new(
            "orders",
            TopicSpec {
                for_provider: TopicParameters {
                    region: "eu-central-1".to_owned(),
                    ..Default::default()
                },
            },
        );
        if let Some(annotation) = annotation {
            topic.set_external_name(annotation);
        }
        topic
    }

    #[rstest]
    #[case::unset(None, None)]
    #[case::empty(Some(""), None)]
    #[case::placeholder(Some("orders"), None)]
    #[case::assigned(
        Some("arn:aws:sns:eu-central-1:000000000000:orders"),
        Some("arn:aws:sns:eu-central-1:000000000000:orders")
    )]
    fn external_name(#[case] annotation: Option<&str>, #[case] expected: Option<&str>) {
        let topic = topic_with_annotation(annotation);
        assert_eq!(topic.external_name(), expected);
    }

    #[test]
    fn parameters_use_camel_case() {
        let parameters: TopicParameters = serde_json::from_value(serde_json::json!({
            "region": "us-east-1",
            "fifoTopic": true,
            "kmsMasterKeyId": "alias/orders",
            "tags": {}
        }))
        .expect("parameters must deserialize");

        assert_eq!(parameters.fifo_topic, Some(true));
        assert_eq!(parameters.kms_master_key_id.as_deref(), Some("alias/orders"));
        assert_eq!(parameters.tags, Some(BTreeMap::new()));
        assert_eq!(parameters.display_name, None);
    }

    #[test]
    fn prints_condition_and_identity_columns() {
        use kube::CustomResourceExt;

        let crd = Topic::crd();
        let columns = crd.spec.versions[0]
            .additional_printer_columns
            .clone()
            .unwrap_or_default();
        let names: Vec<_> = columns.iter().map(|column| column.name.as_str()).collect();

        assert_eq!(names, ["Ready", "Synced", "External-Name", "ARN", "Age"]);
        assert_eq!(
            columns[0].json_path,
            r#".status.conditions[?(@.type=="Ready")].status"#
        );
        assert_eq!(
            columns[2].json_path,
            r".metadata.annotations.converge\.dev/external-name"
        );
    }
}
