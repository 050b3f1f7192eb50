use k8s_openapi::{apimachinery::pkg::apis::meta::v1::Time, jiff::Timestamp};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::EnumCount;

/// Computes the conditions to store in the status, carrying over `lastTransitionTime` from
/// `current` for every condition whose status and reason did not change.
///
/// Conditions in `current` without a replacement in `updates` are kept as they are.
pub fn compute_conditions(
    current: &[TopicCondition],
    updates: impl IntoIterator<Item = TopicCondition>,
) -> Vec<TopicCondition> {
    let old_conditions: TopicConditionSet = current.iter().cloned().collect();
    let new_conditions: TopicConditionSet = updates.into_iter().collect();

    old_conditions
        .merge(new_conditions, Timestamp::now())
        .into()
}

#[derive(Clone, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicCondition {
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Last time the condition transitioned from one status or reason to another.
    pub last_transition_time: Option<Time>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// A human readable message indicating details about the transition.
    pub message: Option<String>,
    /// The reason for the condition's last transition.
    pub reason: TopicConditionReason,
    /// Status of the condition, one of True, False, Unknown.
    pub status: TopicConditionStatus,
    #[serde(rename = "type")]
    pub type_: TopicConditionType,
}

impl TopicCondition {
    fn new(
        type_: TopicConditionType,
        status: TopicConditionStatus,
        reason: TopicConditionReason,
    ) -> Self {
        Self {
            last_transition_time: None,
            message: None,
            reason,
            status,
            type_,
        }
    }

    /// The remote topic is being created.
    pub fn creating() -> Self {
        Self::new(
            TopicConditionType::Ready,
            TopicConditionStatus::False,
            TopicConditionReason::Creating,
        )
    }

    /// The remote topic exists and was observed on the last pass.
    pub fn available() -> Self {
        Self::new(
            TopicConditionType::Ready,
            TopicConditionStatus::True,
            TopicConditionReason::Available,
        )
    }

    /// The remote topic does not exist (anymore).
    pub fn unavailable() -> Self {
        Self::new(
            TopicConditionType::Ready,
            TopicConditionStatus::False,
            TopicConditionReason::Unavailable,
        )
    }

    /// The remote topic is being deleted.
    pub fn deleting() -> Self {
        Self::new(
            TopicConditionType::Ready,
            TopicConditionStatus::False,
            TopicConditionReason::Deleting,
        )
    }

    pub fn reconcile_success() -> Self {
        Self::new(
            TopicConditionType::Synced,
            TopicConditionStatus::True,
            TopicConditionReason::ReconcileSuccess,
        )
    }

    pub fn reconcile_error(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(
                TopicConditionType::Synced,
                TopicConditionStatus::False,
                TopicConditionReason::ReconcileError,
            )
        }
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    EnumCount,
    Eq,
    Hash,
    JsonSchema,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(rename_all = "PascalCase")]
pub enum TopicConditionType {
    /// Ready reports whether the remote topic exists and can be used.
    Ready,
    /// Synced reports whether the last pass converged the remote topic without errors.
    Synced,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub enum TopicConditionReason {
    Creating,
    Available,
    Unavailable,
    Deleting,
    ReconcileSuccess,
    ReconcileError,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub enum TopicConditionStatus {
    /// True means a resource is in the condition.
    True,
    /// False means a resource is not in the condition.
    False,
    /// Unknown means kubernetes cannot decide if a resource is in the condition or not.
    Unknown,
}

/// Helper struct to order and merge `TopicCondition` objects.
struct TopicConditionSet {
    // Each condition type has its fixed position, which keeps the stored order stable and
    // prevents two conditions of the same type.
    conditions: Vec<Option<TopicCondition>>,
}

impl TopicConditionSet {
    fn new() -> Self {
        Self {
            conditions: vec![None; TopicConditionType::COUNT],
        }
    }

    fn put(&mut self, condition: TopicCondition) {
        let index = condition.type_ as usize;
        self.conditions[index] = Some(condition);
    }

    fn merge(self, other: Self, now: Timestamp) -> Self {
        let mut result = Self::new();

        for (old_condition, new_condition) in self.conditions.into_iter().zip(other.conditions) {
            if let Some(condition) = match (old_condition, new_condition) {
                (Some(old), Some(new)) => Some(update_timestamp(old, new, now)),
                (Some(old), None) => Some(old),
                (None, Some(new)) => Some(TopicCondition {
                    last_transition_time: Some(Time(now)),
                    ..new
                }),
                (None, None) => None,
            } {
                result.put(condition);
            }
        }

        result
    }
}

/// Keeps the old `lastTransitionTime` unless the status or the reason changed.
fn update_timestamp(
    old_condition: TopicCondition,
    new_condition: TopicCondition,
    now: Timestamp,
) -> TopicCondition {
    let last_transition_time = if old_condition.status == new_condition.status
        && old_condition.reason == new_condition.reason
    {
        old_condition.last_transition_time.or(Some(Time(now)))
    } else {
        Some(Time(now))
    };

    TopicCondition {
        last_transition_time,
        ..new_condition
    }
}

impl From<TopicConditionSet> for Vec<TopicCondition> {
    fn from(value: TopicConditionSet) -> Self {
        value.conditions.into_iter().flatten().collect()
    }
}

impl FromIterator<TopicCondition> for TopicConditionSet {
    fn from_iter<I: IntoIterator<Item = TopicCondition>>(iter: I) -> Self {
        let mut result = Self::new();
        for condition in iter {
            result.put(condition);
        }
        result
    }
}
