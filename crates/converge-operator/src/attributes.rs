//! The scalar attributes of a topic and how desired and observed values are compared.
//!
//! [`TopicAttribute`] is the single table both [`crate::diff`] and [`crate::compare`] walk, so
//! the two can never disagree about which attributes exist or how they match.
use std::collections::BTreeMap;

use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

use crate::crd::TopicParameters;

/// Read-only attributes reported by the remote system.
pub mod observed {
    pub const TOPIC_ARN: &str = "TopicArn";
    pub const SUBSCRIPTIONS_CONFIRMED: &str = "SubscriptionsConfirmed";
    pub const SUBSCRIPTIONS_PENDING: &str = "SubscriptionsPending";
    pub const SUBSCRIPTIONS_DELETED: &str = "SubscriptionsDeleted";
    pub const EFFECTIVE_DELIVERY_POLICY: &str = "EffectiveDeliveryPolicy";
}

/// Attributes as returned by a point-in-time read of the remote topic, keyed by wire name.
pub type ObservedAttributes = BTreeMap<String, String>;

/// A settable scalar attribute of a topic.
///
/// The [`Display`] and [`AsRef<str>`] forms are the attribute names used on the wire.
#[derive(
    AsRefStr,
    Clone,
    Copy,
    Debug,
    Display,
    EnumIter,
    EnumString,
    Eq,
    Hash,
    IntoStaticStr,
    Ord,
    PartialEq,
    PartialOrd,
)]
pub enum TopicAttribute {
    DeliveryPolicy,
    DisplayName,
    Policy,
    FifoTopic,
    KmsMasterKeyId,
    ContentBasedDeduplication,
}

/// How a desired value is compared against the observed one.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Comparison {
    /// Case-insensitive text equality, unset compares equal to empty.
    Text,
    /// Boolean equality after parsing the observed value, unset means `false`.
    Flag,
}

/// The desired value of one attribute, borrowed from [`TopicParameters`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DesiredValue<'a> {
    Text(Option<&'a str>),
    Flag(Option<bool>),
}

impl TopicAttribute {
    pub fn comparison(self) -> Comparison {
        match self {
            Self::DeliveryPolicy | Self::DisplayName | Self::Policy | Self::KmsMasterKeyId => {
                Comparison::Text
            }
            Self::FifoTopic | Self::ContentBasedDeduplication => Comparison::Flag,
        }
    }

    pub fn desired(self, parameters: &TopicParameters) -> DesiredValue<'_> {
        match self {
            Self::DeliveryPolicy => DesiredValue::Text(parameters.delivery_policy.as_deref()),
            Self::DisplayName => DesiredValue::Text(parameters.display_name.as_deref()),
            Self::Policy => DesiredValue::Text(parameters.policy.as_deref()),
            Self::KmsMasterKeyId => DesiredValue::Text(parameters.kms_master_key_id.as_deref()),
            Self::FifoTopic => DesiredValue::Flag(parameters.fifo_topic),
            Self::ContentBasedDeduplication => {
                DesiredValue::Flag(parameters.content_based_deduplication)
            }
        }
    }

    /// Looks up this attribute in an observed snapshot.
    pub fn observed(self, attributes: &ObservedAttributes) -> Option<&str> {
        attributes.get(self.as_ref()).map(String::as_str)
    }

    /// Whether the observed value already satisfies the desired one.
    pub fn is_in_sync(self, parameters: &TopicParameters, attributes: &ObservedAttributes) -> bool {
        self.desired(parameters).matches(self.observed(attributes))
    }
}

impl DesiredValue<'_> {
    pub fn is_set(&self) -> bool {
        match self {
            Self::Text(value) => value.is_some(),
            Self::Flag(value) => value.is_some(),
        }
    }

    /// The value sent to the remote system.
    pub fn canonical(&self) -> String {
        match self {
            Self::Text(value) => value.unwrap_or_default().to_owned(),
            Self::Flag(value) => value.unwrap_or_default().to_string(),
        }
    }

    pub fn matches(&self, observed: Option<&str>) -> bool {
        let observed = observed.unwrap_or_default();
        match self {
            Self::Text(desired) => eq_ignore_case(desired.unwrap_or_default(), observed),
            // The remote system leaves flags it was never given unset, which means `false`.
            Self::Flag(desired) if observed.is_empty() => !desired.unwrap_or_default(),
            Self::Flag(desired) => {
                parse_bool(observed).is_some_and(|observed| observed == desired.unwrap_or_default())
            }
        }
    }
}

/// Parses the boolean spellings the remote API emits.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Unicode case-insensitive equality without allocating.
pub fn eq_ignore_case(left: &str, right: &str) -> bool {
    left.chars()
        .flat_map(char::to_lowercase)
        .eq(right.chars().flat_map(char::to_lowercase))
}
