use crate::{
    attributes::{ObservedAttributes, observed},
    crd::TopicObservation,
};

/// Projects the read-only attributes of the remote topic into the status view.
///
/// Counters that are absent or not numeric are left unset, as is empty text.
pub fn generate_observation(attributes: &ObservedAttributes) -> TopicObservation {
    let text = |name: &str| {
        attributes
            .get(name)
            .filter(|value| !value.is_empty())
            .cloned()
    };
    let counter = |name: &str| attributes.get(name).and_then(|value| value.parse().ok());

    TopicObservation {
        topic_arn: text(observed::TOPIC_ARN),
        subscriptions_confirmed: counter(observed::SUBSCRIPTIONS_CONFIRMED),
        subscriptions_pending: counter(observed::SUBSCRIPTIONS_PENDING),
        subscriptions_deleted: counter(observed::SUBSCRIPTIONS_DELETED),
        effective_delivery_policy: text(observed::EFFECTIVE_DELIVERY_POLICY),
    }
}
