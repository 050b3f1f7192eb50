//! Backfills unset desired attributes from the observed remote topic.
use crate::{
    attributes::{ObservedAttributes, TopicAttribute, parse_bool},
    client::Tag,
    config::merge::Merge,
    crd::TopicParameters,
};

impl Merge for TopicParameters {
    fn merge(&mut self, defaults: &Self) {
        // The region is required and never taken from the remote side.
        self.delivery_policy.merge(&defaults.delivery_policy);
        self.display_name.merge(&defaults.display_name);
        self.policy.merge(&defaults.policy);
        self.fifo_topic.merge(&defaults.fifo_topic);
        self.content_based_deduplication
            .merge(&defaults.content_based_deduplication);
        self.kms_master_key_id.merge(&defaults.kms_master_key_id);
        self.tags.merge(&defaults.tags);
    }
}

/// Fills every unset field of `parameters` from the observed topic and returns whether anything
/// changed.
///
/// Text attributes are only taken if the observed value is non-empty, flags only if they parse.
/// The tag map is only initialized if it is unset and the remote topic has tags; a declared map,
/// even an empty one, is left alone.
pub fn late_initialize(
    parameters: &mut TopicParameters,
    attributes: &ObservedAttributes,
    tags: &[Tag],
) -> bool {
    let observed = observed_parameters(&parameters.region, attributes, tags);
    let before = parameters.clone();
    parameters.merge(&observed);
    *parameters != before
}

fn observed_parameters(region: &str, attributes: &ObservedAttributes, tags: &[Tag]) -> TopicParameters {
    let text = |attribute: TopicAttribute| {
        attribute
            .observed(attributes)
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
    };
    let flag = |attribute: TopicAttribute| attribute.observed(attributes).and_then(parse_bool);

    TopicParameters {
        region: region.to_owned(),
        delivery_policy: text(TopicAttribute::DeliveryPolicy),
        display_name: text(TopicAttribute::DisplayName),
        policy: text(TopicAttribute::Policy),
        fifo_topic: flag(TopicAttribute::FifoTopic),
        content_based_deduplication: flag(TopicAttribute::ContentBasedDeduplication),
        kms_master_key_id: text(TopicAttribute::KmsMasterKeyId),
        tags: (!tags.is_empty()).then(|| {
            tags.iter()
                .map(|tag| (tag.key.clone(), tag.value.clone()))
                .collect()
        }),
    }
}
