use std::collections::BTreeMap;

use strum::IntoEnumIterator;

use crate::{
    attributes::{ObservedAttributes, TopicAttribute},
    client::Tag,
    crd::TopicParameters,
    diff::{collapse_tags, tag_values_match},
};

/// Returns `true` if the remote topic already matches `parameters`.
///
/// Agrees with [`crate::diff::SyncVerdict::compute`]: a topic is up to date exactly when both
/// the attribute diff and the tag diff are empty. Unlike the differ this stops at the first
/// mismatch and does not allocate the diff.
pub fn is_up_to_date(
    parameters: &TopicParameters,
    attributes: &ObservedAttributes,
    tags: &[Tag],
) -> bool {
    tags_in_sync(parameters.tags.as_ref(), tags)
        && TopicAttribute::iter().all(|attribute| attribute.is_in_sync(parameters, attributes))
}

fn tags_in_sync(desired: Option<&BTreeMap<String, String>>, observed: &[Tag]) -> bool {
    let observed = collapse_tags(observed);
    let desired_len = desired.map_or(0, BTreeMap::len);

    desired_len == observed.len()
        && desired.into_iter().flatten().all(|(key, desired_value)| {
            observed
                .get(key.as_str())
                .is_some_and(|observed_value| tag_values_match(desired_value, observed_value))
        })
}
