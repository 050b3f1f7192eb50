//! Computes the operations needed to converge the remote topic to its desired state.
use std::collections::BTreeMap;

use strum::IntoEnumIterator;

use crate::{
    attributes::{ObservedAttributes, TopicAttribute, eq_ignore_case},
    client::Tag,
    crd::TopicParameters,
};

/// Attributes that must be set, mapped to their desired canonical value.
pub type AttributeDiff = BTreeMap<TopicAttribute, String>;

/// Tags to remove from and add to the remote topic.
///
/// A changed value shows up in both maps, since tags can only be replaced, not updated in place.
/// Removals must be applied before additions.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TagDiff {
    pub to_add: BTreeMap<String, String>,
    pub to_remove: BTreeMap<String, String>,
}

impl TagDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    pub fn keys_to_remove(&self) -> Vec<String> {
        self.to_remove.keys().cloned().collect()
    }

    pub fn tags_to_add(&self) -> Vec<Tag> {
        self.to_add
            .iter()
            .map(|(key, value)| Tag::new(key, value))
            .collect()
    }
}

/// Everything that differs between desired and observed state.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SyncVerdict {
    pub attributes: AttributeDiff,
    pub tags: TagDiff,
}

impl SyncVerdict {
    pub fn compute(
        parameters: &TopicParameters,
        attributes: &ObservedAttributes,
        tags: &[Tag],
    ) -> Self {
        Self {
            attributes: diff_attributes(parameters, attributes),
            tags: diff_tags(parameters.tags.as_ref(), tags),
        }
    }

    pub fn is_up_to_date(&self) -> bool {
        self.attributes.is_empty() && self.tags.is_empty()
    }
}

/// Returns the attributes whose observed value does not satisfy the desired one.
pub fn diff_attributes(
    parameters: &TopicParameters,
    attributes: &ObservedAttributes,
) -> AttributeDiff {
    TopicAttribute::iter()
        .filter(|attribute| !attribute.is_in_sync(parameters, attributes))
        .map(|attribute| (attribute, attribute.desired(parameters).canonical()))
        .collect()
}

/// Classifies every observed tag as kept, removed or replaced, and every desired tag that was
/// never observed as added. An unset desired map means no tags are wanted.
pub fn diff_tags(desired: Option<&BTreeMap<String, String>>, observed: &[Tag]) -> TagDiff {
    let mut pending: BTreeMap<&str, &str> = desired
        .into_iter()
        .flatten()
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect();
    let mut diff = TagDiff::default();

    for (key, observed_value) in collapse_tags(observed) {
        match pending.remove(key) {
            None => {
                diff.to_remove.insert(key.to_owned(), observed_value.to_owned());
            }
            Some(desired_value) if !tag_values_match(desired_value, observed_value) => {
                diff.to_remove.insert(key.to_owned(), observed_value.to_owned());
                diff.to_add.insert(key.to_owned(), desired_value.to_owned());
            }
            Some(_) => {}
        }
    }

    diff.to_add.extend(
        pending
            .into_iter()
            .map(|(key, value)| (key.to_owned(), value.to_owned())),
    );
    diff
}

/// Observed tags keyed by tag key. If the remote side reports a key twice, the last one wins.
pub(crate) fn collapse_tags(observed: &[Tag]) -> BTreeMap<&str, &str> {
    observed
        .iter()
        .map(|tag| (tag.key.as_str(), tag.value.as_str()))
        .collect()
}

pub(crate) fn tag_values_match(desired: &str, observed: &str) -> bool {
    eq_ignore_case(desired, observed)
}
