//! Input generators for property tests.
//!
//! Values come from small alphabets so that desired and observed values collide often,
//! including case-only differences and every boolean spelling.
use std::collections::BTreeMap;

use proptest::{collection, option, prelude::*, sample};
use strum::IntoEnumIterator;

use crate::{
    attributes::{ObservedAttributes, TopicAttribute},
    client::Tag,
    crd::TopicParameters,
};

fn text() -> impl Strategy<Value = String> {
    "[abAB]{0,2}"
}

fn tag_map() -> impl Strategy<Value = BTreeMap<String, String>> {
    collection::btree_map("[abc]", text(), 0..3)
}

pub fn topic_parameters() -> impl Strategy<Value = TopicParameters> {
    (
        option::of(text()),
        option::of(text()),
        option::of(text()),
        option::of(any::<bool>()),
        option::of(any::<bool>()),
        option::of(text()),
        option::of(tag_map()),
    )
        .prop_map(
            |(
                delivery_policy,
                display_name,
                policy,
                fifo_topic,
                content_based_deduplication,
                kms_master_key_id,
                tags,
            )| TopicParameters {
                region: "us-east-1".to_owned(),
                delivery_policy,
                display_name,
                policy,
                fifo_topic,
                content_based_deduplication,
                kms_master_key_id,
                tags,
            },
        )
}

/// Any attribute may carry text, a boolean spelling, or garbage.
pub fn observed_attributes() -> impl Strategy<Value = ObservedAttributes> {
    let names: Vec<String> = TopicAttribute::iter().map(|a| a.to_string()).collect();
    let value = prop_oneof![
        text(),
        sample::select(vec!["true", "false", "TRUE", "f", "1", "maybe"]).prop_map(str::to_owned),
    ];
    collection::btree_map(sample::select(names), value, 0..=6)
}

/// Observed tags, possibly repeating a key.
pub fn observed_tags() -> impl Strategy<Value = Vec<Tag>> {
    collection::vec(("[abc]", text()).prop_map(|(key, value)| Tag::new(key, value)), 0..4)
}
