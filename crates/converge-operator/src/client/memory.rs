//! A [`TopicClient`] keeping topics in memory.
//!
//! Behaves like the remote API where the lifecycle can tell the difference: identities are
//! assigned on creation, unknown identities are reported as not found, and read-only attributes
//! are computed on read. Mutating calls are recorded and a failure can be injected into any of
//! them.
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use snafu::Snafu;

use super::{Connector, Error, NotFoundSnafu, Result, Tag, TopicClient};
use crate::attributes::{ObservedAttributes, TopicAttribute, observed};

pub const ACCOUNT_ID: &str = "000000000000";

const DEFAULT_DELIVERY_POLICY: &str = r#"{"http":{"defaultHealthyRetryPolicy":{"minDelayTarget":20,"maxDelayTarget":20,"numRetries":3,"numMaxDelayRetries":0,"numNoDelayRetries":0,"numMinDelayRetries":0,"backoffFunction":"linear"},"disableSubscriptionOverrides":false,"defaultRequestPolicy":{"headerContentType":"text/plain; charset=UTF-8"}}}"#;

#[derive(Debug, Snafu)]
#[snafu(display("injected failure on mutating call #{call}"))]
pub struct InjectedFailure {
    call: usize,
}

/// A mutating call received by an [`InMemoryTopicClient`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Call {
    Create {
        name: String,
        attributes: BTreeMap<String, String>,
        tags: Vec<Tag>,
    },
    SetAttribute {
        identity: String,
        name: String,
        value: String,
    },
    AddTags {
        identity: String,
        tags: Vec<Tag>,
    },
    RemoveTags {
        identity: String,
        keys: Vec<String>,
    },
    Delete {
        identity: String,
    },
}

#[derive(Debug, Default)]
struct RemoteTopic {
    attributes: BTreeMap<String, String>,
    tags: Vec<Tag>,
}

#[derive(Debug, Default)]
struct State {
    topics: BTreeMap<String, RemoteTopic>,
    calls: Vec<Call>,
    fail_on_call: Option<usize>,
}

/// Clones share the same topics, so a clone connected to another region sees every topic.
#[derive(Clone, Debug)]
pub struct InMemoryTopicClient {
    region: String,
    state: Arc<Mutex<State>>,
}

impl InMemoryTopicClient {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            state: Arc::default(),
        }
    }

    pub fn identity_for(&self, name: &str) -> String {
        format!("arn:aws:sns:{region}:{ACCOUNT_ID}:{name}", region = self.region)
    }

    /// Every mutating call received so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Makes the `n`-th mutating call from now (counting from zero) fail with a transport error.
    pub fn fail_on_call(&self, n: usize) {
        let mut state = self.lock();
        state.fail_on_call = Some(state.calls.len() + n);
    }

    /// Changes an attribute behind the lifecycle's back, without recording a call.
    pub fn set_remote_attribute(&self, identity: &str, name: &str, value: &str) -> Result<()> {
        let mut state = self.lock();
        let topic = topic_mut(&mut state, identity)?;
        topic.attributes.insert(name.to_owned(), value.to_owned());
        Ok(())
    }

    /// Changes the tags behind the lifecycle's back, without recording a call.
    pub fn set_remote_tags(&self, identity: &str, tags: Vec<Tag>) -> Result<()> {
        let mut state = self.lock();
        topic_mut(&mut state, identity)?.tags = tags;
        Ok(())
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.lock().topics.contains_key(identity)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records `call` and returns the state to apply it to, unless a failure was injected.
    fn record(&self, operation: &'static str, call: Call) -> Result<MutexGuard<'_, State>> {
        let mut state = self.lock();
        let index = state.calls.len();
        state.calls.push(call);

        if state.fail_on_call == Some(index) {
            state.fail_on_call = None;
            return Err(Error::Transport {
                source: Box::new(InjectedFailure { call: index }),
                operation,
            });
        }
        Ok(state)
    }
}

fn topic_mut<'a>(state: &'a mut State, identity: &str) -> Result<&'a mut RemoteTopic> {
    state
        .topics
        .get_mut(identity)
        .ok_or_else(|| NotFoundSnafu { identity }.build())
}

#[async_trait]
impl TopicClient for InMemoryTopicClient {
    async fn fetch_attributes(&self, identity: &str) -> Result<ObservedAttributes> {
        let state = self.lock();
        let topic = state
            .topics
            .get(identity)
            .ok_or_else(|| NotFoundSnafu { identity }.build())?;

        let mut attributes = topic.attributes.clone();
        let effective_delivery_policy = topic
            .attributes
            .get(TopicAttribute::DeliveryPolicy.as_ref())
            .filter(|policy| !policy.is_empty())
            .map_or(DEFAULT_DELIVERY_POLICY, String::as_str)
            .to_owned();
        attributes.extend([
            (observed::TOPIC_ARN.to_owned(), identity.to_owned()),
            (observed::SUBSCRIPTIONS_CONFIRMED.to_owned(), "0".to_owned()),
            (observed::SUBSCRIPTIONS_PENDING.to_owned(), "0".to_owned()),
            (observed::SUBSCRIPTIONS_DELETED.to_owned(), "0".to_owned()),
            (
                observed::EFFECTIVE_DELIVERY_POLICY.to_owned(),
                effective_delivery_policy,
            ),
        ]);
        Ok(attributes)
    }

    async fn fetch_tags(&self, identity: &str) -> Result<Vec<Tag>> {
        let state = self.lock();
        state
            .topics
            .get(identity)
            .map(|topic| topic.tags.clone())
            .ok_or_else(|| NotFoundSnafu { identity }.build())
    }

    async fn create(
        &self,
        name: &str,
        attributes: &BTreeMap<String, String>,
        tags: &[Tag],
    ) -> Result<String> {
        let mut state = self.record(
            "CreateTopic",
            Call::Create {
                name: name.to_owned(),
                attributes: attributes.clone(),
                tags: tags.to_vec(),
            },
        )?;

        // Creating an existing topic with the same name returns its identity.
        let identity = self.identity_for(name);
        state
            .topics
            .entry(identity.clone())
            .or_insert_with(|| RemoteTopic {
                attributes: attributes.clone(),
                tags: tags.to_vec(),
            });
        Ok(identity)
    }

    async fn set_attribute(&self, identity: &str, name: &str, value: &str) -> Result<()> {
        let mut state = self.record(
            "SetTopicAttributes",
            Call::SetAttribute {
                identity: identity.to_owned(),
                name: name.to_owned(),
                value: value.to_owned(),
            },
        )?;
        let topic = topic_mut(&mut state, identity)?;
        topic.attributes.insert(name.to_owned(), value.to_owned());
        Ok(())
    }

    async fn add_tags(&self, identity: &str, tags: &[Tag]) -> Result<()> {
        let mut state = self.record(
            "TagResource",
            Call::AddTags {
                identity: identity.to_owned(),
                tags: tags.to_vec(),
            },
        )?;
        let topic = topic_mut(&mut state, identity)?;
        for tag in tags {
            topic.tags.retain(|existing| existing.key != tag.key);
            topic.tags.push(tag.clone());
        }
        Ok(())
    }

    async fn remove_tags(&self, identity: &str, keys: &[String]) -> Result<()> {
        let mut state = self.record(
            "UntagResource",
            Call::RemoveTags {
                identity: identity.to_owned(),
                keys: keys.to_vec(),
            },
        )?;
        let topic = topic_mut(&mut state, identity)?;
        topic.tags.retain(|tag| !keys.contains(&tag.key));
        Ok(())
    }

    async fn delete(&self, identity: &str) -> Result<()> {
        let mut state = self.record(
            "DeleteTopic",
            Call::Delete {
                identity: identity.to_owned(),
            },
        )?;
        state
            .topics
            .remove(identity)
            .map(|_| ())
            .ok_or_else(|| NotFoundSnafu { identity }.build())
    }
}

impl Connector for InMemoryTopicClient {
    type Client = Self;

    fn connect(&self, region: &str) -> Result<Self> {
        Ok(Self {
            region: region.to_owned(),
            state: Arc::clone(&self.state),
        })
    }
}
