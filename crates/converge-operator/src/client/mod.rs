//! The capabilities of the remote topic API the lifecycle depends on.
use std::collections::BTreeMap;

use async_trait::async_trait;
use snafu::Snafu;

use crate::attributes::ObservedAttributes;

pub mod memory;

pub use memory::InMemoryTopicClient;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("topic {identity:?} does not exist"))]
    NotFound { identity: String },

    #[snafu(display("failed to call {operation} on the topic API"))]
    Transport {
        source: Box<dyn std::error::Error + Send + Sync>,
        operation: &'static str,
    },
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// A key/value tag attached to a remote topic.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Operations on remote topics, addressed by their identity (ARN).
#[async_trait]
pub trait TopicClient: Send + Sync {
    async fn fetch_attributes(&self, identity: &str) -> Result<ObservedAttributes>;

    async fn fetch_tags(&self, identity: &str) -> Result<Vec<Tag>>;

    /// Creates a topic and returns the identity the remote system assigned to it.
    async fn create(
        &self,
        name: &str,
        attributes: &BTreeMap<String, String>,
        tags: &[Tag],
    ) -> Result<String>;

    async fn set_attribute(&self, identity: &str, name: &str, value: &str) -> Result<()>;

    async fn add_tags(&self, identity: &str, tags: &[Tag]) -> Result<()>;

    async fn remove_tags(&self, identity: &str, keys: &[String]) -> Result<()>;

    async fn delete(&self, identity: &str) -> Result<()>;
}

/// Builds a [`TopicClient`] for the region a topic lives in.
///
/// Resolving credentials and endpoints is up to the implementation.
pub trait Connector: Send + Sync {
    type Client: TopicClient;

    fn connect(&self, region: &str) -> Result<Self::Client>;
}
