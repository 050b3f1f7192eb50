//! The lifecycle of a remote topic: observe it, then create, update or delete it.
//!
//! Every pass starts from a fresh observation and recomputes what to do from scratch, so a pass
//! that failed or was cancelled halfway is simply continued by the next one. Nothing is rolled
//! back.
use std::{collections::BTreeMap, future::Future, time::Duration};

use kube::ResourceExt;
use snafu::{ResultExt, Snafu};
use strum::{EnumDiscriminants, IntoEnumIterator, IntoStaticStr};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::{
    attributes::{ObservedAttributes, TopicAttribute},
    client::{self, Tag, TopicClient},
    compare::is_up_to_date,
    crd::{Topic, TopicObservation, TopicParameters, TopicStatus},
    diff::SyncVerdict,
    late_init::late_initialize,
    logging::ReconcilerError,
    observation::generate_observation,
    status::condition::{TopicCondition, compute_conditions},
    store::{self, TopicStore},
};

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, EnumDiscriminants, Snafu)]
#[strum_discriminants(derive(IntoStaticStr))]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("failed to fetch the attributes of topic {identity:?}"))]
    FetchAttributes {
        source: client::Error,
        identity: String,
    },

    #[snafu(display("failed to fetch the tags of topic {identity:?}"))]
    FetchTags {
        source: client::Error,
        identity: String,
    },

    #[snafu(display("failed to create topic {name:?}"))]
    CreateTopic { source: client::Error, name: String },

    #[snafu(display("failed to record external name {identity:?} of the created topic"))]
    RecordExternalName {
        source: store::Error,
        identity: String,
    },

    #[snafu(display("failed to update attribute {attribute}"))]
    UpdateAttribute {
        source: client::Error,
        attribute: TopicAttribute,
    },

    #[snafu(display("failed to remove tags {keys:?}"))]
    RemoveTags {
        source: client::Error,
        keys: Vec<String>,
    },

    #[snafu(display("failed to add tags"))]
    AddTags { source: client::Error },

    #[snafu(display("failed to delete topic {identity:?}"))]
    DeleteTopic {
        source: client::Error,
        identity: String,
    },

    #[snafu(display("failed to persist late initialized parameters"))]
    PersistParameters { source: store::Error },

    #[snafu(display("failed to persist status"))]
    PersistStatus { source: store::Error },

    #[snafu(display("{operation} was cancelled"))]
    Cancelled { operation: &'static str },

    #[snafu(display("{operation} did not finish within {timeout:?}"))]
    TimedOut {
        operation: &'static str,
        timeout: Duration,
    },
}

impl ReconcilerError for Error {
    fn category(&self) -> &'static str {
        ErrorDiscriminants::from(self).into()
    }
}

/// What a pass found out about the remote topic.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Observation {
    /// No identity was recorded yet, or the remote system does not know it.
    Absent,

    Present {
        identity: String,
        attributes: ObservedAttributes,
        tags: Vec<Tag>,
        up_to_date: bool,
        /// Whether unset parameters were filled from the remote topic (and persisted).
        late_initialized: bool,
    },
}

/// What a pass did to the remote topic.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReconcileOutcome {
    Created {
        identity: String,
    },
    Updated {
        attributes: usize,
        tags_added: usize,
        tags_removed: usize,
    },
    Unchanged,
    Deleted,
}

/// Runs the lifecycle of one topic against a [`TopicClient`], persisting through a
/// [`TopicStore`].
///
/// Every remote call honors the cancellation token and the per-call timeout.
pub struct Lifecycle<'a, C, S> {
    client: &'a C,
    store: &'a S,
    call_timeout: Duration,
    cancellation: CancellationToken,
}

impl<'a, C, S> Lifecycle<'a, C, S>
where
    C: TopicClient,
    S: TopicStore,
{
    pub fn new(client: &'a C, store: &'a S) -> Self {
        Self {
            client,
            store,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Converges the remote topic to `topic` and refreshes its status.
    ///
    /// On failure the `Synced` condition carries the error, and the error is returned so the
    /// caller can schedule the next pass.
    #[instrument(skip_all, fields(topic = %topic.name_any()))]
    pub async fn reconcile(&self, topic: &mut Topic) -> Result<ReconcileOutcome> {
        match self.converge(topic).await {
            Ok((outcome, status)) => {
                self.persist_status(topic, status).await?;
                Ok(outcome)
            }
            Err(error) => {
                self.record_failure(topic, &error).await;
                Err(error)
            }
        }
    }

    /// Deletes the remote topic of a `topic` that is going away.
    #[instrument(skip_all, fields(topic = %topic.name_any()))]
    pub async fn cleanup(&self, topic: &mut Topic) -> Result<ReconcileOutcome> {
        let status = next_status(topic, [TopicCondition::deleting()], None);
        self.persist_status(topic, status).await?;

        if let Err(error) = self.delete(topic).await {
            self.record_failure(topic, &error).await;
            return Err(error);
        }
        Ok(ReconcileOutcome::Deleted)
    }

    async fn converge(&self, topic: &mut Topic) -> Result<(ReconcileOutcome, TopicStatus)> {
        match self.observe(topic).await? {
            Observation::Absent => {
                let identity = self.create(topic).await?;
                let status = next_status(
                    topic,
                    [
                        TopicCondition::creating(),
                        TopicCondition::reconcile_success(),
                    ],
                    None,
                );
                Ok((ReconcileOutcome::Created { identity }, status))
            }
            Observation::Present {
                identity,
                attributes,
                tags,
                up_to_date,
                ..
            } => {
                let outcome = if up_to_date {
                    ReconcileOutcome::Unchanged
                } else {
                    let verdict =
                        SyncVerdict::compute(&topic.spec.for_provider, &attributes, &tags);
                    self.update(&identity, &verdict).await?;
                    ReconcileOutcome::Updated {
                        attributes: verdict.attributes.len(),
                        tags_added: verdict.tags.to_add.len(),
                        tags_removed: verdict.tags.to_remove.len(),
                    }
                };
                let status = next_status(
                    topic,
                    [
                        TopicCondition::available(),
                        TopicCondition::reconcile_success(),
                    ],
                    Some(generate_observation(&attributes)),
                );
                Ok((outcome, status))
            }
        }
    }

    /// Reads the remote topic and late-initializes the parameters of `topic` from it.
    ///
    /// A topic without a recorded identity is absent without asking the remote system.
    pub async fn observe(&self, topic: &mut Topic) -> Result<Observation> {
        let Some(identity) = topic.external_name().map(str::to_owned) else {
            debug!("no external name recorded, topic does not exist yet");
            return Ok(Observation::Absent);
        };

        let attributes = match self
            .call("GetTopicAttributes", self.client.fetch_attributes(&identity))
            .await?
        {
            Ok(attributes) => attributes,
            Err(error) if error.is_not_found() => {
                info!(%identity, "remote topic does not exist");
                return Ok(Observation::Absent);
            }
            Err(error) => return Err(error).context(FetchAttributesSnafu { identity }),
        };
        let tags = match self
            .call("ListTagsForResource", self.client.fetch_tags(&identity))
            .await?
        {
            Ok(tags) => tags,
            Err(error) if error.is_not_found() => {
                info!(%identity, "remote topic disappeared while observing it");
                return Ok(Observation::Absent);
            }
            Err(error) => return Err(error).context(FetchTagsSnafu { identity }),
        };

        let late_initialized = late_initialize(&mut topic.spec.for_provider, &attributes, &tags);
        if late_initialized {
            debug!("persisting late initialized parameters");
            self.store
                .update_parameters(topic)
                .await
                .context(PersistParametersSnafu)?;
        }

        let up_to_date = is_up_to_date(&topic.spec.for_provider, &attributes, &tags);
        Ok(Observation::Present {
            identity,
            attributes,
            tags,
            up_to_date,
            late_initialized,
        })
    }

    /// Creates the remote topic and records the identity the remote system assigned.
    pub async fn create(&self, topic: &mut Topic) -> Result<String> {
        let name = topic.name_any();
        let parameters = &topic.spec.for_provider;
        let attributes = creation_attributes(parameters);
        let tags: Vec<Tag> = parameters
            .tags
            .iter()
            .flatten()
            .map(|(key, value)| Tag::new(key, value))
            .collect();

        let identity = self
            .call("CreateTopic", self.client.create(&name, &attributes, &tags))
            .await?
            .context(CreateTopicSnafu { name })?;

        self.store
            .set_external_name(topic, &identity)
            .await
            .context(RecordExternalNameSnafu {
                identity: identity.clone(),
            })?;
        topic.set_external_name(identity.clone());

        info!(%identity, "created remote topic");
        Ok(identity)
    }

    /// Applies `verdict` to the remote topic.
    ///
    /// Attributes are set one at a time. If one fails, the ones before it stay applied and the
    /// error names the failing attribute.
    pub async fn update(&self, identity: &str, verdict: &SyncVerdict) -> Result<()> {
        for (attribute, value) in &verdict.attributes {
            self.call(
                "SetTopicAttributes",
                self.client.set_attribute(identity, attribute.as_ref(), value),
            )
            .await?
            .context(UpdateAttributeSnafu {
                attribute: *attribute,
            })?;
            debug!(%attribute, "updated attribute");
        }

        if !verdict.tags.to_remove.is_empty() {
            let keys = verdict.tags.keys_to_remove();
            self.call("UntagResource", self.client.remove_tags(identity, &keys))
                .await?
                .context(RemoveTagsSnafu { keys })?;
        }
        if !verdict.tags.to_add.is_empty() {
            self.call(
                "TagResource",
                self.client.add_tags(identity, &verdict.tags.tags_to_add()),
            )
            .await?
            .context(AddTagsSnafu)?;
        }

        info!(
            identity,
            attributes = verdict.attributes.len(),
            tags_added = verdict.tags.to_add.len(),
            tags_removed = verdict.tags.to_remove.len(),
            "updated remote topic"
        );
        Ok(())
    }

    /// Deletes the remote topic. A topic the remote system does not know counts as deleted.
    pub async fn delete(&self, topic: &Topic) -> Result<()> {
        let Some(identity) = topic.external_name() else {
            debug!("no external name recorded, nothing to delete");
            return Ok(());
        };

        match self
            .call("DeleteTopic", self.client.delete(identity))
            .await?
        {
            Ok(()) => info!(identity, "deleted remote topic"),
            Err(error) if error.is_not_found() => {
                info!(identity, "remote topic was already deleted");
            }
            Err(error) => return Err(error).context(DeleteTopicSnafu { identity }),
        }
        Ok(())
    }

    /// Awaits a remote call unless the pass is cancelled or the call times out first.
    #[instrument(level = "debug", skip(self, request))]
    async fn call<T>(
        &self,
        operation: &'static str,
        request: impl Future<Output = client::Result<T>>,
    ) -> Result<client::Result<T>> {
        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => CancelledSnafu { operation }.fail(),
            response = tokio::time::timeout(self.call_timeout, request) => {
                response.map_err(|_| {
                    TimedOutSnafu {
                        operation,
                        timeout: self.call_timeout,
                    }
                    .build()
                })
            }
        }
    }

    async fn persist_status(&self, topic: &mut Topic, status: TopicStatus) -> Result<()> {
        if topic.status.as_ref() == Some(&status) {
            return Ok(());
        }
        self.store
            .update_status(topic, &status)
            .await
            .context(PersistStatusSnafu)?;
        topic.status = Some(status);
        Ok(())
    }

    async fn record_failure(&self, topic: &mut Topic, error: &Error) {
        let mut conditions = vec![TopicCondition::reconcile_error(
            snafu::Report::from_error(error).to_string(),
        )];
        if matches!(error, Error::CreateTopic { .. }) {
            conditions.push(TopicCondition::unavailable());
        }

        let status = next_status(topic, conditions, None);
        if let Err(status_error) = self.persist_status(topic, status).await {
            warn!(
                error = &status_error as &dyn std::error::Error,
                "failed to record reconcile error in status"
            );
        }
    }
}

/// The attributes sent when creating a topic: every attribute that is set, in canonical form.
///
/// Unset attributes are left out so the remote system applies its defaults.
pub fn creation_attributes(parameters: &TopicParameters) -> BTreeMap<String, String> {
    TopicAttribute::iter()
        .filter_map(|attribute| {
            let desired = attribute.desired(parameters);
            desired
                .is_set()
                .then(|| (attribute.to_string(), desired.canonical()))
        })
        .collect()
}

fn next_status(
    topic: &Topic,
    conditions: impl IntoIterator<Item = TopicCondition>,
    at_provider: Option<TopicObservation>,
) -> TopicStatus {
    let current = topic.status.clone().unwrap_or_default();
    TopicStatus {
        conditions: compute_conditions(&current.conditions, conditions),
        at_provider: at_provider.unwrap_or(current.at_provider),
    }
}
