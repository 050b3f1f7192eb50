use std::collections::BTreeMap;

use converge_operator::{
    client::{InMemoryTopicClient, Tag, TopicClient, memory::Call},
    crd::{Topic, TopicParameters, TopicSpec},
    external::{Lifecycle, ReconcileOutcome},
    status::condition::{TopicConditionReason, TopicConditionType},
    store::{InMemoryTopicStore, StoreWrite},
};

const REGION: &str = "us-east-1";

fn declared_topic() -> Topic {
    let mut topic = Topic::new(
        "orders",
        TopicSpec {
            for_provider: TopicParameters {
                region: REGION.to_owned(),
                display_name: Some("Orders".to_owned()),
                fifo_topic: Some(false),
                tags: Some(BTreeMap::from([
                    ("env".to_owned(), "prod".to_owned()),
                    ("team".to_owned(), "core".to_owned()),
                ])),
                ..Default::default()
            },
        },
    );
    topic.metadata.namespace = Some("messaging".to_owned());
    topic
}

fn ready_reason(topic: &Topic) -> Option<TopicConditionReason> {
    topic
        .conditions()
        .iter()
        .find(|condition| condition.type_ == TopicConditionType::Ready)
        .map(|condition| condition.reason)
}

#[tokio::test]
async fn created_topic_is_up_to_date_on_the_next_pass() {
    let client = InMemoryTopicClient::new(REGION);
    let store = InMemoryTopicStore::default();
    let lifecycle = Lifecycle::new(&client, &store);
    let mut topic = declared_topic();

    let outcome = lifecycle.reconcile(&mut topic).await.expect("create pass");
    assert!(matches!(outcome, ReconcileOutcome::Created { .. }));
    assert_eq!(ready_reason(&topic), Some(TopicConditionReason::Creating));

    client.clear_calls();
    store.clear();
    let declared = topic.spec.for_provider.clone();

    let outcome = lifecycle.reconcile(&mut topic).await.expect("observe pass");
    assert_eq!(outcome, ReconcileOutcome::Unchanged);
    assert!(client.calls().is_empty(), "no mutating calls expected");
    assert_eq!(topic.spec.for_provider, declared, "nothing to late initialize");
    assert_eq!(ready_reason(&topic), Some(TopicConditionReason::Available));

    let status = store.last_status().expect("status must be written");
    assert_eq!(
        status.at_provider.topic_arn.as_deref(),
        Some("arn:aws:sns:us-east-1:000000000000:orders")
    );
    assert_eq!(status.at_provider.subscriptions_confirmed, Some(0));

    // A third pass changes nothing, not even the status.
    store.clear();
    let outcome = lifecycle.reconcile(&mut topic).await.expect("steady pass");
    assert_eq!(outcome, ReconcileOutcome::Unchanged);
    assert!(client.calls().is_empty());
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn drift_is_reverted() {
    let client = InMemoryTopicClient::new(REGION);
    let store = InMemoryTopicStore::default();
    let lifecycle = Lifecycle::new(&client, &store);
    let mut topic = declared_topic();
    lifecycle.reconcile(&mut topic).await.expect("create pass");

    let identity = client.identity_for("orders");
    client
        .set_remote_attribute(&identity, "DisplayName", "Something else")
        .expect("topic exists");
    client
        .set_remote_tags(
            &identity,
            vec![
                Tag::new("env", "staging"),
                Tag::new("team", "core"),
                Tag::new("owner", "x"),
            ],
        )
        .expect("topic exists");
    client.clear_calls();

    let outcome = lifecycle.reconcile(&mut topic).await.expect("update pass");
    assert_eq!(
        outcome,
        ReconcileOutcome::Updated {
            attributes: 1,
            tags_added: 1,
            tags_removed: 2,
        }
    );
    assert_eq!(
        client.calls(),
        [
            Call::SetAttribute {
                identity: identity.clone(),
                name: "DisplayName".to_owned(),
                value: "Orders".to_owned(),
            },
            Call::RemoveTags {
                identity: identity.clone(),
                keys: vec!["env".to_owned(), "owner".to_owned()],
            },
            Call::AddTags {
                identity: identity.clone(),
                tags: vec![Tag::new("env", "prod")],
            },
        ]
    );

    client.clear_calls();
    let outcome = lifecycle.reconcile(&mut topic).await.expect("steady pass");
    assert_eq!(outcome, ReconcileOutcome::Unchanged);
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn remote_defaults_are_late_initialized() {
    let client = InMemoryTopicClient::new(REGION);
    let store = InMemoryTopicStore::default();
    let lifecycle = Lifecycle::new(&client, &store);
    let mut topic = declared_topic();
    lifecycle.reconcile(&mut topic).await.expect("create pass");

    // The remote system assigned a key on its own.
    let identity = client.identity_for("orders");
    client
        .set_remote_attribute(&identity, "KmsMasterKeyId", "alias/aws/sns")
        .expect("topic exists");
    store.clear();

    let outcome = lifecycle.reconcile(&mut topic).await.expect("observe pass");
    assert_eq!(outcome, ReconcileOutcome::Unchanged);
    assert_eq!(
        topic.spec.for_provider.kms_master_key_id.as_deref(),
        Some("alias/aws/sns")
    );
    assert_eq!(
        store.writes().first(),
        Some(&StoreWrite::Parameters(topic.spec.for_provider.clone()))
    );
}

#[tokio::test]
async fn topic_deleted_behind_our_back_is_recreated() {
    let client = InMemoryTopicClient::new(REGION);
    let store = InMemoryTopicStore::default();
    let lifecycle = Lifecycle::new(&client, &store);
    let mut topic = declared_topic();
    lifecycle.reconcile(&mut topic).await.expect("create pass");

    let identity = client.identity_for("orders");
    client.delete(&identity).await.expect("topic exists");

    let outcome = lifecycle.reconcile(&mut topic).await.expect("recreate pass");
    assert_eq!(outcome, ReconcileOutcome::Created { identity });
}

#[tokio::test]
async fn deletion_is_idempotent() {
    let client = InMemoryTopicClient::new(REGION);
    let store = InMemoryTopicStore::default();
    let lifecycle = Lifecycle::new(&client, &store);
    let mut topic = declared_topic();
    lifecycle.reconcile(&mut topic).await.expect("create pass");
    let identity = client.identity_for("orders");

    let outcome = lifecycle.cleanup(&mut topic).await.expect("delete pass");
    assert_eq!(outcome, ReconcileOutcome::Deleted);
    assert!(!client.contains(&identity));

    let outcome = lifecycle.cleanup(&mut topic).await.expect("repeated delete pass");
    assert_eq!(outcome, ReconcileOutcome::Deleted);
    assert_eq!(ready_reason(&topic), Some(TopicConditionReason::Deleting));
}

#[tokio::test]
async fn failed_creation_is_reported_and_retried() {
    let client = InMemoryTopicClient::new(REGION);
    let store = InMemoryTopicStore::default();
    let lifecycle = Lifecycle::new(&client, &store);
    let mut topic = declared_topic();

    client.fail_on_call(0);
    let error = lifecycle
        .reconcile(&mut topic)
        .await
        .expect_err("creation must fail");
    assert!(error.to_string().contains("orders"));
    assert_eq!(topic.external_name(), None);
    assert_eq!(ready_reason(&topic), Some(TopicConditionReason::Unavailable));

    let outcome = lifecycle.reconcile(&mut topic).await.expect("retry");
    assert!(matches!(outcome, ReconcileOutcome::Created { .. }));
}
