//! Reconciles `Topic` custom resources against a remote pub/sub topic API.
//!
//! Each pass observes the remote topic, backfills unset parameters from it, and then creates,
//! updates or deletes the remote topic until it matches the declared state. The remote API is
//! reached through [`client::TopicClient`], so any backend (or the in-memory one) can be plugged
//! in through a [`client::Connector`].
pub mod attributes;
pub mod cli;
pub mod client;
pub mod compare;
pub mod config;
pub mod controller;
pub mod crd;
pub mod diff;
pub mod external;
pub mod late_init;
pub mod logging;
pub mod namespace;
pub mod observation;
pub mod operator;
pub mod status;
pub mod store;

#[cfg(test)]
pub(crate) mod strategies;
