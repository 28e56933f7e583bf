//! The worker process: pulls task envelopes off the broker, drives each
//! mandate through the Idea DAG engine, and persists/publishes the result.

pub mod broker;
pub mod logging;
pub mod store;
pub mod worker;

pub use broker::{Broker, InMemoryBroker, LapinBroker};
pub use store::{FileTaskStore, InMemoryTaskStore, SharedTaskStore, TaskStore};
pub use worker::Worker;
