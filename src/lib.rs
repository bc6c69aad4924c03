//! # image-builder
//!
//! **image-builder** is a queue-driven worker that turns build requests into
//! container images. It consumes requests from a durable AMQP queue, pulls the
//! user's repository, analyzes it, builds an image with the requested builder,
//! optionally pushes it to a registry, and publishes the outcome to a response
//! queue.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                 build-requests (durable, prefetch 1)
//!                          │
//!                          ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor (process runtime)                                     │
//! │  - Bus (broadcast events)                                         │
//! │  - SubscriberSet (fans out to user subscribers)                   │
//! │  - Scheduler (one active QueueSupervisor, restart bookkeeping)    │
//! └──────┬────────────────────────────────────────────────────┬───────┘
//!        ▼                                                    │
//!   ┌──────────────────┐      ┌─────────────────────────┐     │
//!   │ QueueSupervisor  │─────►│ Orchestrator::handle    │     │
//!   │ (one session)    │      │ gate → pull → analyze → │     │
//!   └──────────────────┘      │ plan → build → push     │     │
//!                             └───────────┬─────────────┘     │
//!                                         │ ack/nack, publish │
//!                                         ▼                   │
//!                             build-responses (durable)       │
//!        │ Publishes events                                   │
//!        ▼                                                    ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │              (capacity: SupervisorConfig::bus_capacity)           │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber_listener   │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                          ┌────────┼────────┐
//!                          ▼        ▼        ▼
//!                       worker1  worker2  workerN
//! ```
//!
//! ### Lifecycle
//! ```text
//! Supervisor::run()
//!   ├─► spawn QueueSupervisor #1
//!   └─ loop {
//!        ├─ RestartRequest  ─► spawn QueueSupervisor #n (consecutive carried over)
//!        ├─ Done::Exhausted ─► Err(RuntimeError::RestartsExhausted)
//!        ├─ Done::Stopped   ─► Ok(())
//!        └─ OS signal       ─► cancel, wait up to `grace` for the active instance
//!      }
//! ```
//!
//! ## Features
//! | Area              | Description                                                    | Key types / traits                         |
//! |-------------------|----------------------------------------------------------------|--------------------------------------------|
//! | **Supervision**   | Restartable queue consumer with graceful shutdown.             | [`Supervisor`], [`SupervisorBuilder`]      |
//! | **Pipeline**      | Per-delivery build stages and fault classification.            | [`pipeline::Orchestrator`], [`model::Fault`] |
//! | **Providers**     | Pluggable connectors, analyzers, builders and registries.      | [`providers::Providers`]                   |
//! | **Broker**        | AMQP transport behind object-safe traits.                      | [`broker::Broker`], [`broker::AmqpBroker`] |
//! | **Subscriber API**| Hook into lifecycle events.                                    | [`Subscribe`], [`LogWriter`]               |
//! | **Policies**      | Restart bound and backoff between consumer restarts.           | [`RestartPolicy`], [`BackoffPolicy`]       |
//! | **Configuration** | YAML file plus environment overrides.                          | [`config::AppConfig`], [`SupervisorConfig`] |
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use image_builder::{
//!     LogWriter, Subscribe, SupervisorBuilder, broker::AmqpBroker, config::AppConfig,
//!     providers::Providers,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cfg = AppConfig::load()?;
//!     let providers = Providers::from_config(&cfg).await?;
//!     let broker = Arc::new(AmqpBroker::new(
//!         &cfg.rabbitmq.uri,
//!         &cfg.rabbitmq.request_queue,
//!         &cfg.rabbitmq.response_queue,
//!     ));
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!
//!     SupervisorBuilder::new(cfg.supervisor.to_runtime(), broker, providers)
//!         .with_subscribers(subs)
//!         .build()
//!         .run()
//!         .await?;
//!     Ok(())
//! }
//! ```
pub mod broker;
pub mod config;
mod core;
mod error;
mod events;
pub mod logging;
pub mod model;
pub mod pipeline;
mod policies;
pub mod providers;
pub mod state;
mod subscribers;

#[cfg(test)]
mod testkit;

// ---- Public re-exports ----

pub use core::{Supervisor, SupervisorBuilder, SupervisorConfig};
pub use error::{RuntimeError, StageError};
pub use events::{Bus, Event, EventKind};
pub use policies::{BackoffPolicy, JitterPolicy, RestartDecision, RestartPolicy};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
