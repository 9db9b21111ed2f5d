//! Idempotent match outcome pipeline for recurring group sports.
//!
//! A completed match flows through three stages connected by named queues:
//! weak-link Elo ratings, pairwise head-to-head records and nemesis detection.
//! Every stage commits its writes, its completion marker and the messages for
//! the next stage in one conditional transaction, so at-least-once delivery
//! never double counts.
//!
//! ```ignore
//! use rivalry::{InMemoryDocumentStore, Pipeline, PipelineConfig};
//!
//! let pipeline = Pipeline::new(InMemoryDocumentStore::new(), PipelineConfig::default());
//! pipeline.record_match(&completed_match)?;
//! let stats = pipeline.run_until_idle()?;
//! ```

extern crate self as rivalry;

pub mod bus;
pub mod config;
pub mod elo;
pub mod error;
pub mod events;
pub mod logging;
pub mod model;
pub mod outbox;
pub mod pipeline;
pub mod service;
pub mod stage;
pub mod store;

pub use config::{DeliveryConfig, NemesisConfig, PipelineConfig, RatingConfig};
pub use error::PipelineError;
pub use pipeline::{Pipeline, PipelineHandle, PipelineStats};
pub use rivalry_macros::Document;
pub use store::{DocumentStore, InMemoryDocumentStore, Transaction, Versioned};
