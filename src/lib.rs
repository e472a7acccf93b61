//! Supportdesk: customer support email triage.
//!
//! Ingests support email, classifies it (priority, category, sentiment),
//! extracts structured facts, drafts knowledge-grounded replies and serves
//! dashboards over a REST API. Replies are produced by an in-memory priority
//! queue that processes urgent mail first, with bounded concurrency and
//! retries.
//!
//! See `DESIGN.md` for architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod logging;

pub mod classifier;
pub mod knowledge;

pub mod providers;
pub mod responder;
pub mod sender;
pub mod store;

pub mod ingest;
pub mod queue;

pub mod api;
