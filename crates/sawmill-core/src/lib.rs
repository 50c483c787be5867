//! # Sawmill Core
//!
//! Shared, runtime-free logic for Sawmill: data models, event
//! classification, grouping, the cache-freshness state machine, merge
//! semantics, and the summary store abstraction.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies. Everything here is deterministic and
//! synchronous except the [`store::SummaryStore`] trait, which is async
//! so that backends can perform real I/O.

pub mod classify;
pub mod embedding;
pub mod error;
pub mod freshness;
pub mod group;
pub mod merge;
pub mod models;
pub mod store;
