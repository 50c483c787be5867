//! # Sawmill
//!
//! **A log aggregation and cache-freshness engine for paginated remote
//! log stores.**
//!
//! Sawmill answers "summarize this project's recent error and warning
//! activity" while minimizing calls to an expensive, paginated remote
//! log store and an optional embedding enrichment step. It does this by
//! maintaining a per-project incremental cache of deduplicated log
//! summaries with an explicit staleness contract.
//!
//! ## Pipeline
//!
//! ```text
//! ┌────────────┐   ┌──────────┐   ┌─────────┐   ┌────────┐   ┌─────────┐
//! │ LogSource  │──▶│ Fetcher  │──▶│ Grouper │──▶│ Merge  │──▶│ SQLite  │
//! │ CloudWatch │   │ paginate │   │ classify│   │ engine │   │ cache   │
//! └────────────┘   └──────────┘   └─────────┘   └───┬────┘   └─────────┘
//!                                                   │
//!                                             ┌─────▼─────┐
//!                                             │ Embedder  │  (optional)
//!                                             └───────────┘
//! ```
//!
//! The freshness controller in front of the pipeline decides per request
//! among serve-cached / incremental-fetch / full-fetch, based solely on
//! the age of the newest cached data point. See
//! [`sawmill_core::freshness`] for the state machine and
//! [`pipeline::Processor`] for the orchestration.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`source`] | The `LogSource` adapter trait and page contract |
//! | [`cloudwatch`] | CloudWatch Logs adapter with SigV4 signing |
//! | [`fetcher`] | Stream discovery, pruning, capped concurrent pagination |
//! | [`embedding`] | Enrichment provider trait, OpenAI implementation |
//! | [`pipeline`] | Orchestrator: freshness → fetch → group → merge → persist → enrich |
//! | [`sqlite_store`] | SQLite-backed summary store |
//! | [`db`] | SQLite connection pool (WAL) and schema migrations |
//! | [`stats`] | Cache statistics and summary display commands |

pub mod cloudwatch;
pub mod config;
pub mod db;
pub mod embedding;
pub mod fetcher;
pub mod pipeline;
pub mod source;
pub mod sqlite_store;
pub mod stats;

pub use pipeline::Processor;
pub use sawmill_core::models::{ProcessingResult, ResultSource};
pub use source::{EventPage, LogSource, StreamInfo};
