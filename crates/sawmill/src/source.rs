//! The log source adapter trait.
//!
//! A [`LogSource`] is the narrow seam between the fetch pipeline and a
//! remote log store. Implement it to plug in a new backend; the built-in
//! implementation is [`CloudWatchLogSource`](crate::cloudwatch::CloudWatchLogSource).
//!
//! # Contract
//!
//! - [`list_streams`](LogSource::list_streams) returns streams ordered by
//!   most-recent-activity, descending.
//! - [`get_events`](LogSource::get_events) pages **backward in time**:
//!   each page's events are newest-first, and the returned token resumes
//!   at the next-older page. A missing token, or a token equal to the one
//!   passed in, means no further pages.
//!
//! The newest-first order is what lets the fetcher stop a stream as soon
//! as it sees an event older than the window start.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use sawmill_core::models::LogEvent;

/// A discovered stream and its most recent activity.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    /// Stream name within the log group.
    pub name: String,
    /// Timestamp of the stream's most recent event, if the store knows it.
    /// Streams with no recorded activity are treated as out-of-window.
    pub last_event_at: Option<DateTime<Utc>>,
}

/// One page of events from a single stream.
#[derive(Debug, Clone, Default)]
pub struct EventPage {
    /// Events, newest first.
    pub events: Vec<LogEvent>,
    /// Token for the next-older page; `None` when exhausted.
    pub next_token: Option<String>,
}

/// A remote, paginated log store.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Short backend identifier for logs (e.g. `"cloudwatch"`).
    fn name(&self) -> &str;

    /// Discover up to `limit` streams in a log group, ordered by
    /// most-recent-activity descending.
    async fn list_streams(&self, log_group: &str, limit: usize) -> Result<Vec<StreamInfo>>;

    /// Retrieve one page of events from a stream within `[start, end]`.
    ///
    /// Pass `token = None` for the newest page, then the previously
    /// returned token for each older page.
    async fn get_events(
        &self,
        log_group: &str,
        stream: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        token: Option<&str>,
    ) -> Result<EventPage>;
}
