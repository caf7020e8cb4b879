use chrono::{DateTime, Utc};
use serde::Serialize;

/// Visibility state shared by blog posts and reports.
///
/// Rows store this as a `published` flag plus a nullable `published_at`
/// column; the two always move together through this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PublishState {
    Draft,
    Published { at: DateTime<Utc> },
}

impl PublishState {
    /// Reads the state back from its column pair. A published flag without a
    /// timestamp is not a state this module ever writes and is read as a draft.
    pub fn from_columns(published: bool, published_at: Option<DateTime<Utc>>) -> Self {
        match (published, published_at) {
            (true, Some(at)) => PublishState::Published { at },
            _ => PublishState::Draft,
        }
    }

    pub fn columns(&self) -> (bool, Option<DateTime<Utc>>) {
        match self {
            PublishState::Draft => (false, None),
            PublishState::Published { at } => (true, Some(*at)),
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, PublishState::Published { .. })
    }

    pub fn publish(self, now: DateTime<Utc>) -> Self {
        match self {
            PublishState::Draft => PublishState::Published { at: now },
            published => published,
        }
    }

    pub fn unpublish(self) -> Self {
        PublishState::Draft
    }

    /// Flips the state. A fresh publish always stamps `now`; an earlier
    /// publish time is never reused.
    pub fn toggle(self, now: DateTime<Utc>) -> Self {
        match self {
            PublishState::Draft => self.publish(now),
            PublishState::Published { .. } => self.unpublish(),
        }
    }
}
