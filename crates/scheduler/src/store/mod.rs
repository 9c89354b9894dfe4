//! Persistence boundary for events and users.
//!
//! The service only talks to `EventStore`; `PgEventStore` backs it with
//! Postgres and the in-memory store backs the unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared_types::{Event, Recurrence, User};
use uuid::Uuid;

use crate::calendar::TimeRange;
use crate::error::ApiResult;
use crate::models::{EventPatch, NewEvent, NewUser};

#[cfg(test)]
pub mod memory;
pub mod postgres;

#[cfg(test)]
pub use memory::MemoryEventStore;
pub use postgres::PgEventStore;

/// The set of events an edit or delete of a recurring event reaches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeKey {
    /// Same owner, recurrence and custom pattern. `None` patterns match
    /// each other.
    Pattern {
        user_id: Uuid,
        recurrence: Recurrence,
        custom_recurrence: Option<String>,
    },
    /// Same owner and series id.
    Series { user_id: Uuid, series_id: Uuid },
}

impl CascadeKey {
    pub fn matches(&self, event: &Event) -> bool {
        match self {
            CascadeKey::Pattern {
                user_id,
                recurrence,
                custom_recurrence,
            } => {
                event.user_id == *user_id
                    && event.recurrence == *recurrence
                    && event.custom_recurrence == *custom_recurrence
            }
            CascadeKey::Series { user_id, series_id } => {
                event.user_id == *user_id && event.series_id == Some(*series_id)
            }
        }
    }
}

/// Rows targeted by an update or delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Single(Uuid),
    Cascade(CascadeKey),
}

/// Window on an event's start instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartWindow {
    /// `from <= start < until`
    HalfOpen {
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    },
    /// `from <= start <= until`
    Closed {
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    },
}

impl StartWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        match *self {
            StartWindow::HalfOpen { from, until } => from <= instant && instant < until,
            StartWindow::Closed { from, until } => from <= instant && instant <= until,
        }
    }
}

/// Turn a search term into a LIKE pattern that matches it literally.
pub fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> ApiResult<Option<User>>;

    /// Insert the user, or refresh name and image if the email exists.
    async fn upsert_user(&self, user: NewUser) -> ApiResult<User>;

    async fn insert_event(&self, event: NewEvent) -> ApiResult<Event>;

    async fn get_event(&self, event_id: Uuid) -> ApiResult<Option<Event>>;

    /// The user's events starting inside `window`, ascending by start.
    async fn list_events(&self, user_id: Uuid, window: StartWindow) -> ApiResult<Vec<Event>>;

    /// Case-insensitive substring match on title or description, ascending
    /// by start.
    async fn search_events(&self, user_id: Uuid, term: &str) -> ApiResult<Vec<Event>>;

    /// Every selected row, ascending by start.
    async fn find_events(&self, selection: &Selection) -> ApiResult<Vec<Event>>;

    /// Apply `patch` to every selected row in one statement. Returns the
    /// number of rows changed.
    async fn update_events(&self, selection: &Selection, patch: &EventPatch) -> ApiResult<u64>;

    /// Delete every selected row in one statement. Returns the number of
    /// rows removed.
    async fn delete_events(&self, selection: &Selection) -> ApiResult<u64>;

    /// Move the event to `range` unless it would collide with another event
    /// of `user_id`. The check and the write happen atomically; returns
    /// whether the event was moved.
    async fn move_event_if_free(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        range: TimeRange,
    ) -> ApiResult<bool>;
}
