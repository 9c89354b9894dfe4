// Database models for Diesel
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use shared_types::{Event, Priority, Recurrence};
use uuid::Uuid;

/// Insertable struct for new events
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::events)]
pub struct NewEvent {
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub recurrence: Recurrence,
    pub custom_recurrence: Option<String>,
    pub priority: Priority,
    pub series_id: Option<Uuid>,
}

/// Sparse update applied to one event or a whole cascade group.
///
/// `None` leaves a column untouched; `Some(None)` on the nullable columns
/// clears them. `updated_at` is always written, so the changeset is never
/// empty.
#[derive(Debug, Clone, PartialEq, AsChangeset)]
#[diesel(table_name = crate::schema::events)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub recurrence: Option<Recurrence>,
    pub custom_recurrence: Option<Option<String>>,
    pub priority: Option<Priority>,
    pub updated_at: DateTime<Utc>,
}

impl EventPatch {
    pub fn new(updated_at: DateTime<Utc>) -> Self {
        Self {
            title: None,
            description: None,
            start: None,
            end: None,
            recurrence: None,
            custom_recurrence: None,
            priority: None,
            updated_at,
        }
    }

    /// Whether the patch changes anything besides `updated_at`.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.start.is_none()
            && self.end.is_none()
            && self.recurrence.is_none()
            && self.custom_recurrence.is_none()
            && self.priority.is_none()
    }

    /// Apply the patch to an in-memory event, mirroring the SQL update.
    pub fn apply_to(&self, event: &mut Event) {
        if let Some(t) = &self.title {
            event.title = t.clone();
        }
        if let Some(d) = &self.description {
            event.description = d.clone();
        }
        if let Some(s) = self.start {
            event.start = s;
        }
        if let Some(e) = self.end {
            event.end = e;
        }
        if let Some(r) = self.recurrence {
            event.recurrence = r;
        }
        if let Some(c) = &self.custom_recurrence {
            event.custom_recurrence = c.clone();
        }
        if let Some(p) = self.priority {
            event.priority = p;
        }
        event.updated_at = self.updated_at;
    }
}

/// Insertable struct for the sign-in upsert
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser {
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
}
