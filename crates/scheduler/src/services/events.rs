//! Event scheduling service.
//!
//! Holds the business rules over `EventStore`: validation, date arithmetic,
//! recurrence cascades and collision-checked rescheduling. Handlers stay
//! thin and call straight into this type.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use shared_types::{CreateEventRequest, Event, Recurrence, UpdateEventRequest, UpsertUserRequest, User};
use uuid::Uuid;

use crate::calendar::{self, TimeRange};
use crate::config::CascadeScope;
use crate::error::{ApiError, ApiResult};
use crate::models::{EventPatch, NewEvent, NewUser};
use crate::store::{CascadeKey, EventStore, Selection, StartWindow};

/// Treat blank optional text as absent.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn require_pattern(recurrence: Recurrence, pattern: Option<&str>) -> ApiResult<()> {
    if recurrence == Recurrence::Custom && pattern.map_or(true, |p| p.trim().is_empty()) {
        return Err(ApiError::validation(
            "Custom recurrence pattern is required when recurrence is CUSTOM",
        ));
    }
    Ok(())
}

/// Service for event-related business logic
#[derive(Clone)]
pub struct EventService {
    store: Arc<dyn EventStore>,
    tz: Tz,
    cascade_scope: CascadeScope,
}

impl EventService {
    pub fn new(store: Arc<dyn EventStore>, tz: Tz, cascade_scope: CascadeScope) -> Self {
        Self {
            store,
            tz,
            cascade_scope,
        }
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// Record a signed-in user, refreshing name and image on repeat sign-ins.
    pub async fn upsert_user(&self, request: UpsertUserRequest) -> ApiResult<User> {
        let email = request.email.trim();
        if email.is_empty() {
            return Err(ApiError::validation("Email is required"));
        }

        let user = self
            .store
            .upsert_user(NewUser {
                email: email.to_string(),
                name: non_blank(request.name),
                image: non_blank(request.image),
            })
            .await?;

        tracing::info!(user_id = %user.id, "user signed in");
        Ok(user)
    }

    pub async fn find_user(&self, email: &str) -> ApiResult<User> {
        self.store
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("User with email {}", email)))
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub async fn get_event(&self, event_id: Uuid) -> ApiResult<Event> {
        self.store
            .get_event(event_id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Event {}", event_id)))
    }

    /// Events starting in the `YYYY-MM` month, ascending by start.
    pub async fn events_in_month(&self, month: &str, user_id: Uuid) -> ApiResult<Vec<Event>> {
        let first = calendar::parse_month(month)?;
        let (from, until) = calendar::month_window(first, self.tz)?;

        self.store
            .list_events(user_id, StartWindow::HalfOpen { from, until })
            .await
    }

    /// Events starting in `[day_start, day_end]`, ascending by start.
    pub async fn events_in_day(
        &self,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
        user_id: Uuid,
    ) -> ApiResult<Vec<Event>> {
        if day_end < day_start {
            return Err(ApiError::validation("Day end must not be before day start"));
        }

        self.store
            .list_events(
                user_id,
                StartWindow::Closed {
                    from: day_start,
                    until: day_end,
                },
            )
            .await
    }

    /// Events starting on the local calendar day `YYYY-MM-DD`.
    pub async fn events_on_date(&self, date: &str, user_id: Uuid) -> ApiResult<Vec<Event>> {
        let day = calendar::parse_date(date)?;
        let (day_start, day_end) = calendar::day_bounds(day, self.tz)?;
        self.events_in_day(day_start, day_end, user_id).await
    }

    /// Case-insensitive search over title and description.
    ///
    /// A blank query, a blank email or an unknown email yields an empty
    /// list rather than an error.
    pub async fn search_events(&self, query: &str, email: &str) -> ApiResult<Vec<Event>> {
        let (query, email) = (query.trim(), email.trim());
        if query.is_empty() || email.is_empty() {
            return Ok(Vec::new());
        }

        match self.store.find_user_by_email(email).await? {
            Some(user) => self.store.search_events(user.id, query).await,
            None => Ok(Vec::new()),
        }
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Create a single event row for the user owning `user_email`.
    pub async fn create_event(
        &self,
        details: CreateEventRequest,
        user_email: &str,
    ) -> ApiResult<Event> {
        let title = details.title.trim().to_string();
        if title.is_empty() {
            return Err(ApiError::validation("Event title is required"));
        }

        let custom_recurrence = non_blank(details.custom_recurrence);
        require_pattern(details.recurrence, custom_recurrence.as_deref())?;

        let date = calendar::parse_date(&details.date)?;
        let start_time = calendar::parse_time_of_day(&details.start_time)?;
        let end_time = calendar::parse_time_of_day(&details.end_time)?;
        if end_time <= start_time {
            return Err(ApiError::validation("End time must be after start time"));
        }

        let start = calendar::local_instant(date, start_time, self.tz)?;
        let end = calendar::local_instant(date, end_time, self.tz)?;
        if end <= start {
            return Err(ApiError::validation("End time must be after start time"));
        }

        let user = self.find_user(user_email).await?;

        let event = self
            .store
            .insert_event(NewEvent {
                user_id: user.id,
                title,
                description: non_blank(details.description),
                start,
                end,
                recurrence: details.recurrence,
                custom_recurrence,
                priority: details.priority,
                series_id: details.recurrence.is_recurring().then(Uuid::new_v4),
            })
            .await?;

        tracing::info!(
            event_id = %event.id,
            user_id = %user.id,
            recurrence = event.recurrence.as_str(),
            "event created"
        );
        Ok(event)
    }

    /// Apply a partial update to an event and, if it recurs, to every
    /// event in its cascade group.
    ///
    /// Siblings receive the identical patch, including absolute start and
    /// end instants when date and time fields are present. The edit is
    /// rejected before any write if it would leave any event in the group
    /// ending at or before its start.
    pub async fn edit_event(&self, event_id: Uuid, update: UpdateEventRequest) -> ApiResult<u64> {
        let existing = self.get_event(event_id).await?;
        let patch = self.build_patch(update)?;

        let mut preview = existing.clone();
        patch.apply_to(&mut preview);
        require_pattern(preview.recurrence, preview.custom_recurrence.as_deref())?;
        if preview.end <= preview.start {
            return Err(ApiError::validation("End time must be after start time"));
        }

        if patch.is_empty() {
            tracing::debug!(%event_id, "edit with no changes");
            return Ok(0);
        }

        let selection = self.cascade_selection(&existing);
        if let Selection::Cascade(_) = selection {
            // Siblings keep whichever bound the patch leaves alone
            for sibling in self.store.find_events(&selection).await? {
                let sibling_id = sibling.id;
                let mut preview = sibling;
                patch.apply_to(&mut preview);
                if preview.end <= preview.start {
                    return Err(ApiError::validation(format!(
                        "Edit would make recurring event {} end before it starts",
                        sibling_id
                    )));
                }
            }
        }

        let changed = self.store.update_events(&selection, &patch).await?;

        tracing::info!(
            %event_id,
            changed,
            cascaded = matches!(selection, Selection::Cascade(_)),
            "event edited"
        );
        Ok(changed)
    }

    /// Delete an event, or its whole cascade group if it recurs.
    pub async fn delete_event(&self, event_id: Uuid) -> ApiResult<u64> {
        let existing = self.get_event(event_id).await?;
        let selection = self.cascade_selection(&existing);
        let removed = self.store.delete_events(&selection).await?;

        tracing::info!(%event_id, removed, "event deleted");
        Ok(removed)
    }

    /// Move an event to `new_date`, keeping its local times of day.
    ///
    /// Returns `false` without changing anything when the new slot overlaps
    /// another event of the same user.
    pub async fn change_event_date(&self, event_id: Uuid, new_date: &str) -> ApiResult<bool> {
        let existing = self.get_event(event_id).await?;
        let date = calendar::parse_date(new_date)?;
        let range = TimeRange::new(existing.start, existing.end).moved_to(date, self.tz)?;

        let moved = self
            .store
            .move_event_if_free(event_id, existing.user_id, range)
            .await?;

        if moved {
            tracing::info!(%event_id, %date, "event moved");
        } else {
            tracing::info!(%event_id, %date, "event not moved: slot is taken");
        }
        Ok(moved)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn build_patch(&self, update: UpdateEventRequest) -> ApiResult<EventPatch> {
        let mut patch = EventPatch::new(Utc::now());

        if let Some(title) = update.title {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(ApiError::validation("Event title must not be empty"));
            }
            patch.title = Some(title);
        }

        patch.description = update.description.map(non_blank);

        // A bound only moves when both the date and its time are present
        if let Some(date) = update.date.as_deref() {
            let date = calendar::parse_date(date)?;
            if let Some(time) = update.start_time.as_deref() {
                let time = calendar::parse_time_of_day(time)?;
                patch.start = Some(calendar::local_instant(date, time, self.tz)?);
            }
            if let Some(time) = update.end_time.as_deref() {
                let time = calendar::parse_time_of_day(time)?;
                patch.end = Some(calendar::local_instant(date, time, self.tz)?);
            }
        }

        patch.recurrence = update.recurrence;
        patch.custom_recurrence = update.custom_recurrence.map(non_blank);
        patch.priority = update.priority;

        Ok(patch)
    }

    /// Rows an edit or delete of `event` reaches, keyed on its current
    /// (pre-update) values.
    fn cascade_selection(&self, event: &Event) -> Selection {
        if !event.recurrence.is_recurring() {
            return Selection::Single(event.id);
        }

        match self.cascade_scope {
            CascadeScope::Pattern => Selection::Cascade(CascadeKey::Pattern {
                user_id: event.user_id,
                recurrence: event.recurrence,
                custom_recurrence: event.custom_recurrence.clone(),
            }),
            CascadeScope::Series => match event.series_id {
                Some(series_id) => Selection::Cascade(CascadeKey::Series {
                    user_id: event.user_id,
                    series_id,
                }),
                None => Selection::Single(event.id),
            },
        }
    }
}
