use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use shared_types::{Event, User};
use uuid::Uuid;

use super::{EventStore, Selection, StartWindow};
use crate::calendar::TimeRange;
use crate::error::{ApiError, ApiResult};
use crate::models::{EventPatch, NewEvent, NewUser};

/// In-memory store with the same semantics as the Postgres queries.
#[derive(Default)]
pub struct MemoryEventStore {
    users: Mutex<Vec<User>>,
    events: Mutex<Vec<Event>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored event, in insertion order.
    pub fn all_events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn selected(selection: &Selection, event: &Event) -> bool {
        match selection {
            Selection::Single(id) => event.id == *id,
            Selection::Cascade(key) => key.matches(event),
        }
    }

    fn sorted(mut events: Vec<Event>) -> Vec<Event> {
        events.sort_by_key(|e| e.start);
        events
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn find_user_by_email(&self, email: &str) -> ApiResult<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn upsert_user(&self, user: NewUser) -> ApiResult<User> {
        let mut users = self.users.lock().unwrap();
        let now = Utc::now();

        if let Some(existing) = users.iter_mut().find(|u| u.email == user.email) {
            existing.name = user.name;
            existing.image = user.image;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            image: user.image,
            created_at: now,
            updated_at: now,
        };
        users.push(created.clone());
        Ok(created)
    }

    async fn insert_event(&self, event: NewEvent) -> ApiResult<Event> {
        let now = Utc::now();
        let created = Event {
            id: Uuid::new_v4(),
            user_id: event.user_id,
            title: event.title,
            description: event.description,
            start: event.start,
            end: event.end,
            recurrence: event.recurrence,
            custom_recurrence: event.custom_recurrence,
            priority: event.priority,
            series_id: event.series_id,
            created_at: now,
            updated_at: now,
        };
        self.events.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn get_event(&self, event_id: Uuid) -> ApiResult<Option<Event>> {
        let events = self.events.lock().unwrap();
        Ok(events.iter().find(|e| e.id == event_id).cloned())
    }

    async fn list_events(&self, user_id: Uuid, window: StartWindow) -> ApiResult<Vec<Event>> {
        let events = self.events.lock().unwrap();
        let found = events
            .iter()
            .filter(|e| e.user_id == user_id && window.contains(e.start))
            .cloned()
            .collect();
        Ok(Self::sorted(found))
    }

    async fn search_events(&self, user_id: Uuid, term: &str) -> ApiResult<Vec<Event>> {
        let needle = term.to_lowercase();
        let events = self.events.lock().unwrap();
        let found = events
            .iter()
            .filter(|e| e.user_id == user_id)
            .filter(|e| {
                e.title.to_lowercase().contains(&needle)
                    || e
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        Ok(Self::sorted(found))
    }

    async fn find_events(&self, selection: &Selection) -> ApiResult<Vec<Event>> {
        let events = self.events.lock().unwrap();
        let found = events
            .iter()
            .filter(|e| Self::selected(selection, e))
            .cloned()
            .collect();
        Ok(Self::sorted(found))
    }

    async fn update_events(&self, selection: &Selection, patch: &EventPatch) -> ApiResult<u64> {
        let mut events = self.events.lock().unwrap();

        // Same all-or-nothing outcome as the end > start CHECK in Postgres
        let inverted = events
            .iter()
            .filter(|e| Self::selected(selection, e))
            .any(|e| {
                let mut preview = e.clone();
                patch.apply_to(&mut preview);
                preview.end <= preview.start
            });
        if inverted {
            return Err(ApiError::validation("Event must end after it starts"));
        }

        let mut changed = 0;
        for event in events.iter_mut().filter(|e| Self::selected(selection, e)) {
            patch.apply_to(event);
            changed += 1;
        }
        Ok(changed)
    }

    async fn delete_events(&self, selection: &Selection) -> ApiResult<u64> {
        let mut events = self.events.lock().unwrap();
        let before = events.len();
        events.retain(|e| !Self::selected(selection, e));
        Ok((before - events.len()) as u64)
    }

    async fn move_event_if_free(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        range: TimeRange,
    ) -> ApiResult<bool> {
        let mut events = self.events.lock().unwrap();

        let collides = events
            .iter()
            .filter(|e| e.user_id == user_id && e.id != event_id)
            .any(|e| range.collides_with(&TimeRange::new(e.start, e.end)));
        if collides {
            return Ok(false);
        }

        let now = Utc::now();
        for event in events.iter_mut().filter(|e| e.id == event_id) {
            event.start = range.start;
            event.end = range.end;
            event.updated_at = now;
        }
        Ok(true)
    }
}
