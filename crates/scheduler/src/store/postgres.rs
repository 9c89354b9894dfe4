use async_trait::async_trait;
use shared_types::{Event, User};
use uuid::Uuid;

use super::{like_pattern, EventStore, Selection, StartWindow};
use crate::calendar::TimeRange;
use crate::db::{events, users, DbPool};
use crate::error::ApiResult;
use crate::models::{EventPatch, NewEvent, NewUser};

/// `EventStore` over the pooled Postgres connection.
#[derive(Clone)]
pub struct PgEventStore {
    pool: DbPool,
}

impl PgEventStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn find_user_by_email(&self, email: &str) -> ApiResult<Option<User>> {
        let mut conn = self.pool.get().await?;
        Ok(users::get_by_email(&mut conn, email).await?)
    }

    async fn upsert_user(&self, user: NewUser) -> ApiResult<User> {
        let mut conn = self.pool.get().await?;
        Ok(users::upsert(&mut conn, &user).await?)
    }

    async fn insert_event(&self, event: NewEvent) -> ApiResult<Event> {
        let mut conn = self.pool.get().await?;
        Ok(events::create(&mut conn, &event).await?)
    }

    async fn get_event(&self, event_id: Uuid) -> ApiResult<Option<Event>> {
        let mut conn = self.pool.get().await?;
        Ok(events::get_by_id(&mut conn, event_id).await?)
    }

    async fn list_events(&self, user_id: Uuid, window: StartWindow) -> ApiResult<Vec<Event>> {
        let mut conn = self.pool.get().await?;
        Ok(events::list(&mut conn, user_id, window).await?)
    }

    async fn search_events(&self, user_id: Uuid, term: &str) -> ApiResult<Vec<Event>> {
        let mut conn = self.pool.get().await?;
        Ok(events::search(&mut conn, user_id, &like_pattern(term)).await?)
    }

    async fn find_events(&self, selection: &Selection) -> ApiResult<Vec<Event>> {
        let mut conn = self.pool.get().await?;
        Ok(events::find_selected(&mut conn, selection).await?)
    }

    async fn update_events(&self, selection: &Selection, patch: &EventPatch) -> ApiResult<u64> {
        let mut conn = self.pool.get().await?;
        let changed = events::update_selected(&mut conn, selection, patch).await?;
        Ok(changed as u64)
    }

    async fn delete_events(&self, selection: &Selection) -> ApiResult<u64> {
        let mut conn = self.pool.get().await?;
        let removed = events::delete_selected(&mut conn, selection).await?;
        Ok(removed as u64)
    }

    async fn move_event_if_free(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        range: TimeRange,
    ) -> ApiResult<bool> {
        let mut conn = self.pool.get().await?;
        events::move_if_free(&mut conn, event_id, user_id, range).await
    }
}
