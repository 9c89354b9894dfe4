use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{
    pooled_connection::{deadpool::Pool, AsyncDieselConnectionManager, ManagerConfig},
    AsyncPgConnection, RunQueryDsl,
};
use shared_types::{Event, User};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::{EventPatch, NewEvent, NewUser};
use crate::store::CascadeKey;

pub type DbPool = Pool<AsyncPgConnection>;

async fn establish_tls_connection(config: String) -> diesel::ConnectionResult<AsyncPgConnection> {
    // Set up rustls TLS configuration
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);

    let (client, connection) = tokio_postgres::connect(&config, tls)
        .await
        .map_err(|e| diesel::ConnectionError::BadConnection(e.to_string()))?;

    // The connection future drives the socket; it ends when the client drops
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("Connection error: {}", e);
        }
    });

    AsyncPgConnection::try_from(client).await
}

pub fn establish_connection_pool(config: &AppConfig) -> anyhow::Result<DbPool> {
    let manager = if config.database_tls {
        let mut manager_config = ManagerConfig::default();
        manager_config.custom_setup =
            Box::new(|url| Box::pin(establish_tls_connection(url.to_string())));
        AsyncDieselConnectionManager::<AsyncPgConnection>::new_with_config(
            config.database_url.clone(),
            manager_config,
        )
    } else {
        AsyncDieselConnectionManager::<AsyncPgConnection>::new(config.database_url.clone())
    };

    let pool = Pool::builder(manager)
        .max_size(config.database_pool_size)
        .build()?;

    Ok(pool)
}

// User database operations
pub mod users {
    use super::*;

    pub async fn get_by_email(
        conn: &mut AsyncPgConnection,
        email_val: &str,
    ) -> QueryResult<Option<User>> {
        use crate::schema::users::dsl::*;

        users
            .filter(email.eq(email_val))
            .first::<User>(conn)
            .await
            .optional()
    }

    pub async fn upsert(conn: &mut AsyncPgConnection, new_user: &NewUser) -> QueryResult<User> {
        use crate::schema::users::dsl::*;

        diesel::insert_into(users)
            .values(new_user)
            .on_conflict(email)
            .do_update()
            .set((
                name.eq(&new_user.name),
                image.eq(&new_user.image),
                updated_at.eq(Utc::now()),
            ))
            .get_result::<User>(conn)
            .await
    }
}

// Event database operations
pub mod events {
    use super::*;
    use diesel::{expression::BoxableExpression, pg::Pg, sql_types::Bool};
    use diesel_async::scoped_futures::ScopedFutureExt;

    use crate::calendar::TimeRange;
    use crate::error::ApiError;
    use crate::store::{Selection, StartWindow};

    /// WHERE clause over the events table, built once and shared by the
    /// select, update and delete statements.
    pub type EventFilter = Box<dyn BoxableExpression<crate::schema::events::table, Pg, SqlType = Bool>>;

    /// Events of `owner` whose start lies inside `window`.
    pub fn window_filter(owner: Uuid, window: StartWindow) -> EventFilter {
        use crate::schema::events::dsl::*;

        match window {
            StartWindow::HalfOpen { from, until } => Box::new(
                user_id
                    .eq(owner)
                    .and(start.ge(from))
                    .and(start.lt(until)),
            ),
            StartWindow::Closed { from, until } => Box::new(
                user_id
                    .eq(owner)
                    .and(start.ge(from))
                    .and(start.le(until)),
            ),
        }
    }

    /// Rows reached by an edit or delete.
    pub fn selection_filter(selection: &Selection) -> EventFilter {
        use crate::schema::events::dsl::*;

        match selection {
            Selection::Single(event_id) => Box::new(id.eq(*event_id)),
            Selection::Cascade(CascadeKey::Pattern {
                user_id: owner,
                recurrence: pattern_recurrence,
                custom_recurrence: pattern_custom,
            }) => Box::new(
                user_id
                    .eq(*owner)
                    .and(recurrence.eq(*pattern_recurrence))
                    .and(custom_recurrence.is_not_distinct_from(pattern_custom.clone())),
            ),
            Selection::Cascade(CascadeKey::Series {
                user_id: owner,
                series_id: series,
            }) => Box::new(user_id.eq(*owner).and(series_id.assume_not_null().eq(*series))),
        }
    }

    /// Other events of `owner` that `range` would double-book.
    ///
    /// Mirrors `TimeRange::collides_with`: starts inside, ends inside, or
    /// contains.
    pub fn collision_filter(event_id: Uuid, owner: Uuid, range: TimeRange) -> EventFilter {
        use crate::schema::events::dsl::*;

        Box::new(
            user_id.eq(owner).and(id.ne(event_id)).and(
                start
                    .le(range.start)
                    .and(end.gt(range.start))
                    .or(start.lt(range.end).and(end.ge(range.end)))
                    .or(start.ge(range.start).and(end.le(range.end))),
            ),
        )
    }

    pub async fn create(conn: &mut AsyncPgConnection, new_event: &NewEvent) -> QueryResult<Event> {
        use crate::schema::events::dsl::*;

        diesel::insert_into(events)
            .values(new_event)
            .get_result::<Event>(conn)
            .await
    }

    pub async fn get_by_id(
        conn: &mut AsyncPgConnection,
        event_id: Uuid,
    ) -> QueryResult<Option<Event>> {
        use crate::schema::events::dsl::*;

        events
            .filter(id.eq(event_id))
            .first::<Event>(conn)
            .await
            .optional()
    }

    pub async fn list(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
        window: StartWindow,
    ) -> QueryResult<Vec<Event>> {
        use crate::schema::events::dsl::*;

        events
            .filter(window_filter(owner, window))
            .order_by(start.asc())
            .load::<Event>(conn)
            .await
    }

    pub async fn search(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
        pattern: &str,
    ) -> QueryResult<Vec<Event>> {
        use crate::schema::events::dsl::*;

        events
            .filter(user_id.eq(owner))
            .filter(title.ilike(pattern).or(description.ilike(pattern)))
            .order_by(start.asc())
            .load::<Event>(conn)
            .await
    }

    pub async fn find_selected(
        conn: &mut AsyncPgConnection,
        selection: &Selection,
    ) -> QueryResult<Vec<Event>> {
        use crate::schema::events::dsl::*;

        events
            .filter(selection_filter(selection))
            .order_by(start.asc())
            .load::<Event>(conn)
            .await
    }

    pub async fn update_selected(
        conn: &mut AsyncPgConnection,
        selection: &Selection,
        patch: &EventPatch,
    ) -> QueryResult<usize> {
        use crate::schema::events::dsl::*;

        diesel::update(events.filter(selection_filter(selection)))
            .set(patch)
            .execute(conn)
            .await
    }

    pub async fn delete_selected(
        conn: &mut AsyncPgConnection,
        selection: &Selection,
    ) -> QueryResult<usize> {
        use crate::schema::events::dsl::*;

        diesel::delete(events.filter(selection_filter(selection)))
            .execute(conn)
            .await
    }

    /// Move an event to `range` unless another event of `owner` overlaps it.
    ///
    /// Runs as one SERIALIZABLE transaction so two concurrent moves cannot
    /// both pass the check; the loser gets a serialization failure.
    pub async fn move_if_free(
        conn: &mut AsyncPgConnection,
        event_id: Uuid,
        owner: Uuid,
        range: TimeRange,
    ) -> Result<bool, ApiError> {
        use crate::schema::events::dsl::*;

        conn.build_transaction()
            .serializable()
            .run(move |conn| {
                async move {
                    let collisions: i64 = events
                        .filter(collision_filter(event_id, owner, range))
                        .count()
                        .get_result(conn)
                        .await?;

                    if collisions > 0 {
                        tracing::debug!(%event_id, collisions, "date change rejected by collision");
                        return Ok(false);
                    }

                    diesel::update(events.filter(id.eq(event_id)))
                        .set((
                            start.eq(range.start),
                            end.eq(range.end),
                            updated_at.eq(Utc::now()),
                        ))
                        .execute(conn)
                        .await?;

                    Ok(true)
                }
                .scope_boxed()
            })
            .await
    }

}
