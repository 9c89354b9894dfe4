use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use shared_types::{
    ChangeEventDateRequest, ChangeEventDateResponse, CreateEventRequest, Event,
    UpdateEventRequest, UpsertUserRequest, User,
};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::identity::Caller;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub month: String,
}

/// Either a local calendar `date`, or an explicit `start`/`end` pair.
#[derive(Debug, Deserialize)]
pub struct DayQuery {
    pub date: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Load an event and check that the caller owns it.
async fn owned_event(state: &AppState, event_id: Uuid, caller: &Caller) -> ApiResult<Event> {
    let event = state.events.get_event(event_id).await?;

    let owner = match state.events.find_user(&caller.email).await {
        Ok(user) => Some(user),
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e),
    };

    match owner {
        Some(user) if user.id == event.user_id => Ok(event),
        _ => {
            tracing::warn!(%event_id, caller = %caller.email, "caller does not own event");
            Err(ApiError::Forbidden(format!(
                "Event {} belongs to another user",
                event_id
            )))
        }
    }
}

// User handlers

pub async fn upsert_user(
    State(state): State<AppState>,
    Json(payload): Json<UpsertUserRequest>,
) -> ApiResult<Json<User>> {
    let user = state.events.upsert_user(payload).await?;
    Ok(Json(user))
}

// Event query handlers

pub async fn list_month_events(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<MonthQuery>,
) -> ApiResult<Json<Vec<Event>>> {
    let user = state.events.find_user(&caller.email).await?;
    let events = state.events.events_in_month(&query.month, user.id).await?;
    Ok(Json(events))
}

pub async fn list_day_events(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<DayQuery>,
) -> ApiResult<Json<Vec<Event>>> {
    let user = state.events.find_user(&caller.email).await?;

    let events = match query {
        DayQuery {
            date: Some(date), ..
        } => state.events.events_on_date(&date, user.id).await?,
        DayQuery {
            start: Some(start),
            end: Some(end),
            ..
        } => state.events.events_in_day(start, end, user.id).await?,
        _ => {
            return Err(ApiError::validation(
                "Either date or both start and end are required",
            ))
        }
    };

    Ok(Json(events))
}

/// Search never fails for a missing or unknown caller; it just finds nothing.
pub async fn search_events(
    State(state): State<AppState>,
    caller: Option<Caller>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<Event>>> {
    let email = caller.map(|c| c.email).unwrap_or_default();
    let events = state.events.search_events(&query.q, &email).await?;
    Ok(Json(events))
}

pub async fn get_event(
    State(state): State<AppState>,
    caller: Caller,
    Path(event_id): Path<Uuid>,
) -> ApiResult<Json<Event>> {
    let event = owned_event(&state, event_id, &caller).await?;
    Ok(Json(event))
}

// Event mutation handlers

pub async fn create_event(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<CreateEventRequest>,
) -> ApiResult<impl IntoResponse> {
    let event = state.events.create_event(payload, &caller.email).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn update_event(
    State(state): State<AppState>,
    caller: Caller,
    Path(event_id): Path<Uuid>,
    Json(payload): Json<UpdateEventRequest>,
) -> ApiResult<Json<Event>> {
    owned_event(&state, event_id, &caller).await?;
    state.events.edit_event(event_id, payload).await?;

    let event = state.events.get_event(event_id).await?;
    Ok(Json(event))
}

pub async fn delete_event(
    State(state): State<AppState>,
    caller: Caller,
    Path(event_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    owned_event(&state, event_id, &caller).await?;
    state.events.delete_event(event_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn change_event_date(
    State(state): State<AppState>,
    caller: Caller,
    Path(event_id): Path<Uuid>,
    Json(payload): Json<ChangeEventDateRequest>,
) -> ApiResult<Json<ChangeEventDateResponse>> {
    owned_event(&state, event_id, &caller).await?;
    let moved = state
        .events
        .change_event_date(event_id, &payload.date)
        .await?;
    Ok(Json(ChangeEventDateResponse { moved }))
}
