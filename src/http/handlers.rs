use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use ulid::Ulid;

use crate::booking::{Caller, CreateBooking};
use crate::engine::{BookingError, BookingPatch};
use crate::model::{BookingStatus, BookingType, Role};
use crate::timeutil::parse_start;

use super::response::{success, ApiError};
use super::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateBookingBody {
    pub court_id: Ulid,
    pub start_datetime: String,
    #[serde(default)]
    pub booking_type: BookingType,
    pub repeat_count: Option<u32>,
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateBookingBody {
    pub status: Option<BookingStatus>,
    pub note: Option<String>,
    pub start_datetime: Option<String>,
}

fn booking_id(raw: &str) -> Result<Ulid, ApiError> {
    Ulid::from_string(raw).map_err(|_| ApiError::validation(format!("invalid booking id: {raw}")))
}

fn start_from(state: &AppState, raw: &str) -> Result<chrono::DateTime<chrono::Utc>, ApiError> {
    parse_start(raw, state.service.venue())
        .ok_or_else(|| ApiError::validation(format!("invalid start_datetime: {raw}")))
}

pub async fn health(State(state): State<AppState>) -> Response {
    success(
        StatusCode::OK,
        "ok",
        json!({ "courts": state.service.engine().court_count() }),
    )
}

pub async fn create_booking(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<CreateBookingBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = payload?;
    let req = CreateBooking {
        court_id: body.court_id,
        start_datetime: start_from(&state, &body.start_datetime)?,
        booking_type: body.booking_type,
        repeat_count: body.repeat_count,
        note: body.note,
    };
    let view = state.service.create_booking(&caller, req).await?;
    Ok(success(StatusCode::CREATED, "Booking created successfully", view))
}

pub async fn list_mine(State(state): State<AppState>, caller: Caller) -> Response {
    let views = state.service.list_mine(&caller).await;
    success(StatusCode::OK, "Bookings retrieved", views)
}

pub async fn list_court_bookings(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Response, ApiError> {
    let views = state.service.list_for_owner(&caller).await?;
    Ok(success(StatusCode::OK, "Court bookings retrieved", views))
}

pub async fn list_all(State(state): State<AppState>, caller: Caller) -> Result<Response, ApiError> {
    let views = state.service.list_all(&caller).await?;
    Ok(success(StatusCode::OK, "All bookings retrieved", views))
}

pub async fn get_booking(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let view = state.service.get_booking(&caller, booking_id(&id)?).await?;
    Ok(success(StatusCode::OK, "Booking retrieved", view))
}

pub async fn update_booking(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    payload: Result<Json<UpdateBookingBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let id = booking_id(&id)?;
    let Json(body) = payload?;
    let patch = BookingPatch {
        status: body.status,
        note: body.note,
        start_datetime: body
            .start_datetime
            .as_deref()
            .map(|raw| start_from(&state, raw))
            .transpose()?,
    };
    let view = state.service.update_booking(&caller, id, patch).await?;
    Ok(success(StatusCode::OK, "Booking updated successfully", view))
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    state.service.cancel_booking(&caller, booking_id(&id)?).await?;
    Ok(success(StatusCode::OK, "Booking cancelled successfully", ()))
}

/// Court owners only.
pub async fn confirm_booking(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    if caller.role != Role::Manager {
        return Err(BookingError::PermissionDenied.into());
    }
    let view = state.service.confirm_booking(&caller, booking_id(&id)?).await?;
    Ok(success(StatusCode::OK, "Booking confirmed successfully", view))
}
