//! Public endpoints: catalog listings, availability queries, and booking
//! creation.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::sync::Arc;

use crate::error::ApiError;
use crate::models::*;
use crate::schedule::{self, Interval, Slot, DEFAULT_DURATION_MIN};
use crate::{db::NewBooking, notify, AppState};

/// GET /api/services — ordered service catalog.
pub async fn list_services(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<Service>>>, ApiError> {
    let services = state.store.list_services().await?;
    Ok(Json(ApiResponse::success(services)))
}

/// GET /api/stylists — ordered stylist list.
pub async fn list_stylists(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<Stylist>>>, ApiError> {
    let stylists = state.store.list_stylists().await?;
    Ok(Json(ApiResponse::success(stylists)))
}

/// GET /api/availability?stylist_id&date[&service_id] — step-aligned slots
/// for one stylist and date, tagged free/busy for the service's duration.
pub async fn availability(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<ApiResponse<Vec<Slot>>>, ApiError> {
    let date = parse_date(&query.date)?;

    let stylist = state
        .store
        .find_stylist(query.stylist_id)
        .await?
        .ok_or_else(|| ApiError::not_found("stylist not found"))?;

    let duration_min = match query.service_id {
        Some(service_id) => {
            state
                .store
                .find_service(service_id)
                .await?
                .ok_or_else(|| ApiError::validation("unknown service"))?
                .duration_min
        }
        None => DEFAULT_DURATION_MIN,
    };

    if !schedule::works_on(&stylist.work_days, date) {
        return Ok(Json(ApiResponse::success(Vec::new())));
    }

    let existing = day_bookings(&state, &stylist, date).await?;
    let slots = schedule::compute_slots(
        date,
        stylist.start_hour as u32,
        stylist.end_hour as u32,
        duration_min,
        &existing,
    );
    Ok(Json(ApiResponse::success(slots)))
}

/// POST /api/bookings — validate, gate on conflicts, persist, notify.
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateBookingRequest>,
) -> Result<Json<ApiResponse<BookingDetail>>, ApiError> {
    if body.client_name.trim().is_empty() {
        return Err(ApiError::validation("client name is required"));
    }
    if body.client_contact.trim().is_empty() {
        return Err(ApiError::validation("client contact is required"));
    }
    let start = parse_datetime(&body.start)?;

    let stylist = state
        .store
        .find_stylist(body.stylist_id)
        .await?
        .ok_or_else(|| ApiError::validation("unknown stylist"))?;
    let service = state
        .store
        .find_service(body.service_id)
        .await?
        .ok_or_else(|| ApiError::validation("unknown service"))?;

    let end = start + Duration::minutes(service.duration_min);

    if !schedule::works_on(&stylist.work_days, start.date()) {
        return Err(ApiError::validation("stylist does not work on that day"));
    }
    if !within_working_window(&stylist, start, end) {
        return Err(ApiError::validation(
            "the requested time falls outside the stylist's working hours",
        ));
    }

    // The store re-checks overlap under the stylist's lock; this is the
    // authoritative gate.
    let booking = state
        .store
        .insert_booking_if_free(NewBooking {
            stylist_id: stylist.id,
            service_id: service.id,
            client_name: body.client_name.trim().to_string(),
            client_contact: body.client_contact.trim().to_string(),
            start_at: start,
            end_at: end,
            duration_min: service.duration_min,
        })
        .await?;

    let detail = BookingDetail {
        id: booking.id,
        stylist_id: stylist.id,
        stylist_name: stylist.name,
        service_id: service.id,
        service_name: service.name,
        price: service.price,
        client_name: booking.client_name.clone(),
        client_contact: booking.client_contact.clone(),
        start_at: booking.start_at,
        end_at: booking.end_at,
        status: booking.status.clone(),
        created_at: booking.created_at.clone(),
    };

    send_confirmations(&state, &detail);

    Ok(Json(ApiResponse::success(detail)))
}

/// Fire-and-forget: the booking is already committed, so mail failures only
/// get logged.
fn send_confirmations(state: &Arc<AppState>, detail: &BookingDetail) {
    if !state.mailer.enabled() {
        return;
    }

    if notify::looks_like_email(&detail.client_contact) {
        let (subject, text) = notify::client_confirmation(detail);
        let mailer = state.mailer.clone();
        let to = detail.client_contact.clone();
        tokio::spawn(async move {
            mailer.send(&to, &subject, &text).await;
        });
    }

    if !state.admin_email.is_empty() {
        let (subject, text) = notify::admin_notification(detail);
        let mailer = state.mailer.clone();
        let to = state.admin_email.clone();
        tokio::spawn(async move {
            mailer.send(&to, &subject, &text).await;
        });
    }
}

// ── Shared helpers (pub(crate) for admin.rs) ──

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::validation("date must be YYYY-MM-DD"))
}

fn parse_datetime(raw: &str) -> Result<NaiveDateTime, ApiError> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .map_err(|_| ApiError::validation("start must be an ISO datetime like 2026-03-02T10:00:00"))
}

/// Whole requested interval must fit inside `[start_hour, end_hour)` on the
/// booking's own date.
fn within_working_window(stylist: &Stylist, start: NaiveDateTime, end: NaiveDateTime) -> bool {
    let date = start.date();
    let open = date.and_hms_opt(stylist.start_hour as u32, 0, 0);
    let close = if stylist.end_hour == 24 {
        (date + Duration::days(1)).and_hms_opt(0, 0, 0)
    } else {
        date.and_hms_opt(stylist.end_hour as u32, 0, 0)
    };
    match (open, close) {
        (Some(open), Some(close)) => open <= start && end <= close,
        _ => false,
    }
}

async fn day_bookings(
    state: &Arc<AppState>,
    stylist: &Stylist,
    date: NaiveDate,
) -> Result<Vec<Interval>, ApiError> {
    let day_start = date.and_hms_opt(0, 0, 0).ok_or(ApiError::Internal)?;
    let day_end = day_start + Duration::days(1);
    let bookings = state
        .store
        .bookings_for_stylist_between(stylist.id, day_start, day_end)
        .await?;
    Ok(bookings
        .iter()
        .map(|b| Interval {
            start: b.start_at,
            end: b.end_at,
        })
        .collect())
}

// ── Tests ──
