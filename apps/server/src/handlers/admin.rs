//! Admin endpoints: login, booking management, catalog management. Every
//! handler except login requires a valid admin token.

use axum::{
    extract::{Path, Query, State},
    http::header,
    Json,
};
use std::sync::Arc;

use crate::auth;
use crate::error::ApiError;
use crate::models::*;
use crate::AppState;

const WEEKDAY_TOKENS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

fn require_admin(headers: &axum::http::HeaderMap, state: &AppState) -> Result<(), ApiError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    auth::require_admin(auth_header, &state.secret_key)?;
    Ok(())
}

/// POST /api/admin/login — password → signed session token.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AdminLoginRequest>,
) -> Result<Json<ApiResponse<AdminLoginResponse>>, ApiError> {
    if state.admin_password.is_empty() || body.password != state.admin_password {
        return Err(ApiError::Auth("wrong password".into()));
    }
    let (token, expires_at) = auth::issue_token(&state.secret_key, chrono::Utc::now().timestamp());
    Ok(Json(ApiResponse::success(AdminLoginResponse {
        token,
        expires_at,
    })))
}

/// GET /api/admin/bookings[?date=YYYY-MM-DD | ?from&to] — ordered listing.
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<ApiResponse<Vec<BookingDetail>>>, ApiError> {
    require_admin(&headers, &state)?;

    for raw in [&query.date, &query.from, &query.to].into_iter().flatten() {
        super::client::parse_date(raw)?;
    }

    let bookings = state.store.list_bookings(&query).await?;
    Ok(Json(ApiResponse::success(bookings)))
}

/// DELETE /api/admin/bookings/:id
pub async fn delete_booking(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<&'static str>>, ApiError> {
    require_admin(&headers, &state)?;
    state.store.delete_booking(id).await?;
    tracing::info!("admin deleted booking {}", id);
    Ok(Json(ApiResponse::success("booking deleted")))
}

/// POST /api/admin/services
pub async fn create_service(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Json(body): Json<CreateServiceRequest>,
) -> Result<Json<ApiResponse<Service>>, ApiError> {
    require_admin(&headers, &state)?;

    if body.name.trim().is_empty() {
        return Err(ApiError::validation("service name is required"));
    }
    if body.duration_min <= 0 {
        return Err(ApiError::validation("duration must be positive"));
    }
    let price = body.price.unwrap_or(0);
    if price < 0 {
        return Err(ApiError::validation("price must not be negative"));
    }

    let service = state
        .store
        .create_service(body.name.trim(), body.duration_min, price)
        .await?;
    Ok(Json(ApiResponse::success(service)))
}

/// DELETE /api/admin/services/:id — refused while bookings reference it.
pub async fn delete_service(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<&'static str>>, ApiError> {
    require_admin(&headers, &state)?;
    state.store.delete_service(id).await?;
    Ok(Json(ApiResponse::success("service deleted")))
}

/// POST /api/admin/stylists
pub async fn create_stylist(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Json(body): Json<CreateStylistRequest>,
) -> Result<Json<ApiResponse<Stylist>>, ApiError> {
    require_admin(&headers, &state)?;

    if body.name.trim().is_empty() {
        return Err(ApiError::validation("stylist name is required"));
    }
    if !(0..=24).contains(&body.start_hour)
        || !(0..=24).contains(&body.end_hour)
        || body.start_hour >= body.end_hour
    {
        return Err(ApiError::validation(
            "working hours must satisfy 0 <= start < end <= 24",
        ));
    }
    let work_days = body.work_days.as_deref().unwrap_or("Mon,Tue,Wed,Thu,Fri");
    validate_work_days(work_days)?;

    let stylist = state
        .store
        .create_stylist(body.name.trim(), work_days, body.start_hour, body.end_hour)
        .await?;
    Ok(Json(ApiResponse::success(stylist)))
}

/// DELETE /api/admin/stylists/:id — refused while bookings reference them.
pub async fn delete_stylist(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<&'static str>>, ApiError> {
    require_admin(&headers, &state)?;
    state.store.delete_stylist(id).await?;
    Ok(Json(ApiResponse::success("stylist deleted")))
}

fn validate_work_days(work_days: &str) -> Result<(), ApiError> {
    for token in work_days.split(',') {
        let token = token.trim();
        if !WEEKDAY_TOKENS
            .iter()
            .any(|day| day.eq_ignore_ascii_case(token))
        {
            return Err(ApiError::validation(format!(
                "unknown weekday '{token}' in work_days"
            )));
        }
    }
    Ok(())
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_days_valid() {
        assert!(validate_work_days("Mon,Tue,Wed,Thu,Fri").is_ok());
        assert!(validate_work_days("Sat").is_ok());
        assert!(validate_work_days("mon, sun").is_ok());
    }

    #[test]
    fn test_work_days_invalid() {
        assert!(validate_work_days("Mon,Funday").is_err());
        assert!(validate_work_days("").is_err());
        assert!(validate_work_days("Monday").is_err());
    }
}
