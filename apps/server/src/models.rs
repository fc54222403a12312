use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ── Database models ──

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Stylist {
    pub id: i64,
    pub name: String,
    /// Comma-separated weekday tokens, e.g. "Mon,Tue,Wed,Thu,Fri".
    pub work_days: String,
    pub start_hour: i64,
    pub end_hour: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub duration_min: i64,
    pub price: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Booking {
    pub id: i64,
    pub stylist_id: i64,
    pub service_id: i64,
    pub client_name: String,
    pub client_contact: String,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    /// Copied from the service at creation time so later catalog edits
    /// cannot change an existing booking's interval.
    pub duration_min: i64,
    pub status: String,
    pub created_at: String,
}

/// Booking joined with its stylist and service names, for listings.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct BookingDetail {
    pub id: i64,
    pub stylist_id: i64,
    pub stylist_name: String,
    pub service_id: i64,
    pub service_name: String,
    pub price: i64,
    pub client_name: String,
    pub client_contact: String,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub status: String,
    pub created_at: String,
}

// ── API request/response types ──

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub stylist_id: i64,
    /// YYYY-MM-DD.
    pub date: String,
    pub service_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub client_name: String,
    pub client_contact: String,
    pub stylist_id: i64,
    pub service_id: i64,
    /// ISO-8601 local datetime, no offset: "2026-03-02T10:00:00".
    pub start: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminLoginRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AdminLoginResponse {
    pub token: String,
    pub expires_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct BookingsQuery {
    pub date: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    pub duration_min: i64,
    pub price: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateStylistRequest {
    pub name: String,
    pub work_days: Option<String>,
    pub start_hour: i64,
    pub end_hour: i64,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub ok: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
