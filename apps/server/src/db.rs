//! Persistence layer.
//!
//! `Store` wraps the SQLite pool behind explicit repository methods; no
//! handler touches the pool directly. The one non-trivial operation is
//! `insert_booking_if_free`, which serializes conflict-check-then-insert
//! per stylist so two concurrent requests cannot both pass the check
//! against a stale snapshot.

use chrono::NaiveDateTime;
use dashmap::DashMap;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::ApiError;
use crate::models::{Booking, BookingDetail, BookingsQuery, Service, Stylist};

const BOOKING_COLUMNS: &str =
    "id, stylist_id, service_id, client_name, client_contact, start_at, end_at,
     duration_min, status, created_at";

const BOOKING_DETAIL_SELECT: &str =
    "SELECT b.id, b.stylist_id, st.name AS stylist_name,
            b.service_id, s.name AS service_name, s.price,
            b.client_name, b.client_contact, b.start_at, b.end_at,
            b.status, b.created_at
     FROM bookings b
     JOIN stylists st ON st.id = b.stylist_id
     JOIN services s ON s.id = b.service_id";

/// Data for a booking that passed validation but is not yet persisted.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub stylist_id: i64,
    pub service_id: i64,
    pub client_name: String,
    pub client_contact: String,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub duration_min: i64,
}

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    /// Per-stylist serialization for booking creation.
    stylist_locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            stylist_locks: Arc::new(DashMap::new()),
        }
    }

    /// Liveness probe for the health endpoint.
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    // ── Catalog reads ──

    pub async fn list_services(&self) -> Result<Vec<Service>, ApiError> {
        let services = sqlx::query_as::<_, Service>(
            "SELECT id, name, duration_min, price FROM services ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(services)
    }

    pub async fn list_stylists(&self) -> Result<Vec<Stylist>, ApiError> {
        let stylists = sqlx::query_as::<_, Stylist>(
            "SELECT id, name, work_days, start_hour, end_hour FROM stylists ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(stylists)
    }

    pub async fn find_stylist(&self, id: i64) -> Result<Option<Stylist>, ApiError> {
        let stylist = sqlx::query_as::<_, Stylist>(
            "SELECT id, name, work_days, start_hour, end_hour FROM stylists WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(stylist)
    }

    pub async fn find_service(&self, id: i64) -> Result<Option<Service>, ApiError> {
        let service = sqlx::query_as::<_, Service>(
            "SELECT id, name, duration_min, price FROM services WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(service)
    }

    // ── Bookings ──

    /// Confirmed bookings for a stylist whose start falls in `[from, to)`,
    /// ascending by start.
    pub async fn bookings_for_stylist_between(
        &self,
        stylist_id: i64,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Booking>, ApiError> {
        let query = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE stylist_id = ? AND status = 'confirmed'
               AND start_at >= ? AND start_at < ?
             ORDER BY start_at ASC"
        );
        let bookings = sqlx::query_as::<_, Booking>(&query)
            .bind(stylist_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;
        Ok(bookings)
    }

    /// Atomic conflict-check-and-insert.
    ///
    /// Holds the stylist's lock across the overlap query and the insert, so
    /// of two concurrent requests for overlapping intervals exactly one
    /// commits and the other gets `Conflict`.
    pub async fn insert_booking_if_free(&self, new: NewBooking) -> Result<Booking, ApiError> {
        let lock = self
            .stylist_locks
            .entry(new.stylist_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let clashes: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM bookings
             WHERE stylist_id = ? AND status = 'confirmed'
               AND start_at < ? AND ? < end_at",
        )
        .bind(new.stylist_id)
        .bind(new.end_at)
        .bind(new.start_at)
        .fetch_one(&self.pool)
        .await?;

        if clashes > 0 {
            return Err(ApiError::conflict(
                "the requested time overlaps an existing booking",
            ));
        }

        let id = sqlx::query(
            "INSERT INTO bookings (stylist_id, service_id, client_name, client_contact,
                                   start_at, end_at, duration_min, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, 'confirmed', datetime('now'))",
        )
        .bind(new.stylist_id)
        .bind(new.service_id)
        .bind(&new.client_name)
        .bind(&new.client_contact)
        .bind(new.start_at)
        .bind(new.end_at)
        .bind(new.duration_min)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        let query = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?");
        let booking = sqlx::query_as::<_, Booking>(&query)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(booking)
    }

    /// Admin listing: by exact date, by date range, or everything upcoming.
    pub async fn list_bookings(
        &self,
        filter: &BookingsQuery,
    ) -> Result<Vec<BookingDetail>, ApiError> {
        let bookings = if let Some(date) = &filter.date {
            let query = format!(
                "{BOOKING_DETAIL_SELECT}
                 WHERE date(b.start_at) = ? AND b.status = 'confirmed'
                 ORDER BY b.start_at ASC"
            );
            sqlx::query_as::<_, BookingDetail>(&query)
                .bind(date)
                .fetch_all(&self.pool)
                .await?
        } else if let (Some(from), Some(to)) = (&filter.from, &filter.to) {
            let query = format!(
                "{BOOKING_DETAIL_SELECT}
                 WHERE date(b.start_at) BETWEEN ? AND ? AND b.status = 'confirmed'
                 ORDER BY b.start_at ASC"
            );
            sqlx::query_as::<_, BookingDetail>(&query)
                .bind(from)
                .bind(to)
                .fetch_all(&self.pool)
                .await?
        } else {
            let query = format!(
                "{BOOKING_DETAIL_SELECT}
                 WHERE b.status = 'confirmed'
                 ORDER BY b.start_at ASC"
            );
            sqlx::query_as::<_, BookingDetail>(&query)
                .fetch_all(&self.pool)
                .await?
        };
        Ok(bookings)
    }

    pub async fn delete_booking(&self, id: i64) -> Result<(), ApiError> {
        let affected = sqlx::query("DELETE FROM bookings WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if affected == 0 {
            return Err(ApiError::not_found("booking not found"));
        }
        Ok(())
    }

    // ── Catalog writes ──

    pub async fn create_service(
        &self,
        name: &str,
        duration_min: i64,
        price: i64,
    ) -> Result<Service, ApiError> {
        let id = sqlx::query("INSERT INTO services (name, duration_min, price) VALUES (?, ?, ?)")
            .bind(name)
            .bind(duration_min)
            .bind(price)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();
        let service = sqlx::query_as::<_, Service>(
            "SELECT id, name, duration_min, price FROM services WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(service)
    }

    /// Refused while bookings reference the service; their intervals carry
    /// a denormalized duration, but the join in listings would dangle.
    pub async fn delete_service(&self, id: i64) -> Result<(), ApiError> {
        let referenced: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE service_id = ?")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        if referenced > 0 {
            return Err(ApiError::conflict(
                "service is referenced by existing bookings",
            ));
        }
        let affected = sqlx::query("DELETE FROM services WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if affected == 0 {
            return Err(ApiError::not_found("service not found"));
        }
        Ok(())
    }

    pub async fn create_stylist(
        &self,
        name: &str,
        work_days: &str,
        start_hour: i64,
        end_hour: i64,
    ) -> Result<Stylist, ApiError> {
        let id = sqlx::query(
            "INSERT INTO stylists (name, work_days, start_hour, end_hour) VALUES (?, ?, ?, ?)",
        )
        .bind(name)
        .bind(work_days)
        .bind(start_hour)
        .bind(end_hour)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        let stylist = sqlx::query_as::<_, Stylist>(
            "SELECT id, name, work_days, start_hour, end_hour FROM stylists WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(stylist)
    }

    pub async fn delete_stylist(&self, id: i64) -> Result<(), ApiError> {
        let referenced: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE stylist_id = ?")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        if referenced > 0 {
            return Err(ApiError::conflict(
                "stylist is referenced by existing bookings",
            ));
        }
        let affected = sqlx::query("DELETE FROM stylists WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if affected == 0 {
            return Err(ApiError::not_found("stylist not found"));
        }
        Ok(())
    }
}

// ── Migrations ──

pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    // WAL mode for concurrent readers alongside the writer
    sqlx::query("PRAGMA journal_mode=WAL").execute(pool).await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS _migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .execute(pool)
    .await?;

    let applied: bool =
        sqlx::query_scalar("SELECT COUNT(*) > 0 FROM _migrations WHERE name = '001_init'")
            .fetch_one(pool)
            .await?;

    if !applied {
        let migration_sql = include_str!("../migrations/001_init.sql");
        for statement in migration_sql.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed).execute(pool).await?;
            }
        }
        sqlx::query("INSERT INTO _migrations (name) VALUES ('001_init')")
            .execute(pool)
            .await?;
        tracing::info!("Applied migration: 001_init");
    }

    let seeded: bool =
        sqlx::query_scalar("SELECT COUNT(*) > 0 FROM _migrations WHERE name = '002_seed_catalog'")
            .fetch_one(pool)
            .await?;

    if !seeded {
        let empty: bool = sqlx::query_scalar("SELECT COUNT(*) = 0 FROM services")
            .fetch_one(pool)
            .await?;
        if empty {
            sqlx::query(
                "INSERT INTO services (name, duration_min, price) VALUES
                    ('Haircut', 30, 8000),
                    ('Coloring', 90, 20000),
                    ('Shave', 20, 5000)",
            )
            .execute(pool)
            .await?;
            sqlx::query(
                "INSERT INTO stylists (name, work_days, start_hour, end_hour) VALUES
                    ('Alex', 'Mon,Tue,Wed,Thu,Fri', 9, 17),
                    ('Marta', 'Sat', 10, 15)",
            )
            .execute(pool)
            .await?;
        }
        sqlx::query("INSERT INTO _migrations (name) VALUES ('002_seed_catalog')")
            .execute(pool)
            .await?;
        tracing::info!("Applied migration: 002_seed_catalog");
    }

    tracing::info!("Database migrations up to date");
    Ok(())
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_store() -> Store {
        // A single connection keeps the in-memory database alive and shared.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        Store::new(pool)
    }

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn new_booking(stylist_id: i64, start: NaiveDateTime, minutes: i64) -> NewBooking {
        NewBooking {
            stylist_id,
            service_id: 1,
            client_name: "Client".into(),
            client_contact: "client@example.com".into(),
            start_at: start,
            end_at: start + chrono::Duration::minutes(minutes),
            duration_min: minutes,
        }
    }

    #[tokio::test]
    async fn test_seed_catalog_present() {
        let store = memory_store().await;
        assert_eq!(store.list_services().await.unwrap().len(), 3);
        assert_eq!(store.list_stylists().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_insert_then_overlapping_insert_conflicts() {
        let store = memory_store().await;
        store
            .insert_booking_if_free(new_booking(1, at(2, 10, 0), 30))
            .await
            .unwrap();

        // 10:15–10:45 overlaps 10:00–10:30
        let err = store
            .insert_booking_if_free(new_booking(1, at(2, 10, 15), 30))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_touching_bookings_allowed() {
        let store = memory_store().await;
        store
            .insert_booking_if_free(new_booking(1, at(2, 10, 0), 30))
            .await
            .unwrap();
        store
            .insert_booking_if_free(new_booking(1, at(2, 10, 30), 30))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_other_stylist_not_blocked() {
        let store = memory_store().await;
        store
            .insert_booking_if_free(new_booking(1, at(2, 10, 0), 30))
            .await
            .unwrap();
        store
            .insert_booking_if_free(new_booking(2, at(2, 10, 0), 30))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_identical_bookings_one_wins() {
        let store = memory_store().await;
        let (a, b) = tokio::join!(
            store.insert_booking_if_free(new_booking(1, at(2, 11, 0), 30)),
            store.insert_booking_if_free(new_booking(1, at(2, 11, 0), 30)),
        );
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    }

    #[tokio::test]
    async fn test_bookings_between_is_half_open_and_scoped() {
        let store = memory_store().await;
        store
            .insert_booking_if_free(new_booking(1, at(2, 9, 0), 30))
            .await
            .unwrap();
        store
            .insert_booking_if_free(new_booking(1, at(3, 9, 0), 30))
            .await
            .unwrap();
        store
            .insert_booking_if_free(new_booking(2, at(2, 12, 0), 30))
            .await
            .unwrap();

        let day = store
            .bookings_for_stylist_between(1, at(2, 0, 0), at(3, 0, 0))
            .await
            .unwrap();
        assert_eq!(day.len(), 1);
        assert_eq!(day[0].start_at, at(2, 9, 0));
    }

    #[tokio::test]
    async fn test_delete_booking_missing_is_not_found() {
        let store = memory_store().await;
        let err = store.delete_booking(12345).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_referenced_service_refused() {
        let store = memory_store().await;
        store
            .insert_booking_if_free(new_booking(1, at(2, 10, 0), 30))
            .await
            .unwrap();

        let err = store.delete_service(1).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        // The stylist's availability data is still intact.
        let day = store
            .bookings_for_stylist_between(1, at(2, 0, 0), at(3, 0, 0))
            .await
            .unwrap();
        assert_eq!(day.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_unreferenced_service_ok() {
        let store = memory_store().await;
        let service = store.create_service("Trim", 15, 3000).await.unwrap();
        store.delete_service(service.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_referenced_stylist_refused() {
        let store = memory_store().await;
        store
            .insert_booking_if_free(new_booking(1, at(2, 10, 0), 30))
            .await
            .unwrap();
        let err = store.delete_stylist(1).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_list_bookings_date_filter() {
        let store = memory_store().await;
        store
            .insert_booking_if_free(new_booking(1, at(2, 10, 0), 30))
            .await
            .unwrap();
        store
            .insert_booking_if_free(new_booking(1, at(3, 10, 0), 30))
            .await
            .unwrap();

        let filter = BookingsQuery {
            date: Some("2026-03-02".into()),
            from: None,
            to: None,
        };
        let listed = store.list_bookings(&filter).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].stylist_name, "Alex");
        assert_eq!(listed[0].service_name, "Haircut");
    }
}
