//! Outbound notifications.
//!
//! Booking confirmations go out through an HTTP mail API as a JSON POST.
//! Delivery is best-effort: failures are logged and never affect the
//! booking that triggered them. When `MAIL_API_URL` is unset the mailer is
//! disabled and every send is a no-op.

use crate::models::BookingDetail;

#[derive(Clone)]
pub struct Mailer {
    api_url: String,
    api_key: String,
    from: String,
    http: reqwest::Client,
}

impl Mailer {
    pub fn new(api_url: String, api_key: String, from: String) -> Self {
        Self {
            api_url,
            api_key,
            from,
            http: reqwest::Client::new(),
        }
    }

    pub fn enabled(&self) -> bool {
        !self.api_url.is_empty()
    }

    /// Send one message. Errors are logged, not returned.
    pub async fn send(&self, to: &str, subject: &str, text: &str) {
        if !self.enabled() {
            return;
        }
        let result = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "from": self.from,
                "to": to,
                "subject": subject,
                "text": text,
            }))
            .send()
            .await;
        match result {
            Ok(resp) if !resp.status().is_success() => {
                tracing::error!("mail API returned {} for {}", resp.status(), to);
            }
            Err(e) => {
                tracing::error!("failed to send mail to {}: {}", to, e);
            }
            _ => {}
        }
    }
}

/// Rough check that a contact string can receive email. Clients may leave a
/// phone number instead; those simply get no confirmation.
pub fn looks_like_email(contact: &str) -> bool {
    match contact.split_once('@') {
        Some((user, host)) => !user.is_empty() && host.contains('.'),
        None => false,
    }
}

pub fn client_confirmation(booking: &BookingDetail) -> (String, String) {
    let subject = format!("Booking confirmed: {}", booking.service_name);
    let text = format!(
        "Hi {},\n\nYour appointment is confirmed.\n\n\
         Service: {}\nStylist: {}\nWhen: {}\n\nSee you soon!",
        booking.client_name,
        booking.service_name,
        booking.stylist_name,
        booking.start_at.format("%Y-%m-%d %H:%M"),
    );
    (subject, text)
}

pub fn admin_notification(booking: &BookingDetail) -> (String, String) {
    let subject = format!("New booking #{}", booking.id);
    let text = format!(
        "{} booked {} with {} at {} (contact: {})",
        booking.client_name,
        booking.service_name,
        booking.stylist_name,
        booking.start_at.format("%Y-%m-%d %H:%M"),
        booking.client_contact,
    );
    (subject, text)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn detail() -> BookingDetail {
        BookingDetail {
            id: 7,
            stylist_id: 1,
            stylist_name: "Alex".into(),
            service_id: 1,
            service_name: "Haircut".into(),
            price: 8000,
            client_name: "Jo".into(),
            client_contact: "jo@example.com".into(),
            start_at: NaiveDate::from_ymd_opt(2026, 3, 2)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            end_at: NaiveDate::from_ymd_opt(2026, 3, 2)
                .unwrap()
                .and_hms_opt(10, 30, 0)
                .unwrap(),
            status: "confirmed".into(),
            created_at: "2026-03-01 12:00:00".into(),
        }
    }

    #[test]
    fn test_looks_like_email() {
        assert!(looks_like_email("jo@example.com"));
        assert!(!looks_like_email("jo@nodot"));
        assert!(!looks_like_email("@example.com"));
        assert!(!looks_like_email("+36 30 123 4567"));
        assert!(!looks_like_email(""));
    }

    #[test]
    fn test_client_confirmation_mentions_slot() {
        let (subject, text) = client_confirmation(&detail());
        assert!(subject.contains("Haircut"));
        assert!(text.contains("2026-03-02 10:00"));
        assert!(text.contains("Alex"));
    }

    #[test]
    fn test_admin_notification_mentions_contact() {
        let (subject, text) = admin_notification(&detail());
        assert!(subject.contains("#7"));
        assert!(text.contains("jo@example.com"));
    }

    #[test]
    fn test_disabled_mailer() {
        let mailer = Mailer::new(String::new(), String::new(), String::new());
        assert!(!mailer.enabled());
    }
}
