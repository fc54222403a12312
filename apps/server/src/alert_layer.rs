//! Tracing layer that forwards ERROR events to the admin mailbox.
//!
//! Cascading failures must not flood the inbox, so sends are throttled to
//! one per `MIN_INTERVAL` and identical messages are suppressed for
//! `DEDUP_WINDOW`. The actual mail call is spawned onto the runtime so the
//! logging path never blocks.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::notify::Mailer;

const MIN_INTERVAL: Duration = Duration::from_secs(10);
const DEDUP_WINDOW: Duration = Duration::from_secs(60);

pub struct MailAlertLayer {
    mailer: Mailer,
    admin_email: String,
    throttle: Mutex<Throttle>,
}

struct Throttle {
    last_sent: Option<Instant>,
    /// message hash → when it was last alerted
    recent: HashMap<u64, Instant>,
}

impl MailAlertLayer {
    pub fn new(mailer: Mailer, admin_email: String) -> Self {
        Self {
            mailer,
            admin_email,
            throttle: Mutex::new(Throttle {
                last_sent: None,
                recent: HashMap::new(),
            }),
        }
    }

    /// Rate-limit + dedup decision for one message.
    fn should_send(&self, hash: u64, now: Instant) -> bool {
        let mut throttle = self.throttle.lock().unwrap();
        throttle
            .recent
            .retain(|_, ts| now.duration_since(*ts) < DEDUP_WINDOW);

        if throttle.recent.contains_key(&hash) {
            return false;
        }
        if let Some(last) = throttle.last_sent {
            if now.duration_since(last) < MIN_INTERVAL {
                return false;
            }
        }
        throttle.last_sent = Some(now);
        throttle.recent.insert(hash, now);
        true
    }
}

impl<S: Subscriber> Layer<S> for MailAlertLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != Level::ERROR {
            return;
        }

        let mut visitor = EventMessage::default();
        event.record(&mut visitor);
        let message = visitor.render();

        let hash = {
            let mut h = DefaultHasher::new();
            message.hash(&mut h);
            h.finish()
        };
        if !self.should_send(hash, Instant::now()) {
            return;
        }

        let target = event.metadata().target().to_string();
        let location = match (event.metadata().file(), event.metadata().line()) {
            (Some(file), Some(line)) => format!("{file}:{line}"),
            _ => "?".into(),
        };
        let text = format!(
            "A server error was logged.\n\n{message}\n\n\
             target: {target}\nlocation: {location}\ntime: {} UTC",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S"),
        );

        let mailer = self.mailer.clone();
        let to = self.admin_email.clone();
        tokio::spawn(async move {
            mailer.send(&to, "Server error", &text).await;
        });
    }
}

/// Collects the `message` field and any structured fields of an event into
/// one line.
#[derive(Default)]
struct EventMessage {
    message: String,
    fields: Vec<String>,
}

impl EventMessage {
    fn render(&self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (false, true) => self.message.clone(),
            (false, false) => format!("{} ({})", self.message, self.fields.join(", ")),
            (true, _) => self.fields.join(", "),
        }
    }

    fn record(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }
}

impl Visit for EventMessage {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.record(field, format!("{:?}", value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.record(field, value.to_string());
    }
}

// ── Tests ──
