use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use uuid::Uuid;

use crate::lifecycle::events::{spawn_supervised, ProcessEvents};
use crate::observability::telemetry::dsn::Dsn;

const CLIENT_NAME: &str = concat!("baas-gateway/", env!("CARGO_PKG_VERSION"));
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Error,
    Fatal,
}

/// Request the event was raised for.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EventRequest {
    pub method: String,
    pub url: String,
}

/// One crash telemetry event.
#[derive(Debug, Clone, Serialize)]
pub struct CrashEvent {
    pub event_id: String,
    pub timestamp: f64,
    pub level: Level,
    pub platform: &'static str,
    pub logger: String,
    pub environment: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<EventRequest>,
    pub tags: BTreeMap<String, String>,
}

impl CrashEvent {
    pub fn new(level: Level, logger: &str, message: impl Into<String>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        Self {
            event_id: Uuid::new_v4().simple().to_string(),
            timestamp,
            level,
            platform: "other",
            logger: logger.to_string(),
            environment: "production".to_string(),
            message: message.into(),
            request: None,
            tags: BTreeMap::new(),
        }
    }

    pub fn with_request(mut self, method: &str, url: &str) -> Self {
        self.request = Some(EventRequest {
            method: method.to_string(),
            url: url.to_string(),
        });
        self
    }

    pub fn with_tag(mut self, key: &str, value: impl Into<String>) -> Self {
        self.tags.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Clone)]
enum Sink {
    Disabled,
    Http {
        client: reqwest::Client,
        dsn: Dsn,
        events: ProcessEvents,
    },
    Memory(Arc<Mutex<Vec<CrashEvent>>>),
}

/// Ships crash events to the telemetry endpoint.
///
/// Capturing never blocks the request: events are posted from a supervised
/// task and delivery failures are only logged.
#[derive(Clone)]
pub struct CrashReporter {
    sink: Sink,
}

impl CrashReporter {
    /// Reporter that drops every event.
    pub fn disabled() -> Self {
        Self { sink: Sink::Disabled }
    }

    pub fn new(dsn: Dsn, client: reqwest::Client, events: ProcessEvents) -> Self {
        Self {
            sink: Sink::Http { client, dsn, events },
        }
    }

    /// Reporter that keeps events in memory, for embedding and tests.
    pub fn recording() -> Self {
        Self {
            sink: Sink::Memory(Arc::new(Mutex::new(Vec::new()))),
        }
    }

    /// Build from an optional DSN. An invalid DSN disables reporting.
    pub fn from_dsn(dsn: Option<&str>, client: reqwest::Client, events: &ProcessEvents) -> Self {
        match dsn.map(str::parse::<Dsn>) {
            Some(Ok(dsn)) => {
                tracing::info!(?dsn, "Crash telemetry enabled");
                Self::new(dsn, client, events.clone())
            }
            Some(Err(e)) => {
                tracing::error!(error = %e, "Invalid SENTRY_DSN, crash telemetry disabled");
                Self::disabled()
            }
            None => Self::disabled(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self.sink, Sink::Disabled)
    }

    /// Events kept by a recording reporter.
    pub fn recorded(&self) -> Vec<CrashEvent> {
        match &self.sink {
            Sink::Memory(events) => events.lock().map(|e| e.clone()).unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Queue an event for delivery.
    pub fn capture(&self, event: CrashEvent) {
        match &self.sink {
            Sink::Disabled => {}
            Sink::Memory(events) => {
                if let Ok(mut events) = events.lock() {
                    events.push(event);
                }
            }
            Sink::Http { client, dsn, events } => {
                let client = client.clone();
                let dsn = dsn.clone();
                spawn_supervised(events, "crash-report", async move {
                    post_event(&client, &dsn, &event).await;
                    Ok::<(), Infallible>(())
                });
            }
        }
    }

    /// Deliver an event and wait for it, bounded by a short timeout. Used
    /// right before the process exits.
    pub async fn capture_and_flush(&self, event: CrashEvent) {
        match &self.sink {
            Sink::Http { client, dsn, .. } => {
                if tokio::time::timeout(FLUSH_TIMEOUT, post_event(client, dsn, &event))
                    .await
                    .is_err()
                {
                    tracing::warn!("Timed out flushing crash event");
                }
            }
            _ => self.capture(event),
        }
    }
}

async fn post_event(client: &reqwest::Client, dsn: &Dsn, event: &CrashEvent) {
    let result = client
        .post(dsn.store_url().clone())
        .header("X-Sentry-Auth", dsn.auth_header(CLIENT_NAME))
        .json(event)
        .send()
        .await;

    match result {
        Ok(response) if response.status().is_success() => {
            tracing::debug!(event_id = %event.event_id, "Crash event delivered");
        }
        Ok(response) => {
            tracing::warn!(status = response.status().as_u16(), "Crash event rejected");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Crash event delivery failed");
        }
    }
}
