use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};
use uuid::Uuid;

const TELEMETRY_TARGET: &str = "c4layout::worker::telemetry";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RequestLifecycle {
    Start,
    Success,
    Failure,
    Timeout,
}

impl fmt::Display for RequestLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "request_start"),
            Self::Success => write!(f, "request_success"),
            Self::Failure => write!(f, "request_failure"),
            Self::Timeout => write!(f, "request_timeout"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestTelemetry {
    pub correlation_id: String,
    pub lifecycle: RequestLifecycle,
    pub error_reason: Option<String>,
    pub duration_ms: Option<u128>,
}

impl RequestTelemetry {
    fn new(correlation_id: &str, lifecycle: RequestLifecycle) -> Self {
        Self {
            correlation_id: correlation_id.to_string(),
            lifecycle,
            error_reason: None,
            duration_ms: None,
        }
    }

    fn now_unix_ms() -> u128 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default()
    }
}

pub fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn request_start(correlation_id: &str, nodes: usize) -> RequestTelemetry {
    let telemetry = RequestTelemetry::new(correlation_id, RequestLifecycle::Start);
    info!(
        target: TELEMETRY_TARGET,
        correlation_id = %telemetry.correlation_id,
        lifecycle = %telemetry.lifecycle,
        nodes,
        timestamp_ms = RequestTelemetry::now_unix_ms(),
        "request_start"
    );
    telemetry
}

pub fn request_success(correlation_id: &str, duration_ms: u128) -> RequestTelemetry {
    let mut telemetry = RequestTelemetry::new(correlation_id, RequestLifecycle::Success);
    telemetry.duration_ms = Some(duration_ms);
    info!(
        target: TELEMETRY_TARGET,
        correlation_id = %telemetry.correlation_id,
        lifecycle = %telemetry.lifecycle,
        duration_ms,
        timestamp_ms = RequestTelemetry::now_unix_ms(),
        "request_success"
    );
    telemetry
}

pub fn request_failure(correlation_id: &str, reason: Option<String>) -> RequestTelemetry {
    let mut telemetry = RequestTelemetry::new(correlation_id, RequestLifecycle::Failure);
    telemetry.error_reason = reason;
    let error_reason = telemetry.error_reason.as_deref().unwrap_or("unclassified");
    warn!(
        target: TELEMETRY_TARGET,
        correlation_id = %telemetry.correlation_id,
        lifecycle = %telemetry.lifecycle,
        error = %error_reason,
        timestamp_ms = RequestTelemetry::now_unix_ms(),
        "request_failure"
    );
    telemetry
}

pub fn request_timeout(correlation_id: &str, timeout_ms: u64) -> RequestTelemetry {
    let telemetry = RequestTelemetry::new(correlation_id, RequestLifecycle::Timeout);
    warn!(
        target: TELEMETRY_TARGET,
        correlation_id = %telemetry.correlation_id,
        lifecycle = %telemetry.lifecycle,
        timeout_ms,
        timestamp_ms = RequestTelemetry::now_unix_ms(),
        "request_timeout"
    );
    telemetry
}

pub fn orphan_response(correlation_id: &str) {
    debug!(
        target: TELEMETRY_TARGET,
        correlation_id = %correlation_id,
        timestamp_ms = RequestTelemetry::now_unix_ms(),
        "orphan response ignored"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_ids_are_uuid_like() {
        let id = new_correlation_id();
        assert_eq!(id.len(), 36);
        assert_ne!(id, new_correlation_id());
    }

    #[test]
    fn request_telemetry_lifecycle() {
        let id = new_correlation_id();
        assert_eq!(request_start(&id, 3).lifecycle, RequestLifecycle::Start);
        assert_eq!(request_success(&id, 12).duration_ms, Some(12));
        let failure = request_failure(&id, Some("boom".to_string()));
        assert_eq!(failure.error_reason.as_deref(), Some("boom"));
        assert_eq!(request_timeout(&id, 50).lifecycle.to_string(), "request_timeout");
    }
}
