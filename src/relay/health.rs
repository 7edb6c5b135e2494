//! Read-only liveness inspection of call sessions.
//!
//! The sweep runs on the relay actor's interval timer and never mutates a
//! session. Issues are logged and kept as the latest snapshot for `/health`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::registry::{CallSession, SessionStatus};

/// Something wrong with a live call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HealthIssue {
    CarrierLost,
    ModelLost,
    SilentMedia { age_secs: i64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHealth {
    pub session_id: String,
    pub status: SessionStatus,
    pub issues: Vec<HealthIssue>,
}

/// Latest sweep result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub checked_at: Option<DateTime<Utc>>,
    pub sessions_checked: usize,
    pub unhealthy: Vec<SessionHealth>,
}

/// Issues of one session at `now`.
///
/// Only active calls are judged. A call with no carrier media at all after
/// `silent_timeout_secs` counts as silent.
pub fn inspect(session: &CallSession, now: DateTime<Utc>, silent_timeout_secs: u64) -> Vec<HealthIssue> {
    let mut issues = Vec::new();
    if session.status != SessionStatus::Active {
        return issues;
    }

    if session.open_carrier().is_none() {
        issues.push(HealthIssue::CarrierLost);
    }
    if session.open_model().is_none() {
        issues.push(HealthIssue::ModelLost);
    }

    let age_secs = session.age_secs(now);
    let timeout = i64::try_from(silent_timeout_secs).unwrap_or(i64::MAX);
    if session.counters.carrier_frames == 0 && age_secs > timeout {
        issues.push(HealthIssue::SilentMedia { age_secs });
    }
    issues
}

pub fn sweep<'a>(
    sessions: impl Iterator<Item = &'a CallSession>,
    now: DateTime<Utc>,
    silent_timeout_secs: u64,
) -> HealthReport {
    let mut report = HealthReport {
        checked_at: Some(now),
        ..Default::default()
    };

    for session in sessions {
        report.sessions_checked += 1;
        let issues = inspect(session, now, silent_timeout_secs);
        if !issues.is_empty() {
            report.unhealthy.push(SessionHealth {
                session_id: session.session_id.clone(),
                status: session.status,
                issues,
            });
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::peer::PeerSink;
    use crate::relay::registry::SessionRegistry;
    use chrono::Duration;

    #[test]
    fn test_connecting_sessions_are_not_judged() {
        let mut registry = SessionRegistry::new(2);
        let (carrier, rx) = PeerSink::channel();
        let id = registry.create(carrier).unwrap();
        drop(rx);

        let session = registry.get(&id).unwrap();
        assert!(inspect(session, Utc::now(), 300).is_empty());
    }

    #[test]
    fn test_detects_lost_peers_and_silence() {
        let mut registry = SessionRegistry::new(2);
        let (carrier, _carrier_rx) = PeerSink::channel();
        let id = registry.create(carrier).unwrap();
        registry.get_mut(&id).unwrap().start_stream("MZ1".into());

        let session = registry.get(&id).unwrap();
        assert_eq!(inspect(session, Utc::now(), 300), vec![HealthIssue::ModelLost]);

        let later = Utc::now() + Duration::seconds(301);
        let issues = inspect(session, later, 300);
        assert!(issues.contains(&HealthIssue::ModelLost));
        assert!(issues.iter().any(|issue| matches!(issue, HealthIssue::SilentMedia { .. })));

        let session = registry.get_mut(&id).unwrap();
        session.record_media(20);
        let (model, _model_rx) = PeerSink::channel();
        session.model = Some(model);
        assert!(inspect(session, later, 300).is_empty());
    }

    #[test]
    fn test_sweep_collects_unhealthy_sessions() {
        let mut registry = SessionRegistry::new(2);
        let (carrier, carrier_rx) = PeerSink::channel();
        let id = registry.create(carrier).unwrap();
        registry.get_mut(&id).unwrap().start_stream("MZ1".into());
        drop(carrier_rx);

        let report = sweep(registry.iter(), Utc::now(), 300);
        assert_eq!(report.sessions_checked, 1);
        assert_eq!(report.unhealthy.len(), 1);
        assert_eq!(
            report.unhealthy[0].issues,
            vec![HealthIssue::CarrierLost, HealthIssue::ModelLost]
        );
    }
}
