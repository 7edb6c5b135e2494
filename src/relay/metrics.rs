//! Process-wide relay counters.

use serde::Serialize;

/// Totals since process start. Owned by the relay actor, copied out on request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayMetrics {
    pub calls_accepted: u64,
    pub calls_rejected: u64,
    pub calls_closed: u64,
    pub carrier_frames: u64,
    pub ai_audio_deltas: u64,
    pub user_audio_frames: u64,
    pub truncations: u64,
    pub tool_calls: u64,
    pub listener_evictions: u64,
    pub monitor_evictions: u64,
    pub dropped_frames: u64,
}

/// Live gauges plus the counters, as served by `/api/v1/metrics`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub active_sessions: usize,
    pub max_sessions: usize,
    pub monitors: usize,
    pub listeners: usize,
    pub pending_tool_calls: usize,
    #[serde(flatten)]
    pub totals: RelayMetrics,
}

impl MetricsSnapshot {
    /// Share of the session capacity in use, 0.0 to 1.0.
    pub fn session_usage(&self) -> f64 {
        if self.max_sessions == 0 {
            return 0.0;
        }
        self.active_sessions as f64 / self.max_sessions as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_flattens_totals() {
        let snapshot = MetricsSnapshot {
            active_sessions: 5,
            max_sessions: 20,
            monitors: 1,
            listeners: 2,
            pending_tool_calls: 0,
            totals: RelayMetrics {
                calls_accepted: 7,
                ..Default::default()
            },
        };
        assert_eq!(snapshot.session_usage(), 0.25);

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["callsAccepted"], 7);
        assert_eq!(value["activeSessions"], 5);
    }
}
