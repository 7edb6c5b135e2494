use crate::error::AppResult;
use crate::relay::health::HealthReport;
use crate::relay::messages::{GetHealth, GetMetrics};
use crate::relay::metrics::MetricsSnapshot;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;
use std::process;

pub async fn health_check(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let metrics = state.relay.send(GetMetrics).await?;
    let report = state.relay.send(GetHealth).await?;
    let config = &state.config;

    Ok(HttpResponse::Ok().json(json!({
        "status": overall_status(&report),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.get_uptime_seconds(),
        "service": {
            "name": "call-relay",
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "sessions": {
            "active": metrics.active_sessions,
            "max": metrics.max_sessions,
            "monitors": metrics.monitors,
            "listeners": metrics.listeners
        },
        "relay": report,
        "memory": get_memory_info(),
        "system": get_system_status(&metrics)
    })))
}

pub async fn detailed_metrics(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let metrics = state.relay.send(GetMetrics).await?;
    let uptime_seconds = state.get_uptime_seconds();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "relay": metrics,
        "calls_per_minute": if uptime_seconds > 0 {
            metrics.totals.calls_accepted as f64 * 60.0 / uptime_seconds as f64
        } else {
            0.0
        },
        "memory": get_memory_info(),
        "system": get_system_status(&metrics)
    })))
}

/// `healthy` until the latest sweep found a broken call.
fn overall_status(report: &HealthReport) -> &'static str {
    if report.unhealthy.is_empty() {
        "healthy"
    } else {
        "degraded"
    }
}

fn get_memory_info() -> serde_json::Value {
    let pid = process::id();

    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string(format!("/proc/{}/status", pid)) {
            let mut vm_rss = 0;
            let mut vm_size = 0;

            for line in status.lines() {
                if let Some(rest) = line.strip_prefix("VmRSS:") {
                    vm_rss = parse_kb(rest);
                } else if let Some(rest) = line.strip_prefix("VmSize:") {
                    vm_size = parse_kb(rest);
                }
            }

            return json!({
                "resident_memory_bytes": vm_rss,
                "virtual_memory_bytes": vm_size,
                "available": true
            });
        }
    }

    json!({
        "pid": pid,
        "resident_memory_bytes": 0,
        "virtual_memory_bytes": 0,
        "available": false,
        "note": "Memory info not available on this platform"
    })
}

/// `"  1234 kB"` → bytes
fn parse_kb(field: &str) -> u64 {
    field
        .split_whitespace()
        .next()
        .and_then(|kb| kb.parse::<u64>().ok())
        .unwrap_or(0)
        * 1024
}

fn get_system_status(metrics: &MetricsSnapshot) -> serde_json::Value {
    let session_usage = metrics.session_usage();

    let status = if session_usage > 0.9 {
        "high_load"
    } else if session_usage > 0.7 {
        "moderate_load"
    } else {
        "normal"
    };

    json!({
        "status": status,
        "session_usage_percent": (session_usage * 100.0).round(),
        "max_sessions": metrics.max_sessions,
        "current_sessions": metrics.active_sessions,
        "pending_tool_calls": metrics.pending_tool_calls,
        "load_warnings": if session_usage > 0.8 {
            vec!["High session usage - consider increasing relay.max_concurrent_sessions"]
        } else {
            vec![]
        }
    })
}
