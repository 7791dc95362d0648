use rocket::serde::json::Json;
use rocket::{get, routes, Route, State};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::metrics::ProcessingMetrics;

/// Read-only projection of the metrics registry, plus derived success rates.
#[get("/metrics")]
pub fn metrics_snapshot(metrics: &State<Arc<ProcessingMetrics>>) -> Json<Value> {
    let mut snapshot = metrics.snapshot();
    snapshot.insert(
        "taskSuccessRatePercent".into(),
        success_rate(metrics.completed_tasks(), metrics.failed_tasks()).into(),
    );
    snapshot.insert(
        "requestSuccessRatePercent".into(),
        success_rate(metrics.completed_requests(), metrics.failed_requests()).into(),
    );
    Json(Value::Object(snapshot))
}

#[get("/health")]
pub fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn success_rate(completed: u64, failed: u64) -> u64 {
    let total = completed + failed;
    if total == 0 {
        100
    } else {
        completed * 100 / total
    }
}

pub fn generate_system_routes() -> Vec<Route> {
    routes![metrics_snapshot, health]
}
