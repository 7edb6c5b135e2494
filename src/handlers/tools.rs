use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::error::AppResult;
use crate::state::AppState;

/// Every registered tool with its schema and call type.
pub async fn list_tools(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let tools = state.tools.summaries();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "count": tools.len(),
        "tools": tools
    })))
}
