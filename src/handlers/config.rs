use crate::{error::AppError, relay::agent::AgentConfig, state::AppState};
use crate::relay::messages::{GetAgentConfig, UpdateAgentConfig};
use actix_web::{http::header, web, HttpRequest, HttpResponse};
use serde_json::json;

pub async fn get_agent_config(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let config = state.relay.send(GetAgentConfig).await?;

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": config
    })))
}

/// Replace the agent config. Sessions opened afterwards use the new settings.
pub async fn update_agent_config(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<AgentConfig>,
) -> Result<HttpResponse, AppError> {
    if !bearer_matches(&req, state.config.relay.monitor_token()) {
        return Err(AppError::Unauthorized(
            "Missing or invalid bearer token".to_string(),
        ));
    }

    let config = body.into_inner();
    config.validate().map_err(AppError::ValidationError)?;

    let unknown: Vec<&str> = config
        .tools
        .iter()
        .filter(|name| !state.tools.contains(name))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(AppError::ValidationError(format!(
            "Unknown tools: {}",
            unknown.join(", ")
        )));
    }

    state
        .relay
        .send(UpdateAgentConfig {
            config: config.clone(),
        })
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Agent configuration updated successfully",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "updated_config": config
    })))
}

/// True when no token is configured or the request carries `Bearer <token>`.
fn bearer_matches(req: &HttpRequest, expected: Option<&str>) -> bool {
    let Some(expected) = expected else {
        return true;
    };
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token == expected)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::tests::test_state;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};

    fn update_body() -> serde_json::Value {
        json!({
            "instructions": "Be brief.",
            "voice": "verse",
            "tools": ["end_call"]
        })
    }

    #[actix_web::test]
    async fn test_update_then_read_agent_config() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state(None)))
                .route("/api/v1/agent-config", web::get().to(get_agent_config))
                .route("/api/v1/agent-config", web::put().to(update_agent_config)),
        )
        .await;

        let req = test::TestRequest::put()
            .uri("/api/v1/agent-config")
            .set_json(update_body())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/api/v1/agent-config").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["config"]["voice"], "verse");
        assert_eq!(body["config"]["tools"], json!(["end_call"]));
    }

    #[actix_web::test]
    async fn test_update_requires_bearer_when_token_set() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state(Some("secret"))))
                .route("/api/v1/agent-config", web::put().to(update_agent_config)),
        )
        .await;

        let req = test::TestRequest::put()
            .uri("/api/v1/agent-config")
            .set_json(update_body())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::put()
            .uri("/api/v1/agent-config")
            .insert_header((header::AUTHORIZATION, "Bearer secret"))
            .set_json(update_body())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_update_rejects_unknown_tool_and_empty_voice() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state(None)))
                .route("/api/v1/agent-config", web::put().to(update_agent_config)),
        )
        .await;

        let req = test::TestRequest::put()
            .uri("/api/v1/agent-config")
            .set_json(json!({"instructions": "x", "voice": "alloy", "tools": ["transfer_call"]}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::put()
            .uri("/api/v1/agent-config")
            .set_json(json!({"instructions": "x", "voice": " "}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
