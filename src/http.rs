//! Reference HTTP surface: the four `/v1` routes over the engine.
//!
//! Protocol failures (wrong answer, expired, …) ride in a 200 body;
//! transport-level errors map through [`AgentAuthError::status`].

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::error;

use crate::engine::AgentAuthEngine;
use crate::error::AgentAuthError;
use crate::types::{InitChallengeOptions, SolveInput};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AgentAuthEngine>,
}

pub fn router(engine: Arc<AgentAuthEngine>) -> Router {
    Router::new()
        .route("/v1/challenge/init", post(init_challenge))
        .route("/v1/challenge/{id}", get(get_challenge))
        .route("/v1/challenge/{id}/solve", post(solve_challenge))
        .route("/v1/token/verify", get(verify_token))
        .with_state(AppState { engine })
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn error_response(err: AgentAuthError) -> Response {
    let status =
        StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!(error = %err, "request failed");
    }
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

// ── POST /v1/challenge/init ─────────────────────────────────────

async fn init_challenge(State(state): State<AppState>, body: axum::body::Bytes) -> Response {
    // an absent body means "all defaults"
    let options: InitChallengeOptions = if body.is_empty() {
        InitChallengeOptions::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(options) => options,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": format!("malformed request body: {e}") })),
                )
                    .into_response();
            }
        }
    };
    match state.engine.init_challenge(options).await {
        Ok(result) => (StatusCode::CREATED, Json(result)).into_response(),
        Err(err) => error_response(err),
    }
}

// ── GET /v1/challenge/{id} ──────────────────────────────────────

async fn get_challenge(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let Some(session_token) = bearer_token(&headers) else {
        return not_found();
    };
    match state.engine.get_challenge(&id, session_token).await {
        Ok(Some(view)) => Json(view).into_response(),
        // unknown id and bad session token are indistinguishable
        Ok(None) => not_found(),
        Err(err) => error_response(err),
    }
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "challenge not found" })),
    )
        .into_response()
}

// ── POST /v1/challenge/{id}/solve ───────────────────────────────

async fn solve_challenge(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<SolveInput>,
) -> Response {
    match state.engine.solve_challenge(&id, input).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(err) => error_response(err),
    }
}

// ── GET /v1/token/verify ────────────────────────────────────────

async fn verify_token(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return Json(json!({ "valid": false })).into_response();
    };
    Json(state.engine.verify_token(token).await).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenges::{ChallengeDriver, CryptoNlDriver};
    use crate::crypto::hmac_sha256_hex;
    use crate::engine::EngineConfig;
    use crate::store::MemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    const SECRET: &str = "an-http-test-secret-of-sufficient-length!!";

    fn test_router() -> (Router, Arc<AgentAuthEngine>) {
        let engine = Arc::new(
            AgentAuthEngine::new(
                EngineConfig::new(SECRET),
                Arc::new(MemoryStore::new()),
                vec![Arc::new(CryptoNlDriver)],
            )
            .unwrap(),
        );
        (router(Arc::clone(&engine)), engine)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_init_returns_201() {
        let (app, _) = test_router();
        let response = app
            .oneshot(
                Request::post("/v1/challenge/init")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"difficulty":"easy"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert!(json["id"].as_str().unwrap().starts_with("ch_"));
        assert!(json["session_token"].as_str().unwrap().starts_with("st_"));
        assert_eq!(json["ttl_seconds"], 30);
    }

    #[tokio::test]
    async fn test_get_challenge_requires_session_token() {
        let (app, engine) = test_router();
        let init = engine
            .init_challenge(InitChallengeOptions::default())
            .await
            .unwrap();

        // no Authorization header
        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/v1/challenge/{}", init.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        // correct bearer token
        let response = app
            .oneshot(
                Request::get(format!("/v1/challenge/{}", init.id))
                    .header("authorization", format!("Bearer {}", init.session_token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["id"], init.id.as_str());
        assert!(json["payload"].get("context").is_none());
    }

    #[tokio::test]
    async fn test_solve_full_round_trip() {
        let (app, engine) = test_router();
        let init = engine
            .init_challenge(InitChallengeOptions {
                difficulty: Some(crate::types::Difficulty::Easy),
                dimensions: None,
            })
            .await
            .unwrap();
        let data = engine_store_get(&engine, &init.id).await;
        let answer = CryptoNlDriver.solve(&data).unwrap();
        let hmac = hmac_sha256_hex(&answer, &init.session_token);

        let response = app
            .oneshot(
                Request::post(format!("/v1/challenge/{}/solve", init.id))
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({ "answer": answer, "hmac": hmac }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert!(json["token"].is_string());
        assert_eq!(json["score"]["reasoning"], 0.9);
    }

    #[tokio::test]
    async fn test_solve_failure_is_still_200() {
        let (app, engine) = test_router();
        let init = engine
            .init_challenge(InitChallengeOptions::default())
            .await
            .unwrap();
        let response = app
            .oneshot(
                Request::post(format!("/v1/challenge/{}/solve", init.id))
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({ "answer": "x", "hmac": "bogus" }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["reason"], "invalid_hmac");
    }

    #[tokio::test]
    async fn test_verify_token_route() {
        let (app, engine) = test_router();
        let init = engine
            .init_challenge(InitChallengeOptions {
                difficulty: Some(crate::types::Difficulty::Easy),
                dimensions: None,
            })
            .await
            .unwrap();
        let data = engine_store_get(&engine, &init.id).await;
        let answer = CryptoNlDriver.solve(&data).unwrap();
        let outcome = engine
            .solve_challenge(
                &init.id,
                SolveInput {
                    hmac: hmac_sha256_hex(&answer, &init.session_token),
                    answer,
                    canary_responses: None,
                    metadata: None,
                    client_rtt_ms: None,
                    step_timings: None,
                },
            )
            .await
            .unwrap();
        let token = outcome.token.unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::get("/v1/token/verify")
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["valid"], true);

        // missing header is a valid=false 200, not a transport error
        let response = app
            .oneshot(Request::get("/v1/token/verify").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["valid"], false);
    }

    async fn engine_store_get(
        engine: &AgentAuthEngine,
        id: &str,
    ) -> crate::types::ChallengePayload {
        engine.stored_payload(id).await.expect("challenge present")
    }
}
