use super::state::AppState;
use crate::proxy::{reject_unauthorized, ProxySession};
use axum::{
    extract::{ws::WebSocketUpgrade, RawQuery, State},
    http::{header::SEC_WEBSOCKET_PROTOCOL, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, error, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionTokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub active_sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            active_sessions: state.active_sessions(),
        }),
    )
}

/// GET /api/session
/// Issue a session token for opening the proxy WebSocket
pub async fn issue_session(State(state): State<AppState>) -> Response {
    match state.issuer.issue() {
        Ok(token) => (StatusCode::OK, Json(SessionTokenResponse { token })).into_response(),
        Err(e) => {
            error!("Failed to issue session token: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Failed to issue session token".to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// GET /api/flux
/// Upgrade to a WebSocket and relay it to the provider
pub async fn flux_proxy(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let offered = offered_subprotocols(&headers);

    let protocol = match state.verifier.authorize(offered.iter().map(String::as_str)) {
        Ok(protocol) => protocol,
        Err(e) => {
            warn!("Rejecting proxy connection: {}", e);
            return ws.on_upgrade(reject_unauthorized);
        }
    };

    let params = state.connector.params_from_query(query.as_deref());
    let session = ProxySession::new(
        Arc::clone(&state.connector),
        params,
        state.shutdown.child_token(),
    );
    let active = Arc::clone(&state.active_sessions);

    debug!("Accepted upgrade for session {}", session.id());

    ws.protocols([protocol]).on_upgrade(move |socket| async move {
        active.fetch_add(1, Ordering::SeqCst);
        session.run(socket).await;
        active.fetch_sub(1, Ordering::SeqCst);
    })
}

/// Subprotocols offered by the client, in header order
pub fn offered_subprotocols(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(SEC_WEBSOCKET_PROTOCOL)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_offered_subprotocols_splits_and_trims() {
        let mut headers = HeaderMap::new();
        headers.append(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static("chat, access_token.abc"));
        headers.append(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(" other "));

        assert_eq!(
            offered_subprotocols(&headers),
            vec!["chat", "access_token.abc", "other"]
        );
    }

    #[test]
    fn test_no_subprotocol_header() {
        assert!(offered_subprotocols(&HeaderMap::new()).is_empty());
    }
}
