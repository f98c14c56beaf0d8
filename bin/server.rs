// Finance Ledger - Web Server
// JSON API over the ledger store

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use finance_ledger::{init_logging, Kind, LedgerConfig, LedgerError, LedgerStore, Movement, Totals};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

/// Shared application state.
/// The mutex keeps store calls one at a time (single writer).
#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<LedgerStore>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// POST /api/movements body
#[derive(Deserialize)]
struct NewMovementRequest {
    kind: Kind,
    description: String,
    amount: f64,
}

#[derive(Serialize)]
struct CreatedResponse {
    id: i64,
}

#[derive(Serialize)]
struct DeletedResponse {
    removed: bool,
}

/// Map a store failure to a status code: 400 for bad input, 500 otherwise
fn error_response(context: &str, err: LedgerError) -> Response {
    let status = if err.is_validation() {
        StatusCode::BAD_REQUEST
    } else {
        error!(error = %err, "{}", context);
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(ApiResponse::<()>::err(err.to_string()))).into_response()
}

fn with_store<T>(state: &AppState, op: impl FnOnce(&LedgerStore) -> Result<T, LedgerError>) -> Result<T, LedgerError> {
    let store = state
        .store
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    op(&store)
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/movements - Every movement in insertion order
async fn list_movements(State(state): State<AppState>) -> Response {
    match with_store(&state, |store| store.list_all()) {
        Ok(movements) => (StatusCode::OK, Json(ApiResponse::<Vec<Movement>>::ok(movements))).into_response(),
        Err(e) => error_response("Error listing movements", e),
    }
}

/// POST /api/movements - Record a movement
async fn create_movement(
    State(state): State<AppState>,
    Json(body): Json<NewMovementRequest>,
) -> Response {
    match with_store(&state, |store| store.append(body.kind, &body.description, body.amount)) {
        Ok(id) => (StatusCode::CREATED, Json(ApiResponse::ok(CreatedResponse { id }))).into_response(),
        Err(e) => error_response("Error saving movement", e),
    }
}

/// GET /api/movements/:id - One movement
async fn get_movement(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match with_store(&state, |store| store.get(id)) {
        Ok(Some(movement)) => (StatusCode::OK, Json(ApiResponse::ok(movement))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::err(format!("movement {} not found", id))),
        )
            .into_response(),
        Err(e) => error_response("Error loading movement", e),
    }
}

/// DELETE /api/movements/:id - Remove a movement; absent ids report removed=false
async fn delete_movement(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match with_store(&state, |store| store.delete(id)) {
        Ok(removed) => (StatusCode::OK, Json(ApiResponse::ok(DeletedResponse { removed }))).into_response(),
        Err(e) => error_response("Error deleting movement", e),
    }
}

/// GET /api/totals - Income, expense and balance
async fn get_totals(State(state): State<AppState>) -> Response {
    match with_store(&state, |store| store.totals()) {
        Ok(totals) => (StatusCode::OK, Json(ApiResponse::<Totals>::ok(totals))).into_response(),
        Err(e) => error_response("Error computing totals", e),
    }
}

fn app(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/movements", get(list_movements).post(create_movement))
        .route("/movements/:id", get(get_movement).delete(delete_movement))
        .route("/totals", get(get_totals))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = LedgerConfig::from_env();
    init_logging(&config.log_filter);

    let store = LedgerStore::open(config.db_path.clone())?;
    info!(path = %config.db_path.display(), "ledger opened");

    let state = AppState {
        store: Arc::new(Mutex::new(store)),
    };

    let listener = tokio::net::TcpListener::bind(&config.server_addr).await?;

    println!("🚀 Ledger API running on http://{}", config.server_addr);
    println!("   API: http://{}/api/movements", config.server_addr);
    println!("   Press Ctrl+C to stop");

    axum::serve(listener, app(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn router_for(store: LedgerStore) -> Router {
        app(AppState {
            store: Arc::new(Mutex::new(store)),
        })
    }

    fn test_router() -> (TempDir, Router) {
        let dir = TempDir::new().unwrap();
        let store = LedgerStore::open(dir.path().join("ledger.db")).unwrap();
        (dir, router_for(store))
    }

    async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_create_returns_201_with_id() {
        let (_dir, router) = test_router();

        let (status, body) = send(
            &router,
            "POST",
            "/api/movements",
            Some(json!({"kind": "Income", "description": "Salary", "amount": 1000.0})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["data"]["id"], json!(1));

        let (status, body) = send(&router, "GET", "/api/movements/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["description"], json!("Salary"));

        let (_, body) = send(&router, "GET", "/api/totals", None).await;
        assert_eq!(body["data"], json!({"income": 1000.0, "expense": 0.0, "balance": 1000.0}));
    }

    #[tokio::test]
    async fn test_rejected_input_is_400() {
        let (_dir, router) = test_router();

        for payload in [
            json!({"kind": "Expense", "description": "   ", "amount": 5.0}),
            json!({"kind": "Expense", "description": "Rent", "amount": -400.0}),
        ] {
            let (status, body) = send(&router, "POST", "/api/movements", Some(payload)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["success"], json!(false));
            assert!(body["error"].is_string());
        }

        let (_, body) = send(&router, "GET", "/api/movements", None).await;
        assert_eq!(body["data"], json!([]));
    }

    #[tokio::test]
    async fn test_missing_movement_is_404() {
        let (_dir, router) = test_router();

        let (status, body) = send(&router, "GET", "/api/movements/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], json!(false));
    }

    #[tokio::test]
    async fn test_delete_reports_removed_flag() {
        let (_dir, router) = test_router();
        send(
            &router,
            "POST",
            "/api/movements",
            Some(json!({"kind": "Expense", "description": "Rent", "amount": 400.0})),
        )
        .await;

        let (status, body) = send(&router, "DELETE", "/api/movements/42", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["removed"], json!(false));

        let (status, body) = send(&router, "DELETE", "/api/movements/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["removed"], json!(true));

        let (status, _) = send(&router, "GET", "/api/movements/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_storage_failure_is_500() {
        let dir = TempDir::new().unwrap();
        let router = router_for(LedgerStore::new(dir.path().join("missing").join("ledger.db")));

        let (status, body) = send(&router, "GET", "/api/totals", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], json!(false));

        let (status, _) = send(
            &router,
            "POST",
            "/api/movements",
            Some(json!({"kind": "Income", "description": "Salary", "amount": 1.0})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_health() {
        let (_dir, router) = test_router();
        let (status, body) = send(&router, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!("OK"));
    }
}
