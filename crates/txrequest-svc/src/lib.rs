//! TxRequest Service
//!
//! Development Coordination Service: hosts TxRequests and their
//! signature-share logs for parties running a signing session.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tss_core::sign::{SignatureShareSubmission, TxRequestList};
use tss_core::{SignatureShareRecord, TxRequest, UnsignedTx};
use txrequest_store::{StoreError, TxRequestStore};

/// Application state
pub struct AppState {
    pub store: TxRequestStore,
}

/// Body of `POST /wallet/{walletId}/txrequests`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTxRequest {
    pub unsigned_txs: Vec<UnsignedTx>,
}

/// Query of `GET /wallet/{walletId}/txrequests`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    /// One id, or several separated by commas. `latest` is accepted and
    /// ignored: a TxRequest only ever has its current version.
    tx_request_ids: String,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn error_response(e: StoreError) -> ApiError {
    let status = match e {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::InvalidFormat(_) => StatusCode::BAD_REQUEST,
        StoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({ "error": e.to_string() })))
}

/// Build the service router over `store`
pub fn router(store: TxRequestStore) -> Router {
    let state = Arc::new(AppState { store });

    Router::new()
        .route("/health", get(health))
        .route(
            "/wallet/:wallet_id/txrequests",
            post(create_tx_request).get(list_tx_requests),
        )
        .route(
            "/wallet/:wallet_id/txrequests/:tx_request_id/signatureshares",
            post(append_signature_share),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Sweep expired TxRequests every `period`
pub fn spawn_cleanup(store: TxRequestStore, period: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            store.cleanup();
        }
    })
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "txrequest-svc",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Open a TxRequest for a wallet
async fn create_tx_request(
    State(state): State<Arc<AppState>>,
    Path(wallet_id): Path<String>,
    Json(req): Json<CreateTxRequest>,
) -> Result<Json<TxRequest>, ApiError> {
    let tx_request = state
        .store
        .create(&wallet_id, req.unsigned_txs)
        .map_err(error_response)?;

    info!(
        wallet_id = %wallet_id,
        tx_request_id = %tx_request.tx_request_id,
        "TxRequest created"
    );
    Ok(Json(tx_request))
}

/// Append to a TxRequest's signature-share log
async fn append_signature_share(
    State(state): State<Arc<AppState>>,
    Path((wallet_id, tx_request_id)): Path<(String, String)>,
    Json(req): Json<SignatureShareSubmission>,
) -> Result<Json<SignatureShareRecord>, ApiError> {
    let from = req.signature_share.from;
    let to = req.signature_share.to;

    let stored = state
        .store
        .append_signature_share(
            &wallet_id,
            &tx_request_id,
            req.signature_share,
            req.signer_share,
        )
        .map_err(|e| {
            warn!(tx_request_id = %tx_request_id, error = %e, "Signature share rejected");
            error_response(e)
        })?;

    info!(
        wallet_id = %wallet_id,
        tx_request_id = %tx_request_id,
        from = %from,
        to = %to,
        "Signature share stored"
    );
    Ok(Json(stored))
}

/// Fetch TxRequests by id; unknown ids yield an empty list
async fn list_tx_requests(
    State(state): State<Arc<AppState>>,
    Path(wallet_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Json<TxRequestList> {
    let ids: Vec<&str> = query
        .tx_request_ids
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .collect();

    Json(TxRequestList {
        tx_requests: state.store.list(&wallet_id, &ids),
    })
}
