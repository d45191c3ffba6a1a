//! # REST + JSON-RPC API
//!
//! Builds the axum router for the devnet host. All endpoints share the
//! [`AppState`] through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                       | Description                          |
//! |--------|----------------------------|--------------------------------------|
//! | GET    | `/health`                  | Liveness check                       |
//! | GET    | `/status`                  | Clock, event log head, pause flags   |
//! | GET    | `/vault`                   | Vault accounting summary             |
//! | GET    | `/requests/:id`            | Withdrawal ticket by id              |
//! | GET    | `/owners/:address/requests`| Live tickets held by an address      |
//! | GET    | `/events`                  | Audit event log (`?from=&limit=`)    |
//! | GET    | `/ws`                      | WebSocket feed of new audit events   |
//! | POST   | `/rpc`                     | JSON-RPC 2.0 gateway                 |
//!
//! ## RPC methods
//!
//! Params are always a named object. `caller` is taken on trust: the
//! devnet has no signatures.
//!
//! `base_mint`, `vault_deposit`, `vault_requestRedeem`, `vault_totalAssets`,
//! `vault_convertFromBase`, `vault_transferInRewards`, `oracle_setPrice`,
//! `queue_lock`, `queue_unlock`, `queue_process`, `queue_claim`,
//! `time_advance`.
//!
//! Methods with nothing to return answer `true`, never `null`, so a
//! success always carries a `result` member.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use yieldvault_contracts::{VaultError, WithdrawalRequest};
use yieldvault_protocol::events::LoggedEvent;
use yieldvault_protocol::Address;

use crate::devnet::Devnet;
use crate::metrics::SharedMetrics;

/// Largest page `/events` returns.
const MAX_EVENTS_PAGE: usize = 500;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub version: String,
    pub devnet: Arc<RwLock<Devnet>>,
    /// Newly committed audit events, pushed to WebSocket subscribers.
    pub event_tx: broadcast::Sender<LoggedEvent>,
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/vault", get(vault_handler))
        .route("/requests/:id", get(request_handler))
        .route("/owners/:address/requests", get(owner_requests_handler))
        .route("/events", get(events_handler))
        .route("/ws", get(ws_handler))
        .route("/rpc", post(rpc_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// JSON-RPC Types
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request envelope.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Option<serde_json::Value>,
    pub id: serde_json::Value,
}

/// A JSON-RPC 2.0 response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: serde_json::Value,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Error codes. Ledger rejections get one code per failure class.
pub mod codes {
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
    pub const PRECONDITION_VIOLATION: i32 = -32010;
    pub const AUTHORIZATION_FAILURE: i32 = -32011;
    pub const STATE_CONFLICT: i32 = -32012;
    pub const ECONOMIC_VALIDATION_FAILURE: i32 = -32013;
    pub const EXTERNAL_DEPENDENCY_FAILURE: i32 = -32014;
}

impl JsonRpcError {
    fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: codes::INVALID_PARAMS,
            message: message.into(),
            data: None,
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            code: codes::INTERNAL_ERROR,
            message: message.into(),
            data: None,
        }
    }
}

impl From<VaultError> for JsonRpcError {
    fn from(err: VaultError) -> Self {
        use yieldvault_contracts::ErrorKind;

        let kind = err.kind();
        let code = match kind {
            ErrorKind::PreconditionViolation => codes::PRECONDITION_VIOLATION,
            ErrorKind::AuthorizationFailure => codes::AUTHORIZATION_FAILURE,
            ErrorKind::StateConflict => codes::STATE_CONFLICT,
            ErrorKind::EconomicValidationFailure => codes::ECONOMIC_VALIDATION_FAILURE,
            ErrorKind::ExternalDependencyFailure => codes::EXTERNAL_DEPENDENCY_FAILURE,
        };
        Self {
            code,
            message: err.to_string(),
            data: Some(serde_json::json!({ "kind": kind.to_string() })),
        }
    }
}

// -- Params ------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct MintParams {
    caller: Address,
    to: Address,
    amount: u128,
}

#[derive(Debug, Deserialize)]
struct DepositParams {
    caller: Address,
    assets: u128,
    receiver: Option<Address>,
}

#[derive(Debug, Deserialize)]
struct RequestRedeemParams {
    caller: Address,
    shares: u128,
    #[serde(default)]
    min_base_received: u128,
}

#[derive(Debug, Deserialize)]
struct ConvertParams {
    caller: Address,
    amount: u128,
    execution_price: u128,
}

#[derive(Debug, Deserialize)]
struct RewardsParams {
    caller: Address,
    amount: u128,
}

#[derive(Debug, Deserialize)]
struct SetPriceParams {
    answer: u128,
}

#[derive(Debug, Deserialize)]
struct BatchParams {
    caller: Address,
    request_ids: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct ProcessParams {
    caller: Address,
    request_ids: Vec<u64>,
    total_proceeds: u128,
    total_yield_sold: u128,
    execution_price: u128,
}

#[derive(Debug, Deserialize)]
struct ClaimParams {
    caller: Address,
    request_id: u64,
}

#[derive(Debug, Deserialize)]
struct AdvanceParams {
    secs: u64,
}

fn parse<T: DeserializeOwned>(params: Option<serde_json::Value>) -> Result<T, JsonRpcError> {
    let value = params.unwrap_or(serde_json::Value::Null);
    serde_json::from_value(value).map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {e}")))
}

fn to_result<T: Serialize>(value: T) -> Result<serde_json::Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::internal(format!("Internal error: {e}")))
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub network: String,
    /// Ledger clock, unix seconds.
    pub now: u64,
    pub event_count: usize,
    pub event_head: String,
    pub vault_paused: bool,
    pub queue_paused: bool,
    pub pending_requests: u64,
    /// Wall-clock time of the response, RFC 3339.
    pub timestamp: String,
}

/// Response payload for `GET /vault`.
#[derive(Debug, Serialize, Deserialize)]
pub struct VaultResponse {
    pub address: Address,
    /// `None` when the price feed cannot be read.
    pub total_assets: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oracle_error: Option<String>,
    pub total_supply: u128,
    pub tracked_base: u128,
    pub tracked_yield: u128,
    pub unvested: u128,
    pub vested_yield: u128,
    pub deposit_fee_bps: u16,
    pub tolerance_bps: u16,
    pub vesting_period_secs: u64,
    pub paused: bool,
}

/// Response payload for `GET /owners/:address/requests`.
#[derive(Debug, Serialize, Deserialize)]
pub struct OwnerRequestsResponse {
    pub owner: Address,
    pub requests: Vec<WithdrawalRequest>,
    pub claimable: u128,
}

/// Generic error body for REST endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub from: Option<usize>,
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: 200 while the process is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status`
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let devnet = state.devnet.read().await;
    let system = &devnet.system;
    Json(StatusResponse {
        version: state.version.clone(),
        network: devnet.network.clone(),
        now: devnet.now(),
        event_count: system.events().len(),
        event_head: system.events().head_hash(),
        vault_paused: system.vault().is_paused(),
        queue_paused: system.queue().is_paused(),
        pending_requests: system.queue().pending_count(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// `GET /vault`
async fn vault_handler(State(state): State<AppState>) -> impl IntoResponse {
    let devnet = state.devnet.read().await;
    let system = &devnet.system;
    let vault = system.vault();
    let (total_assets, oracle_error) = match system.total_assets() {
        Ok(total) => (Some(total), None),
        Err(e) => (None, Some(e.to_string())),
    };
    Json(VaultResponse {
        address: vault.address().clone(),
        total_assets,
        oracle_error,
        total_supply: vault.total_supply(),
        tracked_base: vault.tracked_base(),
        tracked_yield: vault.tracked_yield(),
        unvested: system.unvested_amount(),
        vested_yield: system.vested_yield_balance(),
        deposit_fee_bps: vault.deposit_fee_bps(),
        tolerance_bps: vault.tolerance_bps(),
        vesting_period_secs: vault.vesting_period(),
        paused: vault.is_paused(),
    })
}

/// `GET /requests/:id`
async fn request_handler(State(state): State<AppState>, Path(id): Path<u64>) -> impl IntoResponse {
    let devnet = state.devnet.read().await;
    match devnet.system.queue().request(id) {
        Some(request) => (StatusCode::OK, Json(request.clone())).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Request {id} not found"),
            }),
        )
            .into_response(),
    }
}

/// `GET /owners/:address/requests`: live tickets only; claimed and seized
/// tickets have no owner.
async fn owner_requests_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> impl IntoResponse {
    let owner = Address::new(address);
    let devnet = state.devnet.read().await;
    let queue = devnet.system.queue();
    let requests = queue
        .tickets_of(&owner)
        .into_iter()
        .filter_map(|id| queue.request(id).cloned())
        .collect();
    Json(OwnerRequestsResponse {
        claimable: queue.claimable_amount(&owner),
        owner,
        requests,
    })
}

/// `GET /events?from=&limit=`
async fn events_handler(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> impl IntoResponse {
    let devnet = state.devnet.read().await;
    let entries = devnet.system.events().entries();
    let from = query.from.unwrap_or(0).min(entries.len());
    let limit = query.limit.unwrap_or(MAX_EVENTS_PAGE).min(MAX_EVENTS_PAGE);
    let page: Vec<LoggedEvent> = entries[from..].iter().take(limit).cloned().collect();
    Json(page)
}

/// `POST /rpc`: JSON-RPC 2.0 gateway. Unknown methods return -32601.
async fn rpc_handler(
    State(state): State<AppState>,
    Json(req): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    if req.jsonrpc != "2.0" {
        return Json(JsonRpcResponse {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(JsonRpcError {
                code: codes::INVALID_REQUEST,
                message: "Invalid Request: jsonrpc must be \"2.0\"".into(),
                data: None,
            }),
            id: req.id,
        });
    }

    let started = Instant::now();
    state
        .metrics
        .rpc_calls_total
        .with_label_values(&[req.method.as_str()])
        .inc();

    let mut devnet = state.devnet.write().await;
    let seen = devnet.system.events().len();
    let outcome = dispatch(&mut devnet, &state, &req.method, req.params);

    for event in &devnet.system.events().entries()[seen..] {
        // No subscribers is not an error.
        let _ = state.event_tx.send(event.clone());
    }
    state.metrics.observe(&devnet.system);
    drop(devnet);
    state
        .metrics
        .rpc_latency_seconds
        .observe(started.elapsed().as_secs_f64());

    let (result, error) = match outcome {
        Ok(value) => (Some(value), None),
        Err(err) => {
            let label = err
                .data
                .as_ref()
                .and_then(|d| d.get("kind"))
                .and_then(|k| k.as_str())
                .unwrap_or("request")
                .to_string();
            state.metrics.rpc_failures_total.with_label_values(&[label.as_str()]).inc();
            tracing::debug!(method = %req.method, code = err.code, error = %err.message, "rpc call failed");
            (None, Some(err))
        }
    };

    Json(JsonRpcResponse {
        jsonrpc: "2.0".into(),
        result,
        error,
        id: req.id,
    })
}

fn dispatch(
    devnet: &mut Devnet,
    state: &AppState,
    method: &str,
    params: Option<serde_json::Value>,
) -> Result<serde_json::Value, JsonRpcError> {
    match method {
        "base_mint" => {
            let p: MintParams = parse(params)?;
            devnet.system.mint_base(&p.caller, &p.to, p.amount)?;
            Ok(serde_json::Value::Bool(true))
        }
        "vault_deposit" => {
            let p: DepositParams = parse(params)?;
            let receiver = p.receiver.unwrap_or_else(|| p.caller.clone());
            to_result(devnet.system.deposit(&p.caller, p.assets, &receiver)?)
        }
        "vault_requestRedeem" => {
            let p: RequestRedeemParams = parse(params)?;
            to_result(devnet.system.request_redeem(&p.caller, p.shares, p.min_base_received)?)
        }
        "vault_totalAssets" => to_result(devnet.system.total_assets()?),
        "vault_convertFromBase" => {
            let p: ConvertParams = parse(params)?;
            to_result(devnet.system.convert_from_base(&p.caller, p.amount, p.execution_price)?)
        }
        "vault_transferInRewards" => {
            let p: RewardsParams = parse(params)?;
            devnet.system.transfer_in_rewards(&p.caller, p.amount)?;
            Ok(serde_json::Value::Bool(true))
        }
        "oracle_setPrice" => {
            let p: SetPriceParams = parse(params)?;
            devnet
                .set_price(p.answer)
                .map_err(|e| JsonRpcError::invalid_params(e.to_string()))?;
            Ok(serde_json::Value::Bool(true))
        }
        "queue_lock" => {
            let p: BatchParams = parse(params)?;
            devnet.system.lock_requests(&p.caller, &p.request_ids)?;
            Ok(serde_json::Value::Bool(true))
        }
        "queue_unlock" => {
            let p: BatchParams = parse(params)?;
            devnet.system.unlock_requests(&p.caller, &p.request_ids)?;
            Ok(serde_json::Value::Bool(true))
        }
        "queue_process" => {
            let p: ProcessParams = parse(params)?;
            let report = devnet.system.process_requests(
                &p.caller,
                &p.request_ids,
                p.total_proceeds,
                p.total_yield_sold,
                p.execution_price,
            )?;
            state
                .metrics
                .requests_processed_total
                .inc_by(report.request_ids.len() as u64);
            to_result(report)
        }
        "queue_claim" => {
            let p: ClaimParams = parse(params)?;
            to_result(devnet.system.claim(&p.caller, p.request_id)?)
        }
        "time_advance" => {
            let p: AdvanceParams = parse(params)?;
            to_result(devnet.advance(p.secs))
        }
        _ => Err(JsonRpcError {
            code: codes::METHOD_NOT_FOUND,
            message: format!("Method not found: {method}"),
            data: None,
        }),
    }
}

/// `GET /ws`: pushes each newly committed [`LoggedEvent`] as JSON. Client
/// messages are ignored.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

async fn handle_ws_connection(mut socket: WebSocket, state: AppState) {
    let mut rx = state.event_tx.subscribe();

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(ev) => {
                        let payload = match serde_json::to_string(&ev) {
                            Ok(s) => s,
                            Err(e) => {
                                tracing::warn!(error = %e, "failed to serialize ws event");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "ws subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }
}
