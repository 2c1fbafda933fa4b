//! JSON-RPC server over Unix socket.
//!
//! Listens on a Unix domain socket, accepts connections, and dispatches
//! newline-delimited JSON-RPC calls to the report query handlers.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};

use crate::commands::{reports, status};
use crate::DaemonState;

const JSONRPC_VERSION: &str = "2.0";

/// A single JSON-RPC 2.0 call, one per line on the socket.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    fn from_result(id: Value, result: Result<Value, RpcError>) -> Self {
        let (result, error) = match result {
            Ok(value) => (Some(value), None),
            Err(err) => (None, Some(err)),
        };
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result,
            error,
        }
    }
}

/// Error member of a failed response.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
    pub const REPORT_NOT_FOUND: i32 = -32004;

    fn new(code: i32, message: &str, data: Option<Value>) -> Self {
        Self {
            code,
            message: message.to_string(),
            data,
        }
    }

    pub fn parse_error() -> Self {
        Self::new(Self::PARSE_ERROR, "PARSE_ERROR", None)
    }

    pub fn invalid_request() -> Self {
        Self::new(Self::INVALID_REQUEST, "INVALID_REQUEST", None)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            Self::METHOD_NOT_FOUND,
            "METHOD_NOT_FOUND",
            Some(json!({ "method": method })),
        )
    }

    pub fn invalid_params(detail: &str) -> Self {
        Self::new(
            Self::INVALID_PARAMS,
            "INVALID_PARAMS",
            Some(json!({ "detail": detail })),
        )
    }

    pub fn internal_error(detail: &str) -> Self {
        Self::new(
            Self::INTERNAL_ERROR,
            "INTERNAL_ERROR",
            Some(json!({ "detail": detail })),
        )
    }

    /// No report with this id has been written.
    pub fn report_not_found(report_id: i64) -> Self {
        Self::new(
            Self::REPORT_NOT_FOUND,
            "REPORT_NOT_FOUND",
            Some(json!({ "report_id": report_id })),
        )
    }
}

/// Serves report queries on a Unix socket until the task is dropped.
pub struct RpcServer {
    state: Arc<DaemonState>,
    socket_path: PathBuf,
}

impl RpcServer {
    pub fn new(state: Arc<DaemonState>, socket_path: PathBuf) -> Self {
        Self { state, socket_path }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        // a socket left behind by an unclean exit blocks bind
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        info!(socket = ?self.socket_path, "report query server listening");

        loop {
            let stream = match listener.accept().await {
                Ok((stream, _)) => stream,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                if let Err(e) = serve_connection(state, stream).await {
                    warn!(error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// Answer requests line by line until the peer hangs up.
async fn serve_connection(state: Arc<DaemonState>, stream: UnixStream) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) => dispatch_request(&state, request).await,
            Err(_) => RpcResponse::from_result(Value::Null, Err(RpcError::parse_error())),
        };

        let mut encoded = serde_json::to_vec(&response)?;
        encoded.push(b'\n');
        writer.write_all(&encoded).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Route a request to its handler.
pub async fn dispatch_request(state: &Arc<DaemonState>, request: RpcRequest) -> RpcResponse {
    if request.jsonrpc != JSONRPC_VERSION {
        return RpcResponse::from_result(request.id, Err(RpcError::invalid_request()));
    }

    debug!(method = %request.method, "rpc call");

    let params = &request.params;
    let result = match request.method.as_str() {
        "get_report" => reports::get_report(state, params).await,
        "get_latest_report" => reports::get_latest_report(state).await,
        "list_reports" => reports::list_reports(state, params).await,
        "list_failed_chunks" => reports::list_failed_chunks(state, params).await,
        "list_possibly_unrewarded" => reports::list_possibly_unrewarded(state, params).await,
        "get_epoch_status" => status::get_epoch_status(state).await,
        other => Err(RpcError::method_not_found(other)),
    };

    RpcResponse::from_result(request.id, result)
}
