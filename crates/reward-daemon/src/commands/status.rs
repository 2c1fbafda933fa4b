//! Daemon and epoch status handlers.

use std::sync::Arc;
use std::time::Duration;

use reward_engine::scheduler::{current_epoch, time_until_next_epoch};
use serde_json::Value;

use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Current reward epoch, time to the next boundary and the latest report.
pub async fn get_epoch_status(state: &Arc<DaemonState>) -> Result {
    let rewarding = &state.config.rewarding;
    let epoch_length = Duration::from_secs(rewarding.epoch_length_secs);

    let latest = {
        let db = state.db.lock().await;
        reward_db::queries::reports::latest_report(&db)
            .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?
    };

    let uptime_secs = state.started_at.elapsed().unwrap_or_default().as_secs();

    Ok(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": uptime_secs,
        "current_epoch": current_epoch(epoch_length),
        "epoch_length_secs": rewarding.epoch_length_secs,
        "seconds_until_next_epoch": time_until_next_epoch(epoch_length).as_secs(),
        "mixnet_contract_address": state.config.chain.mixnet_contract_address,
        "max_batch_size": rewarding.max_batch_size,
        "max_in_flight": rewarding.max_in_flight,
        "latest_report_id": latest.as_ref().map(|r| r.id),
        "latest_report_timestamp": latest.as_ref().map(|r| r.timestamp),
    }))
}
