//! Rewarding report query handlers.

use std::str::FromStr;
use std::sync::Arc;

use reward_db::queries::reports;
use reward_db::DbError;
use reward_types::ParticipantKind;
use serde_json::Value;

use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

const DEFAULT_LIST_LIMIT: u32 = 50;
const MAX_LIST_LIMIT: u32 = 1000;

fn db_error(e: DbError) -> RpcError {
    RpcError::internal_error(&format!("db error: {e}"))
}

/// Look the report up first so a bad id is told apart from an empty result.
fn require_report(conn: &rusqlite::Connection, report_id: i64) -> std::result::Result<(), RpcError> {
    match reports::get_report(conn, report_id) {
        Ok(_) => Ok(()),
        Err(DbError::NotFound(_)) => Err(RpcError::report_not_found(report_id)),
        Err(e) => Err(db_error(e)),
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result {
    serde_json::to_value(value).map_err(|e| RpcError::internal_error(&e.to_string()))
}

fn report_id_param(params: &Value, field: &str) -> std::result::Result<i64, RpcError> {
    params
        .get(field)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| RpcError::invalid_params(&format!("{field} required")))
}

fn kind_param(params: &Value) -> std::result::Result<ParticipantKind, RpcError> {
    let kind = params
        .get("kind")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::invalid_params("kind required"))?;
    ParticipantKind::from_str(kind).map_err(|e| RpcError::invalid_params(&e.to_string()))
}

/// Get a single report by id.
pub async fn get_report(state: &Arc<DaemonState>, params: &Value) -> Result {
    let id = report_id_param(params, "id")?;
    let db = state.db.lock().await;
    let report = reports::get_report(&db, id).map_err(|e| match e {
        DbError::NotFound(_) => RpcError::report_not_found(id),
        other => db_error(other),
    })?;
    to_value(&report)
}

/// Get the most recent report, or null when none has been written.
pub async fn get_latest_report(state: &Arc<DaemonState>) -> Result {
    let db = state.db.lock().await;
    let report = reports::latest_report(&db).map_err(db_error)?;
    to_value(&report)
}

/// List reports, newest first.
pub async fn list_reports(state: &Arc<DaemonState>, params: &Value) -> Result {
    let limit = params
        .get("limit")
        .and_then(|v| v.as_u64())
        .map(|l| l.min(u64::from(MAX_LIST_LIMIT)) as u32)
        .unwrap_or(DEFAULT_LIST_LIMIT);

    let db = state.db.lock().await;
    let rows = reports::list_reports(&db, limit).map_err(db_error)?;
    to_value(&rows)
}

/// List the failed chunks of one kind in a report, with the batch tally.
pub async fn list_failed_chunks(state: &Arc<DaemonState>, params: &Value) -> Result {
    let report_id = report_id_param(params, "report_id")?;
    let kind = kind_param(params)?;

    let db = state.db.lock().await;
    require_report(&db, report_id)?;

    let chunks = reports::failed_chunks(&db, report_id, kind).map_err(db_error)?;
    let tally = reports::batch_tally(&db, report_id, kind).map_err(db_error)?;

    Ok(serde_json::json!({
        "report_id": report_id,
        "kind": kind,
        "total_batches": tally.total_batches,
        "confirmed_batches": tally.confirmed_batches,
        "chunks": to_value(&chunks)?,
    }))
}

/// List every possibly-unrewarded participant of one kind in a report.
pub async fn list_possibly_unrewarded(state: &Arc<DaemonState>, params: &Value) -> Result {
    let report_id = report_id_param(params, "report_id")?;
    let kind = kind_param(params)?;

    let db = state.db.lock().await;
    require_report(&db, report_id)?;

    let entries = reports::list_possibly_unrewarded(&db, report_id, kind).map_err(db_error)?;
    to_value(&entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_state;
    use reward_types::report::{NewFailedChunk, NewReport, PossiblyUnrewarded};
    use reward_types::Uptime;

    async fn seed(state: &Arc<DaemonState>) -> i64 {
        let mut report = NewReport {
            timestamp: 1_700_000_000,
            ..Default::default()
        };
        report.mixnodes.eligible = 5;
        report.mixnodes.possibly_unrewarded = 2;
        report.mixnodes.tally.total_batches = 3;
        report.mixnodes.tally.confirmed_batches = 2;
        report.mixnodes.failed_chunks.push(NewFailedChunk {
            error_message: "out of gas".to_string(),
            members: vec![
                PossiblyUnrewarded {
                    identity: "mix-a".to_string(),
                    uptime: Uptime::try_from(90u8).expect("uptime"),
                },
                PossiblyUnrewarded {
                    identity: "mix-b".to_string(),
                    uptime: Uptime::try_from(40u8).expect("uptime"),
                },
            ],
        });
        report.gateways.eligible = 1;
        report.gateways.tally.total_batches = 1;
        report.gateways.tally.confirmed_batches = 1;

        let mut db = state.db.lock().await;
        reports::save(&mut db, &report).expect("save").id
    }

    #[tokio::test]
    async fn test_get_report() {
        let state = test_state();
        let id = seed(&state).await;

        let value = get_report(&state, &serde_json::json!({"id": id}))
            .await
            .expect("report");
        assert_eq!(value["eligible_mixnodes"], 5);
        assert_eq!(value["possibly_unrewarded_mixnodes"], 2);
        assert_eq!(value["possibly_unrewarded_gateways"], 0);
    }

    #[tokio::test]
    async fn test_get_missing_report() {
        let state = test_state();
        let err = get_report(&state, &serde_json::json!({"id": 99}))
            .await
            .expect_err("missing");
        assert_eq!(err.code, -32004);

        let err = get_report(&state, &serde_json::json!({}))
            .await
            .expect_err("no id");
        assert_eq!(err.code, -32602);
    }

    #[tokio::test]
    async fn test_latest_report_empty_then_present() {
        let state = test_state();
        let value = get_latest_report(&state).await.expect("latest");
        assert!(value.is_null());

        let id = seed(&state).await;
        let value = get_latest_report(&state).await.expect("latest");
        assert_eq!(value["id"], id);
    }

    #[tokio::test]
    async fn test_list_reports_limit() {
        let state = test_state();
        seed(&state).await;
        seed(&state).await;
        let newest = seed(&state).await;

        let value = list_reports(&state, &serde_json::json!({"limit": 2}))
            .await
            .expect("list");
        let rows = value.as_array().expect("array");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], newest);

        let value = list_reports(&state, &Value::Null).await.expect("list");
        assert_eq!(value.as_array().expect("array").len(), 3);
    }

    #[tokio::test]
    async fn test_list_failed_chunks() {
        let state = test_state();
        let id = seed(&state).await;

        let value = list_failed_chunks(
            &state,
            &serde_json::json!({"report_id": id, "kind": "mixnode"}),
        )
        .await
        .expect("chunks");
        assert_eq!(value["total_batches"], 3);
        assert_eq!(value["confirmed_batches"], 2);
        let chunks = value["chunks"].as_array().expect("array");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0]["error_message"], "out of gas");
        assert_eq!(chunks[0]["members"], 2);

        let value = list_failed_chunks(
            &state,
            &serde_json::json!({"report_id": id, "kind": "gateway"}),
        )
        .await
        .expect("chunks");
        assert!(value["chunks"].as_array().expect("array").is_empty());
    }

    #[tokio::test]
    async fn test_list_possibly_unrewarded() {
        let state = test_state();
        let id = seed(&state).await;

        let value = list_possibly_unrewarded(
            &state,
            &serde_json::json!({"report_id": id, "kind": "mixnode"}),
        )
        .await
        .expect("entries");
        let entries = value.as_array().expect("array");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["identity"], "mix-a");
        assert_eq!(entries[0]["uptime"], 90);
    }

    #[tokio::test]
    async fn test_bad_kind_and_missing_report() {
        let state = test_state();
        let id = seed(&state).await;

        let err = list_possibly_unrewarded(
            &state,
            &serde_json::json!({"report_id": id, "kind": "validator"}),
        )
        .await
        .expect_err("bad kind");
        assert_eq!(err.code, -32602);

        let err = list_failed_chunks(
            &state,
            &serde_json::json!({"report_id": id + 1, "kind": "gateway"}),
        )
        .await
        .expect_err("missing report");
        assert_eq!(err.code, -32004);
    }
}
