//! Folding an epoch's batch outcomes into a persisted report.

use std::sync::Arc;

use reward_types::report::{
    BatchTally, NewFailedChunk, NewKindSummary, NewReport, PossiblyUnrewarded, RewardingReport,
};
use tokio::sync::Mutex;
use tracing::info;

use crate::dispatcher::BatchResult;
use crate::Result;

fn summarize(eligible: u64, results: &[BatchResult]) -> NewKindSummary {
    let mut summary = NewKindSummary {
        eligible,
        tally: BatchTally {
            total_batches: results.len() as u64,
            confirmed_batches: 0,
        },
        ..NewKindSummary::default()
    };

    for result in results {
        let Some(message) = result.outcome.error_message() else {
            summary.tally.confirmed_batches += 1;
            continue;
        };

        let members: Vec<PossiblyUnrewarded> = result
            .batch
            .members
            .iter()
            .map(|member| PossiblyUnrewarded {
                identity: member.identity.clone(),
                uptime: member.uptime,
            })
            .collect();

        summary.possibly_unrewarded += members.len() as u64;
        summary.failed_chunks.push(NewFailedChunk {
            error_message: message.to_string(),
            members,
        });
    }

    summary
}

/// Build the report for one epoch without persisting it.
///
/// Every non-confirmed batch becomes a failed chunk listing all of its
/// members; confirmed batches only count towards the tally.
pub fn build_report(
    timestamp: u64,
    eligible_mixnodes: u64,
    eligible_gateways: u64,
    mixnode_results: &[BatchResult],
    gateway_results: &[BatchResult],
) -> NewReport {
    NewReport {
        timestamp,
        mixnodes: summarize(eligible_mixnodes, mixnode_results),
        gateways: summarize(eligible_gateways, gateway_results),
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Writes epoch reports to the rewarding database.
#[derive(Clone)]
pub struct ReconciliationRecorder {
    db: Arc<Mutex<rusqlite::Connection>>,
}

impl ReconciliationRecorder {
    pub fn new(db: Arc<Mutex<rusqlite::Connection>>) -> Self {
        Self { db }
    }

    /// Persist the report for a completed epoch, all or nothing.
    pub async fn record(
        &self,
        eligible_mixnodes: u64,
        eligible_gateways: u64,
        mixnode_results: &[BatchResult],
        gateway_results: &[BatchResult],
    ) -> Result<RewardingReport> {
        let report = build_report(
            unix_now(),
            eligible_mixnodes,
            eligible_gateways,
            mixnode_results,
            gateway_results,
        );

        let mut db = self.db.lock().await;
        let saved = reward_db::queries::reports::save(&mut db, &report)?;

        info!(
            report_id = saved.id,
            eligible_mixnodes = saved.eligible_mixnodes,
            eligible_gateways = saved.eligible_gateways,
            possibly_unrewarded_mixnodes = saved.possibly_unrewarded_mixnodes,
            possibly_unrewarded_gateways = saved.possibly_unrewarded_gateways,
            "rewarding report recorded"
        );

        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::{chunk, Batch};
    use reward_db::queries::reports;
    use reward_types::{BatchOutcome, ParticipantKind, ParticipantRecord, Uptime};

    fn batches(prefix: &str, count: usize, size: usize) -> Vec<Batch> {
        let nodes = (0..count)
            .map(|i| {
                ParticipantRecord::new(
                    format!("{prefix}-{i:02}"),
                    Uptime::try_from((50 + i) as u8).expect("uptime"),
                )
            })
            .collect();
        chunk(nodes, size).expect("chunk")
    }

    fn results(
        kind: ParticipantKind,
        batches: Vec<Batch>,
        outcome_for: impl Fn(usize) -> BatchOutcome,
    ) -> Vec<BatchResult> {
        batches
            .into_iter()
            .map(|batch| BatchResult {
                kind,
                outcome: outcome_for(batch.index),
                batch,
            })
            .collect()
    }

    #[test]
    fn test_all_confirmed() {
        let mix = results(ParticipantKind::Mixnode, batches("mix", 10, 3), |_| {
            BatchOutcome::Confirmed
        });
        let report = build_report(1, 10, 0, &mix, &[]);

        assert_eq!(report.mixnodes.eligible, 10);
        assert_eq!(report.mixnodes.possibly_unrewarded, 0);
        assert!(report.mixnodes.failed_chunks.is_empty());
        assert_eq!(report.mixnodes.tally.total_batches, 4);
        assert_eq!(report.mixnodes.tally.confirmed_batches, 4);
        assert_eq!(report.gateways.tally, BatchTally::default());
    }

    #[test]
    fn test_failed_and_timed_out_count_alike() {
        let mix = results(ParticipantKind::Mixnode, batches("mix", 10, 3), |i| match i {
            1 => BatchOutcome::TimedOut("timed out".into()),
            3 => BatchOutcome::Failed("rejected".into()),
            _ => BatchOutcome::Confirmed,
        });
        let report = build_report(1, 10, 0, &mix, &[]);

        assert_eq!(report.mixnodes.possibly_unrewarded, 4);
        assert_eq!(report.mixnodes.member_rows(), 4);
        assert_eq!(report.mixnodes.failed_chunks.len(), 2);
        assert_eq!(report.mixnodes.failed_chunks[0].error_message, "timed out");
        assert_eq!(report.mixnodes.failed_chunks[1].error_message, "rejected");

        let identities: Vec<&str> = report.mixnodes.failed_chunks[0]
            .members
            .iter()
            .map(|m| m.identity.as_str())
            .collect();
        assert_eq!(identities, vec!["mix-03", "mix-04", "mix-05"]);
        assert_eq!(report.mixnodes.failed_chunks[0].members[0].uptime.u8(), 53);
    }

    #[tokio::test]
    async fn test_record_persists_report() {
        let conn = reward_db::open_memory().expect("db");
        let db = Arc::new(Mutex::new(conn));
        let recorder = ReconciliationRecorder::new(db.clone());

        let gw = results(ParticipantKind::Gateway, batches("gw", 4, 2), |i| {
            if i == 0 {
                BatchOutcome::Failed("account sequence mismatch".into())
            } else {
                BatchOutcome::Confirmed
            }
        });
        let saved = recorder.record(0, 4, &[], &gw).await.expect("record");
        assert_eq!(saved.possibly_unrewarded_gateways, 2);
        assert!(saved.timestamp > 0);

        let conn = db.lock().await;
        let rows = reports::list_possibly_unrewarded(&conn, saved.id, ParticipantKind::Gateway)
            .expect("rows");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].identity, "gw-00");
        let tally = reports::batch_tally(&conn, saved.id, ParticipantKind::Mixnode).expect("tally");
        assert_eq!(tally.total_batches, 0);
    }
}
