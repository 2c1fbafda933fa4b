//! Rewarding report queries.
//!
//! Reports, their failed chunks and possibly-unrewarded members are
//! inserted together by [`save`]; everything else here is read-only.

use reward_types::report::{
    BatchTally, FailedRewardChunk, NewKindSummary, NewReport, PossiblyUnrewarded,
    RewardingReport,
};
use reward_types::{ParticipantKind, Uptime};
use rusqlite::{Connection, OptionalExtension};

use crate::{DbError, Result};

fn chunk_table(kind: ParticipantKind) -> &'static str {
    match kind {
        ParticipantKind::Mixnode => "failed_mixnode_reward_chunk",
        ParticipantKind::Gateway => "failed_gateway_reward_chunk",
    }
}

/// Entity table and the column referencing its chunk table.
fn entity_table(kind: ParticipantKind) -> (&'static str, &'static str) {
    match kind {
        ParticipantKind::Mixnode => (
            "possibly_unrewarded_mixnode",
            "failed_mixnode_reward_chunk_id",
        ),
        ParticipantKind::Gateway => (
            "possibly_unrewarded_gateway",
            "failed_gateway_reward_chunk_id",
        ),
    }
}

/// Reject a report whose aggregates disagree with its nested rows.
fn check_consistency(kind: ParticipantKind, summary: &NewKindSummary) -> Result<()> {
    let rows = summary.member_rows();
    if summary.possibly_unrewarded != rows {
        return Err(DbError::Constraint(format!(
            "{kind}: possibly_unrewarded is {} but {rows} member rows were supplied",
            summary.possibly_unrewarded
        )));
    }
    if summary.failed_chunks.iter().any(|chunk| chunk.members.is_empty()) {
        return Err(DbError::Constraint(format!("{kind}: failed chunk without members")));
    }
    let failed = summary.failed_chunks.len() as u64;
    if summary.tally.confirmed_batches + failed != summary.tally.total_batches {
        return Err(DbError::Constraint(format!(
            "{kind}: {} confirmed + {failed} failed batches != {} total",
            summary.tally.confirmed_batches, summary.tally.total_batches
        )));
    }
    Ok(())
}

/// Persist a report with all of its nested rows in one transaction.
///
/// Either everything becomes visible or nothing does.
pub fn save(conn: &mut Connection, report: &NewReport) -> Result<RewardingReport> {
    for kind in ParticipantKind::ALL {
        check_consistency(kind, report.summary(kind))?;
    }

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO rewarding_report (timestamp, eligible_mixnodes, eligible_gateways,
         possibly_unrewarded_mixnodes, possibly_unrewarded_gateways)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            report.timestamp as i64,
            report.mixnodes.eligible as i64,
            report.gateways.eligible as i64,
            report.mixnodes.possibly_unrewarded as i64,
            report.gateways.possibly_unrewarded as i64,
        ],
    )?;
    let report_id = tx.last_insert_rowid();

    for kind in ParticipantKind::ALL {
        let summary = report.summary(kind);
        tx.execute(
            "INSERT INTO reward_batch_tally
             (reward_summary_id, participant_kind, total_batches, confirmed_batches)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                report_id,
                kind.as_str(),
                summary.tally.total_batches as i64,
                summary.tally.confirmed_batches as i64,
            ],
        )?;

        let (entities, chunk_fk) = entity_table(kind);
        for chunk in &summary.failed_chunks {
            tx.execute(
                &format!(
                    "INSERT INTO {} (error_message, reward_summary_id) VALUES (?1, ?2)",
                    chunk_table(kind)
                ),
                rusqlite::params![chunk.error_message, report_id],
            )?;
            let chunk_id = tx.last_insert_rowid();

            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {entities} (identity, uptime, {chunk_fk}) VALUES (?1, ?2, ?3)"
            ))?;
            for member in &chunk.members {
                stmt.execute(rusqlite::params![member.identity, member.uptime.u8(), chunk_id])?;
            }
        }
    }

    tx.commit()?;

    tracing::debug!(report_id, "rewarding report committed");

    Ok(RewardingReport {
        id: report_id,
        timestamp: report.timestamp,
        eligible_mixnodes: report.mixnodes.eligible,
        eligible_gateways: report.gateways.eligible,
        possibly_unrewarded_mixnodes: report.mixnodes.possibly_unrewarded,
        possibly_unrewarded_gateways: report.gateways.possibly_unrewarded,
    })
}

const REPORT_COLUMNS: &str = "id, timestamp, eligible_mixnodes, eligible_gateways,
     possibly_unrewarded_mixnodes, possibly_unrewarded_gateways";

fn report_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RewardingReport> {
    Ok(RewardingReport {
        id: row.get(0)?,
        timestamp: row.get::<_, i64>(1)? as u64,
        eligible_mixnodes: row.get::<_, i64>(2)? as u64,
        eligible_gateways: row.get::<_, i64>(3)? as u64,
        possibly_unrewarded_mixnodes: row.get::<_, i64>(4)? as u64,
        possibly_unrewarded_gateways: row.get::<_, i64>(5)? as u64,
    })
}

/// Get a report by id.
pub fn get_report(conn: &Connection, id: i64) -> Result<RewardingReport> {
    conn.query_row(
        &format!("SELECT {REPORT_COLUMNS} FROM rewarding_report WHERE id = ?1"),
        [id],
        report_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("report {id}")),
        other => DbError::Sqlite(other),
    })
}

/// Most recently written report, if any.
pub fn latest_report(conn: &Connection) -> Result<Option<RewardingReport>> {
    let report = conn
        .query_row(
            &format!("SELECT {REPORT_COLUMNS} FROM rewarding_report ORDER BY id DESC LIMIT 1"),
            [],
            report_from_row,
        )
        .optional()?;
    Ok(report)
}

/// List reports, newest first.
pub fn list_reports(conn: &Connection, limit: u32) -> Result<Vec<RewardingReport>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REPORT_COLUMNS} FROM rewarding_report ORDER BY id DESC LIMIT ?1"
    ))?;
    let rows = stmt
        .query_map([limit], report_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Failed chunks of one kind belonging to a report, with their member counts.
pub fn failed_chunks(
    conn: &Connection,
    report_id: i64,
    kind: ParticipantKind,
) -> Result<Vec<FailedRewardChunk>> {
    let (entities, chunk_fk) = entity_table(kind);
    let mut stmt = conn.prepare(&format!(
        "SELECT c.id, c.error_message, c.reward_summary_id,
                (SELECT COUNT(*) FROM {entities} e WHERE e.{chunk_fk} = c.id)
         FROM {} c WHERE c.reward_summary_id = ?1 ORDER BY c.id",
        chunk_table(kind)
    ))?;

    let rows = stmt
        .query_map([report_id], |row| {
            Ok(FailedRewardChunk {
                id: row.get(0)?,
                kind,
                error_message: row.get(1)?,
                report_id: row.get(2)?,
                members: row.get::<_, i64>(3)? as u64,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Identities and uptimes of all possibly-unrewarded participants of one
/// kind in a report, in insertion order.
pub fn list_possibly_unrewarded(
    conn: &Connection,
    report_id: i64,
    kind: ParticipantKind,
) -> Result<Vec<PossiblyUnrewarded>> {
    let (entities, chunk_fk) = entity_table(kind);
    let mut stmt = conn.prepare(&format!(
        "SELECT e.identity, e.uptime FROM {entities} e
         JOIN {} c ON e.{chunk_fk} = c.id
         WHERE c.reward_summary_id = ?1
         ORDER BY e.id",
        chunk_table(kind)
    ))?;

    let raw = stmt
        .query_map([report_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(identity, uptime)| {
            let uptime =
                Uptime::try_from(uptime).map_err(|e| DbError::Serialization(e.to_string()))?;
            Ok(PossiblyUnrewarded { identity, uptime })
        })
        .collect()
}

/// Batch totals recorded for one kind of a report.
pub fn batch_tally(conn: &Connection, report_id: i64, kind: ParticipantKind) -> Result<BatchTally> {
    conn.query_row(
        "SELECT total_batches, confirmed_batches FROM reward_batch_tally
         WHERE reward_summary_id = ?1 AND participant_kind = ?2",
        rusqlite::params![report_id, kind.as_str()],
        |row| {
            Ok(BatchTally {
                total_batches: row.get::<_, i64>(0)? as u64,
                confirmed_batches: row.get::<_, i64>(1)? as u64,
            })
        },
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            DbError::NotFound(format!("{kind} batch tally of report {report_id}"))
        }
        other => DbError::Sqlite(other),
    })
}
