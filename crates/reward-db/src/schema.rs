//! SQL schema definitions.

/// Complete schema for the v1 rewarding database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Epoch reports
-- ============================================================

CREATE TABLE IF NOT EXISTS rewarding_report (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp INTEGER NOT NULL,
    eligible_mixnodes INTEGER NOT NULL,
    eligible_gateways INTEGER NOT NULL,
    possibly_unrewarded_mixnodes INTEGER NOT NULL,
    possibly_unrewarded_gateways INTEGER NOT NULL
);

-- Lets a report tell "no failures" apart from "kind not processed".
CREATE TABLE IF NOT EXISTS reward_batch_tally (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    reward_summary_id INTEGER NOT NULL REFERENCES rewarding_report(id),
    participant_kind TEXT NOT NULL CHECK (participant_kind IN ('mixnode', 'gateway')),
    total_batches INTEGER NOT NULL,
    confirmed_batches INTEGER NOT NULL,
    UNIQUE (reward_summary_id, participant_kind)
);

-- ============================================================
-- Failed chunks
-- ============================================================

CREATE TABLE IF NOT EXISTS failed_mixnode_reward_chunk (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    error_message TEXT NOT NULL,
    reward_summary_id INTEGER NOT NULL REFERENCES rewarding_report(id)
);

CREATE TABLE IF NOT EXISTS failed_gateway_reward_chunk (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    error_message TEXT NOT NULL,
    reward_summary_id INTEGER NOT NULL REFERENCES rewarding_report(id)
);

CREATE INDEX IF NOT EXISTS idx_failed_mixnode_chunk_report
    ON failed_mixnode_reward_chunk(reward_summary_id);
CREATE INDEX IF NOT EXISTS idx_failed_gateway_chunk_report
    ON failed_gateway_reward_chunk(reward_summary_id);

-- ============================================================
-- Possibly unrewarded entities
-- ============================================================

CREATE TABLE IF NOT EXISTS possibly_unrewarded_mixnode (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    identity TEXT NOT NULL,
    uptime INTEGER NOT NULL CHECK (uptime BETWEEN 0 AND 100),
    failed_mixnode_reward_chunk_id INTEGER NOT NULL REFERENCES failed_mixnode_reward_chunk(id)
);

CREATE TABLE IF NOT EXISTS possibly_unrewarded_gateway (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    identity TEXT NOT NULL,
    uptime INTEGER NOT NULL CHECK (uptime BETWEEN 0 AND 100),
    failed_gateway_reward_chunk_id INTEGER NOT NULL REFERENCES failed_gateway_reward_chunk(id)
);

CREATE INDEX IF NOT EXISTS idx_unrewarded_mixnode_chunk
    ON possibly_unrewarded_mixnode(failed_mixnode_reward_chunk_id);
CREATE INDEX IF NOT EXISTS idx_unrewarded_gateway_chunk
    ON possibly_unrewarded_gateway(failed_gateway_reward_chunk_id);
"#;
