//! Epoch driver.
//!
//! [`EpochScheduler::run_epoch`] performs one full reconciliation cycle:
//! validate, chunk, dispatch every batch, wait for all of them, record.
//! No report is written while any batch is unresolved, and a cancelled run
//! writes nothing at all. Calling it twice for the same epoch produces two
//! reports; invoking it once per epoch is the caller's job, which
//! [`EpochScheduler::run`] does by tracking the last epoch it processed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reward_types::report::RewardingReport;
use reward_types::{ParticipantKind, ParticipantRecord};
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};

use crate::chunker::{self, Batch};
use crate::client::{ChainClient, RewardingContext};
use crate::config::{ChainConfig, RewardingConfig};
use crate::dispatcher::RewardDispatcher;
use crate::recorder::ReconciliationRecorder;
use crate::{Result, RewardError};

/// Seconds since the Unix epoch.
fn unix_now() -> Duration {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
}

/// Index of the reward epoch containing the current time.
pub fn current_epoch(epoch_length: Duration) -> u64 {
    unix_now().as_secs() / epoch_length.as_secs().max(1)
}

/// Time left until the next epoch boundary.
pub fn time_until_next_epoch(epoch_length: Duration) -> Duration {
    let length = epoch_length.as_secs().max(1);
    Duration::from_secs(length - (unix_now().as_secs() % length))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub max_batch_size: usize,
    pub epoch_length: Duration,
}

/// Participants eligible for this epoch's rewards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Eligibility {
    pub mixnodes: Vec<ParticipantRecord>,
    pub gateways: Vec<ParticipantRecord>,
}

/// Supplier of the eligible participant sets.
#[async_trait]
pub trait EligibilitySource: Send + Sync {
    async fn eligible(&self, epoch: u64) -> Result<Eligibility>;
}

pub struct EpochScheduler {
    dispatcher: RewardDispatcher,
    recorder: ReconciliationRecorder,
    settings: SchedulerSettings,
}

impl EpochScheduler {
    pub fn new(
        dispatcher: RewardDispatcher,
        recorder: ReconciliationRecorder,
        settings: SchedulerSettings,
    ) -> Result<Self> {
        if settings.max_batch_size == 0 {
            return Err(RewardError::InvalidBatchSize);
        }
        if settings.epoch_length.as_secs() == 0 {
            return Err(RewardError::InvalidConfig(
                "epoch_length must be at least one second".to_string(),
            ));
        }
        Ok(Self {
            dispatcher,
            recorder,
            settings,
        })
    }

    /// Wire a scheduler from configuration.
    pub fn from_config(
        chain: &ChainConfig,
        rewarding: &RewardingConfig,
        client: Arc<dyn ChainClient>,
        db: Arc<Mutex<rusqlite::Connection>>,
    ) -> Result<Self> {
        rewarding.validate()?;
        let context: RewardingContext = chain.context()?;
        let dispatcher = RewardDispatcher::new(client, context, rewarding.dispatch_settings())?;
        Self::new(
            dispatcher,
            ReconciliationRecorder::new(db),
            rewarding.scheduler_settings(),
        )
    }

    pub fn settings(&self) -> SchedulerSettings {
        self.settings
    }

    /// Run one full rewarding cycle and persist its report.
    ///
    /// Malformed input fails the run before anything is submitted. Batch
    /// failures are recorded, not returned; only a storage failure makes
    /// an otherwise dispatched epoch fail.
    pub async fn run_epoch(
        &self,
        mixnodes: Vec<ParticipantRecord>,
        gateways: Vec<ParticipantRecord>,
    ) -> Result<RewardingReport> {
        chunker::validate(ParticipantKind::Mixnode, &mixnodes)?;
        chunker::validate(ParticipantKind::Gateway, &gateways)?;

        let eligible_mixnodes = mixnodes.len() as u64;
        let eligible_gateways = gateways.len() as u64;

        let mixnode_batches = chunker::chunk(mixnodes, self.settings.max_batch_size)?;
        let gateway_batches = chunker::chunk(gateways, self.settings.max_batch_size)?;

        info!(
            eligible_mixnodes,
            eligible_gateways,
            mixnode_batches = mixnode_batches.len(),
            gateway_batches = gateway_batches.len(),
            "dispatching reward batches"
        );

        let work: Vec<(ParticipantKind, Batch)> = mixnode_batches
            .into_iter()
            .map(|batch| (ParticipantKind::Mixnode, batch))
            .chain(
                gateway_batches
                    .into_iter()
                    .map(|batch| (ParticipantKind::Gateway, batch)),
            )
            .collect();

        let (mixnode_results, gateway_results): (Vec<_>, Vec<_>) = self
            .dispatcher
            .dispatch_all(work)
            .await
            .into_iter()
            .partition(|result| result.kind == ParticipantKind::Mixnode);

        self.recorder
            .record(
                eligible_mixnodes,
                eligible_gateways,
                &mixnode_results,
                &gateway_results,
            )
            .await
    }

    async fn run_for(&self, source: &dyn EligibilitySource, epoch: u64) -> Result<RewardingReport> {
        let eligibility = source.eligible(epoch).await?;
        self.run_epoch(eligibility.mixnodes, eligibility.gateways)
            .await
    }

    /// Run once per epoch boundary until `shutdown` fires.
    ///
    /// A failed epoch is logged and skipped, never retried. Shutdown during
    /// a run cancels it; nothing is recorded for that epoch.
    pub async fn run(
        &self,
        source: Arc<dyn EligibilitySource>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let epoch_length = self.settings.epoch_length;
        let mut last_epoch = None;

        loop {
            let wait = time_until_next_epoch(epoch_length);
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.recv() => {
                    info!("epoch scheduler stopping");
                    return;
                }
            }

            let epoch = current_epoch(epoch_length);
            if last_epoch == Some(epoch) {
                continue;
            }
            last_epoch = Some(epoch);

            info!(epoch, "starting epoch rewarding");
            tokio::select! {
                result = self.run_for(source.as_ref(), epoch) => match result {
                    Ok(report) => info!(epoch, report_id = report.id, "epoch rewarding complete"),
                    Err(e) => error!(epoch, error = %e, "epoch rewarding failed"),
                },
                _ = shutdown.recv() => {
                    warn!(epoch, "shutdown during epoch rewarding; no report written");
                    return;
                }
            }
        }
    }
}
