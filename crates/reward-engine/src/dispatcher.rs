//! Reward batch submission.
//!
//! Each batch is one transaction, awaited for at most `call_timeout`.
//! Batches run concurrently, at most `max_in_flight` at a time, and never
//! influence each other: a slow or failing batch neither cancels nor holds
//! back its siblings. Outcomes are never retried here.

use std::sync::Arc;
use std::time::Duration;

use reward_types::{BatchOutcome, ParticipantKind};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::chunker::Batch;
use crate::client::{estimate_fee, reward_memo, reward_messages, ChainClient, ChainError, RewardingContext};
use crate::{Result, RewardError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Maximum batches awaiting confirmation at once.
    pub max_in_flight: usize,
    /// How long to wait for a transaction before declaring it timed out.
    pub call_timeout: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            max_in_flight: 4,
            call_timeout: Duration::from_secs(60),
        }
    }
}

/// A batch together with how its submission ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub kind: ParticipantKind,
    pub batch: Batch,
    pub outcome: BatchOutcome,
}

/// Submits reward batches through a shared chain client.
#[derive(Clone)]
pub struct RewardDispatcher {
    client: Arc<dyn ChainClient>,
    context: Arc<RewardingContext>,
    settings: DispatchSettings,
}

impl RewardDispatcher {
    pub fn new(
        client: Arc<dyn ChainClient>,
        context: RewardingContext,
        settings: DispatchSettings,
    ) -> Result<Self> {
        if settings.max_in_flight == 0 {
            return Err(RewardError::InvalidConfig(
                "max_in_flight must be at least 1".to_string(),
            ));
        }
        if settings.call_timeout.is_zero() {
            return Err(RewardError::InvalidConfig(
                "call_timeout must be positive".to_string(),
            ));
        }
        Ok(Self {
            client,
            context: Arc::new(context),
            settings,
        })
    }

    pub fn settings(&self) -> DispatchSettings {
        self.settings
    }

    /// Submit one batch and classify the result.
    pub async fn dispatch(&self, batch: &Batch, kind: ParticipantKind) -> BatchOutcome {
        let submission = self.client.execute(
            &self.context.sender,
            &self.context.contract,
            reward_messages(kind, batch),
            estimate_fee(kind, batch),
            reward_memo(kind, batch),
        );

        let outcome = match tokio::time::timeout(self.settings.call_timeout, submission).await {
            Ok(Ok(receipt)) => {
                debug!(
                    %kind,
                    batch = batch.index,
                    members = batch.len(),
                    tx_hash = %receipt.tx_hash,
                    "reward batch confirmed"
                );
                return BatchOutcome::Confirmed;
            }
            Ok(Err(ChainError::Rejected(message))) => BatchOutcome::Failed(message),
            Ok(Err(e)) => BatchOutcome::TimedOut(format!("transaction outcome unknown: {e}")),
            Err(_) => BatchOutcome::TimedOut(format!(
                "timed out after {}s waiting for transaction confirmation",
                self.settings.call_timeout.as_secs_f64()
            )),
        };

        warn!(
            %kind,
            batch = batch.index,
            members = batch.len(),
            outcome = outcome.label(),
            error = outcome.error_message().unwrap_or_default(),
            "reward batch not confirmed"
        );
        outcome
    }

    /// Submit every batch and wait until all of them have resolved.
    ///
    /// Results come back in the order the batches were given. Dropping the
    /// returned future aborts whatever is still in flight.
    pub async fn dispatch_all(&self, work: Vec<(ParticipantKind, Batch)>) -> Vec<BatchResult> {
        let permits = Arc::new(Semaphore::new(self.settings.max_in_flight));
        let mut in_flight = JoinSet::new();

        for (slot, (kind, batch)) in work.iter().enumerate() {
            let dispatcher = self.clone();
            let permits = Arc::clone(&permits);
            let kind = *kind;
            let batch = batch.clone();
            in_flight.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                (slot, dispatcher.dispatch(&batch, kind).await)
            });
        }

        let mut outcomes: Vec<Option<BatchOutcome>> = vec![None; work.len()];
        while let Some(joined) = in_flight.join_next().await {
            match joined {
                Ok((slot, outcome)) => outcomes[slot] = Some(outcome),
                Err(e) => error!(error = %e, "reward dispatch task failed"),
            }
        }

        work.into_iter()
            .zip(outcomes)
            .map(|((kind, batch), outcome)| BatchResult {
                kind,
                batch,
                // the task died after the transaction may have been sent
                outcome: outcome.unwrap_or_else(|| {
                    BatchOutcome::TimedOut(
                        "dispatch task ended before an outcome was observed".to_string(),
                    )
                }),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::chunk;
    use crate::stub::{StubBehaviour, StubChainClient};
    use reward_types::{ParticipantRecord, Uptime};

    fn nodes(prefix: &str, count: usize) -> Vec<ParticipantRecord> {
        (0..count)
            .map(|i| {
                ParticipantRecord::new(format!("{prefix}-{i:02}"), Uptime::try_from(99u8).expect("uptime"))
            })
            .collect()
    }

    fn dispatcher(client: Arc<StubChainClient>, settings: DispatchSettings) -> RewardDispatcher {
        let context = RewardingContext::new("n1monitor", "n1mixnet").expect("context");
        RewardDispatcher::new(client, context, settings).expect("dispatcher")
    }

    fn work(kind: ParticipantKind, batches: Vec<Batch>) -> Vec<(ParticipantKind, Batch)> {
        batches.into_iter().map(|batch| (kind, batch)).collect()
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let client: Arc<dyn ChainClient> = Arc::new(StubChainClient::new());
        let context = RewardingContext::new("a", "b").expect("context");
        let settings = DispatchSettings {
            max_in_flight: 0,
            ..DispatchSettings::default()
        };
        assert!(RewardDispatcher::new(client, context, settings).is_err());
    }

    #[tokio::test]
    async fn test_confirmed_batch() {
        let client = Arc::new(StubChainClient::new());
        let dispatcher = dispatcher(client.clone(), DispatchSettings::default());
        let batch = chunk(nodes("mix", 3), 3).expect("chunk").remove(0);

        let outcome = dispatcher.dispatch(&batch, ParticipantKind::Mixnode).await;
        assert_eq!(outcome, BatchOutcome::Confirmed);

        let submitted = client.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].sender, "n1monitor");
        assert_eq!(submitted[0].contract, "n1mixnet");
        assert_eq!(submitted[0].memo, "rewarding 3 mixnodes");
        assert_eq!(submitted[0].rewarded_identities(), vec!["mix-00", "mix-01", "mix-02"]);
    }

    #[tokio::test]
    async fn test_rejection_keeps_chain_message() {
        let client = Arc::new(StubChainClient::new());
        client.script("gw-01", StubBehaviour::Reject("unauthorized: bad signature".into()));
        let dispatcher = dispatcher(client, DispatchSettings::default());
        let batch = chunk(nodes("gw", 2), 2).expect("chunk").remove(0);

        let outcome = dispatcher.dispatch(&batch, ParticipantKind::Gateway).await;
        assert_eq!(outcome, BatchOutcome::Failed("unauthorized: bad signature".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_batch_times_out() {
        let client = Arc::new(StubChainClient::new());
        client.script("mix-00", StubBehaviour::Stall);
        let dispatcher = dispatcher(
            client,
            DispatchSettings {
                max_in_flight: 1,
                call_timeout: Duration::from_secs(30),
            },
        );
        let batch = chunk(nodes("mix", 1), 1).expect("chunk").remove(0);

        let outcome = dispatcher.dispatch(&batch, ParticipantKind::Mixnode).await;
        assert!(matches!(outcome, BatchOutcome::TimedOut(ref m) if m.contains("timed out after 30s")));
    }

    #[tokio::test]
    async fn test_unconfirmed_is_ambiguous() {
        let client = Arc::new(StubChainClient::new());
        client.script("mix-00", StubBehaviour::Unconfirmed("broadcast, not yet included".into()));
        let dispatcher = dispatcher(client, DispatchSettings::default());
        let batch = chunk(nodes("mix", 1), 1).expect("chunk").remove(0);

        let outcome = dispatcher.dispatch(&batch, ParticipantKind::Mixnode).await;
        assert!(matches!(outcome, BatchOutcome::TimedOut(ref m) if m.contains("not yet included")));
    }

    #[tokio::test]
    async fn test_dispatch_all_preserves_order_and_isolation() {
        let client = Arc::new(StubChainClient::new());
        client.script("mix-04", StubBehaviour::Reject("out of gas".into()));
        let dispatcher = dispatcher(client.clone(), DispatchSettings::default());

        let batches = chunk(nodes("mix", 10), 3).expect("chunk");
        let results = dispatcher
            .dispatch_all(work(ParticipantKind::Mixnode, batches))
            .await;

        let outcomes: Vec<&BatchOutcome> = results.iter().map(|r| &r.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                &BatchOutcome::Confirmed,
                &BatchOutcome::Failed("out of gas".into()),
                &BatchOutcome::Confirmed,
                &BatchOutcome::Confirmed,
            ]
        );
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.batch.index, i);
        }
        // exactly one submission per batch, no retries
        assert_eq!(client.submitted().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_batch_does_not_hold_back_siblings() {
        let client = Arc::new(StubChainClient::new());
        client.script("mix-00", StubBehaviour::Delay(Duration::from_secs(40)));
        let dispatcher = dispatcher(
            client.clone(),
            DispatchSettings {
                max_in_flight: 2,
                call_timeout: Duration::from_secs(60),
            },
        );

        let start = tokio::time::Instant::now();
        let batches = chunk(nodes("mix", 8), 2).expect("chunk");
        let results = dispatcher
            .dispatch_all(work(ParticipantKind::Mixnode, batches))
            .await;
        assert!(results.iter().all(|r| r.outcome.is_confirmed()));

        let resolutions = client.resolutions();
        assert_eq!(resolutions.len(), 4);
        for resolution in &resolutions {
            let elapsed = resolution.resolved_at - start;
            if resolution.identities.contains(&"mix-00".to_string()) {
                assert!(elapsed >= Duration::from_secs(40));
            } else {
                assert!(elapsed < Duration::from_secs(1), "sibling waited {elapsed:?}");
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_bound() {
        let client = Arc::new(StubChainClient::new());
        for i in 0..6 {
            client.script(format!("mix-{i:02}"), StubBehaviour::Delay(Duration::from_secs(10)));
        }
        let dispatcher = dispatcher(
            client.clone(),
            DispatchSettings {
                max_in_flight: 2,
                call_timeout: Duration::from_secs(60),
            },
        );

        let start = tokio::time::Instant::now();
        let batches = chunk(nodes("mix", 6), 1).expect("chunk");
        dispatcher
            .dispatch_all(work(ParticipantKind::Mixnode, batches))
            .await;

        // six 10s batches, two at a time
        let mut submit_offsets: Vec<u64> = client
            .submitted()
            .iter()
            .map(|tx| (tx.submitted_at - start).as_secs())
            .collect();
        submit_offsets.sort_unstable();
        assert_eq!(submit_offsets, vec![0, 0, 10, 10, 20, 20]);
    }
}
