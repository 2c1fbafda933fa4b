//! Chain client seam.
//!
//! Connection management and signing live in an external client library;
//! this crate only needs the three calls of [`ChainClient`]. Implementations
//! must tolerate concurrent use (or pool connections internally) since
//! several batches are in flight at once.

use async_trait::async_trait;
use reward_types::contract::{Coin, ExecuteMsg, Fee, QueryMsg, Topology};
use reward_types::{ParticipantKind, ParticipantRecord};
use serde::{Deserialize, Serialize};

use crate::chunker::Batch;
use crate::{Result, RewardError};

pub const MIXNODE_REWARD_OP_BASE_GAS_LIMIT: u64 = 175_000;
pub const PER_MIXNODE_DELEGATION_GAS_INCREASE: u64 = 2_500;
pub const GATEWAY_REWARD_OP_BASE_GAS_LIMIT: u64 = 175_000;
pub const PER_GATEWAY_DELEGATION_GAS_INCREASE: u64 = 2_500;

/// Errors reported by a chain client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainError {
    /// The chain refused the transaction; nothing was executed.
    #[error("{0}")]
    Rejected(String),

    /// The transaction may have been broadcast but its inclusion was never
    /// observed.
    #[error("{0}")]
    Unconfirmed(String),

    /// The chain answered with something that could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Acknowledgement of an executed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub gas_used: u64,
}

/// Operations consumed from the external chain client.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Execute messages against a contract as a single transaction.
    async fn execute(
        &self,
        sender: &str,
        contract: &str,
        msgs: Vec<(ExecuteMsg, Vec<Coin>)>,
        fee: Fee,
        memo: String,
    ) -> std::result::Result<TxReceipt, ChainError>;

    async fn query_contract_smart(
        &self,
        contract: &str,
        query: &QueryMsg,
    ) -> std::result::Result<serde_json::Value, ChainError>;

    async fn get_balance(&self, address: &str, denom: &str)
        -> std::result::Result<Coin, ChainError>;
}

/// Who signs reward transactions and which contract receives them.
///
/// Passed explicitly to the dispatcher instead of living in shared state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardingContext {
    pub sender: String,
    pub contract: String,
}

impl RewardingContext {
    pub fn new(sender: impl Into<String>, contract: impl Into<String>) -> Result<Self> {
        let sender = sender.into();
        let contract = contract.into();
        if sender.trim().is_empty() {
            return Err(RewardError::InvalidConfig(
                "unspecified sender address".to_string(),
            ));
        }
        if contract.trim().is_empty() {
            return Err(RewardError::InvalidConfig(
                "unspecified mixnet contract address".to_string(),
            ));
        }
        Ok(Self { sender, contract })
    }
}

fn reward_message(kind: ParticipantKind, member: &ParticipantRecord) -> ExecuteMsg {
    match kind {
        ParticipantKind::Mixnode => ExecuteMsg::RewardMixnode {
            identity: member.identity.clone(),
            uptime: member.uptime,
        },
        ParticipantKind::Gateway => ExecuteMsg::RewardGateway {
            identity: member.identity.clone(),
            uptime: member.uptime,
        },
    }
}

/// One reward message per batch member, in batch order, without funds.
pub fn reward_messages(kind: ParticipantKind, batch: &Batch) -> Vec<(ExecuteMsg, Vec<Coin>)> {
    batch
        .members
        .iter()
        .map(|member| (reward_message(kind, member), Vec::new()))
        .collect()
}

/// Gas limit for rewarding a batch: a base cost per node plus a cost per
/// delegation that has to be paid out.
pub fn estimate_fee(kind: ParticipantKind, batch: &Batch) -> Fee {
    let (base, per_delegation) = match kind {
        ParticipantKind::Mixnode => (
            MIXNODE_REWARD_OP_BASE_GAS_LIMIT,
            PER_MIXNODE_DELEGATION_GAS_INCREASE,
        ),
        ParticipantKind::Gateway => (
            GATEWAY_REWARD_OP_BASE_GAS_LIMIT,
            PER_GATEWAY_DELEGATION_GAS_INCREASE,
        ),
    };

    let gas_limit = base
        .saturating_mul(batch.len() as u64)
        .saturating_add(per_delegation.saturating_mul(batch.total_delegations()));

    Fee::with_gas_limit(gas_limit)
}

pub fn reward_memo(kind: ParticipantKind, batch: &Batch) -> String {
    format!("rewarding {} {}", batch.len(), kind.plural())
}

/// Fetch the currently bonded mixnodes from the contract.
pub async fn get_topology(
    client: &dyn ChainClient,
    contract: &str,
) -> std::result::Result<Topology, ChainError> {
    let raw = client
        .query_contract_smart(contract, &QueryMsg::GetTopology {})
        .await?;
    serde_json::from_value(raw).map_err(|e| ChainError::Malformed(e.to_string()))
}
