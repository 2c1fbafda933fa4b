//! Scripted in-memory chain client.
//!
//! Confirms everything by default. Individual participants can be scripted
//! to make the transaction carrying them be rejected, stay unconfirmed,
//! respond late or never respond at all. Every submitted transaction is
//! recorded, together with the time it resolved.
//!
//! The stub also keeps a small ledger of balances and bonded mixnodes so
//! register/unregister, topology and balance calls behave plausibly.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reward_types::contract::{Coin, ExecuteMsg, Fee, MixNodeBond, QueryMsg, Topology};
use reward_types::IdentityKey;
use tokio::time::Instant;

use crate::client::{ChainClient, ChainError, TxReceipt};

/// Scripted reaction to a transaction containing a given participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubBehaviour {
    Confirm,
    Reject(String),
    Unconfirmed(String),
    /// Confirm after the given delay.
    Delay(Duration),
    /// Never answer.
    Stall,
}

/// A transaction seen by the stub.
#[derive(Debug, Clone)]
pub struct SubmittedTx {
    pub sender: String,
    pub contract: String,
    pub msgs: Vec<ExecuteMsg>,
    pub fee: Fee,
    pub memo: String,
    pub submitted_at: Instant,
}

impl SubmittedTx {
    /// Identities of the reward messages in this transaction.
    pub fn rewarded_identities(&self) -> Vec<&str> {
        self.msgs.iter().filter_map(rewarded_identity).collect()
    }
}

/// A transaction that got an answer, successful or not.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub identities: Vec<IdentityKey>,
    pub confirmed: bool,
    pub resolved_at: Instant,
}

#[derive(Debug, Default)]
struct Ledger {
    balances: HashMap<(String, String), u128>,
    bonds: Vec<MixNodeBond>,
}

/// In-memory [`ChainClient`].
#[derive(Debug, Default)]
pub struct StubChainClient {
    behaviours: Mutex<HashMap<IdentityKey, StubBehaviour>>,
    submitted: Mutex<Vec<SubmittedTx>>,
    resolutions: Mutex<Vec<Resolution>>,
    ledger: Mutex<Ledger>,
    tx_counter: Mutex<u64>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn rewarded_identity(msg: &ExecuteMsg) -> Option<&str> {
    match msg {
        ExecuteMsg::RewardMixnode { identity, .. } | ExecuteMsg::RewardGateway { identity, .. } => {
            Some(identity.as_str())
        }
        _ => None,
    }
}

impl StubChainClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the behaviour of any transaction carrying `identity`.
    pub fn script(&self, identity: impl Into<IdentityKey>, behaviour: StubBehaviour) {
        lock(&self.behaviours).insert(identity.into(), behaviour);
    }

    pub fn set_balance(&self, address: &str, coin: Coin) {
        lock(&self.ledger)
            .balances
            .insert((address.to_string(), coin.denom), coin.amount);
    }

    pub fn submitted(&self) -> Vec<SubmittedTx> {
        lock(&self.submitted).clone()
    }

    pub fn resolutions(&self) -> Vec<Resolution> {
        lock(&self.resolutions).clone()
    }

    /// First scripted behaviour among the transaction's participants.
    fn behaviour_for(&self, msgs: &[ExecuteMsg]) -> StubBehaviour {
        let behaviours = lock(&self.behaviours);
        msgs.iter()
            .filter_map(rewarded_identity)
            .find_map(|identity| behaviours.get(identity).cloned())
            .unwrap_or(StubBehaviour::Confirm)
    }

    fn resolve(&self, msgs: &[ExecuteMsg], confirmed: bool) {
        lock(&self.resolutions).push(Resolution {
            identities: msgs
                .iter()
                .filter_map(rewarded_identity)
                .map(str::to_string)
                .collect(),
            confirmed,
            resolved_at: Instant::now(),
        });
    }

    /// Apply bonding messages to the ledger.
    fn apply(&self, sender: &str, msgs: &[(ExecuteMsg, Vec<Coin>)]) -> Result<(), ChainError> {
        let mut ledger = lock(&self.ledger);
        for (msg, funds) in msgs {
            match msg {
                ExecuteMsg::RegisterMixnode { mix_node } => {
                    if ledger.bonds.iter().any(|bond| bond.owner == sender) {
                        return Err(ChainError::Rejected(format!(
                            "{sender} already owns a mixnode"
                        )));
                    }
                    for coin in funds {
                        let key = (sender.to_string(), coin.denom.clone());
                        let balance = ledger.balances.get(&key).copied().unwrap_or(0);
                        if balance < coin.amount {
                            return Err(ChainError::Rejected(format!(
                                "insufficient funds: {balance}{} < {}{}",
                                coin.denom, coin.amount, coin.denom
                            )));
                        }
                        ledger.balances.insert(key, balance - coin.amount);
                    }
                    ledger.bonds.push(MixNodeBond {
                        owner: sender.to_string(),
                        bond_amount: funds.clone(),
                        mix_node: mix_node.clone(),
                    });
                }
                ExecuteMsg::UnRegisterMixnode {} => {
                    let position = ledger
                        .bonds
                        .iter()
                        .position(|bond| bond.owner == sender)
                        .ok_or_else(|| {
                            ChainError::Rejected(format!("{sender} does not own a mixnode"))
                        })?;
                    let bond = ledger.bonds.remove(position);
                    for coin in bond.bond_amount {
                        *ledger
                            .balances
                            .entry((sender.to_string(), coin.denom))
                            .or_insert(0) += coin.amount;
                    }
                }
                ExecuteMsg::RewardMixnode { .. } | ExecuteMsg::RewardGateway { .. } => {}
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ChainClient for StubChainClient {
    async fn execute(
        &self,
        sender: &str,
        contract: &str,
        msgs: Vec<(ExecuteMsg, Vec<Coin>)>,
        fee: Fee,
        memo: String,
    ) -> Result<TxReceipt, ChainError> {
        let plain: Vec<ExecuteMsg> = msgs.iter().map(|(msg, _)| msg.clone()).collect();
        let behaviour = self.behaviour_for(&plain);

        lock(&self.submitted).push(SubmittedTx {
            sender: sender.to_string(),
            contract: contract.to_string(),
            msgs: plain.clone(),
            fee: fee.clone(),
            memo,
            submitted_at: Instant::now(),
        });

        match behaviour {
            StubBehaviour::Confirm => {}
            StubBehaviour::Delay(delay) => tokio::time::sleep(delay).await,
            StubBehaviour::Stall => std::future::pending::<()>().await,
            StubBehaviour::Reject(message) => {
                self.resolve(&plain, false);
                return Err(ChainError::Rejected(message));
            }
            StubBehaviour::Unconfirmed(message) => {
                self.resolve(&plain, false);
                return Err(ChainError::Unconfirmed(message));
            }
        }

        if let Err(e) = self.apply(sender, &msgs) {
            self.resolve(&plain, false);
            return Err(e);
        }
        self.resolve(&plain, true);

        let mut counter = lock(&self.tx_counter);
        *counter += 1;
        Ok(TxReceipt {
            tx_hash: format!("{:064X}", *counter),
            gas_used: fee.gas_limit,
        })
    }

    async fn query_contract_smart(
        &self,
        _contract: &str,
        query: &QueryMsg,
    ) -> Result<serde_json::Value, ChainError> {
        match query {
            QueryMsg::GetTopology {} => {
                let topology = Topology {
                    mix_node_bonds: lock(&self.ledger).bonds.clone(),
                };
                serde_json::to_value(topology).map_err(|e| ChainError::Malformed(e.to_string()))
            }
        }
    }

    async fn get_balance(&self, address: &str, denom: &str) -> Result<Coin, ChainError> {
        let amount = lock(&self.ledger)
            .balances
            .get(&(address.to_string(), denom.to_string()))
            .copied()
            .unwrap_or(0);
        Ok(Coin::new(amount, denom))
    }
}
