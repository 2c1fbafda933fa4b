//! Mixnet contract messages and chain value types.

use serde::{Deserialize, Serialize};

use crate::{IdentityKey, Uptime};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub amount: u128,
    pub denom: String,
}

impl Coin {
    pub fn new(amount: u128, denom: impl Into<String>) -> Self {
        Coin {
            amount,
            denom: denom.into(),
        }
    }
}

/// Fee attached to a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub amount: Vec<Coin>,
    pub gas_limit: u64,
}

impl Fee {
    /// Fee with a gas limit and no explicit amount; the client prices the gas.
    pub fn with_gas_limit(gas_limit: u64) -> Self {
        Fee {
            amount: Vec::new(),
            gas_limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixNode {
    pub host: String,
    pub layer: u64,
    pub location: String,
    pub sphinx_key: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixNodeBond {
    pub owner: String,
    pub bond_amount: Vec<Coin>,
    pub mix_node: MixNode,
}

/// Messages executed against the mixnet contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecuteMsg {
    RegisterMixnode { mix_node: MixNode },
    UnRegisterMixnode {},
    RewardMixnode { identity: IdentityKey, uptime: Uptime },
    RewardGateway { identity: IdentityKey, uptime: Uptime },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMsg {
    GetTopology {},
}

/// Answer to [`QueryMsg::GetTopology`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    pub mix_node_bonds: Vec<MixNodeBond>,
}
