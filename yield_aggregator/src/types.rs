use alloy_primitives::{Address, U256};
use alloy_sol_types::sol;
use candid::{CandidType, Nat, Principal};
use serde::Deserialize;

use crate::{position::ledger::UserPosition, utils::common::u256_to_nat};

/// External lending protocol identifier
#[derive(CandidType, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProtocolId {
    /// Compound v2 style cToken market. Rates are quoted per block.
    Compound,
    /// Aave v3 pool. Rates are ray-scaled and annualized.
    Aave,
}

impl ProtocolId {
    /// The protocol that is not `self`
    pub fn other(&self) -> ProtocolId {
        match self {
            ProtocolId::Compound => ProtocolId::Aave,
            ProtocolId::Aave => ProtocolId::Compound,
        }
    }
}

/// Where a deposit or a rebalance should go
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepositTarget {
    /// Pick the protocol with the higher APY
    Auto,
    /// Use the given protocol
    Explicit(ProtocolId),
}

impl From<Option<ProtocolId>> for DepositTarget {
    fn from(value: Option<ProtocolId>) -> Self {
        value.map_or(DepositTarget::Auto, DepositTarget::Explicit)
    }
}

/// Rate observed on a protocol, recomputed on every query
#[derive(Clone, Debug, PartialEq)]
pub struct ProtocolQuote {
    pub protocol: ProtocolId,
    /// Raw fixed-point rate as reported by the protocol
    pub raw_rate: U256,
    pub annualized_percent: f64,
}

#[derive(CandidType, Deserialize, Clone, Debug, PartialEq)]
pub struct ProtocolQuoteView {
    pub protocol: ProtocolId,
    pub raw_rate: Nat,
    pub annualized_percent: f64,
}

impl From<ProtocolQuote> for ProtocolQuoteView {
    fn from(value: ProtocolQuote) -> Self {
        Self {
            protocol: value.protocol,
            raw_rate: u256_to_nat(&value.raw_rate),
            annualized_percent: value.annualized_percent,
        }
    }
}

/// Outcome of a rebalance. Derived, never stored.
#[derive(Clone, Debug, PartialEq)]
pub struct RebalanceDecision {
    /// `None` when the move settled funds that were already held by the canister
    pub from: Option<ProtocolId>,
    pub to: ProtocolId,
    pub amount: U256,
}

#[derive(CandidType, Deserialize, Clone, Debug, PartialEq)]
pub struct RebalanceReport {
    pub from: Option<ProtocolId>,
    pub to: ProtocolId,
    pub amount: Nat,
    pub balance: UserBalance,
}

/// Caller-facing view of a user's position
#[derive(CandidType, Deserialize, Clone, Debug, PartialEq)]
pub struct UserBalance {
    pub user: String,
    pub compound_principal: Nat,
    pub aave_principal: Nat,
    /// Funds withdrawn from a protocol and not yet deposited into the next one
    pub held: Nat,
}

impl UserBalance {
    pub fn new(user: Address, position: &UserPosition) -> Self {
        Self {
            user: user.to_string(),
            compound_principal: u256_to_nat(&position.compound.principal),
            aave_principal: u256_to_nat(&position.aave.principal),
            held: u256_to_nat(&position.held),
        }
    }
}

/// Static gas parameters for the EOA's transactions
#[derive(CandidType, Deserialize, Clone, Debug)]
pub struct GasInput {
    pub max_fee_per_gas: Nat,
    pub max_priority_fee_per_gas: Nat,
    pub gas_limit: Option<Nat>,
}

#[derive(CandidType, Deserialize, Clone, Debug)]
pub struct InitArgs {
    pub rpc_principal: Principal,
    /// ERC-20 asset held by the aggregator
    pub asset: String,
    /// Aave v3 pool
    pub aave_pool: String,
    /// Compound cToken market for `asset`
    pub compound_market: String,
    /// Address of the threshold ECDSA key under `derivation_path`
    pub eoa: String,
    pub key_name: String,
    pub derivation_path: Vec<Vec<u8>>,
    pub gas: GasInput,
}

pub type DerivationPath = Vec<Vec<u8>>;

sol!(
    // Aave v3 types
    struct ReserveConfigurationMap {
        uint256 data;
    }

    struct ReserveData {
        ReserveConfigurationMap configuration;
        uint128 liquidityIndex;
        uint128 currentLiquidityRate;
        uint128 variableBorrowIndex;
        uint128 currentVariableBorrowRate;
        uint128 currentStableBorrowRate;
        uint40 lastUpdateTimestamp;
        uint16 id;
        address aTokenAddress;
        address stableDebtTokenAddress;
        address variableDebtTokenAddress;
        address interestRateStrategyAddress;
        uint128 accruedToTreasury;
        uint128 unbacked;
        uint128 isolationModeTotalDebt;
    }

    // Aave v3 pool
    function getReserveData(address asset) external view returns (ReserveData memory);
    function getReserveNormalizedIncome(address asset) external view returns (uint256);
    function supply(address asset, uint256 amount, address onBehalfOf, uint16 referralCode) external;
    function withdraw(address asset, uint256 amount, address to) external returns (uint256);

    // Compound cToken
    function supplyRatePerBlock() external view returns (uint256);
    function exchangeRateCurrent() external returns (uint256);
    function mint(uint256 mintAmount) external returns (uint256);
    function redeemUnderlying(uint256 redeemAmount) external returns (uint256);

    // ERC-20
    function balanceOf(address account) external view returns (uint256);
    function allowance(address owner, address spender) external view returns (uint256);
    function approve(address spender, uint256 amount) external returns (bool);
    function transfer(address to, uint256 amount) external returns (bool);
    function transferFrom(address from, address to, uint256 amount) external returns (bool);
);
