//! APY normalization and the allocation decision
//!
//! Both protocols report an instantaneous rate in their own fixed-point encoding:
//!
//! ```plain
//! Compound: supplyRatePerBlock, 1e18 scale
//!     apy = ((1 + rate / 1e18 * BLOCKS_PER_DAY) ^ DAYS_PER_YEAR - 1) * 100
//!
//! Aave:     currentLiquidityRate, 1e27 (ray) scale, an APR
//!     apy = ((1 + (rate / 1e27) / SECONDS_PER_YEAR) ^ SECONDS_PER_YEAR - 1) * 100
//! ```
//!
//! Powers are evaluated as `exp_m1(n * ln_1p(x))`, which keeps the tiny
//! per-period rates from being swallowed by the `1 +`.

use alloy_primitives::U256;

use crate::{
    constants::{BLOCKS_PER_DAY, DAYS_PER_YEAR, RAY, SCALE, SECONDS_PER_YEAR},
    types::{ProtocolId, ProtocolQuote},
    utils::{common::u256_to_u128, error::ManagerResult},
};

/// `((1 + rate) ^ periods - 1) * 100`
fn compounded_percent(rate_per_period: f64, periods: f64) -> f64 {
    (periods * rate_per_period.ln_1p()).exp_m1() * 100.0
}

/// Annualized percentage for a Compound `supplyRatePerBlock`
pub fn compound_apy(supply_rate_per_block: U256) -> ManagerResult<f64> {
    let rate_per_block = u256_to_u128(supply_rate_per_block)? as f64 / SCALE as f64;
    let rate_per_day = rate_per_block * BLOCKS_PER_DAY as f64;
    Ok(compounded_percent(rate_per_day, DAYS_PER_YEAR as f64))
}

/// Annualized percentage for an Aave `currentLiquidityRate`, compounded every second
pub fn aave_apy(liquidity_rate: U256) -> ManagerResult<f64> {
    let seconds = SECONDS_PER_YEAR as f64;
    let rate_per_second = aave_apr(liquidity_rate)? / 100.0 / seconds;
    Ok(compounded_percent(rate_per_second, seconds))
}

/// Simple (non-compounded) percentage of an Aave `currentLiquidityRate`.
/// Only used for display next to the APY.
pub fn aave_apr(liquidity_rate: U256) -> ManagerResult<f64> {
    Ok(u256_to_u128(liquidity_rate)? as f64 / RAY as f64 * 100.0)
}

/// Builds a quote from a protocol's raw rate
pub fn quote(protocol: ProtocolId, raw_rate: U256) -> ManagerResult<ProtocolQuote> {
    let annualized_percent = match protocol {
        ProtocolId::Compound => compound_apy(raw_rate)?,
        ProtocolId::Aave => aave_apy(raw_rate)?,
    };

    Ok(ProtocolQuote {
        protocol,
        raw_rate,
        annualized_percent,
    })
}

/// Compound wins only on a strict majority. Ties and NaN go to Aave.
pub fn choose_protocol(compound_apy: f64, aave_apy: f64) -> ProtocolId {
    if compound_apy > aave_apy {
        ProtocolId::Compound
    } else {
        ProtocolId::Aave
    }
}
